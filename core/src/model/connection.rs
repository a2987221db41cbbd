/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use crate::model::database::{Database, ResultSet};
use crate::model::postgresql_database::PostgreSQLDatabase;
use crate::resources;
use crate::util::Util;
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::path::Path;
use tracing::*;

/// Settings needed to open the conditions database.  Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    user: String,
    password: String,
    database: String,
    hostname: String,
    port: u16,
    driver: String,
}

impl ConnectionParameters {
    pub fn new(
        user: &str,
        password: &str,
        database: &str,
        hostname: &str,
        port: u16,
        driver: &str,
    ) -> ConnectionParameters {
        ConnectionParameters {
            user: user.to_string(),
            password: password.to_string(),
            database: database.to_string(),
            hostname: hostname.to_string(),
            port,
            driver: driver.to_string(),
        }
    }

    /// Reads a properties file with the keys user, password, database, hostname, and optionally
    /// port and driver.
    pub fn from_properties(path: &Path) -> Result<ConnectionParameters, ConditionsError> {
        if !path.exists() {
            return Err(ConditionsError::Resource(format!(
                "The connection properties file does not exist: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_properties_str(&text)
    }

    pub fn from_resource(name: &str) -> Result<ConnectionParameters, ConditionsError> {
        let text = resources::find_resource(name).ok_or_else(|| {
            ConditionsError::Resource(format!("The resource {} does not exist.", name))
        })?;
        Self::from_properties_str(text)
    }

    pub fn from_properties_str(text: &str) -> Result<ConnectionParameters, ConditionsError> {
        let properties = Util::parse_properties(text);
        let required = |key: &str| -> Result<String, ConditionsError> {
            properties.get(key).cloned().ok_or_else(|| {
                ConditionsError::configuration(format!(
                    "Missing required connection property '{}'.",
                    key
                ))
            })
        };
        let port = match properties.get("port") {
            Some(p) => p.parse::<u16>().map_err(|e| {
                ConditionsError::configuration(format!("Bad connection port '{}': {}", p, e))
            })?,
            None => Util::DEFAULT_PORT,
        };
        Ok(ConnectionParameters {
            user: required("user")?,
            password: required("password")?,
            database: required("database")?,
            hostname: required("hostname")?,
            port,
            driver: properties
                .get("driver")
                .cloned()
                .unwrap_or_else(|| Util::DEFAULT_DRIVER.to_string()),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// For logs and messages: everything but the password.
    pub fn connection_string(&self) -> String {
        format!(
            "{}://{}@{}:{}/{}",
            self.driver, self.user, self.hostname, self.port, self.database
        )
    }

    /// Each setting is passed to sqlx as-is, so passwords and names may hold any character.
    pub(crate) fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.hostname)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

// Hand-written so the password never lands in a log line.
impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("driver", &self.driver)
            .finish()
    }
}

/// Creates a live connection from parameters.  The default picks an implementation by driver
/// name; tests swap in one that returns a scripted database.
pub type Connector =
    Box<dyn Fn(&ConnectionParameters) -> Result<Box<dyn Database>, ConditionsError>>;

fn connect_by_driver(parameters: &ConnectionParameters) -> Result<Box<dyn Database>, ConditionsError> {
    match parameters.driver() {
        "postgresql" | "postgres" => Ok(Box::new(PostgreSQLDatabase::connect(parameters)?)),
        other => Err(ConditionsError::configuration(format!(
            "Unsupported database driver '{}'.",
            other
        ))),
    }
}

/// Owns the (single) conditions database connection.  Opening is lazy and closing is explicit;
/// see `open_connection` and `close_connection` for how nested callers share it.
pub struct ConnectionManager {
    parameters: Option<ConnectionParameters>,
    connection: Option<Box<dyn Database>>,
    connector: Connector,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> ConnectionManager {
        Self::with_connector(Box::new(connect_by_driver))
    }

    pub fn with_connector(connector: Connector) -> ConnectionManager {
        ConnectionManager {
            parameters: None,
            connection: None,
            connector,
        }
    }

    pub fn set_parameters(&mut self, parameters: ConnectionParameters) {
        if self.is_connected() {
            warn!(
                "new connection parameters {} will only be used after the current connection is closed",
                parameters.connection_string()
            );
        }
        self.parameters = Some(parameters);
    }

    pub fn parameters(&self) -> Option<&ConnectionParameters> {
        self.parameters.as_ref()
    }

    pub fn has_parameters(&self) -> bool {
        self.parameters.is_some()
    }

    pub fn is_connected(&self) -> bool {
        match &self.connection {
            Some(c) => !c.is_closed(),
            None => false,
        }
    }

    /// Opens the connection unless it is already open.  Returns true only when this call did the
    /// opening, so a caller can remember whether the close is its job.
    pub fn open_connection(&mut self) -> Result<bool, ConditionsError> {
        if self.is_connected() {
            debug!("connection is already open");
            return Ok(false);
        }
        let parameters = self.parameters.as_ref().ok_or_else(|| {
            ConditionsError::configuration("The connection parameters were not configured.")
        })?;
        let connection = (self.connector)(parameters)?;
        info!("opened connection {}", parameters.connection_string());
        self.connection = Some(connection);
        Ok(true)
    }

    /// Closes the connection only if `opened_here` is true, i.e. the caller is the one that opened
    /// it.  Closing also clears the parameters.  Returns whether anything was closed.
    pub fn close_connection(&mut self, opened_here: bool) -> Result<bool, ConditionsError> {
        if !opened_here {
            debug!("leaving connection open for the caller that opened it");
            return Ok(false);
        }
        self.force_close_connection()
    }

    pub fn force_close_connection(&mut self) -> Result<bool, ConditionsError> {
        let connection = self.connection.take();
        self.parameters = None;
        match connection {
            Some(mut c) => {
                if !c.is_closed() {
                    c.close()?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn connection(&self, sql: &str) -> Result<&dyn Database, ConditionsError> {
        match &self.connection {
            Some(c) if !c.is_closed() => Ok(c.as_ref()),
            _ => Err(ConditionsError::query(
                sql,
                "The database connection is not open.",
            )),
        }
    }

    pub fn select_query(&self, sql: &str) -> Result<ResultSet, ConditionsError> {
        self.connection(sql)?.select_query(sql)
    }

    pub fn update_query(&self, sql: &str) -> Result<Vec<i64>, ConditionsError> {
        self.connection(sql)?.update_query(sql)
    }
}
