/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use thiserror::Error;

/// Boxed driver error carried by [`ConditionsError::Query`], so that test doubles can report
/// failures without constructing a real sqlx error.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConditionsError {
    /// Malformed or incomplete configuration, unknown type names, a type lacking the required
    /// capability, or a missing mandatory converter/table mapping.
    #[error("Conditions configuration error: {0}")]
    Configuration(String),
    #[error("Conditions not found: {0}")]
    ConditionsNotFound(String),
    #[error("Error in SQL query \"{sql}\": {source}")]
    Query {
        sql: String,
        #[source]
        source: DriverError,
    },
    #[error("Failed to connect to {connection}: {source}")]
    Connection {
        connection: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Conditions resource error: {0}")]
    Resource(String),
    #[error("Conditions I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed conditions configuration: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl ConditionsError {
    pub fn query(sql: &str, source: impl Into<DriverError>) -> Self {
        ConditionsError::Query {
            sql: sql.to_string(),
            source: source.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ConditionsError::Configuration(message.into())
    }
}
