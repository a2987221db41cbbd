/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use crate::model::connection::ConnectionParameters;
use crate::model::database::{DataType, Database, ResultSet};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use sqlx::postgres::*;
// Specifically omitting sql::Error from use statements so that it is *clearer* which Error type is
// in use, in the code.
use sqlx::{Column, PgPool, Row, TypeInfo, ValueRef};
use tracing::*;

/// The conditions database on a postgres server.  sqlx is async, but this layer is synchronous, so
/// every call goes through `rt.block_on`.  The pool is capped at one connection: there is exactly
/// one live connection per instance.
#[derive(Debug)]
pub struct PostgreSQLDatabase {
    pub rt: tokio::runtime::Runtime,
    pub pool: PgPool,
    connection_string: String,
    closed: bool,
}

impl PostgreSQLDatabase {
    pub fn connect(parameters: &ConnectionParameters) -> Result<PostgreSQLDatabase, ConditionsError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let connection_string = parameters.connection_string();
        let future = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(parameters.connect_options());
        let pool = rt
            .block_on(future)
            .map_err(|source| ConditionsError::Connection {
                connection: connection_string.clone(),
                source,
            })?;
        info!("created connection {}", connection_string);
        Ok(PostgreSQLDatabase {
            rt,
            pool,
            connection_string,
            closed: false,
        })
    }

    fn check_open(&self, sql: &str) -> Result<(), ConditionsError> {
        if self.closed {
            Err(ConditionsError::query(
                sql,
                format!("connection {} is already closed", self.connection_string),
            ))
        } else {
            Ok(())
        }
    }

    fn fetch_rows(&self, sql: &str) -> Result<Vec<PgRow>, ConditionsError> {
        self.check_open(sql)?;
        let future = sqlx::query(sql).fetch(&self.pool).try_collect::<Vec<PgRow>>();
        self.rt
            .block_on(future)
            .map_err(|e| ConditionsError::query(sql, e))
    }

    /// Decodes one row by looking at each column's postgres type, since callers usually
    /// "SELECT *" and so cannot say up front what the types are.
    fn decode_row(sqlx_row: &PgRow) -> Result<Vec<Option<DataType>>, sqlx::Error> {
        let mut row: Vec<Option<DataType>> = Vec::with_capacity(sqlx_row.columns().len());
        for (index, col) in sqlx_row.columns().iter().enumerate() {
            let value_ref = sqlx_row.try_get_raw(index)?;
            if value_ref.is_null() {
                row.push(None);
                continue;
            }
            let type_name = col.type_info().name().to_string();
            let value = match type_name.as_str() {
                "INT2" => DataType::Bigint(i64::from(sqlx_row.try_get::<i16, _>(index)?)),
                "INT4" => DataType::Bigint(i64::from(sqlx_row.try_get::<i32, _>(index)?)),
                "INT8" => DataType::Bigint(sqlx_row.try_get::<i64, _>(index)?),
                "FLOAT4" => DataType::Float(f64::from(sqlx_row.try_get::<f32, _>(index)?)),
                "FLOAT8" => DataType::Float(sqlx_row.try_get::<f64, _>(index)?),
                "BOOL" => DataType::Boolean(sqlx_row.try_get::<bool, _>(index)?),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
                    DataType::String(sqlx_row.try_get::<String, _>(index)?)
                }
                "TIMESTAMP" => DataType::Timestamp(sqlx_row.try_get::<NaiveDateTime, _>(index)?),
                "TIMESTAMPTZ" => DataType::Timestamp(
                    sqlx_row.try_get::<DateTime<Utc>, _>(index)?.naive_utc(),
                ),
                "DATE" => DataType::Timestamp(
                    sqlx_row
                        .try_get::<NaiveDate, _>(index)?
                        .and_time(NaiveTime::default()),
                ),
                _ => {
                    return Err(sqlx::Error::Decode(
                        format!(
                            "Unsupported column type {} for column {}.",
                            type_name,
                            col.name()
                        )
                        .into(),
                    ))
                }
            };
            row.push(Some(value));
        }
        Ok(row)
    }
}

impl Database for PostgreSQLDatabase {
    fn select_query(&self, sql: &str) -> Result<ResultSet, ConditionsError> {
        debug!("{}", sql);
        let pg_rows = self.fetch_rows(sql)?;
        let columns: Vec<String> = match pg_rows.first() {
            Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
            None => Vec::new(),
        };
        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            rows.push(Self::decode_row(pg_row).map_err(|e| ConditionsError::query(sql, e))?);
        }
        debug!("{} rows selected", rows.len());
        Ok(ResultSet::new(columns, rows))
    }

    fn update_query(&self, sql: &str) -> Result<Vec<i64>, ConditionsError> {
        debug!("{}", sql);
        // The statement is prepared, run and released inside sqlx, whichever way this goes.
        let pg_rows = self.fetch_rows(sql)?;
        let mut keys = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let key = match Self::decode_row(pg_row).map_err(|e| ConditionsError::query(sql, e))?
                .into_iter()
                .next()
            {
                Some(Some(DataType::Bigint(key))) => key,
                other => {
                    return Err(ConditionsError::query(
                        sql,
                        format!("Expected an integer generated key but got {:?}.", other),
                    ))
                }
            };
            keys.push(key);
        }
        Ok(keys)
    }

    fn close(&mut self) -> Result<(), ConditionsError> {
        if self.closed {
            warn!("connection {} is already closed!", self.connection_string);
            return Ok(());
        }
        self.rt.block_on(self.pool.close());
        self.closed = true;
        info!("closed connection {}", self.connection_string);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed || self.pool.is_closed()
    }
}
