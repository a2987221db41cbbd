/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use chrono::NaiveDateTime;
use std::fmt;

/// The relational boundary the conditions layer talks through.  Everything above it issues plain
/// SQL text; implementations block the calling thread for the round trip.
pub trait Database {
    /// Executes a read query and returns every row.
    fn select_query(&self, sql: &str) -> Result<ResultSet, ConditionsError>;

    /// Executes an INSERT, UPDATE or DELETE.  Returns the generated keys in insertion order, which
    /// for postgres means the values of the first column of a "RETURNING" clause (empty if the
    /// statement has none).
    fn update_query(&self, sql: &str) -> Result<Vec<i64>, ConditionsError>;

    fn close(&mut self) -> Result<(), ConditionsError>;

    fn is_closed(&self) -> bool;
}

/// One decoded column value.  SQL NULL is represented as `None` around this, not as a variant.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Bigint(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl DataType {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataType::Bigint(x) => Some(*x),
            _ => None,
        }
    }

    /// Integers widen to f64 so that a column declared integer in one table and double in another
    /// can still feed a float field.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataType::Float(x) => Some(*x),
            DataType::Bigint(x) => Some(*x as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataType::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bigint(x) => write!(f, "{}", x),
            DataType::Float(x) => write!(f, "{}", x),
            DataType::String(s) => write!(f, "{}", s),
            DataType::Boolean(b) => write!(f, "{}", b),
            DataType::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// The rows of a SELECT, with the column names in select order.  When no rows came back the
/// column list may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<DataType>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<DataType>>>) -> ResultSet {
        ResultSet { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names are compared case-insensitively, as postgres folds unquoted identifiers.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&DataType> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_ref()
    }

    /// The first column of the first row, for aggregate queries like MAX or COUNT.  `None` if there
    /// are no rows or the value is NULL.
    pub fn single_value(&self) -> Option<&DataType> {
        self.rows.first()?.first()?.as_ref()
    }
}
