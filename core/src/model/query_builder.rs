/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use crate::model::conditions_record::ConditionsRecord;
use crate::util::Util;

/// SQL text for the few statement shapes the conditions layer needs.  Table and column names come
/// from the configuration and are used as is; values are always quoted.
pub struct QueryBuilder {}

impl QueryBuilder {
    /// Doubles single quotes so the value can sit inside a SQL string literal.
    pub fn escape(value: &str) -> String {
        value.replace('\'', "''")
    }

    fn literal(value: &str) -> String {
        format!("'{}'", Self::escape(value))
    }

    fn optional_literal(value: Option<&str>) -> String {
        match value {
            Some(v) => Self::literal(v),
            None => "NULL".to_string(),
        }
    }

    pub fn build_select_all_ordered(table_name: &str, order_by: &str) -> String {
        format!("SELECT * FROM {} ORDER BY {}", table_name, order_by)
    }

    pub fn build_select_by_collection_id(table_name: &str, collection_id: i64) -> String {
        format!(
            "SELECT * FROM {} WHERE {} = {}",
            table_name,
            Util::COLLECTION_ID_COLUMN,
            collection_id
        )
    }

    pub fn build_max_collection_id(table_name: &str) -> String {
        format!(
            "SELECT MAX({})+1 FROM {}",
            Util::COLLECTION_ID_COLUMN,
            table_name
        )
    }

    pub fn build_collection_id_count(table_name: &str, collection_id: i64) -> String {
        format!(
            "SELECT COUNT(*) FROM {} WHERE {} = {}",
            table_name,
            Util::COLLECTION_ID_COLUMN,
            collection_id
        )
    }

    /// One multi-row INSERT of `rows` under `collection_id`, returning the generated keys.  Every
    /// row must have one value per column.
    pub fn build_insert(
        table_name: &str,
        key: &str,
        collection_id: i64,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<String, ConditionsError> {
        if columns.is_empty() {
            return Err(ConditionsError::configuration(format!(
                "No columns given for an insert into {}.",
                table_name
            )));
        }
        if rows.is_empty() {
            return Err(ConditionsError::configuration(format!(
                "No rows given for an insert into {}.",
                table_name
            )));
        }
        let mut values: Vec<String> = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ConditionsError::configuration(format!(
                    "Row {} has {} values but there are {} columns.",
                    i + 1,
                    row.len(),
                    columns.len()
                )));
            }
            let quoted: Vec<String> = row.iter().map(|v| Self::literal(v)).collect();
            values.push(format!("({}, {})", collection_id, quoted.join(", ")));
        }
        Ok(format!(
            "INSERT INTO {} ({}, {}) VALUES {} RETURNING {}",
            table_name,
            Util::COLLECTION_ID_COLUMN,
            columns.join(", "),
            values.join(", "),
            key
        ))
    }

    pub fn build_conditions_record_insert(
        table_name: &str,
        key: &str,
        record: &ConditionsRecord,
    ) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({}, {}, {}, {}, {}, {}, {}, {}) RETURNING {}",
            table_name,
            ConditionsRecord::FIELDS.join(", "),
            record.run_start,
            record.run_end,
            Self::literal(&record.name),
            Self::literal(&record.table_name),
            record.collection_id,
            Self::optional_literal(record.tag.as_deref()),
            Self::optional_literal(record.created_by.as_deref()),
            Self::optional_literal(record.notes.as_deref()),
            key
        )
    }
}
