/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use crate::model::conditions_object::{
    ConditionsObject, ConditionsObjectCollection, FieldValues, ObjectCollection,
};
use std::fmt;

/// Validity metadata for one named set of conditions: which rows (table + collection id) apply to
/// which runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionsRecord {
    pub id: i64,
    pub run_start: i32,
    pub run_end: i32,
    pub name: String,
    pub table_name: String,
    pub collection_id: i64,
    pub tag: Option<String>,
    pub created_by: Option<String>,
    pub notes: Option<String>,
}

impl ConditionsRecord {
    pub const FIELDS: [&'static str; 8] = [
        "run_start",
        "run_end",
        "name",
        "table_name",
        "collection_id",
        "tag",
        "created_by",
        "notes",
    ];

    /// Both ends of the range are inclusive.
    pub fn is_valid_for_run(&self, run_number: i32) -> bool {
        self.run_start <= run_number && run_number <= self.run_end
    }
}

impl ConditionsObject for ConditionsRecord {
    fn from_fields(fields: &FieldValues<'_>) -> Result<Self, ConditionsError> {
        Ok(ConditionsRecord {
            id: fields.row_id()?,
            run_start: fields.get_i32("run_start")?,
            run_end: fields.get_i32("run_end")?,
            name: fields.get_string("name")?,
            table_name: fields.get_string("table_name")?,
            collection_id: fields.get_i64("collection_id")?,
            tag: fields.get_optional_string("tag")?,
            created_by: fields.get_optional_string("created_by")?,
            notes: fields.get_optional_string("notes")?,
        })
    }

    fn row_id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for ConditionsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "id: {}", self.id)?;
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "runStart: {}", self.run_start)?;
        writeln!(f, "runEnd: {}", self.run_end)?;
        writeln!(f, "tableName: {}", self.table_name)?;
        writeln!(f, "collectionId: {}", self.collection_id)?;
        writeln!(f, "tag: {}", self.tag.as_deref().unwrap_or(""))?;
        writeln!(f, "createdBy: {}", self.created_by.as_deref().unwrap_or(""))?;
        write!(f, "notes: {}", self.notes.as_deref().unwrap_or(""))
    }
}

pub type ConditionsRecordCollection = ObjectCollection<ConditionsRecord>;

impl ObjectCollection<ConditionsRecord> {
    /// Every record with exactly this name, in the original order.  Never fails; no match gives an
    /// empty collection.
    pub fn find_by_name(&self, name: &str) -> ConditionsRecordCollection {
        self.iter().filter(|r| r.name == name).cloned().collect()
    }

    pub fn find_by_run(&self, run_number: i32) -> ConditionsRecordCollection {
        self.iter()
            .filter(|r| r.is_valid_for_run(run_number))
            .cloned()
            .collect()
    }

    /// The record to use when several overlap a run: the most recently inserted one, i.e. the
    /// highest row id.
    pub fn latest(&self) -> Option<&ConditionsRecord> {
        self.iter().max_by_key(|r| r.id)
    }
}
