/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use crate::model::database::{DataType, ResultSet};

/// A persistable row of a conditions table.  Implementations pick their own fields out of the
/// selected row by column name.
pub trait ConditionsObject: Sized + 'static {
    fn from_fields(fields: &FieldValues<'_>) -> Result<Self, ConditionsError>;

    /// The value of the table's key column for this row.
    fn row_id(&self) -> i64;
}

/// A batch of conditions rows sharing one collection id.
pub trait ConditionsObjectCollection: Default + 'static {
    type Object: ConditionsObject;

    fn objects(&self) -> &[Self::Object];

    fn add(&mut self, object: Self::Object);

    fn collection_id(&self) -> Option<i64>;

    fn set_collection_id(&mut self, collection_id: i64);

    fn len(&self) -> usize {
        self.objects().len()
    }

    fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    fn iter(&self) -> std::slice::Iter<'_, Self::Object> {
        self.objects().iter()
    }
}

/// The collection type used for every table shipped here; a table with needs beyond an ordered
/// list can implement ConditionsObjectCollection itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCollection<T> {
    objects: Vec<T>,
    collection_id: Option<i64>,
}

impl<T> Default for ObjectCollection<T> {
    fn default() -> Self {
        ObjectCollection {
            objects: Vec::new(),
            collection_id: None,
        }
    }
}

impl<T: ConditionsObject> ObjectCollection<T> {
    pub fn new() -> ObjectCollection<T> {
        ObjectCollection::default()
    }

    pub fn find_by_row_id(&self, row_id: i64) -> Option<&T> {
        self.objects.iter().find(|o| o.row_id() == row_id)
    }
}

impl<T: ConditionsObject> ConditionsObjectCollection for ObjectCollection<T> {
    type Object = T;

    fn objects(&self) -> &[T] {
        &self.objects
    }

    fn add(&mut self, object: T) {
        self.objects.push(object);
    }

    fn collection_id(&self) -> Option<i64> {
        self.collection_id
    }

    fn set_collection_id(&mut self, collection_id: i64) {
        self.collection_id = Some(collection_id);
    }
}

impl<T: ConditionsObject> FromIterator<T> for ObjectCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ObjectCollection {
            objects: iter.into_iter().collect(),
            collection_id: None,
        }
    }
}

/// One selected row, viewed by column name.  The typed getters fail with a configuration error,
/// since a missing column or wrong type means the XML and the database schema disagree.
pub struct FieldValues<'a> {
    table_name: &'a str,
    key: &'a str,
    result: &'a ResultSet,
    row: usize,
}

impl<'a> FieldValues<'a> {
    pub fn new(table_name: &'a str, key: &'a str, result: &'a ResultSet, row: usize) -> FieldValues<'a> {
        FieldValues {
            table_name,
            key,
            result,
            row,
        }
    }

    pub fn table_name(&self) -> &str {
        self.table_name
    }

    /// `Ok(None)` for SQL NULL, an error if the column is not there at all.
    pub fn get(&self, field: &str) -> Result<Option<&'a DataType>, ConditionsError> {
        let index = self.result.column_index(field).ok_or_else(|| {
            ConditionsError::configuration(format!(
                "The field {} does not exist in table {}.",
                field, self.table_name
            ))
        })?;
        Ok(self
            .result
            .rows
            .get(self.row)
            .and_then(|r| r.get(index))
            .and_then(|v| v.as_ref()))
    }

    fn required(&self, field: &str) -> Result<&'a DataType, ConditionsError> {
        self.get(field)?.ok_or_else(|| {
            ConditionsError::configuration(format!(
                "The field {} in table {} is null.",
                field, self.table_name
            ))
        })
    }

    fn wrong_type(&self, field: &str, expected: &str, got: &DataType) -> ConditionsError {
        ConditionsError::configuration(format!(
            "The field {} in table {} should be {} but is {:?}.",
            field, self.table_name, expected, got
        ))
    }

    pub fn get_i64(&self, field: &str) -> Result<i64, ConditionsError> {
        let value = self.required(field)?;
        value
            .as_i64()
            .ok_or_else(|| self.wrong_type(field, "an integer", value))
    }

    pub fn get_i32(&self, field: &str) -> Result<i32, ConditionsError> {
        let value = self.get_i64(field)?;
        i32::try_from(value).map_err(|_| {
            ConditionsError::configuration(format!(
                "The field {} in table {} is out of range: {}",
                field, self.table_name, value
            ))
        })
    }

    pub fn get_f64(&self, field: &str) -> Result<f64, ConditionsError> {
        let value = self.required(field)?;
        value
            .as_f64()
            .ok_or_else(|| self.wrong_type(field, "a number", value))
    }

    pub fn get_string(&self, field: &str) -> Result<String, ConditionsError> {
        let value = self.required(field)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.wrong_type(field, "text", value))
    }

    /// For nullable text columns.  Non-text values are rendered rather than rejected.
    pub fn get_optional_string(&self, field: &str) -> Result<Option<String>, ConditionsError> {
        Ok(self.get(field)?.map(|v| v.to_string()))
    }

    /// The table's key column, as configured.
    pub fn row_id(&self) -> Result<i64, ConditionsError> {
        self.get_i64(self.key)
    }
}
