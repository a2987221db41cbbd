/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use crate::model::conditions_object::ConditionsObjectCollection;
use crate::model::config::TableDescriptor;
use crate::model::type_registry::{TypeHandle, TypeRegistry};
use std::any::TypeId;
use tracing::*;

/// How one conditions table maps onto its row and collection types.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetaData {
    table_name: String,
    key: String,
    object_type: TypeHandle,
    collection_type: TypeHandle,
    fields: Vec<String>,
}

impl TableMetaData {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Name of the primary key column.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn object_type(&self) -> &TypeHandle {
        &self.object_type
    }

    pub fn collection_type(&self) -> &TypeHandle {
        &self.collection_type
    }

    /// Field names in configuration order; the key and collection_id columns are not included.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }
}

/// Table metadata by table name, built from the `tables` section of the configuration.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: Vec<TableMetaData>,
}

impl TableRegistry {
    pub fn new() -> TableRegistry {
        TableRegistry::default()
    }

    /// Builds a registry from table descriptors.  Nothing is kept on failure, so a bad
    /// configuration never leaves a half-loaded registry behind.
    pub fn load(
        descriptors: &[TableDescriptor],
        types: &TypeRegistry,
    ) -> Result<TableRegistry, ConditionsError> {
        let mut tables: Vec<TableMetaData> = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if tables.iter().any(|t| t.table_name == descriptor.name) {
                return Err(ConditionsError::configuration(format!(
                    "The table {} is defined more than once.",
                    descriptor.name
                )));
            }
            let object_type = types.resolve_object(&descriptor.object_type)?;
            let (collection_type, collection_object) =
                types.resolve_collection(&descriptor.collection_type)?;
            if collection_object != object_type.type_id {
                return Err(ConditionsError::configuration(format!(
                    "The collection {} of table {} does not hold objects of type {}.",
                    descriptor.collection_type, descriptor.name, descriptor.object_type
                )));
            }
            debug!(
                "table {} maps to {} in {}",
                descriptor.name, object_type.rust_name, collection_type.rust_name
            );
            tables.push(TableMetaData {
                table_name: descriptor.name.clone(),
                key: descriptor.key.clone(),
                object_type,
                collection_type,
                fields: descriptor.fields.clone(),
            });
        }
        Ok(TableRegistry { tables })
    }

    pub fn find_by_table_name(&self, name: &str) -> Option<&TableMetaData> {
        self.tables.iter().find(|t| t.table_name == name)
    }

    /// The first table whose collection type matches.  Several tables may share one collection
    /// type; the converters then go through the table name stored in each conditions record.
    pub fn find_by_collection_type(&self, collection_type: TypeId) -> Option<&TableMetaData> {
        self.tables
            .iter()
            .find(|t| t.collection_type.type_id == collection_type)
    }

    pub fn find_by_collection<C: ConditionsObjectCollection>(&self) -> Option<&TableMetaData> {
        self.find_by_collection_type(TypeId::of::<C>())
    }

    pub fn list(&self) -> &[TableMetaData] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
