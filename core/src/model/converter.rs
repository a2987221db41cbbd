/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::controllers::database_conditions_manager::DatabaseConditionsManager;
use crate::error::ConditionsError;
use crate::model::conditions_object::{ConditionsObject, ConditionsObjectCollection, FieldValues};
use crate::model::conditions_record::{ConditionsRecord, ConditionsRecordCollection};
use crate::model::database::ResultSet;
use crate::model::query_builder::QueryBuilder;
use crate::model::resource_reader::DetectorDescription;
use crate::model::table_meta_data::{TableMetaData, TableRegistry};
use crate::model::type_registry::TypeRegistry;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use tracing::*;

/// Produces one kind of conditions data on a cache miss.
pub trait ConditionsConverter {
    type Output: 'static;

    fn get_data(
        &self,
        manager: &DatabaseConditionsManager,
        name: &str,
    ) -> Result<Self::Output, ConditionsError>;
}

/// The object-safe face of a converter, which is what the registry and the cache hold.
pub trait AnyConverter {
    fn output_type(&self) -> TypeId;

    fn output_type_name(&self) -> &'static str;

    fn get_any(
        &self,
        manager: &DatabaseConditionsManager,
        name: &str,
    ) -> Result<Rc<dyn Any>, ConditionsError>;
}

impl<C: ConditionsConverter> AnyConverter for C {
    fn output_type(&self) -> TypeId {
        TypeId::of::<C::Output>()
    }

    fn output_type_name(&self) -> &'static str {
        type_name::<C::Output>()
    }

    fn get_any(
        &self,
        manager: &DatabaseConditionsManager,
        name: &str,
    ) -> Result<Rc<dyn Any>, ConditionsError> {
        let data = self.get_data(manager, name)?;
        Ok(Rc::new(data))
    }
}

/// Converters by output type.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<TypeId, Rc<dyn AnyConverter>>,
}

impl ConverterRegistry {
    pub fn new() -> ConverterRegistry {
        ConverterRegistry::default()
    }

    /// A later converter for the same output type replaces the earlier one.
    pub fn register(&mut self, converter: Rc<dyn AnyConverter>) {
        let output_type = converter.output_type();
        debug!("registering converter for {}", converter.output_type_name());
        if self.converters.insert(output_type, converter).is_some() {
            debug!("replaced an existing converter for the same type");
        }
    }

    /// Instantiates and registers each named converter, in order.
    pub fn load(&mut self, names: &[String], types: &TypeRegistry) -> Result<(), ConditionsError> {
        for name in names {
            let converter = types.create_converter(name)?;
            self.register(converter);
        }
        Ok(())
    }

    pub fn find(&self, output_type: TypeId) -> Option<Rc<dyn AnyConverter>> {
        self.converters.get(&output_type).cloned()
    }

    pub fn contains(&self, output_type: TypeId) -> bool {
        self.converters.contains_key(&output_type)
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Every configuration needs a converter for the conditions records and a table to read them
    /// from.  Returns the name of that table.
    pub fn resolve_conditions_table(&self, tables: &TableRegistry) -> Result<String, ConditionsError> {
        if !self.contains(TypeId::of::<ConditionsRecordCollection>()) {
            return Err(ConditionsError::configuration(
                "No converter was registered for ConditionsRecordCollection.",
            ));
        }
        tables
            .find_by_collection::<ConditionsRecordCollection>()
            .map(|t| t.table_name().to_string())
            .ok_or_else(|| {
                ConditionsError::configuration(
                    "No table was configured for ConditionsRecordCollection.",
                )
            })
    }
}

fn build_collection<C: ConditionsObjectCollection>(
    meta: &TableMetaData,
    result: &ResultSet,
) -> Result<C, ConditionsError> {
    if !result.is_empty() {
        if let Some(missing) = meta
            .fields()
            .iter()
            .find(|f| result.column_index(f).is_none())
        {
            return Err(ConditionsError::configuration(format!(
                "The configured field {} is not a column of table {}.",
                missing,
                meta.table_name()
            )));
        }
    }
    let mut collection = C::default();
    for row in 0..result.len() {
        let fields = FieldValues::new(meta.table_name(), meta.key(), result, row);
        collection.add(C::Object::from_fields(&fields)?);
    }
    Ok(collection)
}

/// Loads the collection of type `C` that the conditions records select for the current run.
pub struct DatabaseConditionsConverter<C> {
    collection: PhantomData<fn() -> C>,
}

impl<C> DatabaseConditionsConverter<C> {
    pub fn new() -> DatabaseConditionsConverter<C> {
        DatabaseConditionsConverter {
            collection: PhantomData,
        }
    }
}

impl<C> Default for DatabaseConditionsConverter<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ConditionsObjectCollection> DatabaseConditionsConverter<C> {
    fn select_record(
        &self,
        manager: &DatabaseConditionsManager,
        name: &str,
    ) -> Result<ConditionsRecord, ConditionsError> {
        let run_number = manager.run_number();
        let records = manager.find_conditions_records(name)?.find_by_run(run_number);
        if records.len() > 1 {
            warn!(
                "{} conditions records named {} are valid for run {}; using the most recent one",
                records.len(),
                name,
                run_number
            );
        }
        records.latest().cloned().ok_or_else(|| {
            ConditionsError::ConditionsNotFound(format!(
                "No conditions record named {} is valid for run {}.",
                name, run_number
            ))
        })
    }
}

impl<C: ConditionsObjectCollection> ConditionsConverter for DatabaseConditionsConverter<C> {
    type Output = C;

    fn get_data(&self, manager: &DatabaseConditionsManager, name: &str) -> Result<C, ConditionsError> {
        let record = self.select_record(manager, name)?;
        let meta = manager
            .find_table_meta_data(&record.table_name)
            .ok_or_else(|| {
                ConditionsError::configuration(format!(
                    "The conditions record {} refers to the unknown table {}.",
                    record.id, record.table_name
                ))
            })?;
        if meta.collection_type().type_id != TypeId::of::<C>() {
            return Err(ConditionsError::configuration(format!(
                "The table {} holds {}, not {}.",
                meta.table_name(),
                meta.collection_type().name,
                type_name::<C>()
            )));
        }

        let sql = QueryBuilder::build_select_by_collection_id(meta.table_name(), record.collection_id);
        let result = manager.select_query(&sql)?;
        let mut collection: C = build_collection(&meta, &result)?;
        collection.set_collection_id(record.collection_id);
        info!(
            "loaded {} rows of {} from {} with collection id {}",
            collection.len(),
            name,
            meta.table_name(),
            record.collection_id
        );
        Ok(collection)
    }
}

/// Reads the whole conditions record table.  The requested name is ignored; filtering by name is
/// left to the caller.
#[derive(Debug, Default)]
pub struct ConditionsRecordConverter;

impl ConditionsConverter for ConditionsRecordConverter {
    type Output = ConditionsRecordCollection;

    fn get_data(
        &self,
        manager: &DatabaseConditionsManager,
        _name: &str,
    ) -> Result<ConditionsRecordCollection, ConditionsError> {
        let table_name = manager.conditions_table_name().ok_or_else(|| {
            ConditionsError::configuration("The conditions table was not configured.")
        })?;
        let meta = manager.find_table_meta_data(&table_name).ok_or_else(|| {
            ConditionsError::configuration(format!("No metadata for table {}.", table_name))
        })?;
        let sql = QueryBuilder::build_select_all_ordered(meta.table_name(), meta.key());
        let result = manager.select_query(&sql)?;
        let records: ConditionsRecordCollection = build_collection(&meta, &result)?;
        debug!("loaded {} conditions records", records.len());
        Ok(records)
    }
}

/// Loads the detector description through the base resource reader.
#[derive(Debug, Default)]
pub struct DetectorConditionsConverter;

impl ConditionsConverter for DetectorConditionsConverter {
    type Output = DetectorDescription;

    fn get_data(
        &self,
        manager: &DatabaseConditionsManager,
        name: &str,
    ) -> Result<DetectorDescription, ConditionsError> {
        let detector_name = manager.detector_name().ok_or_else(|| {
            ConditionsError::ConditionsNotFound("No detector has been set.".to_string())
        })?;
        let compact_xml = manager.open_resource(name)?;
        Ok(DetectorDescription::new(&detector_name, compact_xml))
    }
}
