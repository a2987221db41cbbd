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
use crate::model::conditions_record::{ConditionsRecord, ConditionsRecordCollection};
use crate::model::config::ConditionsConfig;
use crate::model::connection::{ConnectionManager, ConnectionParameters};
use crate::model::converter::{ConverterRegistry, DetectorConditionsConverter};
use crate::model::database::ResultSet;
use crate::model::query_builder::QueryBuilder;
use crate::model::resource_reader::{BaseConditionsReader, ConditionsReader, DetectorDescription};
use crate::model::table_meta_data::{TableMetaData, TableRegistry};
use crate::model::type_registry::TypeRegistry;
use crate::util::Util;
use std::any::{type_name, Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::*;

thread_local! {
    static INSTANCE: RefCell<Option<Rc<DatabaseConditionsManager>>> = RefCell::new(None);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Unconfigured,
    Configured,
    Connected,
}

/// One materialized piece of conditions data and the context it was loaded for.
struct CachedConditions {
    run_number: i32,
    detector_name: Option<String>,
    data: Rc<dyn Any>,
}

/// Entry point to the conditions system.  Holds the configuration (table metadata and converters),
/// the single database connection, and a cache of conditions data for the current detector and
/// run.  Changing either one throws the whole cache away.
///
/// Everything takes `&self`, since converters call back into the manager while it is in the
/// middle of a lookup.  The manager is neither Send nor Sync; one thread owns it.
pub struct DatabaseConditionsManager {
    types: TypeRegistry,
    tables: RefCell<TableRegistry>,
    converters: RefCell<ConverterRegistry>,
    conditions_table_name: RefCell<Option<String>>,
    cache: RefCell<HashMap<(TypeId, String), CachedConditions>>,
    connection: RefCell<ConnectionManager>,
    reader: RefCell<Box<dyn ConditionsReader>>,
    detector_name: RefCell<Option<String>>,
    run_number: Cell<i32>,
    configured: Cell<bool>,
}

impl Default for DatabaseConditionsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseConditionsManager {
    pub fn new() -> DatabaseConditionsManager {
        Self::with_connection(ConnectionManager::new())
    }

    pub fn with_connection(connection: ConnectionManager) -> DatabaseConditionsManager {
        Self::with_parts(
            TypeRegistry::with_defaults(),
            connection,
            Box::new(BaseConditionsReader::new()),
        )
    }

    /// `types` must hold every name the configuration will use.
    pub fn with_parts(
        types: TypeRegistry,
        connection: ConnectionManager,
        reader: Box<dyn ConditionsReader>,
    ) -> DatabaseConditionsManager {
        let mut converters = ConverterRegistry::new();
        converters.register(Rc::new(DetectorConditionsConverter));
        DatabaseConditionsManager {
            types,
            tables: RefCell::new(TableRegistry::new()),
            converters: RefCell::new(converters),
            conditions_table_name: RefCell::new(None),
            cache: RefCell::new(HashMap::new()),
            connection: RefCell::new(connection),
            reader: RefCell::new(reader),
            detector_name: RefCell::new(None),
            run_number: Cell::new(-1),
            configured: Cell::new(false),
        }
    }

    /// Makes `manager` what `instance()` returns on this thread.
    pub fn register(manager: &Rc<DatabaseConditionsManager>) {
        INSTANCE.with(|instance| *instance.borrow_mut() = Some(Rc::clone(manager)));
    }

    pub fn instance() -> Option<Rc<DatabaseConditionsManager>> {
        INSTANCE.with(|instance| instance.borrow().clone())
    }

    /// Loads table metadata and converters.  Replaces any earlier configuration; on error the
    /// earlier configuration stays in place.
    pub fn configure(&self, config: &ConditionsConfig) -> Result<(), ConditionsError> {
        let tables = TableRegistry::load(&config.tables, &self.types)?;
        let mut converters = ConverterRegistry::new();
        converters.register(Rc::new(DetectorConditionsConverter));
        converters.load(&config.converters, &self.types)?;
        let conditions_table_name = converters.resolve_conditions_table(&tables)?;
        info!(
            "configured {} tables and {} converters; conditions validity table is {}",
            tables.len(),
            converters.len(),
            conditions_table_name
        );

        *self.tables.borrow_mut() = tables;
        *self.converters.borrow_mut() = converters;
        *self.conditions_table_name.borrow_mut() = Some(conditions_table_name);
        self.cache.borrow_mut().clear();
        self.configured.set(true);
        Ok(())
    }

    pub fn configure_from_str(&self, xml: &str) -> Result<(), ConditionsError> {
        self.configure(&ConditionsConfig::parse(xml)?)
    }

    pub fn configure_from_file(&self, path: &Path) -> Result<(), ConditionsError> {
        self.configure(&ConditionsConfig::from_file(path)?)
    }

    pub fn configure_from_resource(&self, name: &str) -> Result<(), ConditionsError> {
        debug!("configuring from resource {}", name);
        self.configure(&ConditionsConfig::from_resource(name)?)
    }

    pub fn was_configured(&self) -> bool {
        self.configured.get()
    }

    pub fn state(&self) -> ManagerState {
        if self.is_connected() {
            ManagerState::Connected
        } else if self.was_configured() {
            ManagerState::Configured
        } else {
            ManagerState::Unconfigured
        }
    }

    /// Switches to a new detector and run.  Makes sure the connection is open, points the base
    /// reader at the detector, and empties the cache.  Nothing changes if the open fails.
    pub fn set_detector(&self, detector_name: &str, run_number: i32) -> Result<(), ConditionsError> {
        debug!("set detector {}", detector_name);
        debug!("set run number {}", run_number);
        if !self.has_connection_parameters() {
            return Err(ConditionsError::ConditionsNotFound(format!(
                "No connection parameters were set, so conditions for detector {} and run {} cannot be loaded.",
                detector_name, run_number
            )));
        }
        if self.is_connected() {
            debug!(
                "using existing connection {}",
                self.connection_string().unwrap_or_default()
            );
        } else {
            self.open_connection()?;
        }
        self.reader.borrow_mut().set_resource_path(detector_name);

        let dropped = {
            let mut cache = self.cache.borrow_mut();
            let count = cache.len();
            cache.clear();
            count
        };
        debug!("cleared {} cached conditions", dropped);
        *self.detector_name.borrow_mut() = Some(detector_name.to_string());
        self.run_number.set(run_number);
        Ok(())
    }

    /// -1 until a run has been set.
    pub fn run_number(&self) -> i32 {
        self.run_number.get()
    }

    pub fn detector_name(&self) -> Option<String> {
        self.detector_name.borrow().clone()
    }

    /// Conditions of type `T` called `name`, from the cache or else from the converter registered
    /// for `T`.
    pub fn get_conditions<T: 'static>(&self, name: &str) -> Result<Rc<T>, ConditionsError> {
        debug!("getting conditions {} of type {}", name, type_name::<T>());
        let key = (TypeId::of::<T>(), name.to_string());
        let cached = self.cache.borrow().get(&key).map(|entry| entry.data.clone());
        if let Some(data) = cached {
            if let Ok(data) = data.downcast::<T>() {
                return Ok(data);
            }
        }

        let converter = self.converters.borrow().find(TypeId::of::<T>()).ok_or_else(|| {
            ConditionsError::ConditionsNotFound(format!(
                "No converter is registered for {}.",
                type_name::<T>()
            ))
        })?;
        // The registry borrow is released; the converter may come back for other conditions.
        let data = converter.get_any(self, name)?;
        let typed = data.clone().downcast::<T>().map_err(|_| {
            ConditionsError::configuration(format!(
                "The converter for {} returned {} instead.",
                type_name::<T>(),
                converter.output_type_name()
            ))
        })?;
        self.cache.borrow_mut().insert(
            key,
            CachedConditions {
                run_number: self.run_number(),
                detector_name: self.detector_name(),
                data,
            },
        );
        Ok(typed)
    }

    /// Number of cached entries loaded for the current detector and run.
    pub fn cached_count(&self) -> usize {
        let detector_name = self.detector_name();
        self.cache
            .borrow()
            .values()
            .filter(|c| c.run_number == self.run_number() && c.detector_name == detector_name)
            .count()
    }

    pub fn get_detector_object(&self) -> Result<Rc<DetectorDescription>, ConditionsError> {
        self.get_conditions::<DetectorDescription>(Util::COMPACT_XML)
    }

    /// Every conditions record with this name, in table order.  An empty collection when nothing
    /// matches.
    pub fn find_conditions_records(
        &self,
        name: &str,
    ) -> Result<ConditionsRecordCollection, ConditionsError> {
        let table_name = self.conditions_table_name().ok_or_else(|| {
            ConditionsError::configuration("The conditions manager was not configured.")
        })?;
        let all = self.get_conditions::<ConditionsRecordCollection>(&table_name)?;
        let found = all.find_by_name(name);
        debug!(
            "found {} of {} conditions records named {}",
            found.len(),
            all.len(),
            name
        );
        Ok(found)
    }

    pub fn conditions_table_name(&self) -> Option<String> {
        self.conditions_table_name.borrow().clone()
    }

    pub fn find_table_meta_data(&self, table_name: &str) -> Option<TableMetaData> {
        self.tables.borrow().find_by_table_name(table_name).cloned()
    }

    pub fn find_table_meta_data_by_collection(&self, collection_type: TypeId) -> Option<TableMetaData> {
        self.tables
            .borrow()
            .find_by_collection_type(collection_type)
            .cloned()
    }

    pub fn table_meta_data_list(&self) -> Vec<TableMetaData> {
        self.tables.borrow().list().to_vec()
    }

    fn require_table(&self, table_name: &str) -> Result<TableMetaData, ConditionsError> {
        self.find_table_meta_data(table_name).ok_or_else(|| {
            ConditionsError::configuration(format!("There is no meta data for table {}.", table_name))
        })
    }

    /// One past the highest collection id in the table, or 1 if the table has no rows.  Needs an
    /// open connection, as do all the queries here.
    pub fn next_collection_id(&self, table_name: &str) -> Result<i64, ConditionsError> {
        let meta = self.require_table(table_name)?;
        let sql = QueryBuilder::build_max_collection_id(meta.table_name());
        let result = self.select_query(&sql)?;
        let collection_id = match result.single_value() {
            Some(value) => value.as_i64().ok_or_else(|| {
                ConditionsError::query(&sql, format!("unexpected collection id {}", value))
            })?,
            None => {
                debug!("table {} has no collections yet", table_name);
                1
            }
        };
        debug!(
            "new collection id {} created for table {}",
            collection_id, table_name
        );
        Ok(collection_id)
    }

    pub fn collection_id_exists(&self, table_name: &str, collection_id: i64) -> Result<bool, ConditionsError> {
        let meta = self.require_table(table_name)?;
        let sql = QueryBuilder::build_collection_id_count(meta.table_name(), collection_id);
        let result = self.select_query(&sql)?;
        let count = result.single_value().and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(count > 0)
    }

    /// Inserts a conditions record and returns its new id.  Cached records are dropped so the
    /// next lookup sees it.
    pub fn add_conditions_record(&self, record: &ConditionsRecord) -> Result<i64, ConditionsError> {
        let table_name = self.conditions_table_name().ok_or_else(|| {
            ConditionsError::configuration("The conditions manager was not configured.")
        })?;
        let meta = self.require_table(&table_name)?;
        let sql = QueryBuilder::build_conditions_record_insert(meta.table_name(), meta.key(), record);
        let id = self.update_query(&sql)?.first().copied().ok_or_else(|| {
            ConditionsError::query(&sql, "the insert returned no generated key")
        })?;
        self.cache
            .borrow_mut()
            .retain(|(type_id, _), _| *type_id != TypeId::of::<ConditionsRecordCollection>());
        info!("added conditions record {} for {}", id, record.name);
        Ok(id)
    }

    pub fn open_connection(&self) -> Result<bool, ConditionsError> {
        self.connection.borrow_mut().open_connection()
    }

    /// See ConnectionManager::close_connection.
    pub fn close_connection(&self, opened_here: bool) -> Result<bool, ConditionsError> {
        self.connection.borrow_mut().close_connection(opened_here)
    }

    pub fn force_close_connection(&self) -> Result<bool, ConditionsError> {
        self.connection.borrow_mut().force_close_connection()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.borrow().is_connected()
    }

    pub fn has_connection_parameters(&self) -> bool {
        self.connection.borrow().has_parameters()
    }

    pub fn connection_string(&self) -> Option<String> {
        self.connection
            .borrow()
            .parameters()
            .map(|p| p.connection_string())
    }

    pub fn set_connection_parameters(&self, parameters: ConnectionParameters) {
        debug!("using connection {}", parameters.connection_string());
        self.connection.borrow_mut().set_parameters(parameters);
    }

    pub fn set_connection_properties(&self, path: &Path) -> Result<(), ConditionsError> {
        self.set_connection_parameters(ConnectionParameters::from_properties(path)?);
        Ok(())
    }

    pub fn set_connection_resource(&self, name: &str) -> Result<(), ConditionsError> {
        self.set_connection_parameters(ConnectionParameters::from_resource(name)?);
        Ok(())
    }

    pub fn select_query(&self, sql: &str) -> Result<ResultSet, ConditionsError> {
        self.connection.borrow().select_query(sql)
    }

    pub fn update_query(&self, sql: &str) -> Result<Vec<i64>, ConditionsError> {
        self.connection.borrow().update_query(sql)
    }

    /// Replaces the reader for non-database conditions, keeping the current detector as its path.
    pub fn set_base_conditions_reader(&self, mut reader: Box<dyn ConditionsReader>) {
        if let Some(detector_name) = self.detector_name() {
            reader.set_resource_path(&detector_name);
        }
        *self.reader.borrow_mut() = reader;
    }

    pub fn open_resource(&self, name: &str) -> Result<String, ConditionsError> {
        self.reader.borrow().open(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::conditions_object::{ConditionsObject, FieldValues, ObjectCollection};
    use crate::model::converter::DatabaseConditionsConverter;
    use crate::model::database_test_utils::*;
    use crate::model::ecal::EcalGainCollection;

    #[derive(Debug, Clone, PartialEq)]
    struct Gain {
        id: i64,
        channel: i32,
        value: f64,
    }

    impl ConditionsObject for Gain {
        fn from_fields(fields: &FieldValues<'_>) -> Result<Self, ConditionsError> {
            Ok(Gain {
                id: fields.row_id()?,
                channel: fields.get_i32("channel")?,
                value: fields.get_f64("value")?,
            })
        }

        fn row_id(&self) -> i64 {
            self.id
        }
    }

    type GainCollection = ObjectCollection<Gain>;

    const GAINS_CONFIG: &str = r#"<conditions>
  <tables>
    <table name="conditions" key="id">
      <classes>
        <object class="ConditionsRecord"/>
        <collection class="ConditionsRecordCollection"/>
      </classes>
      <fields>
        <field name="run_start"/>
        <field name="run_end"/>
        <field name="name"/>
        <field name="table_name"/>
        <field name="collection_id"/>
      </fields>
    </table>
    <table name="gains" key="id">
      <classes>
        <object class="Gain"/>
        <collection class="GainCollection"/>
      </classes>
      <fields>
        <field name="channel"/>
        <field name="value"/>
      </fields>
    </table>
  </tables>
  <converters>
    <converter class="ConditionsRecordConverter"/>
    <converter class="GainConverter"/>
  </converters>
</conditions>"#;

    fn gains_manager(db: &MockDatabase) -> DatabaseConditionsManager {
        let mut types = TypeRegistry::with_defaults();
        types.register_object::<Gain>("Gain");
        types.register_collection::<GainCollection>("GainCollection");
        types.register_converter::<DatabaseConditionsConverter<GainCollection>>("GainConverter");
        let manager = DatabaseConditionsManager::with_parts(
            types,
            db.connection_manager(),
            Box::new(BaseConditionsReader::new()),
        );
        manager.configure_from_str(GAINS_CONFIG).unwrap();
        manager
    }

    fn gain_rows(rows: &[(i64, i64, f64)]) -> ResultSet {
        result_set(
            &["id", "channel", "value", "collection_id"],
            rows.iter()
                .map(|(id, channel, value)| vec![int(*id), int(*channel), float(*value), int(1)])
                .collect(),
        )
    }

    #[test]
    fn gains_are_cached_per_run() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        db.on_select(
            "SELECT * FROM conditions ORDER BY id",
            conditions_records(&[(1, 0, 100, "gains", "gains", 1), (2, 101, 200, "gains", "gains", 2)]),
        );
        db.on_select(
            "SELECT * FROM gains WHERE collection_id = 1",
            gain_rows(&[(1, 1, 0.5), (2, 2, 0.75)]),
        );
        db.on_select(
            "SELECT * FROM gains WHERE collection_id = 2",
            gain_rows(&[(3, 1, 0.6)]),
        );
        let manager = gains_manager(&db);
        assert_eq!(manager.state(), ManagerState::Configured);

        manager.set_detector("X", 100).unwrap();
        assert_eq!(manager.state(), ManagerState::Connected);
        let gains = manager.get_conditions::<GainCollection>("gains").unwrap();
        assert_eq!(gains.len(), 2);
        assert_eq!(gains.objects()[1].value, 0.75);
        let again = manager.get_conditions::<GainCollection>("gains").unwrap();
        assert!(Rc::ptr_eq(&gains, &again));
        assert_eq!(db.count_of("SELECT * FROM gains WHERE collection_id = 1"), 1);
        assert_eq!(manager.cached_count(), 2);

        manager.set_detector("X", 101).unwrap();
        assert_eq!(manager.cached_count(), 0);
        let gains = manager.get_conditions::<GainCollection>("gains").unwrap();
        assert_eq!(gains.collection_id(), Some(2));
        assert_eq!(gains.objects()[0].value, 0.6);
        assert_eq!(db.count_of("SELECT * FROM gains WHERE collection_id = 2"), 1);
        assert_eq!(db.count_of("SELECT * FROM conditions ORDER BY id"), 2);
    }

    #[test]
    fn same_run_again_still_invalidates() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        db.on_select(
            "SELECT * FROM conditions ORDER BY id",
            conditions_records(&[(1, 0, 100, "gains", "gains", 1)]),
        );
        db.on_select("SELECT * FROM gains WHERE collection_id = 1", gain_rows(&[(1, 1, 0.5)]));
        let manager = gains_manager(&db);
        manager.set_detector("X", 100).unwrap();
        manager.get_conditions::<GainCollection>("gains").unwrap();
        manager.set_detector("X", 100).unwrap();
        manager.get_conditions::<GainCollection>("gains").unwrap();
        assert_eq!(db.count_of("SELECT * FROM gains WHERE collection_id = 1"), 2);
    }

    #[test]
    fn failed_select_is_reported_and_not_cached() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        db.on_select(
            "SELECT * FROM conditions ORDER BY id",
            conditions_records(&[(1, 0, 100, "gains", "gains", 1)]),
        );
        db.on_select("SELECT * FROM gains WHERE collection_id = 1", gain_rows(&[(1, 1, 0.5)]));
        db.fail_on("SELECT * FROM gains WHERE collection_id = 1");
        let manager = gains_manager(&db);
        manager.set_detector("X", 50).unwrap();

        match manager.get_conditions::<GainCollection>("gains") {
            Err(ConditionsError::Query { sql, .. }) => {
                assert_eq!(sql, "SELECT * FROM gains WHERE collection_id = 1")
            }
            other => panic!("unexpected: {:?}", other.map(|g| g.len())),
        }
        // Only the conditions records made it into the cache.
        assert_eq!(manager.cached_count(), 1);
        assert!(manager.get_conditions::<GainCollection>("gains").is_err());
        assert_eq!(db.count_of("SELECT * FROM gains WHERE collection_id = 1"), 2);
    }

    fn unreachable_server(
        parameters: &ConnectionParameters,
    ) -> Result<Box<dyn crate::model::database::Database>, ConditionsError> {
        Err(ConditionsError::configuration(format!(
            "cannot reach {}",
            parameters.hostname()
        )))
    }

    #[test]
    fn failed_open_leaves_detector_unchanged() {
        Util::initialize_tracing();
        let manager = DatabaseConditionsManager::with_connection(ConnectionManager::with_connector(
            Box::new(unreachable_server),
        ));
        manager.set_connection_parameters(MockDatabase::parameters());
        assert!(matches!(
            manager.set_detector("HPS-TestRun-v5", 100),
            Err(ConditionsError::Configuration(m)) if m.contains("localhost")
        ));
        assert!(manager.detector_name().is_none());
        assert_eq!(manager.run_number(), -1);
        assert!(manager.reader.borrow().resource_path().is_none());
        assert!(manager.get_detector_object().is_err());
    }

    #[test]
    fn configuration_without_record_converter_fails() {
        Util::initialize_tracing();
        let manager = DatabaseConditionsManager::with_connection(MockDatabase::new().connection_manager());
        let xml = TEST_CONFIG.replace(r#"<converter class="ConditionsRecordConverter"/>"#, "");
        assert!(matches!(
            manager.configure_from_str(&xml),
            Err(ConditionsError::Configuration(m)) if m.contains("ConditionsRecordCollection")
        ));
        assert!(!manager.was_configured());
        assert_eq!(manager.state(), ManagerState::Unconfigured);
        assert!(manager.conditions_table_name().is_none());
    }

    #[test]
    fn reconfiguring_replaces_everything() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        let manager = configured_manager(&db);
        assert!(manager.find_table_meta_data("ecal_gains").is_some());
        assert_eq!(manager.table_meta_data_list().len(), 3);

        let gains_only = gains_manager(&db);
        assert!(gains_only.find_table_meta_data("ecal_gains").is_none());

        manager
            .configure_from_resource(Util::DEFAULT_CONFIG_RESOURCE)
            .unwrap();
        assert_eq!(manager.table_meta_data_list().len(), 4);
        assert!(manager.find_table_meta_data("ecal_bad_channels").is_some());
        assert_eq!(manager.conditions_table_name().as_deref(), Some("conditions"));
        assert_eq!(
            manager
                .find_table_meta_data_by_collection(TypeId::of::<EcalGainCollection>())
                .map(|t| t.table_name().to_string()),
            Some("ecal_gains".to_string())
        );

        // A failed configure leaves the previous one in place.
        assert!(manager.configure_from_str("<conditions><tables/></conditions>").is_err());
        assert_eq!(manager.table_meta_data_list().len(), 4);
    }

    #[test]
    fn next_collection_id_is_max_plus_one() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        let manager = configured_manager(&db);
        manager.open_connection().unwrap();
        // Existing ids {1, 2, 4}.
        db.on_select(
            "SELECT MAX(collection_id)+1 FROM ecal_gains",
            result_set(&["?column?"], vec![vec![int(5)]]),
        );
        assert_eq!(manager.next_collection_id("ecal_gains").unwrap(), 5);

        db.on_select(
            "SELECT MAX(collection_id)+1 FROM ecal_calibrations",
            result_set(&["?column?"], vec![vec![null()]]),
        );
        assert_eq!(manager.next_collection_id("ecal_calibrations").unwrap(), 1);
    }

    #[test]
    fn next_collection_id_of_unknown_table_fails_before_querying() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        let manager = configured_manager(&db);
        assert!(matches!(
            manager.next_collection_id("svt_gains"),
            Err(ConditionsError::Configuration(m)) if m.contains("svt_gains")
        ));
        assert!(db.queries().is_empty());
    }

    #[test]
    fn collection_id_exists_counts_rows() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        let manager = configured_manager(&db);
        manager.open_connection().unwrap();
        db.on_select(
            "SELECT COUNT(*) FROM ecal_gains WHERE collection_id = 2",
            result_set(&["count"], vec![vec![int(3)]]),
        );
        db.on_select(
            "SELECT COUNT(*) FROM ecal_gains WHERE collection_id = 9",
            result_set(&["count"], vec![vec![int(0)]]),
        );
        assert!(manager.collection_id_exists("ecal_gains", 2).unwrap());
        assert!(!manager.collection_id_exists("ecal_gains", 9).unwrap());
    }

    #[test]
    fn set_detector_needs_connection_parameters() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        let mut connection = db.connection_manager();
        connection.force_close_connection().unwrap();
        let manager = DatabaseConditionsManager::with_connection(connection);
        manager.configure(&test_config()).unwrap();
        assert!(!manager.has_connection_parameters());
        assert!(matches!(
            manager.set_detector("X", 100),
            Err(ConditionsError::ConditionsNotFound(_))
        ));
        assert_eq!(manager.run_number(), -1);
        assert!(manager.detector_name().is_none());
    }

    #[test]
    fn records_are_filtered_by_name_in_order() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        db.on_select(
            "SELECT * FROM conditions ORDER BY id",
            conditions_records(&[
                (1, 0, 100, "ecal_gains", "ecal_gains", 1),
                (2, 0, 100, "ecal_calibrations", "ecal_calibrations", 1),
                (3, 50, 150, "ecal_gains", "ecal_gains", 2),
            ]),
        );
        let manager = configured_manager(&db);
        manager.set_detector("X", 60).unwrap();
        let found = manager.find_conditions_records("ecal_gains").unwrap();
        let ids: Vec<i64> = found.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(manager.find_conditions_records("svt_gains").unwrap().is_empty());
        assert_eq!(db.count_of("SELECT * FROM conditions ORDER BY id"), 1);
    }

    #[test]
    fn detector_description_comes_from_the_base_reader() {
        Util::initialize_tracing();
        let manager = configured_manager(&MockDatabase::new());
        manager.set_detector("HPS-TestRun-v5", 0).unwrap();
        let detector = manager.get_detector_object().unwrap();
        assert_eq!(detector.name(), "HPS-TestRun-v5");
        assert!(detector.compact_xml().contains("<lccdd"));
        assert!(Rc::ptr_eq(&detector, &manager.get_detector_object().unwrap()));
    }

    #[test]
    fn conditions_without_converter_are_not_found() {
        Util::initialize_tracing();
        let manager = configured_manager(&MockDatabase::new());
        assert!(matches!(
            manager.get_conditions::<GainCollection>("gains"),
            Err(ConditionsError::ConditionsNotFound(_))
        ));
    }

    #[test]
    fn added_record_is_visible_to_next_lookup() {
        Util::initialize_tracing();
        let db = MockDatabase::new();
        db.on_select(
            "SELECT * FROM conditions ORDER BY id",
            conditions_records(&[(1, 0, 100, "ecal_gains", "ecal_gains", 1)]),
        );
        db.on_update("INSERT INTO conditions", vec![2]);
        let manager = configured_manager(&db);
        manager.set_detector("X", 10).unwrap();
        assert_eq!(manager.find_conditions_records("ecal_gains").unwrap().len(), 1);

        let record = ConditionsRecord {
            id: 0,
            run_start: 0,
            run_end: 100,
            name: "ecal_gains".to_string(),
            table_name: "ecal_gains".to_string(),
            collection_id: 2,
            tag: None,
            created_by: Some("tester".to_string()),
            notes: None,
        };
        assert_eq!(manager.add_conditions_record(&record).unwrap(), 2);
        manager.find_conditions_records("ecal_gains").unwrap();
        assert_eq!(db.count_of("SELECT * FROM conditions ORDER BY id"), 2);
        assert!(manager.is_connected());
    }

    #[test]
    fn registered_instance_is_shared_on_this_thread() {
        let manager = Rc::new(DatabaseConditionsManager::new());
        DatabaseConditionsManager::register(&manager);
        let instance = DatabaseConditionsManager::instance().unwrap();
        assert!(Rc::ptr_eq(&manager, &instance));
    }
}
