/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
//! A scripted stand-in for the conditions database, so the cache and converters can be tested
//! without a postgres server.  Clones share state, so a test keeps one handle to inspect the SQL
//! while the manager owns another.
use crate::controllers::database_conditions_manager::DatabaseConditionsManager;
use crate::error::ConditionsError;
use crate::model::config::ConditionsConfig;
use crate::model::connection::{ConnectionManager, ConnectionParameters};
use crate::model::database::{DataType, Database, ResultSet};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Default)]
struct MockState {
    selects: HashMap<String, ResultSet>,
    updates: HashMap<String, Vec<i64>>,
    failures: Vec<String>,
    queries: Vec<String>,
    closed: bool,
    close_fails: bool,
}

#[derive(Clone, Default)]
pub struct MockDatabase {
    state: Rc<RefCell<MockState>>,
}

impl MockDatabase {
    pub fn new() -> MockDatabase {
        MockDatabase::default()
    }

    /// A ConnectionManager whose connector hands out clones of this database, reopened.
    pub fn connection_manager(&self) -> ConnectionManager {
        let db = self.clone();
        let mut manager = ConnectionManager::with_connector(Box::new(
            move |_: &ConnectionParameters| {
                db.state.borrow_mut().closed = false;
                Ok(Box::new(db.clone()) as Box<dyn Database>)
            },
        ));
        manager.set_parameters(Self::parameters());
        manager
    }

    pub fn parameters() -> ConnectionParameters {
        ConnectionParameters::new("t1", "x", "hps_conditions_test", "localhost", 5432, "mock")
    }

    /// The exact SQL text that should return `result`.
    pub fn on_select(&self, sql: &str, result: ResultSet) {
        self.state.borrow_mut().selects.insert(sql.to_string(), result);
    }

    /// Any update whose SQL starts with `sql_prefix` returns these keys.
    pub fn on_update(&self, sql_prefix: &str, keys: Vec<i64>) {
        self.state
            .borrow_mut()
            .updates
            .insert(sql_prefix.to_string(), keys);
    }

    pub fn fail_on(&self, sql: &str) {
        self.state.borrow_mut().failures.push(sql.to_string());
    }

    /// Closing still marks the database closed, but reports an error.
    pub fn fail_on_close(&self) {
        self.state.borrow_mut().close_fails = true;
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.borrow().queries.clone()
    }

    pub fn count_of(&self, sql: &str) -> usize {
        self.state
            .borrow()
            .queries
            .iter()
            .filter(|q| q.as_str() == sql)
            .count()
    }

    fn record(&self, sql: &str) -> Result<(), ConditionsError> {
        let mut state = self.state.borrow_mut();
        state.queries.push(sql.to_string());
        if state.failures.iter().any(|f| f == sql) {
            return Err(ConditionsError::query(sql, "scripted failure"));
        }
        Ok(())
    }
}

impl Database for MockDatabase {
    fn select_query(&self, sql: &str) -> Result<ResultSet, ConditionsError> {
        self.record(sql)?;
        self.state
            .borrow()
            .selects
            .get(sql)
            .cloned()
            .ok_or_else(|| ConditionsError::query(sql, "no scripted result for this query"))
    }

    fn update_query(&self, sql: &str) -> Result<Vec<i64>, ConditionsError> {
        self.record(sql)?;
        let state = self.state.borrow();
        let keys = state
            .updates
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, keys)| keys.clone())
            .unwrap_or_default();
        Ok(keys)
    }

    fn close(&mut self) -> Result<(), ConditionsError> {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        if state.close_fails {
            return Err(ConditionsError::Connection {
                connection: "mock".to_string(),
                source: sqlx::Error::PoolClosed,
            });
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

/// Builds a result set from string column names and rows of values.
pub fn result_set(columns: &[&str], rows: Vec<Vec<Option<DataType>>>) -> ResultSet {
    ResultSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

pub fn int(x: i64) -> Option<DataType> {
    Some(DataType::Bigint(x))
}

pub fn float(x: f64) -> Option<DataType> {
    Some(DataType::Float(x))
}

pub fn text(s: &str) -> Option<DataType> {
    Some(DataType::String(s.to_string()))
}

pub fn null() -> Option<DataType> {
    None
}

/// Rows of the conditions record table as (id, run_start, run_end, name, table_name,
/// collection_id).
pub fn conditions_records(records: &[(i64, i64, i64, &str, &str, i64)]) -> ResultSet {
    result_set(
        &[
            "id",
            "run_start",
            "run_end",
            "name",
            "table_name",
            "collection_id",
            "tag",
            "created_by",
            "notes",
        ],
        records
            .iter()
            .map(|(id, run_start, run_end, name, table_name, collection_id)| {
                vec![
                    int(*id),
                    int(*run_start),
                    int(*run_end),
                    text(name),
                    text(table_name),
                    int(*collection_id),
                    null(),
                    text("jeremym"),
                    null(),
                ]
            })
            .collect(),
    )
}

pub const TEST_CONFIG: &str = r#"<conditions>
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
        <field name="tag"/>
        <field name="created_by"/>
        <field name="notes"/>
      </fields>
    </table>
    <table name="ecal_gains" key="id">
      <classes>
        <object class="EcalGain"/>
        <collection class="EcalGainCollection"/>
      </classes>
      <fields>
        <field name="ecal_channel_id"/>
        <field name="gain"/>
      </fields>
    </table>
    <table name="ecal_calibrations" key="id">
      <classes>
        <object class="EcalCalibration"/>
        <collection class="EcalCalibrationCollection"/>
      </classes>
      <fields>
        <field name="ecal_channel_id"/>
        <field name="pedestal"/>
        <field name="noise"/>
      </fields>
    </table>
  </tables>
  <converters>
    <converter class="ConditionsRecordConverter"/>
    <converter class="EcalGainConverter"/>
    <converter class="EcalCalibrationConverter"/>
  </converters>
</conditions>"#;

pub fn test_config() -> ConditionsConfig {
    ConditionsConfig::parse(TEST_CONFIG).unwrap()
}

/// A manager configured with TEST_CONFIG whose connection goes to `db`.
pub fn configured_manager(db: &MockDatabase) -> DatabaseConditionsManager {
    let manager = DatabaseConditionsManager::with_connection(db.connection_manager());
    manager.configure(&test_config()).unwrap();
    manager
}
