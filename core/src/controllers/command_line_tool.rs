/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
//! The `hps-conditions` command line tool: load a text file of conditions into a table, add a
//! conditions record, or print the records for a name.
use crate::controllers::database_conditions_manager::DatabaseConditionsManager;
use crate::error::ConditionsError;
use crate::model::conditions_object::ConditionsObjectCollection;
use crate::model::conditions_record::{ConditionsRecord, ConditionsRecordCollection};
use crate::model::query_builder::QueryBuilder;
use crate::model::table_meta_data::TableMetaData;
use crate::util::Util;
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tracing::*;

pub fn build_cli() -> Command {
    Command::new("hps-conditions")
        .about("Command line access to the HPS conditions database")
        .arg_required_else_help(true)
        .arg(
            Arg::new("properties")
                .short('p')
                .long("properties")
                .value_parser(value_parser!(PathBuf))
                .help("Connection properties file (default: the embedded development database)"),
        )
        .arg(
            Arg::new("config")
                .short('x')
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Conditions XML configuration file (default: the embedded configuration)"),
        )
        .arg(
            Arg::new("log")
                .short('l')
                .long("log")
                .help("Log level: ERROR, WARN, INFO, DEBUG or TRACE (java.util.logging names work too)"),
        )
        .subcommand(
            Command::new("load")
                .about("Load a set of conditions into the database from a text file")
                .arg(
                    Arg::new("table")
                        .short('t')
                        .required(true)
                        .help("Name of the target table in the database"),
                )
                .arg(
                    Arg::new("file")
                        .short('f')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Input data file: a header line of column names, then one row per line"),
                )
                .arg(
                    Arg::new("collection_id")
                        .short('c')
                        .value_parser(value_parser!(i64))
                        .help("Collection id to use; it must not exist yet (default: the next free id)"),
                ),
        )
        .subcommand(
            Command::new("add")
                .about("Add a conditions record pointing at an existing collection")
                .arg(Arg::new("name").short('n').required(true).help("Conditions name"))
                .arg(Arg::new("table").short('t').required(true).help("Table name"))
                .arg(
                    Arg::new("collection_id")
                        .short('c')
                        .required(true)
                        .value_parser(value_parser!(i64))
                        .help("Collection id"),
                )
                .arg(
                    Arg::new("run_start")
                        .short('s')
                        .required(true)
                        .value_parser(value_parser!(i32))
                        .help("First valid run"),
                )
                .arg(
                    Arg::new("run_end")
                        .short('e')
                        .required(true)
                        .value_parser(value_parser!(i32))
                        .help("Last valid run"),
                )
                .arg(Arg::new("user").short('u').help("Created by (default: the current user)"))
                .arg(Arg::new("notes").short('m').help("Notes"))
                .arg(Arg::new("tag").short('T').help("Tag")),
        )
        .subcommand(
            Command::new("print")
                .about("Print the conditions records with a name")
                .arg(Arg::new("name").short('n').required(true).help("Conditions name"))
                .arg(
                    Arg::new("run")
                        .short('r')
                        .value_parser(value_parser!(i32))
                        .help("Only records valid for this run"),
                ),
        )
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T, ConditionsError> {
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| ConditionsError::configuration(format!("Missing {} argument.", id)))
}

/// Builds and configures a manager from the global options.
pub fn setup_manager(matches: &ArgMatches) -> Result<DatabaseConditionsManager, ConditionsError> {
    let manager = DatabaseConditionsManager::new();
    match matches.get_one::<PathBuf>("config") {
        Some(path) => manager.configure_from_file(path)?,
        None => manager.configure_from_resource(Util::DEFAULT_CONFIG_RESOURCE)?,
    }
    match matches.get_one::<PathBuf>("properties") {
        Some(path) => manager.set_connection_properties(path)?,
        None => manager.set_connection_resource(Util::DEFAULT_CONNECTION_RESOURCE)?,
    }
    Ok(manager)
}

fn require_table(manager: &DatabaseConditionsManager, table_name: &str) -> Result<TableMetaData, ConditionsError> {
    manager.find_table_meta_data(table_name).ok_or_else(|| {
        ConditionsError::configuration(format!("There is no table named {} in the configuration.", table_name))
    })
}

/// Reads a whitespace delimited text file: the first line names the columns and every other
/// non-blank line is a row.
pub fn parse_file(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), ConditionsError> {
    if !path.exists() {
        return Err(ConditionsError::Resource(format!(
            "Input file does not exist: {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;
    let mut lines = text.lines();
    let columns: Vec<String> = match lines.next() {
        Some(header) => header.split_whitespace().map(str::to_string).collect(),
        None => Vec::new(),
    };
    if columns.is_empty() {
        return Err(ConditionsError::Resource(format!(
            "The file {} is empty.",
            path.display()
        )));
    }
    let rows = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect();
    Ok((columns, rows))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadArguments {
    pub table_name: String,
    pub file: PathBuf,
    pub collection_id: Option<i64>,
}

impl LoadArguments {
    pub fn from_matches(matches: &ArgMatches) -> Result<LoadArguments, ConditionsError> {
        Ok(LoadArguments {
            table_name: required(matches, "table")?,
            file: required(matches, "file")?,
            collection_id: matches.get_one::<i64>("collection_id").copied(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub collection_id: i64,
    pub row_ids: Vec<i64>,
}

/// Inserts the rows of a text file as one new collection.
pub fn load(manager: &DatabaseConditionsManager, args: &LoadArguments) -> Result<LoadOutcome, ConditionsError> {
    let meta = require_table(manager, &args.table_name)?;
    let (columns, rows) = parse_file(&args.file)?;
    let opened_here = manager.open_connection()?;
    let outcome = insert_collection(manager, &meta, args.collection_id, &columns, &rows);
    close_after(manager, opened_here, outcome)
}

/// Closes the connection if the command opened it.  When the command itself failed, that error is
/// returned and a failure to close is only logged.
fn close_after<T>(
    manager: &DatabaseConditionsManager,
    opened_here: bool,
    result: Result<T, ConditionsError>,
) -> Result<T, ConditionsError> {
    let closed = manager.close_connection(opened_here);
    match (result, closed) {
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(close_error)) => Err(close_error),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(close_error)) => {
            error!("failed to close the connection: {}", close_error);
            Err(e)
        }
    }
}

fn insert_collection(
    manager: &DatabaseConditionsManager,
    meta: &TableMetaData,
    collection_id: Option<i64>,
    columns: &[String],
    rows: &[Vec<String>],
) -> Result<LoadOutcome, ConditionsError> {
    let collection_id = match collection_id {
        Some(id) => {
            if manager.collection_id_exists(meta.table_name(), id)? {
                return Err(ConditionsError::configuration(format!(
                    "The collection id {} already exists in table {}.",
                    id,
                    meta.table_name()
                )));
            }
            id
        }
        None => manager.next_collection_id(meta.table_name())?,
    };
    let sql = QueryBuilder::build_insert(meta.table_name(), meta.key(), collection_id, columns, rows)?;
    info!("{}", sql);
    let row_ids = manager.update_query(&sql)?;
    info!(
        "inserted {} new rows into table {} with collection_id {}",
        row_ids.len(),
        meta.table_name(),
        collection_id
    );
    Ok(LoadOutcome {
        collection_id,
        row_ids,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddArguments {
    pub name: String,
    pub table_name: String,
    pub collection_id: i64,
    pub run_start: i32,
    pub run_end: i32,
    pub user: Option<String>,
    pub notes: Option<String>,
    pub tag: Option<String>,
}

impl AddArguments {
    pub fn from_matches(matches: &ArgMatches) -> Result<AddArguments, ConditionsError> {
        Ok(AddArguments {
            name: required(matches, "name")?,
            table_name: required(matches, "table")?,
            collection_id: required(matches, "collection_id")?,
            run_start: required(matches, "run_start")?,
            run_end: required(matches, "run_end")?,
            user: matches.get_one::<String>("user").cloned(),
            notes: matches.get_one::<String>("notes").cloned(),
            tag: matches.get_one::<String>("tag").cloned(),
        })
    }
}

/// Adds a conditions record and returns its id.
pub fn add(manager: &DatabaseConditionsManager, args: &AddArguments) -> Result<i64, ConditionsError> {
    require_table(manager, &args.table_name)?;
    if args.run_end < args.run_start {
        return Err(ConditionsError::configuration(format!(
            "The run range {}-{} is empty.",
            args.run_start, args.run_end
        )));
    }
    let record = ConditionsRecord {
        id: 0,
        run_start: args.run_start,
        run_end: args.run_end,
        name: args.name.clone(),
        table_name: args.table_name.clone(),
        collection_id: args.collection_id,
        tag: args.tag.clone(),
        created_by: Some(args.user.clone().unwrap_or_else(Util::current_user_name)),
        notes: args.notes.clone(),
    };
    let opened_here = manager.open_connection()?;
    let id = manager.add_conditions_record(&record);
    close_after(manager, opened_here, id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrintArguments {
    pub name: String,
    pub run: Option<i32>,
}

impl PrintArguments {
    pub fn from_matches(matches: &ArgMatches) -> Result<PrintArguments, ConditionsError> {
        Ok(PrintArguments {
            name: required(matches, "name")?,
            run: matches.get_one::<i32>("run").copied(),
        })
    }
}

/// The records named in `args`, optionally only those valid for one run.
pub fn print(
    manager: &DatabaseConditionsManager,
    args: &PrintArguments,
) -> Result<ConditionsRecordCollection, ConditionsError> {
    let opened_here = manager.open_connection()?;
    let records = manager.find_conditions_records(&args.name);
    let records = close_after(manager, opened_here, records)?;
    Ok(match args.run {
        Some(run) => records.find_by_run(run),
        None => records,
    })
}

pub fn format_records(records: &ConditionsRecordCollection) -> String {
    records
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<String>>()
        .join("\n\n")
}
