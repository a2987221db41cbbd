/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use anyhow::{anyhow, Result};
use hps_conditions::controllers::command_line_tool::*;
use hps_conditions::model::conditions_object::ConditionsObjectCollection;
use hps_conditions::util::Util;
use std::rc::Rc;
use tracing::Level;

/// Loads and inspects conditions in the database, e.g.:
///   hps-conditions -p conditions_dev_local.properties load -t ecal_gains -f ./ecal_gains.txt
fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let level = match matches.get_one::<String>("log") {
        Some(name) => Util::parse_log_level(name).ok_or_else(|| anyhow!("Unknown log level: {}", name))?,
        None => Level::INFO,
    };
    Util::initialize_tracing_with_level(level);

    let manager = Rc::new(setup_manager(&matches)?);
    hps_conditions::DatabaseConditionsManager::register(&manager);

    match matches.subcommand() {
        Some(("load", sub)) => {
            let outcome = load(&manager, &LoadArguments::from_matches(sub)?)?;
            println!(
                "Inserted {} rows with collection_id {}",
                outcome.row_ids.len(),
                outcome.collection_id
            );
        }
        Some(("add", sub)) => {
            let id = add(&manager, &AddArguments::from_matches(sub)?)?;
            println!("Added conditions record {}", id);
        }
        Some(("print", sub)) => {
            let records = print(&manager, &PrintArguments::from_matches(sub)?)?;
            if records.is_empty() {
                println!("No conditions records found.");
            } else {
                println!("{}", format_records(&records));
            }
        }
        Some((other, _)) => return Err(anyhow!("Unknown command: {}", other)),
        None => return Err(anyhow!("No command given.")),
    }
    Ok(())
}
