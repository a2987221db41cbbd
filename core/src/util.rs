/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use std::collections::HashMap;
use tracing::Level;

/// A place for shared code and constants that do not belong to any one component.
pub struct Util {}

// for explanation, see fn install() below
static TRACING_INIT: std::sync::Once = std::sync::Once::new();

impl Util {
    /// Embedded configuration used when no XML file is given.
    pub const DEFAULT_CONFIG_RESOURCE: &'static str = "/config/conditions_database.xml";
    /// Embedded connection properties used when no properties file is given.
    pub const DEFAULT_CONNECTION_RESOURCE: &'static str = "/config/conditions_dev.properties";
    /// Name of the detector description resolved by the base (non-database) reader.
    pub const COMPACT_XML: &'static str = "compact.xml";
    pub const COLLECTION_ID_COLUMN: &'static str = "collection_id";
    pub const DEFAULT_DRIVER: &'static str = "postgresql";
    pub const DEFAULT_PORT: u16 = 5432;

    /// Installs the global tracing subscriber at DEBUG, writing through the test harness.  Safe to
    /// call from every test.
    pub fn initialize_tracing() {
        TRACING_INIT.call_once(|| {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_max_level(Level::DEBUG)
                .with_target(true)
                .with_test_writer()
                .finish();
            Self::install(subscriber);
        });
    }

    /// For the command line tool: logs go to stderr so they never mix with printed results.
    pub fn initialize_tracing_with_level(level: Level) {
        TRACING_INIT.call_once(|| {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_max_level(level)
                .with_target(true)
                .with_writer(std::io::stderr)
                .finish();
            Self::install(subscriber);
        });
    }

    // Only the first call in a process has any effect.  Someone else (an integrating framework)
    // may have installed a subscriber already.
    fn install<S>(subscriber: S)
    where
        S: tracing::Subscriber + Send + Sync + 'static,
    {
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("A tracing subscriber was already set; keeping it.");
        }
    }

    /// Maps the names accepted by the command line "-l" option onto tracing levels.  Accepts the
    /// old java.util.logging names too, since existing job scripts pass those.
    pub fn parse_log_level(name: &str) -> Option<Level> {
        match name.to_uppercase().as_str() {
            "TRACE" | "ALL" | "FINEST" | "FINER" => Some(Level::TRACE),
            "DEBUG" | "FINE" | "CONFIG" => Some(Level::DEBUG),
            "INFO" => Some(Level::INFO),
            "WARN" | "WARNING" => Some(Level::WARN),
            "ERROR" | "SEVERE" => Some(Level::ERROR),
            _ => None,
        }
    }

    /// Parses text in (a practical subset of) java.util.Properties syntax: one "key=value" or
    /// "key: value" per line, with '#' or '!' starting a comment line. Later keys replace
    /// earlier ones.  Line continuations and unicode escapes are not supported.
    pub fn parse_properties(text: &str) -> HashMap<String, String> {
        let mut properties = HashMap::new();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split_at = line.find(|c| c == '=' || c == ':');
            let (key, value) = match split_at {
                Some(i) => (line[..i].trim(), line[i + 1..].trim()),
                None => (line, ""),
            };
            if !key.is_empty() {
                properties.insert(key.to_string(), value.to_string());
            }
        }
        properties
    }

    /// Used to fill in "created_by" on records added from the command line.
    pub fn current_user_name() -> String {
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }
}
