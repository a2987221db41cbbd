/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use crate::resources;
use std::path::PathBuf;
use tracing::*;

/// Source of conditions that do not live in the database, such as detector descriptions.
pub trait ConditionsReader {
    /// Usually the detector name; resources are looked up relative to it.
    fn set_resource_path(&mut self, path: &str);

    fn resource_path(&self) -> Option<&str>;

    fn open(&self, name: &str) -> Result<String, ConditionsError>;
}

/// Looks for `<root>/<path>/<name>` under each search root in turn, then for an embedded
/// `/detectors/<path>/<name>`.
#[derive(Debug, Clone, Default)]
pub struct BaseConditionsReader {
    search_roots: Vec<PathBuf>,
    resource_path: Option<String>,
}

impl BaseConditionsReader {
    pub fn new() -> BaseConditionsReader {
        BaseConditionsReader::default()
    }

    pub fn with_search_roots(search_roots: Vec<PathBuf>) -> BaseConditionsReader {
        BaseConditionsReader {
            search_roots,
            resource_path: None,
        }
    }
}

impl ConditionsReader for BaseConditionsReader {
    fn set_resource_path(&mut self, path: &str) {
        self.resource_path = Some(path.to_string());
    }

    fn resource_path(&self) -> Option<&str> {
        self.resource_path.as_deref()
    }

    fn open(&self, name: &str) -> Result<String, ConditionsError> {
        let path = self.resource_path.as_deref().ok_or_else(|| {
            ConditionsError::Resource(format!(
                "No resource path is set, so {} cannot be located.",
                name
            ))
        })?;
        for root in &self.search_roots {
            let candidate = root.join(path).join(name);
            if candidate.is_file() {
                debug!("reading {}", candidate.display());
                return Ok(std::fs::read_to_string(candidate)?);
            }
        }
        let embedded = format!("/detectors/{}/{}", path, name);
        resources::find_resource(&embedded)
            .map(str::to_string)
            .ok_or_else(|| {
                ConditionsError::Resource(format!(
                    "The resource {} was not found for {}.",
                    name, path
                ))
            })
    }
}

/// The detector geometry description as loaded for the current detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorDescription {
    name: String,
    compact_xml: String,
}

impl DetectorDescription {
    pub fn new(name: &str, compact_xml: String) -> DetectorDescription {
        DetectorDescription {
            name: name.to_string(),
            compact_xml,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compact_xml(&self) -> &str {
        &self.compact_xml
    }
}
