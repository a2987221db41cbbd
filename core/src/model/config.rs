/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
//! The XML conditions configuration:
//!
//! ```xml
//! <conditions>
//!   <tables>
//!     <table name="ecal_gains" key="id">
//!       <classes><object class="EcalGain"/><collection class="EcalGainCollection"/></classes>
//!       <fields><field name="ecal_channel_id"/><field name="gain"/></fields>
//!     </table>
//!   </tables>
//!   <converters><converter class="EcalGainConverter"/></converters>
//! </conditions>
//! ```
use crate::error::ConditionsError;
use crate::resources;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use tracing::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub key: String,
    pub object_type: String,
    pub collection_type: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionsConfig {
    pub tables: Vec<TableDescriptor>,
    /// Converter type names, in document order.
    pub converters: Vec<String>,
}

#[derive(Default)]
struct PartialTable {
    name: String,
    key: String,
    object_type: Option<String>,
    collection_type: Option<String>,
    fields: Vec<String>,
}

impl PartialTable {
    fn finish(self) -> Result<TableDescriptor, ConditionsError> {
        let missing = |what: &str| {
            ConditionsError::configuration(format!("The table {} has no {} class.", self.name, what))
        };
        let object_type = self.object_type.clone().ok_or_else(|| missing("object"))?;
        let collection_type = self.collection_type.clone().ok_or_else(|| missing("collection"))?;
        Ok(TableDescriptor {
            name: self.name,
            key: self.key,
            object_type,
            collection_type,
            fields: self.fields,
        })
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, ConditionsError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| {
            ConditionsError::configuration(format!("Bad attribute in configuration: {}", e))
        })?;
        if attr.key.as_ref() == name.as_bytes() {
            let raw = String::from_utf8_lossy(&attr.value);
            let value = unescape(&raw).map_err(|e| {
                ConditionsError::configuration(format!("Bad value for attribute {}: {}", name, e))
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(
    element: &BytesStart<'_>,
    element_name: &str,
    name: &str,
) -> Result<String, ConditionsError> {
    attribute(element, name)?.ok_or_else(|| {
        ConditionsError::configuration(format!(
            "The {} element is missing its {} attribute.",
            element_name, name
        ))
    })
}

fn current_table<'a>(
    table: &'a mut Option<PartialTable>,
    element_name: &str,
) -> Result<&'a mut PartialTable, ConditionsError> {
    table.as_mut().ok_or_else(|| {
        ConditionsError::configuration(format!(
            "The {} element must be inside a table element.",
            element_name
        ))
    })
}

impl ConditionsConfig {
    pub fn parse(xml: &str) -> Result<ConditionsConfig, ConditionsError> {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut tables: Option<Vec<TableDescriptor>> = None;
        let mut converters: Option<Vec<String>> = None;
        let mut table: Option<PartialTable> = None;

        loop {
            let event = reader.read_event_into(&mut buf)?;
            let empty = matches!(event, Event::Empty(_));
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    match (path.last().map(String::as_str), name.as_str()) {
                        (_, "tables") => {
                            tables.get_or_insert_with(Vec::new);
                        }
                        (Some("tables"), "table") => {
                            table = Some(PartialTable {
                                name: required_attribute(e, "table", "name")?,
                                key: required_attribute(e, "table", "key")?,
                                ..PartialTable::default()
                            });
                        }
                        (Some("classes"), "object") => {
                            current_table(&mut table, "object")?.object_type =
                                Some(required_attribute(e, "object", "class")?);
                        }
                        (Some("classes"), "collection") => {
                            current_table(&mut table, "collection")?.collection_type =
                                Some(required_attribute(e, "collection", "class")?);
                        }
                        (Some("fields"), "field") => {
                            let field = required_attribute(e, "field", "name")?;
                            current_table(&mut table, "field")?.fields.push(field);
                        }
                        (_, "converters") => {
                            converters.get_or_insert_with(Vec::new);
                        }
                        (Some("converters"), "converter") => {
                            let class = required_attribute(e, "converter", "class")?;
                            converters.get_or_insert_with(Vec::new).push(class);
                        }
                        _ => {}
                    }
                    if empty {
                        if name == "table" {
                            if let Some(t) = table.take() {
                                tables.get_or_insert_with(Vec::new).push(t.finish()?);
                            }
                        }
                    } else {
                        path.push(name);
                    }
                }
                Event::End(ref e) => {
                    if e.name().as_ref() == b"table" {
                        if let Some(t) = table.take() {
                            tables.get_or_insert_with(Vec::new).push(t.finish()?);
                        }
                    }
                    path.pop();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let tables = tables.ok_or_else(|| {
            ConditionsError::configuration("The configuration has no tables section.")
        })?;
        let converters = converters.ok_or_else(|| {
            ConditionsError::configuration("The configuration has no converters section.")
        })?;
        debug!(
            "parsed configuration with {} tables and {} converters",
            tables.len(),
            converters.len()
        );
        Ok(ConditionsConfig { tables, converters })
    }

    pub fn from_file(path: &Path) -> Result<ConditionsConfig, ConditionsError> {
        if !path.exists() {
            return Err(ConditionsError::Resource(format!(
                "The configuration file does not exist: {}",
                path.display()
            )));
        }
        info!("reading conditions configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn from_resource(name: &str) -> Result<ConditionsConfig, ConditionsError> {
        let text = resources::find_resource(name).ok_or_else(|| {
            ConditionsError::Resource(format!("The resource {} does not exist.", name))
        })?;
        Self::parse(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Util;

    const GAINS: &str = r#"<?xml version="1.0"?>
<conditions>
  <tables>
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
    <converter class="GainConverter"/>
    <converter class="ConditionsRecordConverter"/>
  </converters>
</conditions>"#;

    #[test]
    fn tables_and_converters_are_read_in_order() {
        Util::initialize_tracing();
        let config = ConditionsConfig::parse(GAINS).unwrap();
        assert_eq!(
            config.tables,
            vec![TableDescriptor {
                name: "gains".to_string(),
                key: "id".to_string(),
                object_type: "Gain".to_string(),
                collection_type: "GainCollection".to_string(),
                fields: vec!["channel".to_string(), "value".to_string()],
            }]
        );
        assert_eq!(config.converters, vec!["GainConverter", "ConditionsRecordConverter"]);
    }

    #[test]
    fn default_resource_parses() {
        let config = ConditionsConfig::from_resource(Util::DEFAULT_CONFIG_RESOURCE).unwrap();
        assert_eq!(config.tables.len(), 4);
        assert_eq!(config.tables[0].name, "conditions");
        assert_eq!(config.tables[0].fields.len(), 8);
        assert!(config.converters.contains(&"ConditionsRecordConverter".to_string()));
    }

    #[test]
    fn incomplete_documents_are_rejected() {
        let no_key = r#"<c><tables><table name="t"><classes/></table></tables><converters/></c>"#;
        assert!(matches!(
            ConditionsConfig::parse(no_key),
            Err(ConditionsError::Configuration(m)) if m.contains("key")
        ));
        let no_collection = r#"<c><tables><table name="t" key="id"><classes><object class="A"/></classes></table></tables><converters/></c>"#;
        assert!(matches!(
            ConditionsConfig::parse(no_collection),
            Err(ConditionsError::Configuration(m)) if m.contains("collection")
        ));
        let no_converters = r#"<c><tables/></c>"#;
        assert!(matches!(
            ConditionsConfig::parse(no_converters),
            Err(ConditionsError::Configuration(m)) if m.contains("converters")
        ));
        assert!(matches!(
            ConditionsConfig::from_file(Path::new("/no/such/conditions.xml")),
            Err(ConditionsError::Resource(_))
        ));
    }
}
