/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
use crate::error::ConditionsError;
use crate::model::conditions_object::{ConditionsObject, ConditionsObjectCollection};
use crate::model::conditions_record::{ConditionsRecord, ConditionsRecordCollection};
use crate::model::converter::{AnyConverter, ConditionsRecordConverter, DetectorConditionsConverter};
use crate::model::ecal::*;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::*;

/// A resolved type name from the XML configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHandle {
    pub name: String,
    pub type_id: TypeId,
    pub rust_name: &'static str,
}

pub type ConverterFactory = fn() -> Rc<dyn AnyConverter>;

enum RegisteredType {
    Object(TypeHandle),
    Collection {
        handle: TypeHandle,
        object_type: TypeId,
    },
    Converter(ConverterFactory),
}

impl RegisteredType {
    fn kind(&self) -> &'static str {
        match self {
            RegisteredType::Object(_) => "a conditions object",
            RegisteredType::Collection { .. } => "a conditions collection",
            RegisteredType::Converter(_) => "a conditions converter",
        }
    }
}

fn make_converter<C: AnyConverter + Default + 'static>() -> Rc<dyn AnyConverter> {
    Rc::new(C::default())
}

/// Maps the type names used in the configuration to concrete row, collection and converter types.
/// Everything a configuration may name must be registered here first; resolving checks that the
/// name stands for the right kind of thing.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, RegisteredType>,
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        TypeRegistry::default()
    }

    /// The record table and calorimeter tables that ship with this crate.
    pub fn with_defaults() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_object::<ConditionsRecord>("ConditionsRecord");
        registry.register_collection::<ConditionsRecordCollection>("ConditionsRecordCollection");
        registry.register_converter::<ConditionsRecordConverter>("ConditionsRecordConverter");
        registry.register_converter::<DetectorConditionsConverter>("DetectorConditionsConverter");

        registry.register_object::<EcalGain>("EcalGain");
        registry.register_collection::<EcalGainCollection>("EcalGainCollection");
        registry.register_converter::<EcalGainConverter>("EcalGainConverter");
        registry.register_object::<EcalCalibration>("EcalCalibration");
        registry.register_collection::<EcalCalibrationCollection>("EcalCalibrationCollection");
        registry.register_converter::<EcalCalibrationConverter>("EcalCalibrationConverter");
        registry.register_object::<EcalBadChannel>("EcalBadChannel");
        registry.register_collection::<EcalBadChannelCollection>("EcalBadChannelCollection");
        registry.register_converter::<EcalBadChannelConverter>("EcalBadChannelConverter");
        registry
    }

    fn insert(&mut self, name: &str, registered: RegisteredType) {
        if self.types.insert(name.to_string(), registered).is_some() {
            warn!("type name {} was registered again; the new registration replaces it", name);
        }
    }

    pub fn register_object<T: ConditionsObject>(&mut self, name: &str) {
        let handle = TypeHandle {
            name: name.to_string(),
            type_id: TypeId::of::<T>(),
            rust_name: type_name::<T>(),
        };
        self.insert(name, RegisteredType::Object(handle));
    }

    pub fn register_collection<C: ConditionsObjectCollection>(&mut self, name: &str) {
        let handle = TypeHandle {
            name: name.to_string(),
            type_id: TypeId::of::<C>(),
            rust_name: type_name::<C>(),
        };
        let object_type = TypeId::of::<C::Object>();
        self.insert(name, RegisteredType::Collection { handle, object_type });
    }

    pub fn register_converter<C: AnyConverter + Default + 'static>(&mut self, name: &str) {
        self.register_converter_factory(name, make_converter::<C>);
    }

    pub fn register_converter_factory(&mut self, name: &str, factory: ConverterFactory) {
        self.insert(name, RegisteredType::Converter(factory));
    }

    fn lookup(&self, name: &str) -> Result<&RegisteredType, ConditionsError> {
        self.types.get(name).ok_or_else(|| {
            ConditionsError::configuration(format!("The type {} was not found.", name))
        })
    }

    pub fn resolve_object(&self, name: &str) -> Result<TypeHandle, ConditionsError> {
        match self.lookup(name)? {
            RegisteredType::Object(handle) => Ok(handle.clone()),
            other => Err(ConditionsError::configuration(format!(
                "The type {} is {}, not a ConditionsObject.",
                name,
                other.kind()
            ))),
        }
    }

    /// Also returns the type id of the collection's row type, so callers can check that a table's
    /// object and collection entries belong together.
    pub fn resolve_collection(&self, name: &str) -> Result<(TypeHandle, TypeId), ConditionsError> {
        match self.lookup(name)? {
            RegisteredType::Collection {
                handle,
                object_type,
            } => Ok((handle.clone(), *object_type)),
            other => Err(ConditionsError::configuration(format!(
                "The type {} is {}, not a ConditionsObjectCollection.",
                name,
                other.kind()
            ))),
        }
    }

    pub fn create_converter(&self, name: &str) -> Result<Rc<dyn AnyConverter>, ConditionsError> {
        match self.lookup(name)? {
            RegisteredType::Converter(factory) => Ok(factory()),
            other => Err(ConditionsError::configuration(format!(
                "The converter type {} is {}, which does not implement ConditionsConverter.",
                name,
                other.kind()
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}
