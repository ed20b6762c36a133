//! Blank instance creation for decoding.

use std::any::TypeId;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::DecodeError;
use crate::model::ObjectRef;
use crate::schema::def::{BlankFn, TypeDef};

/// Creates placeholder instances whose fields are assigned after allocation.
///
/// The creation handle of each type is looked up once and cached.
#[derive(Default)]
pub struct InstanceFactory {
    handles: RwLock<FxHashMap<TypeId, BlankFn>>,
}

impl InstanceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a blank instance of the type described by `def`.
    pub fn create_blank(&self, def: &TypeDef) -> Result<ObjectRef, DecodeError> {
        let make = self.handle(def)?;
        Ok(ObjectRef::from_box(def.type_id(), def.rust_name(), make()))
    }

    /// Number of cached creation handles.
    pub fn cached(&self) -> usize {
        self.handles.read().len()
    }

    fn handle(&self, def: &TypeDef) -> Result<BlankFn, DecodeError> {
        if let Some(make) = self.handles.read().get(&def.type_id()) {
            return Ok(BlankFn::clone(make));
        }
        let make = def.blank().cloned().ok_or_else(|| DecodeError::Instantiation {
            class: def.name().to_string(),
        })?;
        let mut handles = self.handles.write();
        Ok(BlankFn::clone(handles.entry(def.type_id()).or_insert(make)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Order, Person};

    #[test]
    fn test_blank_instance_and_cache() {
        let factory = InstanceFactory::new();
        let def = TypeDef::of::<Person>();

        let first = factory.create_blank(&def).unwrap();
        let second = factory.create_blank(&def).unwrap();
        assert!(!first.ptr_eq(&second));
        assert_eq!(first.read::<Person>().unwrap().name, "");
        assert_eq!(factory.cached(), 1);
    }

    #[test]
    fn test_missing_blank_constructor() {
        let factory = InstanceFactory::new();
        let err = factory.create_blank(&TypeDef::of::<Order>()).unwrap_err();
        assert!(matches!(err, DecodeError::Instantiation { ref class } if class == "demo.Order"));
        assert_eq!(factory.cached(), 0);
    }
}
