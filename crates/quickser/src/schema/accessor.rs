//! Field accessor resolution.
//!
//! Reads and writes of a field are resolved independently. For each
//! direction the conventional method (`get_<field>` / `set_<field>`) is
//! searched first, from the concrete type up through its ancestors; if
//! none is found, the field slot itself is searched the same way. A side
//! that resolves to nothing only fails when it is invoked.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::AccessError;
use crate::model::Value;
use crate::schema::def::{Getter, Projection, Setter, TypeDef, getter_fn, setter_fn};

/// Name of the read method for `field`.
pub fn getter_name(field: &str) -> String {
    format!("get_{field}")
}

/// Name of the write method for `field`.
pub fn setter_name(field: &str) -> String {
    format!("set_{field}")
}

/// How one side of an accessor was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Method,
    Field,
    Unresolved,
}

/// Resolved read/write pair for one field of one type.
#[derive(Clone)]
pub struct Accessor {
    get: Option<Getter>,
    set: Option<Setter>,
    get_strategy: Strategy,
    set_strategy: Strategy,
}

impl Accessor {
    pub(crate) fn resolve(def: &TypeDef, field: &str) -> Self {
        let method = getter_name(field);
        let (get, get_strategy) = match def
            .walk(|level, path| level.getter(&method).map(|g| lift_getter(path, Arc::clone(g))))
        {
            Some(get) => (Some(get), Strategy::Method),
            None => match def.walk(|level, path| {
                level.field_def(field).map(|f| lift_getter(path, Arc::clone(&f.get)))
            }) {
                Some(get) => (Some(get), Strategy::Field),
                None => (None, Strategy::Unresolved),
            },
        };

        let method = setter_name(field);
        let (set, set_strategy) = match def
            .walk(|level, path| level.setter(&method).map(|s| lift_setter(path, Arc::clone(s))))
        {
            Some(set) => (Some(set), Strategy::Method),
            None => match def.walk(|level, path| {
                level.field_def(field).map(|f| lift_setter(path, Arc::clone(&f.set)))
            }) {
                Some(set) => (Some(set), Strategy::Field),
                None => (None, Strategy::Unresolved),
            },
        };

        if get_strategy == Strategy::Unresolved && set_strategy == Strategy::Unresolved {
            log::warn!("{}.{field}: no accessor found on type or ancestors", def.name());
        } else {
            log::trace!(
                "{}.{field}: read via {get_strategy:?}, write via {set_strategy:?}",
                def.name()
            );
        }

        Self {
            get,
            set,
            get_strategy,
            set_strategy,
        }
    }

    pub fn get_strategy(&self) -> Strategy {
        self.get_strategy
    }

    pub fn set_strategy(&self) -> Strategy {
        self.set_strategy
    }

    pub(crate) fn get(&self, obj: &dyn Any) -> Result<Value, AccessError> {
        match &self.get {
            Some(get) => get(obj),
            None => Err(AccessError::Unresolved),
        }
    }

    pub(crate) fn set(&self, obj: &mut dyn Any, value: Value) -> Result<(), AccessError> {
        match &self.set {
            Some(set) => set(obj, value),
            None => Err(AccessError::Unresolved),
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("get", &self.get_strategy)
            .field("set", &self.set_strategy)
            .finish()
    }
}

/// Wraps an ancestor-level getter so it accepts the concrete type.
fn lift_getter(path: &[Arc<dyn Projection>], getter: Getter) -> Getter {
    path.iter().rev().fold(getter, |inner, projection| {
        let projection = Arc::clone(projection);
        getter_fn(move |obj| {
            let parent = projection.project(obj).ok_or(AccessError::WrongReceiver {
                expected: projection.owner(),
            })?;
            inner(parent)
        })
    })
}

fn lift_setter(path: &[Arc<dyn Projection>], setter: Setter) -> Setter {
    path.iter().rev().fold(setter, |inner, projection| {
        let projection = Arc::clone(projection);
        setter_fn(move |obj, value| {
            let expected = projection.owner();
            let parent = projection
                .project_mut(obj)
                .ok_or(AccessError::WrongReceiver { expected })?;
            inner(parent, value)
        })
    })
}
