//! Shared object handles.
//!
//! An [`ObjectRef`] is one node of an object graph. Cloning it clones the
//! handle, not the object: two handles are "the same object" exactly when
//! they point at the same allocation, which is what the identity stack
//! tracks during encode and decode.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// Type-erased object state.
pub(crate) type AnyBox = Box<dyn Any + Send + Sync>;

struct ObjectCell {
    type_id: TypeId,
    type_name: &'static str,
    data: RwLock<AnyBox>,
}

/// A shared, interior-mutable handle to one object of any `'static` type.
///
/// Equality is identity: `a == b` iff both handles point at the same object.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectCell>);

impl ObjectRef {
    /// Wraps a value in a new object.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_box(TypeId::of::<T>(), std::any::type_name::<T>(), Box::new(value))
    }

    pub(crate) fn from_box(type_id: TypeId, type_name: &'static str, data: AnyBox) -> Self {
        Self(Arc::new(ObjectCell {
            type_id,
            type_name,
            data: RwLock::new(data),
        }))
    }

    /// Returns the runtime type of the wrapped value.
    pub fn type_id(&self) -> TypeId {
        self.0.type_id
    }

    /// Returns the Rust type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name
    }

    /// Returns true if the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.type_id == TypeId::of::<T>()
    }

    /// Returns true if both handles point at the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared cell, stable for as long as any handle lives.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Borrows the value as a `T`, or returns `None` if it is another type.
    pub fn read<T: Any>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.0.data.read(), |data| (**data).downcast_ref::<T>()).ok()
    }

    /// Mutably borrows the value as a `T`, or returns `None` if it is another type.
    pub fn write<T: Any>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.0.data.write(), |data| (**data).downcast_mut::<T>()).ok()
    }

    pub(crate) fn raw_read(&self) -> RwLockReadGuard<'_, AnyBox> {
        self.0.data.read()
    }

    pub(crate) fn raw_write(&self) -> RwLockWriteGuard<'_, AnyBox> {
        self.0.data.write()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} @ {:#x})", self.0.type_name, self.addr())
    }
}
