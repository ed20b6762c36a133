//! Class schemas, type definitions and the registry that ties them together.

pub mod accessor;
pub mod class;
pub mod def;
pub mod factory;
pub mod registry;
pub mod table;

pub use accessor::{Accessor, Strategy, getter_name, setter_name};
pub use class::{ClassId, ClassSchema, FieldId, FieldSchema};
pub use def::{ClassBuilder, FieldDecl, Serializable, TypeDef};
pub use factory::InstanceFactory;
pub use registry::ClassRegistry;
