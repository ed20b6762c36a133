//! quickser: compact binary serialization of object graphs.
//!
//! Objects are written field-by-field against a per-class schema held in a
//! shared [`ClassRegistry`]. Each class gets a dense id on first encounter and
//! each field a dense id within its class, so the wire carries small integers
//! instead of names. Shared and cyclic references survive a round trip.
//!
//! # Quick Start
//!
//! ```rust
//! use quickser::{ClassBuilder, ClassRegistry, ObjectRef, Serializable, decode, encode};
//!
//! #[derive(Default)]
//! struct Node {
//!     label: String,
//!     next: Option<ObjectRef>,
//! }
//!
//! impl Serializable for Node {
//!     fn describe(class: &mut ClassBuilder<Self>) {
//!         class
//!             .name("demo.Node")
//!             .blank_default()
//!             .field("label", |n| &n.label, |n| &mut n.label)
//!             .field("next", |n| &n.next, |n| &mut n.next);
//!     }
//! }
//!
//! let registry = ClassRegistry::new();
//! registry.bind::<Node>().unwrap();
//!
//! // A node that points at itself
//! let node = ObjectRef::new(Node { label: "loop".into(), next: None });
//! node.write::<Node>().unwrap().next = Some(node.clone());
//!
//! let bytes = encode(&registry, &node).unwrap();
//! let decoded = decode(&registry, &bytes).unwrap();
//!
//! let next = decoded.read::<Node>().unwrap().next.clone().unwrap();
//! assert!(next.ptr_eq(&decoded));
//! # node.write::<Node>().unwrap().next = None;
//! # decoded.write::<Node>().unwrap().next = None;
//! ```
//!
//! # Modules
//!
//! - [`model`]: Object handles, dynamic values and field conversions
//! - [`schema`]: Type definitions, class schemas, accessors and the registry
//! - [`codec`]: Object and value encoding, framing and compression
//! - [`error`]: Error types
//! - [`limits`]: Format constants and decoding limits
//!
//! # Schema evolution
//!
//! A registry can export its schema table and be rebuilt from it in another
//! process. Stored classes are matched to bound types by wire name; fields
//! missing from a stored schema are appended with new ids, and field ids are
//! always resolved by name, so readers and writers of different revisions of
//! a type can exchange data.
//!
//! # Wire Format
//!
//! - Uncompressed: `QSER` magic + version + root value
//! - Compressed: `QSERZ` magic + uncompressed size + zstd data
//!
//! The decoder automatically detects and handles both formats.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod schema;

#[cfg(test)]
mod fixtures;

pub use codec::{
    CodecOptions, IdentityStack, ObjectDecoder, ObjectEncoder, decode, decode_with_options,
    decompress, encode, encode_compressed, encode_with_options,
};
pub use error::{AccessError, DecodeError, EncodeError, ErrorKind};
pub use model::{Bytes, Decimal, FieldValue, ObjectRef, Value};
pub use schema::{
    ClassBuilder, ClassId, ClassRegistry, ClassSchema, FieldId, FieldSchema, InstanceFactory,
    Serializable, TypeDef,
};

lazy_static::lazy_static! {
    static ref GLOBAL_REGISTRY: ClassRegistry = ClassRegistry::new();
}

/// The process-wide registry.
///
/// Created on first use and never dropped. Prefer an owned [`ClassRegistry`]
/// when ids must not be shared with unrelated code in the same process.
pub fn global_registry() -> &'static ClassRegistry {
    &GLOBAL_REGISTRY
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;
    use crate::fixtures::{Order, Pair, Person, PersonV2};

    fn person_v1_bytes() -> (Vec<u8>, Vec<u8>) {
        let registry = ClassRegistry::new();
        registry.bind::<Person>().unwrap();
        let person = ObjectRef::new(Person {
            name: "Ada".into(),
            age: 36,
        });
        let bytes = encode(&registry, &person).unwrap();
        (bytes, registry.export_schema_table())
    }

    #[test]
    fn test_new_reader_accepts_old_data() {
        let (bytes, table) = person_v1_bytes();
        let registry = ClassRegistry::from_schema_table(&table).unwrap();
        registry.bind::<PersonV2>().unwrap();

        let decoded = decode(&registry, &bytes).unwrap();
        assert_eq!(
            *decoded.read::<PersonV2>().unwrap(),
            PersonV2 {
                name: "Ada".into(),
                age: 36,
                email: None,
            }
        );
    }

    #[test]
    fn test_new_writer_appends_field_once() {
        let (_, table) = person_v1_bytes();
        let registry = ClassRegistry::from_schema_table(&table).unwrap();
        registry.bind::<PersonV2>().unwrap();

        let person = ObjectRef::new(PersonV2 {
            name: "Grace".into(),
            age: 45,
            email: Some("grace@example.com".into()),
        });
        encode(&registry, &person).unwrap();
        encode(&registry, &person).unwrap();

        assert_eq!(registry.len(), 1);
        let schema = registry.schema_of(0).unwrap();
        assert_eq!(schema.field_count(), 3);
        assert_eq!(schema.field_id("email"), Some(2));

        let decoded = decode(&registry, &encode(&registry, &person).unwrap()).unwrap();
        assert_eq!(*decoded.read::<PersonV2>().unwrap(), *person.read::<PersonV2>().unwrap());
    }

    #[test]
    fn test_old_reader_rejects_removed_field() {
        let registry = ClassRegistry::new();
        registry.bind::<PersonV2>().unwrap();
        let person = ObjectRef::new(PersonV2 {
            name: "Lin".into(),
            age: 28,
            email: None,
        });
        let bytes = encode(&registry, &person).unwrap();

        // The old revision has no email field or accessor
        let old = ClassRegistry::from_schema_table(&registry.export_schema_table()).unwrap();
        old.bind::<Person>().unwrap();
        let err = decode(&old, &bytes).unwrap_err();
        assert_eq!(
            err,
            DecodeError::AccessorFault {
                class: "demo.Person".to_string(),
                field: "email".to_string(),
                source: AccessError::Unresolved,
            }
        );
        assert_eq!(err.kind(), ErrorKind::AccessorFault);

        // Without the stored table the field id itself is unknown
        let fresh = ClassRegistry::new();
        fresh.register::<Person>().unwrap();
        assert!(matches!(
            decode(&fresh, &bytes),
            Err(DecodeError::UnknownFieldId { field_id: 2, .. })
        ));
    }

    #[test]
    fn test_unbound_stored_class() {
        let (bytes, table) = person_v1_bytes();
        let registry = ClassRegistry::from_schema_table(&table).unwrap();
        assert_eq!(
            decode(&registry, &bytes).unwrap_err(),
            DecodeError::ClassResolution {
                name: "demo.Person".to_string()
            }
        );
    }

    #[test]
    fn test_concurrent_encodes_append_once() {
        let (_, table) = person_v1_bytes();
        let registry = Arc::new(ClassRegistry::from_schema_table(&table).unwrap());
        registry.bind::<PersonV2>().unwrap();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let person = ObjectRef::new(PersonV2 {
                        name: format!("worker-{i}"),
                        age: i,
                        email: Some(format!("w{i}@example.com")),
                    });
                    barrier.wait();
                    let bytes = encode(&registry, &person).unwrap();
                    let decoded = decode(&registry, &bytes).unwrap();
                    let decoded = decoded.read::<PersonV2>().unwrap();
                    assert_eq!(decoded.age, i);
                    assert_eq!(decoded.email.as_deref(), Some(format!("w{i}@example.com").as_str()));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.schema_of(0).unwrap().field_count(), 3);
    }

    #[test]
    fn test_enum_field_decodes_to_shared_constant() {
        let registry = ClassRegistry::new();
        registry.bind::<Pair>().unwrap();
        registry.bind::<Order>().unwrap();
        let pair = ObjectRef::new(Pair {
            left: Some(ObjectRef::new(Order::Ascending)),
            right: Some(ObjectRef::new(Order::Descending)),
        });

        let decoded = decode(&registry, &encode(&registry, &pair).unwrap()).unwrap();
        let decoded = decoded.read::<Pair>().unwrap();
        let ascending = registry.constant::<Order>(0).unwrap();
        assert!(decoded.left.as_ref().unwrap().ptr_eq(&ascending));
        assert_eq!(
            *decoded.right.as_ref().unwrap().read::<Order>().unwrap(),
            Order::Descending
        );
    }

    #[test]
    fn test_global_registry_is_shared() {
        assert!(std::ptr::eq(global_registry(), global_registry()));
        let id = global_registry().register::<Pair>().unwrap();
        assert_eq!(global_registry().register::<Pair>().unwrap(), id);
        assert_eq!(global_registry().class_id_of::<Pair>(), Some(id));
    }
}
