//! Object encoding and decoding.
//!
//! Wire shape of one object payload:
//!
//! ```text
//! varint classId
//!   [enum]             varint ordinal
//!   [self-describing]  payload written by the type's own routine
//!   [otherwise]        varint fieldCount
//!                      repeated { varint fieldId, value }
//! ```
//!
//! Field values are encoded by the value codec, which calls back into
//! [`ObjectEncoder::write_object`] / [`ObjectDecoder::read_object`] for
//! nested objects. An object is pushed on the identity stack before its
//! fields are walked, so fields that point back at it become back-references.

use std::sync::Arc;

use crate::codec::primitives::{Reader, Writer};
use crate::codec::stack::IdentityStack;
use crate::error::{DecodeError, EncodeError};
use crate::limits::{DEFAULT_MAX_DEPTH, MAX_FIELDS_PER_OBJECT};
use crate::model::{FieldValue, ObjectRef};
use crate::schema::def::TypeKind;
use crate::schema::{ClassRegistry, ClassSchema, TypeDef};

/// Writes objects and values for one top-level encode call.
pub struct ObjectEncoder<'r> {
    pub(super) registry: &'r ClassRegistry,
    pub(super) writer: Writer,
    pub(super) stack: IdentityStack,
    pub(super) depth: usize,
    pub(super) max_depth: usize,
}

impl<'r> ObjectEncoder<'r> {
    pub fn new(registry: &'r ClassRegistry) -> Self {
        Self::with_max_depth(registry, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(registry: &'r ClassRegistry, max_depth: usize) -> Self {
        Self {
            registry,
            writer: Writer::new(),
            stack: IdentityStack::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn registry(&self) -> &'r ClassRegistry {
        self.registry
    }

    /// Raw output, for self-describing routines that write their own bytes.
    pub fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    pub fn stack(&self) -> &IdentityStack {
        &self.stack
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }

    /// Writes a typed field value through the value codec.
    pub fn write_as<F: FieldValue>(&mut self, value: &F) -> Result<(), EncodeError> {
        self.write_value(&value.to_value())
    }

    /// Writes the payload of `obj` and records it on the identity stack.
    ///
    /// This does not check whether `obj` was already written; references to
    /// possibly shared objects go through [`write_value`](Self::write_value).
    pub fn write_object(&mut self, obj: &ObjectRef) -> Result<(), EncodeError> {
        let (class_id, schema, def) = self.registry.register_entry(obj.type_id(), obj.type_name())?;
        self.writer.write_varint(class_id as u64);
        self.stack.append(obj.clone());
        self.enter()?;
        self.write_body(obj, &schema, &def)?;
        self.depth -= 1;
        Ok(())
    }

    fn write_body(
        &mut self,
        obj: &ObjectRef,
        schema: &ClassSchema,
        def: &TypeDef,
    ) -> Result<(), EncodeError> {
        match def.kind() {
            TypeKind::SelfDescribing { write, .. } => {
                let guard = obj.raw_read();
                return write(&**guard, self);
            }
            TypeKind::Enum { constants, ordinal } => {
                let ordinal = ordinal(&**obj.raw_read())
                    .filter(|&ordinal| ordinal < constants.len())
                    .ok_or_else(|| EncodeError::InvalidOrdinal {
                        class: def.name().to_string(),
                        constants: constants.len(),
                    })?;
                self.writer.write_varint(ordinal as u64);
            }
            TypeKind::Plain => {}
        }

        // Read every field under one read lock, then release it before
        // recursing into nested objects.
        let entries = {
            let guard = obj.raw_read();
            let mut entries = Vec::with_capacity(def.fields().len());
            for (slot, decl) in def.fields().iter().enumerate() {
                let (id, field) = schema.resolve_field(slot, decl);
                let value = field.accessor(def).get(&**guard).map_err(|source| {
                    EncodeError::AccessorFault {
                        class: def.name().to_string(),
                        field: decl.name.clone(),
                        source,
                    }
                })?;
                entries.push((id, value));
            }
            entries
        };

        self.writer.write_varint(entries.len() as u64);
        for (id, value) in &entries {
            self.writer.write_varint(*id as u64);
            self.write_value(value)?;
        }
        Ok(())
    }

    pub(super) fn enter(&mut self) -> Result<(), EncodeError> {
        if self.depth >= self.max_depth {
            return Err(EncodeError::DepthExceeded {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }
}

/// Reads objects and values for one top-level decode call.
pub struct ObjectDecoder<'r, 'a> {
    pub(super) registry: &'r ClassRegistry,
    pub(super) reader: Reader<'a>,
    pub(super) stack: IdentityStack,
    pub(super) depth: usize,
    pub(super) max_depth: usize,
}

impl<'r, 'a> ObjectDecoder<'r, 'a> {
    pub fn new(registry: &'r ClassRegistry, data: &'a [u8]) -> Self {
        Self::with_max_depth(registry, data, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(registry: &'r ClassRegistry, data: &'a [u8], max_depth: usize) -> Self {
        Self {
            registry,
            reader: Reader::new(data),
            stack: IdentityStack::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn registry(&self) -> &'r ClassRegistry {
        self.registry
    }

    /// Raw input, for self-describing routines that read their own bytes.
    pub fn reader(&mut self) -> &mut Reader<'a> {
        &mut self.reader
    }

    pub fn stack(&self) -> &IdentityStack {
        &self.stack
    }

    /// Reads a value and converts it to `F`.
    pub fn read_as<F: FieldValue>(&mut self, context: &'static str) -> Result<F, DecodeError> {
        let value = self.read_value()?;
        F::from_value(value).map_err(|source| DecodeError::UnexpectedValue { context, source })
    }

    /// Reads one object payload.
    ///
    /// The instance is on the identity stack before any of its fields are
    /// decoded. Enum payloads yield the shared constant for their ordinal.
    pub fn read_object(&mut self) -> Result<ObjectRef, DecodeError> {
        let raw = self.reader.read_varint("class id")?;
        let class_id = usize::try_from(raw).map_err(|_| DecodeError::UnknownClassId {
            class_id: raw,
            registered: self.registry.len(),
        })?;
        let (schema, def) = self.registry.resolve(class_id)?;
        self.enter()?;

        let obj = match def.kind() {
            TypeKind::Enum { constants, .. } => {
                let ordinal = self.reader.read_varint("enum ordinal")?;
                usize::try_from(ordinal)
                    .ok()
                    .and_then(|ordinal| constants.get(ordinal))
                    .cloned()
                    .ok_or_else(|| DecodeError::OrdinalOutOfRange {
                        class: schema.name().to_string(),
                        ordinal,
                        constants: constants.len(),
                    })?
            }
            _ => self.registry.factory().create_blank(&def)?,
        };
        self.stack.append(obj.clone());

        match def.kind() {
            TypeKind::SelfDescribing { read, .. } => {
                let mut guard = obj.raw_write();
                read(&mut **guard, self)?;
            }
            _ => self.read_fields(&obj, &schema, &def)?,
        }
        self.depth -= 1;
        Ok(obj)
    }

    fn read_fields(
        &mut self,
        obj: &ObjectRef,
        schema: &Arc<ClassSchema>,
        def: &TypeDef,
    ) -> Result<(), DecodeError> {
        let count = self.reader.read_len(MAX_FIELDS_PER_OBJECT, "field count")?;
        for _ in 0..count {
            let raw = self.reader.read_varint("field id")?;
            let field = usize::try_from(raw)
                .ok()
                .and_then(|id| schema.field(id))
                .ok_or_else(|| DecodeError::UnknownFieldId {
                    class: schema.name().to_string(),
                    field_id: raw,
                    known: schema.field_count(),
                })?;
            let value = self.read_value()?;
            let mut guard = obj.raw_write();
            field
                .accessor(def)
                .set(&mut **guard, value)
                .map_err(|source| DecodeError::AccessorFault {
                    class: schema.name().to_string(),
                    field: field.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    pub(super) fn enter(&mut self) -> Result<(), DecodeError> {
        if self.depth >= self.max_depth {
            return Err(DecodeError::DepthExceeded {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::value::{TAG_BACKREF, TAG_OBJECT};
    use crate::error::AccessError;
    use crate::fixtures::{Account, Counter, Holder, Order, Person, Team};
    use crate::model::Bytes;
    use crate::model::Value;

    fn encode_root(registry: &ClassRegistry, root: &ObjectRef) -> Vec<u8> {
        let mut encoder = ObjectEncoder::new(registry);
        encoder.write_value(&Value::Object(root.clone())).unwrap();
        encoder.into_bytes()
    }

    fn decode_root(registry: &ClassRegistry, bytes: &[u8]) -> Result<ObjectRef, DecodeError> {
        let mut decoder = ObjectDecoder::new(registry, bytes);
        match decoder.read_value()? {
            Value::Object(obj) => Ok(obj),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_object_payload_layout() {
        let registry = ClassRegistry::new();
        registry.bind::<Person>().unwrap();
        let person = ObjectRef::new(Person {
            name: "ada".into(),
            age: 36,
        });

        let mut encoder = ObjectEncoder::new(&registry);
        encoder.write_object(&person).unwrap();
        let bytes = encoder.into_bytes();

        // class 0, two fields: id 0 = TEXT "ada", id 1 = INT zigzag(36)
        assert_eq!(bytes, [0, 2, 0, 6, 3, b'a', b'd', b'a', 1, 3, 72]);
    }

    #[test]
    fn test_enum_writes_ordinal_and_reads_constant() {
        let registry = ClassRegistry::new();
        registry.bind::<Order>().unwrap();
        let desc = registry.constant::<Order>(1).unwrap();

        let mut encoder = ObjectEncoder::new(&registry);
        encoder.write_object(&ObjectRef::new(Order::Descending)).unwrap();
        let bytes = encoder.into_bytes();
        assert_eq!(bytes, [0, 1, 0]);

        let decoded = ObjectDecoder::new(&registry, &bytes).read_object().unwrap();
        assert!(decoded.ptr_eq(&desc));
    }

    #[test]
    fn test_ordinal_out_of_range() {
        let registry = ClassRegistry::new();
        registry.register::<Order>().unwrap();
        let err = ObjectDecoder::new(&registry, &[0, 5, 0]).read_object().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::OrdinalOutOfRange { ordinal: 5, constants: 2, .. }
        ));
    }

    #[test]
    fn test_unknown_class_and_field_ids() {
        let registry = ClassRegistry::new();
        registry.register::<Person>().unwrap();

        let err = decode_root(&registry, &[TAG_OBJECT, 99, 0]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownClassId {
                class_id: 99,
                registered: 1
            }
        );

        let err = decode_root(&registry, &[TAG_OBJECT, 0, 1, 9, 0]).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownFieldId { field_id: 9, known: 2, .. }));
    }

    #[test]
    fn test_back_reference_out_of_range() {
        let registry = ClassRegistry::new();
        registry.register::<Team>().unwrap();
        // Team { lead = BACKREF 4 }
        let err = decode_root(&registry, &[TAG_OBJECT, 0, 1, 0, TAG_BACKREF, 4]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BackReferenceOutOfRange {
                position: 4,
                size: 1
            }
        );
    }

    #[test]
    fn test_setter_failure_is_accessor_fault() {
        let registry = ClassRegistry::new();
        registry.register::<Person>().unwrap();
        // age (field 1) carries a text value
        let err = decode_root(&registry, &[TAG_OBJECT, 0, 1, 1, 6, 1, b'x']).unwrap_err();
        assert_eq!(
            err,
            DecodeError::AccessorFault {
                class: "demo.Person".to_string(),
                field: "age".to_string(),
                source: AccessError::TypeMismatch {
                    expected: "i32",
                    found: "text"
                },
            }
        );
    }

    #[test]
    fn test_setter_methods_run_on_decode() {
        let registry = ClassRegistry::new();
        registry.bind::<Account>().unwrap();
        let account = ObjectRef::new(Account {
            owner: "ada".into(),
            balance: 40,
            audit: 0,
        });

        let bytes = encode_root(&registry, &account);
        let decoded = decode_root(&registry, &bytes).unwrap();
        let decoded = decoded.read::<Account>().unwrap();
        // get_owner upper-cases; the owner slot is written directly
        assert_eq!(decoded.owner, "ADA");
        assert_eq!(decoded.balance, 40);
        assert_eq!(decoded.audit, 1);
    }

    #[test]
    fn test_self_describing_routines() {
        let registry = ClassRegistry::new();
        registry.bind::<Counter>().unwrap();
        let counter = ObjectRef::new(Counter {
            label: "hits".into(),
            hits: 41,
        });

        let bytes = encode_root(&registry, &counter);
        let decoded = decode_root(&registry, &bytes).unwrap();
        let decoded = decoded.read::<Counter>().unwrap();
        assert_eq!(decoded.label, "hits");
        assert_eq!(decoded.hits, 42);
        assert!(registry.schema_of(0).unwrap().is_self_describing());
    }

    #[test]
    fn test_rejecting_setter_is_accessor_fault() {
        let registry = ClassRegistry::new();
        registry.bind::<Account>().unwrap();
        let account = ObjectRef::new(Account {
            owner: "ada".into(),
            balance: -5,
            audit: 0,
        });

        let bytes = encode_root(&registry, &account);
        assert_eq!(
            decode_root(&registry, &bytes).unwrap_err(),
            DecodeError::AccessorFault {
                class: "demo.Account".to_string(),
                field: "balance".to_string(),
                source: AccessError::Rejected("negative balance -5".to_string()),
            }
        );
    }

    #[test]
    fn test_self_describing_shares_identity_stack() {
        let registry = ClassRegistry::new();
        registry.bind::<Holder>().unwrap();
        registry.bind::<Person>().unwrap();
        let friend = ObjectRef::new(Person {
            name: "Ada".into(),
            age: 36,
        });
        let holder = ObjectRef::new(Holder {
            me: None,
            friend: Some(friend.clone()),
            friend2: Some(friend),
            payload: Bytes(vec![1, 2, 3]),
        });
        holder.write::<Holder>().unwrap().me = Some(holder.clone());

        let bytes = encode_root(&registry, &holder);
        // root, then self as back-reference 0, friend in full, friend2 as back-reference 1
        assert_eq!(&bytes[..4], [TAG_OBJECT, 0, TAG_BACKREF, 0]);
        assert_eq!(bytes.iter().filter(|&&b| b == TAG_OBJECT).count(), 2);

        let decoded = decode_root(&registry, &bytes).unwrap();
        {
            let copy = decoded.read::<Holder>().unwrap();
            assert!(copy.me.as_ref().unwrap().ptr_eq(&decoded));
            let friend = copy.friend.as_ref().unwrap();
            assert!(friend.ptr_eq(copy.friend2.as_ref().unwrap()));
            assert_eq!(friend.read::<Person>().unwrap().name, "Ada");
            assert_eq!(copy.payload, Bytes(vec![1, 2, 3]));
        }
        assert_eq!(registry.class_id_of::<Person>(), Some(1));

        decoded.write::<Holder>().unwrap().me = None;
        holder.write::<Holder>().unwrap().me = None;
    }

    #[test]
    fn test_depth_limit() {
        let registry = ClassRegistry::new();
        registry.bind::<Team>().unwrap();
        let inner = ObjectRef::new(Team::default());
        let outer = ObjectRef::new(Team {
            lead: Some(inner),
            ..Team::default()
        });

        let mut encoder = ObjectEncoder::with_max_depth(&registry, 1);
        let err = encoder.write_value(&Value::Object(outer.clone())).unwrap_err();
        assert_eq!(err, EncodeError::DepthExceeded { max: 1 });

        let bytes = encode_root(&registry, &outer);
        let mut decoder = ObjectDecoder::with_max_depth(&registry, &bytes, 1);
        assert_eq!(
            decoder.read_value().unwrap_err(),
            DecodeError::DepthExceeded { max: 1 }
        );
    }
}
