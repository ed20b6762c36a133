//! Schema table persistence.
//!
//! The table lists every class of a registry in class id order:
//!
//! ```text
//! varint classCount
//! repeated {
//!     string typeName, bool isEnum, bool isSelfDescribing,
//!     [if not self-describing] varint fieldCount,
//!         repeated { string fieldName, bool isPrimitive, string declaredTypeName }
//! }
//! ```
//!
//! A registry rebuilt from a table keeps the stored class ids and field ids,
//! so data written by the exporting process stays decodable.

use rustc_hash::FxHashSet;

use crate::codec::primitives::{Reader, Writer};
use crate::error::DecodeError;
use crate::limits::{MAX_FIELDS_PER_OBJECT, MAX_NAME_LEN, MAX_SCHEMA_TABLE_LEN};
use crate::schema::class::{ClassSchema, FieldSchema};
use crate::schema::registry::ClassRegistry;

impl ClassRegistry {
    /// Serializes every schema of this registry.
    pub fn export_schema_table(&self) -> Vec<u8> {
        let schemas = self.schemas();
        let mut writer = Writer::with_capacity(64 * schemas.len());
        writer.write_varint(schemas.len() as u64);
        for schema in &schemas {
            write_schema(&mut writer, schema);
        }
        writer.into_bytes()
    }

    /// Builds a registry from an exported schema table.
    ///
    /// Loaded classes have no live type until a type bound under the same
    /// name is registered or resolved.
    pub fn from_schema_table(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);
        let count = reader.read_len(MAX_SCHEMA_TABLE_LEN, "schema table")?;
        let mut schemas = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            schemas.push(read_schema(&mut reader)?);
        }
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes {
                remaining: reader.remaining_len(),
            });
        }
        ClassRegistry::with_schemas(schemas)
    }
}

fn write_schema(writer: &mut Writer, schema: &ClassSchema) {
    writer.write_string(schema.name());
    writer.write_bool(schema.is_enum());
    writer.write_bool(schema.is_self_describing());
    if schema.is_self_describing() {
        return;
    }
    let fields = schema.fields();
    writer.write_varint(fields.len() as u64);
    for field in &fields {
        writer.write_string(field.name());
        writer.write_bool(field.is_primitive());
        writer.write_string(field.declared_type());
    }
}

fn read_schema(reader: &mut Reader<'_>) -> Result<ClassSchema, DecodeError> {
    let name = reader.read_string(MAX_NAME_LEN, "class name")?;
    let is_enum = reader.read_bool("enum flag")?;
    let is_self_describing = reader.read_bool("self-describing flag")?;
    if is_self_describing {
        if is_enum {
            return Err(DecodeError::MalformedEncoding {
                context: "class flagged both enum and self-describing",
            });
        }
        return Ok(ClassSchema::self_describing(name));
    }

    let count = reader.read_len(MAX_FIELDS_PER_OBJECT, "field count")?;
    // Each field record takes at least three bytes
    let capacity = count.min(reader.remaining_len() / 3);
    let mut fields: Vec<FieldSchema> = Vec::with_capacity(capacity);
    let mut seen = FxHashSet::with_capacity_and_hasher(capacity, Default::default());
    for _ in 0..count {
        let field_name = reader.read_string(MAX_NAME_LEN, "field name")?;
        let primitive = reader.read_bool("primitive flag")?;
        let declared_type = reader.read_string(MAX_NAME_LEN, "declared type")?;
        if !seen.insert(field_name.clone()) {
            return Err(DecodeError::MalformedEncoding {
                context: "duplicate field name in schema table",
            });
        }
        fields.push(FieldSchema::new(field_name, primitive, declared_type));
    }
    Ok(ClassSchema::new(name, is_enum, fields))
}
