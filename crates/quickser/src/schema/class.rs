//! Class and field schemas.
//!
//! A [`ClassSchema`] is the wire-level description of one class: its name,
//! enum and self-describing flags, and the ordered table of fields whose
//! positions are the field ids. The field table only ever grows; new fields
//! are appended when a writer encounters a field the table does not know.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::schema::accessor::Accessor;
use crate::schema::def::{FieldDecl, TypeDef};

/// Dense id of a class within a registry.
pub type ClassId = usize;

/// Position of a field within its class schema.
pub type FieldId = usize;

/// One entry of a class's field table.
#[derive(Debug)]
pub struct FieldSchema {
    name: String,
    primitive: bool,
    declared_type: String,
    accessor: OnceLock<Accessor>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, primitive: bool, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitive,
            declared_type: declared_type.into(),
            accessor: OnceLock::new(),
        }
    }

    pub(crate) fn from_decl(decl: &FieldDecl) -> Self {
        Self::new(decl.name.clone(), decl.primitive, decl.declared_type.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    /// True once the accessor has been resolved by a first use.
    pub fn is_resolved(&self) -> bool {
        self.accessor.get().is_some()
    }

    /// Returns the accessor, resolving it against `def` on first use.
    pub(crate) fn accessor(&self, def: &TypeDef) -> &Accessor {
        self.accessor.get_or_init(|| Accessor::resolve(def, &self.name))
    }
}

#[derive(Debug, Default)]
struct FieldTable {
    fields: Vec<Arc<FieldSchema>>,
    by_name: FxHashMap<String, FieldId>,
}

impl FieldTable {
    fn push(&mut self, field: FieldSchema) -> FieldId {
        let id = self.fields.len();
        self.by_name.entry(field.name.clone()).or_insert(id);
        self.fields.push(Arc::new(field));
        id
    }
}

/// Wire-level description of one class.
#[derive(Debug)]
pub struct ClassSchema {
    name: String,
    is_enum: bool,
    is_self_describing: bool,
    fields: RwLock<FieldTable>,
}

impl ClassSchema {
    /// Creates a field-by-field schema.
    pub fn new(
        name: impl Into<String>,
        is_enum: bool,
        fields: impl IntoIterator<Item = FieldSchema>,
    ) -> Self {
        let mut table = FieldTable::default();
        for field in fields {
            table.push(field);
        }
        Self {
            name: name.into(),
            is_enum,
            is_self_describing: false,
            fields: RwLock::new(table),
        }
    }

    /// Creates a self-describing schema, which carries no field table.
    pub fn self_describing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_enum: false,
            is_self_describing: true,
            fields: RwLock::new(FieldTable::default()),
        }
    }

    pub(crate) fn from_def(def: &TypeDef) -> Self {
        if def.is_self_describing() {
            Self::self_describing(def.name())
        } else {
            Self::new(
                def.name(),
                def.is_enum(),
                def.fields().iter().map(FieldSchema::from_decl),
            )
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enum(&self) -> bool {
        self.is_enum
    }

    pub fn is_self_describing(&self) -> bool {
        self.is_self_describing
    }

    pub fn field_count(&self) -> usize {
        self.fields.read().fields.len()
    }

    pub fn field(&self, id: FieldId) -> Option<Arc<FieldSchema>> {
        self.fields.read().fields.get(id).cloned()
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields.read().by_name.get(name).copied()
    }

    /// Snapshot of the field table in id order.
    pub fn fields(&self) -> Vec<Arc<FieldSchema>> {
        self.fields.read().fields.clone()
    }

    /// Finds the id of a discovered field, appending it if the table has no
    /// field of that name.
    ///
    /// `slot` is the field's position in discovery order; it is tried first
    /// and accepted only when the names agree.
    pub(crate) fn resolve_field(&self, slot: usize, decl: &FieldDecl) -> (FieldId, Arc<FieldSchema>) {
        {
            let table = self.fields.read();
            if let Some(field) = table.fields.get(slot).filter(|f| f.name == decl.name) {
                return (slot, Arc::clone(field));
            }
            if let Some(&id) = table.by_name.get(&decl.name) {
                return (id, Arc::clone(&table.fields[id]));
            }
        }
        self.append_field(FieldSchema::from_decl(decl))
    }

    /// Appends a field under the write lock.
    ///
    /// If a concurrent caller appended the same name first, its id is
    /// returned instead and the table is unchanged.
    pub(crate) fn append_field(&self, field: FieldSchema) -> (FieldId, Arc<FieldSchema>) {
        let mut table = self.fields.write();
        if let Some(&id) = table.by_name.get(&field.name) {
            return (id, Arc::clone(&table.fields[id]));
        }
        let id = table.push(field);
        let field = Arc::clone(&table.fields[id]);
        log::debug!(
            "class {} gained field {:?} ({}) as id {id}",
            self.name,
            field.name,
            field.declared_type
        );
        (id, field)
    }
}
