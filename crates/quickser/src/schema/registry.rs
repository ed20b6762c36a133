//! The class registry.
//!
//! Maps Rust types to dense class ids and owns their schemas. Types are
//! first *bound* (their [`TypeDef`] is recorded under its wire name) and then
//! *registered* (given a class id and a [`ClassSchema`]) on first encode.
//! Schemas loaded from a persisted table start without a live type and are
//! linked to a bound type of the same name when first needed.
//!
//! Registration and linking take the write lock and re-check, so a type never
//! receives two ids; steady-state lookups only take the read lock.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{DecodeError, EncodeError};
use crate::model::ObjectRef;
use crate::schema::class::{ClassId, ClassSchema};
use crate::schema::def::{Serializable, TypeDef};
use crate::schema::factory::InstanceFactory;

#[derive(Default)]
struct TypeTable {
    by_id: FxHashMap<TypeId, Arc<TypeDef>>,
    by_name: FxHashMap<String, TypeId>,
}

#[derive(Default)]
struct ClassTable {
    schemas: Vec<Arc<ClassSchema>>,
    /// Live type per class id; `None` until a loaded schema is linked.
    types: Vec<Option<Arc<TypeDef>>>,
    by_type: FxHashMap<TypeId, ClassId>,
    by_name: FxHashMap<String, ClassId>,
}

impl ClassTable {
    fn live(&self, id: ClassId) -> Option<(ClassId, Arc<ClassSchema>, Arc<TypeDef>)> {
        let def = self.types.get(id)?.as_ref()?;
        Some((id, Arc::clone(&self.schemas[id]), Arc::clone(def)))
    }
}

/// Shared, append-only mapping between types and class ids.
#[derive(Default)]
pub struct ClassRegistry {
    types: RwLock<TypeTable>,
    classes: RwLock<ClassTable>,
    factory: InstanceFactory,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry whose class ids are taken from `schemas`, in order.
    pub(crate) fn with_schemas(schemas: Vec<ClassSchema>) -> Result<Self, DecodeError> {
        let mut table = ClassTable::default();
        for schema in schemas {
            let id = table.schemas.len();
            if table.by_name.insert(schema.name().to_string(), id).is_some() {
                return Err(DecodeError::MalformedEncoding {
                    context: "duplicate class name in schema table",
                });
            }
            table.schemas.push(Arc::new(schema));
            table.types.push(None);
        }
        log::debug!("loaded schema table with {} classes", table.schemas.len());
        Ok(Self {
            types: RwLock::default(),
            classes: RwLock::new(table),
            factory: InstanceFactory::new(),
        })
    }

    /// Records `T`'s definition so it can be registered and resolved by name.
    ///
    /// Binding the same type twice is a no-op. Fails if another type is
    /// already bound under the same wire name.
    pub fn bind<T: Serializable>(&self) -> Result<(), EncodeError> {
        let type_id = TypeId::of::<T>();
        if self.types.read().by_id.contains_key(&type_id) {
            return Ok(());
        }
        let def = TypeDef::of::<T>();
        let mut types = self.types.write();
        if types.by_id.contains_key(&type_id) {
            return Ok(());
        }
        if types.by_name.contains_key(def.name()) {
            return Err(EncodeError::DuplicateTypeName {
                name: def.name().to_string(),
            });
        }
        log::debug!("bound {} as {:?}", def.rust_name(), def.name());
        types.by_name.insert(def.name().to_string(), type_id);
        types.by_id.insert(type_id, Arc::new(def));
        Ok(())
    }

    /// Binds `T` and returns its class id, assigning one if needed.
    pub fn register<T: Serializable>(&self) -> Result<ClassId, EncodeError> {
        self.bind::<T>()?;
        self.register_class(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Returns the class id of a bound type, assigning the next id on first
    /// encounter.
    pub fn register_class(&self, type_id: TypeId, type_name: &str) -> Result<ClassId, EncodeError> {
        self.register_entry(type_id, type_name).map(|(id, _, _)| id)
    }

    pub(crate) fn register_entry(
        &self,
        type_id: TypeId,
        type_name: &str,
    ) -> Result<(ClassId, Arc<ClassSchema>, Arc<TypeDef>), EncodeError> {
        {
            let classes = self.classes.read();
            if let Some(entry) = classes.by_type.get(&type_id).and_then(|&id| classes.live(id)) {
                return Ok(entry);
            }
        }

        let def = self.types.read().by_id.get(&type_id).cloned().ok_or_else(|| {
            EncodeError::NotSerializable {
                type_name: type_name.to_string(),
            }
        })?;

        let mut classes = self.classes.write();
        if let Some(entry) = classes.by_type.get(&type_id).and_then(|&id| classes.live(id)) {
            return Ok(entry);
        }

        let id = match classes.by_name.get(def.name()).copied() {
            Some(id) => {
                check_kind(&classes.schemas[id], &def)?;
                log::debug!(
                    "adopted stored schema {:?} (class id {id}) for {}",
                    def.name(),
                    def.rust_name()
                );
                classes.types[id] = Some(Arc::clone(&def));
                id
            }
            None => {
                let id = classes.schemas.len();
                let schema = ClassSchema::from_def(&def);
                log::debug!(
                    "registered class {:?} as id {id} with {} fields",
                    def.name(),
                    schema.field_count()
                );
                classes.schemas.push(Arc::new(schema));
                classes.types.push(Some(Arc::clone(&def)));
                classes.by_name.insert(def.name().to_string(), id);
                id
            }
        };
        classes.by_type.insert(type_id, id);
        Ok((id, Arc::clone(&classes.schemas[id]), def))
    }

    /// Returns the schema of `id`.
    pub fn schema_of(&self, id: ClassId) -> Option<Arc<ClassSchema>> {
        self.classes.read().schemas.get(id).cloned()
    }

    /// Returns the live type of `id`, resolving it by stored name if the
    /// class was loaded from a schema table.
    pub fn type_of(&self, id: ClassId) -> Result<Arc<TypeDef>, DecodeError> {
        self.resolve(id).map(|(_, def)| def)
    }

    pub(crate) fn resolve(&self, id: ClassId) -> Result<(Arc<ClassSchema>, Arc<TypeDef>), DecodeError> {
        let schema = {
            let classes = self.classes.read();
            if let Some((_, schema, def)) = classes.live(id) {
                return Ok((schema, def));
            }
            classes
                .schemas
                .get(id)
                .cloned()
                .ok_or(DecodeError::UnknownClassId {
                    class_id: id as u64,
                    registered: classes.schemas.len(),
                })?
        };

        let def = {
            let types = self.types.read();
            types
                .by_name
                .get(schema.name())
                .and_then(|type_id| types.by_id.get(type_id))
                .cloned()
        }
        .ok_or_else(|| DecodeError::ClassResolution {
            name: schema.name().to_string(),
        })?;

        if let Some(reason) = kind_mismatch(&schema, &def) {
            return Err(DecodeError::SchemaMismatch {
                class: schema.name().to_string(),
                reason,
            });
        }

        let mut classes = self.classes.write();
        if let Some((_, schema, def)) = classes.live(id) {
            return Ok((schema, def));
        }
        log::debug!(
            "linked stored class {:?} (class id {id}) to {}",
            schema.name(),
            def.rust_name()
        );
        classes.types[id] = Some(Arc::clone(&def));
        classes.by_type.insert(TypeDef::type_id(&def), id);
        Ok((schema, def))
    }

    /// Returns the class id of `T` if it has been registered or linked.
    pub fn class_id_of<T: Any>(&self) -> Option<ClassId> {
        self.classes.read().by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the shared enum constant of `T` at `ordinal`.
    pub fn constant<T: Serializable>(&self, ordinal: usize) -> Option<ObjectRef> {
        let types = self.types.read();
        types.by_id.get(&TypeId::of::<T>())?.constants().get(ordinal).cloned()
    }

    pub fn factory(&self) -> &InstanceFactory {
        &self.factory
    }

    /// Number of classes with an assigned id.
    pub fn len(&self) -> usize {
        self.classes.read().schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all schemas in class id order.
    pub fn schemas(&self) -> Vec<Arc<ClassSchema>> {
        self.classes.read().schemas.clone()
    }
}

/// The live type must still be read and written the way its stored schema
/// describes.
fn kind_mismatch(schema: &ClassSchema, def: &TypeDef) -> Option<&'static str> {
    if schema.is_enum() != def.is_enum() {
        Some("enum flag differs")
    } else if schema.is_self_describing() != def.is_self_describing() {
        Some("self-describing flag differs")
    } else {
        None
    }
}

fn check_kind(schema: &ClassSchema, def: &TypeDef) -> Result<(), EncodeError> {
    match kind_mismatch(schema, def) {
        Some(reason) => Err(EncodeError::SchemaConflict {
            class: def.name().to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = self.classes.read();
        let names: Vec<&str> = classes.schemas.iter().map(|s| s.name()).collect();
        f.debug_struct("ClassRegistry")
            .field("classes", &names)
            .field("bound_types", &self.types.read().by_id.len())
            .finish()
    }
}
