//! Type definitions.
//!
//! A [`TypeDef`] is the lookup table that stands in for runtime reflection:
//! for one Rust type it lists the field slots (direct access), the named
//! getter/setter methods, an optional embedded ancestor, the blank
//! constructor, and whether the type is an enum or self-describing.
//! Types describe themselves once through [`Serializable::describe`].
//!
//! # Example
//!
//! ```rust
//! use quickser::{ClassBuilder, Serializable};
//!
//! #[derive(Default)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//!     label: Option<String>,
//! }
//!
//! impl Serializable for Point {
//!     fn describe(class: &mut ClassBuilder<Self>) {
//!         class
//!             .name("geo.Point")
//!             .blank_default()
//!             .field("x", |p| &p.x, |p| &mut p.x)
//!             .field("y", |p| &p.y, |p| &mut p.y)
//!             .field("label", |p| &p.label, |p| &mut p.label);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::codec::{ObjectDecoder, ObjectEncoder};
use crate::error::{AccessError, DecodeError, EncodeError};
use crate::model::{AnyBox, FieldValue, ObjectRef, Value};

/// A type whose instances can be written field-by-field.
///
/// Implementing this trait is what marks a type serializable; binding it to a
/// [`ClassRegistry`](crate::ClassRegistry) makes it known to the codec.
pub trait Serializable: Any + Send + Sync + Sized {
    /// Declares the type's wire name, fields, accessors and flags.
    fn describe(class: &mut ClassBuilder<Self>);
}

pub(crate) type Getter = Arc<dyn Fn(&dyn Any) -> Result<Value, AccessError> + Send + Sync>;
pub(crate) type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<(), AccessError> + Send + Sync>;
pub(crate) type BlankFn = Arc<dyn Fn() -> AnyBox + Send + Sync>;
pub(crate) type OrdinalFn = Arc<dyn Fn(&dyn Any) -> Option<usize> + Send + Sync>;
pub(crate) type WriteSelfFn =
    Arc<dyn Fn(&dyn Any, &mut ObjectEncoder<'_>) -> Result<(), EncodeError> + Send + Sync>;
pub(crate) type ReadSelfFn =
    Arc<dyn Fn(&mut dyn Any, &mut ObjectDecoder<'_, '_>) -> Result<(), DecodeError> + Send + Sync>;

pub(crate) fn getter_fn<F>(f: F) -> Getter
where
    F: Fn(&dyn Any) -> Result<Value, AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn setter_fn<F>(f: F) -> Setter
where
    F: Fn(&mut dyn Any, Value) -> Result<(), AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn receiver<T: Any>(obj: &dyn Any) -> Result<&T, AccessError> {
    obj.downcast_ref::<T>().ok_or(AccessError::WrongReceiver {
        expected: std::any::type_name::<T>(),
    })
}

fn receiver_mut<T: Any>(obj: &mut dyn Any) -> Result<&mut T, AccessError> {
    obj.downcast_mut::<T>().ok_or(AccessError::WrongReceiver {
        expected: std::any::type_name::<T>(),
    })
}

/// Name, primitive flag and declared type of one discovered field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub primitive: bool,
    pub declared_type: String,
}

/// A field slot with direct access.
#[derive(Clone)]
pub(crate) struct FieldDef {
    pub(crate) decl: FieldDecl,
    pub(crate) get: Getter,
    pub(crate) set: Setter,
}

pub(crate) enum TypeKind {
    Plain,
    Enum {
        constants: Vec<ObjectRef>,
        ordinal: OrdinalFn,
    },
    SelfDescribing {
        write: WriteSelfFn,
        read: ReadSelfFn,
    },
}

/// Moves from an object to the ancestor value embedded in it.
pub(crate) trait Projection: Send + Sync {
    /// Rust name of the embedding type.
    fn owner(&self) -> &'static str;

    fn project<'a>(&self, obj: &'a dyn Any) -> Option<&'a dyn Any>;

    fn project_mut<'a>(&self, obj: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

struct Embedded<T, P, U, M> {
    up: U,
    up_mut: M,
    _marker: PhantomData<fn(&T) -> &P>,
}

impl<T, P, U, M> Projection for Embedded<T, P, U, M>
where
    T: Any,
    P: Any,
    U: Fn(&T) -> &P + Send + Sync,
    M: Fn(&mut T) -> &mut P + Send + Sync,
{
    fn owner(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn project<'a>(&self, obj: &'a dyn Any) -> Option<&'a dyn Any> {
        let this = obj.downcast_ref::<T>()?;
        let parent: &dyn Any = (self.up)(this);
        Some(parent)
    }

    fn project_mut<'a>(&self, obj: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let this = obj.downcast_mut::<T>()?;
        let parent: &mut dyn Any = (self.up_mut)(this);
        Some(parent)
    }
}

pub(crate) struct Parent {
    pub(crate) def: TypeDef,
    pub(crate) projection: Arc<dyn Projection>,
}

/// Live definition of one Rust type.
pub struct TypeDef {
    type_id: TypeId,
    rust_name: &'static str,
    name: String,
    kind: TypeKind,
    fields: Vec<FieldDef>,
    getters: FxHashMap<String, Getter>,
    setters: FxHashMap<String, Setter>,
    parent: Option<Box<Parent>>,
    blank: Option<BlankFn>,
    discovered: Vec<FieldDecl>,
}

impl TypeDef {
    /// Builds the definition of `T` from its [`Serializable::describe`].
    pub fn of<T: Serializable>() -> Self {
        let mut builder = ClassBuilder::<T>::new();
        T::describe(&mut builder);
        builder.build()
    }

    /// Wire name, stored in the schema table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type name.
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { .. })
    }

    pub fn is_self_describing(&self) -> bool {
        matches!(self.kind, TypeKind::SelfDescribing { .. })
    }

    /// All serializable fields across the ancestor chain, concrete type
    /// first, deduplicated by name.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.discovered
    }

    /// Enum constants in ordinal order; empty for other types.
    pub fn constants(&self) -> &[ObjectRef] {
        match &self.kind {
            TypeKind::Enum { constants, .. } => constants,
            _ => &[],
        }
    }

    /// Wire names of the ancestor chain, nearest first.
    pub fn ancestors(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut level = self.parent.as_deref();
        while let Some(parent) = level {
            names.push(parent.def.name());
            level = parent.def.parent.as_deref();
        }
        names
    }

    pub(crate) fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub(crate) fn blank(&self) -> Option<&BlankFn> {
        self.blank.as_ref()
    }

    pub(crate) fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.decl.name == name)
    }

    pub(crate) fn getter(&self, name: &str) -> Option<&Getter> {
        self.getters.get(name)
    }

    pub(crate) fn setter(&self, name: &str) -> Option<&Setter> {
        self.setters.get(name)
    }

    /// Visits this type and then each ancestor until `visit` returns a value.
    ///
    /// `path` holds the projections leading from this type to the visited one.
    pub(crate) fn walk<R>(
        &self,
        mut visit: impl FnMut(&TypeDef, &[Arc<dyn Projection>]) -> Option<R>,
    ) -> Option<R> {
        let mut path: Vec<Arc<dyn Projection>> = Vec::new();
        let mut level = self;
        loop {
            if let Some(found) = visit(level, &path) {
                return Some(found);
            }
            let parent = level.parent.as_deref()?;
            path.push(Arc::clone(&parent.projection));
            level = &parent.def;
        }
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TypeKind::Plain => "plain",
            TypeKind::Enum { .. } => "enum",
            TypeKind::SelfDescribing { .. } => "self-describing",
        };
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("rust_name", &self.rust_name)
            .field("kind", &kind)
            .field("fields", &self.discovered)
            .field("ancestors", &self.ancestors())
            .finish()
    }
}

/// Builder handed to [`Serializable::describe`].
pub struct ClassBuilder<T> {
    def: TypeDef,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serializable> ClassBuilder<T> {
    fn new() -> Self {
        let rust_name = std::any::type_name::<T>();
        Self {
            def: TypeDef {
                type_id: TypeId::of::<T>(),
                rust_name,
                name: rust_name.to_string(),
                kind: TypeKind::Plain,
                fields: Vec::new(),
                getters: FxHashMap::default(),
                setters: FxHashMap::default(),
                parent: None,
                blank: None,
                discovered: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    fn build(mut self) -> TypeDef {
        let mut discovered: Vec<FieldDecl> = Vec::new();
        let inherited = self.def.parent.as_ref().map(|p| p.def.discovered.as_slice()).unwrap_or(&[]);
        for decl in self.def.fields.iter().map(|f| &f.decl).chain(inherited) {
            if !discovered.iter().any(|d| d.name == decl.name) {
                discovered.push(decl.clone());
            }
        }
        self.def.discovered = discovered;
        self.def
    }

    /// Sets the wire name. Defaults to the Rust type name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.def.name = name.into();
        self
    }

    /// Sets the blank constructor used when decoding.
    ///
    /// It must build a placeholder instance without side effects; every
    /// serialized field is assigned afterwards.
    pub fn blank(&mut self, make: fn() -> T) -> &mut Self {
        self.def.blank = Some(Arc::new(move || Box::new(make()) as AnyBox));
        self
    }

    /// Declares a field slot with direct access.
    pub fn field<F, G, M>(&mut self, name: &str, get: G, get_mut: M) -> &mut Self
    where
        F: FieldValue,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let field = FieldDef {
            decl: FieldDecl {
                name: name.to_string(),
                primitive: F::PRIMITIVE,
                declared_type: F::TYPE_NAME.to_string(),
            },
            get: getter_fn(move |obj| Ok(get(receiver::<T>(obj)?).to_value())),
            set: setter_fn(move |obj, value| {
                let slot = get_mut(receiver_mut::<T>(obj)?);
                *slot = F::from_value(value)?;
                Ok(())
            }),
        };
        match self.def.fields.iter_mut().find(|f| f.decl.name == name) {
            Some(existing) => *existing = field,
            None => self.def.fields.push(field),
        }
        self
    }

    /// Declares a getter method, e.g. `get_total` for field `total`.
    pub fn getter<G>(&mut self, method: &str, get: G) -> &mut Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let getter = getter_fn(move |obj| Ok(get(receiver::<T>(obj)?)));
        self.def.getters.insert(method.to_string(), getter);
        self
    }

    /// Declares a setter method, e.g. `set_total` for field `total`.
    pub fn setter<S>(&mut self, method: &str, set: S) -> &mut Self
    where
        S: Fn(&mut T, Value) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        let setter = setter_fn(move |obj, value| set(receiver_mut::<T>(obj)?, value));
        self.def.setters.insert(method.to_string(), setter);
        self
    }

    /// Embeds an ancestor type: its fields and accessors are inherited.
    pub fn extends<P, U, M>(&mut self, up: U, up_mut: M) -> &mut Self
    where
        P: Serializable,
        U: Fn(&T) -> &P + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut P + Send + Sync + 'static,
    {
        let projection = Embedded {
            up,
            up_mut,
            _marker: PhantomData,
        };
        self.def.parent = Some(Box::new(Parent {
            def: TypeDef::of::<P>(),
            projection: Arc::new(projection),
        }));
        self
    }

    /// Marks the type as an enum with a fixed constant table.
    ///
    /// `ordinal` must return each constant's index in `constants`.
    pub fn constants<I, O>(&mut self, constants: I, ordinal: O) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        O: Fn(&T) -> usize + Send + Sync + 'static,
    {
        let ordinal: OrdinalFn =
            Arc::new(move |obj: &dyn Any| obj.downcast_ref::<T>().map(|value| ordinal(value)));
        self.def.kind = TypeKind::Enum {
            constants: constants.into_iter().map(ObjectRef::new).collect(),
            ordinal,
        };
        self
    }

    /// Marks the type as self-describing: `write` and `read` own its
    /// complete wire representation.
    pub fn self_describing<W, R>(&mut self, write: W, read: R) -> &mut Self
    where
        W: Fn(&T, &mut ObjectEncoder<'_>) -> Result<(), EncodeError> + Send + Sync + 'static,
        R: Fn(&mut T, &mut ObjectDecoder<'_, '_>) -> Result<(), DecodeError> + Send + Sync + 'static,
    {
        let class = self.def.name.clone();
        let write = write_self_fn(move |obj, encoder| match obj.downcast_ref::<T>() {
            Some(this) => write(this, encoder),
            None => Err(EncodeError::SchemaConflict {
                class: class.clone(),
                reason: "self-describing writer received a foreign instance",
            }),
        });
        let class = self.def.name.clone();
        let read = read_self_fn(move |obj, decoder| match obj.downcast_mut::<T>() {
            Some(this) => read(this, decoder),
            None => Err(DecodeError::SchemaMismatch {
                class: class.clone(),
                reason: "self-describing reader received a foreign instance",
            }),
        });
        self.def.kind = TypeKind::SelfDescribing { write, read };
        self
    }
}

impl<T: Serializable + Default> ClassBuilder<T> {
    /// Uses `T::default` as the blank constructor.
    pub fn blank_default(&mut self) -> &mut Self {
        self.blank(T::default)
    }
}

fn write_self_fn<F>(f: F) -> WriteSelfFn
where
    F: Fn(&dyn Any, &mut ObjectEncoder<'_>) -> Result<(), EncodeError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn read_self_fn<F>(f: F) -> ReadSelfFn
where
    F: Fn(&mut dyn Any, &mut ObjectDecoder<'_, '_>) -> Result<(), DecodeError> + Send + Sync + 'static,
{
    Arc::new(f)
}
