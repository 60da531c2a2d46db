//! # Host Type Catalog
//!
//! The host has no runtime reflection, so everything the guest may call is
//! registered up front as a typed descriptor: constructors, methods,
//! properties, and fields, each with an explicit parameter signature the
//! dispatcher can score overloads against.
//!
//! ## Philosophy
//!
//! - **Registration is the contract**: if a member is not in the catalog,
//!   it does not exist as far as the guest is concerned. There is no
//!   fallback probing.
//! - **Validate early**: duplicate member names are rejected when the type
//!   is built, not discovered as ambiguity at call time.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use spanwire::Value;

use crate::handles::Handle;
use crate::handles::HandleTable;
use crate::handles::HostObject;

#[derive(Debug, Clone)]
pub enum Error {
    /// A property or field with this name is already registered.
    DuplicateMember { type_name: String, member: String },
    /// A type with this name is already registered.
    DuplicateType(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateMember { type_name, member } => {
                write!(f, "duplicate member '{}' on type '{}'", member, type_name)
            }
            Error::DuplicateType(name) => write!(f, "duplicate type '{}'", name),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Declared parameter type of a host callable, used for overload scoring.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int32,
    Int64,
    Float32,
    Double,
    Str,
    Handle,
    Vector3,
    Vector4,
    Json,
    /// Accepts any value unchanged. Always an exact match.
    Any,
}

/// Context handed to every host callable during a dispatch.
///
/// Gives the callable access to the calling context's handle table so it
/// can resolve handle arguments and register handles it returns.
pub struct InvokeCx<'a> {
    pub handles: &'a HandleTable,
}

impl InvokeCx<'_> {
    /// Registers a host object and wraps it as a hinted handle value.
    pub fn handle_value(&self, obj: Arc<dyn HostObject>) -> Value {
        let hint = obj.type_name().to_string();
        let Handle(id) = self.handles.register(obj);
        Value::Handle { handle: id, hint: Some(hint) }
    }
}

/// A method or accessor body. Receives the coerced arguments; the receiver
/// is `None` for static members.
pub type HostFn = Arc<
    dyn Fn(&InvokeCx<'_>, Option<&Arc<dyn HostObject>>, &[Value]) -> anyhow::Result<Value>
        + Send
        + Sync,
>;

/// A constructor body. Produces the object; the dispatcher registers it.
pub type CtorFn =
    Arc<dyn Fn(&InvokeCx<'_>, &[Value]) -> anyhow::Result<Arc<dyn HostObject>> + Send + Sync>;

/// Wraps a closure as a [`HostFn`], mostly for accessor registration where
/// the `Option<HostFn>` parameter defeats unsized coercion on a bare
/// `Arc::new`.
pub fn host_fn(
    f: impl Fn(&InvokeCx<'_>, Option<&Arc<dyn HostObject>>, &[Value]) -> anyhow::Result<Value>
    + Send
    + Sync
    + 'static,
) -> HostFn {
    Arc::new(f)
}

/// One callable signature among a member's overload set.
pub struct Overload {
    pub params: Vec<ParamType>,
    pub func: HostFn,
}

/// One constructor signature.
pub struct CtorOverload {
    pub params: Vec<ParamType>,
    pub func: CtorFn,
}

/// A named method and its overloads.
pub struct Method {
    pub is_static: bool,
    pub overloads: Vec<Arc<Overload>>,
}

/// A property or field accessor pair. A missing half means the member is
/// read-only or write-only.
pub struct Accessor {
    pub is_static: bool,
    pub getter: Option<HostFn>,
    pub setter: Option<HostFn>,
}

/// Everything the dispatcher needs to know about one host type.
pub struct TypeDescriptor {
    pub name: String,
    pub is_enum: bool,
    pub constructors: Vec<Arc<CtorOverload>>,
    pub methods: HashMap<String, Method>,
    pub properties: HashMap<String, Accessor>,
    pub fields: HashMap<String, Accessor>,
}

/// Fluent registration for one host type.
pub struct TypeBuilder {
    descriptor: TypeDescriptor,
    // Accessor names registered twice; reported when the type is registered.
    duplicates: Vec<String>,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: TypeDescriptor {
                name: name.into(),
                is_enum: false,
                constructors: Vec::new(),
                methods: HashMap::new(),
                properties: HashMap::new(),
                fields: HashMap::new(),
            },
            duplicates: Vec::new(),
        }
    }

    pub fn enum_type(mut self) -> Self {
        self.descriptor.is_enum = true;
        self
    }

    pub fn ctor(
        mut self,
        params: Vec<ParamType>,
        func: impl Fn(&InvokeCx<'_>, &[Value]) -> anyhow::Result<Arc<dyn HostObject>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.descriptor
            .constructors
            .push(Arc::new(CtorOverload { params, func: Arc::new(func) }));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamType>,
        func: impl Fn(&InvokeCx<'_>, Option<&Arc<dyn HostObject>>, &[Value]) -> anyhow::Result<Value>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.add_method(name.into(), false, params, Arc::new(func));
        self
    }

    pub fn static_method(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamType>,
        func: impl Fn(&InvokeCx<'_>, Option<&Arc<dyn HostObject>>, &[Value]) -> anyhow::Result<Value>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.add_method(name.into(), true, params, Arc::new(func));
        self
    }

    fn add_method(&mut self, name: String, is_static: bool, params: Vec<ParamType>, func: HostFn) {
        let entry = self
            .descriptor
            .methods
            .entry(name)
            .or_insert_with(|| Method { is_static, overloads: Vec::new() });
        entry.overloads.push(Arc::new(Overload { params, func }));
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        getter: Option<HostFn>,
        setter: Option<HostFn>,
    ) -> Self {
        let name = name.into();
        let prior = self.descriptor.properties.insert(
            name.clone(),
            Accessor { is_static: false, getter, setter },
        );
        if prior.is_some() {
            self.duplicates.push(name);
        }
        self
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        getter: Option<HostFn>,
        setter: Option<HostFn>,
    ) -> Self {
        let name = name.into();
        let prior = self.descriptor.fields.insert(
            name.clone(),
            Accessor { is_static: false, getter, setter },
        );
        if prior.is_some() {
            self.duplicates.push(name);
        }
        self
    }
}

/// The shared, process-wide registry of host types.
pub struct Catalog {
    types: DashMap<String, Arc<TypeDescriptor>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self { types: DashMap::new() }
    }

    /// Registers a built type. Property and field namespaces must not
    /// collide; the descriptor is rejected whole if they do.
    pub fn register(&self, builder: TypeBuilder) -> Result<()> {
        let descriptor = builder.descriptor;
        if let Some(name) = builder.duplicates.into_iter().next() {
            return Err(Error::DuplicateMember {
                type_name: descriptor.name,
                member: name,
            });
        }
        for name in descriptor.properties.keys() {
            if descriptor.fields.contains_key(name) {
                return Err(Error::DuplicateMember {
                    type_name: descriptor.name.clone(),
                    member: name.clone(),
                });
            }
        }
        if self.types.contains_key(&descriptor.name) {
            return Err(Error::DuplicateType(descriptor.name));
        }
        self.types.insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    pub fn lookup(&self, type_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.get(type_name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
