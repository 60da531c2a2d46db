//! The closed tagged union crossing the boundary.

use crate::types::Tag;

/// A value crossing the host/guest boundary.
///
/// The variant fully determines payload interpretation. Any code holding a
/// `Value` may rely on that and nothing else; in particular the optional
/// type hints on `Handle` and `Vector4` are display/dispatch convenience,
/// never safety-relevant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Double(f64),
    Str(String),
    /// A host object reference. `hint` names the host type for guest-side
    /// display and dispatch convenience.
    Handle { handle: u32, hint: Option<String> },
    Vector3([f32; 3]),
    /// Four packed floats. `color` marks the r/g/b/a interpretation; on the
    /// wire this is the `"color"` type hint.
    Vector4 { xyzw: [f32; 4], color: bool },
    /// Arrays cross the boundary as a length only; element transfer goes
    /// through the JSON path.
    Array { len: i32 },
    /// An opaque JSON blob for object graphs with no structural shape.
    Json(String),
}

impl Value {
    pub const fn tag(&self) -> Tag {
        match self {
            Value::Null => Tag::Null,
            Value::Bool(_) => Tag::Bool,
            Value::Int32(_) => Tag::Int32,
            Value::Int64(_) => Tag::Int64,
            Value::Float32(_) => Tag::Float32,
            Value::Double(_) => Tag::Double,
            Value::Str(_) => Tag::String,
            Value::Handle { .. } => Tag::Handle,
            Value::Vector3(_) => Tag::Vector3,
            Value::Vector4 { .. } => Tag::Vector4,
            Value::Array { .. } => Tag::Array,
            Value::Json(_) => Tag::JsonBlob,
        }
    }

    /// Returns a handle value with no type hint.
    pub const fn handle(handle: u32) -> Self {
        Value::Handle { handle, hint: None }
    }

    /// A short human-readable shape description, used in error messages and
    /// dispatch logging.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::Float32(_) => "f32",
            Value::Double(_) => "f64",
            Value::Str(_) => "string",
            Value::Handle { .. } => "handle",
            Value::Vector3(_) => "vec3",
            Value::Vector4 { .. } => "vec4",
            Value::Array { .. } => "array",
            Value::Json(_) => "json",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}
