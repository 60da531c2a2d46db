//! # Classification
//!
//! Converts between dynamic native values and the tagged `Value` union.
//!
//! The native side of the boundary is duck-typed, so `encode` classifies by
//! runtime shape in a fixed precedence order. `decode` is the strict
//! inverse: it switches on the variant and nothing else.

use serde_json::json;
use serde_json::Map;
use serde_json::Value as Native;

use crate::value::Value;

/// Object key marking a host object reference on the native side.
pub const HANDLE_KEY: &str = "__hostHandle";

/// Object key carrying the optional host type hint alongside [`HANDLE_KEY`].
pub const TYPE_HINT_KEY: &str = "__hostType";

/// Object keys marking an explicit host struct, serialized as a JSON string
/// rather than a structural shape.
const STRUCT_KEYS: [&str; 2] = ["__struct", "__type"];

/// Classifies a dynamic native value into the tagged union.
///
/// Precedence is fixed and load-bearing: null, bool, number
/// (integral-in-range to Int32, else Double), string, array, handle-bearing
/// object, explicit struct, vector shapes, JSON fallback. Never fails.
pub fn encode(native: &Native) -> Value {
    match native {
        Native::Null => Value::Null,
        Native::Bool(b) => Value::Bool(*b),
        Native::Number(n) => encode_number(n),
        Native::String(s) => Value::Str(s.clone()),
        Native::Array(items) => Value::Array { len: items.len() as i32 },
        Native::Object(fields) => encode_object(native, fields),
    }
}

/// The narrowest-tag-that-round-trips rule: an integral value within the
/// signed 32-bit range becomes Int32, everything else Double.
fn encode_number(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
            return Value::Int32(i as i32);
        }
        return Value::Double(i as f64);
    }
    let d = n.as_f64().unwrap_or(0.0);
    if d >= i32::MIN as f64 && d <= i32::MAX as f64 && d == (d as i32) as f64 {
        return Value::Int32(d as i32);
    }
    Value::Double(d)
}

fn encode_object(native: &Native, fields: &Map<String, Native>) -> Value {
    // Handle-bearing objects win over structural shapes.
    if let Some(handle) = fields.get(HANDLE_KEY).and_then(Native::as_i64) {
        let hint = fields
            .get(TYPE_HINT_KEY)
            .and_then(Native::as_str)
            .map(str::to_owned);
        return Value::Handle { handle: handle as u32, hint };
    }

    // Explicitly marked structs serialize to a JSON string, not a shape.
    if STRUCT_KEYS.iter().any(|k| fields.contains_key(*k)) {
        return match serde_json::to_string(native) {
            Ok(s) => Value::Str(s),
            Err(_) => Value::Null,
        };
    }

    if let Some(v) = try_vector(fields) {
        return v;
    }
    if let Some(v) = try_color(fields) {
        return v;
    }

    match serde_json::to_string(native) {
        Ok(s) => Value::Json(s),
        Err(_) => Value::Null,
    }
}

fn float_field(fields: &Map<String, Native>, key: &str) -> Option<f32> {
    fields.get(key).and_then(Native::as_f64).map(|d| d as f32)
}

/// `{x, y, z}` packs as Vector3; a `w` field upgrades it to Vector4.
fn try_vector(fields: &Map<String, Native>) -> Option<Value> {
    let x = float_field(fields, "x")?;
    let y = float_field(fields, "y")?;
    let z = float_field(fields, "z")?;
    if let Some(w) = float_field(fields, "w") {
        return Some(Value::Vector4 { xyzw: [x, y, z, w], color: false });
    }
    Some(Value::Vector3([x, y, z]))
}

/// `{r, g, b[, a]}` packs as a color-hinted Vector4; alpha defaults to 1.
fn try_color(fields: &Map<String, Native>) -> Option<Value> {
    let r = float_field(fields, "r")?;
    let g = float_field(fields, "g")?;
    let b = float_field(fields, "b")?;
    let a = float_field(fields, "a").unwrap_or(1.0);
    Some(Value::Vector4 { xyzw: [r, g, b, a], color: true })
}

/// Converts a tagged value back into a dynamic native value.
///
/// The inverse of [`encode`] for every shape the round-trip property
/// covers. Arrays decode to null (they cross as a count only), and doubles
/// with no JSON representation (NaN, infinities) also decode to null; the
/// raw record layer preserves those bit-exactly for transport purposes.
pub fn decode(value: &Value) -> Native {
    match value {
        Value::Null => Native::Null,
        Value::Bool(b) => Native::Bool(*b),
        Value::Int32(i) => json!(*i),
        Value::Int64(i) => json!(*i),
        Value::Float32(f) => float_native(*f as f64),
        Value::Double(d) => float_native(*d),
        Value::Str(s) => Native::String(s.clone()),
        Value::Handle { handle, hint } => {
            let mut fields = Map::new();
            fields.insert(HANDLE_KEY.into(), json!(*handle));
            if let Some(hint) = hint {
                fields.insert(TYPE_HINT_KEY.into(), Native::String(hint.clone()));
            }
            Native::Object(fields)
        }
        Value::Vector3([x, y, z]) => json!({
            "x": *x as f64, "y": *y as f64, "z": *z as f64,
        }),
        Value::Vector4 { xyzw: [x, y, z, w], color: false } => json!({
            "x": *x as f64, "y": *y as f64, "z": *z as f64, "w": *w as f64,
        }),
        Value::Vector4 { xyzw: [r, g, b, a], color: true } => json!({
            "r": *r as f64, "g": *g as f64, "b": *b as f64, "a": *a as f64,
        }),
        Value::Array { .. } => Native::Null,
        Value::Json(s) => match serde_json::from_str(s) {
            Ok(parsed) => parsed,
            // A blob that fails to parse surfaces as its raw text rather
            // than an error; encode/decode never fail.
            Err(_) => Native::String(s.clone()),
        },
    }
}

fn float_native(d: f64) -> Native {
    // The guest has a single number type. A double that is exactly an
    // integer decodes as one, so an i64 that crossed the boundary as a
    // Double (say 2^31) comes back numerically identical.
    // The saturating cast turns every d >= 2^63 into i64::MAX, whose
    // round-trip check would falsely pass at exactly 2^63. Negative zero
    // stays a float.
    let i = d as i64;
    if i as f64 == d && i != i64::MAX && d.is_sign_positive() == (i >= 0) {
        return json!(i);
    }
    serde_json::Number::from_f64(d)
        .map(Native::Number)
        .unwrap_or(Native::Null)
}
