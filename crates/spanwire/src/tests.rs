use serde_json::json;

use super::decode;
use super::encode;
use super::Error;
use super::Result;
use super::Tag;
use super::Value;
use super::WireBuffer;
use super::WireReader;
use super::VALUE_RECORD_SIZE;

type R<T> = Result<T>;

// ==== TAG NUMBERS ====

#[test]
fn test_tag_numbers_are_stable() {
    assert_eq!(Tag::Null as i32, 0);
    assert_eq!(Tag::Bool as i32, 1);
    assert_eq!(Tag::Int32 as i32, 2);
    assert_eq!(Tag::Double as i32, 3);
    assert_eq!(Tag::String as i32, 4);
    assert_eq!(Tag::Handle as i32, 5);
    assert_eq!(Tag::Int64 as i32, 6);
    assert_eq!(Tag::Float32 as i32, 7);
    assert_eq!(Tag::Array as i32, 8);
    assert_eq!(Tag::JsonBlob as i32, 9);
    assert_eq!(Tag::Vector3 as i32, 10);
    assert_eq!(Tag::Vector4 as i32, 11);
}

#[test]
fn test_tag_from_i32_rejects_unknown() {
    assert_eq!(Tag::from_i32(12), None);
    assert_eq!(Tag::from_i32(-1), None);
    assert_eq!(Tag::from_i32(5), Some(Tag::Handle));
}

// ==== CLASSIFICATION ====

#[test]
fn test_encode_precedence_primitives() {
    assert_eq!(encode(&json!(null)), Value::Null);
    assert_eq!(encode(&json!(true)), Value::Bool(true));
    assert_eq!(encode(&json!(42)), Value::Int32(42));
    assert_eq!(encode(&json!(1.5)), Value::Double(1.5));
    assert_eq!(encode(&json!("hi")), Value::Str("hi".into()));
}

#[test]
fn test_encode_numeric_boundaries() {
    assert_eq!(encode(&json!(-2147483648i64)), Value::Int32(i32::MIN));
    assert_eq!(encode(&json!(2147483647i64)), Value::Int32(i32::MAX));
    // One past i32::MAX must switch encoding to Double.
    assert_eq!(encode(&json!(2147483648i64)), Value::Double(2147483648.0));
    // Integral floats inside the range narrow to Int32.
    assert_eq!(encode(&json!(7.0)), Value::Int32(7));
    assert_eq!(encode(&json!(3e10)), Value::Double(3e10));
}

#[test]
fn test_encode_array_carries_length_only() {
    assert_eq!(encode(&json!([1, 2, 3])), Value::Array { len: 3 });
    assert_eq!(encode(&json!([])), Value::Array { len: 0 });
}

#[test]
fn test_encode_handle_marker_beats_shapes() {
    let v = encode(&json!({"__hostHandle": 7, "x": 1.0, "y": 2.0, "z": 3.0}));
    assert_eq!(v, Value::Handle { handle: 7, hint: None });

    let v = encode(&json!({"__hostHandle": 9, "__hostType": "Transform"}));
    assert_eq!(v, Value::Handle { handle: 9, hint: Some("Transform".into()) });
}

#[test]
fn test_encode_struct_marker_serializes_to_string() {
    let v = encode(&json!({"__struct": true, "a": 1}));
    match v {
        Value::Str(s) => assert!(s.contains("\"a\":1")),
        other => panic!("expected Str, got {:?}", other),
    }
}

#[test]
fn test_encode_vector_shapes() {
    assert_eq!(
        encode(&json!({"x": 1.0, "y": 2.0, "z": 3.0})),
        Value::Vector3([1.0, 2.0, 3.0]),
    );
    assert_eq!(
        encode(&json!({"x": 1.0, "y": 2.0, "z": 3.0, "w": 4.0})),
        Value::Vector4 { xyzw: [1.0, 2.0, 3.0, 4.0], color: false },
    );
    assert_eq!(
        encode(&json!({"r": 0.5, "g": 0.25, "b": 1.0})),
        Value::Vector4 { xyzw: [0.5, 0.25, 1.0, 1.0], color: true },
    );
}

#[test]
fn test_encode_generic_object_falls_back_to_json() {
    let v = encode(&json!({"name": "widget", "count": 3}));
    match &v {
        Value::Json(_) => {}
        other => panic!("expected Json, got {:?}", other),
    }
    // And the fallback round-trips through decode.
    assert_eq!(decode(&v), json!({"name": "widget", "count": 3}));
}

#[test]
fn test_decode_encode_roundtrip() {
    let cases = [
        json!(null),
        json!(true),
        json!(false),
        json!(-2147483648i64),
        json!(2147483647i64),
        json!(2147483648i64),
        json!(""),
        json!("héllo wörld ☆"),
        json!({"x": 1.5, "y": 2.5, "z": 3.5}),
        json!({"x": 1.5, "y": 2.5, "z": 3.5, "w": 4.5}),
        json!({"r": 0.5, "g": 0.25, "b": 1.0, "a": 1.0}),
        json!({"nested": {"deep": [1, 2]}}),
    ];
    for case in &cases {
        assert_eq!(&decode(&encode(case)), case, "round-trip failed for {}", case);
    }
}

#[test]
fn test_decode_integral_double_yields_integer_number() {
    // Integers wide enough to ride as Double must come back as integer
    // numbers, not as `2147483648.0`.
    assert_eq!(decode(&Value::Double(2147483648.0)), json!(2147483648i64));
    assert_eq!(decode(&Value::Double(-1e15)), json!(-1_000_000_000_000_000i64));
    assert_eq!(decode(&Value::Float32(7.0)), json!(7));

    // Anything with a fractional part, or outside integer range, stays
    // a float.
    assert_eq!(decode(&Value::Double(2.5)), json!(2.5));
    assert_eq!(decode(&Value::Double(1e300)), json!(1e300));
}

#[test]
fn test_decode_handle_reconstructs_marker() {
    let v = Value::Handle { handle: 12, hint: Some("Camera".into()) };
    assert_eq!(decode(&v), json!({"__hostHandle": 12, "__hostType": "Camera"}));
}

// ==== RAW RECORDS ====

#[test]
fn test_record_layout_offsets() -> R<()> {
    let mut buf = WireBuffer::new(256);
    let (off, truncated) = buf.write_value(&Value::Int32(0x1234_5678))?;
    assert!(!truncated);

    let bytes = buf.bytes();
    let record = off as usize;
    // tag at +0
    assert_eq!(&bytes[record..record + 4], &2i32.to_le_bytes());
    // padding at +4
    assert_eq!(&bytes[record + 4..record + 8], &[0, 0, 0, 0]);
    // payload at +8
    assert_eq!(&bytes[record + 8..record + 12], &0x1234_5678i32.to_le_bytes());
    // hint slot at +24 empty
    assert_eq!(&bytes[record + 24..record + 28], &[0, 0, 0, 0]);
    Ok(())
}

#[test]
fn test_offset_zero_is_reserved() -> R<()> {
    let mut buf = WireBuffer::new(256);
    let (off, _) = buf.write_value(&Value::Null)?;
    assert_ne!(off, 0);
    Ok(())
}

#[test]
fn test_raw_roundtrip_all_variants() -> R<()> {
    let values = [
        Value::Null,
        Value::Bool(true),
        Value::Int32(-7),
        Value::Int64(1 << 40),
        Value::Float32(2.5),
        Value::Double(-0.125),
        Value::Str("boundary ☆".into()),
        Value::Str(String::new()),
        Value::Handle { handle: 42, hint: Some("Transform".into()) },
        Value::Handle { handle: 9, hint: None },
        Value::Vector3([1.0, 2.0, 3.0]),
        Value::Vector4 { xyzw: [1.0, 2.0, 3.0, 4.0], color: false },
        Value::Vector4 { xyzw: [0.5, 0.5, 0.5, 1.0], color: true },
        Value::Array { len: 17 },
        Value::Json("{\"k\":1}".into()),
    ];

    let mut buf = WireBuffer::new(4096);
    let mut offsets = Vec::new();
    for v in &values {
        let (off, truncated) = buf.write_value(v)?;
        assert!(!truncated);
        offsets.push(off);
    }

    let reader = WireReader::new(buf.bytes());
    for (v, off) in values.iter().zip(offsets) {
        assert_eq!(&reader.read_value(off)?, v);
    }
    Ok(())
}

#[test]
fn test_raw_roundtrip_float_specials() -> R<()> {
    let mut buf = WireBuffer::new(1024);
    let specials = [f64::INFINITY, f64::NEG_INFINITY, f64::MIN, f64::EPSILON, -0.0];
    for d in specials {
        let (off, _) = buf.write_value(&Value::Double(d))?;
        let reader = WireReader::new(buf.bytes());
        match reader.read_value(off)? {
            Value::Double(back) => assert_eq!(back.to_bits(), d.to_bits()),
            other => panic!("expected Double, got {:?}", other),
        }
    }
    // NaN survives bit-exactly even though it never compares equal.
    let (off, _) = buf.write_value(&Value::Double(f64::NAN))?;
    let reader = WireReader::new(buf.bytes());
    match reader.read_value(off)? {
        Value::Double(back) => assert!(back.is_nan()),
        other => panic!("expected Double, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_write_values_contiguous() -> R<()> {
    let mut buf = WireBuffer::new(1024);
    let args = [Value::Int32(1), Value::Str("two".into()), Value::Bool(true)];
    let (first, truncated) = buf.write_values(&args)?;
    assert!(!truncated);

    let reader = WireReader::new(buf.bytes());
    let back = reader.read_values(first, args.len())?;
    assert_eq!(back.as_slice(), &args);

    // Records are exactly 32 bytes apart.
    assert_eq!(
        reader.read_value(first + VALUE_RECORD_SIZE as u32)?,
        Value::Str("two".into()),
    );
    Ok(())
}

#[test]
fn test_oversized_string_truncates_with_flag() -> R<()> {
    let mut buf = WireBuffer::new(128);
    let big = "x".repeat(500);
    let (off, truncated) = buf.write_value(&Value::Str(big))?;
    assert!(truncated);

    // The payload is still parseable, just shorter.
    let reader = WireReader::new(buf.bytes());
    match reader.read_value(off)? {
        Value::Str(s) => {
            assert!(!s.is_empty());
            assert!(s.len() < 500);
            assert!(s.bytes().all(|b| b == b'x'));
        }
        other => panic!("expected Str, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_truncation_respects_char_boundary() -> R<()> {
    // Capacity leaves room for the record plus a few bytes of string; the
    // multi-byte char at the cut point must be dropped whole.
    let mut buf = WireBuffer::new(VALUE_RECORD_SIZE + 8);
    let (off, truncated) = buf.write_value(&Value::Str("ab☆☆☆".into()))?;
    assert!(truncated);
    let reader = WireReader::new(buf.bytes());
    match reader.read_value(off)? {
        Value::Str(s) => assert!(s.is_char_boundary(s.len())),
        other => panic!("expected Str, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_buffer_full_is_an_error_not_a_panic() {
    let mut buf = WireBuffer::new(2 * VALUE_RECORD_SIZE);
    buf.write_value(&Value::Null).unwrap();
    let err = buf.write_value(&Value::Null).unwrap_err();
    assert_eq!(err, Error::BufferFull);
}

#[test]
fn test_reader_rejects_hostile_input() {
    let reader = WireReader::new(&[0u8; 16]);
    assert_eq!(reader.read_value(0).unwrap_err(), Error::OutOfBounds);

    let mut buf = WireBuffer::new(256);
    let (off, _) = buf.write_value(&Value::Null).unwrap();
    let mut bytes = buf.bytes().to_vec();
    bytes[off as usize] = 99; // invalid tag
    let reader = WireReader::new(&bytes);
    assert_eq!(reader.read_value(off).unwrap_err(), Error::InvalidTag(99));
}

#[test]
fn test_reader_rejects_unterminated_string() {
    // Hand-built record whose string region runs off the end of the buffer
    // with no NUL in sight.
    let mut bytes = vec![0u8; 64];
    bytes[32..36].copy_from_slice(&(Tag::String as i32).to_le_bytes());
    bytes[40..44].copy_from_slice(&60u32.to_le_bytes());
    bytes[60..64].copy_from_slice(&[b'a'; 4]);
    let reader = WireReader::new(&bytes);
    assert_eq!(reader.read_value(32).unwrap_err(), Error::UnterminatedString);
}
