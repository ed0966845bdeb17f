use crate::{
    error::{ErrorClass, InternalError},
    value::{CodecError, Tagged, TOMBSTONE, Value, ValueTag, decode, encode},
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;
use std::time::Duration;

// ---- helpers -----------------------------------------------------------

fn sample_values() -> Vec<Value> {
    vec![
        Value::Text("hello".to_string()),
        Value::Text(String::new()),
        Value::F32(1.25),
        Value::F64(-2.5),
        Value::I8(-8),
        Value::I16(-16),
        Value::I32(-32),
        Value::I64(i64::MIN),
        Value::I128(-(1i128 << 40)),
        Value::U8(8),
        Value::U16(16),
        Value::U32(32),
        Value::U64(u64::MAX),
        Value::U128(1u128 << 40),
        Value::Time(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
        Value::Duration(Duration::from_millis(1500)),
        Value::Strings(vec!["a".to_string(), "b".to_string()]),
        Value::List(vec![Value::U32(1), Value::U32(2)]),
        Value::List(Vec::new()),
    ]
}

fn round_trip(value: &Value) -> Value {
    let bytes = encode(value).expect("encode should succeed");
    decode(&bytes).expect("decode should succeed")
}

// ---- round trips -------------------------------------------------------

#[test]
fn every_supported_kind_round_trips() {
    for value in sample_values() {
        assert_eq!(round_trip(&value), value, "round trip for {value:?}");
    }
}

#[test]
fn sample_set_covers_every_tag() {
    let covered = sample_values().iter().map(Value::tag).collect::<Vec<_>>();

    for tag in ValueTag::ALL {
        assert!(covered.contains(&tag), "no sample for {tag:?}");
    }
}

#[test]
fn encoded_bytes_start_with_discriminator() {
    let bytes = encode(&Value::I32(7)).unwrap();
    assert!(bytes.starts_with(b"i32:"));

    let bytes = encode(&Value::Strings(vec![])).unwrap();
    assert!(bytes.starts_with(b"strs:"));
}

proptest! {
    #[test]
    fn text_round_trips(s in ".{0,32}") {
        let value = Value::Text(s);
        prop_assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn signed_round_trips(n in any::<i64>()) {
        let value = Value::I64(n);
        prop_assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn unsigned_list_round_trips(items in prop::collection::vec(any::<u16>(), 0..8)) {
        let value = Value::List(items.into_iter().map(Value::U16).collect());
        prop_assert_eq!(round_trip(&value), value);
    }
}

// ---- failures ----------------------------------------------------------

#[test]
fn decode_without_separator_is_not_supported() {
    assert_eq!(decode(b"hello"), Err(CodecError::DataTypeNotSupported));
    assert_eq!(decode(b""), Err(CodecError::DataTypeNotSupported));
}

#[test]
fn decode_unknown_discriminator_is_not_supported() {
    let mut bytes = encode(&Value::Text("x".to_string())).unwrap();
    bytes[0] = b'z';

    assert_eq!(decode(&bytes), Err(CodecError::DataTypeNotSupported));
}

#[test]
fn decode_tombstone_is_not_a_value() {
    assert_eq!(decode(TOMBSTONE), Err(CodecError::DataTypeNotSupported));
}

#[test]
fn decode_with_wrong_payload_reports_payload_error() {
    // i64 payload framed as text
    let mut bytes = b"str:".to_vec();
    bytes.extend_from_slice(&encode(&Value::I64(9)).unwrap()[4..]);

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Payload {
            tag: ValueTag::Text,
            ..
        }
    ));
}

#[test]
fn mixed_list_is_rejected_as_unsupported_type() {
    let value = Value::List(vec![Value::U8(1), Value::Text("x".to_string())]);

    let err = encode(&value).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedType { .. }));
}

#[test]
fn list_of_times_is_rejected() {
    let value = Value::List(vec![Value::Time(Utc::now())]);

    assert!(matches!(
        encode(&value),
        Err(CodecError::UnsupportedType { .. })
    ));
}

#[test]
fn codec_errors_convert_with_stable_class() {
    let unsupported: InternalError = CodecError::UnsupportedType {
        kind: "bool".to_string(),
    }
    .into();
    assert_eq!(unsupported.class, ErrorClass::Unsupported);
    assert!(unsupported.codec_error().is_some());

    let framing: InternalError = CodecError::DataTypeNotSupported.into();
    assert_eq!(framing.class, ErrorClass::Corruption);
    assert_eq!(
        framing.codec_error(),
        Some(&CodecError::DataTypeNotSupported)
    );
}

// ---- typed access ------------------------------------------------------

#[test]
fn tagged_rejects_other_kinds() {
    assert_eq!(String::from_value(Value::Text("a".into())), Ok("a".into()));
    assert_eq!(
        u64::from_value(Value::I64(1)),
        Err(CodecError::DataTypeNotSupported)
    );
}

#[test]
fn index_token_is_kind_qualified() {
    assert_eq!(Value::Text("post".into()).index_token(), "str:post");
    assert_eq!(Value::I64(7).index_token(), "i64:7");
    assert_ne!(Value::I64(7).index_token(), Value::U64(7).index_token());
}

#[test]
fn float_tokens_follow_equality_at_zero() {
    assert_eq!(Value::F64(-0.0), Value::F64(0.0));
    assert_eq!(Value::F64(-0.0).index_token(), "f64:0");
    assert_eq!(Value::F64(0.0).index_token(), "f64:0");
    assert_eq!(Value::F32(-0.0).index_token(), Value::F32(0.0).index_token());
    assert_ne!(Value::F64(0.0).index_token(), Value::F32(0.0).index_token());

    // NaN never equals itself but still names a single token
    assert_ne!(Value::F64(f64::NAN), Value::F64(f64::NAN));
    assert_eq!(
        Value::F64(f64::NAN).index_token(),
        Value::F64(-f64::NAN).index_token()
    );
}

#[test]
fn scalar_and_empty_classification() {
    assert!(Value::Text("x".into()).is_scalar());
    assert!(Value::Time(Utc::now()).is_scalar());
    assert!(!Value::Strings(vec![]).is_scalar());

    assert!(Value::Text(String::new()).is_empty());
    assert!(!Value::U8(0).is_empty());
}

// ---- json --------------------------------------------------------------

#[test]
fn json_scalars_convert() {
    assert_eq!(
        Value::try_from(&json!("post")),
        Ok(Value::Text("post".into()))
    );
    assert_eq!(Value::try_from(&json!(-3)), Ok(Value::I64(-3)));
    assert_eq!(Value::try_from(&json!(u64::MAX)), Ok(Value::U64(u64::MAX)));
    assert_eq!(Value::try_from(&json!(0.5)), Ok(Value::F64(0.5)));
    assert_eq!(
        Value::try_from(&json!(["a", "b"])),
        Ok(Value::Strings(vec!["a".into(), "b".into()]))
    );
}

#[test]
fn json_int_and_float_array_widens_to_f64() {
    assert_eq!(
        Value::try_from(&json!([1, 2.5])),
        Ok(Value::List(vec![Value::F64(1.0), Value::F64(2.5)]))
    );
    assert!(Value::try_from(&json!([-1, u64::MAX])).is_err());
}

#[test]
fn json_unsupported_shapes_are_rejected() {
    for input in [json!(null), json!(true), json!({"a": 1}), json!([1, "a"])] {
        assert!(
            matches!(
                Value::try_from(&input),
                Err(CodecError::UnsupportedType { .. })
            ),
            "{input} should be unsupported"
        );
    }
}
