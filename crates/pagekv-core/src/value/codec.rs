use crate::{
    serialize::{deserialize, serialize},
    value::{
        Value,
        tag::{MAX_TAG_LEN, TAG_SEPARATOR, ValueTag},
    },
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error as ThisError;

/// Tombstone written into vacated Flat List slots. It has valid framing
/// but no registered discriminator, so [`decode`] never yields it as a value.
pub(crate) const TOMBSTONE: &[u8] = b"nil:";

pub(crate) fn is_tombstone(bytes: &[u8]) -> bool {
    bytes == TOMBSTONE
}

///
/// CodecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CodecError {
    /// The value's kind has no discriminator (for example a mixed list).
    #[error("unsupported type: {kind}")]
    UnsupportedType { kind: String },

    /// Missing or malformed framing, or an unknown discriminator.
    #[error("data type not supported")]
    DataTypeNotSupported,

    /// Framing is valid but the payload does not decode as its kind.
    #[error("invalid {} payload: {message}", .tag.as_str())]
    Payload { tag: ValueTag, message: String },
}

/// Encode a value as `<discriminator>:<cbor payload>`.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let tag = value.tag();

    let payload = match value {
        Value::Text(v) => payload(tag, v)?,
        Value::F32(v) => payload(tag, v)?,
        Value::F64(v) => payload(tag, v)?,
        Value::I8(v) => payload(tag, v)?,
        Value::I16(v) => payload(tag, v)?,
        Value::I32(v) => payload(tag, v)?,
        Value::I64(v) => payload(tag, v)?,
        Value::I128(v) => payload(tag, v)?,
        Value::U8(v) => payload(tag, v)?,
        Value::U16(v) => payload(tag, v)?,
        Value::U32(v) => payload(tag, v)?,
        Value::U64(v) => payload(tag, v)?,
        Value::U128(v) => payload(tag, v)?,
        Value::Time(v) => payload(tag, v)?,
        Value::Duration(v) => payload(tag, v)?,
        Value::Strings(v) => payload(tag, v)?,
        Value::List(items) => {
            check_homogeneous(items).map_err(|kind| CodecError::UnsupportedType { kind })?;
            payload(tag, items)?
        }
    };

    let tag_bytes = tag.as_str().as_bytes();
    let mut out = Vec::with_capacity(tag_bytes.len() + 1 + payload.len());
    out.extend_from_slice(tag_bytes);
    out.push(TAG_SEPARATOR);
    out.extend_from_slice(&payload);

    Ok(out)
}

/// Decode bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    let (tag, body) = split_frame(bytes)?;

    let value = match tag {
        ValueTag::Text => Value::Text(body_as(tag, body)?),
        ValueTag::F32 => Value::F32(body_as(tag, body)?),
        ValueTag::F64 => Value::F64(body_as(tag, body)?),
        ValueTag::I8 => Value::I8(body_as(tag, body)?),
        ValueTag::I16 => Value::I16(body_as(tag, body)?),
        ValueTag::I32 => Value::I32(body_as(tag, body)?),
        ValueTag::I64 => Value::I64(body_as(tag, body)?),
        ValueTag::I128 => Value::I128(body_as(tag, body)?),
        ValueTag::U8 => Value::U8(body_as(tag, body)?),
        ValueTag::U16 => Value::U16(body_as(tag, body)?),
        ValueTag::U32 => Value::U32(body_as(tag, body)?),
        ValueTag::U64 => Value::U64(body_as(tag, body)?),
        ValueTag::U128 => Value::U128(body_as(tag, body)?),
        ValueTag::Time => Value::Time(body_as(tag, body)?),
        ValueTag::Duration => Value::Duration(body_as(tag, body)?),
        ValueTag::Strings => Value::Strings(body_as(tag, body)?),
        ValueTag::List => {
            let items: Vec<Value> = body_as(tag, body)?;
            check_homogeneous(&items).map_err(|kind| CodecError::Payload {
                tag,
                message: format!("list is not homogeneous: {kind}"),
            })?;
            Value::List(items)
        }
    };

    Ok(value)
}

// Split `<tag>:<payload>`; anything else is a framing failure.
fn split_frame(bytes: &[u8]) -> Result<(ValueTag, &[u8]), CodecError> {
    let window = &bytes[..bytes.len().min(MAX_TAG_LEN + 1)];
    let sep = window
        .iter()
        .position(|b| *b == TAG_SEPARATOR)
        .ok_or(CodecError::DataTypeNotSupported)?;

    let tag = ValueTag::parse(&bytes[..sep]).ok_or(CodecError::DataTypeNotSupported)?;

    Ok((tag, &bytes[sep + 1..]))
}

fn payload<T: Serialize + ?Sized>(tag: ValueTag, value: &T) -> Result<Vec<u8>, CodecError> {
    serialize(&value).map_err(|err| CodecError::Payload {
        tag,
        message: err.to_string(),
    })
}

fn body_as<T: DeserializeOwned>(tag: ValueTag, body: &[u8]) -> Result<T, CodecError> {
    deserialize(body).map_err(|err| CodecError::Payload {
        tag,
        message: err.to_string(),
    })
}

// A generic list must hold one scalar kind only. Returns a description of
// the offending kind on failure.
fn check_homogeneous(items: &[Value]) -> Result<(), String> {
    let Some(first) = items.first() else {
        return Ok(());
    };

    let expected = first.tag();
    if !expected.is_list_element() {
        return Err(format!("list of {}", expected.as_str()));
    }

    match items.iter().find(|item| item.tag() != expected) {
        Some(other) => Err(format!(
            "mixed list of {} and {}",
            expected.as_str(),
            other.tag().as_str()
        )),
        None => Ok(()),
    }
}
