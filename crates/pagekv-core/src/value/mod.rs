mod codec;
mod json;
mod tag;

#[cfg(test)]
mod tests;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::{num::FpCategory, time::Duration};

// re-exports
pub use codec::{CodecError, decode, encode};
pub use tag::ValueTag;

pub(crate) use codec::{TOMBSTONE, is_tombstone};

///
/// Value
///
/// Closed set of kinds that can round-trip through a byte-oriented store.
/// Each variant corresponds one-to-one to a [`ValueTag`] discriminator.
///
/// `List` holds scalars of a single kind (text, signed, unsigned or float);
/// mixed or nested lists are rejected at encode time.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Text(String),
    F32(f32),
    F64(f64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Time(DateTime<Utc>),
    Duration(Duration),
    Strings(Vec<String>),
    List(Vec<Self>),
}

impl Value {
    #[must_use]
    pub const fn tag(&self) -> ValueTag {
        tag::canonical_tag(self)
    }

    /// Scalar or time kinds; the only kinds eligible for attribute indexing.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::Strings(_) | Self::List(_))
    }

    /// Empty text and empty slices count as empty; numbers and times never do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Strings(items) => items.is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Stable, kind-qualified text form used to name per-value store keys.
    ///
    /// `Text("post")` renders as `str:post`, `I64(7)` as `i64:7`. Equal
    /// values share a token; so do all NaNs of one width, which never
    /// compare equal. Code that dedupes indexed values compares tokens.
    #[must_use]
    pub fn index_token(&self) -> String {
        format!("{}:{}", self.tag().as_str(), self.canonical_text())
    }

    fn canonical_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            // -0.0 and 0.0 compare equal, so they share a token
            Self::F32(v) if v.classify() == FpCategory::Zero => "0".to_string(),
            Self::F64(v) if v.classify() == FpCategory::Zero => "0".to_string(),
            Self::F32(v) => v.to_string(),
            Self::F64(v) => v.to_string(),
            Self::I8(v) => v.to_string(),
            Self::I16(v) => v.to_string(),
            Self::I32(v) => v.to_string(),
            Self::I64(v) => v.to_string(),
            Self::I128(v) => v.to_string(),
            Self::U8(v) => v.to_string(),
            Self::U16(v) => v.to_string(),
            Self::U32(v) => v.to_string(),
            Self::U64(v) => v.to_string(),
            Self::U128(v) => v.to_string(),
            Self::Time(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Self::Duration(d) => d.as_nanos().to_string(),
            Self::Strings(items) => items.join(","),
            Self::List(items) => items
                .iter()
                .map(Self::canonical_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

///
/// Tagged
///
/// Rust types with a fixed [`Value`] representation. Flat Lists are typed
/// through this trait; decoding a slot written as a different kind fails
/// with [`CodecError::DataTypeNotSupported`].
///

pub trait Tagged: Sized {
    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, CodecError>;
}

impl Tagged for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        Ok(value)
    }
}

macro_rules! impl_tagged {
    ( $( $ty:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl Tagged for $ty {
                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> Result<Self, CodecError> {
                    match value {
                        Value::$variant(inner) => Ok(inner),
                        _ => Err(CodecError::DataTypeNotSupported),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_tagged! {
    String => Text,
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    DateTime<Utc> => Time,
    Duration => Duration,
    Vec<String> => Strings,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
