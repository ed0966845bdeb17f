use crate::value::Value;

///
/// ValueTag
///
/// Stable discriminator written in front of every encoded value.
///
/// IMPORTANT:
/// The discriminator strings are on-disk contract. Renaming one orphans
/// every value already stored under it.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueTag {
    Text,
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    Time,
    Duration,
    Strings,
    List,
}

impl ValueTag {
    pub const ALL: [Self; 17] = [
        Self::Text,
        Self::F32,
        Self::F64,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::I128,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::U128,
        Self::Time,
        Self::Duration,
        Self::Strings,
        Self::List,
    ];

    /// Wire discriminator for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "str",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::Time => "time",
            Self::Duration => "dur",
            Self::Strings => "strs",
            Self::List => "list",
        }
    }

    /// Resolve a wire discriminator.
    #[must_use]
    pub fn parse(tag: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().as_bytes() == tag)
    }

    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::I128
        )
    }

    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::U128
        )
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Kinds allowed as elements of a generic `List`.
    #[must_use]
    pub const fn is_list_element(self) -> bool {
        matches!(self, Self::Text) || self.is_signed() || self.is_unsigned() || self.is_float()
    }
}

/// Longest discriminator; framing scans at most this many bytes for the separator.
pub(crate) const MAX_TAG_LEN: usize = 4;

/// Separator between discriminator and payload.
pub(crate) const TAG_SEPARATOR: u8 = b':';

/// Canonical tag for a value.
#[must_use]
pub(crate) const fn canonical_tag(value: &Value) -> ValueTag {
    match value {
        Value::Text(_) => ValueTag::Text,
        Value::F32(_) => ValueTag::F32,
        Value::F64(_) => ValueTag::F64,
        Value::I8(_) => ValueTag::I8,
        Value::I16(_) => ValueTag::I16,
        Value::I32(_) => ValueTag::I32,
        Value::I64(_) => ValueTag::I64,
        Value::I128(_) => ValueTag::I128,
        Value::U8(_) => ValueTag::U8,
        Value::U16(_) => ValueTag::U16,
        Value::U32(_) => ValueTag::U32,
        Value::U64(_) => ValueTag::U64,
        Value::U128(_) => ValueTag::U128,
        Value::Time(_) => ValueTag::Time,
        Value::Duration(_) => ValueTag::Duration,
        Value::Strings(_) => ValueTag::Strings,
        Value::List(_) => ValueTag::List,
    }
}
