use crate::value::{CodecError, Value};
use derive_more::{Deref, Display};
use pagekv_utils::{kebab_key, short_shasum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Context key that keeps a page out of the index when set to `true`.
pub const OPT_OUT_KEY: &str = "index-ignore";

///
/// LanguageTag
///
/// Lower-cased language code (`en`, `pt-br`). Names the per-language
/// bucket a page's path mapping lives in.
///

#[derive(
    Clone,
    Debug,
    Default,
    Deref,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct LanguageTag(String);

impl LanguageTag {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self(tag.trim().to_ascii_lowercase().replace('_', "-"))
    }
}

impl From<&str> for LanguageTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

///
/// PageStub
///
/// What the index stores per page, keyed by content shasum. Lookups
/// return stubs; loading full content is the caller's business.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PageStub {
    pub shasum: String,
    pub url: String,
    pub language: LanguageTag,
    #[serde(default)]
    pub translates: Option<String>,
}

///
/// ContextValue
///
/// One page attribute. Only `Value` scalars are ever indexed; the other
/// shapes exist so front matter converts without loss. `List` holds arrays
/// with no tagged form (objects, bools, nesting, strings mixed with numbers).
///

#[derive(Clone, Debug, PartialEq)]
pub enum ContextValue {
    Null,
    Bool(bool),
    Value(Value),
    List(Vec<Self>),
    Map(BTreeMap<String, Self>),
}

impl ContextValue {
    /// The value to index under, if this attribute is eligible.
    #[must_use]
    pub fn indexable(&self) -> Option<&Value> {
        match self {
            Self::Value(value) if value.is_scalar() && !value.is_empty() => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// Every JSON shape has a context form, so one odd attribute never costs
// the page its other attributes.
impl From<&serde_json::Value> for ContextValue {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
            serde_json::Value::Array(items) => Value::try_from(json)
                .map_or_else(|_| Self::List(items.iter().map(Self::from).collect()), Self::Value),
            other => Value::try_from(other).map_or(Self::Null, Self::Value),
        }
    }
}

///
/// PageContext
///
/// Page attributes keyed by kebab-cased name.
///

#[derive(Clone, Debug, Default, Deref, PartialEq)]
pub struct PageContext(BTreeMap<String, ContextValue>);

impl PageContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the kebab-cased form of `key`. Blank keys are dropped.
    pub fn insert(&mut self, key: &str, value: impl Into<ContextValue>) {
        let key = kebab_key(key);
        if !key.is_empty() {
            self.0.insert(key, value.into());
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Build from a JSON object (typically parsed front matter).
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CodecError> {
        let serde_json::Value::Object(map) = json else {
            return Err(CodecError::UnsupportedType {
                kind: "non-object page context".to_string(),
            });
        };

        let mut ctx = Self::new();
        for (key, value) in map {
            ctx.insert(key, ContextValue::from(value));
        }

        Ok(ctx)
    }

    /// Whether the page asked to stay out of the index.
    #[must_use]
    pub fn is_opted_out(&self) -> bool {
        matches!(self.0.get(OPT_OUT_KEY), Some(ContextValue::Bool(true)))
    }
}

///
/// Page
///
/// The fields of a page the index reads. `shasum` is the primary key.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub shasum: String,
    pub url: String,
    pub language: LanguageTag,
    pub translates: Option<String>,
    pub redirects: Vec<String>,
    pub permalink: Option<Uuid>,
    pub context: PageContext,
}

impl Page {
    #[must_use]
    pub fn new(shasum: impl Into<String>, url: impl Into<String>, language: &str) -> Self {
        Self {
            shasum: shasum.into(),
            url: url.into(),
            language: LanguageTag::new(language),
            translates: None,
            redirects: Vec::new(),
            permalink: None,
            context: PageContext::new(),
        }
    }

    #[must_use]
    pub fn stub(&self) -> PageStub {
        PageStub {
            shasum: self.shasum.clone(),
            url: self.url.clone(),
            language: self.language.clone(),
            translates: self.translates.clone(),
        }
    }

    /// Long (`/<uuid>`) and short (`/<shasum prefix>`) permalink paths,
    /// empty when the page has no permalink.
    #[must_use]
    pub fn permalink_urls(&self) -> Vec<String> {
        let Some(uuid) = self.permalink else {
            return Vec::new();
        };

        vec![
            format!("/{uuid}"),
            format!("/{}", short_shasum(&self.shasum)),
        ]
    }
}
