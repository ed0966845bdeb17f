//! Bucket and list-key naming. These names are on-disk contract.

use crate::index::page::LanguageTag;

pub(crate) const PREFIX: &str = "pql__";

/// shasum -> CBOR `PageStub`
pub(crate) const STUBS: &str = "pql__stubs";
/// url -> Flat List of shasums
pub(crate) const URLS: &str = "pql__urls";
/// redirect source -> Flat List of shasums
pub(crate) const REDIRECTS: &str = "pql__redirects";
/// url -> Flat List of shasums of the page and its translations
pub(crate) const TRANSLATED_BY: &str = "pql__translated_by";
/// permalink path -> Flat List of shasums
pub(crate) const PERMALINKS: &str = "pql__permalinks";
/// context key -> Flat List of distinct values seen
pub(crate) const CONTEXT_VALUES: &str = "pql__context_values";
/// `<context key>__<value token>` -> Flat List of shasums
pub(crate) const CONTEXT_STUBS: &str = "pql__context_stubs";
/// misc lists; holds the all-urls list
pub(crate) const META: &str = "pql__meta";

/// List of every indexed page url, in insertion order.
pub(crate) const ALL_URLS_KEY: &str = "all-urls";

/// url -> shasum, single-valued, one bucket per language.
pub(crate) fn language(tag: &LanguageTag) -> String {
    format!("{PREFIX}lang__{tag}")
}

pub(crate) fn context_stubs_key(key: &str, token: &str) -> String {
    format!("{key}__{token}")
}
