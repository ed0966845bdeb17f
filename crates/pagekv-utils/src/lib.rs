//! Small shared helpers for pagekv: key-case normalization and content
//! hashing. Nothing here touches a store.

pub mod case;
pub mod hash;

pub use case::kebab_key;
pub use hash::{SHORT_SHASUM_LEN, content_shasum, short_shasum};
