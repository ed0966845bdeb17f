//! Secondary indexing over an abstract key-value store: the tagged value
//! codec, Flat Lists, store-backed spin locks and the page index built from
//! them.
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod index;
pub mod list;
pub mod lock;
pub mod obs;
pub mod serialize;
pub mod store;
pub mod value;

///
/// Prelude
///
/// Types needed to open an index and run lookups. Errors, stores other
/// than the in-memory reference backend, and locks stay in their modules.
///

pub mod prelude {
    pub use crate::{
        config::IndexConfig,
        index::{LanguageTag, Page, PageContext, PageIndex, PageStub},
        store::{KeyValueCache, MemoryCache},
        value::Value,
    };
}
