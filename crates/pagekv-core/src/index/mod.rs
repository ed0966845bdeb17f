//! Page secondary index.
//!
//! A page is found by URL, redirect source, translation group, permalink
//! or the value of an indexed context attribute. Every index is a Flat
//! List (or a single key) in a named bucket obtained from the
//! [`KeyValueCache`]; the stub bucket maps shasum to [`PageStub`].
//!
//! All operations run under one process-local read/write lock: adds and
//! removes take the write side, lookups the read side. A failed add or
//! remove replays its compensation log before returning the error (see
//! [`guard`]).

mod buckets;
mod filter;
mod guard;
mod page;


pub use page::{ContextValue, LanguageTag, OPT_OUT_KEY, Page, PageContext, PageStub};

use crate::{
    config::IndexConfig,
    error::InternalError,
    index::{filter::KeyFilter, guard::IndexWriteGuard},
    list::FlatList,
    obs::{MetricsEvent, MetricsSink},
    serialize::{deserialize_bounded, serialize},
    store::{Bucket, KeyValueCache},
    value::{self, Tagged, Value},
};
use pagekv_utils::kebab_key;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};
use tracing::debug;
use uuid::Uuid;

/// Upper bound on a stored stub; larger values are treated as corrupt.
pub const MAX_STUB_BYTES: usize = 64 * 1024;

///
/// StorageReport
///
/// Key counts per index bucket.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StorageReport {
    pub buckets: BTreeMap<String, u64>,
}

///
/// PageIndex
///

pub struct PageIndex {
    cache: Arc<dyn KeyValueCache>,
    stubs: Bucket,
    urls: Bucket,
    redirects: Bucket,
    translated_by: Bucket,
    permalinks: Bucket,
    context_values: Bucket,
    context_stubs: Bucket,
    meta: Bucket,
    filter: KeyFilter,
    sink: Arc<dyn MetricsSink>,
    rw: RwLock<()>,
}

impl PageIndex {
    /// Open the index buckets in `cache`.
    ///
    /// # Panics
    /// If the cache cannot provide one of the fixed buckets.
    #[must_use]
    pub fn new(
        cache: Arc<dyn KeyValueCache>,
        config: &IndexConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            stubs: cache.must_bucket(buckets::STUBS),
            urls: cache.must_bucket(buckets::URLS),
            redirects: cache.must_bucket(buckets::REDIRECTS),
            translated_by: cache.must_bucket(buckets::TRANSLATED_BY),
            permalinks: cache.must_bucket(buckets::PERMALINKS),
            context_values: cache.must_bucket(buckets::CONTEXT_VALUES),
            context_stubs: cache.must_bucket(buckets::CONTEXT_STUBS),
            meta: cache.must_bucket(buckets::META),
            filter: KeyFilter::from_config(config),
            cache,
            sink,
            rw: RwLock::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Index `page`, storing `stub` under its shasum.
    ///
    /// Returns `false` without writing when the page opted out or a stub
    /// for the shasum already exists. Distinct pages with identical
    /// content share a shasum, so only the first of them is indexed.
    ///
    /// Permalink paths go into the URL, permalink and language indexes
    /// only; they are not translation group members.
    pub fn add_page(&self, stub: &PageStub, page: &Page) -> Result<bool, InternalError> {
        check_stub(stub, page)?;
        if page.context.is_opted_out() {
            return Ok(self.skipped("add", page, "opted out"));
        }

        let _write = self.rw.write();
        if self.stubs.get(&page.shasum)?.is_some() {
            return Ok(self.skipped("add", page, "already indexed"));
        }

        let shasum = page.shasum.as_str();
        let lang = self.language_bucket(&page.language)?;
        let mut update = Update::new("add", shasum, self.sink.clone());

        update.set(&self.stubs, shasum, serialize(stub)?)?;
        update.append(&self.urls, &page.url, shasum)?;
        update.append(&self.meta, buckets::ALL_URLS_KEY, &page.url)?;

        for source in &page.redirects {
            update.append(&self.redirects, source, shasum)?;
        }

        let pointer = shasum_pointer(shasum)?;
        update.append(&self.translated_by, &page.url, shasum)?;
        update.set(&lang, &page.url, pointer.clone())?;
        if let Some(original) = &page.translates {
            update.append(&self.translated_by, original, shasum)?;
            update.set(&lang, original, pointer.clone())?;
        }

        for path in page.permalink_urls() {
            update.append(&self.urls, &path, shasum)?;
            update.append(&self.permalinks, &path, shasum)?;
            update.set(&lang, &path, pointer.clone())?;
        }

        for (key, value) in self.indexed_context(page) {
            update.append_distinct(&self.context_values, key, value)?;
            update.append(
                &self.context_stubs,
                &buckets::context_stubs_key(key, &value.index_token()),
                shasum,
            )?;
        }

        let lists = update.finish();
        self.sink.record(MetricsEvent::IndexAdd { lists });
        debug!(target: "pagekv::index", shasum, url = %page.url, lists, "page indexed");

        Ok(true)
    }

    /// Undo [`add_page`](Self::add_page) for the same page.
    ///
    /// Returns `false` without writing when the page opted out or no stub
    /// exists for its shasum. The distinct-values list of each context key
    /// keeps the page's values; other pages may still carry them.
    pub fn remove_page(&self, stub: &PageStub, page: &Page) -> Result<bool, InternalError> {
        check_stub(stub, page)?;
        if page.context.is_opted_out() {
            return Ok(self.skipped("remove", page, "opted out"));
        }

        let _write = self.rw.write();
        if self.stubs.get(&page.shasum)?.is_none() {
            return Ok(self.skipped("remove", page, "not indexed"));
        }

        let shasum = page.shasum.as_str();
        let lang = self.language_bucket(&page.language)?;
        let mut update = Update::new("remove", shasum, self.sink.clone());

        for (key, value) in self.indexed_context(page) {
            update.remove(
                &self.context_stubs,
                &buckets::context_stubs_key(key, &value.index_token()),
                shasum,
            )?;
        }

        for path in page.permalink_urls() {
            update.delete_pointer(&lang, &path, shasum)?;
            update.remove(&self.permalinks, &path, shasum)?;
            update.remove(&self.urls, &path, shasum)?;
        }

        if let Some(original) = &page.translates {
            update.delete_pointer(&lang, original, shasum)?;
            update.remove(&self.translated_by, original, shasum)?;
        }
        update.delete_pointer(&lang, &page.url, shasum)?;
        update.remove(&self.translated_by, &page.url, shasum)?;

        for source in &page.redirects {
            update.remove(&self.redirects, source, shasum)?;
        }

        update.remove(&self.meta, buckets::ALL_URLS_KEY, &page.url)?;
        update.remove(&self.urls, &page.url, shasum)?;
        update.delete(&self.stubs, shasum)?;

        let lists = update.finish();
        self.sink.record(MetricsEvent::IndexRemove { lists });
        debug!(target: "pagekv::index", shasum, url = %page.url, lists, "page removed");

        Ok(true)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// The page serving `url` in `language`.
    pub fn find_page(
        &self,
        language: &LanguageTag,
        url: &str,
    ) -> Result<Option<PageStub>, InternalError> {
        let _read = self.rw.read();
        let Some(lang) = self
            .cache
            .existing_bucket(&buckets::language(language))?
        else {
            return Ok(None);
        };

        let Some(bytes) = lang.get(url)? else {
            return Ok(None);
        };
        let shasum = String::from_value(value::decode(&bytes)?)?;

        self.load_stub(&shasum).map(Some)
    }

    pub fn find_page_shasum(&self, shasum: &str) -> Result<Option<PageStub>, InternalError> {
        let _read = self.rw.read();

        self.stubs
            .get(shasum)?
            .map(|bytes| decode_stub(&bytes))
            .transpose()
    }

    /// Every page registered at `url`, in insertion order.
    pub fn find_pages(&self, url: &str) -> Result<Vec<PageStub>, InternalError> {
        let _read = self.rw.read();

        self.list_stubs(&self.urls, url)
    }

    /// The page a redirect from `url` leads to.
    pub fn find_redirection(&self, url: &str) -> Result<Option<PageStub>, InternalError> {
        let _read = self.rw.read();

        self.first_stub(&self.redirects, url)
    }

    /// The page at `url` and every page that translates it.
    pub fn find_translations(&self, url: &str) -> Result<Vec<PageStub>, InternalError> {
        let _read = self.rw.read();

        self.list_stubs(&self.translated_by, url)
    }

    pub fn find_permalink(&self, uuid: Uuid) -> Result<Option<PageStub>, InternalError> {
        self.find_permalink_path(&format!("/{uuid}"))
    }

    /// Resolve a long (`/<uuid>`) or short (`/<shasum prefix>`) permalink.
    pub fn find_permalink_path(&self, path: &str) -> Result<Option<PageStub>, InternalError> {
        let _read = self.rw.read();

        self.first_stub(&self.permalinks, path)
    }

    /// Pages whose url starts with `prefix`, in url insertion order.
    pub fn lookup_prefixed(&self, prefix: &str) -> Result<Vec<PageStub>, InternalError> {
        let _read = self.rw.read();
        let mut seen = HashSet::new();
        let mut out: Vec<PageStub> = Vec::new();

        for url in self.distinct_urls()? {
            if !url.starts_with(prefix) {
                continue;
            }
            for stub in self.list_stubs(&self.urls, &url)? {
                if seen.insert(stub.shasum.clone()) {
                    out.push(stub);
                }
            }
        }

        Ok(out)
    }

    /// Every indexed page url, first-seen order.
    pub fn all_urls(&self) -> Result<Vec<String>, InternalError> {
        let _read = self.rw.read();

        self.distinct_urls()
    }

    /// Distinct values seen for a context key, in first-seen order.
    pub fn page_context_values(&self, key: &str) -> Result<Vec<Value>, InternalError> {
        let _read = self.rw.read();

        FlatList::<Value>::new(kebab_key(key)).get_all(self.context_values.as_ref())
    }

    /// Pages carrying any value for `key`, grouped by value (first-seen
    /// order), pages within a value in insertion order.
    pub fn page_context_value_stubs(&self, key: &str) -> Result<Vec<PageStub>, InternalError> {
        let _read = self.rw.read();
        let key = kebab_key(key);
        let mut out = Vec::new();

        for value in FlatList::<Value>::new(key.as_str()).get_all(self.context_values.as_ref())? {
            let list_key = buckets::context_stubs_key(&key, &value.index_token());
            out.extend(self.list_stubs(&self.context_stubs, &list_key)?);
        }

        Ok(out)
    }

    /// Pages whose `key` attribute equals `value`, in insertion order.
    pub fn page_context_value_stubs_for(
        &self,
        key: &str,
        value: &Value,
    ) -> Result<Vec<PageStub>, InternalError> {
        let _read = self.rw.read();
        let list_key = buckets::context_stubs_key(&kebab_key(key), &value.index_token());

        self.list_stubs(&self.context_stubs, &list_key)
    }

    pub fn is_indexed(&self, shasum: &str) -> Result<bool, InternalError> {
        let _read = self.rw.read();

        Ok(self.stubs.get(shasum)?.is_some())
    }

    pub fn count_pages(&self) -> Result<u64, InternalError> {
        let _read = self.rw.read();

        self.stubs.size()
    }

    /// Key counts of every index bucket, language buckets included.
    pub fn storage_report(&self) -> Result<StorageReport, InternalError> {
        let _read = self.rw.read();
        let mut report = StorageReport::default();

        for name in self.cache.bucket_names() {
            if name.starts_with(buckets::PREFIX) {
                let size = self.cache.bucket(&name)?.size()?;
                report.buckets.insert(name, size);
            }
        }

        Ok(report)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn language_bucket(&self, language: &LanguageTag) -> Result<Bucket, InternalError> {
        self.cache.bucket(&buckets::language(language))
    }

    // Context attributes that get indices: admitted key, scalar non-empty value.
    fn indexed_context<'p>(&self, page: &'p Page) -> Vec<(&'p str, &'p Value)> {
        page.context
            .iter()
            .filter(|(key, _)| self.filter.admits(key))
            .filter_map(|(key, value)| Some((key.as_str(), value.indexable()?)))
            .collect()
    }

    fn skipped(&self, op: &'static str, page: &Page, reason: &'static str) -> bool {
        self.sink.record(MetricsEvent::IndexSkip);
        debug!(target: "pagekv::index", op, shasum = %page.shasum, reason, "index update skipped");

        false
    }

    fn distinct_urls(&self) -> Result<Vec<String>, InternalError> {
        let mut seen = HashSet::new();
        let mut urls: Vec<String> = Vec::new();
        FlatList::<String>::new(buckets::ALL_URLS_KEY).range(self.meta.as_ref(), |url| {
            if seen.insert(url.clone()) {
                urls.push(url);
            }
            true
        })?;

        Ok(urls)
    }

    fn list_stubs(&self, bucket: &Bucket, key: &str) -> Result<Vec<PageStub>, InternalError> {
        FlatList::<String>::new(key)
            .get_all(bucket.as_ref())?
            .iter()
            .map(|shasum| self.load_stub(shasum))
            .collect()
    }

    fn first_stub(&self, bucket: &Bucket, key: &str) -> Result<Option<PageStub>, InternalError> {
        FlatList::<String>::new(key)
            .first(bucket.as_ref(), |_| true)?
            .map(|shasum| self.load_stub(&shasum))
            .transpose()
    }

    // Stub for a shasum found in an index list; a missing stub is corruption.
    fn load_stub(&self, shasum: &str) -> Result<PageStub, InternalError> {
        let Some(bytes) = self.stubs.get(shasum)? else {
            return Err(InternalError::index_corruption(format!(
                "index references shasum '{shasum}' with no stored stub"
            )));
        };

        decode_stub(&bytes)
    }
}

fn decode_stub(bytes: &[u8]) -> Result<PageStub, InternalError> {
    Ok(deserialize_bounded(bytes, MAX_STUB_BYTES)?)
}

fn check_stub(stub: &PageStub, page: &Page) -> Result<(), InternalError> {
    if stub.shasum == page.shasum {
        return Ok(());
    }

    Err(InternalError::index_invariant(format!(
        "stub shasum '{}' does not match page shasum '{}'",
        stub.shasum, page.shasum
    )))
}

fn shasum_pointer(shasum: &str) -> Result<Vec<u8>, InternalError> {
    Ok(value::encode(&Value::Text(shasum.to_string()))?)
}

///
/// Update
///
/// One add/remove in progress: performs each step and logs its inverse
/// in the write guard.
///

struct Update {
    guard: IndexWriteGuard,
    lists: u64,
}

impl Update {
    fn new(op: &'static str, shasum: &str, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            guard: IndexWriteGuard::new(op, shasum, sink),
            lists: 0,
        }
    }

    fn finish(self) -> u64 {
        self.guard.finish();
        self.lists
    }

    fn append(&mut self, bucket: &Bucket, key: &str, value: &str) -> Result<(), InternalError> {
        let list = FlatList::<String>::new(key);
        let value = value.to_string();

        list.append(bucket.as_ref(), &value)?;
        self.lists += 1;

        let bucket = bucket.clone();
        self.guard
            .record(move || list.remove(bucket.as_ref(), &value).map(|_| ()));

        Ok(())
    }

    // Distinct by index token, the same identity that names the stub list.
    fn append_distinct(
        &mut self,
        bucket: &Bucket,
        key: &str,
        value: &Value,
    ) -> Result<(), InternalError> {
        let list = FlatList::<Value>::new(key);
        let token = value.index_token();

        let seen = list.first(bucket.as_ref(), |seen| seen.index_token() == token)?;
        if seen.is_some() {
            return Ok(());
        }
        list.append(bucket.as_ref(), value)?;
        self.lists += 1;

        let bucket = bucket.clone();
        self.guard.record(move || {
            list.remove_where(bucket.as_ref(), |seen| seen.index_token() == token)
                .map(|_| ())
        });

        Ok(())
    }

    // Remove one occurrence; a drained list is reset to drop its slot keys.
    fn remove(&mut self, bucket: &Bucket, key: &str, value: &str) -> Result<(), InternalError> {
        let list = FlatList::<String>::new(key);
        let value = value.to_string();

        if list.remove(bucket.as_ref(), &value)?.is_none() {
            return Ok(());
        }
        self.lists += 1;
        if list.is_empty(bucket.as_ref())? {
            list.reset(bucket.as_ref())?;
        }

        let bucket = bucket.clone();
        self.guard
            .record(move || list.append(bucket.as_ref(), &value).map(|_| ()));

        Ok(())
    }

    fn set(&mut self, bucket: &Bucket, key: &str, bytes: Vec<u8>) -> Result<(), InternalError> {
        let previous = bucket.get(key)?;
        bucket.set(key, &bytes)?;

        let bucket = bucket.clone();
        let key = key.to_string();
        self.guard.record(move || match previous {
            Some(previous) => bucket.set(&key, &previous),
            None => bucket.delete(&key),
        });

        Ok(())
    }

    fn delete(&mut self, bucket: &Bucket, key: &str) -> Result<(), InternalError> {
        let Some(previous) = bucket.get(key)? else {
            return Ok(());
        };
        bucket.delete(key)?;

        let bucket = bucket.clone();
        let key = key.to_string();
        self.guard.record(move || bucket.set(&key, &previous));

        Ok(())
    }

    // Delete a language pointer only while it still names `shasum`.
    fn delete_pointer(
        &mut self,
        bucket: &Bucket,
        key: &str,
        shasum: &str,
    ) -> Result<(), InternalError> {
        let Some(bytes) = bucket.get(key)? else {
            return Ok(());
        };
        if String::from_value(value::decode(&bytes)?)? != shasum {
            return Ok(());
        }

        self.delete(bucket, key)
    }
}
