//! Flat List: an ordered, appendable, removable `[T]` spread across
//! individual store keys.
//!
//! Layout for base key `k`:
//! - `k__end`    next never-used slot; only grows
//! - `k__count`  occupied slots
//! - `k__free`   vacated slots, ascending, reused lowest-first
//! - `k__idx__n` value at slot `n`, or the tombstone
//!
//! The list does no locking of its own. Callers that mutate one list from
//! several tasks must serialize those calls.

mod keys;
mod stream;

#[cfg(test)]
mod tests;

pub use stream::FlatListStream;

use crate::{
    error::InternalError,
    store::KeyValueStore,
    value::{self, TOMBSTONE, Tagged, Value, is_tombstone},
};
use std::{marker::PhantomData, sync::Arc};
use tracing::trace;

///
/// FlatList
///
/// Typed handle to one list. Holds only the base key; every operation
/// reads and writes through the store passed in.
///

pub struct FlatList<T> {
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for FlatList<T> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone())
    }
}

impl<T> std::fmt::Debug for FlatList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatList").field("key", &self.key).finish()
    }
}

impl<T> FlatList<T> {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T> FlatList<T>
where
    T: Tagged + PartialEq,
{
    /// Next unused slot index.
    pub fn end(&self, store: &dyn KeyValueStore) -> Result<u64, InternalError> {
        self.read_counter(store, &keys::end_key(&self.key))
    }

    /// Number of occupied slots. O(1).
    pub fn count(&self, store: &dyn KeyValueStore) -> Result<u64, InternalError> {
        self.read_counter(store, &keys::count_key(&self.key))
    }

    pub fn is_empty(&self, store: &dyn KeyValueStore) -> Result<bool, InternalError> {
        Ok(self.count(store)? == 0)
    }

    /// Append `value`, reusing the lowest vacated slot before growing `end`.
    /// Duplicates are allowed. Returns the slot written.
    pub fn append(&self, store: &dyn KeyValueStore, value: &T) -> Result<u64, InternalError> {
        let encoded = value::encode(&value.to_value())?;
        let mut free = self.free_slots(store)?;

        let slot = if free.is_empty() {
            let end = self.end(store)?;
            store.set(&keys::slot_key(&self.key, end), &encoded)?;
            self.write_counter(store, &keys::end_key(&self.key), end + 1)?;
            end
        } else {
            let slot = free.remove(0);
            store.set(&keys::slot_key(&self.key, slot), &encoded)?;
            self.write_free_slots(store, &free)?;
            slot
        };

        let count = self.count(store)?;
        self.write_counter(store, &keys::count_key(&self.key), count + 1)?;

        trace!(target: "pagekv::list", key = %self.key, slot, "append");

        Ok(slot)
    }

    /// Append `value` only if no equal value is present. Returns whether it
    /// was appended.
    pub fn append_unique(
        &self,
        store: &dyn KeyValueStore,
        value: &T,
    ) -> Result<bool, InternalError> {
        if self.contains(store, value)? {
            return Ok(false);
        }

        self.append(store, value)?;

        Ok(true)
    }

    /// Tombstone the first slot holding `value`. O(end). Returns the vacated
    /// slot, or `None` when nothing matched.
    pub fn remove(
        &self,
        store: &dyn KeyValueStore,
        value: &T,
    ) -> Result<Option<u64>, InternalError> {
        self.remove_where(store, |candidate| candidate == value)
    }

    /// [`remove`](Self::remove) with a caller-supplied match, for values
    /// whose `PartialEq` is not the identity wanted (floats).
    pub fn remove_where(
        &self,
        store: &dyn KeyValueStore,
        pred: impl FnMut(&T) -> bool,
    ) -> Result<Option<u64>, InternalError> {
        let Some(slot) = self.position(store, pred)? else {
            return Ok(None);
        };

        store.set(&keys::slot_key(&self.key, slot), TOMBSTONE)?;

        let mut free = self.free_slots(store)?;
        if let Err(at) = free.binary_search(&slot) {
            free.insert(at, slot);
        }
        self.write_free_slots(store, &free)?;

        let count = self.count(store)?;
        let Some(count) = count.checked_sub(1) else {
            return Err(InternalError::list_corruption(format!(
                "flat list '{}' count underflow removing slot {slot}",
                self.key
            )));
        };
        self.write_counter(store, &keys::count_key(&self.key), count)?;

        trace!(target: "pagekv::list", key = %self.key, slot, "remove");

        Ok(Some(slot))
    }

    pub fn contains(&self, store: &dyn KeyValueStore, value: &T) -> Result<bool, InternalError> {
        Ok(self.position(store, |candidate| candidate == value)?.is_some())
    }

    /// Every present value in slot order.
    pub fn get_all(&self, store: &dyn KeyValueStore) -> Result<Vec<T>, InternalError> {
        let mut out = Vec::new();
        self.range(store, |value| {
            out.push(value);
            true
        })?;

        Ok(out)
    }

    /// Visit present values in slot order until `f` returns `false`.
    pub fn range(
        &self,
        store: &dyn KeyValueStore,
        mut f: impl FnMut(T) -> bool,
    ) -> Result<(), InternalError> {
        let end = self.end(store)?;

        for slot in 0..end {
            if let Some(value) = self.read_slot(store, slot)?
                && !f(value)
            {
                break;
            }
        }

        Ok(())
    }

    /// First present value (ascending slots) matching `pred`.
    pub fn first(
        &self,
        store: &dyn KeyValueStore,
        mut pred: impl FnMut(&T) -> bool,
    ) -> Result<Option<T>, InternalError> {
        let mut found = None;
        self.range(store, |value| {
            if pred(&value) {
                found = Some(value);
                return false;
            }
            true
        })?;

        Ok(found)
    }

    /// Last present value (descending slots) matching `pred`.
    pub fn last(
        &self,
        store: &dyn KeyValueStore,
        mut pred: impl FnMut(&T) -> bool,
    ) -> Result<Option<T>, InternalError> {
        let end = self.end(store)?;

        for slot in (0..end).rev() {
            if let Some(value) = self.read_slot(store, slot)?
                && pred(&value)
            {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Delete every slot and the `free`/`count` keys. `end` is kept so slot
    /// numbering stays monotonic across resets.
    pub fn reset(&self, store: &dyn KeyValueStore) -> Result<(), InternalError> {
        let end = self.end(store)?;

        for slot in 0..end {
            store.delete(&keys::slot_key(&self.key, slot))?;
        }
        store.delete(&keys::free_key(&self.key))?;
        store.delete(&keys::count_key(&self.key))?;

        trace!(target: "pagekv::list", key = %self.key, end, "reset");

        Ok(())
    }

    /// Forget vacated slots so later appends grow `end` instead of reusing
    /// them. Queues call this to keep slot order equal to arrival order.
    pub fn discard_free(&self, store: &dyn KeyValueStore) -> Result<(), InternalError> {
        store.delete(&keys::free_key(&self.key))
    }

    // Slot of the first present value matching `pred`.
    fn position(
        &self,
        store: &dyn KeyValueStore,
        mut pred: impl FnMut(&T) -> bool,
    ) -> Result<Option<u64>, InternalError> {
        let end = self.end(store)?;

        for slot in 0..end {
            if let Some(value) = self.read_slot(store, slot)?
                && pred(&value)
            {
                return Ok(Some(slot));
            }
        }

        Ok(None)
    }

    // Missing slot keys read as vacant; a reset list still has its `end`.
    fn read_slot(&self, store: &dyn KeyValueStore, slot: u64) -> Result<Option<T>, InternalError> {
        let Some(bytes) = store.get(&keys::slot_key(&self.key, slot))? else {
            return Ok(None);
        };
        if is_tombstone(&bytes) {
            return Ok(None);
        }

        let value = T::from_value(value::decode(&bytes)?)?;

        Ok(Some(value))
    }

    fn read_counter(&self, store: &dyn KeyValueStore, key: &str) -> Result<u64, InternalError> {
        match store.get(key)? {
            None => Ok(0),
            Some(bytes) => u64::from_value(value::decode(&bytes)?).map_err(|err| {
                InternalError::list_corruption(format!("flat list counter '{key}': {err}"))
            }),
        }
    }

    fn write_counter(
        &self,
        store: &dyn KeyValueStore,
        key: &str,
        n: u64,
    ) -> Result<(), InternalError> {
        store.set(key, &value::encode(&Value::U64(n))?)
    }

    fn free_slots(&self, store: &dyn KeyValueStore) -> Result<Vec<u64>, InternalError> {
        let key = keys::free_key(&self.key);
        let Some(bytes) = store.get(&key)? else {
            return Ok(Vec::new());
        };

        let Value::List(items) = value::decode(&bytes)? else {
            return Err(InternalError::list_corruption(format!(
                "flat list free set '{key}' is not a list"
            )));
        };

        items
            .into_iter()
            .map(|item| {
                u64::from_value(item).map_err(|err| {
                    InternalError::list_corruption(format!("flat list free set '{key}': {err}"))
                })
            })
            .collect()
    }

    fn write_free_slots(
        &self,
        store: &dyn KeyValueStore,
        free: &[u64],
    ) -> Result<(), InternalError> {
        let key = keys::free_key(&self.key);
        if free.is_empty() {
            return store.delete(&key);
        }

        let list = Value::List(free.iter().copied().map(Value::U64).collect());
        store.set(&key, &value::encode(&list)?)
    }
}

impl<T> FlatList<T>
where
    T: Tagged + PartialEq + Send + 'static,
{
    /// Lazily produce present values in slot order from a background
    /// producer. Dropping the stream stops the producer.
    pub fn yield_values(
        &self,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<FlatListStream<T>, InternalError> {
        FlatListStream::spawn(self.clone(), store)
    }
}
