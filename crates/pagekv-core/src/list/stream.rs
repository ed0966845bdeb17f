use crate::{error::InternalError, list::FlatList, store::KeyValueStore, value::Tagged};
use std::{
    sync::{
        Arc,
        mpsc::{Receiver, SyncSender, sync_channel},
    },
    thread::{self, JoinHandle},
};
use tracing::trace;

///
/// FlatListStream
///
/// Finite, order-preserving, non-restartable sequence over one Flat List.
///
/// A producer thread reads slots and hands each value over a rendezvous
/// channel, so at most one value is in flight. Dropping the stream early
/// disconnects the channel; the producer's next hand-off fails and it exits,
/// and the drop joins it. The slot range is fixed at `end` as read when the
/// producer starts.
///

pub struct FlatListStream<T> {
    rx: Option<Receiver<Result<T, InternalError>>>,
    producer: Option<JoinHandle<()>>,
}

impl<T> FlatListStream<T>
where
    T: Tagged + PartialEq + Send + 'static,
{
    pub(super) fn spawn(
        list: FlatList<T>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, InternalError> {
        let (tx, rx) = sync_channel(0);

        let producer = thread::Builder::new()
            .name("pagekv-flatlist".to_string())
            .spawn(move || produce(&list, store.as_ref(), &tx))
            .map_err(|err| {
                InternalError::list_internal(format!("flat list producer failed to start: {err}"))
            })?;

        Ok(Self {
            rx: Some(rx),
            producer: Some(producer),
        })
    }
}

fn produce<T>(
    list: &FlatList<T>,
    store: &dyn KeyValueStore,
    tx: &SyncSender<Result<T, InternalError>>,
) where
    T: Tagged + PartialEq,
{
    let end = match list.end(store) {
        Ok(end) => end,
        Err(err) => {
            let _ = tx.send(Err(err));
            return;
        }
    };

    for slot in 0..end {
        let item = match list.read_slot(store, slot) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => continue,
            Err(err) => Err(err),
        };
        let failed = item.is_err();

        if tx.send(item).is_err() {
            trace!(target: "pagekv::list", key = %list.key(), slot, "stream abandoned");
            return;
        }
        if failed {
            return;
        }
    }
}

impl<T> Iterator for FlatListStream<T> {
    type Item = Result<T, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl<T> Drop for FlatListStream<T> {
    fn drop(&mut self) {
        // Disconnect first so a producer blocked in send() wakes up.
        drop(self.rx.take());

        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
    }
}
