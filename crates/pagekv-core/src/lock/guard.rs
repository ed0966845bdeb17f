use crate::lock::SpinLock;
use tracing::warn;

///
/// SpinLockGuard
///
/// Holds a [`SpinLock`] for one requester and unlocks on drop. An unlock
/// failure during drop is logged, never propagated.
///

#[must_use = "dropping the guard releases the lock immediately"]
pub struct SpinLockGuard<'a> {
    lock: &'a SpinLock,
    requester: String,
    released: bool,
}

impl<'a> SpinLockGuard<'a> {
    pub(super) fn new(lock: &'a SpinLock, requester: &str) -> Self {
        Self {
            lock,
            requester: requester.to_string(),
            released: false,
        }
    }

    #[must_use]
    pub fn requester(&self) -> &str {
        &self.requester
    }

    /// Release now, surfacing any store error.
    pub fn release(mut self) -> Result<(), crate::error::InternalError> {
        self.released = true;
        self.lock.unlock(&self.requester)
    }
}

impl Drop for SpinLockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(err) = self.lock.unlock(&self.requester) {
            warn!(
                target: "pagekv::lock",
                lock = %self.lock.identity(),
                requester = %self.requester,
                error = %err,
                "unlock on guard drop failed"
            );
        }
    }
}
