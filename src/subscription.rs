//! Scoped registration handle with idempotent release.

use std::fmt;

use parking_lot::Mutex;

/// Cancellation closure handed back by a registration.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// A live registration (provider subscription or store listener).
///
/// `release()` runs the underlying cancellation at most once; further calls
/// are no-ops. Dropping the handle releases it.
pub struct Subscription {
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self::from_boxed(Box::new(unsubscribe))
    }

    pub fn from_boxed(unsubscribe: Unsubscribe) -> Self {
        Self {
            unsubscribe: Mutex::new(Some(unsubscribe)),
        }
    }

    /// Release the registration. Returns true only for the call that
    /// actually released it.
    pub fn release(&self) -> bool {
        // Take under the lock, run outside it: the closure may re-enter.
        let unsub = self.unsubscribe.lock().take();
        match unsub {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.lock().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
