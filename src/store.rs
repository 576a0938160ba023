//! SessionStore: the single source of truth for the current session.
//!
//! Holds a `SessionState` snapshot behind a `tokio::sync::watch` channel so it
//! can be read synchronously (`snapshot`) or awaited (`watch`, `loaded`).
//! Callback listeners receive the full new snapshot after every applied write.
//!
//! Writes are total replacements and are only reachable from inside the
//! crate (synchronizer and action mediator). Once the store is closed every
//! write is dropped.
//!
//! Delivery to listeners is serialized. A write made while listeners are
//! being called (from a listener, or from another thread) only marks the
//! store dirty; the running delivery loop then re-reads the current snapshot
//! and delivers it in a further round. The last snapshot every listener sees
//! is therefore the store's current one.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::error::{AuthError, Result};
use crate::subscription::Subscription;
use crate::types::{SessionState, User};

/// Callback invoked with the new snapshot after each applied write.
pub type SessionListener = Arc<dyn Fn(&SessionState) + Send + Sync>;

type ListenerList = Mutex<Vec<(u64, SessionListener)>>;

#[derive(Default)]
struct Delivery {
    /// A delivery loop is calling listeners.
    running: bool,
    /// A write landed that listeners have not seen yet.
    pending: bool,
}

pub struct SessionStore {
    state: watch::Sender<SessionState>,
    listeners: Arc<ListenerList>,
    next_listener_id: AtomicU64,
    /// Liveness flag. Held across the check-and-write so `close` cannot
    /// interleave with a write in progress.
    open: Mutex<bool>,
    delivery: Mutex<Delivery>,
}

impl SessionStore {
    /// Create a store in the initial `{user: None, is_loading: true}` state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            state,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(1),
            open: Mutex::new(true),
            delivery: Mutex::new(Delivery::default()),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Receiver that observes every applied write. Receivers are woken once
    /// more when the store closes.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until the first resolution has happened and return that snapshot.
    ///
    /// # Errors
    /// `AuthError::Unmounted` when the store is closed while still loading.
    pub async fn loaded(&self) -> Result<SessionState> {
        let mut rx = self.state.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if !state.is_loading {
                    return Ok(state.clone());
                }
            }
            if !self.is_open() {
                return Err(AuthError::Unmounted);
            }
            if rx.changed().await.is_err() {
                return Err(AuthError::Unmounted);
            }
        }
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener. It is not called for the current snapshot, only
    /// for writes applied after registration.
    pub fn subscribe(&self, listener: impl Fn(&SessionState) + Send + Sync + 'static) -> Subscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));

        let registry: Weak<ListenerList> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().retain(|(lid, _)| *lid != id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    // ========================================================================
    // Writes (crate-internal)
    // ========================================================================

    /// Resolution from the provider: sets the user and ends loading.
    pub(crate) fn resolve(&self, user: Option<User>) -> bool {
        self.write("resolve", |_| SessionState {
            user,
            is_loading: false,
        })
    }

    /// Action result: sets the user, leaves the loading flag as it is.
    pub(crate) fn replace_user(&self, user: Option<User>) -> bool {
        self.write("replace_user", |current| SessionState {
            user,
            is_loading: current.is_loading,
        })
    }

    /// Ends loading without touching the user.
    pub(crate) fn finish_loading(&self) -> bool {
        self.write("finish_loading", |current| SessionState {
            user: current.user.clone(),
            is_loading: false,
        })
    }

    /// Mark the store torn down. Later writes are dropped. Returns true only
    /// for the call that closed it.
    pub(crate) fn close(&self) -> bool {
        let was_open = {
            let mut open = self.open.lock();
            std::mem::replace(&mut *open, false)
        };
        if was_open {
            // Wake `loaded` waiters so they can observe the closed store.
            self.state.send_modify(|_| {});
        }
        was_open
    }

    fn write(&self, op: &'static str, next: impl FnOnce(&SessionState) -> SessionState) -> bool {
        {
            let open = self.open.lock();
            if !*open {
                debug!(op, "dropping write to closed session store");
                return false;
            }
            self.state.send_modify(|state| {
                let mut replacement = next(state);
                // Loading never re-enters once resolved.
                replacement.is_loading &= state.is_loading;
                *state = replacement;
                debug!(
                    op,
                    authenticated = state.is_authenticated(),
                    loading = state.is_loading,
                    "session state replaced"
                );
            });
        }

        self.deliver();
        true
    }

    /// Run the delivery loop unless one is already running, in which case
    /// that loop picks up this write.
    fn deliver(&self) {
        {
            let mut delivery = self.delivery.lock();
            delivery.pending = true;
            if delivery.running {
                return;
            }
            delivery.running = true;
        }

        loop {
            {
                let mut delivery = self.delivery.lock();
                if !delivery.pending {
                    delivery.running = false;
                    return;
                }
                delivery.pending = false;
            }
            let snapshot = self.snapshot();
            self.notify(&snapshot);
        }
    }

    /// Call listeners outside every lock so they may read the store, write
    /// to it, or register further listeners.
    fn notify(&self, snapshot: &SessionState) {
        let listeners: Vec<SessionListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
                error!("session listener panicked; continuing with remaining listeners");
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
