//! SessionSynchronizer: keeps the store in step with the provider.
//!
//! Opens exactly one provider subscription when constructed and performs the
//! initial user lookup exactly once. Both sources resolve the store with the
//! same total-replacement write; whichever lands last wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AuthError, Result};
use crate::options::{SessionOptions, SessionPhase};
use crate::provider::{AuthProvider, AuthStateCallback};
use crate::store::SessionStore;
use crate::subscription::Subscription;

pub struct SessionSynchronizer {
    provider: Arc<dyn AuthProvider>,
    store: Arc<SessionStore>,
    options: Arc<SessionOptions>,
    subscription: Subscription,
    lookup_started: AtomicBool,
}

impl SessionSynchronizer {
    /// Subscribe to provider changes. The initial lookup is issued by `load`.
    pub fn start(
        provider: Arc<dyn AuthProvider>,
        store: Arc<SessionStore>,
        options: Arc<SessionOptions>,
    ) -> Self {
        // Weak: a provider that outlives this instance must not keep the
        // store alive through its listener list.
        let target = Arc::downgrade(&store);
        let callback: AuthStateCallback = Arc::new(move |user| match target.upgrade() {
            Some(store) => {
                if !store.resolve(user) {
                    debug!("ignoring auth state change after teardown");
                }
            }
            None => debug!("ignoring auth state change for dropped session store"),
        });

        let subscription = Subscription::from_boxed(provider.on_auth_state_change(callback));
        debug!("subscribed to provider auth state changes");

        Self {
            provider,
            store,
            options,
            subscription,
            lookup_started: AtomicBool::new(false),
        }
    }

    /// Run the initial `get_user` lookup. Only the first call does any work.
    ///
    /// On failure (or timeout) the error is logged, reported to
    /// `on_error`, loading ends with whatever user the subscription has
    /// delivered so far, and the error is returned.
    pub async fn load(&self) -> Result<()> {
        if !self.store.is_open() {
            return Err(AuthError::Unmounted);
        }
        if self.lookup_started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let lookup = self.provider.get_user();
        let result = match self.options.initial_lookup_timeout {
            Some(limit) => match tokio::time::timeout(limit, lookup).await {
                Ok(found) => found.map_err(AuthError::from),
                Err(_) => Err(AuthError::Timeout(limit)),
            },
            None => lookup.await.map_err(AuthError::from),
        };

        match result {
            Ok(user) => {
                debug!(found = user.is_some(), "initial session lookup resolved");
                if !self.store.resolve(user) {
                    debug!("initial lookup resolved after teardown; discarded");
                }
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "initial session lookup failed");
                self.options.report(SessionPhase::InitialLookup, &err);
                self.store.finish_loading();
                Err(err)
            }
        }
    }

    /// Release the subscription and close the store. Safe to call repeatedly;
    /// returns true only for the call that tore the instance down.
    pub fn teardown(&self) -> bool {
        let released = self.subscription.release();
        let closed = self.store.close();
        if released || closed {
            debug!("session synchronizer torn down");
        }
        released || closed
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }
}
