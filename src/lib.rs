//! Client-side authentication session manager.
//!
//! Tracks the signed-in user, mediates password and OAuth sign-in against an
//! injected identity backend (`AuthProvider`), hands out fresh access tokens,
//! and keeps a synchronously readable `SessionState` in step with backend
//! pushes (token refresh, expiry, sign-out in another tab).
//!
//! Credential verification and token issuance stay in the backend. This
//! crate only tracks and exposes the resulting state.

pub mod error;
pub mod options;
pub mod provider;
pub mod session;
pub mod store;
pub mod subscription;
pub mod types;

pub use error::{AuthError, ProviderError, ProviderErrorKind, Result};
pub use options::{SessionErrorEvent, SessionOptions, SessionPhase, SignOutPolicy};
pub use provider::{AuthProvider, AuthStateCallback, MemoryAuthProvider, ProviderOp};
pub use session::{AuthContext, AuthSession};
pub use store::{SessionListener, SessionStore};
pub use subscription::{Subscription, Unsubscribe};
pub use types::{
    AccessToken, OAuthConfig, OAuthProvider, PasswordCredentials, Session, SessionState,
    SignUpParams, User,
};
