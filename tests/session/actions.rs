use std::sync::Arc;

use auth_session::{
    AuthError, AuthSession, OAuthProvider, PasswordCredentials, ProviderError, ProviderErrorKind,
    ProviderOp, SessionErrorEvent, SessionOptions, SessionPhase, SessionState, SignOutPolicy,
    SignUpParams,
};

use crate::common::{
    alice, bob, make_log, memory_provider, mount, record_states, GatedProvider, SilentProvider,
    ALICE_PASSWORD,
};

fn alice_credentials() -> PasswordCredentials {
    PasswordCredentials::new("a@x.com", ALICE_PASSWORD)
}

// ============================================================================
// sign_in_with_password
// ============================================================================

#[tokio::test]
async fn password_sign_in_authenticates() {
    let session = AuthSession::start(memory_provider(), SessionOptions::default()).await;

    let user = session.sign_in_with_password(&alice_credentials()).await.unwrap();

    assert_eq!(user, Some(alice()));
    assert_eq!(session.user(), Some(alice()));
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn failed_sign_in_returns_error_and_keeps_session() {
    let provider = memory_provider();
    provider.restore_session(bob());
    let session = AuthSession::start(provider, SessionOptions::default()).await;
    let (log, _sub) = record_states(&session);

    let err = session
        .sign_in_with_password(&PasswordCredentials::new("bad@x.com", "wrong"))
        .await
        .unwrap_err();

    assert!(err.is_invalid_credentials());
    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(session.user(), Some(bob()));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_sign_in_while_anonymous_stays_anonymous() {
    let session = AuthSession::start(memory_provider(), SessionOptions::default()).await;

    let result = session
        .sign_in_with_password(&PasswordCredentials::new("a@x.com", "wrong"))
        .await;

    assert!(result.is_err());
    assert_eq!(session.state(), SessionState { user: None, is_loading: false });
}

#[tokio::test]
async fn transport_failure_during_sign_in_is_returned() {
    let provider = memory_provider();
    provider.fail_next(ProviderOp::SignInWithPassword, ProviderError::new("offline"));
    let session = AuthSession::start(provider, SessionOptions::default()).await;

    let err = session.sign_in_with_password(&alice_credentials()).await.unwrap_err();

    assert_eq!(
        err.provider_error().map(|e| e.kind),
        Some(ProviderErrorKind::Transport)
    );
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn action_write_does_not_end_loading() {
    let session = AuthSession::mount(Arc::new(SilentProvider { user: None }), SessionOptions::default());

    session.sign_in_with_password(&alice_credentials()).await.unwrap();

    assert_eq!(session.user(), Some(alice()));
    assert!(session.is_loading());

    session.load().await.unwrap();
    // Lookup lands last and reports no user: last write wins.
    assert_eq!(session.state(), SessionState { user: None, is_loading: false });
}

// ============================================================================
// sign_up_with_password
// ============================================================================

#[tokio::test]
async fn sign_up_signs_in_new_account() {
    let session = AuthSession::start(memory_provider(), SessionOptions::default()).await;

    let user = session
        .sign_up_with_password(&SignUpParams::new("c@x.com", "pw-123456").with_name("Carol"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.email, "c@x.com");
    assert_eq!(session.user(), Some(user));
}

#[tokio::test]
async fn sign_up_pending_confirmation_leaves_state_alone() {
    let provider = memory_provider();
    provider.require_email_confirmation(true);
    let session = AuthSession::start(provider, SessionOptions::default()).await;

    let user = session
        .sign_up_with_password(&SignUpParams::new("c@x.com", "pw-123456"))
        .await
        .unwrap();

    assert!(user.is_none());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn duplicate_sign_up_keeps_existing_session() {
    let provider = memory_provider();
    provider.restore_session(bob());
    let session = AuthSession::start(provider, SessionOptions::default()).await;

    let err = session
        .sign_up_with_password(&SignUpParams::new("a@x.com", "whatever"))
        .await
        .unwrap_err();

    assert_eq!(err.provider_error().map(|e| e.kind), Some(ProviderErrorKind::Rejected));
    assert_eq!(session.user(), Some(bob()));
}

// ============================================================================
// sign_in_with_oauth
// ============================================================================

#[tokio::test]
async fn oauth_does_not_touch_state_until_backend_completes() {
    let provider = memory_provider();
    let options = SessionOptions {
        app_origin: Some("https://app.example.com".into()),
        ..Default::default()
    };
    let session = AuthSession::start(provider.clone(), options).await;
    let (log, _sub) = record_states(&session);

    session.sign_in_with_oauth(OAuthProvider::Github).await.unwrap();

    assert!(log.lock().unwrap().is_empty());
    assert!(!session.is_authenticated());
    let pending = provider.pending_oauth().unwrap();
    assert_eq!(pending.provider, OAuthProvider::Github);
    assert_eq!(
        pending.redirect_url.as_deref(),
        Some("https://app.example.com/auth/callback")
    );

    provider.complete_oauth(alice());
    assert_eq!(session.user(), Some(alice()));
}

#[tokio::test]
async fn oauth_failure_propagates_and_leaves_state_idle() {
    let provider = memory_provider();
    provider.fail_next(
        ProviderOp::SignInWithOAuth,
        ProviderError::new("provider not enabled"),
    );
    let session = AuthSession::start(provider, SessionOptions::default()).await;

    let err = session.sign_in_with_oauth(OAuthProvider::Apple).await.unwrap_err();

    assert_eq!(err.to_string(), "provider not enabled");
    assert_eq!(session.state(), SessionState { user: None, is_loading: false });
}

// ============================================================================
// sign_out
// ============================================================================

#[tokio::test]
async fn sign_out_clears_user() {
    let provider = memory_provider();
    provider.restore_session(alice());
    let session = AuthSession::start(provider.clone(), SessionOptions::default()).await;

    session.sign_out().await.unwrap();

    assert_eq!(session.user(), None);
    assert!(!session.is_authenticated());
    assert!(provider.current_token().is_none());
}

#[tokio::test]
async fn failed_sign_out_preserves_session() {
    let provider = memory_provider();
    provider.restore_session(alice());
    let session = AuthSession::start(provider.clone(), SessionOptions::default()).await;
    provider.fail_next(ProviderOp::SignOut, ProviderError::new("backend down"));

    let err = session.sign_out().await.unwrap_err();

    assert_eq!(err.to_string(), "backend down");
    assert_eq!(session.user(), Some(alice()));
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn optimistic_sign_out_clears_first_and_reports_failure() {
    let provider = memory_provider();
    provider.restore_session(alice());
    let events = make_log();
    let events_clone = Arc::clone(&events);
    let options = SessionOptions {
        sign_out_policy: SignOutPolicy::Optimistic,
        on_error: Some(Arc::new(move |e: &SessionErrorEvent| {
            events_clone.lock().unwrap().push(e.clone());
        })),
        ..Default::default()
    };
    let session = AuthSession::start(provider.clone(), options).await;
    provider.fail_next(ProviderOp::SignOut, ProviderError::new("backend down"));

    assert!(session.sign_out().await.is_err());

    assert!(!session.is_authenticated());
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].phase, SessionPhase::SignOut);
}

// ============================================================================
// get_access_token
// ============================================================================

#[tokio::test]
async fn access_token_is_fetched_fresh_every_time() {
    let provider = memory_provider();
    provider.restore_session(alice());
    let session = AuthSession::start(provider.clone(), SessionOptions::default()).await;

    let first = session.get_access_token().await.unwrap().unwrap();
    provider.rotate_token();
    let second = session.get_access_token().await.unwrap().unwrap();

    assert_ne!(first, second);
    assert_eq!(Some(second), provider.current_token());
    assert_eq!(provider.call_count(ProviderOp::GetSession), 2);
}

#[tokio::test]
async fn no_session_means_no_token() {
    let session = AuthSession::start(memory_provider(), SessionOptions::default()).await;
    assert!(session.get_access_token().await.unwrap().is_none());
}

#[tokio::test]
async fn expired_session_yields_no_token() {
    let provider = Arc::new(
        auth_session::MemoryAuthProvider::new().with_session_ttl(chrono::Duration::zero()),
    );
    provider.restore_session(alice());
    let session = mount(provider);

    assert!(session.get_access_token().await.unwrap().is_none());
}

#[tokio::test]
async fn token_lookup_failure_propagates() {
    let provider = memory_provider();
    provider.restore_session(alice());
    provider.fail_next(ProviderOp::GetSession, ProviderError::new("timeout"));
    let session = mount(provider);

    assert!(matches!(
        session.get_access_token().await,
        Err(AuthError::Provider(_))
    ));
}

// ============================================================================
// Liveness
// ============================================================================

#[tokio::test]
async fn sign_in_completing_after_unmount_is_discarded() {
    let memory = memory_provider();
    let gated = GatedProvider::new(memory, &[ProviderOp::SignInWithPassword]);
    let session = AuthSession::start(gated.clone(), SessionOptions::default()).await;
    let (log, _sub) = record_states(&session);

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.sign_in_with_password(&alice_credentials()).await })
    };
    gated.wait_entered().await;
    session.unmount();
    gated.release();

    // The provider call itself succeeded; only the local write is skipped.
    let user = pending.await.unwrap().unwrap();
    assert_eq!(user, Some(alice()));
    assert_eq!(session.user(), None);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn actions_after_unmount_are_rejected() {
    let provider = memory_provider();
    let session = mount(provider.clone());
    session.unmount();

    assert!(matches!(
        session.sign_in_with_password(&alice_credentials()).await,
        Err(AuthError::Unmounted)
    ));
    assert!(matches!(session.sign_out().await, Err(AuthError::Unmounted)));
    assert!(matches!(session.get_access_token().await, Err(AuthError::Unmounted)));
    assert!(matches!(
        session.sign_in_with_oauth(OAuthProvider::Google).await,
        Err(AuthError::Unmounted)
    ));
    assert_eq!(provider.call_count(ProviderOp::SignInWithPassword), 0);
}
