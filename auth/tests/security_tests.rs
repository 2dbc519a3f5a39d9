//! Security-focused integration tests.
//!
//! This module contains tests that verify critical security properties
//! of the authentication system, including:
//!
//! - Session fixation prevention (regeneration on login)
//! - Exclusive regeneration under concurrent logins
//! - Username enumeration resistance
//! - Expired sessions never carrying a principal

use chrono::{Duration, Utc};
use gatehouse_auth::{
    config::{AuthConfig, AuthMode},
    environment::AuthEnvironment,
    error::INVALID_CREDENTIALS_MESSAGE,
    mocks::{ManualClock, MockUserRepository},
    providers::{ConstantTimeComparator, SessionStore},
    stores::MemorySessionStore,
    AuthAttempt, AuthError, AuthPhase, Authenticator, CredentialVerifier, LoginOutcome,
    Principal, Resolution, SessionRecord, UserId, FLASH_ERROR,
};
use proptest::prelude::*;
use std::sync::Arc;

const SECRET: &str = "0123456789abcdef0123456789abcdef";

type TestAuthenticator =
    Authenticator<MockUserRepository, ConstantTimeComparator, MemorySessionStore>;

fn setup() -> (Arc<TestAuthenticator>, MemorySessionStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = MemorySessionStore::with_clock(clock.clone());
    let env = AuthEnvironment::new(
        MockUserRepository::with_admin(),
        ConstantTimeComparator,
        store.clone(),
    )
    .with_clock(clock.clone());

    #[allow(clippy::unwrap_used)]
    let config = AuthConfig::new(SECRET, AuthMode::session())
        .unwrap()
        .with_session_ttl(Duration::seconds(15));

    (Arc::new(Authenticator::new(env, config)), store, clock)
}

/// **Session fixation**
///
/// An attacker who planted a pre-login id must lose it once the victim
/// logs in.
#[tokio::test]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn test_fixed_session_id_is_useless_after_login() {
    let (auth, store, _) = setup();

    // Arrange: attacker obtains an anonymous session and fixes it on the victim
    let fixed = store.create().await.unwrap();

    // Act: victim logs in with the fixed cookie
    let resolution = auth.resolve(Some(&fixed.session_id)).await.unwrap();
    let outcome = auth
        .login(resolution, &AuthAttempt::password("admin", "supersecret"))
        .await
        .unwrap();
    let LoginOutcome::Authenticated { record } = outcome else {
        panic!("expected Authenticated, got {outcome:?}");
    };

    // Assert: the fixed id resolves to nothing, the new one is the victim's
    assert_ne!(record.session_id, fixed.session_id);
    let attacker = auth.resolve(Some(&fixed.session_id)).await.unwrap();
    assert_eq!(attacker.phase, AuthPhase::NoSession);
    assert!(attacker.principal().is_none());

    let victim = auth.resolve(Some(&record.session_id)).await.unwrap();
    assert_eq!(victim.principal(), Some(&Principal::new(UserId::from(1))));
}

/// **Concurrent logins on one pre-login id**
///
/// Both requests resolved the same anonymous session. Exactly one
/// regeneration wins; the loser sees a conflict and no second post-login
/// record exists.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn test_concurrent_logins_have_one_winner() {
    let (auth, store, _) = setup();
    let pre = store.create().await.unwrap();
    let resolution = auth.resolve(Some(&pre.session_id)).await.unwrap();

    let mut handles = vec![];
    for _ in 0..2 {
        let auth = Arc::clone(&auth);
        let resolution = resolution.clone();
        handles.push(tokio::spawn(async move {
            auth.login(resolution, &AuthAttempt::password("admin", "supersecret"))
                .await
                .unwrap()
        }));
    }

    let mut winners = vec![];
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            LoginOutcome::Authenticated { record } => winners.push(record),
            LoginOutcome::Conflict => conflicts += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 1);
    assert!(store.load(&pre.session_id).await.unwrap().is_none());
    assert_eq!(store.len(), 1);

    // The surviving record is a complete, consistent login
    let stored: SessionRecord = store.load(&winners[0].session_id).await.unwrap().unwrap();
    assert_eq!(stored.principal, Some(Principal::new(UserId::from(1))));
    assert!(stored.flash.is_empty());
}

/// **Username enumeration**
///
/// Unknown user and wrong password produce the same flash, the same error
/// message, and the same outcome shape.
#[tokio::test]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn test_unknown_user_and_wrong_password_indistinguishable() {
    let (auth, _, _) = setup();

    let mut flashes = vec![];
    for attempt in [
        AuthAttempt::password("admin", "wrong"),
        AuthAttempt::password("nobody", "wrong"),
    ] {
        let outcome = auth
            .login(Resolution::none(), &attempt)
            .await
            .unwrap();
        let LoginOutcome::Rejected { record: Some(record) } = outcome else {
            panic!("expected Rejected, got {outcome:?}");
        };
        flashes.push(auth.consume_flash(&record.session_id, FLASH_ERROR).await.unwrap());
    }

    assert_eq!(flashes[0], flashes[1]);
    assert_eq!(flashes[0], vec![INVALID_CREDENTIALS_MESSAGE]);
}

/// **Expired session with principal still stored**
///
/// The record's `expires_at` is 1 second in the past; the next request must
/// be unauthenticated.
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_expired_session_is_unauthenticated() {
    let (auth, store, _) = setup();

    let mut record = SessionRecord::new(Utc::now() - Duration::minutes(1));
    record.principal = Some(Principal::new(UserId::from(1)));
    record.expires_at = Some(Utc::now() - Duration::seconds(1));
    store.insert(record.clone()).unwrap();

    let resolution = auth.resolve(Some(&record.session_id)).await.unwrap();
    assert!(!resolution.is_authenticated());
    assert!(resolution.principal().is_none());
    assert!(store.load(&record.session_id).await.unwrap().is_none());
}

/// Sessions expire exactly at `expires_at`, counted from login.
#[tokio::test]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn test_timed_session_expires_after_ttl() {
    let (auth, _, clock) = setup();

    let outcome = auth
        .login(
            Resolution::none(),
            &AuthAttempt::password("admin", "supersecret"),
        )
        .await
        .unwrap();
    let LoginOutcome::Authenticated { record } = outcome else {
        panic!("expected Authenticated");
    };

    clock.advance(Duration::seconds(10));
    assert!(auth.resolve(Some(&record.session_id)).await.unwrap().is_authenticated());

    clock.advance(Duration::seconds(5));
    assert!(!auth.resolve(Some(&record.session_id)).await.unwrap().is_authenticated());
}

/// Repeated verification never changes the stored user.
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_verify_is_read_only() {
    let users = MockUserRepository::with_admin();
    let before = users.get("admin").unwrap();
    let verifier = CredentialVerifier::new(
        users.clone(),
        ConstantTimeComparator,
        std::time::Duration::from_secs(1),
    );

    for password in ["supersecret", "wrong", ""] {
        let _ = verifier.verify(&AuthAttempt::password("admin", password)).await;
    }

    assert_eq!(users.get("admin").unwrap(), before);
    // Empty input is rejected before the repository is consulted
    assert_eq!(users.lookup_count(), 2);
}

fn verify_blocking(attempt: &AuthAttempt) -> Result<Principal, AuthError> {
    let verifier = CredentialVerifier::new(
        MockUserRepository::with_admin(),
        ConstantTimeComparator,
        std::time::Duration::from_secs(1),
    );
    tokio_test::block_on(verifier.verify(attempt))
}

proptest! {
    /// Every invalid pair fails with the same outward message.
    #[test]
    #[allow(clippy::unwrap_used)]
    fn prop_rejections_share_one_message(
        username in "[a-z]{0,12}",
        password in "[ -~]{0,24}",
    ) {
        prop_assume!(!(username == "admin" && password == "supersecret"));

        let err = verify_blocking(&AuthAttempt::password(username, password)).unwrap_err();
        prop_assert!(matches!(err, AuthError::InvalidCredentials { .. }), "expected InvalidCredentials");
        prop_assert_eq!(err.to_string(), INVALID_CREDENTIALS_MESSAGE);
        prop_assert_eq!(err.public_message(), INVALID_CREDENTIALS_MESSAGE);
    }

    /// The only valid pair yields the stored id and no password material.
    #[test]
    #[allow(clippy::unwrap_used)]
    fn prop_valid_pair_yields_id_only(_seed in 0u8..4) {
        let principal = verify_blocking(&AuthAttempt::password("admin", "supersecret")).unwrap();
        prop_assert_eq!(principal.id, UserId::from(1));
        prop_assert!(principal.display_name.is_none());
    }
}
