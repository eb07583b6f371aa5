//! Session Controller: identity transitions, redirects, teardown.

mod common;

use common::{FakeIdentity, FakeStore, context, identity};
use std::sync::Arc;
use task_sync::sync::{Navigation, SessionController, SessionState};
use tokio::sync::broadcast::error::TryRecvError;

fn seeded_store() -> Arc<FakeStore> {
    let store = FakeStore::new();
    store.seed("1", "U1", "Buy milk");
    store.seed("2", "U2", "Walk dog");
    store
}

fn texts(session: &SessionController) -> Vec<String> {
    session
        .materializer()
        .visible()
        .iter()
        .map(|r| r.text.clone())
        .collect()
}

mod start_tests {
    use super::*;

    #[tokio::test]
    async fn signed_in_at_start_subscribes_immediately() {
        let store = seeded_store();
        let provider = FakeIdentity::signed_in("U1");
        let (ctx, _logs) = context(&store, &provider);

        let session = SessionController::start(&ctx);

        assert_eq!(session.state(), SessionState::Authenticated(identity("U1")));
        assert_eq!(session.identity(), Some(identity("U1")));
        assert_eq!(store.subscription_count(), 1);
        assert_eq!(texts(&session), vec!["Buy milk"]);
    }

    #[tokio::test]
    async fn signed_out_at_start_is_unauthenticated() {
        let store = seeded_store();
        let provider = FakeIdentity::new();
        let (ctx, _logs) = context(&store, &provider);

        let session = SessionController::start(&ctx);

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(store.subscribe_calls(), 0);
        assert!(texts(&session).is_empty());
    }
}

mod transition_tests {
    use super::*;

    #[tokio::test]
    async fn identity_switch_restarts_subscription() {
        let store = seeded_store();
        let provider = FakeIdentity::signed_in("U1");
        let (ctx, _logs) = context(&store, &provider);
        let session = SessionController::start(&ctx);

        provider.emit(Some(identity("U2")));

        assert_eq!(session.state(), SessionState::Authenticated(identity("U2")));
        assert_eq!(store.subscribe_calls(), 2);
        assert_eq!(store.subscription_count(), 1);
        assert_eq!(texts(&session), vec!["Walk dog"]);
    }

    #[tokio::test]
    async fn same_identity_again_is_ignored() {
        let store = seeded_store();
        let provider = FakeIdentity::signed_in("U1");
        let (ctx, _logs) = context(&store, &provider);
        let session = SessionController::start(&ctx);

        provider.emit(Some(identity("U1")));

        assert_eq!(store.subscribe_calls(), 1);
        assert_eq!(session.state(), SessionState::Authenticated(identity("U1")));
    }

    #[tokio::test]
    async fn signing_in_later_starts_subscription() {
        let store = seeded_store();
        let provider = FakeIdentity::new();
        let (ctx, _logs) = context(&store, &provider);
        let session = SessionController::start(&ctx);

        session.gate().sign_in("u1@example.com", "secret").await.unwrap();

        assert_eq!(session.state(), SessionState::Authenticated(identity("U1")));
        assert_eq!(texts(&session), vec!["Buy milk"]);
    }

    #[tokio::test]
    async fn losing_identity_redirects_every_time() {
        let store = seeded_store();
        let provider = FakeIdentity::signed_in("U1");
        let (ctx, _logs) = context(&store, &provider);
        let session = SessionController::start(&ctx);
        let mut navigation = session.subscribe_navigation();

        provider.emit(None);
        provider.emit(None);

        assert_eq!(navigation.try_recv(), Ok(Navigation::SignIn));
        assert_eq!(navigation.try_recv(), Ok(Navigation::SignIn));
        assert_eq!(navigation.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(store.subscription_count(), 0);
        assert!(texts(&session).is_empty());
    }

    #[tokio::test]
    async fn sign_out_goes_through_provider() {
        let store = seeded_store();
        let provider = FakeIdentity::signed_in("U1");
        let (ctx, _logs) = context(&store, &provider);
        let session = SessionController::start(&ctx);
        let mut navigation = session.subscribe_navigation();

        session.sign_out().await.unwrap();

        assert_eq!(provider.sign_out_calls(), 1);
        assert_eq!(navigation.try_recv(), Ok(Navigation::SignIn));
        assert!(texts(&session).is_empty());
    }

    #[tokio::test]
    async fn state_watchers_see_transitions() {
        let store = seeded_store();
        let provider = FakeIdentity::new();
        let (ctx, _logs) = context(&store, &provider);
        let session = SessionController::start(&ctx);
        let mut state = session.watch_state();
        assert_eq!(*state.borrow_and_update(), SessionState::Unauthenticated);

        provider.emit(Some(identity("U2")));

        assert!(state.has_changed().unwrap());
        assert_eq!(
            *state.borrow_and_update(),
            SessionState::Authenticated(identity("U2"))
        );
    }
}

mod teardown_tests {
    use super::*;

    #[tokio::test]
    async fn teardown_releases_everything() {
        let store = seeded_store();
        let provider = FakeIdentity::signed_in("U1");
        let (ctx, _logs) = context(&store, &provider);
        let session = SessionController::start(&ctx);
        assert_eq!(provider.handler_count(), 1);

        session.teardown();

        assert_eq!(provider.handler_count(), 0);
        assert_eq!(store.subscription_count(), 0);
        assert!(session.materializer().active_owner().is_none());
    }

    #[tokio::test]
    async fn later_identity_changes_are_ignored() {
        let store = seeded_store();
        let provider = FakeIdentity::signed_in("U1");
        let (ctx, _logs) = context(&store, &provider);
        let session = SessionController::start(&ctx);
        let mut navigation = session.subscribe_navigation();

        session.teardown();
        session.teardown();
        provider.emit(Some(identity("U2")));
        provider.emit(None);

        assert_eq!(store.subscribe_calls(), 1);
        assert_eq!(navigation.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn drop_tears_down() {
        let store = seeded_store();
        let provider = FakeIdentity::signed_in("U1");
        let (ctx, _logs) = context(&store, &provider);

        drop(SessionController::start(&ctx));

        assert_eq!(provider.handler_count(), 0);
        assert_eq!(store.subscription_count(), 0);
    }
}
