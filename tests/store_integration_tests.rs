//! End-to-end engine over the SQLite store and the local identity provider.

use std::sync::Arc;
use task_sync::config::SyncConfig;
use task_sync::db::Database;
use task_sync::error::AuthError;
use task_sync::logging::Logger;
use task_sync::remote::{DocumentStore, LocalIdentityProvider, SqliteDocumentStore};
use task_sync::sync::{RecordEditor, SessionController, SessionState, SyncContext};
use task_sync::types::task_fields;

fn setup() -> (Arc<SqliteDocumentStore>, SyncContext) {
    let db = Database::open_in_memory().unwrap();
    let store = Arc::new(SqliteDocumentStore::new(db.clone()));
    let identity = Arc::new(LocalIdentityProvider::new(db));
    let ctx = SyncContext::new(
        store.clone(),
        identity,
        &SyncConfig::default(),
        Logger::new(),
    );
    (store, ctx)
}

fn texts(session: &SessionController) -> Vec<String> {
    session
        .materializer()
        .visible()
        .iter()
        .map(|r| r.text.clone())
        .collect()
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_add_edit_remove() {
        let (_store, ctx) = setup();
        let session = SessionController::start(&ctx);
        assert_eq!(session.state(), SessionState::Unauthenticated);

        let user = session
            .gate()
            .sign_up("ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(session.identity(), Some(user.clone()));
        assert!(texts(&session).is_empty());

        let dispatcher = session.dispatcher();
        let milk = dispatcher.add(Some(&user), "Buy milk").await.unwrap();
        dispatcher.add(Some(&user), " Walk dog ").await.unwrap();
        // The store pushes on write, so the view is current once the add returns.
        assert_eq!(texts(&session), vec!["Buy milk", "Walk dog"]);

        let mut editor = RecordEditor::new();
        let record = session.materializer().visible()[0].clone();
        editor.start_edit(&record);
        editor.set_buffer("Buy oat milk");
        editor.save(dispatcher).await.unwrap();
        assert_eq!(texts(&session), vec!["Buy oat milk", "Walk dog"]);

        dispatcher.remove(&milk, |_| true).await.unwrap();
        assert_eq!(texts(&session), vec!["Walk dog"]);
        assert!(!dispatcher.is_pending(&milk));
    }

    #[tokio::test]
    async fn sign_out_clears_view_and_sign_in_restores_it() {
        let (_store, ctx) = setup();
        let session = SessionController::start(&ctx);
        let user = session
            .gate()
            .sign_up("ada@example.com", "hunter22")
            .await
            .unwrap();
        session.dispatcher().add(Some(&user), "Buy milk").await.unwrap();

        session.sign_out().await.unwrap();
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(texts(&session).is_empty());

        session
            .gate()
            .sign_in("ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(texts(&session), vec!["Buy milk"]);
    }

    #[tokio::test]
    async fn wrong_password_keeps_session_signed_out() {
        let (_store, ctx) = setup();
        let session = SessionController::start(&ctx);
        session
            .gate()
            .sign_up("ada@example.com", "hunter22")
            .await
            .unwrap();
        session.sign_out().await.unwrap();

        let err = session
            .gate()
            .sign_in("ada@example.com", "wrong-password")
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }
}

mod isolation_tests {
    use super::*;

    #[tokio::test]
    async fn each_identity_sees_only_its_tasks() {
        let (store, ctx) = setup();
        let session = SessionController::start(&ctx);

        let ada = session
            .gate()
            .sign_up("ada@example.com", "hunter22")
            .await
            .unwrap();
        session.dispatcher().add(Some(&ada), "Ada's task").await.unwrap();

        let bob = session
            .gate()
            .sign_up("bob@example.com", "hunter22")
            .await
            .unwrap();
        assert!(texts(&session).is_empty());
        session.dispatcher().add(Some(&bob), "Bob's task").await.unwrap();
        assert_eq!(texts(&session), vec!["Bob's task"]);

        // Someone else's write still pushes, but the view stays scoped.
        store
            .insert("todos", task_fields(&ada.uid, "Another for Ada"))
            .await
            .unwrap();
        assert_eq!(texts(&session), vec!["Bob's task"]);
        assert_eq!(store.subscription_count(), 1);
    }

    #[tokio::test]
    async fn editing_another_identity_record_is_rejected() {
        let (store, ctx) = setup();
        let foreign = store
            .insert("todos", task_fields("someone-else", "Not yours"))
            .await
            .unwrap();
        let session = SessionController::start(&ctx);
        session
            .gate()
            .sign_up("ada@example.com", "hunter22")
            .await
            .unwrap();

        let err = session
            .dispatcher()
            .update(&foreign, "Mine now")
            .await
            .unwrap_err();

        assert!(err.is_validation());
        let docs = store.list_all("todos").await.unwrap();
        assert_eq!(docs[0].fields["text"], "Not yours");
    }
}
