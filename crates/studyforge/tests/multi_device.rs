//! Two devices of one user converging through a shared backend.

use std::sync::Arc;
use std::time::Duration;

use studyforge::core::{Answer, ChatRole, QuizMode, Timestamp, WrongAnswerKey};
use studyforge::store::{LocalStore, MemoryStore, SqliteStore};
use studyforge::sync::{Credential, MemoryGateway, SkipReason, SyncStatus};
use studyforge::{Studyforge, StudyforgeConfig};
use studyforge_testkit::fixtures::{completed_session, scenario_questions};
use studyforge_testkit::ManualClock;

const EXAM: &str = "saa-c03";

fn credential() -> Credential {
    Credential::new("alice-token")
}

async fn device<S: LocalStore + 'static>(
    store: Arc<S>,
    gateway: Arc<MemoryGateway>,
    config: &StudyforgeConfig,
) -> Studyforge<S, MemoryGateway> {
    let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
    Studyforge::with_clock(store, gateway, config, clock)
        .await
        .unwrap()
}

async fn miss_q3<S: LocalStore + 'static>(app: &Studyforge<S, MemoryGateway>) {
    app.start_quiz(QuizMode::Practice, EXAM, scenario_questions(EXAM), None)
        .await
        .unwrap();
    app.quiz()
        .await
        .answer_question("q3", Answer::single("B"))
        .unwrap();
    let result = app.submit_quiz().await.unwrap();
    assert_eq!(result.wrong_count, 1);
}

#[tokio::test]
async fn test_two_devices_converge() {
    let gateway = Arc::new(MemoryGateway::new());
    let config = StudyforgeConfig::default();
    let laptop = device(Arc::new(MemoryStore::new()), gateway.clone(), &config).await;
    let phone = device(Arc::new(MemoryStore::new()), gateway.clone(), &config).await;

    assert!(laptop.login(credential()).await.is_completed());
    miss_q3(&laptop).await;
    let pushed = laptop.join_background_push().await.unwrap();
    assert_eq!(pushed.sessions_pushed, 1);
    assert_eq!(pushed.wrong_answers_pushed, 1);

    // The phone picks up the laptop's progress on login.
    let report = phone.login(credential()).await;
    assert!(report.is_completed());
    assert_eq!(report.sessions.inserted, 1);
    assert_eq!(report.wrong_answers.inserted, 1);

    // Missing the same question again bumps the shared record.
    miss_q3(&phone).await;
    phone.join_background_push().await.unwrap();
    laptop.full_sync().await;

    let key = WrongAnswerKey::new(EXAM, "q3");
    let on_laptop = laptop.store().find_wrong_answer(&key).await.unwrap().unwrap();
    let on_phone = phone.store().find_wrong_answer(&key).await.unwrap().unwrap();
    assert_eq!(on_laptop.wrong_count, 2);
    assert_eq!(on_phone.wrong_count, 2);
    assert_eq!(on_laptop.global_id, on_phone.global_id);
    assert_eq!(laptop.store().list_sessions().await.unwrap().len(), 2);
    assert_eq!(phone.store().list_sessions().await.unwrap().len(), 2);

    // Mastery acknowledged on the phone reaches the laptop on its next pull.
    phone.mark_mastered(&on_phone.id).await.unwrap();
    phone.full_sync().await;
    let pulled = laptop.sync_engine().sync_from_backend().await;
    assert_eq!(pulled.wrong_answers.updated, 1);
    assert!(laptop.unmastered_wrong_answers(EXAM).await.unwrap().is_empty());
    assert_eq!(laptop.wrong_answers(EXAM).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_without_login_stays_local() {
    let gateway = Arc::new(MemoryGateway::new());
    let app = device(
        Arc::new(MemoryStore::new()),
        gateway.clone(),
        &StudyforgeConfig::default(),
    )
    .await;

    miss_q3(&app).await;
    assert!(app.join_background_push().await.is_none());
    assert_eq!(gateway.push_count(), 0);
    assert_eq!(
        app.full_sync().await.status,
        SyncStatus::Skipped(SkipReason::NoCredential)
    );
}

#[tokio::test]
async fn test_sync_after_submit_disabled() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut config = StudyforgeConfig::default();
    config.sync.sync_after_submit = false;
    let app = device(Arc::new(MemoryStore::new()), gateway.clone(), &config).await;

    app.login(credential()).await;
    let pushes = gateway.push_count();
    miss_q3(&app).await;
    assert!(app.join_background_push().await.is_none());
    assert_eq!(gateway.push_count(), pushes);
}

#[tokio::test]
async fn test_offline_then_online() {
    let gateway = Arc::new(MemoryGateway::new());
    let app = device(
        Arc::new(MemoryStore::new()),
        gateway.clone(),
        &StudyforgeConfig::default(),
    )
    .await;
    app.login(credential()).await;

    gateway.set_reachable(false);
    miss_q3(&app).await;
    let report = app.join_background_push().await.unwrap();
    assert_eq!(report.status, SyncStatus::Skipped(SkipReason::Unreachable));
    assert!(app.sync_state().error.is_some());
    assert!(gateway.wrong_answers_of(&credential()).await.is_empty());

    gateway.set_reachable(true);
    assert!(app.full_sync().await.is_completed());
    assert!(app.sync_state().error.is_none());
    assert_eq!(gateway.wrong_answers_of(&credential()).await.len(), 1);
}

#[tokio::test]
async fn test_logout_clears_sync_state_only() {
    let gateway = Arc::new(MemoryGateway::new());
    let app = device(
        Arc::new(MemoryStore::new()),
        gateway,
        &StudyforgeConfig::default(),
    )
    .await;

    app.login(credential()).await;
    miss_q3(&app).await;
    app.join_background_push().await;
    assert!(app.sync_state().last_sync.is_some());

    app.logout().await.unwrap();
    assert!(app.sync_state().last_sync.is_none());
    assert!(app.sync_engine().credential().is_none());
    assert_eq!(app.wrong_answers(EXAM).await.unwrap().len(), 1);
    assert_eq!(app.store().get_last_sync().await.unwrap(), None);
}

#[tokio::test]
async fn test_last_sync_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.db");
    let gateway = Arc::new(MemoryGateway::new());
    let config = StudyforgeConfig::default();

    let first_sync = {
        let app = device(
            Arc::new(SqliteStore::open(&path).unwrap()),
            gateway.clone(),
            &config,
        )
        .await;
        app.login(credential()).await;
        miss_q3(&app).await;
        app.join_background_push().await;
        app.sync_state().last_sync
    };
    assert!(first_sync.is_some());

    let app = device(Arc::new(SqliteStore::open(&path).unwrap()), gateway, &config).await;
    assert_eq!(app.sync_state().last_sync, first_sync);
    assert_eq!(app.wrong_answers(EXAM).await.unwrap().len(), 1);
    assert_eq!(app.sessions(EXAM).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_periodic_sync_pulls_remote_progress() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway
        .seed(&credential(), vec![completed_session(EXAM, 1_000, 85)], Vec::new())
        .await;

    let mut config = StudyforgeConfig::default();
    config.sync.interval_secs = 1;
    let app = device(Arc::new(MemoryStore::new()), gateway, &config).await;
    app.sync_engine().set_credential(Some(credential()));

    let mut state = app.subscribe_sync();
    let handle = app.spawn_periodic_sync();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if state.borrow_and_update().last_sync.is_some() {
                break;
            }
            state.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
    handle.abort();

    let sessions = app.sessions(EXAM).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].score, Some(85));
}

#[tokio::test]
async fn test_chat_history() {
    let app = device(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryGateway::new()),
        &StudyforgeConfig::default(),
    )
    .await;

    let chat = app
        .new_chat("VPC questions", Some("/quiz/saa-c03".into()))
        .await
        .unwrap();
    app.append_chat_message(&chat.id, ChatRole::User, "What is a NAT gateway?")
        .await
        .unwrap();
    app.append_chat_message(&chat.id, ChatRole::Assistant, "It lets private subnets reach out.")
        .await
        .unwrap();

    let history = app.chat_history(&chat.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "What is a NAT gateway?");
    assert_eq!(history[0].timestamp, Timestamp::from_millis(1_700_000_000_000));
}
