//! Quiz submissions racing with pull merges on the same store.

use std::sync::Arc;

use proptest::prelude::*;
use studyforge::core::{Answer, QuizMode, WrongAnswerKey};
use studyforge::quiz::QuizEngine;
use studyforge::store::{LocalStore, MemoryStore, SqliteStore};
use studyforge::sync::{Credential, MemoryGateway, SyncConfig, SyncEngine};
use studyforge_testkit::fixtures::{scenario_questions, wrong_answer};

const EXAM: &str = "saa-c03";

/// Run `misses` quiz attempts that each miss q3 while a pull merges a remote
/// copy of the same record. Returns the surviving record count for the key
/// and its `wrong_count`.
async fn race<S: LocalStore + 'static>(
    store: Arc<S>,
    local_count: u32,
    remote_count: u32,
    misses: usize,
) -> (usize, u32) {
    if local_count > 0 {
        store
            .insert_wrong_answer(&wrong_answer(EXAM, "q3", local_count, false, 1_000))
            .await
            .unwrap();
    }

    let credential = Credential::new("alice-token");
    let gateway = Arc::new(MemoryGateway::new());
    gateway
        .seed(
            &credential,
            Vec::new(),
            vec![wrong_answer(EXAM, "q3", remote_count, false, 2_000)],
        )
        .await;
    let sync = SyncEngine::load(Arc::clone(&store), gateway, SyncConfig::default())
        .await
        .unwrap();
    sync.set_credential(Some(credential));

    let mut attempts = Vec::new();
    for _ in 0..misses {
        let store = Arc::clone(&store);
        attempts.push(tokio::spawn(async move {
            let mut quiz = QuizEngine::new(store);
            quiz.start_quiz(QuizMode::Practice, EXAM, scenario_questions(EXAM), None)
                .await
                .unwrap();
            quiz.answer_question("q3", Answer::single("B")).unwrap();
            let result = quiz.submit_quiz().await.unwrap();
            assert!(result.persistence_errors.is_empty());
        }));
    }

    let pulled = sync.sync_from_backend().await;
    assert!(pulled.is_completed());
    for attempt in attempts {
        attempt.await.unwrap();
    }

    let all = store.list_wrong_answers_by_exam(EXAM).await.unwrap();
    let survivors = all.iter().filter(|w| w.question_id == "q3").count();
    let record = store
        .find_wrong_answer(&WrongAnswerKey::new(EXAM, "q3"))
        .await
        .unwrap()
        .unwrap();
    (survivors, record.wrong_count)
}

fn assert_bounds(count: u32, local: u32, remote: u32, misses: u32) {
    let lower = (local + misses).max(remote);
    let upper = local.max(remote) + misses;
    assert!(
        (lower..=upper).contains(&count),
        "count {count} outside [{lower}, {upper}]"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_store_race() {
    let (survivors, count) = race(Arc::new(MemoryStore::new()), 3, 5, 8).await;
    assert_eq!(survivors, 1);
    assert_bounds(count, 3, 5, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_store_race() {
    let store = Arc::new(SqliteStore::open_memory().unwrap());
    let (survivors, count) = race(store, 3, 5, 8).await;
    assert_eq!(survivors, 1);
    assert_bounds(count, 3, 5, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_race_without_local_record() {
    let store = Arc::new(SqliteStore::open_memory().unwrap());
    let (survivors, count) = race(store, 0, 4, 6).await;
    assert_eq!(survivors, 1);
    assert_bounds(count, 0, 4, 6);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_race_keeps_one_record(
        local in 0u32..5,
        remote in 1u32..8,
        misses in 1usize..6,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let (survivors, count) =
            runtime.block_on(race(Arc::new(MemoryStore::new()), local, remote, misses));
        prop_assert_eq!(survivors, 1);
        assert_bounds(count, local, remote, misses as u32);
    }
}
