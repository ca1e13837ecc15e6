//! The quiz state machine.
//!
//! One attempt at a time: `Idle → Running → Submitted`, and back to `Idle`
//! through [`QuizEngine::reset_quiz`]. Answers live in memory while the
//! attempt runs; the store sees the session when it starts and when it is
//! submitted, plus one miss upsert per wrong answer.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use studyforge_core::{
    Answer, Clock, MissRecord, Question, QuizMode, QuizSession, RecordId, SessionUpdate,
    SystemClock, Timestamp, WrongAnswer,
};
use studyforge_store::LocalStore;

use crate::error::{QuizError, Result};
use crate::scoring::grade;

/// Configuration for the quiz engine.
#[derive(Debug, Clone, Default)]
pub struct QuizConfig {
    /// Time limit for exam mode when the caller passes none.
    pub default_exam_minutes: Option<u32>,
}

/// Which phase the engine is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Idle,
    Running,
    Submitted,
}

/// Outcome of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub session_id: RecordId,
    pub total_questions: usize,
    pub correct_count: usize,
    /// Always `wrong_answers.len()`; unanswered questions are not counted.
    pub wrong_count: usize,
    /// 0..=100, rounded half up.
    pub score: u8,
    pub wrong_answers: Vec<WrongAnswer>,
    /// Whole seconds between start and submission.
    pub time_spent: u64,
    /// Store writes that failed during this attempt.
    pub persistence_errors: Vec<String>,
}

/// In-memory state of one attempt.
#[derive(Debug)]
struct Attempt {
    /// The session as persisted at start; answers accumulate here.
    session: QuizSession,
    questions: Vec<Question>,
    current_index: usize,
    marked: BTreeSet<String>,
    time_remaining: u32,
    /// Exam mode with a non-zero time limit.
    timed: bool,
    persistence_errors: Vec<String>,
}

impl Attempt {
    fn contains(&self, question_id: &str) -> bool {
        self.questions.iter().any(|q| q.id == question_id)
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Running(Attempt),
    Submitted(Attempt),
}

/// Runs quiz attempts against a local store.
pub struct QuizEngine<S: LocalStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: QuizConfig,
    state: State,
}

impl<S: LocalStore> QuizEngine<S> {
    /// Create an engine using the system clock.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create an engine reading time from `clock`.
    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            config: QuizConfig::default(),
            state: State::Idle,
        }
    }

    pub fn with_config(mut self, config: QuizConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a new attempt over `questions`, in the order given.
    ///
    /// The incomplete session is written to the store on a best-effort basis:
    /// a failed write is logged and reported with the attempt's result.
    pub async fn start_quiz(
        &mut self,
        mode: QuizMode,
        exam_id: impl Into<String>,
        questions: Vec<Question>,
        time_limit_minutes: Option<u32>,
    ) -> Result<()> {
        if matches!(self.state, State::Running(_)) {
            return Err(QuizError::AlreadyRunning);
        }
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }

        let question_ids = questions.iter().map(|q| q.id.clone()).collect();
        let session = QuizSession::start(exam_id, mode, question_ids, self.clock.now());

        let mut persistence_errors = Vec::new();
        if let Err(e) = self.store.insert_session(&session).await {
            tracing::warn!(session = %session.id, error = %e, "failed to persist new quiz session");
            persistence_errors.push(format!("insert session {}: {}", session.id, e));
        }

        let minutes = match mode {
            QuizMode::Exam => time_limit_minutes
                .or(self.config.default_exam_minutes)
                .unwrap_or(0),
            QuizMode::Practice => 0,
        };

        tracing::debug!(
            session = %session.id,
            exam = %session.exam_id,
            %mode,
            questions = questions.len(),
            minutes,
            "quiz started"
        );

        self.state = State::Running(Attempt {
            session,
            questions,
            current_index: 0,
            marked: BTreeSet::new(),
            time_remaining: minutes.saturating_mul(60),
            timed: minutes > 0,
            persistence_errors,
        });
        Ok(())
    }

    /// Record an answer. The last answer for a question wins.
    pub fn answer_question(&mut self, question_id: &str, answer: Answer) -> Result<()> {
        let attempt = self.running_mut()?;
        if !attempt.contains(question_id) {
            return Err(QuizError::UnknownQuestion(question_id.to_string()));
        }
        attempt
            .session
            .answers
            .insert(question_id.to_string(), answer);
        Ok(())
    }

    /// Flip the review mark of a question. Returns whether it is now marked.
    pub fn toggle_mark(&mut self, question_id: &str) -> Result<bool> {
        let attempt = self.running_mut()?;
        if !attempt.contains(question_id) {
            return Err(QuizError::UnknownQuestion(question_id.to_string()));
        }
        if attempt.marked.remove(question_id) {
            Ok(false)
        } else {
            attempt.marked.insert(question_id.to_string());
            Ok(true)
        }
    }

    /// Jump to a question. Out-of-range indexes are ignored.
    pub fn go_to_question(&mut self, index: usize) -> Result<()> {
        let attempt = self.running_mut()?;
        if index < attempt.questions.len() {
            attempt.current_index = index;
        }
        Ok(())
    }

    pub fn next_question(&mut self) -> Result<()> {
        let attempt = self.running_mut()?;
        if attempt.current_index + 1 < attempt.questions.len() {
            attempt.current_index += 1;
        }
        Ok(())
    }

    pub fn prev_question(&mut self) -> Result<()> {
        let attempt = self.running_mut()?;
        attempt.current_index = attempt.current_index.saturating_sub(1);
        Ok(())
    }

    /// Count the timer down by one second, never below zero.
    ///
    /// Returns `true` once a timed exam has run out of time; the caller is
    /// expected to submit.
    pub fn tick(&mut self) -> Result<bool> {
        let attempt = self.running_mut()?;
        attempt.time_remaining = attempt.time_remaining.saturating_sub(1);
        Ok(attempt.timed && attempt.time_remaining == 0)
    }

    /// Grade the running attempt and finalize it.
    ///
    /// Store failures are logged and listed in
    /// [`QuizResult::persistence_errors`]; the result is returned regardless.
    pub async fn submit_quiz(&mut self) -> Result<QuizResult> {
        let State::Running(attempt) = &self.state else {
            return Err(QuizError::NotRunning);
        };

        let now = self.clock.now();
        let session = &attempt.session;
        let grading = grade(&attempt.questions, &session.answers);
        let score = grading.score();
        let mut persistence_errors = attempt.persistence_errors.clone();

        let mut wrong_answers = Vec::with_capacity(grading.misses.len());
        for miss in &grading.misses {
            let record = WrongAnswer::first_miss(
                session.exam_id.clone(),
                miss.question.id.clone(),
                miss.given.clone(),
                miss.question.answer.clone(),
                now,
            );

            match self.store.record_wrong_answer(&record).await {
                Ok(MissRecord::Inserted) => {
                    tracing::debug!(question = %record.question_id, "recorded first miss");
                }
                Ok(MissRecord::Incremented { wrong_count }) => {
                    tracing::debug!(question = %record.question_id, wrong_count, "recorded repeat miss");
                }
                Err(e) => {
                    tracing::warn!(question = %record.question_id, error = %e, "failed to record wrong answer");
                    persistence_errors.push(format!("record miss {}: {}", record.question_id, e));
                }
            }
            wrong_answers.push(record);
        }

        let completion = SessionUpdate::completion(session.answers.clone(), now, score);
        if let Err(e) = persist_completion(self.store.as_ref(), session, &completion).await {
            tracing::warn!(session = %session.id, error = %e, "failed to persist completed session");
            persistence_errors.push(format!("complete session {}: {}", session.id, e));
        }

        let result = QuizResult {
            session_id: session.id.clone(),
            total_questions: grading.total,
            correct_count: grading.correct,
            wrong_count: wrong_answers.len(),
            score,
            wrong_answers,
            time_spent: now.seconds_since(session.start_time),
            persistence_errors,
        };

        tracing::info!(
            session = %result.session_id,
            score = result.score,
            correct = result.correct_count,
            wrong = result.wrong_count,
            "quiz submitted"
        );

        if let State::Running(mut attempt) = std::mem::replace(&mut self.state, State::Idle) {
            attempt.session.apply(&completion);
            self.state = State::Submitted(attempt);
        }
        Ok(result)
    }

    /// Drop the in-memory attempt. Persisted records are untouched.
    pub fn reset_quiz(&mut self) {
        self.state = State::Idle;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn phase(&self) -> QuizPhase {
        match self.state {
            State::Idle => QuizPhase::Idle,
            State::Running(_) => QuizPhase::Running,
            State::Submitted(_) => QuizPhase::Submitted,
        }
    }

    pub fn session_id(&self) -> Option<&RecordId> {
        self.attempt().map(|a| &a.session.id)
    }

    pub fn mode(&self) -> Option<QuizMode> {
        self.attempt().map(|a| a.session.mode)
    }

    pub fn exam_id(&self) -> Option<&str> {
        self.attempt().map(|a| a.session.exam_id.as_str())
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.attempt().map(|a| a.session.start_time)
    }

    /// Questions of the current or last attempt, in presentation order.
    pub fn questions(&self) -> &[Question] {
        self.attempt().map(|a| a.questions.as_slice()).unwrap_or(&[])
    }

    pub fn current_index(&self) -> usize {
        self.attempt().map(|a| a.current_index).unwrap_or(0)
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.attempt().and_then(|a| a.questions.get(a.current_index))
    }

    pub fn answers(&self) -> Option<&BTreeMap<String, Answer>> {
        self.attempt().map(|a| &a.session.answers)
    }

    pub fn is_marked(&self, question_id: &str) -> bool {
        self.attempt()
            .map(|a| a.marked.contains(question_id))
            .unwrap_or(false)
    }

    pub fn marked_questions(&self) -> Vec<&str> {
        self.attempt()
            .map(|a| a.marked.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Seconds left on the exam timer; zero when untimed.
    pub fn time_remaining(&self) -> u32 {
        self.attempt().map(|a| a.time_remaining).unwrap_or(0)
    }

    fn attempt(&self) -> Option<&Attempt> {
        match &self.state {
            State::Running(a) | State::Submitted(a) => Some(a),
            State::Idle => None,
        }
    }

    fn running_mut(&mut self) -> Result<&mut Attempt> {
        match &mut self.state {
            State::Running(a) => Ok(a),
            _ => Err(QuizError::NotRunning),
        }
    }
}

/// Mark the session completed, inserting it whole if the initial write never
/// landed.
async fn persist_completion<S: LocalStore + ?Sized>(
    store: &S,
    session: &QuizSession,
    completion: &SessionUpdate,
) -> studyforge_store::Result<()> {
    match store.update_session(&session.id, completion).await {
        Err(e) if e.is_not_found() => {
            let mut completed = session.clone();
            completed.apply(completion);
            store.insert_session(&completed).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyforge_store::{MemoryStore, StoreExt};
    use proptest::prelude::*;
    use studyforge_testkit::fixtures::scenario_questions;
    use studyforge_testkit::generators::quiz_mode;
    use studyforge_testkit::{FaultyStore, ManualClock, TestFixture};

    fn engine_at(store: Arc<MemoryStore>, millis: i64) -> (QuizEngine<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(millis));
        (QuizEngine::with_clock(store, clock.clone()), clock)
    }

    async fn answer_scenario<S: LocalStore>(engine: &mut QuizEngine<S>) {
        engine.answer_question("q1", Answer::single("A")).unwrap();
        engine
            .answer_question("q2", Answer::multiple(["C", "B"]))
            .unwrap();
        engine.answer_question("q3", Answer::single("X")).unwrap();
    }

    #[tokio::test]
    async fn test_scenario_scores_fifty() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, clock) = engine_at(store.clone(), 1_000_000);

        engine
            .start_quiz(QuizMode::Exam, "exam", scenario_questions("exam"), Some(90))
            .await
            .unwrap();
        assert_eq!(engine.phase(), QuizPhase::Running);
        assert_eq!(engine.time_remaining(), 90 * 60);

        answer_scenario(&mut engine).await;
        clock.advance_secs(125);

        let result = engine.submit_quiz().await.unwrap();
        assert_eq!(result.total_questions, 4);
        assert_eq!(result.correct_count, 2);
        assert_eq!(result.wrong_count, 1);
        assert_eq!(result.score, 50);
        assert_eq!(result.time_spent, 125);
        assert!(result.persistence_errors.is_empty());
        assert_eq!(result.wrong_answers[0].question_id, "q3");
        assert_eq!(result.wrong_answers[0].correct_answer, Answer::single("D"));
        assert_eq!(engine.phase(), QuizPhase::Submitted);

        let session = store.get_session(&result.session_id).await.unwrap().unwrap();
        assert!(session.completed);
        assert_eq!(session.score, Some(50));
        assert_eq!(session.answers.len(), 3);
        assert!(session.validate().is_ok());

        let wrongs = store.list_wrong_answers().await.unwrap();
        assert_eq!(wrongs.len(), 1);
        assert_eq!(wrongs[0].question_id, "q3");
    }

    #[tokio::test]
    async fn test_repeat_miss_upserts() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, clock) = engine_at(store.clone(), 1_000);

        for _ in 0..2 {
            engine
                .start_quiz(QuizMode::Practice, "exam", scenario_questions("exam"), None)
                .await
                .unwrap();
            engine.answer_question("q3", Answer::single("X")).unwrap();
            engine.submit_quiz().await.unwrap();
            clock.advance_secs(60);
        }

        let wrongs = store.list_wrong_answers().await.unwrap();
        assert_eq!(wrongs.len(), 1);
        assert_eq!(wrongs[0].wrong_count, 2);
        assert_eq!(wrongs[0].last_wrong_at, Timestamp::from_millis(61_000));
        assert_eq!(store.completed_sessions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_start_rejections() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = engine_at(store, 0);

        assert_eq!(
            engine
                .start_quiz(QuizMode::Exam, "exam", Vec::new(), None)
                .await
                .unwrap_err(),
            QuizError::NoQuestions
        );

        engine
            .start_quiz(QuizMode::Exam, "exam", scenario_questions("exam"), None)
            .await
            .unwrap();
        assert_eq!(
            engine
                .start_quiz(QuizMode::Exam, "exam", scenario_questions("exam"), None)
                .await
                .unwrap_err(),
            QuizError::AlreadyRunning
        );
    }

    #[tokio::test]
    async fn test_misuse_without_attempt() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = engine_at(store, 0);

        assert_eq!(
            engine.answer_question("q1", Answer::single("A")),
            Err(QuizError::NotRunning)
        );
        assert_eq!(engine.next_question(), Err(QuizError::NotRunning));
        assert_eq!(engine.tick(), Err(QuizError::NotRunning));
        assert_eq!(engine.submit_quiz().await.unwrap_err(), QuizError::NotRunning);

        engine
            .start_quiz(QuizMode::Practice, "exam", scenario_questions("exam"), None)
            .await
            .unwrap();
        assert_eq!(
            engine.answer_question("nope", Answer::single("A")),
            Err(QuizError::UnknownQuestion("nope".into()))
        );
        engine.submit_quiz().await.unwrap();
        assert_eq!(engine.submit_quiz().await.unwrap_err(), QuizError::NotRunning);
    }

    #[tokio::test]
    async fn test_navigation_clamps() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = engine_at(store, 0);
        engine
            .start_quiz(QuizMode::Practice, "exam", scenario_questions("exam"), None)
            .await
            .unwrap();

        engine.prev_question().unwrap();
        assert_eq!(engine.current_index(), 0);

        engine.go_to_question(3).unwrap();
        engine.next_question().unwrap();
        assert_eq!(engine.current_index(), 3);
        assert_eq!(engine.current_question().map(|q| q.id.as_str()), Some("q4"));

        engine.go_to_question(10).unwrap();
        assert_eq!(engine.current_index(), 3);

        assert!(engine.toggle_mark("q2").unwrap());
        assert!(engine.is_marked("q2"));
        assert!(!engine.toggle_mark("q2").unwrap());
        assert!(!engine.is_marked("q2"));
    }

    proptest! {
        #[test]
        fn test_timer_floors_at_zero(
            mode in quiz_mode(),
            minutes in 1u32..4,
            ticks in 0u32..300,
        ) {
            let fixture = TestFixture::new();
            let mut engine = QuizEngine::with_clock(fixture.store.clone(), fixture.clock.clone());
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime
                .block_on(engine.start_quiz(mode, "exam", scenario_questions("exam"), Some(minutes)))
                .unwrap();

            let limit = if mode == QuizMode::Exam { minutes * 60 } else { 0 };
            prop_assert_eq!(engine.time_remaining(), limit);

            for n in 1..=ticks {
                let expired = engine.tick().unwrap();
                let remaining = limit.saturating_sub(n);
                prop_assert_eq!(engine.time_remaining(), remaining);
                prop_assert_eq!(expired, mode == QuizMode::Exam && remaining == 0);
            }
        }
    }

    #[tokio::test]
    async fn test_practice_is_untimed() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = engine_at(store, 0);
        engine
            .start_quiz(QuizMode::Practice, "exam", scenario_questions("exam"), Some(30))
            .await
            .unwrap();

        assert_eq!(engine.time_remaining(), 0);
        assert!(!engine.tick().unwrap());
    }

    #[tokio::test]
    async fn test_default_exam_minutes() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine_at(store, 0);
        let mut engine = engine.with_config(QuizConfig {
            default_exam_minutes: Some(2),
        });
        engine
            .start_quiz(QuizMode::Exam, "exam", scenario_questions("exam"), None)
            .await
            .unwrap();
        assert_eq!(engine.time_remaining(), 120);
    }

    #[tokio::test]
    async fn test_reset_keeps_records() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = engine_at(store.clone(), 0);
        engine
            .start_quiz(QuizMode::Exam, "exam", scenario_questions("exam"), None)
            .await
            .unwrap();

        engine.reset_quiz();
        assert_eq!(engine.phase(), QuizPhase::Idle);
        assert!(engine.questions().is_empty());

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(!sessions[0].completed);
    }

    #[tokio::test]
    async fn test_failing_store_still_returns_result() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail_writes(true);
        let clock = Arc::new(ManualClock::at_millis(0));
        let mut engine = QuizEngine::with_clock(store.clone(), clock);

        engine
            .start_quiz(QuizMode::Exam, "exam", scenario_questions("exam"), None)
            .await
            .unwrap();
        answer_scenario(&mut engine).await;

        let result = engine.submit_quiz().await.unwrap();
        assert_eq!(result.score, 50);
        assert_eq!(result.wrong_count, 1);
        // start insert, miss upsert, completion insert
        assert_eq!(result.persistence_errors.len(), 3);
        assert!(store.inner().list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_inserts_when_start_write_failed() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        let clock = Arc::new(ManualClock::at_millis(0));
        let mut engine = QuizEngine::with_clock(store.clone(), clock);

        store.fail_writes(true);
        engine
            .start_quiz(QuizMode::Exam, "exam", scenario_questions("exam"), None)
            .await
            .unwrap();
        store.fail_writes(false);
        answer_scenario(&mut engine).await;

        let result = engine.submit_quiz().await.unwrap();
        assert_eq!(result.persistence_errors.len(), 1);

        let session = store.get_session(&result.session_id).await.unwrap().unwrap();
        assert!(session.completed);
        assert_eq!(session.score, Some(50));
    }
}
