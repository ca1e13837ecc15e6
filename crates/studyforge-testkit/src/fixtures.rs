//! Test fixtures and helpers.
//!
//! Common setup code for unit and integration tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use studyforge_core::{
    Answer, AnswerType, Question, QuizMode, QuizSession, SessionUpdate, Timestamp, WrongAnswer,
};
use studyforge_store::MemoryStore;

use crate::clock::ManualClock;

/// Two questions in the exam content format.
pub const SAMPLE_QUESTIONS_JSON: &str = r#"[
  {
    "id": "saa-1-001",
    "examId": "saa-c03",
    "setNumber": 1,
    "domain": 2,
    "question": "Which service stores objects?",
    "options": { "A": "S3", "B": "EBS", "C": "EFS", "D": "RDS" },
    "answer": "A",
    "answerType": "single",
    "explanation": "S3 is object storage.",
    "difficulty": "easy",
    "tags": ["storage"]
  },
  {
    "id": "saa-1-002",
    "examId": "saa-c03",
    "setNumber": 1,
    "domain": 3,
    "question": "Pick two block or file stores.",
    "questionHtml": "<p>Pick <b>two</b> block or file stores.</p>",
    "options": { "A": "S3", "B": "EBS", "C": "EFS", "D": "SQS" },
    "answer": ["B", "C"],
    "answerType": "multiple",
    "explanation": "EBS is block storage, EFS is file storage."
  }
]"#;

/// Parse questions from exam content JSON.
pub fn questions_from_json(json: &str) -> serde_json::Result<Vec<Question>> {
    serde_json::from_str(json)
}

/// A minimal question with options A-D.
pub fn question(exam_id: &str, id: &str, answer: Answer) -> Question {
    let options = ["A", "B", "C", "D"]
        .into_iter()
        .map(|k| (k.to_string(), format!("option {k}")))
        .collect::<BTreeMap<_, _>>();

    Question {
        id: id.to_string(),
        exam_id: exam_id.to_string(),
        set_number: 1,
        domain: 1,
        prompt: format!("question {id}"),
        prompt_html: None,
        options,
        answer_type: if answer.is_multiple() {
            AnswerType::Multiple
        } else {
            AnswerType::Single
        },
        answer,
        explanation: String::new(),
        explanation_html: None,
        difficulty: None,
        tags: Vec::new(),
    }
}

/// Four questions `q1..q4` whose correct answers are `A`, `{B, C}`, `D`, `A`.
pub fn scenario_questions(exam_id: &str) -> Vec<Question> {
    vec![
        question(exam_id, "q1", Answer::single("A")),
        question(exam_id, "q2", Answer::multiple(["B", "C"])),
        question(exam_id, "q3", Answer::single("D")),
        question(exam_id, "q4", Answer::single("A")),
    ]
}

/// An incomplete exam session over the scenario questions.
pub fn incomplete_session(exam_id: &str, start_millis: i64) -> QuizSession {
    QuizSession::start(
        exam_id,
        QuizMode::Exam,
        vec!["q1".into(), "q2".into(), "q3".into(), "q4".into()],
        Timestamp::from_millis(start_millis),
    )
}

/// A completed session ending one minute after it started.
pub fn completed_session(exam_id: &str, start_millis: i64, score: u8) -> QuizSession {
    let mut session = incomplete_session(exam_id, start_millis);
    let mut answers = BTreeMap::new();
    answers.insert("q1".to_string(), Answer::single("A"));
    session.apply(&SessionUpdate::completion(
        answers,
        Timestamp::from_millis(start_millis + 60_000),
        score,
    ));
    session
}

/// A wrong answer with the given merge-relevant fields.
pub fn wrong_answer(
    exam_id: &str,
    question_id: &str,
    wrong_count: u32,
    mastered: bool,
    last_wrong_millis: i64,
) -> WrongAnswer {
    let mut wrong = WrongAnswer::first_miss(
        exam_id,
        question_id,
        Answer::single("X"),
        Answer::single("A"),
        Timestamp::from_millis(last_wrong_millis),
    );
    wrong.wrong_count = wrong_count;
    wrong.mastered = mastered;
    wrong
}

/// A memory store and a manual clock, shared.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::at_millis(1_700_000_000_000)
    }

    pub fn at_millis(millis: i64) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::at_millis(millis)),
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
