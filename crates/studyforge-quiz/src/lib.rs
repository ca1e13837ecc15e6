//! # StudyForge Quiz
//!
//! The quiz session state machine: start an attempt, collect answers, grade
//! it on submission and record every wrong answer in the local store.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use studyforge_core::{Answer, QuizMode};
//! use studyforge_quiz::QuizEngine;
//! use studyforge_store::MemoryStore;
//!
//! async fn example(questions: Vec<studyforge_core::Question>) {
//!     let mut engine = QuizEngine::new(Arc::new(MemoryStore::new()));
//!
//!     engine.start_quiz(QuizMode::Exam, "saa-c03", questions, Some(130)).await.unwrap();
//!     engine.answer_question("q1", Answer::single("A")).unwrap();
//!
//!     let result = engine.submit_quiz().await.unwrap();
//!     println!("score {}", result.score);
//! }
//! ```

pub mod engine;
pub mod error;
pub mod scoring;

pub use engine::{QuizConfig, QuizEngine, QuizPhase, QuizResult};
pub use error::{QuizError, Result};
pub use scoring::{grade, score_percent, Grading, Miss};
