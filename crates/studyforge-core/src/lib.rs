//! # StudyForge Core
//!
//! Pure records for the StudyForge progress kernel: questions, quiz
//! sessions, wrong answers, chat history, and the merge rules used to
//! reconcile local records with their remote copies.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Question`] / [`Answer`] - exam content and answer correctness
//! - [`QuizSession`] - one attempt at an exam
//! - [`WrongAnswer`] - a missed question, unique per [`WrongAnswerKey`]
//! - [`Timestamp`], [`RecordId`], [`GlobalId`] - strong scalar types
//!
//! ## Merging
//!
//! See the [`merge`] module for the reconciliation rules.

pub mod chat;
pub mod clock;
pub mod error;
pub mod merge;
pub mod question;
pub mod session;
pub mod types;
pub mod wrong_answer;

pub use chat::{ChatMessage, ChatRole, ChatSession};
pub use clock::{Clock, SystemClock};
pub use error::CoreError;
pub use merge::{merge_session, merge_wrong_answer, MergeOutcome};
pub use question::{is_correct, Answer, AnswerType, Difficulty, Question};
pub use session::{QuizMode, QuizSession, SessionUpdate};
pub use types::{GlobalId, RecordId, Timestamp};
pub use wrong_answer::{MissRecord, WrongAnswer, WrongAnswerKey, WrongAnswerUpdate};
