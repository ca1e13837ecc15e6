//! Wrong-answer records: durable evidence that a question was missed.

use serde::{Deserialize, Serialize};

use crate::question::Answer;
use crate::types::{GlobalId, RecordId, Timestamp};

/// Natural identity of a wrong answer: at most one record per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WrongAnswerKey {
    pub exam_id: String,
    pub question_id: String,
}

impl WrongAnswerKey {
    pub fn new(exam_id: impl Into<String>, question_id: impl Into<String>) -> Self {
        Self {
            exam_id: exam_id.into(),
            question_id: question_id.into(),
        }
    }
}

/// A question the user answered incorrectly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswer {
    pub id: RecordId,
    pub global_id: GlobalId,
    pub exam_id: String,
    pub question_id: String,
    pub user_answer: Answer,
    /// Denormalized so the review list does not need the question.
    pub correct_answer: Answer,
    pub wrong_count: u32,
    pub last_wrong_at: Timestamp,
    pub mastered: bool,
}

impl WrongAnswer {
    /// A first miss.
    pub fn first_miss(
        exam_id: impl Into<String>,
        question_id: impl Into<String>,
        user_answer: Answer,
        correct_answer: Answer,
        at: Timestamp,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            global_id: GlobalId::generate(),
            exam_id: exam_id.into(),
            question_id: question_id.into(),
            user_answer,
            correct_answer,
            wrong_count: 1,
            last_wrong_at: at,
            mastered: false,
        }
    }

    pub fn key(&self) -> WrongAnswerKey {
        WrongAnswerKey::new(self.exam_id.clone(), self.question_id.clone())
    }

    /// Apply a field-level update.
    pub fn apply(&mut self, update: &WrongAnswerUpdate) {
        if let Some(answer) = &update.user_answer {
            self.user_answer = answer.clone();
        }
        if let Some(count) = update.wrong_count {
            self.wrong_count = count;
        }
        if let Some(at) = update.last_wrong_at {
            self.last_wrong_at = at;
        }
        if let Some(mastered) = update.mastered {
            self.mastered = mastered;
        }
    }

    /// The update recording one more miss of this question.
    pub fn repeat_miss(&self, user_answer: Answer, at: Timestamp) -> WrongAnswerUpdate {
        WrongAnswerUpdate {
            user_answer: Some(user_answer),
            wrong_count: Some(self.wrong_count.saturating_add(1)),
            last_wrong_at: Some(at),
            mastered: None,
        }
    }
}

/// Field-level update of a wrong answer. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrongAnswerUpdate {
    pub user_answer: Option<Answer>,
    pub wrong_count: Option<u32>,
    pub last_wrong_at: Option<Timestamp>,
    pub mastered: Option<bool>,
}

impl WrongAnswerUpdate {
    pub fn mastered(mastered: bool) -> Self {
        Self {
            mastered: Some(mastered),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user_answer.is_none()
            && self.wrong_count.is_none()
            && self.last_wrong_at.is_none()
            && self.mastered.is_none()
    }
}

/// Result of recording a miss against the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissRecord {
    /// No record existed for the key; the new one was inserted.
    Inserted,
    /// An existing record was bumped to this count.
    Incremented { wrong_count: u32 },
}
