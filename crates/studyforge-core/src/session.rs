//! Quiz sessions: one persisted attempt at an exam.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::question::Answer;
use crate::types::{GlobalId, RecordId, Timestamp};

/// Practice runs untimed; exam runs against a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    Practice,
    Exam,
}

impl QuizMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizMode::Practice => "practice",
            QuizMode::Exam => "exam",
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "practice" => Ok(QuizMode::Practice),
            "exam" => Ok(QuizMode::Exam),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

/// One attempt at an exam.
///
/// Invariant: `completed` iff both `end_time` and `score` are set. A session
/// is mutable only while it is not completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    pub id: RecordId,
    pub global_id: GlobalId,
    pub exam_id: String,
    pub mode: QuizMode,
    /// Question ids in presentation order.
    #[serde(rename = "questions")]
    pub question_ids: Vec<String>,
    pub answers: BTreeMap<String, Answer>,
    pub start_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    pub completed: bool,
}

impl QuizSession {
    /// A fresh, incomplete session with generated ids.
    pub fn start(
        exam_id: impl Into<String>,
        mode: QuizMode,
        question_ids: Vec<String>,
        start_time: Timestamp,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            global_id: GlobalId::generate(),
            exam_id: exam_id.into(),
            mode,
            question_ids,
            answers: BTreeMap::new(),
            start_time,
            end_time: None,
            score: None,
            completed: false,
        }
    }

    /// Check the completion invariant.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(score) = self.score {
            if score > 100 {
                return Err(CoreError::ScoreOutOfRange(score));
            }
        }
        let finished = self.end_time.is_some() && self.score.is_some();
        match (self.completed, finished) {
            (true, false) => Err(CoreError::IncompleteCompletion(self.id.to_string())),
            (false, _) if self.end_time.is_some() || self.score.is_some() => {
                Err(CoreError::PrematureCompletion(self.id.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Apply a field-level update.
    pub fn apply(&mut self, update: &SessionUpdate) {
        if let Some(answers) = &update.answers {
            self.answers = answers.clone();
        }
        if let Some(end_time) = update.end_time {
            self.end_time = Some(end_time);
        }
        if let Some(score) = update.score {
            self.score = Some(score);
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
    }
}

/// Field-level update of a session. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub answers: Option<BTreeMap<String, Answer>>,
    pub end_time: Option<Timestamp>,
    pub score: Option<u8>,
    pub completed: Option<bool>,
}

impl SessionUpdate {
    /// The update that finalizes a session.
    pub fn completion(answers: BTreeMap<String, Answer>, end_time: Timestamp, score: u8) -> Self {
        Self {
            answers: Some(answers),
            end_time: Some(end_time),
            score: Some(score),
            completed: Some(true),
        }
    }

    /// Copy the completion fields of `other`, nothing else.
    pub fn completion_of(other: &QuizSession) -> Self {
        Self {
            answers: Some(other.answers.clone()),
            end_time: other.end_time,
            score: other.score,
            completed: Some(other.completed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_none()
            && self.end_time.is_none()
            && self.score.is_none()
            && self.completed.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> QuizSession {
        QuizSession::start(
            "exam-1",
            QuizMode::Exam,
            vec!["q1".into(), "q2".into()],
            Timestamp::from_millis(1_000),
        )
    }

    #[test]
    fn test_new_session_is_consistent() {
        let s = session();
        assert!(!s.completed);
        assert!(s.validate().is_ok());
        assert_ne!(s.id.as_str(), s.global_id.as_str());
    }

    #[test]
    fn test_completion_update() {
        let mut s = session();
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), Answer::single("A"));
        s.apply(&SessionUpdate::completion(answers, Timestamp::from_millis(5_000), 50));
        assert!(s.completed);
        assert_eq!(s.score, Some(50));
        assert_eq!(s.answers.len(), 1);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_half_completed() {
        let mut s = session();
        s.completed = true;
        assert!(matches!(s.validate(), Err(CoreError::IncompleteCompletion(_))));

        let mut s = session();
        s.score = Some(10);
        assert!(matches!(s.validate(), Err(CoreError::PrematureCompletion(_))));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("exam".parse::<QuizMode>().unwrap(), QuizMode::Exam);
        assert!("timed".parse::<QuizMode>().is_err());
    }
}
