//! Exam content: questions and answers.
//!
//! Questions are immutable and owned by exam content; the quiz engine only
//! reads them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A user's or an exam's answer to a question.
///
/// `Multiple` is treated as an unordered set of option keys. On the wire it
/// is a JSON string or a JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multiple(Vec<String>),
}

impl Answer {
    pub fn single(key: impl Into<String>) -> Self {
        Answer::Single(key.into())
    }

    pub fn multiple<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Answer::Multiple(keys.into_iter().map(Into::into).collect())
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Answer::Multiple(_))
    }

    /// Whether `given` satisfies `self` taken as the correct answer.
    ///
    /// For a set answer the given answer must also be a set of the same
    /// size whose sorted elements match pairwise. Otherwise both must be the
    /// same single key.
    pub fn is_satisfied_by(&self, given: &Answer) -> bool {
        match (self, given) {
            (Answer::Multiple(correct), Answer::Multiple(given)) => {
                if correct.len() != given.len() {
                    return false;
                }
                let mut correct = correct.clone();
                let mut given = given.clone();
                correct.sort();
                given.sort();
                correct == given
            }
            (Answer::Multiple(_), Answer::Single(_)) => false,
            (Answer::Single(correct), Answer::Single(given)) => correct == given,
            (Answer::Single(_), Answer::Multiple(_)) => false,
        }
    }
}

/// Check a user answer against the correct answer.
pub fn is_correct(user_answer: &Answer, correct_answer: &Answer) -> bool {
    correct_answer.is_satisfied_by(user_answer)
}

/// Whether a question expects one key or several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerType {
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One exam question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub exam_id: String,
    #[serde(default)]
    pub set_number: u32,
    /// Answer domain / category tag.
    #[serde(default)]
    pub domain: u32,
    #[serde(rename = "question")]
    pub prompt: String,
    #[serde(default, rename = "questionHtml", skip_serializing_if = "Option::is_none")]
    pub prompt_html: Option<String>,
    pub options: BTreeMap<String, String>,
    pub answer: Answer,
    pub answer_type: AnswerType,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Vec<String>,
}
