//! Grading of a finished attempt.

use std::collections::BTreeMap;

use studyforge_core::{Answer, Question};

/// Outcome of grading a set of answers against the questions of an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Grading<'a> {
    pub total: usize,
    pub correct: usize,
    /// Answered and wrong, in question order. Unanswered questions are not
    /// listed.
    pub misses: Vec<Miss<'a>>,
}

/// An answered question whose answer was wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct Miss<'a> {
    pub question: &'a Question,
    pub given: &'a Answer,
}

impl Grading<'_> {
    pub fn score(&self) -> u8 {
        score_percent(self.correct, self.total)
    }
}

/// Grade `answers` against `questions`, in question order.
///
/// Unanswered questions count as incorrect.
pub fn grade<'a>(questions: &'a [Question], answers: &'a BTreeMap<String, Answer>) -> Grading<'a> {
    let mut correct = 0;
    let mut misses = Vec::new();

    for question in questions {
        match answers.get(&question.id) {
            Some(given) if question.answer.is_satisfied_by(given) => correct += 1,
            Some(given) => misses.push(Miss { question, given }),
            None => {}
        }
    }

    Grading {
        total: questions.len(),
        correct,
        misses,
    }
}

/// `round(100 * correct / total)` with halves rounded up. Zero when `total`
/// is zero.
pub fn score_percent(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = correct.min(total) as u64;
    let total = total as u64;
    ((correct * 200 + total) / (total * 2)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyforge_testkit::fixtures::scenario_questions;

    #[test]
    fn test_score_rounding() {
        assert_eq!(score_percent(0, 4), 0);
        assert_eq!(score_percent(2, 4), 50);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13); // 12.5
        assert_eq!(score_percent(3, 8), 38); // 37.5
        assert_eq!(score_percent(7, 7), 100);
        assert_eq!(score_percent(0, 0), 0);
    }

    #[test]
    fn test_grade_scenario() {
        let questions = scenario_questions("exam");
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), Answer::single("A"));
        answers.insert("q2".to_string(), Answer::multiple(["C", "B"]));
        answers.insert("q3".to_string(), Answer::single("X"));

        let grading = grade(&questions, &answers);
        assert_eq!(grading.total, 4);
        assert_eq!(grading.correct, 2);
        assert_eq!(grading.misses.len(), 1);
        assert_eq!(grading.misses[0].question.id, "q3");
        assert_eq!(grading.score(), 50);
    }

    #[test]
    fn test_unanswered_never_missed() {
        let questions = scenario_questions("exam");
        let answers = BTreeMap::new();
        let grading = grade(&questions, &answers);
        assert_eq!(grading.correct, 0);
        assert!(grading.misses.is_empty());
        assert_eq!(grading.score(), 0);
    }

    proptest::proptest! {
        #[test]
        fn prop_score_bounded(total in 1usize..500, correct in 0usize..500) {
            let correct = correct.min(total);
            let score = score_percent(correct, total);
            proptest::prop_assert!(score <= 100);
            let exact = 100.0 * correct as f64 / total as f64;
            proptest::prop_assert!((score as f64 - exact).abs() <= 0.5);
        }
    }
}
