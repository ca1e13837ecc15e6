//! Proptest generators for property-based testing.

use proptest::prelude::*;

use studyforge_core::{Answer, QuizMode, Timestamp, WrongAnswer};

/// Generate an option key.
pub fn option_key() -> impl Strategy<Value = String> {
    "[A-F]".prop_map(String::from)
}

/// Generate a single or set answer.
pub fn answer() -> impl Strategy<Value = Answer> {
    prop_oneof![
        option_key().prop_map(Answer::Single),
        prop::collection::btree_set(option_key(), 1..5)
            .prop_map(|keys| Answer::Multiple(keys.into_iter().collect())),
    ]
}

/// Generate a quiz mode.
pub fn quiz_mode() -> impl Strategy<Value = QuizMode> {
    prop_oneof![Just(QuizMode::Practice), Just(QuizMode::Exam)]
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    (0i64..=4_000_000_000_000).prop_map(Timestamp::from_millis)
}

/// The merge-relevant fields of a wrong answer.
#[derive(Debug, Clone)]
pub struct WrongAnswerParams {
    pub question_id: String,
    pub wrong_count: u32,
    pub mastered: bool,
    pub last_wrong_at: Timestamp,
    pub user_answer: Answer,
}

impl Arbitrary for WrongAnswerParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            "q[0-9]{1,2}",
            1u32..=100u32,
            any::<bool>(),
            timestamp(),
            answer(),
        )
            .prop_map(
                |(question_id, wrong_count, mastered, last_wrong_at, user_answer)| {
                    WrongAnswerParams {
                        question_id,
                        wrong_count,
                        mastered,
                        last_wrong_at,
                        user_answer,
                    }
                },
            )
            .boxed()
    }
}

/// Build a wrong answer from parameters. The correct answer is fixed to `A`.
pub fn wrong_answer_from_params(exam_id: &str, params: &WrongAnswerParams) -> WrongAnswer {
    let mut wrong = WrongAnswer::first_miss(
        exam_id,
        params.question_id.clone(),
        params.user_answer.clone(),
        Answer::single("A"),
        params.last_wrong_at,
    );
    wrong.wrong_count = params.wrong_count;
    wrong.mastered = params.mastered;
    wrong
}
