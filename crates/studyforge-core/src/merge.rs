//! Reconciliation rules between a local record and its remote copy.
//!
//! Both rules are pure and idempotent: applying the returned update and
//! merging the same remote copy again yields no further update. Stores call
//! them inside their own per-record critical section.
//!
//! Rules:
//!
//! - **Sessions** complete in one direction only. A completed remote copy
//!   overwrites `answers`, `end_time`, `score` and `completed` of an
//!   incomplete local copy. A completed local copy is never touched, and no
//!   timestamps are compared. A remote copy that fails
//!   [`QuizSession::validate`] is rejected by the stores before this rule
//!   runs.
//! - **Wrong answers** merge field by field: `wrong_count` takes the maximum,
//!   `mastered` follows the remote copy, `last_wrong_at` takes the latest.

use std::cmp::max;

use crate::session::{QuizSession, SessionUpdate};
use crate::wrong_answer::{WrongAnswer, WrongAnswerUpdate};

/// What a merge did to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local record existed; the remote one was inserted verbatim.
    Inserted,
    /// The local record was updated in place.
    Updated,
    /// The local record already reflected the remote copy.
    Unchanged,
    /// The remote record broke a record invariant and was left out.
    Rejected,
}

/// Compute the update a remote session implies for the local one.
///
/// Returns `None` when the local copy must stay as it is.
pub fn merge_session(local: &QuizSession, remote: &QuizSession) -> Option<SessionUpdate> {
    if remote.completed && !local.completed {
        Some(SessionUpdate::completion_of(remote))
    } else {
        None
    }
}

/// Compute the update a remote wrong answer implies for the local one.
///
/// Only fields that actually change are set; `None` means the local copy
/// already dominates.
pub fn merge_wrong_answer(local: &WrongAnswer, remote: &WrongAnswer) -> Option<WrongAnswerUpdate> {
    let wrong_count = max(local.wrong_count, remote.wrong_count);
    let last_wrong_at = max(local.last_wrong_at, remote.last_wrong_at);

    let update = WrongAnswerUpdate {
        user_answer: None,
        wrong_count: (wrong_count != local.wrong_count).then_some(wrong_count),
        last_wrong_at: (last_wrong_at != local.last_wrong_at).then_some(last_wrong_at),
        mastered: (remote.mastered != local.mastered).then_some(remote.mastered),
    };

    if update.is_empty() {
        None
    } else {
        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::Answer;
    use crate::session::QuizMode;
    use crate::types::Timestamp;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn wrong(count: u32, mastered: bool, at: i64) -> WrongAnswer {
        let mut w = WrongAnswer::first_miss(
            "exam",
            "q1",
            Answer::single("B"),
            Answer::single("A"),
            Timestamp::from_millis(at),
        );
        w.wrong_count = count;
        w.mastered = mastered;
        w
    }

    fn session(completed: bool) -> QuizSession {
        let mut s = QuizSession::start(
            "exam",
            QuizMode::Practice,
            vec!["q1".into()],
            Timestamp::from_millis(0),
        );
        if completed {
            let mut answers = BTreeMap::new();
            answers.insert("q1".into(), Answer::single("A"));
            s.apply(&SessionUpdate::completion(answers, Timestamp::from_millis(9_000), 100));
        }
        s
    }

    #[test]
    fn test_wrong_answer_merge_monotonic() {
        let local = wrong(3, false, 2_000);
        let remote = wrong(2, true, 1_000);

        let update = merge_wrong_answer(&local, &remote).unwrap();
        let mut merged = local.clone();
        merged.apply(&update);

        assert_eq!(merged.wrong_count, 3);
        assert!(merged.mastered);
        assert_eq!(merged.last_wrong_at, Timestamp::from_millis(2_000));
        assert_eq!(merged.user_answer, local.user_answer);
        assert_eq!(merged.id, local.id);
    }

    #[test]
    fn test_remote_can_unset_mastered() {
        let local = wrong(1, true, 1_000);
        let remote = wrong(1, false, 1_000);
        let update = merge_wrong_answer(&local, &remote).unwrap();
        assert_eq!(update.mastered, Some(false));
        assert_eq!(update.wrong_count, None);
    }

    #[test]
    fn test_wrong_answer_merge_noop_when_dominated() {
        let local = wrong(4, true, 5_000);
        let remote = wrong(1, true, 1_000);
        assert!(merge_wrong_answer(&local, &remote).is_none());
    }

    #[test]
    fn test_session_completion_one_directional() {
        let incomplete = session(false);
        let mut remote = incomplete.clone();
        let completed = session(true);
        remote.answers = completed.answers.clone();
        remote.end_time = completed.end_time;
        remote.score = completed.score;
        remote.completed = true;

        let update = merge_session(&incomplete, &remote).unwrap();
        let mut merged = incomplete.clone();
        merged.apply(&update);
        assert!(merged.completed);
        assert_eq!(merged.score, Some(100));
        assert_eq!(merged.start_time, incomplete.start_time);

        // Completed local is never downgraded.
        assert!(merge_session(&merged, &incomplete).is_none());
    }

    #[test]
    fn test_session_both_completed_keeps_local() {
        let local = session(true);
        let mut remote = local.clone();
        remote.score = Some(10);
        assert!(merge_session(&local, &remote).is_none());
    }

    proptest! {
        #[test]
        fn test_merge_is_idempotent_and_monotonic(
            lc in 0u32..50, rc in 0u32..50,
            lm in any::<bool>(), rm in any::<bool>(),
            lt in 0i64..1_000_000, rt in 0i64..1_000_000,
        ) {
            let local = wrong(lc, lm, lt);
            let remote = wrong(rc, rm, rt);

            let mut merged = local.clone();
            if let Some(update) = merge_wrong_answer(&local, &remote) {
                merged.apply(&update);
            }

            prop_assert_eq!(merged.wrong_count, lc.max(rc));
            prop_assert!(merged.wrong_count >= local.wrong_count);
            prop_assert_eq!(merged.mastered, rm);
            prop_assert_eq!(merged.last_wrong_at.as_millis(), lt.max(rt));
            prop_assert!(merge_wrong_answer(&merged, &remote).is_none());
        }
    }
}
