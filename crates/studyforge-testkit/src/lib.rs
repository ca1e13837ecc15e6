//! # StudyForge Testkit
//!
//! Testing utilities for the StudyForge progress kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: questions, sessions and wrong answers for test scenarios
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fault injection**: [`FaultyStore`] wraps any store and fails on demand
//! - **Time**: [`ManualClock`] only moves when a test moves it
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use studyforge_testkit::generators::{wrong_answer_from_params, WrongAnswerParams};
//!
//! proptest! {
//!     #[test]
//!     fn merge_never_lowers_count(local: WrongAnswerParams, remote: WrongAnswerParams) {
//!         let local = wrong_answer_from_params("exam", &local);
//!         let remote = wrong_answer_from_params("exam", &remote);
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use studyforge_testkit::fixtures::{scenario_questions, TestFixture};
//!
//! let fixture = TestFixture::new();
//! let questions = scenario_questions("saa-c03");
//! assert_eq!(questions.len(), 4);
//! ```

pub mod clock;
pub mod faulty;
pub mod fixtures;
pub mod generators;

pub use clock::ManualClock;
pub use faulty::FaultyStore;
pub use fixtures::TestFixture;
pub use generators::{wrong_answer_from_params, WrongAnswerParams};
