// src/engine/mod.rs

//! The quiz attempt engine: question bank, randomizer, attempt store,
//! scoring and the lifecycle controller that composes them.

pub mod attempt_store;
pub mod deadline;
pub mod lifecycle;
pub mod question_bank;
pub mod randomizer;
pub mod scoring;
pub mod timer;

pub use attempt_store::{AttemptStore, InMemoryAttemptStore, SqlAttemptStore};
pub use deadline::DeadlineScheduler;
pub use lifecycle::AttemptLifecycleController;
pub use question_bank::{InMemoryQuestionBank, QuestionBank, SqlQuestionBank};
