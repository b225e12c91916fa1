// src/engine/lifecycle.rs

//! Attempt lifecycle: start, answer collection, submission or expiry, result.
//!
//! The controller composes a [`QuestionBank`], the [`randomizer`] and an
//! [`AttemptStore`]. It assumes callers are already authorized; ownership
//! checks belong to the HTTP layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    engine::{attempt_store::AttemptStore, question_bank::QuestionBank, randomizer, scoring},
    error::AppError,
    models::{
        attempt::{Attempt, QuizResult, StartedAttempt, SubmittedAnswers, UserQuizHistory},
        quiz::PublicQuiz,
    },
};

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
pub const MAX_HISTORY_LIMIT: u32 = 100;

pub struct AttemptLifecycleController {
    bank: Arc<dyn QuestionBank>,
    store: Arc<dyn AttemptStore>,
}

impl AttemptLifecycleController {
    pub fn new(bank: Arc<dyn QuestionBank>, store: Arc<dyn AttemptStore>) -> Self {
        Self { bank, store }
    }

    pub fn question_bank(&self) -> &Arc<dyn QuestionBank> {
        &self.bank
    }

    /// Starts a new attempt and returns the learner view of the quiz,
    /// shuffled when the quiz asks for it and without answer keys.
    pub async fn start_attempt(
        &self,
        quiz_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StartedAttempt, AppError> {
        let quiz = self.bank.load(quiz_id).await?;
        let quiz = {
            let mut rng = rand::thread_rng();
            randomizer::shuffle(quiz, &mut rng)
        };

        let attempt = self
            .store
            .create(quiz_id, user_id, now, quiz.time_limit_seconds)
            .await?;

        tracing::info!(
            attempt_id = %attempt.id,
            quiz_id,
            user_id,
            expires_at = ?attempt.expires_at,
            "Quiz attempt started"
        );

        Ok(StartedAttempt {
            attempt_id: attempt.id,
            quiz: PublicQuiz::from(&quiz),
            started_at: attempt.started_at,
            expires_at: attempt.expires_at,
            time_limit_seconds: quiz.time_limit_seconds,
        })
    }

    pub async fn get_attempt(&self, attempt_id: &str) -> Result<Attempt, AppError> {
        self.store.get(attempt_id).await
    }

    /// Caches in-progress answers so a deadline auto-submit can grade them.
    pub async fn save_answers(
        &self,
        attempt_id: &str,
        answers: &SubmittedAnswers,
    ) -> Result<(), AppError> {
        self.store.save_answers(attempt_id, answers).await
    }

    /// Grades and completes an attempt.
    ///
    /// A submission arriving after the deadline is still graded and the
    /// attempt ends `completed`. Of two concurrent submissions only one is
    /// persisted; the other fails with `InvalidState`. Nothing is written
    /// unless grading finished.
    pub async fn submit_attempt(
        &self,
        attempt_id: &str,
        answers: SubmittedAnswers,
        now: DateTime<Utc>,
    ) -> Result<QuizResult, AppError> {
        let attempt = self.store.get(attempt_id).await?;

        if attempt.status.is_terminal() {
            tracing::warn!(attempt_id, status = attempt.status.as_str(), "Rejected submission");
            return Err(AppError::InvalidState(
                "This quiz attempt has already been submitted or expired".to_string(),
            ));
        }

        if attempt.is_past_deadline(now) {
            tracing::info!(attempt_id, "Grading submission received after the deadline");
        }

        let quiz = self.bank.load(&attempt.quiz_id).await?;
        let sheet = scoring::score(&quiz, &answers);

        let elapsed = (now - attempt.started_at).num_seconds().max(0) as u64;
        let time_taken_seconds = match quiz.time_limit_seconds {
            Some(limit) => elapsed.min(u64::from(limit)),
            None => elapsed,
        };

        let result = QuizResult {
            attempt_id: attempt.id.clone(),
            quiz_id: quiz.id.clone(),
            quiz_title: quiz.title.clone(),
            user_id: attempt.user_id.clone(),
            score_percent: sheet.score_percent(),
            points_earned: sheet.points_earned,
            points_possible: sheet.points_possible,
            correct_count: sheet.correct_count(),
            total_count: sheet.total_count(),
            time_taken_seconds,
            started_at: attempt.started_at,
            completed_at: now,
            passed: sheet.passed(quiz.pass_score_percent),
            question_results: sheet.question_results,
        };

        self.store
            .complete(attempt_id, &answers, now, &result)
            .await
            .inspect_err(|e| tracing::warn!(attempt_id, "Submission not persisted: {}", e))?;

        tracing::info!(
            attempt_id,
            score = result.score_percent,
            passed = result.passed,
            "Quiz attempt completed"
        );

        Ok(result)
    }

    /// Deadline-triggered submission of whatever answers were cached so far.
    pub async fn auto_submit(
        &self,
        attempt_id: &str,
        deadline: DateTime<Utc>,
    ) -> Result<QuizResult, AppError> {
        let attempt = self.store.get(attempt_id).await?;
        self.submit_attempt(attempt_id, attempt.submitted_answers, deadline)
            .await
    }

    /// Flips an overdue, never-submitted attempt to `expired`. Idempotent;
    /// no result is produced for expired attempts.
    pub async fn check_expiry(&self, attempt_id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.store.expire(attempt_id, now).await? {
            tracing::info!(attempt_id, "Quiz attempt expired without submission");
        }
        Ok(())
    }

    /// Expires every overdue attempt except those `skip` claims, e.g.
    /// attempts whose deadline auto-submit is still pending.
    /// Returns how many were flipped.
    pub async fn sweep_expired<F>(&self, now: DateTime<Utc>, skip: F) -> Result<usize, AppError>
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        let mut expired = 0;
        for attempt_id in self.store.list_overdue(now).await? {
            if skip(&attempt_id) {
                continue;
            }
            if self.store.expire(&attempt_id, now).await? {
                expired += 1;
            }
        }

        if expired > 0 {
            tracing::info!(expired, "Expired overdue quiz attempts");
        }
        Ok(expired)
    }

    /// The result stored at submission time, returned verbatim.
    pub async fn get_result(&self, attempt_id: &str) -> Result<QuizResult, AppError> {
        let attempt = self.store.get(attempt_id).await?;
        attempt.result.ok_or_else(|| {
            AppError::InvalidState(format!(
                "Quiz attempt {} has no result: it is {}",
                attempt_id,
                attempt.status.as_str()
            ))
        })
    }

    pub async fn user_history(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<UserQuizHistory, AppError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);

        let results = self
            .store
            .list_completed_for_user(user_id, limit)
            .await?
            .into_iter()
            .filter_map(|attempt| attempt.result)
            .collect();

        Ok(UserQuizHistory::from_results(results))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::engine::{
        attempt_store::{InMemoryAttemptStore, SqlAttemptStore},
        question_bank::{InMemoryQuestionBank, SqlQuestionBank},
        scoring::tests::{question, quiz},
    };
    use crate::db;
    use crate::models::{
        attempt::{AnswerSelection, AttemptStatus},
        quiz::QuestionType,
    };

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn two_question_quiz() -> crate::models::quiz::Quiz {
        quiz(
            vec![
                question("Q1", QuestionType::SingleChoice, &["A"], &["A", "B", "C"]),
                question("Q2", QuestionType::SingleChoice, &["B"], &["A", "B", "C"]),
            ],
            Some(50.0),
        )
    }

    fn answers(pairs: &[(&str, &str)]) -> SubmittedAnswers {
        pairs
            .iter()
            .map(|(q, a)| (q.to_string(), AnswerSelection::One(a.to_string())))
            .collect()
    }

    async fn controller_with(quiz: crate::models::quiz::Quiz) -> AttemptLifecycleController {
        let bank = Arc::new(InMemoryQuestionBank::new());
        bank.insert(&quiz).await.unwrap();
        AttemptLifecycleController::new(bank, Arc::new(InMemoryAttemptStore::new()))
    }

    #[tokio::test]
    async fn start_returns_learner_view_without_answer_keys() {
        let engine = controller_with(two_question_quiz()).await;

        let started = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();
        assert_eq!(started.started_at, t0());
        assert_eq!(started.expires_at, Some(t0() + Duration::seconds(60)));
        assert_eq!(started.time_limit_seconds, Some(60));

        let rendered = serde_json::to_string(&started).unwrap();
        assert!(!rendered.contains("is_correct"));

        let attempt = engine.get_attempt(&started.attempt_id).await.unwrap();
        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert_eq!(attempt.user_id, "alice");
    }

    #[tokio::test]
    async fn start_unknown_quiz_is_not_found() {
        let engine = controller_with(two_question_quiz()).await;
        assert!(matches!(
            engine.start_attempt("nope", "alice", t0()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn two_question_scenario() {
        let engine = controller_with(two_question_quiz()).await;
        let started = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();

        let result = engine
            .submit_attempt(
                &started.attempt_id,
                answers(&[("Q1", "A"), ("Q2", "C")]),
                t0() + Duration::seconds(10),
            )
            .await
            .unwrap();

        assert_eq!(result.correct_count, 1);
        assert_eq!(result.total_count, 2);
        assert_eq!(result.score_percent, 50.0);
        assert!(result.passed);
        assert_eq!(result.time_taken_seconds, 10);
        assert_eq!(result.user_id, "alice");

        let attempt = engine.get_attempt(&started.attempt_id).await.unwrap();
        assert_eq!(attempt.status, AttemptStatus::Completed);
        assert_eq!(engine.get_result(&started.attempt_id).await.unwrap(), result);
    }

    #[tokio::test]
    async fn perfect_round_trip_passes() {
        let mut quiz = two_question_quiz();
        quiz.pass_score_percent = Some(100.0);
        quiz.randomize_questions = true;
        quiz.randomize_options = true;
        let engine = controller_with(quiz).await;

        let started = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();
        let result = engine
            .submit_attempt(&started.attempt_id, answers(&[("Q1", "A"), ("Q2", "B")]), t0())
            .await
            .unwrap();

        assert_eq!(result.score_percent, 100.0);
        assert!(result.passed);
    }

    #[tokio::test]
    async fn second_submission_is_invalid_state() {
        let engine = controller_with(two_question_quiz()).await;
        let started = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();

        engine
            .submit_attempt(&started.attempt_id, answers(&[("Q1", "A")]), t0())
            .await
            .unwrap();
        let first = engine.get_result(&started.attempt_id).await.unwrap();

        assert!(matches!(
            engine
                .submit_attempt(&started.attempt_id, answers(&[("Q1", "A"), ("Q2", "B")]), t0())
                .await,
            Err(AppError::InvalidState(_))
        ));
        assert_eq!(engine.get_result(&started.attempt_id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn concurrent_submissions_score_once() {
        let pool = db::memory_pool().await.unwrap();
        let bank = Arc::new(SqlQuestionBank::new(pool.clone()));
        bank.insert(&two_question_quiz()).await.unwrap();
        let engine = Arc::new(AttemptLifecycleController::new(
            bank,
            Arc::new(SqlAttemptStore::new(pool)),
        ));

        let started = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();

        let submit = |picks: &'static [(&'static str, &'static str)]| {
            let engine = Arc::clone(&engine);
            let id = started.attempt_id.clone();
            tokio::spawn(async move { engine.submit_attempt(&id, answers(picks), t0()).await })
        };

        let (a, b) = tokio::join!(submit(&[("Q1", "A"), ("Q2", "B")]), submit(&[("Q1", "C")]));
        let outcomes = [a.unwrap(), b.unwrap()];

        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::InvalidState(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);

        let winner = outcomes.into_iter().find_map(Result::ok).unwrap();
        assert_eq!(engine.get_result(&started.attempt_id).await.unwrap(), winner);
    }

    #[tokio::test]
    async fn late_submission_is_graded_and_completed() {
        let engine = controller_with(two_question_quiz()).await;
        let started = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();

        let result = engine
            .submit_attempt(
                &started.attempt_id,
                answers(&[("Q1", "A"), ("Q2", "B")]),
                t0() + Duration::seconds(75),
            )
            .await
            .unwrap();

        assert_eq!(result.score_percent, 100.0);
        assert_eq!(result.time_taken_seconds, 60, "clamped to the time limit");

        let attempt = engine.get_attempt(&started.attempt_id).await.unwrap();
        assert_eq!(attempt.status, AttemptStatus::Completed);
    }

    #[tokio::test]
    async fn expired_attempt_rejects_late_submission() {
        let engine = controller_with(two_question_quiz()).await;
        let started = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();

        engine
            .check_expiry(&started.attempt_id, t0() + Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(
            engine.get_attempt(&started.attempt_id).await.unwrap().status,
            AttemptStatus::InProgress
        );

        let past = t0() + Duration::seconds(61);
        engine.check_expiry(&started.attempt_id, past).await.unwrap();
        engine.check_expiry(&started.attempt_id, past).await.unwrap();
        assert_eq!(
            engine.get_attempt(&started.attempt_id).await.unwrap().status,
            AttemptStatus::Expired
        );

        assert!(matches!(
            engine
                .submit_attempt(&started.attempt_id, answers(&[("Q1", "A")]), past)
                .await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            engine.get_result(&started.attempt_id).await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn unknown_attempt_is_not_found() {
        let engine = controller_with(two_question_quiz()).await;
        assert!(matches!(
            engine.submit_attempt("ghost", SubmittedAnswers::new(), t0()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            engine.check_expiry("ghost", t0()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn auto_submit_grades_cached_answers_at_the_deadline() {
        let engine = controller_with(two_question_quiz()).await;
        let started = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();

        engine
            .save_answers(&started.attempt_id, &answers(&[("Q2", "B")]))
            .await
            .unwrap();

        let deadline = started.expires_at.unwrap();
        let result = engine.auto_submit(&started.attempt_id, deadline).await.unwrap();

        assert_eq!(result.correct_count, 1);
        assert_eq!(result.time_taken_seconds, 60);
        assert_eq!(result.completed_at, deadline);
    }

    #[tokio::test]
    async fn sweep_leaves_skipped_attempts_in_progress() {
        let engine = controller_with(two_question_quiz()).await;
        let pending = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();

        let now = t0() + Duration::seconds(90);
        let pending_id = pending.attempt_id.clone();
        let swept = engine
            .sweep_expired(now, |id| id == pending_id)
            .await
            .unwrap();

        assert_eq!(swept, 0);
        let attempt = engine.get_attempt(&pending.attempt_id).await.unwrap();
        assert_eq!(attempt.status, AttemptStatus::InProgress);
    }

    #[tokio::test]
    async fn sweep_expires_only_overdue_attempts() {
        let mut untimed = two_question_quiz();
        untimed.id = "untimed".to_string();
        untimed.time_limit_seconds = None;

        let engine = controller_with(two_question_quiz()).await;
        engine.question_bank().insert(&untimed).await.unwrap();

        let overdue = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();
        let fresh = engine
            .start_attempt("quiz-1", "alice", t0() + Duration::seconds(50))
            .await
            .unwrap();
        let open = engine.start_attempt("untimed", "alice", t0()).await.unwrap();

        let now = t0() + Duration::seconds(90);
        assert_eq!(engine.sweep_expired(now, |_| false).await.unwrap(), 1);
        assert_eq!(engine.sweep_expired(now, |_| false).await.unwrap(), 0);

        let status = |id: String| {
            let engine = &engine;
            async move { engine.get_attempt(&id).await.unwrap().status }
        };
        assert_eq!(status(overdue.attempt_id).await, AttemptStatus::Expired);
        assert_eq!(status(fresh.attempt_id).await, AttemptStatus::InProgress);
        assert_eq!(status(open.attempt_id).await, AttemptStatus::InProgress);
    }

    #[tokio::test]
    async fn history_summarizes_completed_attempts() {
        let engine = controller_with(two_question_quiz()).await;

        let first = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();
        engine
            .submit_attempt(
                &first.attempt_id,
                answers(&[("Q1", "A")]),
                t0() + Duration::seconds(20),
            )
            .await
            .unwrap();

        let second = engine
            .start_attempt("quiz-1", "alice", t0() + Duration::seconds(100))
            .await
            .unwrap();
        engine
            .submit_attempt(
                &second.attempt_id,
                answers(&[("Q1", "A"), ("Q2", "B")]),
                t0() + Duration::seconds(130),
            )
            .await
            .unwrap();

        let _abandoned = engine.start_attempt("quiz-1", "alice", t0()).await.unwrap();

        let history = engine.user_history("alice", None).await.unwrap();
        assert_eq!(history.total_attempts, 2);
        assert_eq!(history.attempts[0].attempt_id, second.attempt_id);
        assert_eq!(history.average_score, 75.0);
        assert_eq!(history.best_score, 100.0);
        assert_eq!(history.total_time_spent_seconds, 50);

        let limited = engine.user_history("alice", Some(1)).await.unwrap();
        assert_eq!(limited.total_attempts, 1);
    }
}
