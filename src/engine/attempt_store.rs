// src/engine/attempt_store.rs

//! Durable attempt records.
//!
//! Every mutation is a compare-and-swap on `status = in_progress`, so
//! `complete` and `expire` on the same attempt are mutually exclusive and
//! each succeeds at most once. Terminal attempts are never modified.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqlitePool, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::attempt::{Attempt, AttemptStatus, QuizResult, SubmittedAnswers},
};

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Allocates a new in-progress attempt. The deadline is derived from the time limit.
    async fn create(
        &self,
        quiz_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
        time_limit_seconds: Option<u32>,
    ) -> Result<Attempt, AppError>;

    async fn get(&self, attempt_id: &str) -> Result<Attempt, AppError>;

    /// Replaces the draft answers of an in-progress attempt.
    async fn save_answers(
        &self,
        attempt_id: &str,
        answers: &SubmittedAnswers,
    ) -> Result<(), AppError>;

    /// `in_progress -> completed`, storing the graded answers and result.
    /// Fails with `InvalidState` when the attempt is already terminal.
    async fn complete(
        &self,
        attempt_id: &str,
        answers: &SubmittedAnswers,
        completed_at: DateTime<Utc>,
        result: &QuizResult,
    ) -> Result<(), AppError>;

    /// `in_progress -> expired` when `now` is past the deadline.
    /// Returns whether this call made the transition; a no-op otherwise.
    async fn expire(&self, attempt_id: &str, now: DateTime<Utc>) -> Result<bool, AppError>;

    /// Completed attempts of a user, most recently completed first.
    async fn list_completed_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Attempt>, AppError>;

    /// Ids of in-progress attempts whose deadline lies before `now`.
    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<String>, AppError>;
}

fn new_attempt(
    quiz_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
    time_limit_seconds: Option<u32>,
) -> Attempt {
    Attempt {
        id: Uuid::new_v4().to_string(),
        quiz_id: quiz_id.to_string(),
        user_id: user_id.to_string(),
        started_at: now,
        expires_at: time_limit_seconds.map(|secs| now + Duration::seconds(i64::from(secs))),
        status: AttemptStatus::InProgress,
        completed_at: None,
        submitted_answers: SubmittedAnswers::new(),
        result: None,
    }
}

fn not_found(attempt_id: &str) -> AppError {
    AppError::NotFound(format!("Quiz attempt with ID {attempt_id} not found"))
}

fn not_in_progress(attempt: &Attempt) -> AppError {
    AppError::InvalidState(format!(
        "Quiz attempt {} is {}: already submitted or expired",
        attempt.id,
        attempt.status.as_str()
    ))
}

// ---------------------------------------------------------------------------
// SQL store
// ---------------------------------------------------------------------------

/// Row shape of the `quiz_attempts` table.
#[derive(FromRow)]
struct AttemptRow {
    id: String,
    quiz_id: String,
    user_id: String,
    started_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    status: AttemptStatus,
    completed_at: Option<DateTime<Utc>>,
    submitted_answers: Json<SubmittedAnswers>,
    result: Option<Json<QuizResult>>,
}

impl From<AttemptRow> for Attempt {
    fn from(row: AttemptRow) -> Self {
        Attempt {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            started_at: row.started_at,
            expires_at: row.expires_at,
            status: row.status,
            completed_at: row.completed_at,
            submitted_answers: row.submitted_answers.0,
            result: row.result.map(|Json(result)| result),
        }
    }
}

const SELECT_ATTEMPT: &str = r#"
    SELECT id, quiz_id, user_id, started_at, expires_at, status,
           completed_at, submitted_answers, result
    FROM quiz_attempts
"#;

#[derive(Clone)]
pub struct SqlAttemptStore {
    pool: SqlitePool,
}

impl SqlAttemptStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Explains why a guarded update touched no row.
    async fn rejected(&self, attempt_id: &str) -> AppError {
        match self.get(attempt_id).await {
            Ok(attempt) => not_in_progress(&attempt),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl AttemptStore for SqlAttemptStore {
    async fn create(
        &self,
        quiz_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
        time_limit_seconds: Option<u32>,
    ) -> Result<Attempt, AppError> {
        let attempt = new_attempt(quiz_id, user_id, now, time_limit_seconds);

        sqlx::query(
            r#"
            INSERT INTO quiz_attempts (id, quiz_id, user_id, started_at, expires_at, status, submitted_answers)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.quiz_id)
        .bind(&attempt.user_id)
        .bind(attempt.started_at)
        .bind(attempt.expires_at)
        .bind(attempt.status)
        .bind(Json(&attempt.submitted_answers))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quiz attempt: {:?}", e);
            AppError::from(e)
        })?;

        Ok(attempt)
    }

    async fn get(&self, attempt_id: &str) -> Result<Attempt, AppError> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!("{SELECT_ATTEMPT} WHERE id = ?"))
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Attempt::from).ok_or_else(|| not_found(attempt_id))
    }

    async fn save_answers(
        &self,
        attempt_id: &str,
        answers: &SubmittedAnswers,
    ) -> Result<(), AppError> {
        let updated = sqlx::query(
            "UPDATE quiz_attempts SET submitted_answers = ? WHERE id = ? AND status = 'in_progress'",
        )
        .bind(Json(answers))
        .bind(attempt_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(self.rejected(attempt_id).await);
        }
        Ok(())
    }

    async fn complete(
        &self,
        attempt_id: &str,
        answers: &SubmittedAnswers,
        completed_at: DateTime<Utc>,
        result: &QuizResult,
    ) -> Result<(), AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET status = 'completed', completed_at = ?, submitted_answers = ?, result = ?
            WHERE id = ? AND status = 'in_progress'
            "#,
        )
        .bind(completed_at)
        .bind(Json(answers))
        .bind(Json(result))
        .bind(attempt_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to complete quiz attempt {}: {:?}", attempt_id, e);
            AppError::from(e)
        })?
        .rows_affected();

        if updated == 0 {
            return Err(self.rejected(attempt_id).await);
        }
        Ok(())
    }

    async fn expire(&self, attempt_id: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let attempt = self.get(attempt_id).await?;
        if attempt.status != AttemptStatus::InProgress || !attempt.is_past_deadline(now) {
            return Ok(false);
        }

        let updated = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET status = 'expired', completed_at = ?
            WHERE id = ? AND status = 'in_progress'
            "#,
        )
        .bind(now)
        .bind(attempt_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn list_completed_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Attempt>, AppError> {
        // RFC 3339 UTC timestamps order correctly as text.
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "{SELECT_ATTEMPT} WHERE user_id = ? AND status = 'completed' ORDER BY completed_at DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Attempt::from).collect())
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM quiz_attempts WHERE status = 'in_progress' AND expires_at < ?",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store. A single mutex serializes every transition.
#[derive(Default)]
pub struct InMemoryAttemptStore {
    attempts: Mutex<HashMap<String, Attempt>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_in_progress<T>(
        &self,
        attempt_id: &str,
        f: impl FnOnce(&mut Attempt) -> T,
    ) -> Result<T, AppError> {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| not_found(attempt_id))?;

        if attempt.status != AttemptStatus::InProgress {
            return Err(not_in_progress(attempt));
        }
        Ok(f(attempt))
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn create(
        &self,
        quiz_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
        time_limit_seconds: Option<u32>,
    ) -> Result<Attempt, AppError> {
        let attempt = new_attempt(quiz_id, user_id, now, time_limit_seconds);
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(attempt.id.clone(), attempt.clone());
        Ok(attempt)
    }

    async fn get(&self, attempt_id: &str) -> Result<Attempt, AppError> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(attempt_id)
            .cloned()
            .ok_or_else(|| not_found(attempt_id))
    }

    async fn save_answers(
        &self,
        attempt_id: &str,
        answers: &SubmittedAnswers,
    ) -> Result<(), AppError> {
        self.with_in_progress(attempt_id, |attempt| {
            attempt.submitted_answers = answers.clone();
        })
    }

    async fn complete(
        &self,
        attempt_id: &str,
        answers: &SubmittedAnswers,
        completed_at: DateTime<Utc>,
        result: &QuizResult,
    ) -> Result<(), AppError> {
        self.with_in_progress(attempt_id, |attempt| {
            attempt.status = AttemptStatus::Completed;
            attempt.completed_at = Some(completed_at);
            attempt.submitted_answers = answers.clone();
            attempt.result = Some(result.clone());
        })
    }

    async fn expire(&self, attempt_id: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| not_found(attempt_id))?;

        if attempt.status != AttemptStatus::InProgress || !attempt.is_past_deadline(now) {
            return Ok(false);
        }

        attempt.status = AttemptStatus::Expired;
        attempt.completed_at = Some(now);
        Ok(true)
    }

    async fn list_completed_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Attempt>, AppError> {
        let mut attempts: Vec<Attempt> = self
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|a| a.user_id == user_id && a.status == AttemptStatus::Completed)
            .cloned()
            .collect();

        attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        attempts.truncate(limit as usize);
        Ok(attempts)
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        Ok(self
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|a| a.status == AttemptStatus::InProgress && a.is_past_deadline(now))
            .map(|a| a.id.clone())
            .collect())
    }
}
