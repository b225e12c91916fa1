// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    engine::{AttemptLifecycleController, DeadlineScheduler},
    error::AppError,
    models::attempt::{Attempt, AttemptView, SubmitAttemptRequest},
    utils::jwt::Claims,
};

/// Loads an attempt and checks that the caller owns it.
pub(crate) async fn owned_attempt(
    engine: &AttemptLifecycleController,
    attempt_id: &str,
    claims: &Claims,
) -> Result<Attempt, AppError> {
    let attempt = engine.get_attempt(attempt_id).await?;

    if attempt.user_id != claims.sub {
        tracing::warn!(attempt_id, user_id = %claims.sub, "Attempt access by non-owner");
        return Err(AppError::Unauthorized(
            "You do not have permission to access this attempt".to_string(),
        ));
    }

    Ok(attempt)
}

/// Starts a new attempt at a quiz.
///
/// * Returns the quiz without answer keys, shuffled if the quiz is configured so.
/// * Arms the auto-submit countdown for timed quizzes.
pub async fn start_attempt(
    State(engine): State<Arc<AttemptLifecycleController>>,
    State(deadlines): State<Arc<DeadlineScheduler>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let started = engine.start_attempt(&quiz_id, &claims.sub, now).await?;

    if let Some(expires_at) = started.expires_at {
        deadlines.arm(&started.attempt_id, expires_at, now);
    }

    Ok((StatusCode::CREATED, Json(started)))
}

/// Current state of an attempt, including remaining time.
pub async fn get_attempt(
    State(engine): State<Arc<AttemptLifecycleController>>,
    State(deadlines): State<Arc<DeadlineScheduler>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = owned_attempt(&engine, &attempt_id, &claims).await?;
    let view =
        AttemptView::new(attempt, Utc::now()).with_countdown(deadlines.remaining(&attempt_id));
    Ok(Json(view))
}

/// Caches draft answers so the deadline auto-submit can grade them.
pub async fn save_answers(
    State(engine): State<Arc<AttemptLifecycleController>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    owned_attempt(&engine, &attempt_id, &claims).await?;
    engine.save_answers(&attempt_id, &req.answers).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Submits the answers of an attempt and returns the graded result.
///
/// The countdown is cancelled before grading; if the auto-submit already
/// claimed the attempt the request fails with 409.
pub async fn submit_attempt(
    State(engine): State<Arc<AttemptLifecycleController>>,
    State(deadlines): State<Arc<DeadlineScheduler>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = owned_attempt(&engine, &attempt_id, &claims).await?;
    let result = deadlines.submit(&attempt, req.answers, Utc::now()).await?;

    Ok(Json(result))
}

/// Marks the attempt expired if its deadline passed without a submission.
/// An attempt whose countdown is still armed is left to its auto-submit.
pub async fn check_expiry(
    State(engine): State<Arc<AttemptLifecycleController>>,
    State(deadlines): State<Arc<DeadlineScheduler>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_attempt(&engine, &attempt_id, &claims).await?;

    let now = Utc::now();
    deadlines.check_expiry(&attempt_id, now).await?;

    let attempt = engine.get_attempt(&attempt_id).await?;
    Ok(Json(AttemptView::new(attempt, now)))
}
