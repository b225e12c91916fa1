// src/handlers/result.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    engine::AttemptLifecycleController,
    error::AppError,
    handlers::attempt::owned_attempt,
    models::attempt::HistoryParams,
    utils::jwt::Claims,
};

/// Returns the stored result of a completed attempt, answer key included.
pub async fn get_result(
    State(engine): State<Arc<AttemptLifecycleController>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_attempt(&engine, &attempt_id, &claims).await?;
    Ok(Json(engine.get_result(&attempt_id).await?))
}

/// The caller's completed attempts with aggregate statistics.
pub async fn get_history(
    State(engine): State<Arc<AttemptLifecycleController>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(engine.user_history(&claims.sub, params.limit).await?))
}
