// src/utils/seed.rs

use std::path::Path;

use crate::{engine::QuestionBank, error::AppError, models::quiz::Quiz};

/// Reads a JSON array of quizzes.
pub async fn read_quiz_seed(path: &Path) -> Result<Vec<Quiz>, AppError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::InternalServerError(format!("Failed to read {}: {e}", path.display()))
    })?;

    Ok(serde_json::from_str(&raw)?)
}

/// Loads every quiz of the seed file into the bank. Existing quizzes with
/// the same id are replaced. Returns how many were loaded.
pub async fn seed_quizzes(bank: &dyn QuestionBank, path: &Path) -> Result<usize, AppError> {
    let quizzes = read_quiz_seed(path).await?;

    for quiz in &quizzes {
        bank.insert(quiz).await.inspect_err(|e| {
            tracing::error!("Rejected seed quiz '{}': {:?}", quiz.id, e);
        })?;
        tracing::info!("Seeded quiz: {}", quiz.id);
    }

    Ok(quizzes.len())
}
