// src/engine/question_bank.rs

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use sqlx::{SqlitePool, types::Json};
use validator::Validate;

use crate::{error::AppError, models::quiz::Quiz};

/// Read access to authored quizzes.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Loads a quiz with its answer key. Fails with `NotFound` for unknown ids.
    async fn load(&self, quiz_id: &str) -> Result<Quiz, AppError>;

    /// Inserts or replaces a quiz after checking its question invariants.
    async fn insert(&self, quiz: &Quiz) -> Result<(), AppError>;
}

/// Quizzes stored as JSON documents in the `quizzes` table.
#[derive(Clone)]
pub struct SqlQuestionBank {
    pool: SqlitePool,
}

impl SqlQuestionBank {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionBank for SqlQuestionBank {
    async fn load(&self, quiz_id: &str) -> Result<Quiz, AppError> {
        let row: Option<(Json<Quiz>,)> =
            sqlx::query_as("SELECT document FROM quizzes WHERE id = ?")
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to load quiz {}: {:?}", quiz_id, e);
                    AppError::from(e)
                })?;

        row.map(|(Json(quiz),)| quiz)
            .ok_or_else(|| AppError::NotFound(format!("Quiz with ID {quiz_id} not found")))
    }

    async fn insert(&self, quiz: &Quiz) -> Result<(), AppError> {
        quiz.validate()?;

        sqlx::query(
            r#"
            INSERT INTO quizzes (id, title, document)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                document = excluded.document
            "#,
        )
        .bind(&quiz.id)
        .bind(&quiz.title)
        .bind(Json(quiz))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Process-local question bank, for tests and embedding.
#[derive(Default)]
pub struct InMemoryQuestionBank {
    quizzes: RwLock<HashMap<String, Quiz>>,
}

impl InMemoryQuestionBank {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionBank for InMemoryQuestionBank {
    async fn load(&self, quiz_id: &str) -> Result<Quiz, AppError> {
        self.quizzes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(quiz_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Quiz with ID {quiz_id} not found")))
    }

    async fn insert(&self, quiz: &Quiz) -> Result<(), AppError> {
        quiz.validate()?;

        self.quizzes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(quiz.id.clone(), quiz.clone());
        Ok(())
    }
}
