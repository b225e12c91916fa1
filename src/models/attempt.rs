// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::quiz::{PublicQuiz, QuestionType};

/// Lifecycle of an attempt. `Completed` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Expired,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

/// A learner's selection for one question: a single option id or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerSelection {
    One(String),
    Many(Vec<String>),
}

impl AnswerSelection {
    /// Selected option ids with duplicates removed, first occurrence kept.
    pub fn option_ids(&self) -> Vec<String> {
        let raw: &[String] = match self {
            AnswerSelection::One(id) => std::slice::from_ref(id),
            AnswerSelection::Many(ids) => ids,
        };

        let mut seen = Vec::with_capacity(raw.len());
        for id in raw {
            if !seen.contains(id) {
                seen.push(id.clone());
            }
        }
        seen
    }
}

/// Key: Question ID. Value: the selected option(s).
pub type SubmittedAnswers = BTreeMap<String, AnswerSelection>;

/// One user's timed run through a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    pub completed_at: Option<DateTime<Utc>>,

    /// Draft answers while in progress, the graded batch once completed.
    pub submitted_answers: SubmittedAnswers,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QuizResult>,
}

impl Attempt {
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }
}

/// Grading of a single question. Reveals the answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub is_correct: bool,
    pub points_earned: f64,
    pub points_possible: f64,
    pub selected_option_ids: Vec<String>,
    pub correct_option_ids: Vec<String>,
    pub explanation: Option<String>,
}

/// Graded outcome of an attempt, computed once at submission and stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub attempt_id: String,
    pub quiz_id: String,
    pub quiz_title: String,
    pub user_id: String,
    pub score_percent: f64,
    pub points_earned: f64,
    pub points_possible: f64,
    pub correct_count: usize,
    pub total_count: usize,
    pub time_taken_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub passed: bool,
    pub question_results: Vec<QuestionResult>,
}

/// DTO returned when an attempt starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedAttempt {
    pub attempt_id: String,
    pub quiz: PublicQuiz,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub time_limit_seconds: Option<u32>,
}

/// DTO for submitting (or saving a draft of) an attempt's answers.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub answers: SubmittedAnswers,
}

/// DTO describing an attempt to its owner. Never includes the answer key
/// unless the attempt has been graded.
#[derive(Debug, Serialize)]
pub struct AttemptView {
    pub attempt_id: String,
    pub quiz_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
    pub answers: SubmittedAnswers,
}

impl AttemptView {
    pub fn new(attempt: Attempt, now: DateTime<Utc>) -> Self {
        let remaining_seconds = match (attempt.status, attempt.expires_at) {
            (AttemptStatus::InProgress, Some(deadline)) => {
                Some((deadline - now).num_seconds().max(0))
            }
            _ => None,
        };

        AttemptView {
            attempt_id: attempt.id,
            quiz_id: attempt.quiz_id,
            status: attempt.status,
            started_at: attempt.started_at,
            expires_at: attempt.expires_at,
            completed_at: attempt.completed_at,
            remaining_seconds,
            answers: attempt.submitted_answers,
        }
    }

    /// Reports the live countdown of an armed attempt instead of the
    /// clock-derived estimate.
    pub fn with_countdown(mut self, remaining: Option<u64>) -> Self {
        if self.status == AttemptStatus::InProgress {
            if let Some(seconds) = remaining {
                self.remaining_seconds = Some(seconds as i64);
            }
        }
        self
    }
}

/// Summary of a user's completed attempts, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuizHistory {
    pub attempts: Vec<QuizResult>,
    pub total_attempts: usize,
    pub average_score: f64,
    pub best_score: f64,
    pub total_time_spent_seconds: u64,
}

impl UserQuizHistory {
    pub fn from_results(attempts: Vec<QuizResult>) -> Self {
        let total_attempts = attempts.len();
        let total_score: f64 = attempts.iter().map(|r| r.score_percent).sum();
        let average_score = if total_attempts > 0 {
            total_score / total_attempts as f64
        } else {
            0.0
        };
        let best_score = attempts
            .iter()
            .map(|r| r.score_percent)
            .fold(0.0, f64::max);
        let total_time_spent_seconds = attempts.iter().map(|r| r.time_taken_seconds).sum();

        UserQuizHistory {
            attempts,
            total_attempts,
            average_score,
            best_score,
            total_time_spent_seconds,
        }
    }
}

/// Query parameters for the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}
