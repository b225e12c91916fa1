// src/models/quiz.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Question kinds supported by the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    Matching,
}

/// An answer option as authored.
/// `is_correct` travels with the option, never with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AnswerOption {
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    #[validate(length(min = 1, max = 500))]
    pub text: String,

    #[serde(default)]
    pub is_correct: bool,

    #[validate(length(max = 1000))]
    pub explanation: Option<String>,
}

/// A question with its options stored inline (array of structs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_question))]
pub struct Question {
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// The text content of the question.
    #[validate(length(min = 1, max = 1000))]
    pub text: String,

    /// Mapped from the JSON field 'type' since `type` is a reserved keyword in Rust.
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    #[validate(nested)]
    pub options: Vec<AnswerOption>,

    /// Explanation of the correct answer, revealed after submission.
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

impl Question {
    /// Ids of the correct options, in authored (or shuffled) order.
    pub fn correct_option_ids(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|opt| opt.is_correct)
            .map(|opt| opt.id.clone())
            .collect()
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|opt| opt.id == option_id)
    }
}

fn validate_question(question: &Question) -> Result<(), ValidationError> {
    if question.options.is_empty() {
        return Err(ValidationError::new("options_cannot_be_empty"));
    }

    let mut seen = HashSet::new();
    if !question.options.iter().all(|opt| seen.insert(opt.id.as_str())) {
        return Err(ValidationError::new("duplicate_option_id"));
    }

    let correct = question.options.iter().filter(|opt| opt.is_correct).count();
    match question.question_type {
        QuestionType::SingleChoice | QuestionType::TrueFalse if correct != 1 => {
            Err(ValidationError::new("exactly_one_correct_option_required"))
        }
        QuestionType::MultipleChoice if correct == 0 => {
            Err(ValidationError::new("at_least_one_correct_option_required"))
        }
        _ => Ok(()),
    }
}

fn validate_quiz(quiz: &Quiz) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    if !quiz.questions.iter().all(|q| seen.insert(q.id.as_str())) {
        return Err(ValidationError::new("duplicate_question_id"));
    }
    Ok(())
}

/// A quiz as read by the engine. Immutable for the lifetime of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_quiz))]
pub struct Quiz {
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1), nested)]
    pub questions: Vec<Question>,

    #[validate(range(min = 1))]
    pub time_limit_seconds: Option<u32>,

    /// Minimum score percentage for a pass. No threshold means nobody passes.
    #[validate(range(min = 0.0, max = 100.0))]
    pub pass_score_percent: Option<f64>,

    #[serde(default)]
    pub randomize_questions: bool,

    #[serde(default)]
    pub randomize_options: bool,
}

/// Learner-facing option: no correctness flag, no explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicOption {
    pub id: String,
    pub text: String,
}

/// DTO for sending a question to the client before submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<PublicOption>,
}

/// DTO for the quiz served to a learner. Never carries answer keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuiz {
    pub id: String,
    pub title: String,
    pub questions: Vec<PublicQuestion>,
    pub time_limit_seconds: Option<u32>,
    pub pass_score_percent: Option<f64>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        let questions = quiz
            .questions
            .iter()
            .map(|q| PublicQuestion {
                id: q.id.clone(),
                text: q.text.clone(),
                question_type: q.question_type,
                options: q
                    .options
                    .iter()
                    .map(|opt| PublicOption {
                        id: opt.id.clone(),
                        text: opt.text.clone(),
                    })
                    .collect(),
            })
            .collect();

        PublicQuiz {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            questions,
            time_limit_seconds: quiz.time_limit_seconds,
            pass_score_percent: quiz.pass_score_percent,
        }
    }
}
