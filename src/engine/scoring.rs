// src/engine/scoring.rs

//! Pure grading of submitted answers against a quiz's answer key.
//!
//! Every question is worth [`POINTS_PER_QUESTION`]. Single choice, true/false
//! and matching questions are all-or-nothing; multiple choice questions earn
//! partial credit of `(correct - incorrect) / |correct options|`, floored at
//! zero, and count as correct once at least half credit is earned.
//!
//! Answers naming unknown questions or options are ignored rather than
//! rejected, so grading is total over any submission.

use std::collections::HashSet;

use crate::models::{
    attempt::{QuestionResult, SubmittedAnswers},
    quiz::{Question, QuestionType, Quiz},
};

pub const POINTS_PER_QUESTION: f64 = 1.0;

/// Multiple choice questions at or above this fraction of their points count as correct.
pub const PARTIAL_CREDIT_THRESHOLD: f64 = 0.5;

/// Output of [`score`]: per-question results plus point totals.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSheet {
    pub question_results: Vec<QuestionResult>,
    pub points_earned: f64,
    pub points_possible: f64,
}

impl ScoreSheet {
    pub fn correct_count(&self) -> usize {
        self.question_results.iter().filter(|r| r.is_correct).count()
    }

    pub fn total_count(&self) -> usize {
        self.question_results.len()
    }

    /// Score in the range 0..=100. A quiz with no questions scores 0.
    pub fn score_percent(&self) -> f64 {
        if self.points_possible > 0.0 {
            100.0 * self.points_earned / self.points_possible
        } else {
            0.0
        }
    }

    /// Without a configured threshold nobody passes.
    pub fn passed(&self, pass_score_percent: Option<f64>) -> bool {
        pass_score_percent.is_some_and(|threshold| self.score_percent() >= threshold)
    }
}

/// Grades `answers` against every question of `quiz`, in the quiz's question order.
pub fn score(quiz: &Quiz, answers: &SubmittedAnswers) -> ScoreSheet {
    let mut question_results = Vec::with_capacity(quiz.questions.len());
    let mut points_earned = 0.0;
    let mut points_possible = 0.0;

    for question in &quiz.questions {
        let selected = answers
            .get(&question.id)
            .map(|selection| selection.option_ids())
            .unwrap_or_default();

        let (earned, is_correct) = score_question(question, &selected);

        points_earned += earned;
        points_possible += POINTS_PER_QUESTION;

        question_results.push(QuestionResult {
            question_id: question.id.clone(),
            question_text: question.text.clone(),
            question_type: question.question_type,
            is_correct,
            points_earned: earned,
            points_possible: POINTS_PER_QUESTION,
            selected_option_ids: selected,
            correct_option_ids: question.correct_option_ids(),
            explanation: question.explanation.clone(),
        });
    }

    ScoreSheet {
        question_results,
        points_earned,
        points_possible,
    }
}

/// Returns `(points_earned, is_correct)` for one question.
fn score_question(question: &Question, selected: &[String]) -> (f64, bool) {
    // Ids that do not belong to this question contribute nothing.
    let known: Vec<&str> = selected
        .iter()
        .map(String::as_str)
        .filter(|id| question.has_option(id))
        .collect();

    if known.is_empty() {
        return (0.0, false);
    }

    let correct: HashSet<&str> = question
        .options
        .iter()
        .filter(|opt| opt.is_correct)
        .map(|opt| opt.id.as_str())
        .collect();

    match question.question_type {
        // TODO: matching needs pair semantics on options before it can be graded per pair.
        QuestionType::SingleChoice | QuestionType::TrueFalse | QuestionType::Matching => {
            if known.len() == 1 && correct.contains(known[0]) {
                (POINTS_PER_QUESTION, true)
            } else {
                (0.0, false)
            }
        }
        QuestionType::MultipleChoice => {
            if correct.is_empty() {
                return (0.0, false);
            }

            let correct_selections = known.iter().filter(|id| correct.contains(*id)).count();
            let incorrect_selections = known.len() - correct_selections;

            let net = correct_selections as f64 - incorrect_selections as f64;
            let earned = (POINTS_PER_QUESTION * net / correct.len() as f64).max(0.0);
            let is_correct = earned >= POINTS_PER_QUESTION * PARTIAL_CREDIT_THRESHOLD;

            (earned, is_correct)
        }
    }
}
