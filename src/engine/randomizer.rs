// src/engine/randomizer.rs

use rand::{Rng, seq::SliceRandom};

use crate::models::quiz::Quiz;

/// Applies a fresh uniform permutation to the quiz's question order and/or to
/// each question's options, as the quiz's flags request.
///
/// Questions and options are shuffled as whole structs, so ids, text and
/// correctness flags always move together.
pub fn shuffle<R: Rng + ?Sized>(mut quiz: Quiz, rng: &mut R) -> Quiz {
    if quiz.randomize_questions {
        quiz.questions.shuffle(rng);
    }

    if quiz.randomize_options {
        for question in &mut quiz.questions {
            question.options.shuffle(rng);
        }
    }

    quiz
}
