// src/services/shuffle.rs

//! Randomized variants of a paper.
//!
//! Everything here is pure given the random source. Canonical questions are
//! only read; new option orders are returned as [`ShuffledOptions`] for the
//! paper join row.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::models::{
    paper::{PaperQuestion, ShuffledOptions},
    question::{MAX_LETTERED_OPTIONS, QuestionType, option_letter, split_answer_key},
};

/// Result of shuffling one question's options.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionShuffle {
    pub shuffled_options: ShuffledOptions,
    /// Only for multiple response questions with presented combinations.
    pub shuffled_answer_options: Option<Vec<String>>,
}

/// Returns the questions in a random order (Fisher-Yates). Payloads are
/// moved as-is; only the sequence changes.
pub fn shuffle_question_order<T, R: Rng + ?Sized>(mut questions: Vec<T>, rng: &mut R) -> Vec<T> {
    questions.shuffle(rng);
    questions
}

/// A random permutation of `0..len`. `permutation[new] = old`.
pub fn random_permutation<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut permutation: Vec<usize> = (0..len).collect();
    permutation.shuffle(rng);
    permutation
}

/// Reorders `options` by `permutation` and recomputes the lettered key so it
/// still points at the same option texts.
///
/// Returns `None` when no option is marked correct by `correct_answer`
/// (the key is not a letter reference), since a remap would lose it, and
/// when there are more options than letters.
pub fn remap_options(
    question_type: QuestionType,
    options: &[String],
    correct_answer: &str,
    permutation: &[usize],
) -> Option<ShuffledOptions> {
    if options.len() > MAX_LETTERED_OPTIONS {
        return None;
    }

    let correct: BTreeSet<String> = match question_type {
        QuestionType::Mcq => BTreeSet::from([correct_answer.trim().to_ascii_uppercase()]),
        QuestionType::MultipleResponse => split_answer_key(correct_answer).into_iter().collect(),
        _ => return None,
    };

    let flagged: Vec<(&String, bool)> = options
        .iter()
        .enumerate()
        .map(|(i, option)| (option, correct.contains(&option_letter(i))))
        .collect();

    if !flagged.iter().any(|(_, is_correct)| *is_correct) {
        return None;
    }

    let reordered: Vec<(&String, bool)> = permutation.iter().map(|&old| flagged[old]).collect();

    let correct_answer = reordered
        .iter()
        .enumerate()
        .filter(|(_, (_, is_correct))| *is_correct)
        .map(|(new, _)| option_letter(new))
        .collect::<Vec<_>>()
        .join(",");

    Some(ShuffledOptions {
        options: reordered.into_iter().map(|(option, _)| option.clone()).collect(),
        correct_answer,
    })
}

/// Shuffles the options of an mcq or multiple response question, starting
/// from whatever option order is authoritative for its current paper.
///
/// Other types pass through as `None`: true/false has a fixed domain and the
/// remaining types have no positional key.
pub fn shuffle_options<R: Rng + ?Sized>(question: &PaperQuestion, rng: &mut R) -> Option<OptionShuffle> {
    let question_type = question.question.question_type;
    if !question_type.has_lettered_options() {
        return None;
    }

    let options = question.effective_options();
    if options.len() > MAX_LETTERED_OPTIONS {
        tracing::warn!(
            question_id = question.question.id,
            options = options.len(),
            "Too many options to label with letters; leaving options in place"
        );
        return None;
    }

    let permutation = random_permutation(options.len(), rng);
    let Some(shuffled_options) = remap_options(
        question_type,
        options,
        question.effective_correct_answer(),
        &permutation,
    ) else {
        tracing::warn!(
            question_id = question.question.id,
            "Answer key does not reference an option letter; leaving options in place"
        );
        return None;
    };

    // Combinations are stored by their literal text, so no key remap is needed.
    let shuffled_answer_options = match question_type {
        QuestionType::MultipleResponse if !question.effective_answer_options().is_empty() => {
            let mut combos = question.effective_answer_options().to_vec();
            combos.shuffle(rng);
            Some(combos)
        }
        _ => None,
    };

    Some(OptionShuffle {
        shuffled_options,
        shuffled_answer_options,
    })
}

/// Resolves a lettered key against an option list ("A,C" -> texts).
pub fn resolve_key<'a>(options: &'a [String], key: &str) -> Vec<&'a str> {
    split_answer_key(key)
        .iter()
        .filter_map(|letter| crate::models::question::letter_index(letter))
        .filter_map(|i| options.get(i).map(String::as_str))
        .collect()
}
