// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Kind of a bank question. Decides the accepted answer shape and whether the
/// question can be graded automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    ShortAnswer,
    MatchFollowing,
    MultipleResponse,
}

impl QuestionType {
    /// Objective questions are graded without a human (mcq, true/false,
    /// multiple response).
    pub fn is_objective(self) -> bool {
        matches!(
            self,
            QuestionType::Mcq | QuestionType::TrueFalse | QuestionType::MultipleResponse
        )
    }

    /// Types whose answer key is a letter position into `options`.
    pub fn has_lettered_options(self) -> bool {
        matches!(self, QuestionType::Mcq | QuestionType::MultipleResponse)
    }
}

/// Represents the 'questions' table (the canonical bank entry).
///
/// Shuffling never writes to this record; per-paper option orders live on
/// the paper join row instead.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question_type: QuestionType,

    /// The text content of the question.
    pub content: String,

    /// Lettered options, `options[0]` is "A".
    pub options: Json<Vec<String>>,

    /// Presented combinations for multiple response questions
    /// (e.g. "A and C only").
    pub answer_options: Json<Vec<String>>,

    /// A letter, comma separated letters, or a literal value depending on type.
    pub correct_answer: String,

    pub marks: f64,
    pub negative_marks: f64,
}

/// Options beyond "Z" have no letter label.
pub const MAX_LETTERED_OPTIONS: usize = 26;

/// Converts an option index to its letter label (0 -> "A").
pub fn option_letter(index: usize) -> String {
    char::from(b'A' + (index % 26) as u8).to_string()
}

/// Converts a letter label back to an option index ("B" -> 1).
pub fn letter_index(label: &str) -> Option<usize> {
    let mut chars = label.trim().chars();
    let c = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !c.is_ascii_uppercase() {
        return None;
    }
    Some((c as u8 - b'A') as usize)
}

/// Splits a key such as "A, c" into normalized letters `["A", "C"]`.
pub fn split_answer_key(key: &str) -> Vec<String> {
    key.split(',')
        .map(|part| part.trim().to_ascii_uppercase())
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_round_trip_through_indices() {
        assert_eq!(option_letter(0), "A");
        assert_eq!(option_letter(3), "D");
        assert_eq!(letter_index("d"), Some(3));
        assert_eq!(letter_index(" B "), Some(1));
        assert_eq!(letter_index("AB"), None);
        assert_eq!(letter_index("1"), None);
    }

    #[test]
    fn answer_keys_are_normalized() {
        assert_eq!(split_answer_key("a, C"), vec!["A", "C"]);
        assert_eq!(split_answer_key("B"), vec!["B"]);
        assert!(split_answer_key(" , ").is_empty());
    }

    #[test]
    fn objective_types() {
        assert!(QuestionType::Mcq.is_objective());
        assert!(QuestionType::TrueFalse.is_objective());
        assert!(QuestionType::MultipleResponse.is_objective());
        assert!(!QuestionType::ShortAnswer.is_objective());
        assert!(!QuestionType::MatchFollowing.is_objective());
    }
}
