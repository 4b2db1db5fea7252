// src/models/answer.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::models::question::QuestionType;

/// A student's answer. The variant depends on the question type; see
/// [`StudentAnswer::fits`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StudentAnswer {
    /// One option label ("B") or a true/false value.
    Choice(String),
    /// A set of option labels.
    Choices(Vec<String>),
    /// Free text, or the literal combination picked for multiple response.
    Text(String),
    /// Left item -> right item.
    Matching(BTreeMap<String, String>),
}

impl StudentAnswer {
    /// Whether this answer shape is accepted for `question_type`.
    pub fn fits(&self, question_type: QuestionType) -> bool {
        matches!(
            (question_type, self),
            (QuestionType::Mcq, StudentAnswer::Choice(_))
                | (QuestionType::TrueFalse, StudentAnswer::Choice(_))
                | (QuestionType::MultipleResponse, StudentAnswer::Choices(_))
                | (QuestionType::MultipleResponse, StudentAnswer::Text(_))
                | (QuestionType::ShortAnswer, StudentAnswer::Text(_))
                | (QuestionType::MatchFollowing, StudentAnswer::Matching(_))
        )
    }
}

/// Represents the 'exam_answers' table. Keyed by (attempt_id, question_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamAnswer {
    pub attempt_id: i64,
    pub question_id: i64,
    pub student_answer: Json<StudentAnswer>,
    pub marks_allocated: f64,

    // Grading outputs, written only by the evaluator.
    pub is_correct: Option<bool>,
    pub marks_obtained: Option<f64>,
    pub evaluated_by: Option<String>,
    pub evaluated_at: Option<DateTime<Utc>>,
}

/// Grade written back onto one answer by an evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerGrade {
    pub question_id: i64,
    pub is_correct: bool,
    pub marks_obtained: f64,
    pub evaluated_by: String,
    pub evaluated_at: DateTime<Utc>,
}
