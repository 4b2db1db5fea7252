// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attempt_status", rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Submitted,
    Evaluated,
}

impl AttemptStatus {
    /// Submitted or evaluated: the student can no longer change anything.
    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptStatus::Submitted | AttemptStatus::Evaluated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attempt_result", rename_all = "lowercase")]
pub enum AttemptResult {
    Pass,
    Fail,
}

/// Represents the 'exam_attempts' table. One row per (exam, student).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub status: AttemptStatus,

    /// Anchor for the remaining-time computation.
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,

    pub total_marks_obtained: Option<f64>,
    pub percentage: Option<f64>,
    pub result: Option<AttemptResult>,
}

/// Outcome of the submit transition at the storage level.
#[derive(Debug, Clone)]
pub enum SubmitTransition {
    /// The row moved to `submitted` with this call.
    Submitted(ExamAttempt),
    /// The row was already terminal; nothing was written.
    AlreadyFinal(ExamAttempt),
}

/// Totals written by an evaluator when an attempt is fully graded.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub total_marks_obtained: f64,
    pub percentage: f64,
    pub result: AttemptResult,
}

/// DTO for opening (or resuming) an attempt.
#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    pub student_id: i64,
}

/// DTO for saving one answer.
#[derive(Debug, Deserialize)]
pub struct SaveAnswerRequest {
    pub answer: crate::models::answer::StudentAnswer,
}
