// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Approval state of a scheduled exam. Transitions are managed outside the
/// attempt engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "exam_status", rename_all = "snake_case")]
pub enum ExamStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

/// Represents the 'exams' table: one scheduled sitting of a question paper.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub question_paper_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_marks: f64,
    pub passing_marks: f64,
    pub status: ExamStatus,
}

impl Exam {
    /// Whether `now` lies inside `[start_time, end_time]`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now <= self.end_time
    }
}
