// src/store/mod.rs

//! Data-access layer for attempts, answers and papers.
//!
//! Handlers and services only see the [`Store`] trait. `PgStore` backs a
//! deployment; `MemoryStore` backs local runs without a database and the
//! test suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        answer::{AnswerGrade, ExamAnswer, StudentAnswer},
        attempt::{Evaluation, ExamAttempt, SubmitTransition},
        exam::Exam,
        paper::{NewPaperQuestion, NewQuestionPaper, PaperQuestion, QuestionPaper},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError>;

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<ExamAttempt>, AppError>;

    async fn find_attempt(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamAttempt>, AppError>;

    /// Insert-or-get on (exam_id, student_id). A new row starts `in_progress`
    /// with `started_at`; an existing row is returned untouched.
    async fn create_attempt(
        &self,
        exam_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt, AppError>;

    /// Moves a `not_started` attempt to `in_progress`. Other states are
    /// returned unchanged.
    async fn start_attempt(
        &self,
        attempt_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt, AppError>;

    /// Conditional `-> submitted` transition. Already terminal attempts are
    /// reported as [`SubmitTransition::AlreadyFinal`] without a write.
    async fn mark_submitted(
        &self,
        attempt_id: i64,
        submitted_at: DateTime<Utc>,
    ) -> Result<SubmitTransition, AppError>;

    /// Upsert on (attempt_id, question_id), last write wins. Fails with
    /// `Conflict` once the attempt is terminal.
    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        answer: &StudentAnswer,
        marks_allocated: f64,
    ) -> Result<ExamAnswer, AppError>;

    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<ExamAnswer>, AppError>;

    async fn record_grades(&self, attempt_id: i64, grades: &[AnswerGrade]) -> Result<(), AppError>;

    /// Writes totals and moves the attempt to `evaluated`.
    async fn finish_evaluation(
        &self,
        attempt_id: i64,
        evaluation: &Evaluation,
    ) -> Result<ExamAttempt, AppError>;

    async fn get_paper(&self, paper_id: i64) -> Result<Option<QuestionPaper>, AppError>;

    /// Questions of a paper ordered by `display_order`.
    async fn paper_questions(&self, paper_id: i64) -> Result<Vec<PaperQuestion>, AppError>;

    /// Titles of all papers whose title starts with `prefix`.
    async fn titles_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError>;

    /// Inserts a paper and its question rows as one unit.
    async fn create_paper(
        &self,
        paper: &NewQuestionPaper,
        questions: &[NewPaperQuestion],
    ) -> Result<QuestionPaper, AppError>;

    async fn mark_has_versions(&self, paper_id: i64) -> Result<(), AppError>;
}
