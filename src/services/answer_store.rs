// src/services/answer_store.rs

use std::sync::Arc;

use crate::{
    error::AppError,
    models::answer::{ExamAnswer, StudentAnswer},
    store::Store,
};

/// What happened to a best-effort save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    /// The write failed; the next save of the same question replaces it.
    Deferred,
}

/// Per-question answer persistence keyed by (attempt, question).
#[derive(Clone)]
pub struct AnswerStore {
    store: Arc<dyn Store>,
}

impl AnswerStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Upsert that reports failures. Last write wins.
    pub async fn upsert(
        &self,
        attempt_id: i64,
        question_id: i64,
        answer: &StudentAnswer,
        marks_allocated: f64,
    ) -> Result<ExamAnswer, AppError> {
        self.store
            .upsert_answer(attempt_id, question_id, answer, marks_allocated)
            .await
    }

    /// Upsert that never interrupts the exam: failures are logged and
    /// reported as [`SaveStatus::Deferred`].
    pub async fn save_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        answer: &StudentAnswer,
        marks_allocated: f64,
    ) -> SaveStatus {
        match self.upsert(attempt_id, question_id, answer, marks_allocated).await {
            Ok(_) => SaveStatus::Saved,
            Err(e) => {
                tracing::warn!(attempt_id, question_id, "Answer save failed: {}", e);
                SaveStatus::Deferred
            }
        }
    }
}
