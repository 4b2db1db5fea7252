// src/services/submission.rs

use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::AppError,
    models::attempt::{AttemptStatus, ExamAttempt, SubmitTransition},
    services::grading::{Grader, summarize},
    store::Store,
    utils::clock::Clock,
};

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub attempt: ExamAttempt,
    /// True when the attempt was already terminal and nothing changed.
    pub already_submitted: bool,
}

/// Moves attempts to `submitted` exactly once in effect and hands them to the
/// grader.
#[derive(Clone)]
pub struct SubmissionCoordinator {
    store: Arc<dyn Store>,
    grader: Arc<dyn Grader>,
    clock: Arc<dyn Clock>,
}

impl SubmissionCoordinator {
    pub fn new(store: Arc<dyn Store>, grader: Arc<dyn Grader>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            grader,
            clock,
        }
    }

    /// Idempotent submit. A second call (another tab, or the timer racing a
    /// manual submit) returns the stored attempt without writing.
    ///
    /// Grading runs after the transition; its failure is logged and does not
    /// undo or fail the submission.
    pub async fn submit(&self, attempt_id: i64) -> Result<SubmitOutcome, AppError> {
        let transition = self
            .store
            .mark_submitted(attempt_id, self.clock.now())
            .await?;

        let attempt = match transition {
            SubmitTransition::AlreadyFinal(attempt) => {
                tracing::info!(attempt_id, status = ?attempt.status, "Submit ignored, attempt already final");
                return Ok(SubmitOutcome {
                    attempt,
                    already_submitted: true,
                });
            }
            SubmitTransition::Submitted(attempt) => attempt,
        };
        tracing::info!(attempt_id, "Attempt submitted");

        if let Err(e) = self.grader.process_submission(attempt_id).await {
            tracing::warn!(attempt_id, "Grading after submission failed: {}", e);
        }

        // Grading may have moved the attempt on to `evaluated`.
        let attempt = match self.store.get_attempt(attempt_id).await {
            Ok(Some(latest)) => latest,
            Ok(None) => attempt,
            Err(e) => {
                tracing::warn!(attempt_id, "Could not reload attempt after grading: {}", e);
                attempt
            }
        };

        Ok(SubmitOutcome {
            attempt,
            already_submitted: false,
        })
    }

    /// Objective-only regrade of a submitted attempt. An attempt that was
    /// already evaluated gets its totals and result recomputed from the new
    /// grades.
    pub async fn regrade_objective(&self, attempt_id: i64) -> Result<ExamAttempt, AppError> {
        let attempt = self
            .store
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))?;
        if !attempt.status.is_terminal() {
            return Err(AppError::Conflict(
                "Attempt has not been submitted yet".to_string(),
            ));
        }

        self.grader.auto_grade_objective(attempt_id).await?;
        tracing::info!(attempt_id, "Objective regrade finished");

        if attempt.status == AttemptStatus::Evaluated {
            let exam = self
                .store
                .get_exam(attempt.exam_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", attempt.exam_id)))?;
            let answers = self.store.list_answers(attempt_id).await?;
            if let Some(evaluation) = summarize(&exam, &answers) {
                return self.store.finish_evaluation(attempt_id, &evaluation).await;
            }
        }

        Ok(self.store.get_attempt(attempt_id).await?.unwrap_or(attempt))
    }
}
