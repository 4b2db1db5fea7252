// src/handlers/attempt.rs

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        answer::StudentAnswer,
        attempt::{AttemptStatus, ExamAttempt, SaveAnswerRequest, StartAttemptRequest},
        exam::Exam,
        paper::PublicPaperQuestion,
    },
    services::{
        Services,
        session::{AttemptSession, SessionStart},
    },
    utils::clock::remaining_seconds,
};

/// What the exam page needs to render after opening an attempt.
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttemptView {
    InProgress {
        exam: Exam,
        attempt: ExamAttempt,
        questions: Vec<PublicPaperQuestion>,
        answers: BTreeMap<i64, StudentAnswer>,
        remaining_seconds: i64,
        answered_count: usize,
    },
    /// Terminal attempt: the client redirects to the results view.
    Finished { attempt: ExamAttempt },
}

impl From<SessionStart> for AttemptView {
    fn from(start: SessionStart) -> Self {
        match start {
            SessionStart::Active(session) => AttemptView::InProgress {
                exam: session.exam().clone(),
                attempt: session.attempt().clone(),
                questions: session.questions().iter().map(|q| q.to_public()).collect(),
                answers: session.answers(),
                remaining_seconds: session.remaining_seconds(),
                answered_count: session.answered_count(),
            },
            SessionStart::Finished(attempt) => AttemptView::Finished { attempt },
        }
    }
}

async fn load_attempt(services: &Services, attempt_id: i64) -> Result<ExamAttempt, AppError> {
    services
        .store
        .get_attempt(attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
}

/// Opens or resumes a student's attempt at an exam.
///
/// * 403 outside the exam window.
/// * `state = "finished"` when the attempt is already submitted.
pub async fn start_attempt(
    State(services): State<Services>,
    Path(exam_id): Path<i64>,
    Json(req): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let start = AttemptSession::initialize(&services, exam_id, req.student_id).await?;
    Ok(Json(AttemptView::from(start)))
}

/// Returns the attempt with its remaining time, recomputed from `started_at`.
pub async fn get_attempt(
    State(services): State<Services>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = load_attempt(&services, attempt_id).await?;

    let remaining = match (attempt.status, attempt.started_at) {
        (AttemptStatus::InProgress, Some(started_at)) => {
            let exam = services
                .store
                .get_exam(attempt.exam_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;
            remaining_seconds(exam.duration_minutes, started_at, services.clock.now())
        }
        _ => 0,
    };

    Ok(Json(serde_json::json!({
        "attempt": attempt,
        "remaining_seconds": remaining,
    })))
}

/// Saves (or overwrites) the answer to one question.
pub async fn save_answer(
    State(services): State<Services>,
    Path((attempt_id, question_id)): Path<(i64, i64)>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = load_attempt(&services, attempt_id).await?;
    if attempt.status.is_terminal() {
        return Err(AppError::Conflict(
            "Attempt has already been submitted".to_string(),
        ));
    }

    let exam = services
        .store
        .get_exam(attempt.exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let question = services
        .store
        .paper_questions(exam.question_paper_id)
        .await?
        .into_iter()
        .find(|q| q.question.id == question_id)
        .ok_or_else(|| {
            AppError::BadRequest(format!("Question {} is not part of this exam", question_id))
        })?;

    if !req.answer.fits(question.question.question_type) {
        return Err(AppError::BadRequest(format!(
            "Answer shape does not match a {:?} question",
            question.question.question_type
        )));
    }

    let saved = services
        .answer_store()
        .upsert(attempt_id, question_id, &req.answer, question.question.marks)
        .await?;

    Ok(Json(serde_json::json!({
        "attempt_id": saved.attempt_id,
        "question_id": saved.question_id,
        "answer": saved.student_answer,
    })))
}

/// Submits an attempt. Repeated calls return the stored attempt.
pub async fn submit_attempt(
    State(services): State<Services>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = services.coordinator().submit(attempt_id).await?;
    Ok(Json(outcome))
}

/// Re-runs objective grading for a submitted attempt.
pub async fn regrade_attempt(
    State(services): State<Services>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = services.coordinator().regrade_objective(attempt_id).await?;

    Ok(Json(serde_json::json!({
        "attempt": attempt,
        "message": "Objective answers regraded",
    })))
}
