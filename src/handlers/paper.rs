// src/handlers/paper.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{
    error::AppError,
    models::paper::{PublicPaperQuestion, ShufflePaperRequest},
    services::Services,
};

/// Lists a paper's questions in presentation order, without answer keys.
pub async fn list_paper_questions(
    State(services): State<Services>,
    Path(paper_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let paper = services
        .store
        .get_paper(paper_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Paper {} not found", paper_id)))?;

    let questions: Vec<PublicPaperQuestion> = services
        .store
        .paper_questions(paper_id)
        .await?
        .iter()
        .map(|q| q.to_public())
        .collect();

    Ok(Json(serde_json::json!({
        "paper": paper,
        "questions": questions,
    })))
}

/// Creates a shuffled draft copy of a finalized paper.
pub async fn shuffle_paper(
    State(services): State<Services>,
    Path(paper_id): Path<i64>,
    Json(req): Json<ShufflePaperRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut rng = StdRng::from_entropy();
    let cloned = services
        .cloner()
        .clone_shuffled(paper_id, &req, &mut rng)
        .await?;

    Ok((StatusCode::CREATED, Json(cloned)))
}
