// src/routes.rs

use axum::{
    Router,
    http::Method,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

use crate::{
    handlers::{attempt, paper},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges the attempt and paper sub-routers.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (services and configuration).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let exam_routes = Router::new().route("/{exam_id}/attempts", post(attempt::start_attempt));

    let attempt_routes = Router::new()
        .route("/{attempt_id}", get(attempt::get_attempt))
        .route(
            "/{attempt_id}/answers/{question_id}",
            put(attempt::save_answer),
        )
        .route("/{attempt_id}/submit", post(attempt::submit_attempt))
        .route("/{attempt_id}/regrade", post(attempt::regrade_attempt));

    let paper_routes = Router::new()
        .route("/{paper_id}/questions", get(paper::list_paper_questions))
        .route("/{paper_id}/shuffle", post(paper::shuffle_paper));

    Router::new()
        .nest("/api/exams", exam_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/papers", paper_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
