// tests/api_tests.rs

mod common;

use chrono::Duration;
use exam_engine::{config::Config, routes, state::AppState};
use serde_json::{Value, json};

use common::{Fixture, fixture};

/// Spawns the app on a random port over the in-memory fixture.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app(f: &Fixture) -> String {
    let config = Config::default();
    let state = AppState {
        services: f.services.clone(),
        config: config.clone(),
    };

    let app = routes::create_router(state);

    // Port 0 picks a free port
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn start(client: &reqwest::Client, address: &str, exam_id: i64, student_id: i64) -> Value {
    let response = client
        .post(format!("{}/api/exams/{}/attempts", address, exam_id))
        .json(&json!({ "student_id": student_id }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn health_check_404() {
    let f = fixture().await;
    let address = spawn_app(&f).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn attempt_lifecycle_works() {
    let f = fixture().await;
    let address = spawn_app(&f).await;
    let client = reqwest::Client::new();

    // 1. Open the attempt
    let body = start(&client, &address, f.exam.id, 42).await;
    assert_eq!(body["state"], "in_progress");
    assert_eq!(body["remaining_seconds"], 3600);
    assert_eq!(body["exam"]["id"], f.exam.id);
    assert_eq!(body["exam"]["duration_minutes"], 60);
    assert_eq!(body["questions"].as_array().unwrap().len(), 5);
    assert!(body["questions"][0].get("correct_answer").is_none());
    assert_eq!(body["questions"][0]["type"], "mcq");
    let attempt_id = body["attempt"]["id"].as_i64().unwrap();

    // 2. Answer two questions
    let q1 = f.questions[0].id;
    let response = client
        .put(format!("{}/api/attempts/{}/answers/{}", address, attempt_id, q1))
        .json(&json!({ "answer": { "kind": "choice", "value": "B" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let q3 = f.questions[2].id;
    let response = client
        .put(format!("{}/api/attempts/{}/answers/{}", address, attempt_id, q3))
        .json(&json!({ "answer": { "kind": "choices", "value": ["A", "B"] } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // 3. Time passes, the anchor decides remaining time
    f.clock.advance(Duration::seconds(90));
    let body: Value = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["remaining_seconds"], 3510);

    // 4. Submit, then submit again
    let response = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["already_submitted"], false);
    assert_eq!(body["attempt"]["status"], "evaluated");
    assert_eq!(body["attempt"]["total_marks_obtained"], 4.0);
    assert_eq!(body["attempt"]["result"], "pass");

    let body: Value = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["already_submitted"], true);

    // 5. Answers are closed, reopening redirects to results
    let response = client
        .put(format!("{}/api/attempts/{}/answers/{}", address, attempt_id, q1))
        .json(&json!({ "answer": { "kind": "choice", "value": "A" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let body = start(&client, &address, f.exam.id, 42).await;
    assert_eq!(body["state"], "finished");
    assert_eq!(body["attempt"]["id"], attempt_id);
}

#[tokio::test]
async fn start_outside_window_is_forbidden() {
    let f = fixture().await;
    let address = spawn_app(&f).await;
    let client = reqwest::Client::new();

    f.clock.set(f.exam.end_time + Duration::minutes(1));
    let response = client
        .post(format!("{}/api/exams/{}/attempts", address, f.exam.id))
        .json(&json!({ "student_id": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .post(format!("{}/api/exams/{}/attempts", address, 9_999))
        .json(&json!({ "student_id": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn mismatched_answers_are_rejected() {
    let f = fixture().await;
    let address = spawn_app(&f).await;
    let client = reqwest::Client::new();

    let body = start(&client, &address, f.exam.id, 42).await;
    let attempt_id = body["attempt"]["id"].as_i64().unwrap();

    // Wrong shape for an mcq
    let response = client
        .put(format!(
            "{}/api/attempts/{}/answers/{}",
            address, attempt_id, f.questions[0].id
        ))
        .json(&json!({ "answer": { "kind": "text", "value": "Rome" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Not on this paper
    let response = client
        .put(format!("{}/api/attempts/{}/answers/{}", address, attempt_id, 9_999))
        .json(&json!({ "answer": { "kind": "choice", "value": "A" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn regrade_requires_a_submitted_attempt() {
    let f = fixture().await;
    let address = spawn_app(&f).await;
    let client = reqwest::Client::new();

    let body = start(&client, &address, f.exam.id, 42).await;
    let attempt_id = body["attempt"]["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/attempts/{}/regrade", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/attempts/{}/regrade", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempt"]["status"], "evaluated");
    assert_eq!(body["attempt"]["total_marks_obtained"], 0.0);
}

#[tokio::test]
async fn shuffle_paper_works() {
    let f = fixture().await;
    let address = spawn_app(&f).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/papers/{}/shuffle", address, f.paper.id))
        .json(&json!({ "shuffle_questions": true, "shuffle_mcq_options": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["paper"]["title"], "Test 1 (Shuffled A)");
    assert_eq!(body["paper"]["status"], "draft");
    assert_eq!(body["question_count"], 5);
    let new_id = body["paper"]["id"].as_i64().unwrap();

    let body: Value = client
        .get(format!("{}/api/papers/{}/questions", address, new_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 5);
    let orders: Vec<i64> = questions
        .iter()
        .map(|q| q["display_order"].as_i64().unwrap())
        .collect();
    assert_eq!(orders, vec![1, 2, 3, 4, 5]);
    assert!(questions.iter().all(|q| q.get("correct_answer").is_none()));

    let body: Value = client
        .get(format!("{}/api/papers/{}/questions", address, f.paper.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["paper"]["has_versions"], true);
}

#[tokio::test]
async fn shuffle_paper_without_flags_fails() {
    let f = fixture().await;
    let address = spawn_app(&f).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/papers/{}/shuffle", address, f.paper.id))
        .json(&json!({ "shuffle_questions": false, "shuffle_mcq_options": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .get(format!("{}/api/papers/{}/questions", address, 9_999))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
