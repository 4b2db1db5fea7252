// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use exam_engine::{
    models::{
        exam::{Exam, ExamStatus},
        paper::{NewPaperQuestion, NewQuestionPaper, PaperStatus, QuestionPaper},
        question::{Question, QuestionType},
    },
    services::{Services, grading::LocalGrader},
    store::{MemoryStore, Store},
    utils::clock::ManualClock,
};
use sqlx::types::Json;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub services: Services,
    pub exam: Exam,
    pub paper: QuestionPaper,
    pub questions: Vec<Question>,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn question(question_type: QuestionType, options: &[&str], key: &str, marks: f64) -> Question {
    Question {
        id: 0,
        question_type,
        content: format!("{:?} question", question_type),
        options: Json(options.iter().map(|s| s.to_string()).collect()),
        answer_options: Json(Vec::new()),
        correct_answer: key.to_string(),
        marks,
        negative_marks: 0.0,
    }
}

/// Five objective questions worth 8 marks in total.
pub fn objective_questions() -> Vec<Question> {
    vec![
        question(QuestionType::Mcq, &["Paris", "Rome", "Oslo", "Bern"], "B", 2.0),
        question(QuestionType::TrueFalse, &["True", "False"], "True", 1.0),
        question(QuestionType::MultipleResponse, &["2", "3", "4", "9"], "A,B", 2.0),
        question(QuestionType::Mcq, &["red", "green", "blue"], "C", 2.0),
        question(QuestionType::Mcq, &["1", "2", "3", "4"], "D", 1.0),
    ]
}

pub async fn fixture() -> Fixture {
    fixture_with(objective_questions()).await
}

/// A finalized paper "Test 1" and an exam on it that opened ten minutes
/// before the clock's current time.
pub async fn fixture_with(questions: Vec<Question>) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));

    let mut seeded = Vec::new();
    for q in questions {
        seeded.push(store.insert_question(q).await);
    }

    let total_marks: f64 = seeded.iter().map(|q| q.marks).sum();
    let rows: Vec<NewPaperQuestion> = seeded
        .iter()
        .enumerate()
        .map(|(i, q)| NewPaperQuestion {
            question_id: q.id,
            display_order: i as i32 + 1,
            shuffled_options: None,
            shuffled_answer_options: None,
        })
        .collect();

    let paper = store
        .create_paper(
            &NewQuestionPaper {
                title: "Test 1".to_string(),
                school_id: Some(1),
                class_id: Some(7),
                subject_id: Some(3),
                status: PaperStatus::Final,
                shuffle_questions: false,
                shuffle_mcq_options: false,
                has_versions: false,
                template_id: Some(42),
                difficulty_distribution: Some(serde_json::json!({"easy": 3, "hard": 2})),
                lesson_coverage: Some(serde_json::json!(["fractions"])),
            },
            &rows,
        )
        .await
        .unwrap();

    let exam = store
        .insert_exam(Exam {
            id: 0,
            title: "Spring test".to_string(),
            question_paper_id: paper.id,
            start_time: t0() - Duration::minutes(10),
            end_time: t0() + Duration::hours(2),
            duration_minutes: 60,
            total_marks,
            passing_marks: total_marks / 2.0,
            status: ExamStatus::Approved,
        })
        .await;

    let services = Services::new(
        store.clone(),
        Arc::new(LocalGrader::new(store.clone(), clock.clone())),
        clock.clone(),
    );

    Fixture {
        store,
        clock,
        services,
        exam,
        paper,
        questions: seeded,
    }
}
