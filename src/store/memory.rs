// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::{
        answer::{AnswerGrade, ExamAnswer, StudentAnswer},
        attempt::{AttemptStatus, Evaluation, ExamAttempt, SubmitTransition},
        exam::Exam,
        paper::{NewPaperQuestion, NewQuestionPaper, PaperQuestion, PaperStatus, QuestionPaper},
        question::Question,
    },
    store::Store,
};

#[derive(Default)]
struct Tables {
    exams: HashMap<i64, Exam>,
    questions: HashMap<i64, Question>,
    papers: BTreeMap<i64, QuestionPaper>,
    paper_questions: HashMap<i64, Vec<NewPaperQuestion>>,
    attempts: BTreeMap<i64, ExamAttempt>,
    answers: BTreeMap<(i64, i64), ExamAnswer>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process [`Store`]. Bank records (exams, questions, papers) are loaded
/// through the `insert_*` helpers.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_answer_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every answer write fail as if the connection dropped.
    pub fn set_answer_writes_failing(&self, failing: bool) {
        self.fail_answer_writes.store(failing, Ordering::SeqCst);
    }

    /// Stores an exam. An `id` of 0 is replaced by a fresh one.
    pub async fn insert_exam(&self, mut exam: Exam) -> Exam {
        let mut t = self.tables.lock().await;
        if exam.id == 0 {
            exam.id = t.next_id();
        }
        t.exams.insert(exam.id, exam.clone());
        exam
    }

    /// Stores a bank question. An `id` of 0 is replaced by a fresh one.
    pub async fn insert_question(&self, mut question: Question) -> Question {
        let mut t = self.tables.lock().await;
        if question.id == 0 {
            question.id = t.next_id();
        }
        t.questions.insert(question.id, question.clone());
        question
    }

    /// Stores an attempt as-is, e.g. one pre-created in `not_started`.
    pub async fn insert_attempt(&self, mut attempt: ExamAttempt) -> ExamAttempt {
        let mut t = self.tables.lock().await;
        if attempt.id == 0 {
            attempt.id = t.next_id();
        }
        t.attempts.insert(attempt.id, attempt.clone());
        attempt
    }

    /// Finalizes or reopens a paper.
    pub async fn set_paper_status(&self, paper_id: i64, status: PaperStatus) {
        let mut t = self.tables.lock().await;
        if let Some(paper) = t.papers.get_mut(&paper_id) {
            paper.status = status;
        }
    }

    pub async fn paper_rows(&self, paper_id: i64) -> Vec<NewPaperQuestion> {
        let t = self.tables.lock().await;
        t.paper_questions.get(&paper_id).cloned().unwrap_or_default()
    }
}

fn attempt_not_found(attempt_id: i64) -> AppError {
    AppError::NotFound(format!("Attempt {} not found", attempt_id))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.tables.lock().await.exams.get(&exam_id).cloned())
    }

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<ExamAttempt>, AppError> {
        Ok(self.tables.lock().await.attempts.get(&attempt_id).cloned())
    }

    async fn find_attempt(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamAttempt>, AppError> {
        let t = self.tables.lock().await;
        Ok(t
            .attempts
            .values()
            .find(|a| a.exam_id == exam_id && a.student_id == student_id)
            .cloned())
    }

    async fn create_attempt(
        &self,
        exam_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt, AppError> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t
            .attempts
            .values()
            .find(|a| a.exam_id == exam_id && a.student_id == student_id)
        {
            return Ok(existing.clone());
        }

        let attempt = ExamAttempt {
            id: t.next_id(),
            exam_id,
            student_id,
            status: AttemptStatus::InProgress,
            started_at: Some(started_at),
            submitted_at: None,
            total_marks_obtained: None,
            percentage: None,
            result: None,
        };
        t.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn start_attempt(
        &self,
        attempt_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt, AppError> {
        let mut t = self.tables.lock().await;
        let attempt = t
            .attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| attempt_not_found(attempt_id))?;
        if attempt.status == AttemptStatus::NotStarted {
            attempt.status = AttemptStatus::InProgress;
            attempt.started_at = Some(started_at);
        }
        Ok(attempt.clone())
    }

    async fn mark_submitted(
        &self,
        attempt_id: i64,
        submitted_at: DateTime<Utc>,
    ) -> Result<SubmitTransition, AppError> {
        let mut t = self.tables.lock().await;
        let attempt = t
            .attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| attempt_not_found(attempt_id))?;
        if attempt.status.is_terminal() {
            return Ok(SubmitTransition::AlreadyFinal(attempt.clone()));
        }
        attempt.status = AttemptStatus::Submitted;
        attempt.submitted_at = Some(submitted_at);
        Ok(SubmitTransition::Submitted(attempt.clone()))
    }

    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        answer: &StudentAnswer,
        marks_allocated: f64,
    ) -> Result<ExamAnswer, AppError> {
        if self.fail_answer_writes.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "answer write failed: connection reset".to_string(),
            ));
        }

        let mut t = self.tables.lock().await;
        let attempt = t
            .attempts
            .get(&attempt_id)
            .ok_or_else(|| attempt_not_found(attempt_id))?;
        if attempt.status.is_terminal() {
            return Err(AppError::Conflict("Attempt has already been submitted".to_string()));
        }

        let row = ExamAnswer {
            attempt_id,
            question_id,
            student_answer: Json(answer.clone()),
            marks_allocated,
            is_correct: None,
            marks_obtained: None,
            evaluated_by: None,
            evaluated_at: None,
        };
        t.answers.insert((attempt_id, question_id), row.clone());
        Ok(row)
    }

    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<ExamAnswer>, AppError> {
        let t = self.tables.lock().await;
        Ok(t
            .answers
            .range((attempt_id, i64::MIN)..=(attempt_id, i64::MAX))
            .map(|(_, answer)| answer.clone())
            .collect())
    }

    async fn record_grades(&self, attempt_id: i64, grades: &[AnswerGrade]) -> Result<(), AppError> {
        let mut t = self.tables.lock().await;
        for grade in grades {
            if let Some(row) = t.answers.get_mut(&(attempt_id, grade.question_id)) {
                row.is_correct = Some(grade.is_correct);
                row.marks_obtained = Some(grade.marks_obtained);
                row.evaluated_by = Some(grade.evaluated_by.clone());
                row.evaluated_at = Some(grade.evaluated_at);
            }
        }
        Ok(())
    }

    async fn finish_evaluation(
        &self,
        attempt_id: i64,
        evaluation: &Evaluation,
    ) -> Result<ExamAttempt, AppError> {
        let mut t = self.tables.lock().await;
        let attempt = t
            .attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| attempt_not_found(attempt_id))?;
        attempt.total_marks_obtained = Some(evaluation.total_marks_obtained);
        attempt.percentage = Some(evaluation.percentage);
        attempt.result = Some(evaluation.result);
        attempt.status = AttemptStatus::Evaluated;
        Ok(attempt.clone())
    }

    async fn get_paper(&self, paper_id: i64) -> Result<Option<QuestionPaper>, AppError> {
        Ok(self.tables.lock().await.papers.get(&paper_id).cloned())
    }

    async fn paper_questions(&self, paper_id: i64) -> Result<Vec<PaperQuestion>, AppError> {
        let t = self.tables.lock().await;
        let Some(rows) = t.paper_questions.get(&paper_id) else {
            return Ok(Vec::new());
        };

        let mut questions = rows
            .iter()
            .map(|row| {
                let question = t.questions.get(&row.question_id).cloned().ok_or_else(|| {
                    AppError::InternalServerError(format!(
                        "Paper {} references missing question {}",
                        paper_id, row.question_id
                    ))
                })?;
                Ok(PaperQuestion {
                    display_order: row.display_order,
                    question,
                    shuffled_options: row.shuffled_options.clone(),
                    shuffled_answer_options: row.shuffled_answer_options.clone(),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        questions.sort_by_key(|q| q.display_order);
        Ok(questions)
    }

    async fn titles_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let t = self.tables.lock().await;
        Ok(t
            .papers
            .values()
            .filter(|p| p.title.starts_with(prefix))
            .map(|p| p.title.clone())
            .collect())
    }

    async fn create_paper(
        &self,
        paper: &NewQuestionPaper,
        questions: &[NewPaperQuestion],
    ) -> Result<QuestionPaper, AppError> {
        let mut t = self.tables.lock().await;
        if let Some(missing) = questions
            .iter()
            .find(|q| !t.questions.contains_key(&q.question_id))
        {
            return Err(AppError::BadRequest(format!(
                "Question {} does not exist",
                missing.question_id
            )));
        }

        let created = QuestionPaper {
            id: t.next_id(),
            title: paper.title.clone(),
            school_id: paper.school_id,
            class_id: paper.class_id,
            subject_id: paper.subject_id,
            status: paper.status,
            shuffle_questions: paper.shuffle_questions,
            shuffle_mcq_options: paper.shuffle_mcq_options,
            has_versions: paper.has_versions,
            template_id: paper.template_id,
            difficulty_distribution: paper.difficulty_distribution.clone().map(Json),
            lesson_coverage: paper.lesson_coverage.clone().map(Json),
            created_at: Some(Utc::now()),
        };
        t.papers.insert(created.id, created.clone());
        t.paper_questions.insert(created.id, questions.to_vec());
        Ok(created)
    }

    async fn mark_has_versions(&self, paper_id: i64) -> Result<(), AppError> {
        let mut t = self.tables.lock().await;
        let paper = t
            .papers
            .get_mut(&paper_id)
            .ok_or_else(|| AppError::NotFound(format!("Paper {} not found", paper_id)))?;
        paper.has_versions = true;
        Ok(())
    }
}
