// src/services/grading.rs

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    config::AUTO_EVALUATOR,
    error::AppError,
    models::{
        answer::{AnswerGrade, ExamAnswer, StudentAnswer},
        attempt::{AttemptResult, Evaluation, ExamAttempt},
        exam::Exam,
        paper::PaperQuestion,
        question::{QuestionType, letter_index, split_answer_key},
    },
    store::Store,
    utils::clock::Clock,
};

/// The evaluation collaborator invoked after an attempt is submitted.
///
/// Both entry points take only the attempt id and must be safe to call more
/// than once.
#[async_trait]
pub trait Grader: Send + Sync {
    /// Full evaluation: grades, totals, and `status = evaluated`.
    async fn process_submission(&self, attempt_id: i64) -> Result<(), AppError>;

    /// Objective-only pass, usable for regrading without a resubmission.
    async fn auto_grade_objective(&self, attempt_id: i64) -> Result<(), AppError>;
}

/// Calls the grading routines stored in the database by name.
#[derive(Clone)]
pub struct DbFunctionGrader {
    pool: PgPool,
}

impl DbFunctionGrader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Grader for DbFunctionGrader {
    async fn process_submission(&self, attempt_id: i64) -> Result<(), AppError> {
        sqlx::query("SELECT process_submission($1)")
            .bind(attempt_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn auto_grade_objective(&self, attempt_id: i64) -> Result<(), AppError> {
        sqlx::query("SELECT auto_grade_objective($1)")
            .bind(attempt_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Marks for one answer, or `None` when the question needs a human.
///
/// Correct answers earn `marks`, wrong ones lose `negative_marks`.
pub fn grade_answer(question: &PaperQuestion, answer: &StudentAnswer) -> Option<(bool, f64)> {
    let key = question.effective_correct_answer();
    let is_correct = match (question.question.question_type, answer) {
        (QuestionType::Mcq, StudentAnswer::Choice(label)) => {
            label.trim().eq_ignore_ascii_case(key.trim())
        }
        (QuestionType::TrueFalse, StudentAnswer::Choice(value)) => {
            value.trim().eq_ignore_ascii_case(key.trim())
        }
        (QuestionType::MultipleResponse, StudentAnswer::Choices(labels)) => {
            let picked: BTreeSet<String> = labels
                .iter()
                .map(|label| label.trim().to_ascii_uppercase())
                .collect();
            picked == key_set(key)
        }
        // A combination literal picked from `answer_options` has no stored key
        // to compare with; only a plain letter list is graded here.
        (QuestionType::MultipleResponse, StudentAnswer::Text(literal)) => {
            let picked = split_answer_key(literal);
            if picked.is_empty() || picked.iter().any(|label| letter_index(label).is_none()) {
                return None;
            }
            picked.into_iter().collect::<BTreeSet<_>>() == key_set(key)
        }
        (question_type, _) if question_type.is_objective() => false,
        _ => return None,
    };

    let marks = if is_correct {
        question.question.marks
    } else {
        -question.question.negative_marks
    };
    Some((is_correct, marks))
}

fn key_set(key: &str) -> BTreeSet<String> {
    split_answer_key(key).into_iter().collect()
}

/// Totals for a fully graded attempt. `None` while any answer still waits
/// for a human grade.
pub fn summarize(exam: &Exam, answers: &[ExamAnswer]) -> Option<Evaluation> {
    let mut total = 0.0;
    for answer in answers {
        total += answer.marks_obtained?;
    }

    let percentage = if exam.total_marks > 0.0 {
        total / exam.total_marks * 100.0
    } else {
        0.0
    };
    let result = if total >= exam.passing_marks {
        AttemptResult::Pass
    } else {
        AttemptResult::Fail
    };

    Some(Evaluation {
        total_marks_obtained: total,
        percentage,
        result,
    })
}

/// Objective grading over the [`Store`]. Subjective answers are left for a
/// human evaluator; the attempt stays `submitted` until they are graded.
#[derive(Clone)]
pub struct LocalGrader {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl LocalGrader {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Grades every objective answer and returns the attempt, its exam and
    /// the refreshed answers.
    async fn grade_objective(
        &self,
        attempt_id: i64,
    ) -> Result<(ExamAttempt, Exam, Vec<ExamAnswer>), AppError> {
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

        let exam = self
            .store
            .get_exam(attempt.exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", attempt.exam_id)))?;

        let questions: HashMap<i64, PaperQuestion> = self
            .store
            .paper_questions(exam.question_paper_id)
            .await?
            .into_iter()
            .map(|q| (q.question.id, q))
            .collect();

        let answers = self.store.list_answers(attempt_id).await?;
        let now = self.clock.now();
        let grades: Vec<AnswerGrade> = answers
            .iter()
            .filter_map(|answer| {
                let question = questions.get(&answer.question_id)?;
                let (is_correct, marks_obtained) = grade_answer(question, &answer.student_answer)?;
                Some(AnswerGrade {
                    question_id: answer.question_id,
                    is_correct,
                    marks_obtained,
                    evaluated_by: AUTO_EVALUATOR.to_string(),
                    evaluated_at: now,
                })
            })
            .collect();

        self.store.record_grades(attempt_id, &grades).await?;
        tracing::info!(attempt_id, graded = grades.len(), "Objective answers graded");

        let answers = self.store.list_answers(attempt_id).await?;
        Ok((attempt, exam, answers))
    }

    /// Full evaluation. Returns the attempt as stored afterwards.
    pub async fn evaluate(&self, attempt_id: i64) -> Result<ExamAttempt, AppError> {
        let (attempt, exam, answers) = self.grade_objective(attempt_id).await?;

        match summarize(&exam, &answers) {
            Some(evaluation) => {
                let evaluated = self.store.finish_evaluation(attempt_id, &evaluation).await?;
                tracing::info!(
                    attempt_id,
                    total = evaluation.total_marks_obtained,
                    result = ?evaluation.result,
                    "Attempt evaluated"
                );
                Ok(evaluated)
            }
            None => {
                tracing::info!(attempt_id, "Attempt awaits manual grading");
                Ok(attempt)
            }
        }
    }
}

#[async_trait]
impl Grader for LocalGrader {
    async fn process_submission(&self, attempt_id: i64) -> Result<(), AppError> {
        self.evaluate(attempt_id).await.map(|_| ())
    }

    async fn auto_grade_objective(&self, attempt_id: i64) -> Result<(), AppError> {
        self.grade_objective(attempt_id).await.map(|_| ())
    }
}
