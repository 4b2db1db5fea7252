// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        answer::{AnswerGrade, ExamAnswer, StudentAnswer},
        attempt::{Evaluation, ExamAttempt, SubmitTransition},
        exam::Exam,
        paper::{NewPaperQuestion, NewQuestionPaper, PaperQuestion, QuestionPaper, ShuffledOptions},
        question::{Question, QuestionType},
    },
    store::Store,
};

const ATTEMPT_COLUMNS: &str = "id, exam_id, student_id, status, started_at, submitted_at, \
     total_marks_obtained, percentage, result";

const ANSWER_COLUMNS: &str = "attempt_id, question_id, student_answer, marks_allocated, \
     is_correct, marks_obtained, evaluated_by, evaluated_at";

const PAPER_COLUMNS: &str = "id, title, school_id, class_id, subject_id, status, \
     shuffle_questions, shuffle_mcq_options, has_versions, template_id, \
     difficulty_distribution, lesson_coverage, created_at";

/// Helper row for the paper/question join.
#[derive(FromRow)]
struct PaperQuestionRow {
    display_order: i32,
    shuffled_options: Option<Json<ShuffledOptions>>,
    shuffled_answer_options: Option<Json<Vec<String>>>,
    id: i64,
    question_type: QuestionType,
    content: String,
    options: Json<Vec<String>>,
    answer_options: Json<Vec<String>>,
    correct_answer: String,
    marks: f64,
    negative_marks: f64,
}

impl From<PaperQuestionRow> for PaperQuestion {
    fn from(row: PaperQuestionRow) -> Self {
        PaperQuestion {
            display_order: row.display_order,
            shuffled_options: row.shuffled_options.map(|j| j.0),
            shuffled_answer_options: row.shuffled_answer_options.map(|j| j.0),
            question: Question {
                id: row.id,
                question_type: row.question_type,
                content: row.content,
                options: row.options,
                answer_options: row.answer_options,
                correct_answer: row.correct_answer,
                marks: row.marks,
                negative_marks: row.negative_marks,
            },
        }
    }
}

/// PostgreSQL-backed [`Store`]. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_attempt(&self, attempt_id: i64) -> Result<ExamAttempt, AppError> {
        self.get_attempt(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"
            SELECT id, title, question_paper_id, start_time, end_time,
                   duration_minutes, total_marks, passing_marks, status
            FROM exams
            WHERE id = $1
            "#,
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(exam)
    }

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<ExamAttempt>, AppError> {
        let attempt = sqlx::query_as::<_, ExamAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE id = $1"
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn find_attempt(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> Result<Option<ExamAttempt>, AppError> {
        let attempt = sqlx::query_as::<_, ExamAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE exam_id = $1 AND student_id = $2"
        ))
        .bind(exam_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn create_attempt(
        &self,
        exam_id: i64,
        student_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt, AppError> {
        // A concurrent insert for the same pair loses the race silently and
        // falls through to the SELECT below.
        sqlx::query(
            r#"
            INSERT INTO exam_attempts (exam_id, student_id, status, started_at)
            VALUES ($1, $2, 'in_progress', $3)
            ON CONFLICT (exam_id, student_id) DO NOTHING
            "#,
        )
        .bind(exam_id)
        .bind(student_id)
        .bind(started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create attempt: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        self.find_attempt(exam_id, student_id).await?.ok_or_else(|| {
            AppError::InternalServerError("Attempt vanished after insert".to_string())
        })
    }

    async fn start_attempt(
        &self,
        attempt_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt, AppError> {
        sqlx::query(
            r#"
            UPDATE exam_attempts
            SET status = 'in_progress', started_at = $2
            WHERE id = $1 AND status = 'not_started'
            "#,
        )
        .bind(attempt_id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        self.fetch_attempt(attempt_id).await
    }

    async fn mark_submitted(
        &self,
        attempt_id: i64,
        submitted_at: DateTime<Utc>,
    ) -> Result<SubmitTransition, AppError> {
        let updated = sqlx::query_as::<_, ExamAttempt>(&format!(
            r#"
            UPDATE exam_attempts
            SET status = 'submitted', submitted_at = $2
            WHERE id = $1 AND status IN ('not_started', 'in_progress')
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt_id)
        .bind(submitted_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to submit attempt {}: {:?}", attempt_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        match updated {
            Some(attempt) => Ok(SubmitTransition::Submitted(attempt)),
            None => Ok(SubmitTransition::AlreadyFinal(
                self.fetch_attempt(attempt_id).await?,
            )),
        }
    }

    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        answer: &StudentAnswer,
        marks_allocated: f64,
    ) -> Result<ExamAnswer, AppError> {
        // The WHERE on the attempt keeps terminal attempts read-only.
        let saved = sqlx::query_as::<_, ExamAnswer>(&format!(
            r#"
            INSERT INTO exam_answers (attempt_id, question_id, student_answer, marks_allocated)
            SELECT $1, $2, $3, $4
            FROM exam_attempts
            WHERE id = $1 AND status IN ('not_started', 'in_progress')
            ON CONFLICT (attempt_id, question_id) DO UPDATE SET
                student_answer = EXCLUDED.student_answer,
                marks_allocated = EXCLUDED.marks_allocated
            RETURNING {ANSWER_COLUMNS}
            "#
        ))
        .bind(attempt_id)
        .bind(question_id)
        .bind(Json(answer))
        .bind(marks_allocated)
        .fetch_optional(&self.pool)
        .await?;

        match saved {
            Some(row) => Ok(row),
            None => match self.get_attempt(attempt_id).await? {
                Some(_) => Err(AppError::Conflict(
                    "Attempt has already been submitted".to_string(),
                )),
                None => Err(AppError::NotFound(format!("Attempt {} not found", attempt_id))),
            },
        }
    }

    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<ExamAnswer>, AppError> {
        let answers = sqlx::query_as::<_, ExamAnswer>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM exam_answers WHERE attempt_id = $1 ORDER BY question_id"
        ))
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(answers)
    }

    async fn record_grades(&self, attempt_id: i64, grades: &[AnswerGrade]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for grade in grades {
            sqlx::query(
                r#"
                UPDATE exam_answers
                SET is_correct = $3, marks_obtained = $4, evaluated_by = $5, evaluated_at = $6
                WHERE attempt_id = $1 AND question_id = $2
                "#,
            )
            .bind(attempt_id)
            .bind(grade.question_id)
            .bind(grade.is_correct)
            .bind(grade.marks_obtained)
            .bind(&grade.evaluated_by)
            .bind(grade.evaluated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn finish_evaluation(
        &self,
        attempt_id: i64,
        evaluation: &Evaluation,
    ) -> Result<ExamAttempt, AppError> {
        sqlx::query_as::<_, ExamAttempt>(&format!(
            r#"
            UPDATE exam_attempts
            SET total_marks_obtained = $2, percentage = $3, result = $4, status = 'evaluated'
            WHERE id = $1
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt_id)
        .bind(evaluation.total_marks_obtained)
        .bind(evaluation.percentage)
        .bind(evaluation.result)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
    }

    async fn get_paper(&self, paper_id: i64) -> Result<Option<QuestionPaper>, AppError> {
        let paper = sqlx::query_as::<_, QuestionPaper>(&format!(
            "SELECT {PAPER_COLUMNS} FROM question_papers WHERE id = $1"
        ))
        .bind(paper_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(paper)
    }

    async fn paper_questions(&self, paper_id: i64) -> Result<Vec<PaperQuestion>, AppError> {
        let rows = sqlx::query_as::<_, PaperQuestionRow>(
            r#"
            SELECT
                pq.display_order,
                pq.shuffled_options,
                pq.shuffled_answer_options,
                q.id,
                q.question_type,
                q.content,
                q.options,
                q.answer_options,
                q.correct_answer,
                q.marks,
                q.negative_marks
            FROM question_paper_questions pq
            JOIN questions q ON q.id = pq.question_id
            WHERE pq.question_paper_id = $1
            ORDER BY pq.display_order
            "#,
        )
        .bind(paper_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions of paper {}: {:?}", paper_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(rows.into_iter().map(PaperQuestion::from).collect())
    }

    async fn titles_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        // Escape LIKE metacharacters so the prefix is matched literally.
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");

        let titles: Vec<String> =
            sqlx::query_scalar("SELECT title FROM question_papers WHERE title LIKE $1 ESCAPE '\\'")
                .bind(format!("{}%", escaped))
                .fetch_all(&self.pool)
                .await?;

        Ok(titles)
    }

    async fn create_paper(
        &self,
        paper: &NewQuestionPaper,
        questions: &[NewPaperQuestion],
    ) -> Result<QuestionPaper, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, QuestionPaper>(&format!(
            r#"
            INSERT INTO question_papers (
                title, school_id, class_id, subject_id, status,
                shuffle_questions, shuffle_mcq_options, has_versions,
                template_id, difficulty_distribution, lesson_coverage
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {PAPER_COLUMNS}
            "#
        ))
        .bind(&paper.title)
        .bind(paper.school_id)
        .bind(paper.class_id)
        .bind(paper.subject_id)
        .bind(paper.status)
        .bind(paper.shuffle_questions)
        .bind(paper.shuffle_mcq_options)
        .bind(paper.has_versions)
        .bind(paper.template_id)
        .bind(paper.difficulty_distribution.as_ref().map(Json))
        .bind(paper.lesson_coverage.as_ref().map(Json))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create paper '{}': {:?}", paper.title, e);
            AppError::InternalServerError(e.to_string())
        })?;

        for row in questions {
            sqlx::query(
                r#"
                INSERT INTO question_paper_questions (
                    question_paper_id, question_id, display_order,
                    shuffled_options, shuffled_answer_options
                )
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(created.id)
            .bind(row.question_id)
            .bind(row.display_order)
            .bind(row.shuffled_options.as_ref().map(Json))
            .bind(row.shuffled_answer_options.as_ref().map(Json))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn mark_has_versions(&self, paper_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE question_papers SET has_versions = TRUE WHERE id = $1")
            .bind(paper_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Paper {} not found", paper_id)));
        }
        Ok(())
    }
}
