// src/models/paper.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::models::question::{Question, QuestionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "paper_status", rename_all = "lowercase")]
pub enum PaperStatus {
    Draft,
    Final,
}

/// Represents the 'question_papers' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionPaper {
    pub id: i64,
    pub title: String,
    pub school_id: Option<i64>,
    pub class_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub status: PaperStatus,

    /// How this paper was produced, not an instruction for later use.
    pub shuffle_questions: bool,
    pub shuffle_mcq_options: bool,

    /// Set once at least one shuffled copy has been derived from this paper.
    pub has_versions: bool,

    pub template_id: Option<i64>,
    pub difficulty_distribution: Option<Json<serde_json::Value>>,
    pub lesson_coverage: Option<Json<serde_json::Value>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A per-paper option order together with the answer key that indexes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuffledOptions {
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// A question as it appears inside one paper: the bank entry plus the
/// paper-local presentation data from the 'question_paper_questions' row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperQuestion {
    pub display_order: i32,
    pub question: Question,
    pub shuffled_options: Option<ShuffledOptions>,
    pub shuffled_answer_options: Option<Vec<String>>,
}

impl PaperQuestion {
    /// The option list that is authoritative for this paper.
    pub fn effective_options(&self) -> &[String] {
        match &self.shuffled_options {
            Some(shuffled) => &shuffled.options,
            None => &self.question.options,
        }
    }

    /// The answer key matching [`Self::effective_options`].
    pub fn effective_correct_answer(&self) -> &str {
        match &self.shuffled_options {
            Some(shuffled) => &shuffled.correct_answer,
            None => &self.question.correct_answer,
        }
    }

    pub fn effective_answer_options(&self) -> &[String] {
        match &self.shuffled_answer_options {
            Some(shuffled) => shuffled,
            None => &self.question.answer_options,
        }
    }

    /// Strips the answer key for presentation to a student.
    pub fn to_public(&self) -> PublicPaperQuestion {
        PublicPaperQuestion {
            id: self.question.id,
            display_order: self.display_order,
            question_type: self.question.question_type,
            content: self.question.content.clone(),
            options: self.effective_options().to_vec(),
            answer_options: self.effective_answer_options().to_vec(),
            marks: self.question.marks,
        }
    }
}

/// DTO for sending a paper question to a student (no answer key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicPaperQuestion {
    pub id: i64,
    pub display_order: i32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<String>,
    pub answer_options: Vec<String>,
    pub marks: f64,
}

/// Insert payload for a new paper.
#[derive(Debug, Clone)]
pub struct NewQuestionPaper {
    pub title: String,
    pub school_id: Option<i64>,
    pub class_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub status: PaperStatus,
    pub shuffle_questions: bool,
    pub shuffle_mcq_options: bool,
    pub has_versions: bool,
    pub template_id: Option<i64>,
    pub difficulty_distribution: Option<serde_json::Value>,
    pub lesson_coverage: Option<serde_json::Value>,
}

/// Insert payload for one 'question_paper_questions' row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaperQuestion {
    pub question_id: i64,
    pub display_order: i32,
    pub shuffled_options: Option<ShuffledOptions>,
    pub shuffled_answer_options: Option<Vec<String>>,
}

/// DTO for requesting a shuffled copy of a paper.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = validate_shuffle_flags))]
pub struct ShufflePaperRequest {
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_mcq_options: bool,
}

/// At least one kind of shuffle must be requested.
fn validate_shuffle_flags(req: &ShufflePaperRequest) -> Result<(), validator::ValidationError> {
    if !req.shuffle_questions && !req.shuffle_mcq_options {
        return Err(validator::ValidationError::new("no_shuffle_selected")
            .with_message("Select question order and/or option shuffling".into()));
    }
    Ok(())
}
