// src/services/cloner.rs

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::paper::{
        NewPaperQuestion, NewQuestionPaper, PaperQuestion, PaperStatus, QuestionPaper,
        ShufflePaperRequest,
    },
    services::{
        shuffle::{shuffle_options, shuffle_question_order},
        version::{next_version_title, sibling_prefix},
    },
    store::Store,
};

#[derive(Debug, Clone, Serialize)]
pub struct ClonedPaper {
    pub source_paper_id: i64,
    pub paper: QuestionPaper,
    pub question_count: usize,
}

/// Builds the question rows of a shuffled copy: optional reordering, then
/// optional option shuffles, then a dense `display_order` of 1..=N.
pub fn plan_questions<R: Rng + ?Sized>(
    questions: Vec<PaperQuestion>,
    request: &ShufflePaperRequest,
    rng: &mut R,
) -> Vec<NewPaperQuestion> {
    let ordered = if request.shuffle_questions {
        shuffle_question_order(questions, rng)
    } else {
        questions
    };

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, question)| {
            let option_shuffle = if request.shuffle_mcq_options {
                shuffle_options(&question, rng)
            } else {
                None
            };
            let (shuffled_options, shuffled_answer_options) = match option_shuffle {
                Some(s) => (Some(s.shuffled_options), s.shuffled_answer_options),
                None => (None, None),
            };

            NewPaperQuestion {
                question_id: question.question.id,
                display_order: i as i32 + 1,
                shuffled_options,
                shuffled_answer_options,
            }
        })
        .collect()
}

/// Persists shuffled copies of finalized papers under a fresh version title.
#[derive(Clone)]
pub struct PaperCloner {
    store: Arc<dyn Store>,
}

impl PaperCloner {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates a draft copy of `source_id` shuffled as `request` asks.
    ///
    /// Two concurrent calls for the same source may compute the same title;
    /// the sibling scan is not transactional.
    pub async fn clone_shuffled<R: Rng + Send + ?Sized>(
        &self,
        source_id: i64,
        request: &ShufflePaperRequest,
        rng: &mut R,
    ) -> Result<ClonedPaper, AppError> {
        request.validate()?;

        let source = self
            .store
            .get_paper(source_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Paper {} not found", source_id)))?;
        if source.status != PaperStatus::Final {
            return Err(AppError::BadRequest(
                "Only finalized papers can be shuffled".to_string(),
            ));
        }

        let questions = self.store.paper_questions(source_id).await?;
        if questions.is_empty() {
            return Err(AppError::BadRequest(
                "Paper has no questions to shuffle".to_string(),
            ));
        }

        let siblings = self
            .store
            .titles_with_prefix(sibling_prefix(&source.title))
            .await?;
        let title = next_version_title(&source.title, &siblings)?;

        let rows = plan_questions(questions, request, rng);
        let new_paper = NewQuestionPaper {
            title,
            school_id: source.school_id,
            class_id: source.class_id,
            subject_id: source.subject_id,
            status: PaperStatus::Draft,
            shuffle_questions: request.shuffle_questions,
            shuffle_mcq_options: request.shuffle_mcq_options,
            has_versions: false,
            template_id: source.template_id,
            difficulty_distribution: source.difficulty_distribution.as_ref().map(|j| j.0.clone()),
            lesson_coverage: source.lesson_coverage.as_ref().map(|j| j.0.clone()),
        };

        let paper = self.store.create_paper(&new_paper, &rows).await?;
        tracing::info!(
            source_paper_id = source_id,
            paper_id = paper.id,
            title = %paper.title,
            "Shuffled paper created"
        );

        if let Err(e) = self.store.mark_has_versions(source_id).await {
            tracing::warn!(source_paper_id = source_id, "Failed to flag source versions: {}", e);
        }

        Ok(ClonedPaper {
            source_paper_id: source_id,
            paper,
            question_count: rows.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Question, QuestionType};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sqlx::types::Json;

    fn paper(n: i64) -> Vec<PaperQuestion> {
        (1..=n)
            .map(|id| PaperQuestion {
                display_order: id as i32,
                question: Question {
                    id,
                    question_type: if id % 2 == 0 {
                        QuestionType::ShortAnswer
                    } else {
                        QuestionType::Mcq
                    },
                    content: format!("Q{}", id),
                    options: Json(vec!["a".into(), "b".into(), "c".into()]),
                    answer_options: Json(Vec::new()),
                    correct_answer: "A".to_string(),
                    marks: 1.0,
                    negative_marks: 0.0,
                },
                shuffled_options: None,
                shuffled_answer_options: None,
            })
            .collect()
    }

    #[test]
    fn display_order_is_dense_after_reorder() {
        let mut rng = StdRng::seed_from_u64(11);
        let request = ShufflePaperRequest {
            shuffle_questions: true,
            shuffle_mcq_options: false,
        };
        let rows = plan_questions(paper(8), &request, &mut rng);

        let orders: Vec<i32> = rows.iter().map(|r| r.display_order).collect();
        assert_eq!(orders, (1..=8).collect::<Vec<_>>());
        let mut ids: Vec<i64> = rows.iter().map(|r| r.question_id).collect();
        ids.sort();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert!(rows.iter().all(|r| r.shuffled_options.is_none()));
    }

    #[test]
    fn option_shuffle_only_keeps_order_and_touches_mcq() {
        let mut rng = StdRng::seed_from_u64(12);
        let request = ShufflePaperRequest {
            shuffle_questions: false,
            shuffle_mcq_options: true,
        };
        let rows = plan_questions(paper(4), &request, &mut rng);

        let ids: Vec<i64> = rows.iter().map(|r| r.question_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(rows[0].shuffled_options.is_some());
        assert!(rows[1].shuffled_options.is_none());
        assert!(rows[2].shuffled_options.is_some());
    }
}
