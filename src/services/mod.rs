// src/services/mod.rs

pub mod answer_store;
pub mod cloner;
pub mod grading;
pub mod session;
pub mod shuffle;
pub mod submission;
pub mod version;

use std::sync::Arc;

use crate::{
    services::{
        answer_store::AnswerStore, cloner::PaperCloner, grading::Grader,
        submission::SubmissionCoordinator,
    },
    store::Store,
    utils::clock::Clock,
};

/// The collaborators every engine component is built from.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub grader: Arc<dyn Grader>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, grader: Arc<dyn Grader>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            grader,
            clock,
        }
    }

    pub fn answer_store(&self) -> AnswerStore {
        AnswerStore::new(self.store.clone())
    }

    pub fn coordinator(&self) -> SubmissionCoordinator {
        SubmissionCoordinator::new(self.store.clone(), self.grader.clone(), self.clock.clone())
    }

    pub fn cloner(&self) -> PaperCloner {
        PaperCloner::new(self.store.clone())
    }
}
