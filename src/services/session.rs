// src/services/session.rs

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{
    config::TICK_INTERVAL,
    error::AppError,
    models::{
        answer::StudentAnswer,
        attempt::{AttemptStatus, ExamAttempt},
        exam::Exam,
        paper::PaperQuestion,
    },
    services::{
        Services,
        answer_store::{AnswerStore, SaveStatus},
        submission::{SubmissionCoordinator, SubmitOutcome},
    },
    store::Store,
    utils::clock::{Clock, remaining_seconds},
};

/// Result of opening an exam for a student.
pub enum SessionStart {
    /// The attempt is running; answers and timer are live.
    Active(AttemptSession),
    /// The attempt is already submitted or evaluated. Show results instead.
    Finished(ExamAttempt),
}

/// What a tick decided.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TickEvent {
    Running,
    /// Time ran out and this tick submitted the attempt.
    AutoSubmitted(SubmitOutcome),
    /// Another submit is in flight.
    Submitting,
    /// The attempt was submitted earlier.
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickSnapshot {
    pub remaining_seconds: i64,
    pub answered: usize,
    #[serde(flatten)]
    pub event: TickEvent,
}

impl TickSnapshot {
    pub fn is_final(&self) -> bool {
        matches!(self.event, TickEvent::AutoSubmitted(_) | TickEvent::Finished)
    }
}

/// Published by a [`Ticker`] after every tick.
#[derive(Debug, Clone)]
pub enum TickUpdate {
    Tick(TickSnapshot),
    /// Auto-submit failed; the next tick retries.
    Failed(String),
}

struct SessionInner {
    exam: Exam,
    attempt: ExamAttempt,
    started_at: DateTime<Utc>,
    questions: Vec<PaperQuestion>,
    responses: Mutex<BTreeMap<i64, StudentAnswer>>,
    /// Set by whichever path (timer or student) starts submitting first.
    submit_started: AtomicBool,
    submitted: AtomicBool,
    answers: AnswerStore,
    coordinator: SubmissionCoordinator,
    clock: Arc<dyn Clock>,
}

/// One student's running attempt: timing, answers and submission.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AttemptSession {
    inner: Arc<SessionInner>,
}

impl AttemptSession {
    /// Opens (or resumes) the attempt of `student_id` at `exam_id`.
    ///
    /// * Outside the exam window this fails with `OutOfWindow`.
    /// * The attempt is created on first access; an existing one is reused.
    /// * A terminal attempt yields [`SessionStart::Finished`].
    /// * Saved answers are loaded so a reload resumes where it left off.
    pub async fn initialize(
        services: &Services,
        exam_id: i64,
        student_id: i64,
    ) -> Result<SessionStart, AppError> {
        let store: &Arc<dyn Store> = &services.store;
        let now = services.clock.now();

        let exam = store
            .get_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;

        if !exam.is_open_at(now) {
            let reason = if now < exam.start_time {
                "Exam has not started yet"
            } else {
                "Exam has ended"
            };
            return Err(AppError::OutOfWindow(reason.to_string()));
        }

        let mut attempt = match store.find_attempt(exam_id, student_id).await? {
            Some(existing) => existing,
            None => {
                let created = store.create_attempt(exam_id, student_id, now).await?;
                tracing::info!(attempt_id = created.id, exam_id, student_id, "Attempt created");
                created
            }
        };

        if attempt.status.is_terminal() {
            tracing::info!(attempt_id = attempt.id, status = ?attempt.status, "Attempt already final");
            return Ok(SessionStart::Finished(attempt));
        }
        if attempt.status == AttemptStatus::NotStarted {
            attempt = store.start_attempt(attempt.id, now).await?;
        }

        let started_at = match attempt.started_at {
            Some(at) => at,
            None => {
                tracing::warn!(attempt_id = attempt.id, "Attempt in progress without start time");
                now
            }
        };

        let questions = store.paper_questions(exam.question_paper_id).await?;
        let responses: BTreeMap<i64, StudentAnswer> = store
            .list_answers(attempt.id)
            .await?
            .into_iter()
            .map(|a| (a.question_id, a.student_answer.0))
            .collect();

        tracing::info!(
            attempt_id = attempt.id,
            questions = questions.len(),
            answered = responses.len(),
            "Attempt session ready"
        );

        Ok(SessionStart::Active(AttemptSession {
            inner: Arc::new(SessionInner {
                exam,
                attempt,
                started_at,
                questions,
                responses: Mutex::new(responses),
                submit_started: AtomicBool::new(false),
                submitted: AtomicBool::new(false),
                answers: services.answer_store(),
                coordinator: services.coordinator(),
                clock: services.clock.clone(),
            }),
        }))
    }

    pub fn attempt_id(&self) -> i64 {
        self.inner.attempt.id
    }

    /// The attempt as loaded when the session opened.
    pub fn attempt(&self) -> &ExamAttempt {
        &self.inner.attempt
    }

    pub fn exam(&self) -> &Exam {
        &self.inner.exam
    }

    /// Questions in `display_order`, with per-paper options applied.
    pub fn questions(&self) -> &[PaperQuestion] {
        &self.inner.questions
    }

    /// Seconds left, derived from the stored start time on every call.
    pub fn remaining_seconds(&self) -> i64 {
        remaining_seconds(
            self.inner.exam.duration_minutes,
            self.inner.started_at,
            self.inner.clock.now(),
        )
    }

    pub fn is_submitted(&self) -> bool {
        self.inner.submitted.load(Ordering::SeqCst)
    }

    pub fn answers(&self) -> BTreeMap<i64, StudentAnswer> {
        self.responses().clone()
    }

    /// Questions counted as answered, including saves not yet confirmed.
    pub fn answered_count(&self) -> usize {
        self.responses().len()
    }

    fn responses(&self) -> std::sync::MutexGuard<'_, BTreeMap<i64, StudentAnswer>> {
        self.inner
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records an answer locally and persists it best-effort.
    ///
    /// The answer counts as given even when the write is deferred.
    pub async fn save_answer(
        &self,
        question_id: i64,
        answer: StudentAnswer,
    ) -> Result<SaveStatus, AppError> {
        if self.is_submitted() {
            return Err(AppError::Conflict(
                "Attempt has already been submitted".to_string(),
            ));
        }

        let question = self
            .inner
            .questions
            .iter()
            .find(|q| q.question.id == question_id)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Question {} is not part of this exam", question_id))
            })?;
        if !answer.fits(question.question.question_type) {
            return Err(AppError::BadRequest(format!(
                "Answer shape does not match a {:?} question",
                question.question.question_type
            )));
        }
        let marks_allocated = question.question.marks;

        self.responses().insert(question_id, answer.clone());

        Ok(self
            .inner
            .answers
            .save_answer(self.attempt_id(), question_id, &answer, marks_allocated)
            .await)
    }

    /// Student-initiated submit. Safe to race with the timer or another tab.
    pub async fn submit(&self) -> Result<SubmitOutcome, AppError> {
        let armed_here = !self.inner.submit_started.swap(true, Ordering::SeqCst);

        match self.inner.coordinator.submit(self.attempt_id()).await {
            Ok(outcome) => {
                self.inner.submitted.store(true, Ordering::SeqCst);
                Ok(outcome)
            }
            Err(e) => {
                if armed_here {
                    self.inner.submit_started.store(false, Ordering::SeqCst);
                }
                Err(e)
            }
        }
    }

    /// One timer step. At zero remaining time the first tick submits; later
    /// ticks never submit again.
    pub async fn tick(&self) -> Result<TickSnapshot, AppError> {
        let remaining = self.remaining_seconds();
        let snapshot = |event| TickSnapshot {
            remaining_seconds: remaining,
            answered: self.answered_count(),
            event,
        };

        if self.is_submitted() {
            return Ok(snapshot(TickEvent::Finished));
        }
        if remaining > 0 {
            return Ok(snapshot(TickEvent::Running));
        }
        if self.inner.submit_started.swap(true, Ordering::SeqCst) {
            return Ok(snapshot(TickEvent::Submitting));
        }

        tracing::info!(attempt_id = self.attempt_id(), "Time is up, auto-submitting");
        match self.inner.coordinator.submit(self.attempt_id()).await {
            Ok(outcome) => {
                self.inner.submitted.store(true, Ordering::SeqCst);
                Ok(snapshot(TickEvent::AutoSubmitted(outcome)))
            }
            Err(e) => {
                self.inner.submit_started.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Starts the timer at the 1 Hz [`TICK_INTERVAL`].
    pub fn start_ticker(&self) -> Ticker {
        self.spawn_ticker(TICK_INTERVAL)
    }

    /// Starts the periodic timer for this session. The task lives as long as
    /// the returned [`Ticker`] and ends by itself once the attempt is final.
    pub fn spawn_ticker(&self, period: Duration) -> Ticker {
        let session = self.clone();
        let (tx, rx) = watch::channel(None);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let update = match session.tick().await {
                    Ok(snapshot) => TickUpdate::Tick(snapshot),
                    Err(e) => {
                        tracing::error!(
                            attempt_id = session.attempt_id(),
                            "Auto-submit failed: {}",
                            e
                        );
                        TickUpdate::Failed(e.to_string())
                    }
                };
                let done = matches!(&update, TickUpdate::Tick(s) if s.is_final());
                if tx.send(Some(update)).is_err() || done {
                    break;
                }
            }
        });

        Ticker { handle, updates: rx }
    }
}

/// Owns a session's timer task. Dropping it stops the timer.
pub struct Ticker {
    handle: JoinHandle<()>,
    updates: watch::Receiver<Option<TickUpdate>>,
}

impl Ticker {
    /// Latest tick, for re-rendering.
    pub fn updates(&self) -> watch::Receiver<Option<TickUpdate>> {
        self.updates.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the timer task.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
