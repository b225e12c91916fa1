// src/engine/deadline.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::{
    engine::{lifecycle::AttemptLifecycleController, timer::CountdownTimer},
    error::AppError,
    models::attempt::{Attempt, QuizResult, SubmittedAnswers},
};

type Timers = Arc<Mutex<HashMap<String, CountdownTimer>>>;

/// Owns one [`CountdownTimer`] per timed attempt and auto-submits the
/// attempt's cached answers when its deadline passes.
pub struct DeadlineScheduler {
    engine: Arc<AttemptLifecycleController>,
    timers: Timers,
}

impl DeadlineScheduler {
    pub fn new(engine: Arc<AttemptLifecycleController>) -> Self {
        Self {
            engine,
            timers: Arc::default(),
        }
    }

    /// Arms the auto-submit countdown for an attempt.
    pub fn arm(&self, attempt_id: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        // Round up so the auto-submit never lands before the deadline.
        let millis = (expires_at - now).num_milliseconds().max(0) as u64;
        let seconds = millis.div_ceil(1000);

        let engine = Arc::clone(&self.engine);
        let timers = Arc::clone(&self.timers);
        let id = attempt_id.to_string();

        // Held across start + insert so the expiry action cannot remove
        // its entry before it exists.
        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);

        let timer = CountdownTimer::start(seconds, move || async move {
            match engine.auto_submit(&id, expires_at).await {
                Ok(result) => tracing::info!(
                    attempt_id = %id,
                    score = result.score_percent,
                    "Auto-submitted quiz attempt at deadline"
                ),
                Err(e) => tracing::warn!(attempt_id = %id, "Auto-submit skipped: {}", e),
            }
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
        });

        if let Some(previous) = guard.insert(attempt_id.to_string(), timer) {
            previous.cancel();
        }
    }

    /// Cancels the countdown ahead of a manual submit.
    /// Returns `false` only when the auto-submit has already claimed the attempt.
    pub fn disarm(&self, attempt_id: &str) -> bool {
        let timer = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(attempt_id);

        match timer {
            Some(timer) => timer.cancel(),
            None => true,
        }
    }

    /// Whether a countdown (or its auto-submit) still owns the attempt.
    pub fn is_armed(&self, attempt_id: &str) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(attempt_id)
    }

    /// Seconds left on the attempt's live countdown.
    pub fn remaining(&self, attempt_id: &str) -> Option<u64> {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(attempt_id)
            .map(CountdownTimer::remaining)
    }

    /// Number of attempts with a live countdown.
    pub fn armed(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Manual submission. The countdown is cancelled first; if the
    /// auto-submit already claimed the attempt this fails with `InvalidState`.
    /// When grading or persistence fails the countdown is re-armed, so the
    /// deadline still auto-submits the saved answers.
    pub async fn submit(
        &self,
        attempt: &Attempt,
        answers: SubmittedAnswers,
        now: DateTime<Utc>,
    ) -> Result<QuizResult, AppError> {
        if !self.disarm(&attempt.id) {
            return Err(AppError::InvalidState(
                "This quiz attempt was auto-submitted at its deadline".to_string(),
            ));
        }

        let outcome = self.engine.submit_attempt(&attempt.id, answers, now).await;

        if let (Err(e), Some(expires_at)) = (&outcome, attempt.expires_at) {
            if !matches!(e, AppError::InvalidState(_)) {
                tracing::warn!(attempt_id = %attempt.id, "Submission failed, re-arming deadline");
                self.arm(&attempt.id, expires_at, now);
            }
        }
        outcome
    }

    /// Expires the attempt unless its countdown is still pending; an armed
    /// attempt is auto-submitted with its saved answers instead.
    pub async fn check_expiry(&self, attempt_id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.is_armed(attempt_id) {
            return Ok(());
        }
        self.engine.check_expiry(attempt_id, now).await
    }

    /// Expires every overdue attempt that no countdown owns.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        self.engine
            .sweep_expired(now, |attempt_id| self.is_armed(attempt_id))
            .await
    }
}

/// Periodically expires attempts whose deadline passed without any
/// submission, e.g. those whose countdown was lost on restart.
pub fn spawn_expiry_sweeper(scheduler: Arc<DeadlineScheduler>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = scheduler.sweep(Utc::now()).await {
                tracing::error!("Expiry sweep failed: {}", e);
            }
        }
    })
}
