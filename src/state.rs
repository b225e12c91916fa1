// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::engine::{AttemptLifecycleController, DeadlineScheduler, SqlAttemptStore, SqlQuestionBank};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: Arc<AttemptLifecycleController>,
    pub deadlines: Arc<DeadlineScheduler>,
}

impl AppState {
    /// Wires the engine to SQL-backed storage.
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let engine = Arc::new(AttemptLifecycleController::new(
            Arc::new(SqlQuestionBank::new(pool.clone())),
            Arc::new(SqlAttemptStore::new(pool)),
        ));
        let deadlines = Arc::new(DeadlineScheduler::new(Arc::clone(&engine)));

        Self {
            config,
            engine,
            deadlines,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<AttemptLifecycleController> {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for Arc<DeadlineScheduler> {
    fn from_ref(state: &AppState) -> Self {
        state.deadlines.clone()
    }
}
