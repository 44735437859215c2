//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use polls_core::ports::DatabaseService;
use polls_core::PollService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub polls: PollService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>) -> Self {
        let polls = PollService::new(db.clone(), config.recency_window);
        Self { db, polls, config }
    }
}
