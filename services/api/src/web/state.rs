//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use verse_companion_core::ports::{DatabaseService, ReflectionService, VerseProvider};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub verses: Arc<dyn VerseProvider>,
    pub reflection: Arc<dyn ReflectionService>,
    pub config: Arc<Config>,
}
