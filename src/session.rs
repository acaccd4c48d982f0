//! Process-wide session slot
//!
//! Created once at startup and handed to the orchestrator, which is its only
//! writer. Any collaborator may hold a clone and read it. Last writer wins.

use std::sync::{Arc, RwLock};

/// Shared "current conversation id" slot; empty string means none
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    current_conversation: Arc<RwLock<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_conversation(&self) -> String {
        self.current_conversation
            .read()
            .map(|id| id.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub(crate) fn set_current_conversation(&self, id: &str) {
        let mut slot = self
            .current_conversation
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = id.to_string();
    }
}
