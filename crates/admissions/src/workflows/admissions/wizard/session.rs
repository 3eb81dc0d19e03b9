use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::workflows::admissions::domain::StudentId;

/// Session key under which the wizard keeps its state.
pub const WIZARD_SESSION_KEY: &str = "application_wizard";

/// Per-student key/value session storage provided by the surrounding web stack.
pub trait SessionStore: Send + Sync {
    fn get(&self, owner: &StudentId, key: &str) -> Result<Option<Value>, SessionError>;
    fn set(&self, owner: &StudentId, key: &str, value: Value) -> Result<(), SessionError>;
    /// Removing a missing key is not an error.
    fn remove(&self, owner: &StudentId, key: &str) -> Result<(), SessionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session payload could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<(StudentId, String), Value>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<(StudentId, String), Value>) -> T,
    ) -> Result<T, SessionError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| SessionError::Unavailable("session mutex poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, owner: &StudentId, key: &str) -> Result<Option<Value>, SessionError> {
        self.with_entries(|entries| entries.get(&(*owner, key.to_string())).cloned())
    }

    fn set(&self, owner: &StudentId, key: &str, value: Value) -> Result<(), SessionError> {
        self.with_entries(|entries| {
            entries.insert((*owner, key.to_string()), value);
        })
    }

    fn remove(&self, owner: &StudentId, key: &str) -> Result<(), SessionError> {
        self.with_entries(|entries| {
            entries.remove(&(*owner, key.to_string()));
        })
    }
}
