//! In-memory store for embedding and tests.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{ActivityTypeRegistry, ModelStore, QuizHistory, SessionHistory};
use crate::error::StoreError;
use crate::rls::ModelSnapshot;
use crate::types::{QuizRecord, StudySession};

/// Process-local store keyed by course id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Vec<StudySession>>>,
    quizzes: RwLock<HashMap<String, Vec<QuizRecord>>>,
    activity_types: RwLock<Vec<String>>,
    models: RwLock<HashMap<String, ModelSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activity_types(types: &[&str]) -> Self {
        let store = Self::default();
        *store.activity_types.write() = types.iter().map(|s| s.to_string()).collect();
        store
    }

    pub fn has_model(&self, course_id: &str) -> bool {
        self.models.read().contains_key(course_id)
    }
}

impl SessionHistory for MemoryStore {
    fn load_sessions(&self, course_id: &str) -> Result<Vec<StudySession>, StoreError> {
        Ok(self
            .sessions
            .read()
            .get(course_id)
            .cloned()
            .unwrap_or_default())
    }

    fn append_session(&self, session: StudySession) -> Result<(), StoreError> {
        self.sessions
            .write()
            .entry(session.course_id.clone())
            .or_default()
            .push(session);
        Ok(())
    }
}

impl QuizHistory for MemoryStore {
    fn load_quizzes(&self, course_id: &str) -> Result<Vec<QuizRecord>, StoreError> {
        Ok(self
            .quizzes
            .read()
            .get(course_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_quizzes(&self, course_id: &str, quizzes: &[QuizRecord]) -> Result<(), StoreError> {
        self.quizzes
            .write()
            .insert(course_id.to_string(), quizzes.to_vec());
        Ok(())
    }
}

impl ActivityTypeRegistry for MemoryStore {
    fn load_activity_types(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.activity_types.read().clone())
    }

    fn save_activity_types(&self, types: &[String]) -> Result<(), StoreError> {
        *self.activity_types.write() = types.to_vec();
        Ok(())
    }
}

impl ModelStore for MemoryStore {
    fn load_model(&self, course_id: &str) -> Result<Option<ModelSnapshot>, StoreError> {
        Ok(self.models.read().get(course_id).cloned())
    }

    fn save_model(&self, course_id: &str, snapshot: &ModelSnapshot) -> Result<(), StoreError> {
        self.models
            .write()
            .insert(course_id.to_string(), snapshot.clone());
        Ok(())
    }

    fn delete_model(&self, course_id: &str) -> Result<(), StoreError> {
        self.models.write().remove(course_id);
        Ok(())
    }
}
