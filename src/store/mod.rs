//! Storage Providers
//!
//! The core only needs a handful of I/O operations: read and append the
//! session history, read and edit quiz scores, read the activity-type
//! registry, and get/set/delete one model snapshot per course.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use chrono::NaiveDateTime;

use crate::error::StoreError;
use crate::rls::ModelSnapshot;
use crate::types::{QuizRecord, StudySession};

pub trait SessionHistory {
    /// All recorded sessions for a course, in recording order.
    fn load_sessions(&self, course_id: &str) -> Result<Vec<StudySession>, StoreError>;

    fn append_session(&self, session: StudySession) -> Result<(), StoreError>;

    /// Sessions starting in `[from, to]`. Unparseable start times are skipped.
    fn sessions_between(
        &self,
        course_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<StudySession>, StoreError> {
        Ok(self
            .load_sessions(course_id)?
            .into_iter()
            .filter(|s| {
                s.started_at()
                    .map(|at| at >= from && at <= to)
                    .unwrap_or(false)
            })
            .collect())
    }
}

pub trait QuizHistory {
    /// Quiz records as stored.
    fn load_quizzes(&self, course_id: &str) -> Result<Vec<QuizRecord>, StoreError>;

    fn save_quizzes(&self, course_id: &str, quizzes: &[QuizRecord]) -> Result<(), StoreError>;

    /// Quiz records sorted by date; same-day records keep their stored order.
    fn list_quizzes(&self, course_id: &str) -> Result<Vec<QuizRecord>, StoreError> {
        let mut quizzes = self.load_quizzes(course_id)?;
        quizzes.sort_by_key(|q| q.date);
        Ok(quizzes)
    }

    fn add_quiz(&self, course_id: &str, record: QuizRecord) -> Result<(), StoreError> {
        let mut quizzes = self.load_quizzes(course_id)?;
        quizzes.push(record);
        self.save_quizzes(course_id, &quizzes)
    }

    /// Remove the record at `index` in the [`list_quizzes`](Self::list_quizzes)
    /// order and return it.
    fn delete_quiz(&self, course_id: &str, index: usize) -> Result<QuizRecord, StoreError> {
        let mut quizzes = self.list_quizzes(course_id)?;
        if index >= quizzes.len() {
            return Err(StoreError::QuizIndex {
                index,
                len: quizzes.len(),
            });
        }
        let removed = quizzes.remove(index);
        self.save_quizzes(course_id, &quizzes)?;
        Ok(removed)
    }
}

pub trait ActivityTypeRegistry {
    /// Registered activity types; empty when nothing is registered yet.
    fn load_activity_types(&self) -> Result<Vec<String>, StoreError>;

    fn save_activity_types(&self, types: &[String]) -> Result<(), StoreError>;

    /// Write `defaults` when the registry is empty and return the effective list.
    fn ensure_default_activity_types(&self, defaults: &[String]) -> Result<Vec<String>, StoreError> {
        let existing = self.load_activity_types()?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        self.save_activity_types(defaults)?;
        tracing::info!(count = defaults.len(), "registered default activity types");
        Ok(defaults.to_vec())
    }
}

pub trait ModelStore {
    fn load_model(&self, course_id: &str) -> Result<Option<ModelSnapshot>, StoreError>;

    fn save_model(&self, course_id: &str, snapshot: &ModelSnapshot) -> Result<(), StoreError>;

    /// Deleting a missing model is not an error.
    fn delete_model(&self, course_id: &str) -> Result<(), StoreError>;
}

/// Everything the advisor needs from storage.
pub trait AdvisorStore: SessionHistory + QuizHistory + ActivityTypeRegistry + ModelStore {}

impl<T> AdvisorStore for T where T: SessionHistory + QuizHistory + ActivityTypeRegistry + ModelStore {}
