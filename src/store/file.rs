//! JSON file store: one directory per course under a data root.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ActivityTypeRegistry, ModelStore, QuizHistory, SessionHistory};
use crate::error::StoreError;
use crate::rls::ModelSnapshot;
use crate::types::{QuizRecord, StudySession};

const ACTIVITY_TYPES_FILE: &str = "studyTypes.json";
const SESSIONS_FILE: &str = "studyTimes.json";
const QUIZZES_FILE: &str = "quizScores.json";
const MODEL_FILE: &str = "rls_model.json";

/// JSON files under one data directory:
///
/// ```text
/// <root>/studyTypes.json
/// <root>/courses/<course_id>/studyTimes.json
/// <root>/courses/<course_id>/quizScores.json
/// <root>/courses/<course_id>/rls_model.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn course_dir(&self, course_id: &str) -> PathBuf {
        self.root.join("courses").join(safe_component(course_id))
    }

    fn course_file(&self, course_id: &str, name: &str) -> PathBuf {
        self.course_dir(course_id).join(name)
    }
}

/// Keep course ids from escaping the data directory.
fn safe_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{cleaned}"),
        _ => cleaned,
    }
}

/// Missing file reads as `None`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io(path, err)),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| StoreError::json(path, err))
}

/// Write to `<file>.tmp` then rename over the target.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|err| StoreError::json(path, err))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(|err| StoreError::io(&tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| StoreError::io(path, err))?;
    tracing::debug!(path = %path.display(), "wrote json file");
    Ok(())
}

impl SessionHistory for JsonFileStore {
    fn load_sessions(&self, course_id: &str) -> Result<Vec<StudySession>, StoreError> {
        let path = self.course_file(course_id, SESSIONS_FILE);
        Ok(read_json(&path)?.unwrap_or_default())
    }

    fn append_session(&self, session: StudySession) -> Result<(), StoreError> {
        let path = self.course_file(&session.course_id, SESSIONS_FILE);
        let mut sessions: Vec<StudySession> = read_json(&path)?.unwrap_or_default();
        sessions.push(session);
        write_json(&path, &sessions)
    }
}

impl QuizHistory for JsonFileStore {
    fn load_quizzes(&self, course_id: &str) -> Result<Vec<QuizRecord>, StoreError> {
        let path = self.course_file(course_id, QUIZZES_FILE);
        Ok(read_json(&path)?.unwrap_or_default())
    }

    fn save_quizzes(&self, course_id: &str, quizzes: &[QuizRecord]) -> Result<(), StoreError> {
        write_json(&self.course_file(course_id, QUIZZES_FILE), quizzes)
    }
}

impl ActivityTypeRegistry for JsonFileStore {
    fn load_activity_types(&self) -> Result<Vec<String>, StoreError> {
        Ok(read_json(&self.root.join(ACTIVITY_TYPES_FILE))?.unwrap_or_default())
    }

    fn save_activity_types(&self, types: &[String]) -> Result<(), StoreError> {
        write_json(&self.root.join(ACTIVITY_TYPES_FILE), types)
    }
}

impl ModelStore for JsonFileStore {
    fn load_model(&self, course_id: &str) -> Result<Option<ModelSnapshot>, StoreError> {
        read_json(&self.course_file(course_id, MODEL_FILE))
    }

    fn save_model(&self, course_id: &str, snapshot: &ModelSnapshot) -> Result<(), StoreError> {
        write_json(&self.course_file(course_id, MODEL_FILE), snapshot)
    }

    fn delete_model(&self, course_id: &str) -> Result<(), StoreError> {
        let path = self.course_file(course_id, MODEL_FILE);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(course_id, "deleted model snapshot");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_ids_stay_inside_root() {
        assert_eq!(safe_component("bio-101"), "bio-101");
        assert_eq!(safe_component("../etc"), ".._etc");
        assert_eq!(safe_component(".."), "_..");
        assert_eq!(safe_component(""), "_");
        assert_eq!(safe_component("a/b\\c"), "a_b_c");
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load_sessions("none").unwrap().is_empty());
        assert!(store.load_quizzes("none").unwrap().is_empty());
        assert!(store.load_activity_types().unwrap().is_empty());
        assert!(store.load_model("none").unwrap().is_none());
        store.delete_model("none").unwrap();
    }

    #[test]
    fn malformed_json_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let path = store.course_file("c1", QUIZZES_FILE);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[{\"date\": oops").unwrap();

        match store.load_quizzes("c1") {
            Err(StoreError::Json { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected json error, got {other:?}"),
        }
    }

    #[test]
    fn writes_leave_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .save_activity_types(&["Top Down".to_string()])
            .unwrap();
        assert!(dir.path().join(ACTIVITY_TYPES_FILE).exists());
        assert!(!dir.path().join("studyTypes.json.tmp").exists());
    }
}
