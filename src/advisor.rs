//! Study Advisor
//!
//! Facade over a store: records sessions and quizzes, retrains after quiz
//! changes, and answers allocation and diagnostic queries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::allocation::{allocate, even_split};
use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::retrain::{retrain_course, RetrainOutcome};
use crate::store::AdvisorStore;
use crate::types::{Allocation, DailyAverage, DiagnosticResult, QuizRecord, StudySession};

/// Entry point tying configuration, storage and the model together.
///
/// Retrains for any course are serialized; allocation reads whatever
/// snapshot the store holds and never blocks on a retrain.
pub struct StudyAdvisor<S> {
    config: AdvisorConfig,
    store: S,
    retrain_lock: Mutex<()>,
}

impl<S: AdvisorStore> StudyAdvisor<S> {
    pub fn new(config: AdvisorConfig, store: S) -> Result<Self, AdvisorError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            retrain_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registered activity types, or the configured defaults when none are.
    pub fn activity_types(&self) -> Vec<String> {
        match self.store.load_activity_types() {
            Ok(types) if !types.is_empty() => types,
            Ok(_) => self.config.fallback_activity_types.clone(),
            Err(err) => {
                tracing::warn!(error = %err, "activity type registry unreadable, using defaults");
                self.config.fallback_activity_types.clone()
            }
        }
    }

    pub fn ensure_default_activity_types(&self) -> Result<Vec<String>, AdvisorError> {
        Ok(self
            .store
            .ensure_default_activity_types(&self.config.fallback_activity_types)?)
    }

    pub fn retrain(&self, course_id: &str) -> Result<RetrainOutcome, AdvisorError> {
        let _guard = self.retrain_lock.lock();
        retrain_course(&self.config, &self.store, course_id)
    }

    /// Hours per activity type for `budget_hours` (default budget if invalid).
    pub fn suggest_allocation(&self, course_id: &str, budget_hours: f64) -> Allocation {
        let budget = self.config.effective_budget(budget_hours);
        let fallback = self.activity_types();

        match self.store.load_model(course_id) {
            Ok(snapshot) => allocate(snapshot.as_ref(), budget, &fallback),
            Err(err) => {
                tracing::warn!(course_id, error = %err, "model snapshot unreadable, using even split");
                even_split(budget, &fallback)
            }
        }
    }

    pub fn log_session(&self, session: StudySession) -> Result<(), AdvisorError> {
        tracing::debug!(
            course_id = %session.course_id,
            study_type = %session.study_type,
            seconds = session.time_elapsed,
            "recording study session"
        );
        self.store.append_session(session)?;
        Ok(())
    }

    /// Record a quiz score and retrain the course.
    pub fn add_quiz(
        &self,
        course_id: &str,
        record: QuizRecord,
    ) -> Result<RetrainOutcome, AdvisorError> {
        let _guard = self.retrain_lock.lock();
        self.store.add_quiz(course_id, record)?;
        retrain_course(&self.config, &self.store, course_id)
    }

    /// Delete the quiz at `index` in date order and retrain the course.
    pub fn delete_quiz(
        &self,
        course_id: &str,
        index: usize,
    ) -> Result<(QuizRecord, RetrainOutcome), AdvisorError> {
        let _guard = self.retrain_lock.lock();
        let removed = self.store.delete_quiz(course_id, index)?;
        let outcome = retrain_course(&self.config, &self.store, course_id)?;
        Ok((removed, outcome))
    }

    pub fn list_quizzes(&self, course_id: &str) -> Result<Vec<QuizRecord>, AdvisorError> {
        Ok(self.store.list_quizzes(course_id)?)
    }

    /// Mean score per quiz date, ascending, optionally from `since` on.
    pub fn quiz_daily_averages(
        &self,
        course_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<DailyAverage>, AdvisorError> {
        let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for quiz in self.store.load_quizzes(course_id)? {
            if !quiz.score.is_finite() || since.is_some_and(|s| quiz.date < s) {
                continue;
            }
            let entry = by_date.entry(quiz.date).or_insert((0.0, 0));
            entry.0 += quiz.score;
            entry.1 += 1;
        }

        Ok(by_date
            .into_iter()
            .map(|(date, (sum, count))| DailyAverage {
                date,
                mean_score: sum / count as f64,
                count,
            })
            .collect())
    }

    /// Health of the persisted model, `None` when there is none.
    pub fn diagnose(&self, course_id: &str) -> Result<Option<DiagnosticResult>, AdvisorError> {
        let Some(snapshot) = self.store.load_model(course_id)? else {
            return Ok(None);
        };
        let estimator = snapshot.restore()?;
        Ok(Some(estimator.diagnose()))
    }
}
