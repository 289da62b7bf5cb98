//! Retraining Orchestrator
//!
//! Rebuilds a course's model from scratch out of its full quiz and session
//! history. Two passes over the date-sorted quizzes:
//!
//! 1. collect the activity types present in any quiz's look-back window,
//!    which fixes the feature dimension for the whole run;
//! 2. build each quiz's feature grid and replay the updates in date order.
//!
//! The finished model replaces the persisted snapshot in one write.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, RlsError};
use crate::features::{FeatureBuilder, TimedSession};
use crate::rescale::LinearRescaler;
use crate::rls::{ModelSnapshot, OnlineRls};
use crate::sanitize::needs_recondition;
use crate::store::{ModelStore, QuizHistory, SessionHistory};
use crate::types::{DiagnosticResult, ModelMetadata, QuizRecord, StudySession};

/// Why a retrain ended without a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoModelReason {
    NoQuizzes,
    NoActivity,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrainReport {
    pub course_id: String,
    pub quiz_count: usize,
    pub samples_used: usize,
    pub samples_skipped: usize,
    pub dimension: usize,
    pub activity_types: Vec<String>,
    pub diagnostics: DiagnosticResult,
}

#[derive(Debug, Clone)]
pub enum RetrainOutcome {
    Trained {
        snapshot: ModelSnapshot,
        report: RetrainReport,
    },
    /// Any previously persisted model has been deleted.
    NoModel(NoModelReason),
}

impl RetrainOutcome {
    pub fn snapshot(&self) -> Option<&ModelSnapshot> {
        match self {
            RetrainOutcome::Trained { snapshot, .. } => Some(snapshot),
            RetrainOutcome::NoModel(_) => None,
        }
    }
}

/// Full retrain of `course_id`, persisting or deleting its model.
pub fn retrain_course<S>(
    config: &AdvisorConfig,
    store: &S,
    course_id: &str,
) -> Result<RetrainOutcome, AdvisorError>
where
    S: SessionHistory + QuizHistory + ModelStore + ?Sized,
{
    config.validate()?;
    let builder = FeatureBuilder::from_config(config)?;

    let quizzes: Vec<QuizRecord> = store
        .list_quizzes(course_id)?
        .into_iter()
        .filter(|q| q.score.is_finite())
        .collect();

    if quizzes.is_empty() {
        tracing::info!(course_id, "no quiz scores, removing model");
        store.delete_model(course_id)?;
        return Ok(RetrainOutcome::NoModel(NoModelReason::NoQuizzes));
    }

    let sessions: Vec<StudySession> = store
        .load_sessions(course_id)?
        .into_iter()
        .filter(|s| s.course_id == course_id)
        .collect();

    // Pass 1: windows and the union of activity types seen in them
    let windows: Vec<Vec<TimedSession<'_>>> = quizzes
        .iter()
        .map(|quiz| builder.scan_window(&sessions, config.target_time(quiz.date)))
        .collect();

    let activity_types: Vec<String> = windows
        .iter()
        .flatten()
        .map(|entry| entry.session.study_type.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if activity_types.is_empty() {
        tracing::info!(
            course_id,
            quizzes = quizzes.len(),
            "no study sessions near any quiz, removing model"
        );
        store.delete_model(course_id)?;
        return Ok(RetrainOutcome::NoModel(NoModelReason::NoActivity));
    }

    let bins = builder.layout().bins();
    let dimension = activity_types.len() * bins;
    tracing::info!(
        course_id,
        quizzes = quizzes.len(),
        sessions = sessions.len(),
        activity_types = activity_types.len(),
        dimension,
        "retraining model"
    );

    // Pass 2: grids are independent per quiz, the replay is not
    let features: Vec<Vec<f64>> = quizzes
        .par_iter()
        .zip(windows.par_iter())
        .map(|(quiz, window)| {
            builder
                .build_grid(config.target_time(quiz.date), window, &activity_types)
                .into_vector()
        })
        .collect();

    let rescaler = LinearRescaler::new(config.rescale_capacity, config.rescale_min_pairs);
    let mut estimator =
        OnlineRls::with_rescaler(dimension, config.forgetting, config.prior_delta, rescaler);
    let mut samples_skipped = 0usize;

    for (quiz, x) in quizzes.iter().zip(features.iter()) {
        match estimator.update(x, quiz.score) {
            Ok(_) => {}
            Err(err @ RlsError::DimensionMismatch { .. }) => {
                tracing::warn!(course_id, date = %quiz.date, error = %err, "skipping sample");
                samples_skipped += 1;
                continue;
            }
            Err(err) => {
                tracing::warn!(course_id, date = %quiz.date, error = %err, "update rejected");
                samples_skipped += 1;
                continue;
            }
        }

        if needs_recondition(estimator.update_count(), config.recondition_interval) {
            estimator.recondition();
        }
    }

    let diagnostics = estimator.diagnose();
    if !diagnostics.is_healthy {
        tracing::warn!(
            course_id,
            condition = diagnostics.condition_number,
            message = %diagnostics.message,
            "retrained model is unhealthy"
        );
    }

    let meta = ModelMetadata::new(activity_types.clone(), bins);
    let snapshot = ModelSnapshot::new(&estimator, meta);
    store.save_model(course_id, &snapshot)?;

    let report = RetrainReport {
        course_id: course_id.to_string(),
        quiz_count: quizzes.len(),
        samples_used: quizzes.len() - samples_skipped,
        samples_skipped,
        dimension,
        activity_types,
        diagnostics,
    };
    tracing::info!(
        course_id,
        samples = report.samples_used,
        skipped = report.samples_skipped,
        "model saved"
    );

    Ok(RetrainOutcome::Trained { snapshot, report })
}
