//! # study-advisor - 学习时间分配建议
//!
//! Learns, per course, how quiz scores respond to the study time spent on
//! each activity type in the days before a quiz, and turns that into a
//! suggested split of a time budget.
//!
//! - **Feature grid** - study seconds per (activity type × waking-time bin)
//!   over a look-back window, nights excluded
//! - **Online RLS** - recursive least squares with a forgetting factor and a
//!   rolling linear rescale of its predictions
//! - **Allocation** - reciprocal inversion of the fitted per-bin benefit,
//!   scaled to the budget, with an even-split fallback
//!
//! ## 模块结构
//!
//! - [`features`] - night window, bin layout, grid construction
//! - [`rls`] - estimator, persisted state and snapshot
//! - [`rescale`] - rolling (prediction, actual) linear fit
//! - [`retrain`] - two-pass full retrain of a course
//! - [`allocation`] - model inversion and even split
//! - [`store`] - storage traits, JSON file and in-memory stores
//! - [`advisor`] - [`StudyAdvisor`], the serialized entry point
//! - [`matrix`] / [`sanitize`] - flat-buffer linear algebra and health checks
//!
//! ## 使用示例
//!
//! ```rust
//! use study_advisor::{AdvisorConfig, MemoryStore, StudyAdvisor};
//!
//! let advisor = StudyAdvisor::new(AdvisorConfig::default(), MemoryStore::new()).unwrap();
//! let allocation = advisor.suggest_allocation("biology", 9.0);
//! assert_eq!(allocation.hours, vec![3.0, 3.0, 3.0]);
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod advisor;
pub mod allocation;
pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod matrix;
pub mod rescale;
pub mod retrain;
pub mod rls;
pub mod sanitize;
pub mod store;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

pub use advisor::StudyAdvisor;
pub use allocation::{allocate, even_split};
pub use config::AdvisorConfig;
pub use error::{AdvisorError, ConfigError, RlsError, StoreError};
pub use features::{BinLayout, FeatureBuilder, FeatureGrid, NightWindow};
pub use rescale::LinearRescaler;
pub use retrain::{retrain_course, NoModelReason, RetrainOutcome, RetrainReport};
pub use rls::{ModelSnapshot, OnlineRls, RlsState};
pub use store::{
    ActivityTypeRegistry, AdvisorStore, JsonFileStore, MemoryStore, ModelStore, QuizHistory,
    SessionHistory,
};

/// 重新导出所有公共类型
pub use types::*;
