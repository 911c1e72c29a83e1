//! Engine-backed chess analysis overlay core.
//!
//! [`models::AnalysisCoordinator`] owns the authoritative board, runs engine
//! and book lookups on background threads, and hands results back through a
//! single channel drained by the interactive thread. Results computed for a
//! position that has since changed are dropped.

pub mod config;
pub mod domain;
pub mod error;
pub mod models;
pub mod ui;

pub use config::OverlayConfig;
pub use domain::{PositionSnapshot, PositionState, Score, SearchLimit};
pub use error::{AnalysisError, BookError, ConfigError, EngineError, MoveError};
pub use models::{
    AnalysisCoordinator, AnalysisEngine, AnalysisLimits, AnalysisResult, AnalysisSource,
    CoreEvent, GameModel, StrengthSetting, UciEngine,
};
