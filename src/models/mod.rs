pub mod coordinator;
pub mod engine;
pub mod game;
pub mod promotion;

pub use coordinator::{
    AnalysisCoordinator, AnalysisLimits, AnalysisResult, AnalysisSource, CoreEvent,
    StrengthSetting,
};
pub use engine::{AnalysisEngine, EngineAnalysis, StrengthOptions, UciEngine};
pub use game::{ClickOutcome, GameModel, InputState};
pub use promotion::PendingPromotion;
