pub mod improvement_strategy;
pub mod intent_analyzer;
pub mod mood_analyzer;
pub mod orchestrator;
pub mod playlist_orderer;
pub mod quality_evaluator;
pub mod recommendation_generator;
pub mod seed_gatherer;
pub mod source_ratio;

pub use improvement_strategy::{ImprovementStrategy, Strategy};
pub use intent_analyzer::IntentAnalyzer;
pub use mood_analyzer::MoodAnalyzer;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use playlist_orderer::{OrderedPlaylist, PlaylistOrderer};
pub use quality_evaluator::{QualityEvaluator, QualityScores};
pub use recommendation_generator::{GenerationResult, RecommendationGenerator};
pub use seed_gatherer::{SeedGatherResult, SeedGatherer};
