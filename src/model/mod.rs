pub mod intent;
pub mod mood;
pub mod track;
pub mod workflow;

pub use intent::{IntentAnalysis, IntentType, TrackMention, TrackMentionPriority};
pub use mood::{FeatureTarget, MoodAnalysis, PlaylistTarget, TemporalContext};
pub use track::{AudioFeatures, RecommendationSource, TrackRecommendation};
pub use workflow::{WorkflowMetadata, WorkflowState, WorkflowStatus};
