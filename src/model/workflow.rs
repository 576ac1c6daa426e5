use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IntentAnalysis, MoodAnalysis, PlaylistTarget, TrackRecommendation};

/// I6: status transitions are monotonic except that `Cancelled`/`Failed` may
/// occur from any non-terminal state; `RecommendationsReady` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    GatheringSeeds,
    GeneratingRecommendations,
    EvaluatingQuality,
    OptimizingRecommendations,
    RecommendationsReady,
    Cancelled,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::RecommendationsReady
                | WorkflowStatus::Cancelled
                | WorkflowStatus::Failed
        )
    }
}

/// Extensible metadata bag (spec §3). Keeps the dynamic-dictionary fields
/// the original Python stashed on `state.metadata`, but as named, typed
/// slots rather than an open `Dict[str, Any]` — the re-architecture spec.md
/// §9 calls for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub target_features: HashMap<String, f64>,
    pub feature_weights: HashMap<String, f64>,
    pub playlist_target: Option<PlaylistTarget>,
    pub orchestration_iterations: u32,
    pub quality_scores: Vec<f64>,
    pub improvement_actions: Vec<ImprovementAction>,
    /// Stricter-matching multiplier raised by `adjust_feature_weights`
    /// (base 4.5, +0.3 per application, cap 5.0).
    pub feature_weight: f64,
    pub insufficient_supply: bool,
    pub timings: HashMap<String, f64>,
    pub temporal_overrides_noted: Vec<String>,
}

impl WorkflowMetadata {
    pub fn new() -> Self {
        WorkflowMetadata {
            feature_weight: 4.5,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementAction {
    pub strategies: Vec<String>,
    pub iteration: u32,
}

/// The single in-memory document owned by one workflow task (spec §3).
/// Mutated only by the owning workflow; snapshot-persisted after each stage
/// by the (external, out of scope) persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: String,
    pub mood_prompt: String,
    pub status: WorkflowStatus,
    pub current_step: String,
    pub error_message: Option<String>,

    pub intent: Option<IntentAnalysis>,
    pub mood_analysis: Option<MoodAnalysis>,

    pub seed_tracks: Vec<String>,
    pub negative_seeds: Vec<String>,

    pub recommendations: Vec<TrackRecommendation>,

    pub metadata: WorkflowMetadata,

    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(session_id: impl Into<String>, mood_prompt: impl Into<String>) -> Self {
        WorkflowState {
            session_id: session_id.into(),
            mood_prompt: mood_prompt.into(),
            status: WorkflowStatus::Pending,
            current_step: "pending".to_string(),
            error_message: None,
            intent: None,
            mood_analysis: None,
            seed_tracks: Vec::new(),
            negative_seeds: Vec::new(),
            recommendations: Vec::new(),
            metadata: WorkflowMetadata::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn set_status(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.status = WorkflowStatus::Failed;
        self.updated_at = Utc::now();
    }

    /// I2: negative_seeds ≤ 5, never contains a protected track-id.
    pub fn push_negative_seeds(&mut self, ids: impl IntoIterator<Item = String>) {
        let protected: HashSet<String> = self
            .recommendations
            .iter()
            .filter(|r| r.is_protected())
            .map(|r| r.track_id.clone())
            .collect();

        let mut set: HashSet<String> = self.negative_seeds.iter().cloned().collect();
        for id in ids {
            if !protected.contains(&id) {
                set.insert(id);
            }
        }
        let mut combined: Vec<String> = set.into_iter().collect();
        // Order is not semantically meaningful for negative seeds beyond the
        // cap; keep deterministic ordering for reproducible snapshots.
        combined.sort();
        if combined.len() > 5 {
            combined.truncate(5);
        }
        self.negative_seeds = combined;
    }
}
