use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    ArtistFocus,
    GenreExploration,
    MoodVariety,
    SpecificTrackSimilar,
}

impl Default for IntentType {
    fn default() -> Self {
        IntentType::MoodVariety
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackMentionPriority {
    High,
    Medium,
}

impl Default for TrackMentionPriority {
    fn default() -> Self {
        TrackMentionPriority::Medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackMention {
    pub track_name: String,
    pub artist_name: String,
    #[serde(default)]
    pub priority: TrackMentionPriority,
}

/// Output of the IntentAnalyzer stage (spec §4.1, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub intent_type: IntentType,
    #[serde(default)]
    pub user_mentioned_tracks: Vec<TrackMention>,
    #[serde(default)]
    pub user_mentioned_artists: Vec<String>,
    pub primary_genre: Option<String>,
    pub genre_strictness: f64,
    #[serde(default = "default_language_preferences")]
    pub language_preferences: Vec<String>,
    #[serde(default)]
    pub exclude_regions: Vec<String>,
    #[serde(default)]
    pub allow_obscure_artists: bool,
    pub quality_threshold: f64,
    #[serde(default)]
    pub reasoning: String,
}

fn default_language_preferences() -> Vec<String> {
    vec!["english".to_string()]
}

impl IntentAnalysis {
    /// Clamp numeric ranges and coerce malformed fields, mirroring the
    /// validation pass described in spec §4.1.
    pub fn validated(mut self) -> Self {
        self.genre_strictness = self.genre_strictness.clamp(0.0, 1.0);
        self.quality_threshold = self.quality_threshold.clamp(0.0, 1.0);
        if self.language_preferences.is_empty() {
            self.language_preferences = default_language_preferences();
        }
        self
    }
}
