use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Either a single target value or a `[min, max]` range for a feature. The
/// original source expresses mood targets as ranges; the midpoint is used
/// wherever a single comparison value is needed (spec §3 `target_features`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureTarget {
    Range([f64; 2]),
    Single(f64),
}

impl FeatureTarget {
    pub fn midpoint(&self) -> f64 {
        match self {
            FeatureTarget::Range([lo, hi]) => (lo + hi) / 2.0,
            FeatureTarget::Single(v) => *v,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalContext {
    pub decade: Option<String>,
    pub era: Option<String>,
    pub year_range: Option<(i32, i32)>,
    #[serde(default)]
    pub is_temporal: bool,
}

/// Output of the MoodAnalyzer stage (spec §4.2, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodAnalysis {
    pub mood_interpretation: String,
    pub target_features: HashMap<String, FeatureTarget>,
    pub feature_weights: HashMap<String, f64>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub artist_recommendations: Vec<String>,
    #[serde(default)]
    pub genre_keywords: Vec<String>,
    #[serde(default)]
    pub temporal_context: Option<TemporalContext>,
    #[serde(default)]
    pub excluded_themes: Vec<String>,
    #[serde(default)]
    pub preferred_regions: Vec<String>,
    #[serde(default)]
    pub excluded_regions: Vec<String>,
}

impl MoodAnalysis {
    /// Range midpoints used downstream for distance calculations (spec §4.2).
    pub fn target_feature_midpoints(&self) -> HashMap<String, f64> {
        self.target_features
            .iter()
            .map(|(k, v)| (k.clone(), v.midpoint()))
            .collect()
    }
}

/// Sizing plan produced alongside MoodAnalysis (spec §3, §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaylistTarget {
    pub target_count: u32,
    pub min_count: u32,
    pub max_count: u32,
    pub quality_threshold: f64,
}

impl Default for PlaylistTarget {
    fn default() -> Self {
        PlaylistTarget {
            target_count: 20,
            min_count: 16,
            max_count: 30,
            quality_threshold: 0.75,
        }
    }
}
