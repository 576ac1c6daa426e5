//! MoodAnalyzer (spec §4.2). Ported from `original_source/.../
//! mood_analyzer/planning/playlist_target_planner.py` and
//! `mood_analyzer/features/feature_extractor.py`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::model::{FeatureTarget, MoodAnalysis, PlaylistTarget};
use crate::ports::llm::{CompletionRequest, LLMPort, Message};
use crate::util::json_extract::parse_first_json;

pub struct MoodAnalyzer {
    llm: Option<Arc<dyn LLMPort>>,
}

#[derive(serde::Deserialize)]
struct RawMood {
    mood_interpretation: Option<String>,
    #[serde(default)]
    target_features: HashMap<String, FeatureTarget>,
    #[serde(default)]
    feature_weights: HashMap<String, f64>,
    #[serde(default)]
    search_keywords: Vec<String>,
    #[serde(default)]
    artist_recommendations: Vec<String>,
    #[serde(default)]
    genre_keywords: Vec<String>,
    #[serde(default)]
    excluded_themes: Vec<String>,
    #[serde(default)]
    preferred_regions: Vec<String>,
    #[serde(default)]
    excluded_regions: Vec<String>,
}

impl MoodAnalyzer {
    pub fn new(llm: Option<Arc<dyn LLMPort>>) -> Self {
        MoodAnalyzer { llm }
    }

    pub async fn analyze(&self, mood_prompt: &str) -> (MoodAnalysis, PlaylistTarget) {
        let raw = if let Some(llm) = &self.llm {
            self.try_llm_analyze(llm.as_ref(), mood_prompt).await
        } else {
            None
        };

        let mood_analysis = match raw {
            Some(raw) => Self::from_raw(raw),
            None => Self::fallback_analysis(),
        };

        let target = determine_playlist_target(mood_prompt, &mood_analysis);
        (mood_analysis, target)
    }

    async fn try_llm_analyze(&self, llm: &dyn LLMPort, mood_prompt: &str) -> Option<RawMood> {
        let prompt = format!(
            "Interpret the following music mood request and produce a JSON object with keys \
             mood_interpretation, target_features (map of feature name to [min,max] range), \
             feature_weights, search_keywords, artist_recommendations, genre_keywords, \
             excluded_themes, preferred_regions, excluded_regions. Request: {mood_prompt}"
        );
        let response = llm
            .complete(CompletionRequest {
                messages: vec![Message {
                    role: "user".to_string(),
                    content: prompt,
                }],
                model: "claude-3-haiku-20240307".to_string(),
                temperature: 0.4,
                max_tokens: 768,
                timeout: Duration::from_secs(60),
            })
            .await
            .ok()?;
        parse_first_json::<RawMood>(&response.text)
    }

    fn from_raw(raw: RawMood) -> MoodAnalysis {
        let target_features = if raw.target_features.is_empty() {
            neutral_target_features()
        } else {
            raw.target_features
        };
        let feature_weights = if raw.feature_weights.is_empty() {
            default_feature_weights()
        } else {
            raw.feature_weights
        };

        MoodAnalysis {
            mood_interpretation: raw
                .mood_interpretation
                .unwrap_or_else(|| "Mood interpretation unavailable".to_string()),
            target_features,
            feature_weights,
            search_keywords: raw.search_keywords,
            artist_recommendations: raw.artist_recommendations,
            genre_keywords: raw.genre_keywords,
            temporal_context: None,
            excluded_themes: raw.excluded_themes,
            preferred_regions: raw.preferred_regions,
            excluded_regions: raw.excluded_regions,
        }
    }

    fn fallback_analysis() -> MoodAnalysis {
        MoodAnalysis {
            mood_interpretation: "Neutral mood, applying balanced defaults".to_string(),
            target_features: neutral_target_features(),
            feature_weights: default_feature_weights(),
            search_keywords: Vec::new(),
            artist_recommendations: Vec::new(),
            genre_keywords: Vec::new(),
            temporal_context: None,
            excluded_themes: Vec::new(),
            preferred_regions: Vec::new(),
            excluded_regions: Vec::new(),
        }
    }
}

/// Ported from `feature_extractor.py::extract_target_features`'s empty-input
/// fallback.
fn neutral_target_features() -> HashMap<String, FeatureTarget> {
    [
        ("energy", 0.5),
        ("valence", 0.5),
        ("danceability", 0.5),
        ("acousticness", 0.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), FeatureTarget::Single(v)))
    .collect()
}

/// Ported from `feature_extractor.py::extract_feature_weights`'s default
/// table.
fn default_feature_weights() -> HashMap<String, f64> {
    [
        ("energy", 0.8),
        ("valence", 0.8),
        ("danceability", 0.6),
        ("acousticness", 0.6),
        ("instrumentalness", 0.5),
        ("tempo", 0.4),
        ("mode", 0.4),
        ("loudness", 0.3),
        ("speechiness", 0.3),
        ("liveness", 0.2),
        ("key", 0.2),
        ("popularity", 0.1),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Ported from `playlist_target_planner.py::determine_playlist_target`.
fn determine_playlist_target(mood_prompt: &str, mood_analysis: &MoodAnalysis) -> PlaylistTarget {
    let mut rng = rand::thread_rng();

    let feature_count = mood_analysis.target_features.len();
    let high_weight_features = mood_analysis
        .feature_weights
        .values()
        .filter(|&&w| w > 0.7)
        .count();

    let (mut target_count, mut min_count, quality_threshold) = if feature_count <= 4 || high_weight_features <= 2
    {
        (22 + rng.gen_range(-3..=3), 16, 0.7)
    } else if feature_count >= 8 || high_weight_features >= 4 {
        (19 + rng.gen_range(-2..=2), 16, 0.78)
    } else {
        (20 + rng.gen_range(-3..=3), 16, 0.75)
    };

    let niche_keywords = ["indie", "underground", "obscure", "niche", "rare"];
    let mood_lower = mood_prompt.to_lowercase();
    if niche_keywords.iter().any(|k| mood_lower.contains(k)) {
        target_count = (target_count - rng.gen_range(0..=2)).max(17);
        min_count = 15;
    }

    let target_count = target_count.max(min_count) as u32;

    PlaylistTarget {
        target_count,
        min_count: min_count as u32,
        max_count: 30,
        quality_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_has_neutral_defaults() {
        let analyzer = MoodAnalyzer::new(None);
        let (mood, target) = analyzer.analyze("late night drive").await;
        assert_eq!(mood.target_features.len(), 4);
        assert!(target.target_count >= target.min_count);
        assert!(target.target_count <= 25);
    }

    #[tokio::test]
    async fn niche_prompt_shrinks_target() {
        let analyzer = MoodAnalyzer::new(None);
        let (_, target) = analyzer.analyze("obscure underground indie vibes").await;
        assert!(target.target_count >= 15);
        assert_eq!(target.min_count, 15);
    }
}
