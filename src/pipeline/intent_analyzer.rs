//! IntentAnalyzer (spec §4.1). Ported from `original_source/.../
//! intent_analyzer/intent_fallback.py` and `intent_validator.py`.

use std::sync::Arc;
use std::time::Duration;

use crate::model::{IntentAnalysis, IntentType, TrackMention, TrackMentionPriority};
use crate::ports::llm::{CompletionRequest, LLMPort, Message};
use crate::util::json_extract::parse_first_json;

pub struct IntentAnalyzer {
    llm: Option<Arc<dyn LLMPort>>,
}

#[derive(serde::Deserialize)]
struct RawIntent {
    intent_type: Option<String>,
    #[serde(default)]
    user_mentioned_tracks: Vec<RawTrackMention>,
    #[serde(default)]
    user_mentioned_artists: Vec<String>,
    primary_genre: Option<String>,
    genre_strictness: Option<f64>,
    #[serde(default)]
    language_preferences: Vec<String>,
    #[serde(default)]
    exclude_regions: Vec<String>,
    #[serde(default)]
    allow_obscure_artists: bool,
    quality_threshold: Option<f64>,
    #[serde(default)]
    reasoning: String,
}

#[derive(serde::Deserialize)]
struct RawTrackMention {
    track_name: Option<String>,
    artist_name: Option<String>,
    priority: Option<String>,
}

impl IntentAnalyzer {
    pub fn new(llm: Option<Arc<dyn LLMPort>>) -> Self {
        IntentAnalyzer { llm }
    }

    /// Produce IntentAnalysis, first attempting LLM classification and
    /// falling back to rule-based detection on any failure or schema
    /// violation (spec §4.1: "never fatal; always returns a usable
    /// IntentAnalysis").
    pub async fn analyze(&self, mood_prompt: &str) -> IntentAnalysis {
        if let Some(llm) = &self.llm {
            if let Some(raw) = self.try_llm_classify(llm.as_ref(), mood_prompt).await {
                return Self::validate(Self::from_raw(raw));
            }
        }
        Self::validate(Self::analyze_fallback(mood_prompt))
    }

    async fn try_llm_classify(&self, llm: &dyn LLMPort, mood_prompt: &str) -> Option<RawIntent> {
        let prompt = format!(
            "Classify the user's music mood request into a structured JSON object with keys \
             intent_type, user_mentioned_tracks, user_mentioned_artists, primary_genre, \
             genre_strictness, language_preferences, exclude_regions, allow_obscure_artists, \
             quality_threshold, reasoning. Request: {mood_prompt}"
        );
        let response = llm
            .complete(CompletionRequest {
                messages: vec![Message {
                    role: "user".to_string(),
                    content: prompt,
                }],
                model: "claude-3-haiku-20240307".to_string(),
                temperature: 0.2,
                max_tokens: 512,
                timeout: Duration::from_secs(60),
            })
            .await
            .ok()?;
        parse_first_json::<RawIntent>(&response.text)
    }

    fn from_raw(raw: RawIntent) -> IntentAnalysis {
        let intent_type = match raw.intent_type.as_deref() {
            Some("artist_focus") => IntentType::ArtistFocus,
            Some("genre_exploration") => IntentType::GenreExploration,
            Some("specific_track_similar") => IntentType::SpecificTrackSimilar,
            _ => IntentType::MoodVariety,
        };

        let user_mentioned_tracks = raw
            .user_mentioned_tracks
            .into_iter()
            .filter_map(|t| {
                let track_name = t.track_name?;
                let artist_name = t.artist_name?;
                let priority = match t.priority.as_deref() {
                    Some("high") => TrackMentionPriority::High,
                    _ => TrackMentionPriority::Medium,
                };
                Some(TrackMention {
                    track_name,
                    artist_name,
                    priority,
                })
            })
            .collect();

        IntentAnalysis {
            intent_type,
            user_mentioned_tracks,
            user_mentioned_artists: raw.user_mentioned_artists,
            primary_genre: raw.primary_genre,
            genre_strictness: raw.genre_strictness.unwrap_or(0.6),
            language_preferences: raw.language_preferences,
            exclude_regions: raw.exclude_regions,
            allow_obscure_artists: raw.allow_obscure_artists,
            quality_threshold: raw.quality_threshold.unwrap_or(0.6),
            reasoning: raw.reasoning,
        }
    }

    /// Rule-based fallback (spec §4.1), ported from `intent_fallback.py`.
    fn analyze_fallback(mood_prompt: &str) -> IntentAnalysis {
        let mood_lower = mood_prompt.to_lowercase();

        let intent_type = if ["like ", "similar to", "things like"]
            .iter()
            .any(|p| mood_lower.contains(p))
        {
            IntentType::SpecificTrackSimilar
        } else if ["playlist", "give me", "only"]
            .iter()
            .any(|p| mood_lower.contains(p))
        {
            IntentType::ArtistFocus
        } else if ["explore", "discover", "variety", "mix"]
            .iter()
            .any(|p| mood_lower.contains(p))
        {
            IntentType::GenreExploration
        } else {
            IntentType::MoodVariety
        };

        let primary_genre = detect_genre(&mood_lower);

        let genre_strictness = match intent_type {
            IntentType::ArtistFocus | IntentType::SpecificTrackSimilar => 0.85,
            IntentType::GenreExploration => 0.7,
            IntentType::MoodVariety => 0.6,
        };

        IntentAnalysis {
            intent_type,
            user_mentioned_tracks: Vec::new(),
            user_mentioned_artists: Vec::new(),
            primary_genre,
            genre_strictness,
            language_preferences: vec!["english".to_string()],
            exclude_regions: Vec::new(),
            allow_obscure_artists: false,
            quality_threshold: 0.6,
            reasoning: "Fallback rule-based analysis".to_string(),
        }
    }

    /// Clamp and coerce, dropping malformed mentions (spec §4.1, ported
    /// from `intent_validator.py`).
    fn validate(intent: IntentAnalysis) -> IntentAnalysis {
        intent.validated()
    }
}

fn detect_genre(mood_lower: &str) -> Option<String> {
    let table: &[(&str, &[&str])] = &[
        ("trap", &["trap", "travis scott", "future", "migos"]),
        ("hip hop", &["hip hop", "rap", "rapper"]),
        ("pop", &["pop", "taylor swift", "ariana"]),
        ("rock", &["rock", "indie", "alternative"]),
        ("electronic", &["electronic", "edm", "techno", "house"]),
        ("jazz", &["jazz", "bebop", "swing"]),
        ("classical", &["classical", "orchestra", "symphony"]),
        ("country", &["country", "nashville"]),
        ("funk", &["funk", "funky"]),
        ("soul", &["soul", "r&b", "rnb"]),
    ];
    for (genre, keywords) in table {
        if keywords.iter().any(|k| mood_lower.contains(k)) {
            return Some(genre.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_detects_specific_track_similar() {
        let analyzer = IntentAnalyzer::new(None);
        let intent = analyzer.analyze("things like Escape Plan by Travis Scott").await;
        assert_eq!(intent.intent_type, IntentType::SpecificTrackSimilar);
        assert_eq!(intent.primary_genre.as_deref(), Some("trap"));
        assert!((intent.genre_strictness - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fallback_detects_artist_focus() {
        let analyzer = IntentAnalyzer::new(None);
        let intent = analyzer.analyze("give me a Travis Scott playlist").await;
        assert_eq!(intent.intent_type, IntentType::ArtistFocus);
    }

    #[tokio::test]
    async fn fallback_defaults_to_mood_variety() {
        let analyzer = IntentAnalyzer::new(None);
        let intent = analyzer.analyze("something to relax to tonight").await;
        assert_eq!(intent.intent_type, IntentType::MoodVariety);
        assert!((intent.genre_strictness - 0.6).abs() < 1e-9);
    }
}
