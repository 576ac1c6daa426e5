//! QualityEvaluator (spec §4.5). Ported from `original_source/.../
//! orchestrator/quality_evaluator.py` and `cohesion_calculator.py`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::audio::{AudioFeatureMatcher, ToleranceMode};
use crate::model::{MoodAnalysis, RecommendationSource, TrackRecommendation};
use crate::ports::llm::{CompletionRequest, LLMPort, Message};
use crate::util::json_extract::parse_first_json;

const COHESION_THRESHOLD: f64 = 0.65;
const RECCOBEAT_OUTLIER_THRESHOLD: f64 = 0.6;
const ARTIST_OUTLIER_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct QualityScores {
    pub coverage_score: f64,
    pub cohesion_score: f64,
    pub confidence_score: f64,
    pub diversity_score: f64,
    pub overall_score: f64,
    pub outliers: Vec<String>,
}

pub struct QualityEvaluator {
    llm: Option<Arc<dyn LLMPort>>,
}

#[derive(serde::Deserialize)]
struct LlmAssessment {
    quality_score: Option<f64>,
    #[serde(default)]
    specific_concerns: Vec<String>,
}

impl QualityEvaluator {
    pub fn new(llm: Option<Arc<dyn LLMPort>>) -> Self {
        QualityEvaluator { llm }
    }

    pub async fn evaluate(
        &self,
        recommendations: &[TrackRecommendation],
        mood_analysis: &MoodAnalysis,
        target_count: u32,
        min_count: u32,
        quality_threshold: f64,
    ) -> QualityScores {
        let per_track_cohesion: Vec<f64> = recommendations
            .iter()
            .map(|r| {
                if r.is_protected() {
                    1.0
                } else {
                    AudioFeatureMatcher::calculate_cohesion(
                        &r.audio_features.as_map(),
                        &mood_analysis.target_features,
                        Some(&mood_analysis.feature_weights),
                        Some(r.source.as_str()),
                        ToleranceMode::Base,
                    )
                }
            })
            .collect();

        let coverage_score = if target_count > 0 {
            (recommendations.len() as f64 / target_count as f64).min(1.0)
        } else {
            1.0
        };

        let cohesion_score = if per_track_cohesion.is_empty() {
            0.0
        } else {
            per_track_cohesion.iter().sum::<f64>() / per_track_cohesion.len() as f64
        };

        let confidence_score = if recommendations.is_empty() {
            0.0
        } else {
            recommendations.iter().map(|r| r.confidence_score).sum::<f64>() / recommendations.len() as f64
        };

        let unique_artists: HashSet<&str> = recommendations
            .iter()
            .flat_map(|r| r.artists.iter().map(|a| a.as_str()))
            .collect();
        let diversity_score = if recommendations.is_empty() {
            0.0
        } else {
            (unique_artists.len() as f64 / (0.6 * recommendations.len() as f64)).min(1.0)
        };

        let mut overall_score =
            0.4 * cohesion_score + 0.25 * coverage_score + 0.2 * confidence_score + 0.15 * diversity_score;

        let mut outliers = algorithmic_outliers(recommendations, &per_track_cohesion);

        if let Some(llm) = &self.llm {
            if let Some(assessment) = self.try_llm_assessment(llm.as_ref(), recommendations, mood_analysis).await {
                if let Some(llm_score) = assessment.quality_score {
                    overall_score = 0.7 * overall_score + 0.3 * llm_score;
                }
                let llm_outliers = extract_llm_outliers(&assessment.specific_concerns, recommendations);
                for o in llm_outliers {
                    if !outliers.contains(&o) {
                        outliers.push(o);
                    }
                }
            }
        }

        let _ = (min_count, quality_threshold);

        QualityScores {
            coverage_score,
            cohesion_score,
            confidence_score,
            diversity_score,
            overall_score,
            outliers,
        }
    }

    /// Strict predicate (spec §4.5).
    pub fn meets_strict(
        &self,
        scores: &QualityScores,
        recommendations_len: usize,
        target_count: u32,
        quality_threshold: f64,
    ) -> bool {
        scores.cohesion_score >= COHESION_THRESHOLD
            && recommendations_len as u32 >= target_count
            && scores.outliers.is_empty()
            && scores.overall_score >= quality_threshold
    }

    /// Relaxed predicate (spec §4.5).
    pub fn meets_relaxed(&self, scores: &QualityScores, recommendations_len: usize, min_count: u32) -> bool {
        scores.cohesion_score >= COHESION_THRESHOLD
            && scores.overall_score >= 0.60
            && recommendations_len as u32 >= min_count
            && scores.outliers.len() <= 2
    }

    async fn try_llm_assessment(
        &self,
        llm: &dyn LLMPort,
        recommendations: &[TrackRecommendation],
        mood_analysis: &MoodAnalysis,
    ) -> Option<LlmAssessment> {
        let track_list: String = recommendations
            .iter()
            .take(30)
            .map(|r| format!("{} by {}", r.track_name, r.artists.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Assess playlist quality for mood \"{}\". Respond with JSON \
             {{\"quality_score\": 0.0-1.0, \"specific_concerns\": [\"Track X by Y feels out of place ...\"]}}\n{}",
            mood_analysis.mood_interpretation, track_list
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

        parse_first_json::<LlmAssessment>(&response.text)
    }
}

/// Spec §4.5 algorithmic outlier rule; protected/user-mentioned tracks are
/// never outliers, regardless of cohesion.
fn algorithmic_outliers(recommendations: &[TrackRecommendation], cohesion: &[f64]) -> Vec<String> {
    recommendations
        .iter()
        .zip(cohesion.iter())
        .filter(|(r, &c)| {
            if r.is_protected() {
                return false;
            }
            match r.source {
                RecommendationSource::Reccobeat => c < RECCOBEAT_OUTLIER_THRESHOLD,
                RecommendationSource::ArtistDiscovery => c < ARTIST_OUTLIER_THRESHOLD,
                RecommendationSource::AnchorTrack => false,
            }
        })
        .map(|(r, _)| r.track_id.clone())
        .collect()
}

/// Parses "Track X by Y feels out of place ..." style concerns from the LLM
/// assessment, matching case-insensitively on track name, and skipping
/// protected tracks (spec §4.5, ported from
/// `cohesion_calculator.py::extract_llm_outliers`).
fn extract_llm_outliers(concerns: &[String], recommendations: &[TrackRecommendation]) -> Vec<String> {
    let mut out = Vec::new();
    for concern in concerns {
        let Some(parsed) = parse_track_by_artist(concern) else {
            continue;
        };
        let (track_name, _artist_name) = parsed;
        let track_name_lower = track_name.to_lowercase();

        let Some(matched) = recommendations
            .iter()
            .find(|r| r.track_name.to_lowercase() == track_name_lower)
        else {
            continue;
        };

        if matched.is_protected() {
            warn!(track = %matched.track_name, "LLM flagged a protected track as an outlier; ignoring");
            continue;
        }

        out.push(matched.track_id.clone());
    }
    out
}

/// Extracts ("Track Name", "Artist") from a "Track X by Y ..." concern
/// string.
fn parse_track_by_artist(concern: &str) -> Option<(String, String)> {
    let by_idx = concern.find(" by ")?;
    let after = &concern[by_idx + 4..];
    let end = after.find(|c: char| c == '.' || c == ',').unwrap_or(after.len());
    let artist = after[..end].trim().to_string();

    let before = &concern[..by_idx];
    let track_start = before.rfind('"').map(|i| i + 1).unwrap_or_else(|| {
        before
            .find("Track ")
            .map(|i| i + "Track ".len())
            .unwrap_or(0)
    });
    let track = before[track_start..].trim().trim_matches('"').to_string();
    if track.is_empty() || artist.is_empty() {
        return None;
    }
    Some((track, artist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AudioFeatures;

    fn make_track(id: &str, source: RecommendationSource, protected: bool) -> TrackRecommendation {
        TrackRecommendation {
            track_id: id.to_string(),
            track_name: format!("Song {id}"),
            artists: vec!["Artist".to_string()],
            spotify_uri: None,
            audio_features: AudioFeatures::default(),
            confidence_score: 0.5,
            reasoning: String::new(),
            source,
            user_mentioned: false,
            user_mentioned_artist: false,
            protected,
            anchor_type: None,
            release_year: None,
            artist_country: None,
            genres: Vec::new(),
        }
    }

    #[tokio::test]
    async fn protected_tracks_never_flagged_as_outliers() {
        let evaluator = QualityEvaluator::new(None);
        let recs = vec![make_track("a", RecommendationSource::Reccobeat, true)];
        let mood = MoodAnalysis {
            mood_interpretation: "test".to_string(),
            target_features: HashMap::new(),
            feature_weights: HashMap::new(),
            search_keywords: Vec::new(),
            artist_recommendations: Vec::new(),
            genre_keywords: Vec::new(),
            temporal_context: None,
            excluded_themes: Vec::new(),
            preferred_regions: Vec::new(),
            excluded_regions: Vec::new(),
        };
        let scores = evaluator.evaluate(&recs, &mood, 20, 16, 0.75).await;
        assert!(scores.outliers.is_empty());
        assert!((scores.cohesion_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn parses_track_by_artist_concern() {
        let parsed = parse_track_by_artist("Track \"Neon Tide\" by Glass Animals feels out of place here.");
        assert_eq!(parsed, Some(("Neon Tide".to_string(), "Glass Animals".to_string())));
    }
}
