//! SeedGatherer (spec §4.3). Anchor resolution grounded in the teacher's
//! `services/seed_selector.rs` (LLM-assisted selection over a ranked
//! candidate list, library-sample fallback); cohesion ranking grounded in
//! `audio::matcher`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::audio::{AudioFeatureMatcher, ToleranceMode};
use crate::model::{
    AnchorType, FeatureTarget, IntentAnalysis, MoodAnalysis, RecommendationSource, TrackRecommendation,
};
use crate::ports::catalog::CatalogPort;
use crate::ports::llm::{CompletionRequest, LLMPort, Message};
use crate::util::json_extract::parse_first_json;

const MENTIONED_ARTIST_TRACK_LIMIT: usize = 5;
const NON_MENTIONED_ARTIST_TRACK_LIMIT: usize = 3;
const ANCHOR_TRACK_LIMIT: usize = 5;
const MAX_GENRE_FANOUT: usize = 5;

pub struct SeedGatherer {
    catalog: Arc<dyn CatalogPort>,
    llm: Option<Arc<dyn LLMPort>>,
}

pub struct SeedGatherResult {
    pub anchors: Vec<TrackRecommendation>,
    pub seed_track_ids: Vec<String>,
    pub negative_seeds: Vec<String>,
}

#[derive(serde::Deserialize)]
struct SeedSelectionResponse {
    #[serde(default)]
    selected_indices: Vec<usize>,
}

impl SeedGatherer {
    pub fn new(catalog: Arc<dyn CatalogPort>, llm: Option<Arc<dyn LLMPort>>) -> Self {
        SeedGatherer { catalog, llm }
    }

    pub async fn gather(
        &self,
        access_token: &str,
        intent: &IntentAnalysis,
        mood_analysis: &MoodAnalysis,
    ) -> SeedGatherResult {
        let mut anchors = Vec::new();

        anchors.extend(self.resolve_user_mentioned_tracks(access_token, intent).await);
        anchors.extend(self.resolve_artist_anchors(access_token, intent).await);
        anchors.extend(self.resolve_genre_anchors(access_token, mood_analysis).await);

        self.enrich_with_audio_features(access_token, &mut anchors).await;

        let ranked = self.rank_by_cohesion(&anchors, &mood_analysis.target_features, &mood_analysis.feature_weights);

        let seed_track_ids = self.select_seed_ids(&anchors, &ranked).await;
        let negative_seeds = compute_negative_seeds(&anchors, &ranked);

        SeedGatherResult {
            anchors,
            seed_track_ids,
            negative_seeds,
        }
    }

    async fn resolve_user_mentioned_tracks(
        &self,
        access_token: &str,
        intent: &IntentAnalysis,
    ) -> Vec<TrackRecommendation> {
        let mut out = Vec::new();
        for mention in &intent.user_mentioned_tracks {
            let query = format!("track:{} artist:{}", mention.track_name, mention.artist_name);
            match self.catalog.search_tracks(access_token, &query, 1).await {
                Ok(mut hits) if !hits.is_empty() => {
                    let hit = hits.remove(0);
                    out.push(TrackRecommendation {
                        track_id: hit.track_id,
                        track_name: hit.track_name,
                        artists: hit.artists,
                        spotify_uri: hit.spotify_uri,
                        audio_features: Default::default(),
                        confidence_score: 1.0,
                        reasoning: "user-mentioned track".to_string(),
                        source: RecommendationSource::AnchorTrack,
                        user_mentioned: true,
                        user_mentioned_artist: false,
                        protected: true,
                        anchor_type: Some(AnchorType::User),
                        release_year: hit.release_year,
                        artist_country: hit.artist_country,
                        genres: hit.genres,
                    });
                }
                Ok(_) => debug!(track = %mention.track_name, "user-mentioned track not found in catalog"),
                Err(err) => warn!(error = %err, track = %mention.track_name, "catalog search failed for user-mentioned track"),
            }
        }
        out
    }

    async fn resolve_artist_anchors(
        &self,
        access_token: &str,
        intent: &IntentAnalysis,
    ) -> Vec<TrackRecommendation> {
        let mut out = Vec::new();
        for artist_name in &intent.user_mentioned_artists {
            let artists = match self.catalog.search_artist(access_token, artist_name, 1).await {
                Ok(a) => a,
                Err(err) => {
                    warn!(error = %err, artist = %artist_name, "artist search failed");
                    continue;
                }
            };
            let Some(artist) = artists.into_iter().next() else {
                continue;
            };

            let top_tracks = match self
                .catalog
                .get_artist_top_tracks(access_token, &artist.artist_id, artist.country.as_deref())
                .await
            {
                Ok(tracks) => tracks,
                Err(err) => {
                    warn!(error = %err, artist = %artist_name, "artist top-tracks fetch failed");
                    continue;
                }
            };

            let limit = MENTIONED_ARTIST_TRACK_LIMIT.max(NON_MENTIONED_ARTIST_TRACK_LIMIT);
            for track in top_tracks.into_iter().take(limit) {
                out.push(TrackRecommendation {
                    track_id: track.track_id,
                    track_name: track.track_name,
                    artists: track.artists,
                    spotify_uri: track.spotify_uri,
                    audio_features: Default::default(),
                    confidence_score: 0.85,
                    reasoning: format!("top track from mentioned artist {artist_name}"),
                    source: RecommendationSource::AnchorTrack,
                    user_mentioned: false,
                    user_mentioned_artist: true,
                    protected: false,
                    anchor_type: Some(AnchorType::Artist),
                    release_year: track.release_year,
                    artist_country: track.artist_country,
                    genres: track.genres,
                });
            }
        }
        out
    }

    async fn resolve_genre_anchors(
        &self,
        access_token: &str,
        mood_analysis: &MoodAnalysis,
    ) -> Vec<TrackRecommendation> {
        let mut out = Vec::new();
        for genre in mood_analysis.genre_keywords.iter().take(MAX_GENRE_FANOUT) {
            let query = format!("genre:{genre}");
            match self.catalog.search_tracks(access_token, &query, ANCHOR_TRACK_LIMIT).await {
                Ok(hits) => {
                    for hit in hits {
                        out.push(TrackRecommendation {
                            track_id: hit.track_id,
                            track_name: hit.track_name,
                            artists: hit.artists,
                            spotify_uri: hit.spotify_uri,
                            audio_features: Default::default(),
                            confidence_score: 0.7,
                            reasoning: format!("genre anchor: {genre}"),
                            source: RecommendationSource::AnchorTrack,
                            user_mentioned: false,
                            user_mentioned_artist: false,
                            protected: false,
                            anchor_type: Some(AnchorType::Genre),
                            release_year: hit.release_year,
                            artist_country: hit.artist_country,
                            genres: hit.genres,
                        });
                    }
                }
                Err(err) => warn!(error = %err, genre = %genre, "genre anchor search failed"),
            }
        }
        out.truncate(ANCHOR_TRACK_LIMIT);
        out
    }

    async fn enrich_with_audio_features(&self, _access_token: &str, anchors: &mut [TrackRecommendation]) {
        let ids: Vec<String> = anchors.iter().map(|a| a.track_id.clone()).collect();
        if ids.is_empty() {
            return;
        }
        match self.catalog.get_tracks_audio_features(&ids).await {
            Ok(features) => {
                for anchor in anchors.iter_mut() {
                    if let Some(f) = features.get(&anchor.track_id) {
                        anchor.audio_features = f.clone();
                    }
                }
            }
            Err(err) => warn!(error = %err, "audio feature enrichment failed, continuing with partial data"),
        }
    }

    fn rank_by_cohesion(
        &self,
        anchors: &[TrackRecommendation],
        target_features: &HashMap<String, FeatureTarget>,
        feature_weights: &HashMap<String, f64>,
    ) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = anchors
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let score = AudioFeatureMatcher::calculate_cohesion(
                    &a.audio_features.as_map(),
                    target_features,
                    Some(feature_weights),
                    Some(a.source.as_str()),
                    ToleranceMode::Base,
                );
                (i, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    async fn select_seed_ids(
        &self,
        anchors: &[TrackRecommendation],
        ranked: &[(usize, f64)],
    ) -> Vec<String> {
        const MAX_SEEDS: usize = 5;

        if ranked.is_empty() {
            return Vec::new();
        }

        if let Some(llm) = &self.llm {
            if let Some(indices) = self.try_llm_seed_selection(llm.as_ref(), ranked).await {
                let ids: Vec<String> = indices
                    .into_iter()
                    .filter_map(|i| ranked.get(i).map(|(idx, _)| *idx))
                    .take(MAX_SEEDS)
                    .map(|idx| anchors[idx].track_id.clone())
                    .collect();
                if !ids.is_empty() {
                    return ids;
                }
            }
        }

        ranked
            .iter()
            .take(MAX_SEEDS)
            .map(|(idx, _)| anchors[*idx].track_id.clone())
            .collect()
    }

    async fn try_llm_seed_selection(&self, llm: &dyn LLMPort, ranked: &[(usize, f64)]) -> Option<Vec<usize>> {
        let summary: String = ranked
            .iter()
            .take(20)
            .enumerate()
            .map(|(rank, (_, score))| format!("{rank}: cohesion={score:.2}"))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Given these ranked candidate seeds with their cohesion scores, select up to 5 indices \
             best suited as playlist seeds. Respond with JSON {{\"selected_indices\": [...]}}\n{summary}"
        );

        let response = llm
            .complete(CompletionRequest {
                messages: vec![Message {
                    role: "user".to_string(),
                    content: prompt,
                }],
                model: "claude-3-haiku-20240307".to_string(),
                temperature: 0.2,
                max_tokens: 256,
                timeout: Duration::from_secs(60),
            })
            .await
            .ok()?;

        parse_first_json::<SeedSelectionResponse>(&response.text).map(|r| r.selected_indices)
    }
}

/// Least-cohesive, non-protected anchors become negative seeds (spec §4.3
/// step 7), capped at 5.
fn compute_negative_seeds(anchors: &[TrackRecommendation], ranked: &[(usize, f64)]) -> Vec<String> {
    ranked
        .iter()
        .rev()
        .filter(|(idx, _)| !anchors[*idx].is_protected())
        .take(5)
        .map(|(idx, _)| anchors[*idx].track_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::FixtureCatalog;

    fn sample_intent() -> IntentAnalysis {
        IntentAnalysis {
            intent_type: crate::model::IntentType::MoodVariety,
            user_mentioned_tracks: Vec::new(),
            user_mentioned_artists: Vec::new(),
            primary_genre: None,
            genre_strictness: 0.6,
            language_preferences: vec!["english".to_string()],
            exclude_regions: Vec::new(),
            allow_obscure_artists: false,
            quality_threshold: 0.6,
            reasoning: String::new(),
        }
    }

    #[tokio::test]
    async fn empty_catalog_yields_no_anchors() {
        let catalog = Arc::new(FixtureCatalog::default());
        let gatherer = SeedGatherer::new(catalog, None);
        let mood = MoodAnalysis {
            mood_interpretation: "test".to_string(),
            target_features: HashMap::new(),
            feature_weights: HashMap::new(),
            search_keywords: Vec::new(),
            artist_recommendations: Vec::new(),
            genre_keywords: vec!["jazz".to_string()],
            temporal_context: None,
            excluded_themes: Vec::new(),
            preferred_regions: Vec::new(),
            excluded_regions: Vec::new(),
        };
        let result = gatherer.gather("token", &sample_intent(), &mood).await;
        assert!(result.anchors.is_empty());
        assert!(result.seed_track_ids.is_empty());
    }
}
