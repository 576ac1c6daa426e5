//! RecommendationGenerator (spec §4.4). Merge/gap-fill structure grounded in
//! the teacher's `services/hybrid_curator.rs` (multi-strategy sourcing,
//! dedup-by-id merge); confidence scoring grounded in
//! `original_source/.../orchestrator/cohesion_calculator.py`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::audio::{AudioFeatureMatcher, ToleranceMode};
use crate::model::{
    AnchorType, IntentAnalysis, MoodAnalysis, RecommendationSource, TrackRecommendation,
};
use crate::ports::catalog::CatalogPort;

const ARTIST_RECOMMENDATION_LIMIT: usize = 10;
const SEED_CHUNK_SIZE: usize = 3;

pub struct RecommendationGenerator {
    catalog: Arc<dyn CatalogPort>,
}

pub struct GenerationResult {
    pub recommendations: Vec<TrackRecommendation>,
    pub insufficient_supply: bool,
}

impl RecommendationGenerator {
    pub fn new(catalog: Arc<dyn CatalogPort>) -> Self {
        RecommendationGenerator { catalog }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn generate(
        &self,
        access_token: &str,
        anchors: &[TrackRecommendation],
        seed_track_ids: &[String],
        negative_seeds: &[String],
        intent: &IntentAnalysis,
        mood_analysis: &MoodAnalysis,
        target_count: u32,
    ) -> GenerationResult {
        let mut pool: Vec<TrackRecommendation> = anchors.to_vec();

        pool.extend(
            self.seeded_similarity(access_token, seed_track_ids, negative_seeds)
                .await,
        );
        pool.extend(
            self.artist_discovery(access_token, mood_analysis)
                .await,
        );

        dedup_by_track_id(&mut pool);

        for rec in pool.iter_mut() {
            if rec.is_protected() {
                rec.confidence_score = 1.0;
                continue;
            }
            let cohesion = AudioFeatureMatcher::calculate_cohesion(
                &rec.audio_features.as_map(),
                &mood_analysis.target_features,
                Some(&mood_analysis.feature_weights),
                Some(rec.source.as_str()),
                ToleranceMode::Base,
            );
            rec.confidence_score = cohesion * 0.7 + 0.3 * rec.source.prior();
        }

        apply_genre_filter(&mut pool, intent);
        apply_regional_filter(&mut pool, mood_analysis);
        apply_temporal_filter(&mut pool, mood_analysis);

        let insufficient_supply = (pool.len() as u32) < target_count;
        if insufficient_supply {
            warn!(
                got = pool.len(),
                target_count, "recommendation pool below target count after filtering"
            );
        }

        GenerationResult {
            recommendations: pool,
            insufficient_supply,
        }
    }

    async fn seeded_similarity(
        &self,
        access_token: &str,
        seed_track_ids: &[String],
        negative_seeds: &[String],
    ) -> Vec<TrackRecommendation> {
        let mut out = Vec::new();
        for chunk in seed_track_ids.chunks(SEED_CHUNK_SIZE) {
            match self
                .catalog
                .get_similar_tracks(access_token, chunk, negative_seeds, 10)
                .await
            {
                Ok(tracks) => {
                    for track in tracks {
                        out.push(TrackRecommendation {
                            track_id: track.track_id,
                            track_name: track.track_name,
                            artists: track.artists,
                            spotify_uri: track.spotify_uri,
                            audio_features: Default::default(),
                            confidence_score: 0.0,
                            reasoning: "seeded similarity".to_string(),
                            source: RecommendationSource::Reccobeat,
                            user_mentioned: false,
                            user_mentioned_artist: false,
                            protected: false,
                            anchor_type: None,
                            release_year: track.release_year,
                            artist_country: track.artist_country,
                            genres: track.genres,
                        });
                    }
                }
                Err(err) => warn!(error = %err, "seeded similarity chunk lookup failed"),
            }
        }
        out
    }

    async fn artist_discovery(
        &self,
        access_token: &str,
        mood_analysis: &MoodAnalysis,
    ) -> Vec<TrackRecommendation> {
        let mut out = Vec::new();
        for artist_name in mood_analysis
            .artist_recommendations
            .iter()
            .take(ARTIST_RECOMMENDATION_LIMIT)
        {
            let artists = match self.catalog.search_artist(access_token, artist_name, 1).await {
                Ok(a) => a,
                Err(err) => {
                    warn!(error = %err, artist = %artist_name, "artist discovery search failed");
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

            for track in top_tracks {
                out.push(TrackRecommendation {
                    track_id: track.track_id,
                    track_name: track.track_name,
                    artists: track.artists,
                    spotify_uri: track.spotify_uri,
                    audio_features: Default::default(),
                    confidence_score: 0.0,
                    reasoning: format!("artist discovery: {artist_name}"),
                    source: RecommendationSource::ArtistDiscovery,
                    user_mentioned: false,
                    user_mentioned_artist: false,
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
}

fn dedup_by_track_id(pool: &mut Vec<TrackRecommendation>) {
    let mut seen = HashSet::new();
    pool.retain(|r| seen.insert(r.track_id.clone()));
}

/// Spec §4.4 genre-filter gate.
fn apply_genre_filter(pool: &mut Vec<TrackRecommendation>, intent: &IntentAnalysis) {
    let Some(primary_genre) = &intent.primary_genre else {
        return;
    };
    if intent.genre_strictness < 0.7 {
        return;
    }
    let primary_genre_lower = primary_genre.to_lowercase();
    pool.retain(|r| {
        if r.is_protected() {
            return true;
        }
        let matches = r
            .genres
            .iter()
            .any(|g| g.to_lowercase().contains(&primary_genre_lower));
        if !matches {
            debug!(track = %r.track_name, genre = %primary_genre, "rejected: genre mismatch");
        }
        matches
    });
}

/// Spec §4.4 regional filter.
fn apply_regional_filter(pool: &mut Vec<TrackRecommendation>, mood_analysis: &MoodAnalysis) {
    if mood_analysis.excluded_regions.is_empty() {
        return;
    }
    let excluded: HashSet<&String> = mood_analysis.excluded_regions.iter().collect();
    pool.retain(|r| {
        let rejected = r
            .artist_country
            .as_ref()
            .map(|c| excluded.contains(c))
            .unwrap_or(false);
        if rejected {
            debug!(track = %r.track_name, "rejected: excluded region");
        }
        !rejected
    });
}

/// Spec §4.4 temporal filter (±1 year tolerance, protected tracks exempt).
fn apply_temporal_filter(pool: &mut Vec<TrackRecommendation>, mood_analysis: &MoodAnalysis) {
    let Some(temporal) = &mood_analysis.temporal_context else {
        return;
    };
    if !temporal.is_temporal {
        return;
    }
    let Some((lo, hi)) = temporal.year_range else {
        return;
    };
    pool.retain(|r| {
        if r.is_protected() {
            return true;
        }
        match r.release_year {
            Some(year) => year >= lo - 1 && year <= hi + 1,
            None => true,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioFeatures, IntentType};

    fn mood_with_weights() -> MoodAnalysis {
        MoodAnalysis {
            mood_interpretation: "test".to_string(),
            target_features: HashMap::new(),
            feature_weights: HashMap::new(),
            search_keywords: Vec::new(),
            artist_recommendations: Vec::new(),
            genre_keywords: Vec::new(),
            temporal_context: None,
            excluded_themes: Vec::new(),
            preferred_regions: Vec::new(),
            excluded_regions: vec!["XX".to_string()],
        }
    }

    fn track(id: &str, protected: bool, country: Option<&str>) -> TrackRecommendation {
        TrackRecommendation {
            track_id: id.to_string(),
            track_name: id.to_string(),
            artists: vec!["artist".to_string()],
            spotify_uri: None,
            audio_features: AudioFeatures::default(),
            confidence_score: 0.5,
            reasoning: String::new(),
            source: RecommendationSource::Reccobeat,
            user_mentioned: false,
            user_mentioned_artist: false,
            protected,
            anchor_type: None,
            release_year: None,
            artist_country: country.map(|s| s.to_string()),
            genres: Vec::new(),
        }
    }

    #[test]
    fn dedup_removes_repeated_track_ids() {
        let mut pool = vec![track("a", false, None), track("a", false, None), track("b", false, None)];
        dedup_by_track_id(&mut pool);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn regional_filter_drops_excluded_country() {
        let mut pool = vec![track("a", false, Some("XX")), track("b", false, Some("US"))];
        apply_regional_filter(&mut pool, &mood_with_weights());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].track_id, "b");
    }

    #[test]
    fn genre_filter_exempts_protected_tracks() {
        let intent = IntentAnalysis {
            intent_type: IntentType::GenreExploration,
            user_mentioned_tracks: Vec::new(),
            user_mentioned_artists: Vec::new(),
            primary_genre: Some("jazz".to_string()),
            genre_strictness: 0.9,
            language_preferences: vec!["english".to_string()],
            exclude_regions: Vec::new(),
            allow_obscure_artists: false,
            quality_threshold: 0.6,
            reasoning: String::new(),
        };
        let mut pool = vec![track("a", true, None)];
        apply_genre_filter(&mut pool, &intent);
        assert_eq!(pool.len(), 1);
    }
}
