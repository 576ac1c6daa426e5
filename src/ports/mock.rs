//! In-memory port adapters. Used by `main.rs`'s demo entry point and by
//! pipeline unit tests so the crate runs without live network credentials.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::AudioFeatures;

use super::cache::CachePort;
use super::catalog::{ArtistDto, CatalogPort, TrackDto};
use super::llm::{CompletionRequest, CompletionResponse, LLMPort};

#[derive(Default)]
pub struct InMemoryCache {
    store: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CachePort for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_seconds: u64) -> Result<()> {
        self.store
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A fixed catalog of tracks and artists, keyed by simple substring search,
/// for demos and tests. Not a mock in the stub-everything sense: search and
/// top-tracks queries behave deterministically over the fixture data.
#[derive(Default)]
pub struct FixtureCatalog {
    pub tracks: Vec<TrackDto>,
    pub artist_top_tracks: HashMap<String, Vec<TrackDto>>,
    pub artists: Vec<ArtistDto>,
    pub audio_features: HashMap<String, AudioFeatures>,
}

#[async_trait]
impl CatalogPort for FixtureCatalog {
    async fn search_tracks(&self, _access_token: &str, query: &str, limit: usize) -> Result<Vec<TrackDto>> {
        let query_lower = query.to_lowercase();
        Ok(self
            .tracks
            .iter()
            .filter(|t| {
                t.track_name.to_lowercase().contains(&query_lower)
                    || t.artists.iter().any(|a| a.to_lowercase().contains(&query_lower))
                    || query_lower.is_empty()
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_artist_top_tracks(
        &self,
        _access_token: &str,
        artist_id: &str,
        _country_hint: Option<&str>,
    ) -> Result<Vec<TrackDto>> {
        Ok(self
            .artist_top_tracks
            .get(artist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_track(&self, _access_token: &str, track_id: &str) -> Result<TrackDto> {
        self.tracks
            .iter()
            .find(|t| t.track_id == track_id)
            .cloned()
            .ok_or_else(|| crate::error::OrchestratorError::Fatal(anyhow::anyhow!("track not found")))
    }

    async fn get_tracks_audio_features(
        &self,
        track_ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>> {
        Ok(track_ids
            .iter()
            .filter_map(|id| self.audio_features.get(id).map(|f| (id.clone(), f.clone())))
            .collect())
    }

    async fn search_artist(&self, _access_token: &str, name: &str, limit: usize) -> Result<Vec<ArtistDto>> {
        let name_lower = name.to_lowercase();
        Ok(self
            .artists
            .iter()
            .filter(|a| a.name.to_lowercase().contains(&name_lower))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_similar_tracks(
        &self,
        _access_token: &str,
        seed_track_ids: &[String],
        negative_seed_ids: &[String],
        limit: usize,
    ) -> Result<Vec<TrackDto>> {
        let negative: std::collections::HashSet<&String> = negative_seed_ids.iter().collect();
        Ok(self
            .tracks
            .iter()
            .filter(|t| !seed_track_ids.contains(&t.track_id) && !negative.contains(&t.track_id))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// An LLM stand-in that always fails, forcing every stage's rule-based
/// fallback path — useful for exercising spec §4.1/§4.6 fallback behavior
/// deterministically in tests (see S6).
pub struct UnavailableLLM;

#[async_trait]
impl LLMPort for UnavailableLLM {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        Err(crate::error::OrchestratorError::retryable(
            "no LLM configured",
        ))
    }
}

/// An LLM stand-in that returns a fixed canned response, for tests that
/// want to exercise the LLM-available path without live network.
pub struct CannedLLM {
    pub response_text: String,
}

#[async_trait]
impl LLMPort for CannedLLM {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            text: self.response_text.clone(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            cost_estimate_usd: 0.0,
        })
    }
}
