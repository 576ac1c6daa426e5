//! Abstract music-catalog port (spec §6). Concrete adapter generalizes the
//! teacher's `services/navidrome.rs` (`NavidromeClient`: bearer-token auth,
//! `build_params`-style query construction, consistent error wrapping) from
//! a Subsonic-specific client to the minimal surface the core needs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::model::AudioFeatures;
use crate::util::RateGate;

#[derive(Debug, Clone, Deserialize)]
pub struct TrackDto {
    pub track_id: String,
    pub track_name: String,
    pub artists: Vec<String>,
    pub spotify_uri: Option<String>,
    pub release_year: Option<i32>,
    pub artist_country: Option<String>,
    pub genres: Vec<String>,
    pub popularity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistDto {
    pub artist_id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub country: Option<String>,
}

#[async_trait]
pub trait CatalogPort: Send + Sync {
    async fn search_tracks(&self, access_token: &str, query: &str, limit: usize) -> Result<Vec<TrackDto>>;

    /// Goes through the process-wide rate gate (spec §5); implementations
    /// must call `rate_gate().wait_turn()` before issuing the request.
    async fn get_artist_top_tracks(
        &self,
        access_token: &str,
        artist_id: &str,
        country_hint: Option<&str>,
    ) -> Result<Vec<TrackDto>>;

    async fn get_track(&self, access_token: &str, track_id: &str) -> Result<TrackDto>;

    async fn get_tracks_audio_features(
        &self,
        track_ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>>;

    async fn search_artist(&self, access_token: &str, name: &str, limit: usize) -> Result<Vec<ArtistDto>>;

    /// Reccobeat-style seeded similarity search: tracks acoustically close
    /// to `seed_track_ids`, excluding `negative_seed_ids` (spec §4.4).
    async fn get_similar_tracks(
        &self,
        access_token: &str,
        seed_track_ids: &[String],
        negative_seed_ids: &[String],
        limit: usize,
    ) -> Result<Vec<TrackDto>>;
}

/// HTTP adapter over a generic catalog REST surface. The exact wire schema
/// is out of scope (spec §1 Non-goals); this client assumes a JSON API
/// shaped like `TrackDto`/`ArtistDto`, following the teacher's consistent
/// "build params, send, deserialize, wrap errors" shape.
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    top_tracks_gate: Arc<RateGate>,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, top_tracks_gate: Arc<RateGate>) -> Self {
        HttpCatalog {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            top_tracks_gate,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl CatalogPort for HttpCatalog {
    async fn search_tracks(&self, access_token: &str, query: &str, limit: usize) -> Result<Vec<TrackDto>> {
        let resp = self
            .client
            .get(self.url("/tracks/search"))
            .bearer_auth(access_token)
            .query(&[("q", query), ("limit", &limit.to_string())])
            .send()
            .await?;
        Ok(resp.json::<Vec<TrackDto>>().await?)
    }

    async fn get_artist_top_tracks(
        &self,
        access_token: &str,
        artist_id: &str,
        country_hint: Option<&str>,
    ) -> Result<Vec<TrackDto>> {
        self.top_tracks_gate.wait_turn().await;

        let mut params = vec![("limit", "10".to_string())];
        if let Some(country) = country_hint {
            params.push(("country", country.to_string()));
        }

        let resp = self
            .client
            .get(self.url(&format!("/artists/{artist_id}/top-tracks")))
            .bearer_auth(access_token)
            .query(&params)
            .send()
            .await?;
        Ok(resp.json::<Vec<TrackDto>>().await?)
    }

    async fn get_track(&self, access_token: &str, track_id: &str) -> Result<TrackDto> {
        let resp = self
            .client
            .get(self.url(&format!("/tracks/{track_id}")))
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(resp.json::<TrackDto>().await?)
    }

    async fn get_tracks_audio_features(
        &self,
        track_ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>> {
        let resp = self
            .client
            .get(self.url("/audio-features"))
            .query(&[("ids", track_ids.join(","))])
            .send()
            .await?;
        Ok(resp.json::<HashMap<String, AudioFeatures>>().await?)
    }

    async fn search_artist(&self, access_token: &str, name: &str, limit: usize) -> Result<Vec<ArtistDto>> {
        let resp = self
            .client
            .get(self.url("/artists/search"))
            .bearer_auth(access_token)
            .query(&[("q", name), ("limit", &limit.to_string())])
            .send()
            .await?;
        Ok(resp.json::<Vec<ArtistDto>>().await?)
    }

    async fn get_similar_tracks(
        &self,
        access_token: &str,
        seed_track_ids: &[String],
        negative_seed_ids: &[String],
        limit: usize,
    ) -> Result<Vec<TrackDto>> {
        let resp = self
            .client
            .get(self.url("/tracks/similar"))
            .bearer_auth(access_token)
            .query(&[
                ("seeds", seed_track_ids.join(",")),
                ("negative_seeds", negative_seed_ids.join(",")),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        Ok(resp.json::<Vec<TrackDto>>().await?)
    }
}
