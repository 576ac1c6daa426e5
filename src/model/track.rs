use serde::{Deserialize, Serialize};

/// Closed set of audio feature fields (spec §3). All optional on a track,
/// since catalog sources return partial data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub acousticness: Option<f64>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub key: Option<f64>,
    pub liveness: Option<f64>,
    pub loudness: Option<f64>,
    pub mode: Option<f64>,
    pub speechiness: Option<f64>,
    pub tempo: Option<f64>,
    pub valence: Option<f64>,
    pub popularity: Option<f64>,
}

impl AudioFeatures {
    pub fn is_empty(&self) -> bool {
        self.as_map().is_empty()
    }

    /// Flatten to a name→value map for use by AudioFeatureMatcher, which
    /// operates over the dynamic feature sets the original Python used.
    pub fn as_map(&self) -> std::collections::HashMap<String, f64> {
        let mut m = std::collections::HashMap::new();
        macro_rules! put {
            ($field:ident) => {
                if let Some(v) = self.$field {
                    m.insert(stringify!($field).to_string(), v);
                }
            };
        }
        put!(acousticness);
        put!(danceability);
        put!(energy);
        put!(instrumentalness);
        put!(key);
        put!(liveness);
        put!(loudness);
        put!(mode);
        put!(speechiness);
        put!(tempo);
        put!(valence);
        put!(popularity);
        m
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    AnchorTrack,
    ArtistDiscovery,
    Reccobeat,
}

impl RecommendationSource {
    /// Source-prior weight used in confidence scoring (spec §4.4).
    pub fn prior(self) -> f64 {
        match self {
            RecommendationSource::AnchorTrack => 1.0,
            RecommendationSource::ArtistDiscovery => 0.85,
            RecommendationSource::Reccobeat => 0.7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationSource::AnchorTrack => "anchor_track",
            RecommendationSource::ArtistDiscovery => "artist_discovery",
            RecommendationSource::Reccobeat => "reccobeat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorType {
    User,
    Genre,
    Artist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecommendation {
    pub track_id: String,
    pub track_name: String,
    pub artists: Vec<String>,
    pub spotify_uri: Option<String>,
    #[serde(default)]
    pub audio_features: AudioFeatures,
    pub confidence_score: f64,
    #[serde(default)]
    pub reasoning: String,
    pub source: RecommendationSource,
    #[serde(default)]
    pub user_mentioned: bool,
    #[serde(default)]
    pub user_mentioned_artist: bool,
    #[serde(default)]
    pub protected: bool,
    pub anchor_type: Option<AnchorType>,
    /// Release year, used by the temporal filter (spec §4.4, S4). Not part
    /// of the closed AudioFeatures set since it is catalog metadata, not an
    /// acoustic feature.
    pub release_year: Option<i32>,
    /// Resolved artist country/region, used by the regional filter.
    pub artist_country: Option<String>,
    pub genres: Vec<String>,
}

impl TrackRecommendation {
    /// I1: protected or user-mentioned recs are immune to removal.
    pub fn is_protected(&self) -> bool {
        self.protected || self.user_mentioned
    }
}
