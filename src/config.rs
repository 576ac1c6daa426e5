use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub catalog_base_url: String,
    pub catalog_access_token: Option<String>,
    pub redis_url: Option<String>,

    /// Maximum orchestrator improvement iterations (spec §4.7 default 2).
    pub max_iterations: u32,
    /// Cohesion threshold for the strict meets-threshold predicate (spec §4.5).
    pub cohesion_threshold: f64,
    /// Minimum Δoverall_score to avoid counting as a stalled iteration.
    pub convergence_threshold: f64,
    /// Consecutive stalled iterations before the orchestrator stops early.
    pub max_stalled: u32,

    /// Minimum spacing between artist-top-tracks requests (spec §5).
    pub artist_top_tracks_interval: Duration,
    pub llm_timeout: Duration,
    pub catalog_timeout: Duration,
    pub playlist_orderer_batch_timeout: Duration,
    pub playlist_orderer_batch_size: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let max_iterations = env::var("MAX_ITERATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        let cohesion_threshold = env::var("COHESION_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.65);

        let convergence_threshold = env::var("CONVERGENCE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.03);

        let max_stalled = env::var("MAX_STALLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        Ok(Config {
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            catalog_base_url: env::var("CATALOG_BASE_URL")
                .unwrap_or_else(|_| "https://api.example-catalog.test".to_string()),
            catalog_access_token: env::var("CATALOG_ACCESS_TOKEN").ok(),
            redis_url: env::var("REDIS_URL").ok(),
            max_iterations,
            cohesion_threshold,
            convergence_threshold,
            max_stalled,
            artist_top_tracks_interval: Duration::from_millis(1500),
            llm_timeout: Duration::from_secs(60),
            catalog_timeout: Duration::from_secs(20),
            playlist_orderer_batch_timeout: Duration::from_secs(45),
            playlist_orderer_batch_size: 8,
        })
    }
}
