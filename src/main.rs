use std::sync::Arc;

use mood_orchestrator::config::Config;
use mood_orchestrator::model::{WorkflowState, WorkflowStatus};
use mood_orchestrator::pipeline::{
    ImprovementStrategy, IntentAnalyzer, MoodAnalyzer, Orchestrator, OrchestratorConfig,
    PlaylistOrderer, QualityEvaluator, RecommendationGenerator, SeedGatherer,
};
use mood_orchestrator::ports::cache::{CachePort, RedisCache};
use mood_orchestrator::ports::catalog::{CatalogPort, HttpCatalog};
use mood_orchestrator::ports::llm::{AnthropicLLM, LLMPort};
use mood_orchestrator::ports::mock::{FixtureCatalog, InMemoryCache};
use mood_orchestrator::util::{CancellationToken, RateGate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mood_orchestrator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("configuration loaded");

    let llm: Option<Arc<dyn LLMPort>> = config
        .anthropic_api_key
        .as_ref()
        .map(|key| Arc::new(AnthropicLLM::new(key.clone())) as Arc<dyn LLMPort>);

    if llm.is_some() {
        tracing::info!("LLM-assisted stages enabled");
    } else {
        tracing::warn!("ANTHROPIC_API_KEY not set, running with rule-based fallbacks only");
    }

    let top_tracks_gate = Arc::new(RateGate::new(config.artist_top_tracks_interval));

    let catalog: Arc<dyn CatalogPort> = match &config.catalog_access_token {
        Some(_) => Arc::new(HttpCatalog::new(config.catalog_base_url.clone(), top_tracks_gate)),
        None => {
            tracing::warn!("CATALOG_ACCESS_TOKEN not set, running against an empty fixture catalog");
            Arc::new(FixtureCatalog::default())
        }
    };

    let _cache: Arc<dyn CachePort> = match &config.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(redis) => Arc::new(redis),
            Err(err) => {
                tracing::warn!(error = %err, "failed to connect to redis, falling back to in-memory cache");
                Arc::new(InMemoryCache::default())
            }
        },
        None => Arc::new(InMemoryCache::default()),
    };

    let access_token = config.catalog_access_token.clone().unwrap_or_default();

    let mood_prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "late night drive through the city, moody synths".to_string());

    let mut state = WorkflowState::new(uuid::Uuid::new_v4().to_string(), mood_prompt.clone());
    let cancel = CancellationToken::new();

    let intent_analyzer = IntentAnalyzer::new(llm.clone());
    let intent = intent_analyzer.analyze(&mood_prompt).await;
    state.intent = Some(intent.clone());

    let mood_analyzer = MoodAnalyzer::new(llm.clone());
    let (mood_analysis, playlist_target) = mood_analyzer.analyze(&mood_prompt).await;
    state.mood_analysis = Some(mood_analysis.clone());
    state.metadata.target_features = mood_analysis.target_feature_midpoints();
    state.metadata.feature_weights = mood_analysis.feature_weights.clone();
    state.metadata.playlist_target = Some(playlist_target);

    let seed_gatherer = SeedGatherer::new(catalog.clone(), llm.clone());
    let recommendation_generator = RecommendationGenerator::new(catalog.clone());
    let quality_evaluator = QualityEvaluator::new(llm.clone());
    let improvement_strategy = ImprovementStrategy::new(llm.clone(), config.cohesion_threshold);

    let orchestrator = Orchestrator::new(
        catalog.clone(),
        seed_gatherer,
        recommendation_generator,
        quality_evaluator,
        improvement_strategy,
        OrchestratorConfig {
            max_iterations: config.max_iterations,
            max_stalled: config.max_stalled,
            convergence_threshold: config.convergence_threshold,
            final_limit: playlist_target.target_count as usize,
        },
    );

    orchestrator
        .execute(&mut state, &access_token, &intent, &mood_analysis, &cancel)
        .await;

    if state.status == WorkflowStatus::RecommendationsReady {
        let playlist_orderer = PlaylistOrderer::new(llm.clone());
        let ordered = playlist_orderer.order(state.recommendations.clone()).await;
        state.recommendations = ordered.tracks;

        tracing::info!(
            arc = %ordered.arc,
            phases = ?ordered.phase_distribution,
            track_count = state.recommendations.len(),
            "playlist ready"
        );
        for (i, track) in state.recommendations.iter().enumerate() {
            println!(
                "{:>2}. {} — {} ({})",
                i + 1,
                track.track_name,
                track.artists.join(", "),
                track.source.as_str()
            );
        }
    } else {
        tracing::warn!(status = ?state.status, "workflow did not reach recommendations_ready");
    }

    Ok(())
}
