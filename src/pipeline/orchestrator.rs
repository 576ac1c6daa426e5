//! Orchestrator control loop (spec §4.7-4.8). Ported from
//! `original_source/.../orchestrator/orchestrator_agent.py`, with the
//! stalled-iteration counter fixed to be genuinely stateful across
//! iterations (see DESIGN.md Open Question #1 — the original never
//! reassigns its caller-side local, so the counter has no effect there).

use std::sync::Arc;

use tracing::{info, warn};

use crate::model::{IntentAnalysis, MoodAnalysis, WorkflowState, WorkflowStatus};
use crate::pipeline::improvement_strategy::ImprovementStrategy;
use crate::pipeline::quality_evaluator::{QualityEvaluator, QualityScores};
use crate::pipeline::recommendation_generator::RecommendationGenerator;
use crate::pipeline::seed_gatherer::SeedGatherer;
use crate::pipeline::source_ratio;
use crate::ports::catalog::CatalogPort;
use crate::util::CancellationToken;

pub struct OrchestratorConfig {
    pub max_iterations: u32,
    pub max_stalled: u32,
    pub convergence_threshold: f64,
    pub final_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_iterations: 2,
            max_stalled: 1,
            convergence_threshold: 0.03,
            final_limit: 30,
        }
    }
}

pub struct Orchestrator {
    catalog: Arc<dyn CatalogPort>,
    seed_gatherer: SeedGatherer,
    recommendation_generator: RecommendationGenerator,
    quality_evaluator: QualityEvaluator,
    improvement_strategy: ImprovementStrategy,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogPort>,
        seed_gatherer: SeedGatherer,
        recommendation_generator: RecommendationGenerator,
        quality_evaluator: QualityEvaluator,
        improvement_strategy: ImprovementStrategy,
        config: OrchestratorConfig,
    ) -> Self {
        Orchestrator {
            catalog,
            seed_gatherer,
            recommendation_generator,
            quality_evaluator,
            improvement_strategy,
            config,
        }
    }

    pub async fn execute(
        &self,
        state: &mut WorkflowState,
        access_token: &str,
        intent: &IntentAnalysis,
        mood_analysis: &MoodAnalysis,
        cancel: &CancellationToken,
    ) {
        let target_count = state.metadata.playlist_target.map(|t| t.target_count).unwrap_or(20);
        let min_count = state.metadata.playlist_target.map(|t| t.min_count).unwrap_or(16);
        let quality_threshold = state
            .metadata
            .playlist_target
            .map(|t| t.quality_threshold)
            .unwrap_or(0.75);

        if cancel.is_cancelled() {
            state.set_status(WorkflowStatus::Cancelled);
            return;
        }

        state.set_status(WorkflowStatus::GatheringSeeds);
        let seed_result = self.seed_gatherer.gather(access_token, intent, mood_analysis).await;
        state.recommendations = seed_result.anchors;
        state.seed_tracks = seed_result.seed_track_ids;
        state.push_negative_seeds(seed_result.negative_seeds);

        if cancel.is_cancelled() {
            state.set_status(WorkflowStatus::Cancelled);
            return;
        }

        state.set_status(WorkflowStatus::GeneratingRecommendations);
        self.regenerate(state, access_token, intent, mood_analysis, target_count).await;

        let mut stalled_iterations: u32 = 0;
        let mut previous_overall: Option<f64> = None;

        for iteration in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                state.set_status(WorkflowStatus::Cancelled);
                return;
            }

            state.set_status(WorkflowStatus::EvaluatingQuality);
            state.metadata.orchestration_iterations = iteration;

            let scores = self
                .quality_evaluator
                .evaluate(&state.recommendations, mood_analysis, target_count, min_count, quality_threshold)
                .await;
            state.metadata.quality_scores.push(scores.overall_score);

            info!(
                iteration,
                overall = scores.overall_score,
                cohesion = scores.cohesion_score,
                outliers = scores.outliers.len(),
                "quality evaluation complete"
            );

            if iteration > 0 {
                let delta = previous_overall
                    .map(|prev| scores.overall_score - prev)
                    .unwrap_or(f64::MAX);
                if delta < self.config.convergence_threshold {
                    stalled_iterations += 1;
                } else {
                    stalled_iterations = 0;
                }
                if stalled_iterations >= self.config.max_stalled {
                    info!(iteration, "convergence reached, stopping iteration");
                    previous_overall = Some(scores.overall_score);
                    break;
                }
            }
            previous_overall = Some(scores.overall_score);

            let meets_strict =
                self.quality_evaluator
                    .meets_strict(&scores, state.recommendations.len(), target_count, quality_threshold);
            let meets_relaxed = self.quality_evaluator.meets_relaxed(&scores, state.recommendations.len(), min_count);
            if meets_strict || meets_relaxed {
                info!(iteration, meets_strict, meets_relaxed, "quality threshold met, stopping iteration");
                break;
            }

            if cancel.is_cancelled() {
                state.set_status(WorkflowStatus::Cancelled);
                return;
            }

            state.set_status(WorkflowStatus::OptimizingRecommendations);
            let strategies = self
                .improvement_strategy
                .decide(state, &scores, target_count, min_count)
                .await;
            self.improvement_strategy.apply(&strategies, state, &scores);

            if strategies.iter().any(|s| s.needs_regeneration()) {
                self.regenerate(state, access_token, intent, mood_analysis, target_count).await;
            }
        }

        self.finalize(state, access_token, intent, mood_analysis, target_count).await;
    }

    async fn regenerate(
        &self,
        state: &mut WorkflowState,
        access_token: &str,
        intent: &IntentAnalysis,
        mood_analysis: &MoodAnalysis,
        target_count: u32,
    ) {
        let result = self
            .recommendation_generator
            .generate(
                access_token,
                &state.recommendations,
                &state.seed_tracks,
                &state.negative_seeds,
                intent,
                mood_analysis,
                target_count,
            )
            .await;
        state.recommendations = result.recommendations;
        state.metadata.insufficient_supply = result.insufficient_supply;
    }

    /// Final pass (spec §4.7 step 4): dedup, enrich URIs, drop unresolved
    /// non-protected tracks, re-evaluate, filter outliers, regenerate if
    /// under target, enforce source-ratio, mark ready.
    async fn finalize(
        &self,
        state: &mut WorkflowState,
        access_token: &str,
        intent: &IntentAnalysis,
        mood_analysis: &MoodAnalysis,
        target_count: u32,
    ) {
        let recs = std::mem::take(&mut state.recommendations);
        let mut recs = source_ratio::remove_duplicates(recs);

        for rec in recs.iter_mut() {
            if rec.spotify_uri.is_none() {
                let query = format!(
                    "track:{} artist:{}",
                    rec.track_name,
                    rec.artists.first().map(|s| s.as_str()).unwrap_or("")
                );
                match self.catalog.search_tracks(access_token, &query, 1).await {
                    Ok(mut hits) if !hits.is_empty() => {
                        rec.spotify_uri = hits.remove(0).spotify_uri;
                    }
                    _ => {}
                }
            }
        }

        let before_drop = recs.len();
        recs.retain(|r| r.is_protected() || r.spotify_uri.is_some());
        if recs.len() < before_drop {
            warn!(dropped = before_drop - recs.len(), "dropped unresolved non-protected tracks");
        }

        let final_scores: QualityScores = self
            .quality_evaluator
            .evaluate(&recs, mood_analysis, target_count, target_count, 0.0)
            .await;

        let outlier_ids: std::collections::HashSet<String> = final_scores.outliers.into_iter().collect();
        recs.retain(|r| r.is_protected() || !outlier_ids.contains(&r.track_id));

        if (recs.len() as u32) < target_count {
            warn!(got = recs.len(), target_count, "below target after final pass, regenerating");
            state.recommendations = recs;
            self.regenerate(state, access_token, intent, mood_analysis, target_count).await;
            recs = source_ratio::remove_duplicates(std::mem::take(&mut state.recommendations));

            if (recs.len() as u32) < target_count {
                state.metadata.insufficient_supply = true;
                warn!(got = recs.len(), target_count, "still below target after regeneration");
            }
        }

        let finalized = source_ratio::finalize(recs, self.config.final_limit);
        state.recommendations = finalized;
        state.set_status(WorkflowStatus::RecommendationsReady);
    }
}
