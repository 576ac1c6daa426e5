//! ImprovementStrategy (spec §4.6). Ported from `original_source/.../
//! orchestrator/improvement_strategy.py`. Strategy decisions and local state
//! edits live here; the actual recommendation regeneration call is owned by
//! the orchestrator, which calls back into RecommendationGenerator when a
//! strategy's `needs_regeneration()` is true.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::model::{TrackRecommendation, WorkflowState};
use crate::pipeline::quality_evaluator::QualityScores;
use crate::ports::llm::{CompletionRequest, LLMPort, Message};
use crate::util::json_extract::parse_first_json;

const VALID_STRATEGIES: &[&str] = &[
    "filter_and_replace",
    "reseed_from_clean",
    "adjust_feature_weights",
    "generate_more",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    FilterAndReplace,
    ReseedFromClean,
    AdjustFeatureWeights,
    GenerateMore,
}

impl Strategy {
    fn as_str(self) -> &'static str {
        match self {
            Strategy::FilterAndReplace => "filter_and_replace",
            Strategy::ReseedFromClean => "reseed_from_clean",
            Strategy::AdjustFeatureWeights => "adjust_feature_weights",
            Strategy::GenerateMore => "generate_more",
        }
    }

    fn parse(s: &str) -> Option<Strategy> {
        match s {
            "filter_and_replace" => Some(Strategy::FilterAndReplace),
            "reseed_from_clean" => Some(Strategy::ReseedFromClean),
            "adjust_feature_weights" => Some(Strategy::AdjustFeatureWeights),
            "generate_more" => Some(Strategy::GenerateMore),
            _ => None,
        }
    }

    /// Strategies that require RecommendationGenerator to run again before
    /// the next QualityEvaluator pass.
    pub fn needs_regeneration(self) -> bool {
        matches!(
            self,
            Strategy::FilterAndReplace | Strategy::ReseedFromClean | Strategy::GenerateMore
        )
    }
}

pub struct ImprovementStrategy {
    llm: Option<Arc<dyn LLMPort>>,
    cohesion_threshold: f64,
}

#[derive(serde::Deserialize)]
struct LlmStrategyDecision {
    #[serde(default)]
    strategies: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

impl ImprovementStrategy {
    pub fn new(llm: Option<Arc<dyn LLMPort>>, cohesion_threshold: f64) -> Self {
        ImprovementStrategy {
            llm,
            cohesion_threshold,
        }
    }

    pub async fn decide(
        &self,
        state: &WorkflowState,
        scores: &QualityScores,
        target_count: u32,
        min_count: u32,
    ) -> Vec<Strategy> {
        if let Some(llm) = &self.llm {
            if let Some(strategies) = self.try_llm_decide(llm.as_ref(), state, scores, target_count).await {
                if !strategies.is_empty() {
                    info!(?strategies, "LLM suggested improvement strategies");
                    return strategies;
                }
            }
        }

        self.decide_fallback(scores, state.recommendations.len(), target_count, min_count)
    }

    fn decide_fallback(
        &self,
        scores: &QualityScores,
        recommendations_count: usize,
        target_count: u32,
        min_count: u32,
    ) -> Vec<Strategy> {
        let mut strategies = Vec::new();
        let outlier_count = scores.outliers.len();

        if outlier_count > 0 && recommendations_count as u32 > min_count {
            strategies.push(Strategy::FilterAndReplace);
        }

        // filter_and_replace already remediates cohesion by dropping outliers;
        // adjust_feature_weights and reseed_from_clean are alternatives to it,
        // not additions.
        if scores.cohesion_score < self.cohesion_threshold && !strategies.contains(&Strategy::FilterAndReplace) {
            strategies.push(Strategy::AdjustFeatureWeights);
        }

        if scores.cohesion_score < 0.6 && recommendations_count as u32 >= min_count {
            if !strategies.contains(&Strategy::FilterAndReplace) {
                strategies.push(Strategy::ReseedFromClean);
            }
        }

        if (recommendations_count as u32) < target_count {
            strategies.push(Strategy::GenerateMore);
        }

        if strategies.is_empty() {
            strategies = vec![Strategy::AdjustFeatureWeights, Strategy::GenerateMore];
        }

        strategies
    }

    async fn try_llm_decide(
        &self,
        llm: &dyn LLMPort,
        state: &WorkflowState,
        scores: &QualityScores,
        target_count: u32,
    ) -> Option<Vec<Strategy>> {
        let issues_summary = scores
            .outliers
            .iter()
            .map(|id| format!("- outlier track {id}"))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Mood: \"{}\". Current playlist has {} tracks (target {target_count}), \
             cohesion={:.2}, overall={:.2}, outliers={}. Issues:\n{issues_summary}\n\
             Decide which improvement strategies to apply. Valid strategies: \
             filter_and_replace, reseed_from_clean, adjust_feature_weights, generate_more. \
             Respond with JSON {{\"strategies\": [...], \"reasoning\": \"...\"}}",
            state.mood_prompt,
            state.recommendations.len(),
            scores.cohesion_score,
            scores.overall_score,
            scores.outliers.len(),
        );

        let response = llm
            .complete(CompletionRequest {
                messages: vec![Message {
                    role: "user".to_string(),
                    content: prompt,
                }],
                model: "claude-3-haiku-20240307".to_string(),
                temperature: 0.3,
                max_tokens: 256,
                timeout: Duration::from_secs(60),
            })
            .await
            .ok()?;

        let decision: LlmStrategyDecision = parse_first_json(&response.text)?;
        info!(reasoning = %decision.reasoning, "LLM strategy reasoning");

        let filtered: Vec<Strategy> = decision
            .strategies
            .iter()
            .filter(|s| VALID_STRATEGIES.contains(&s.as_str()))
            .filter_map(|s| Strategy::parse(s))
            .collect();

        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    /// Mutates `state` in place per the decided strategies (spec §4.6).
    /// Strategies that require regeneration leave `state.recommendations`/
    /// `state.seed_tracks` primed for the orchestrator's next
    /// RecommendationGenerator call.
    pub fn apply(&self, strategies: &[Strategy], state: &mut WorkflowState, scores: &QualityScores) {
        let iteration = state.metadata.orchestration_iterations;
        state.metadata.improvement_actions.push(crate::model::ImprovementAction {
            strategies: strategies.iter().map(|s| s.as_str().to_string()).collect(),
            iteration,
        });

        for strategy in strategies {
            info!(strategy = strategy.as_str(), "applying improvement strategy");
            match strategy {
                Strategy::FilterAndReplace => self.filter_and_replace(state, scores),
                Strategy::ReseedFromClean => self.reseed_from_clean(state),
                Strategy::AdjustFeatureWeights => self.adjust_feature_weights(state),
                Strategy::GenerateMore => {}
            }
        }
    }

    fn filter_and_replace(&self, state: &mut WorkflowState, scores: &QualityScores) {
        let mut outlier_ids: HashSet<String> = scores.outliers.iter().cloned().collect();

        let mut good = Vec::new();
        let mut protected_kept = 0;
        for rec in state.recommendations.drain(..).collect::<Vec<_>>() {
            if outlier_ids.contains(&rec.track_id) {
                if rec.is_protected() {
                    info!(track = %rec.track_name, "keeping outlier because it's protected");
                    outlier_ids.remove(&rec.track_id);
                    protected_kept += 1;
                    good.push(rec);
                }
            } else {
                good.push(rec);
            }
        }

        info!(
            filtered = outlier_ids.len(),
            kept = good.len(),
            protected_kept,
            "filtered outliers"
        );

        if !outlier_ids.is_empty() {
            state.push_negative_seeds(outlier_ids);
        }

        let new_seeds: Vec<String> = good.iter().take(5).map(|r| r.track_id.clone()).collect();
        if !new_seeds.is_empty() {
            state.seed_tracks = new_seeds;
            state.recommendations = good;
        } else {
            warn!("filter_and_replace left no seeds, keeping previous recommendations");
            state.recommendations = good;
        }
    }

    fn reseed_from_clean(&self, state: &mut WorkflowState) {
        let mut scored: Vec<(TrackRecommendation, f64)> = state
            .recommendations
            .drain(..)
            .map(|r| {
                let score = r.confidence_score;
                (r, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let top: Vec<(TrackRecommendation, f64)> = scored.iter().take(5).cloned().collect();
        let bottom_start = scored.len().saturating_sub(3);
        let bottom = &scored[bottom_start..];

        let mut outlier_ids = Vec::new();
        for (rec, _) in bottom {
            if !rec.is_protected() {
                outlier_ids.push(rec.track_id.clone());
            } else {
                info!(track = %rec.track_name, "skipping protected track from negative seeds");
            }
        }

        if !outlier_ids.is_empty() {
            state.push_negative_seeds(outlier_ids);
        }

        let new_seeds: Vec<String> = top.iter().map(|(r, _)| r.track_id.clone()).collect();
        state.recommendations = top.into_iter().map(|(r, _)| r).collect();
        state.seed_tracks = new_seeds;
    }

    fn adjust_feature_weights(&self, state: &mut WorkflowState) {
        let current = state.metadata.feature_weight;
        let new_weight = (current + 0.3_f64).min(5.0);
        state.metadata.feature_weight = new_weight;
        info!(from = current, to = new_weight, "adjusted feature weight");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(cohesion: f64, overall: f64, outliers: usize) -> QualityScores {
        QualityScores {
            coverage_score: 1.0,
            cohesion_score: cohesion,
            confidence_score: 0.8,
            diversity_score: 0.8,
            overall_score: overall,
            outliers: (0..outliers).map(|i| format!("t{i}")).collect(),
        }
    }

    #[test]
    fn low_cohesion_triggers_weight_adjustment() {
        let strategy = ImprovementStrategy::new(None, 0.65);
        let decided = strategy.decide_fallback(&scores(0.5, 0.5, 0), 18, 20, 16);
        assert!(decided.contains(&Strategy::AdjustFeatureWeights));
        assert!(decided.contains(&Strategy::ReseedFromClean));
    }

    #[test]
    fn insufficient_count_triggers_generate_more() {
        let strategy = ImprovementStrategy::new(None, 0.65);
        let decided = strategy.decide_fallback(&scores(0.8, 0.8, 0), 10, 20, 16);
        assert!(decided.contains(&Strategy::GenerateMore));
    }

    #[test]
    fn empty_strategy_set_defaults() {
        let strategy = ImprovementStrategy::new(None, 0.65);
        let decided = strategy.decide_fallback(&scores(0.9, 0.9, 0), 20, 20, 16);
        assert_eq!(decided, vec![Strategy::AdjustFeatureWeights, Strategy::GenerateMore]);
    }

    #[test]
    fn filter_and_replace_suppresses_weight_adjustment() {
        let strategy = ImprovementStrategy::new(None, 0.65);
        let decided = strategy.decide_fallback(&scores(0.55, 0.55, 3), 18, 20, 16);
        assert_eq!(decided, vec![Strategy::FilterAndReplace, Strategy::GenerateMore]);
    }

    #[test]
    fn adjust_feature_weights_caps_at_five() {
        let strategy = ImprovementStrategy::new(None, 0.65);
        let mut state = WorkflowState::new("s1", "chill vibes");
        state.metadata.feature_weight = 4.9;
        strategy.adjust_feature_weights(&mut state);
        assert!((state.metadata.feature_weight - 5.0).abs() < 1e-9);
    }
}
