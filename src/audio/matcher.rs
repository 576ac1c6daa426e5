//! Pure cohesion-scoring and violation-detection library (spec §4.*, "a pure
//! function library for cohesion scoring and violation detection"). Ported
//! from `original_source/.../recommender/utils/audio_feature_matcher.py`,
//! keeping its exact tolerance constants (SPEC_FULL.md §D).

use std::collections::HashMap;

use crate::model::FeatureTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    Base,
    Extended,
    Relaxed,
}

fn tolerance_for(mode: ToleranceMode, feature: &str) -> Option<f64> {
    let v = match mode {
        ToleranceMode::Base => match feature {
            "energy" => 0.25,
            "valence" => 0.30,
            "danceability" => 0.30,
            "acousticness" => 0.40,
            "instrumentalness" => 0.25,
            "speechiness" => 0.25,
            "tempo" => 35.0,
            "loudness" => 6.0,
            "liveness" => 0.40,
            "popularity" => 30.0,
            _ => return None,
        },
        ToleranceMode::Extended => match feature {
            "energy" => 0.20,
            "valence" => 0.25,
            "danceability" => 0.20,
            "acousticness" => 0.25,
            "instrumentalness" => 0.15,
            "speechiness" => 0.15,
            "tempo" => 30.0,
            "loudness" => 5.0,
            "liveness" => 0.30,
            "popularity" => 20.0,
            _ => return None,
        },
        ToleranceMode::Relaxed => match feature {
            "energy" => 0.35,
            "valence" => 0.35,
            "danceability" => 0.35,
            "acousticness" => 0.45,
            "instrumentalness" => 0.30,
            "speechiness" => 0.30,
            "tempo" => 45.0,
            "loudness" => 7.0,
            "liveness" => 0.45,
            "popularity" => 35.0,
            _ => return None,
        },
    };
    Some(v)
}

/// Default per-feature importance weights used when MoodAnalyzer supplies
/// none (spec §4.2, original `FeatureExtractor.extract_feature_weights`).
pub fn default_feature_weights() -> HashMap<String, f64> {
    [
        ("energy", 0.8),
        ("valence", 0.8),
        ("danceability", 0.6),
        ("acousticness", 0.6),
        ("instrumentalness", 0.5),
        ("tempo", 0.4),
        ("mode", 0.4),
        ("loudness", 0.3),
        ("speechiness", 0.3),
        ("liveness", 0.2),
        ("key", 0.2),
        ("popularity", 0.1),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub struct Violation {
    pub description: String,
    pub is_critical: bool,
}

pub struct AudioFeatureMatcher;

impl AudioFeatureMatcher {
    /// Cohesion score in [0,1] between a track's audio features and the
    /// target mood profile (spec §4.3-4.5).
    pub fn calculate_cohesion(
        audio_features: &HashMap<String, f64>,
        target_features: &HashMap<String, FeatureTarget>,
        feature_weights: Option<&HashMap<String, f64>>,
        source: Option<&str>,
        tolerance_mode: ToleranceMode,
    ) -> f64 {
        if audio_features.is_empty() || target_features.is_empty() {
            return match source {
                Some("reccobeat") => 0.65,
                Some("artist_discovery") => 0.75,
                _ => 0.70,
            };
        }

        let mut weighted_matches: Vec<(f64, f64)> = Vec::new();

        for (feature_name, target_value) in target_features {
            let Some(actual_value) = audio_features.get(feature_name) else {
                continue;
            };
            let Some(tolerance) = tolerance_for(tolerance_mode, feature_name) else {
                continue;
            };

            let weight = feature_weights
                .and_then(|w| w.get(feature_name).copied())
                .unwrap_or(if feature_weights.is_some() { 0.5 } else { 1.0 });

            let target_single = target_value.midpoint();
            let difference = (actual_value - target_single).abs();
            let match_score = (1.0 - difference / tolerance).max(0.0);

            weighted_matches.push((match_score, weight));
        }

        if weighted_matches.is_empty() {
            return 0.70;
        }

        if feature_weights.is_some() {
            let total_weight: f64 = weighted_matches.iter().map(|(_, w)| w).sum();
            if total_weight > 0.0 {
                weighted_matches
                    .iter()
                    .map(|(score, w)| score * w)
                    .sum::<f64>()
                    / total_weight
            } else {
                0.0
            }
        } else {
            weighted_matches.iter().map(|(score, _)| score).sum::<f64>()
                / weighted_matches.len() as f64
        }
    }

    /// Range/value violations against a target profile, with critical-count
    /// tracking (spec §9 critical-feature cap). `critical_features`
    /// defaults to energy/acousticness/instrumentalness/danceability.
    pub fn check_feature_violations(
        audio_features: &HashMap<String, f64>,
        target_features: &HashMap<String, FeatureTarget>,
        tolerance_extensions: Option<&HashMap<String, f64>>,
        critical_features: Option<&[&str]>,
    ) -> (Vec<String>, u32) {
        let default_critical = ["energy", "acousticness", "instrumentalness", "danceability"];
        let critical: &[&str] = critical_features.unwrap_or(&default_critical);

        let mut violations = Vec::new();
        let mut critical_violations = 0u32;

        for (feature_name, target_value) in target_features {
            let Some(&actual_value) = audio_features.get(feature_name) else {
                continue;
            };
            let extension = tolerance_extensions.and_then(|t| t.get(feature_name).copied());

            let info = match target_value {
                FeatureTarget::Range([min_val, max_val]) => check_range_violation(
                    feature_name,
                    *min_val,
                    *max_val,
                    actual_value,
                    extension,
                    critical,
                ),
                FeatureTarget::Single(target) => check_single_value_violation(
                    feature_name,
                    *target,
                    actual_value,
                    extension,
                    critical,
                ),
            };

            if let Some(v) = info {
                if v.is_critical {
                    critical_violations += 1;
                }
                violations.push(v.description);
            }
        }

        (violations, critical_violations)
    }
}

fn check_range_violation(
    feature_name: &str,
    min_val: f64,
    max_val: f64,
    actual_value: f64,
    tolerance_extension: Option<f64>,
    critical_features: &[&str],
) -> Option<Violation> {
    let (extended_min, extended_max) = match tolerance_extension {
        Some(ext) => {
            let cap = if feature_name == "tempo" { 250.0 } else { 1.0 };
            ((min_val - ext).max(0.0), (max_val + ext).min(cap))
        }
        None => (min_val, max_val),
    };

    if actual_value < extended_min || actual_value > extended_max {
        let distance_below = if actual_value < extended_min {
            extended_min - actual_value
        } else {
            0.0
        };
        let distance_above = if actual_value > extended_max {
            actual_value - extended_max
        } else {
            0.0
        };
        let distance = distance_below.max(distance_above);

        let is_critical = critical_features.contains(&feature_name)
            && tolerance_extension.map(|ext| distance > ext * 2.0).unwrap_or(false);

        Some(Violation {
            description: format!(
                "{feature_name}: range=[{min_val:.2}, {max_val:.2}], extended=[{extended_min:.2}, {extended_max:.2}], actual={actual_value:.2}, out_by={distance:.2}"
            ),
            is_critical,
        })
    } else {
        None
    }
}

fn check_single_value_violation(
    feature_name: &str,
    target_value: f64,
    actual_value: f64,
    tolerance_extension: Option<f64>,
    critical_features: &[&str],
) -> Option<Violation> {
    let tolerance_extension = tolerance_extension?;
    if feature_name == "mode" || feature_name == "key" {
        return None;
    }

    let difference = (actual_value - target_value).abs();
    if difference > tolerance_extension {
        let is_critical =
            critical_features.contains(&feature_name) && difference > tolerance_extension * 2.0;
        Some(Violation {
            description: format!(
                "{feature_name}: target={target_value:.2}, actual={actual_value:.2}, diff={difference:.2}"
            ),
            is_critical,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn targets(pairs: &[(&str, FeatureTarget)]) -> HashMap<String, FeatureTarget> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn empty_features_uses_source_default() {
        let empty = HashMap::new();
        let t = targets(&[("energy", FeatureTarget::Single(0.5))]);
        assert_eq!(
            AudioFeatureMatcher::calculate_cohesion(&empty, &t, None, Some("reccobeat"), ToleranceMode::Base),
            0.65
        );
        assert_eq!(
            AudioFeatureMatcher::calculate_cohesion(&empty, &t, None, Some("artist_discovery"), ToleranceMode::Base),
            0.75
        );
        assert_eq!(
            AudioFeatureMatcher::calculate_cohesion(&empty, &t, None, None, ToleranceMode::Base),
            0.70
        );
    }

    #[test]
    fn perfect_match_scores_one() {
        let f = features(&[("energy", 0.5), ("valence", 0.5)]);
        let t = targets(&[
            ("energy", FeatureTarget::Single(0.5)),
            ("valence", FeatureTarget::Single(0.5)),
        ]);
        let score = AudioFeatureMatcher::calculate_cohesion(&f, &t, None, None, ToleranceMode::Base);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn far_off_value_scores_zero_for_that_feature() {
        let f = features(&[("energy", 1.0)]);
        let t = targets(&[("energy", FeatureTarget::Single(0.0))]);
        // difference 1.0 / tolerance 0.25 > 1.0, clamps to 0
        let score = AudioFeatureMatcher::calculate_cohesion(&f, &t, None, None, ToleranceMode::Base);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn range_violation_flags_critical_when_far_past_extension() {
        let f = features(&[("energy", 0.95)]);
        let t = targets(&[("energy", FeatureTarget::Range([0.0, 0.3]))]);
        let mut ext = HashMap::new();
        ext.insert("energy".to_string(), 0.1);
        let (violations, critical) =
            AudioFeatureMatcher::check_feature_violations(&f, &t, Some(&ext), None);
        assert_eq!(violations.len(), 1);
        assert_eq!(critical, 1);
    }

    #[test]
    fn mode_and_key_never_flagged_without_extension() {
        let f = features(&[("mode", 1.0)]);
        let t = targets(&[("mode", FeatureTarget::Single(0.0))]);
        let (violations, critical) = AudioFeatureMatcher::check_feature_violations(&f, &t, None, None);
        assert!(violations.is_empty());
        assert_eq!(critical, 0);
    }
}
