//! Source-ratio & final-partition enforcement (spec §4.8). Ported from
//! `original_source/.../orchestrator/recommendation_processor.py`.

use std::collections::HashSet;

use crate::model::{RecommendationSource, TrackRecommendation};

const MAX_ANCHOR_CAP: usize = 5;
const MAX_TRACKS_PER_ARTIST: usize = 2;

/// I2/dedup guarantee: no duplicate track_id and no duplicate non-null
/// spotify_uri survive (spec P2).
pub fn remove_duplicates(recs: Vec<TrackRecommendation>) -> Vec<TrackRecommendation> {
    let mut seen_ids = HashSet::new();
    let mut seen_uris = HashSet::new();
    recs.into_iter()
        .filter(|r| {
            if !seen_ids.insert(r.track_id.clone()) {
                return false;
            }
            if let Some(uri) = &r.spotify_uri {
                if !seen_uris.insert(uri.clone()) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Open Question resolution #3 (DESIGN.md): cap at most
/// `MAX_TRACKS_PER_ARTIST` per artist, protected tracks exempt, enforced at
/// the dedup step.
pub fn enforce_per_artist_cap(recs: Vec<TrackRecommendation>) -> Vec<TrackRecommendation> {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    recs.into_iter()
        .filter(|r| {
            if r.is_protected() {
                return true;
            }
            let Some(primary_artist) = r.artists.first() else {
                return true;
            };
            let count = counts.entry(primary_artist.clone()).or_insert(0);
            *count += 1;
            *count <= MAX_TRACKS_PER_ARTIST
        })
        .collect()
}

/// Partitions recs by source, caps and sorts per spec §4.8, and
/// concatenates without re-sorting across partitions.
pub fn finalize(recs: Vec<TrackRecommendation>, final_limit: usize) -> Vec<TrackRecommendation> {
    let recs = remove_duplicates(recs);
    let recs = enforce_per_artist_cap(recs);

    let (mut anchors, rest): (Vec<_>, Vec<_>) = recs
        .into_iter()
        .partition(|r| r.source == RecommendationSource::AnchorTrack);

    let (mut user_anchors, mut other_anchors): (Vec<_>, Vec<_>) =
        anchors.drain(..).partition(|r| r.user_mentioned);

    sort_by_confidence_desc(&mut user_anchors);
    sort_by_confidence_desc(&mut other_anchors);
    other_anchors.truncate(MAX_ANCHOR_CAP);

    let mut anchors_final = user_anchors;
    anchors_final.extend(other_anchors);

    let (mut artist_discovery, mut reccobeat): (Vec<_>, Vec<_>) = rest
        .into_iter()
        .partition(|r| r.source == RecommendationSource::ArtistDiscovery);

    let remaining = final_limit.saturating_sub(anchors_final.len());
    let (max_artist, max_reccobeat) = calculate_source_limits(remaining);

    sort_by_confidence_desc(&mut artist_discovery);
    sort_by_confidence_desc(&mut reccobeat);
    artist_discovery.truncate(max_artist);
    reccobeat.truncate(max_reccobeat);

    let mut final_recs = anchors_final;
    final_recs.extend(artist_discovery);
    final_recs.extend(reccobeat);
    final_recs
}

/// Ported from `recommendation_processor.py::calculate_source_limits`:
/// 98% of the non-anchor budget to artist_discovery, the remainder (at
/// least 1) to reccobeat.
fn calculate_source_limits(remaining: usize) -> (usize, usize) {
    let max_artist = ((remaining as f64) * 0.98) as usize;
    let max_reccobeat = remaining.saturating_sub(max_artist).max(1);
    (max_artist, max_reccobeat)
}

fn sort_by_confidence_desc(recs: &mut [TrackRecommendation]) {
    recs.sort_by(|a, b| {
        b.confidence_score
            .partial_cmp(&a.confidence_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AudioFeatures;

    fn track(
        id: &str,
        source: RecommendationSource,
        confidence: f64,
        user_mentioned: bool,
        artist: &str,
    ) -> TrackRecommendation {
        TrackRecommendation {
            track_id: id.to_string(),
            track_name: id.to_string(),
            artists: vec![artist.to_string()],
            spotify_uri: None,
            audio_features: AudioFeatures::default(),
            confidence_score: confidence,
            reasoning: String::new(),
            source,
            user_mentioned,
            user_mentioned_artist: false,
            protected: user_mentioned,
            anchor_type: None,
            release_year: None,
            artist_country: None,
            genres: Vec::new(),
        }
    }

    #[test]
    fn dedup_removes_repeated_ids_and_uris() {
        let mut a = track("a", RecommendationSource::Reccobeat, 0.5, false, "x");
        a.spotify_uri = Some("uri1".to_string());
        let mut b = track("b", RecommendationSource::Reccobeat, 0.5, false, "y");
        b.spotify_uri = Some("uri1".to_string());
        let deduped = remove_duplicates(vec![a, b]);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn per_artist_cap_exempts_protected() {
        let recs = vec![
            track("a", RecommendationSource::ArtistDiscovery, 0.9, false, "same"),
            track("b", RecommendationSource::ArtistDiscovery, 0.8, false, "same"),
            track("c", RecommendationSource::ArtistDiscovery, 0.7, false, "same"),
            track("d", RecommendationSource::AnchorTrack, 1.0, true, "same"),
        ];
        let capped = enforce_per_artist_cap(recs);
        assert_eq!(capped.len(), 3);
    }

    #[test]
    fn user_mentioned_anchors_are_unbounded() {
        let mut recs = Vec::new();
        for i in 0..10 {
            recs.push(track(
                &format!("u{i}"),
                RecommendationSource::AnchorTrack,
                1.0,
                true,
                &format!("artist{i}"),
            ));
        }
        let finalized = finalize(recs, 5);
        assert_eq!(finalized.len(), 10);
    }

    #[test]
    fn non_anchor_ratio_is_roughly_95_5() {
        let mut recs = Vec::new();
        for i in 0..40 {
            recs.push(track(
                &format!("ad{i}"),
                RecommendationSource::ArtistDiscovery,
                0.5,
                false,
                &format!("a{i}"),
            ));
        }
        for i in 0..40 {
            recs.push(track(
                &format!("rb{i}"),
                RecommendationSource::Reccobeat,
                0.5,
                false,
                &format!("b{i}"),
            ));
        }
        let finalized = finalize(recs, 20);
        let artist_count = finalized
            .iter()
            .filter(|r| r.source == RecommendationSource::ArtistDiscovery)
            .count();
        let reccobeat_count = finalized
            .iter()
            .filter(|r| r.source == RecommendationSource::Reccobeat)
            .count();
        assert!(artist_count >= reccobeat_count * 10);
    }
}
