use std::sync::Arc;

use anyhow::{bail, Result};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::{Embedding, EmbeddingProvider};
use crate::report::{PhotoRef, Report};
use crate::scoring::{adjust_score, combined_score, ScoreCalibration};
use crate::TARGET_MATCHING;

/// Minimum adjusted score for a pairing to become a match.
pub const DEFAULT_MATCH_THRESHOLD: i64 = 75;

/// Upper bound on concurrent embedding extractions, so a large candidate set
/// cannot flood the embedding backend.
pub const DEFAULT_EMBEDDING_CONCURRENCY: usize = 4;

/// A spotted/lost pairing that cleared the match threshold. Authoritative
/// input for match-record upserts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CandidateMatch {
    pub spotted_id: Uuid,
    pub lost_id: Uuid,
    /// Owner of the lost pet.
    pub owner_id: Uuid,
    /// Adjusted score: best visual score plus contextual bonuses.
    pub match_score: i64,
    /// Best combined visual score across all photo pairs, before bonuses.
    pub visual_score: i64,
}

#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub threshold: i64,
    pub concurrency: usize,
    pub calibration: ScoreCalibration,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            concurrency: DEFAULT_EMBEDDING_CONCURRENCY,
            calibration: ScoreCalibration::default(),
        }
    }
}

/// Extract embeddings for a report's photos, fanned out concurrently under
/// the shared semaphore. Failed extractions are logged and dropped; the
/// surviving embeddings are returned in photo order.
async fn embed_photos(
    provider: &dyn EmbeddingProvider,
    photos: &[PhotoRef],
    limiter: &Semaphore,
) -> Vec<Embedding> {
    let extractions = photos.iter().map(|photo| async move {
        // Semaphore is never closed, so acquire cannot fail.
        let _permit = limiter.acquire().await.expect("semaphore closed");
        provider.extract(photo).await
    });

    let mut embeddings = Vec::with_capacity(photos.len());
    for (index, result) in join_all(extractions).await.into_iter().enumerate() {
        match result {
            Ok(embedding) => embeddings.push(embedding),
            Err(e) => {
                warn!(target: TARGET_MATCHING,
                    "Skipping photo {} after failed extraction: {}", index, e
                );
            }
        }
    }
    embeddings
}

/// Best combined visual score across every (spotted photo, lost photo) pair.
/// Dimensionality mismatches reject only the offending pair.
fn best_pair_score(
    spotted: &[Embedding],
    lost: &[Embedding],
    calibration: &ScoreCalibration,
) -> Option<i64> {
    let mut best = None;
    for a in spotted {
        for b in lost {
            match combined_score(a, b, calibration) {
                Ok(score) => {
                    if best.map_or(true, |current| score > current) {
                        best = Some(score);
                    }
                }
                Err(e) => {
                    warn!(target: TARGET_MATCHING, "Skipping photo pair: {}", e);
                }
            }
        }
    }
    best
}

/// Rank all lost-pet candidates against one spotted report.
///
/// Embeds the spotted report's photos once, then for each candidate takes the
/// maximum combined score over all photo pairs and adjusts it with contextual
/// bonuses. Candidates without photos are skipped; candidates whose
/// extraction fails are skipped and logged so one bad photo never aborts the
/// batch. The result keeps only candidates at or above the threshold, sorted
/// descending by adjusted score with input order preserved on ties.
pub async fn rank_candidates(
    provider: &dyn EmbeddingProvider,
    spotted: &Report,
    lost_pets: &[Report],
    config: &RankerConfig,
) -> Result<Vec<CandidateMatch>> {
    if !spotted.has_photos() {
        bail!("spotted report {} has no photos to rank", spotted.id);
    }

    let limiter = Arc::new(Semaphore::new(config.concurrency.max(1)));

    let spotted_embeddings = embed_photos(provider, &spotted.photos, &limiter).await;
    if spotted_embeddings.is_empty() {
        // Total extraction failure degrades to an empty match list rather
        // than an error bubbling past the ranking invocation.
        warn!(target: TARGET_MATCHING,
            "All photo extractions failed for spotted report {}; returning no matches",
            spotted.id
        );
        return Ok(Vec::new());
    }

    let scored = join_all(lost_pets.iter().map(|lost| {
        let limiter = Arc::clone(&limiter);
        let spotted_embeddings = &spotted_embeddings;
        async move {
            if !lost.has_photos() {
                debug!(target: TARGET_MATCHING, "Skipping lost report {} with no photos", lost.id);
                return None;
            }

            let lost_embeddings = embed_photos(provider, &lost.photos, &limiter).await;
            if lost_embeddings.is_empty() {
                warn!(target: TARGET_MATCHING,
                    "Skipping lost report {} after failed extractions", lost.id
                );
                return None;
            }

            let visual_score =
                best_pair_score(spotted_embeddings, &lost_embeddings, &config.calibration)?;
            let match_score = adjust_score(visual_score, lost, spotted);

            debug!(target: TARGET_MATCHING,
                "Candidate {}: visual {} adjusted {}",
                lost.id, visual_score, match_score
            );

            Some(CandidateMatch {
                spotted_id: spotted.id,
                lost_id: lost.id,
                owner_id: lost.user_id,
                match_score,
                visual_score,
            })
        }
    }))
    .await;

    let mut matches: Vec<CandidateMatch> = scored
        .into_iter()
        .flatten()
        .filter(|candidate| candidate.match_score >= config.threshold)
        .collect();

    // Stable sort keeps input order for equal scores.
    matches.sort_by(|a, b| b.match_score.cmp(&a.match_score));

    info!(target: TARGET_MATCHING,
        "Ranked {} lost-pet candidates against spotted report {}: {} at or above threshold {}",
        lost_pets.len(), spotted.id, matches.len(), config.threshold
    );

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::ProviderError;
    use crate::report::{Coordinates, ReportKind};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    /// Provider returning canned embeddings keyed by photo URL.
    struct FixtureProvider {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl FixtureProvider {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                vectors: entries
                    .iter()
                    .map(|(url, v)| (url.to_string(), v.clone()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FixtureProvider {
        async fn extract(&self, photo: &PhotoRef) -> Result<Embedding, ProviderError> {
            let key = match photo {
                PhotoRef::Remote(url) => url.clone(),
                PhotoRef::Inline(data) => data.clone(),
            };
            self.vectors
                .get(&key)
                .map(|v| Embedding::new(v.clone()))
                .ok_or_else(|| ProviderError::Malformed(format!("no fixture for {}", key)))
        }
    }

    fn report(kind: ReportKind, photo_urls: &[&str]) -> Report {
        Report {
            id: Uuid::new_v4(),
            kind,
            species: "dog".to_string(),
            breed: None,
            pet_name: None,
            coordinates: Some(Coordinates::new(0.0, 0.0)),
            observed_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            photos: photo_urls
                .iter()
                .map(|u| PhotoRef::Remote(u.to_string()))
                .collect(),
            injured: false,
            distinctive_marks: None,
            description: None,
            user_id: Uuid::new_v4(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            resolved: false,
        }
    }

    #[tokio::test]
    async fn test_identical_photos_rank_first_and_clear_threshold() {
        let provider = FixtureProvider::new(&[
            ("https://p/spotted.jpg", vec![1.0, 0.0, 0.0]),
            ("https://p/twin.jpg", vec![1.0, 0.0, 0.0]),
            ("https://p/stranger.jpg", vec![-0.2, 0.9, 0.4]),
        ]);

        let spotted = report(ReportKind::Spotted, &["https://p/spotted.jpg"]);
        let twin = report(ReportKind::Lost, &["https://p/twin.jpg"]);
        let stranger = report(ReportKind::Lost, &["https://p/stranger.jpg"]);

        let matches = rank_candidates(
            &provider,
            &spotted,
            &[stranger.clone(), twin.clone()],
            &RankerConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].lost_id, twin.id);
        assert_eq!(matches[0].visual_score, 100);
        assert_eq!(matches[0].match_score, 100);
        assert_eq!(matches[0].owner_id, twin.user_id);
    }

    #[tokio::test]
    async fn test_results_sorted_descending_and_thresholded() {
        let provider = FixtureProvider::new(&[
            ("https://p/spotted.jpg", vec![1.0, 0.0]),
            ("https://p/close.jpg", vec![0.98, 0.05]),
            ("https://p/exact.jpg", vec![1.0, 0.0]),
            ("https://p/far.jpg", vec![-1.0, 0.0]),
        ]);

        // No coordinates, distinct species, and distant timestamps, so the
        // adjusted scores stay purely visual and the ordering is unambiguous.
        let mut spotted = report(ReportKind::Spotted, &["https://p/spotted.jpg"]);
        spotted.coordinates = None;
        spotted.species = "cat".to_string();
        spotted.observed_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let strip = |mut r: Report| {
            r.coordinates = None;
            r
        };
        let close = strip(report(ReportKind::Lost, &["https://p/close.jpg"]));
        let exact = strip(report(ReportKind::Lost, &["https://p/exact.jpg"]));
        let far = strip(report(ReportKind::Lost, &["https://p/far.jpg"]));

        let config = RankerConfig::default();
        let matches = rank_candidates(
            &provider,
            &spotted,
            &[close.clone(), exact.clone(), far],
            &config,
        )
        .await
        .unwrap();

        assert!(matches.len() >= 2);
        assert_eq!(matches[0].lost_id, exact.id);
        for window in matches.windows(2) {
            assert!(window[0].match_score >= window[1].match_score);
        }
        for candidate in &matches {
            assert!(candidate.match_score >= config.threshold);
        }
    }

    #[tokio::test]
    async fn test_best_of_all_photo_pairs_is_used() {
        let provider = FixtureProvider::new(&[
            ("https://p/spotted.jpg", vec![1.0, 0.0, 0.0]),
            ("https://p/blurry.jpg", vec![0.0, 1.0, 0.0]),
            ("https://p/sharp.jpg", vec![1.0, 0.0, 0.0]),
        ]);

        let spotted = report(ReportKind::Spotted, &["https://p/spotted.jpg"]);
        let lost = report(
            ReportKind::Lost,
            &["https://p/blurry.jpg", "https://p/sharp.jpg"],
        );

        let matches = rank_candidates(&provider, &spotted, &[lost], &RankerConfig::default())
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].visual_score, 100);
    }

    #[tokio::test]
    async fn test_failing_candidate_is_skipped_not_fatal() {
        let provider = FixtureProvider::new(&[
            ("https://p/spotted.jpg", vec![1.0, 0.0]),
            ("https://p/good.jpg", vec![1.0, 0.0]),
            // "https://p/missing.jpg" has no fixture, so extraction fails.
        ]);

        let spotted = report(ReportKind::Spotted, &["https://p/spotted.jpg"]);
        let good = report(ReportKind::Lost, &["https://p/good.jpg"]);
        let broken = report(ReportKind::Lost, &["https://p/missing.jpg"]);

        let matches = rank_candidates(
            &provider,
            &spotted,
            &[broken, good.clone()],
            &RankerConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].lost_id, good.id);
    }

    #[tokio::test]
    async fn test_candidate_without_photos_is_skipped() {
        let provider = FixtureProvider::new(&[("https://p/spotted.jpg", vec![1.0, 0.0])]);

        let spotted = report(ReportKind::Spotted, &["https://p/spotted.jpg"]);
        let no_photos = report(ReportKind::Lost, &[]);

        let matches = rank_candidates(&provider, &spotted, &[no_photos], &RankerConfig::default())
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_spotted_without_photos_is_an_input_error() {
        let provider = FixtureProvider::new(&[]);
        let spotted = report(ReportKind::Spotted, &[]);
        let lost = report(ReportKind::Lost, &["https://p/a.jpg"]);

        let result = rank_candidates(&provider, &spotted, &[lost], &RankerConfig::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_total_extraction_failure_yields_empty_list() {
        let provider = FixtureProvider::new(&[]);
        let spotted = report(ReportKind::Spotted, &["https://p/unknown.jpg"]);
        let lost = report(ReportKind::Lost, &["https://p/a.jpg"]);

        let matches = rank_candidates(&provider, &spotted, &[lost], &RankerConfig::default())
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
