use crate::geo::haversine_km;
use crate::report::Report;

/// Minimum heuristic score for a pairing to surface as a match alert.
pub const ALERT_SCORE_THRESHOLD: i64 = 75;

/// Scores at or above this are presented as high-confidence matches.
pub const HIGH_MATCH_THRESHOLD: i64 = 90;

/// Metadata-only match score between one lost pet and one spotted report.
///
/// This is the cheap proxy used by the periodic client-side alert scan: it
/// never calls the embedding backend, so its bonus scales are much larger
/// than the ones in `scoring::context`, which only nudge an
/// already-computed visual score. The two scales are deliberately distinct.
pub fn metadata_match_score(lost: &Report, spotted: &Report) -> i64 {
    let mut score = 0;

    if lost.species.eq_ignore_ascii_case(&spotted.species) {
        score += 40;
    }

    if let (Some(lost_at), Some(spotted_at)) = (lost.coordinates, spotted.coordinates) {
        let km = haversine_km(lost_at, spotted_at);
        if km <= 1.0 {
            score += 30;
        } else if km <= 3.0 {
            score += 20;
        } else if km <= 5.0 {
            score += 10;
        }
    }

    let days_apart = (lost.observed_at - spotted.observed_at).num_days().abs();
    if days_apart <= 1 {
        score += 20;
    } else if days_apart <= 3 {
        score += 15;
    } else if days_apart <= 7 {
        score += 10;
    }

    if let (Some(breed), Some(description)) = (&lost.breed, &spotted.description) {
        if !breed.is_empty()
            && description
                .to_lowercase()
                .contains(&breed.to_lowercase())
        {
            score += 10;
        }
    }

    score
}
