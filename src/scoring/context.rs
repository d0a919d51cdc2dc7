use crate::geo::haversine_km;
use crate::report::Report;

// Bonus scales for the visual pipeline. These are intentionally smaller than
// the metadata-only scales in `alerts::heuristic`: here they nudge an
// already-computed visual score, there they stand in for it.
const SPECIES_BONUS: i64 = 5;
const NEAR_DISTANCE_BONUS: i64 = 5;
const MID_DISTANCE_BONUS: i64 = 3;
const SAME_DAY_BONUS: i64 = 3;
const SAME_WEEK_BONUS: i64 = 2;
const BREED_OVERLAP_BONUS: i64 = 10;

/// Adjust a visual combined score with contextual bonuses from report
/// metadata: species match, spatial proximity between the lost pet's
/// last-known location and the spotted location, temporal proximity of the
/// two observations, and breed-text overlap. Bonuses are additive and
/// non-negative; the result is capped at 100, so the output is monotonically
/// non-decreasing in the visual score.
pub fn adjust_score(visual_score: i64, lost: &Report, spotted: &Report) -> i64 {
    let mut score = visual_score;

    if lost.species.eq_ignore_ascii_case(&spotted.species) {
        score += SPECIES_BONUS;
    }

    if let (Some(lost_at), Some(spotted_at)) = (lost.coordinates, spotted.coordinates) {
        let km = haversine_km(lost_at, spotted_at);
        if km <= 1.0 {
            score += NEAR_DISTANCE_BONUS;
        } else if km <= 3.0 {
            score += MID_DISTANCE_BONUS;
        }
    }

    let days_apart = (lost.observed_at - spotted.observed_at).num_days().abs();
    if days_apart <= 1 {
        score += SAME_DAY_BONUS;
    } else if days_apart <= 3 {
        score += SAME_WEEK_BONUS;
    }

    if let (Some(breed), Some(description)) = (&lost.breed, &spotted.description) {
        if !breed.is_empty()
            && description
                .to_lowercase()
                .contains(&breed.to_lowercase())
        {
            score += BREED_OVERLAP_BONUS;
        }
    }

    score.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Coordinates, PhotoRef, ReportKind};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn report(kind: ReportKind) -> Report {
        Report {
            id: Uuid::new_v4(),
            kind,
            species: "dog".to_string(),
            breed: None,
            pet_name: None,
            coordinates: None,
            observed_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            photos: vec![PhotoRef::Remote("https://example.com/a.jpg".to_string())],
            injured: false,
            distinctive_marks: None,
            description: None,
            user_id: Uuid::new_v4(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            resolved: false,
        }
    }

    #[test]
    fn test_species_spatial_and_temporal_bonuses() {
        // Lost pet at (0,0), spotted ~1 km away the same day, same species:
        // 70 + 5 + 5 + 3 = 83.
        let mut lost = report(ReportKind::Lost);
        lost.coordinates = Some(Coordinates::new(0.0, 0.0));

        let mut spotted = report(ReportKind::Spotted);
        spotted.coordinates = Some(Coordinates::new(0.0, 0.009));

        assert_eq!(adjust_score(70, &lost, &spotted), 83);
    }

    #[test]
    fn test_no_metadata_passes_score_through() {
        let mut lost = report(ReportKind::Lost);
        lost.species = "cat".to_string();
        lost.observed_at = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let spotted = report(ReportKind::Spotted);

        assert_eq!(adjust_score(70, &lost, &spotted), 70);
    }

    #[test]
    fn test_breed_substring_bonus() {
        let mut lost = report(ReportKind::Lost);
        lost.species = "bird".to_string();
        lost.breed = Some("Cockatiel".to_string());
        lost.observed_at = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();

        let mut spotted = report(ReportKind::Spotted);
        spotted.species = "dog".to_string();
        spotted.description = Some("small grey cockatiel with yellow crest".to_string());

        assert_eq!(adjust_score(60, &lost, &spotted), 70);
    }

    #[test]
    fn test_mid_distance_and_mid_temporal_bands() {
        let mut lost = report(ReportKind::Lost);
        lost.species = "cat".to_string();
        lost.coordinates = Some(Coordinates::new(0.0, 0.0));
        lost.observed_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut spotted = report(ReportKind::Spotted);
        spotted.species = "dog".to_string();
        // ~2.2 km away, 3 days later.
        spotted.coordinates = Some(Coordinates::new(0.0, 0.02));
        spotted.observed_at = Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap();

        assert_eq!(adjust_score(50, &lost, &spotted), 55);
    }

    #[test]
    fn test_adjusted_score_is_capped_at_100() {
        let mut lost = report(ReportKind::Lost);
        lost.breed = Some("labrador".to_string());
        lost.coordinates = Some(Coordinates::new(0.0, 0.0));

        let mut spotted = report(ReportKind::Spotted);
        spotted.coordinates = Some(Coordinates::new(0.0, 0.0));
        spotted.description = Some("friendly labrador".to_string());

        assert_eq!(adjust_score(99, &lost, &spotted), 100);
    }

    #[test]
    fn test_adjustment_never_lowers_the_visual_score() {
        let lost = report(ReportKind::Lost);
        let spotted = report(ReportKind::Spotted);
        for visual in [0, 25, 75, 100] {
            assert!(adjust_score(visual, &lost, &spotted) >= visual);
        }
    }
}
