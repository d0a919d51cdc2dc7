use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geographic coordinates in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Whether a report describes a pet lost from home or an animal spotted on
/// the streets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Lost,
    Spotted,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Lost => "lost",
            ReportKind::Spotted => "spotted",
        }
    }
}

impl From<&str> for ReportKind {
    fn from(value: &str) -> Self {
        match value {
            "lost" => ReportKind::Lost,
            _ => ReportKind::Spotted,
        }
    }
}

/// Reference to a report photo. The embedding backend accepts both remote
/// URLs and inline base64-encoded image payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum PhotoRef {
    Remote(String),
    Inline(String),
}

/// A species sighting: either a pet lost from home or an animal spotted on
/// the streets. Immutable after creation apart from soft resolution, which
/// removes the report from future ranking without invalidating existing
/// match records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub kind: ReportKind,
    /// Animal type, e.g. "dog" or "cat". Compared case-insensitively.
    pub species: String,
    pub breed: Option<String>,
    /// Name of the pet, only meaningful for lost reports.
    pub pet_name: Option<String>,
    /// Last-known (lost) or sighting (spotted) location. Reports without
    /// coordinates still rank visually but contribute no spatial bonus.
    pub coordinates: Option<Coordinates>,
    /// When the animal was last seen (lost) or observed (spotted).
    pub observed_at: DateTime<Utc>,
    pub photos: Vec<PhotoRef>,
    /// Set on spotted reports when the animal appears hurt; drives
    /// injured-proximity alerts.
    pub injured: bool,
    pub distinctive_marks: Option<String>,
    /// Free-text details supplied by the reporter.
    pub description: Option<String>,
    /// Owner (lost) or reporter (spotted).
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

impl Report {
    pub fn has_photos(&self) -> bool {
        !self.photos.is_empty()
    }
}

/// Lifecycle status of a match record, driven by owner actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Viewed,
    Confirmed,
    Dismissed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Viewed => "viewed",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Dismissed => "dismissed",
        }
    }
}

impl From<&str> for MatchStatus {
    fn from(value: &str) -> Self {
        match value {
            "viewed" => MatchStatus::Viewed,
            "confirmed" => MatchStatus::Confirmed,
            "dismissed" => MatchStatus::Dismissed,
            _ => MatchStatus::Pending,
        }
    }
}

/// A scored pairing between one spotted report and one lost-pet report.
/// Unique per (spotted, lost) pair; re-ranking the same pair updates the
/// stored scores rather than inserting a duplicate. Never hard-deleted, as
/// match history forms the pet's route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: i64,
    pub spotted_id: Uuid,
    pub lost_id: Uuid,
    /// Owner of the lost pet.
    pub owner_id: Uuid,
    /// Best combined visual score across all photo pairs (0-100).
    pub visual_score: i64,
    /// Visual score plus contextual bonuses, capped at 100.
    pub match_score: i64,
    pub status: MatchStatus,
    /// Set when the lost pet's owner confirms the sighting.
    pub checked: bool,
    pub checked_at: Option<DateTime<Utc>>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_kind_round_trip() {
        assert_eq!(ReportKind::from(ReportKind::Lost.as_str()), ReportKind::Lost);
        assert_eq!(
            ReportKind::from(ReportKind::Spotted.as_str()),
            ReportKind::Spotted
        );
    }

    #[test]
    fn test_match_status_defaults_to_pending() {
        assert_eq!(MatchStatus::from("garbage"), MatchStatus::Pending);
        assert_eq!(MatchStatus::from("confirmed"), MatchStatus::Confirmed);
    }

    #[test]
    fn test_photo_ref_serialization() {
        let photo = PhotoRef::Remote("https://example.com/cat.jpg".to_string());
        let json = serde_json::to_string(&photo).unwrap();
        let back: PhotoRef = serde_json::from_str(&json).unwrap();
        assert_eq!(photo, back);
    }
}
