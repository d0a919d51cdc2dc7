// Client-side alert aggregation: injured-animal proximity alerts plus cheap
// metadata-only match alerts for the viewer's own lost pets. Alerts are
// recomputed on every scan; nothing here persists.

pub mod heuristic;
pub mod scanner;

pub use scanner::{AlertScanner, ReportSource, ScannerConfig};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::report::Coordinates;

/// Display priority. High-confidence matches first, then moderate matches,
/// then injured-animal proximity alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    HighMatch,
    ModerateMatch,
    Injured,
}

/// Natural key of an alert; identity does not persist across scans beyond
/// this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKey {
    Injured(Uuid),
    Match { spotted_id: Uuid, lost_id: Uuid },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AlertDetail {
    Injured {
        spotted_id: Uuid,
    },
    Match {
        spotted_id: Uuid,
        lost_id: Uuid,
        score: i64,
        pet_name: Option<String>,
    },
}

/// One alert ready for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub priority: AlertPriority,
    pub species: String,
    /// Human-readable location label, or "lat, lon" when geocoding fails.
    pub location: String,
    /// Distance from the viewer, rounded to one decimal place.
    pub distance_km: f64,
    /// Elapsed time since the observation, as text.
    pub age: String,
    pub coordinates: Coordinates,
    pub detail: AlertDetail,
}

impl Alert {
    pub fn key(&self) -> AlertKey {
        match &self.detail {
            AlertDetail::Injured { spotted_id } => AlertKey::Injured(*spotted_id),
            AlertDetail::Match {
                spotted_id,
                lost_id,
                ..
            } => AlertKey::Match {
                spotted_id: *spotted_id,
                lost_id: *lost_id,
            },
        }
    }
}

/// Human-readable elapsed time: minutes under an hour, hours under a day,
/// days beyond that.
pub fn age_text(observed_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - observed_at;
    let minutes = elapsed.num_minutes().max(0);
    if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 60 * 24 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (60 * 24))
    }
}

/// Round a distance to one decimal place for display.
pub fn round_distance_km(distance: f64) -> f64 {
    (distance * 10.0).round() / 10.0
}
