use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alerts::heuristic::{metadata_match_score, ALERT_SCORE_THRESHOLD, HIGH_MATCH_THRESHOLD};
use crate::alerts::{age_text, round_distance_km, Alert, AlertDetail, AlertKey, AlertPriority};
use crate::db::Database;
use crate::geo::haversine_km;
use crate::geocode::{fallback_label, Geocoder};
use crate::report::{Coordinates, Report};
use crate::TARGET_ALERTS;

/// Default alert radius around the viewer.
pub const DEFAULT_ALERT_RADIUS_KM: f64 = 2.0;

/// Default interval between scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(300);

/// The slice of the report store the scanner needs. The candidate set is
/// fetched fresh on every scan; there is no incremental diffing.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn spotted_within_radius(
        &self,
        center: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Report>>;

    async fn lost_pets_for_owner(&self, owner_id: Uuid) -> Result<Vec<Report>>;
}

#[async_trait]
impl ReportSource for Database {
    async fn spotted_within_radius(
        &self,
        center: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Report>> {
        Database::spotted_within_radius(self, center, radius_km).await
    }

    async fn lost_pets_for_owner(&self, owner_id: Uuid) -> Result<Vec<Report>> {
        Database::lost_pets_for_owner(self, owner_id).await
    }
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub radius_km: f64,
    pub interval: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_ALERT_RADIUS_KM,
            interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

/// Periodic alert scan for one viewer. Each scan recomputes the full alert
/// set; a failed fetch keeps the previous set until the next successful
/// cycle.
pub struct AlertScanner {
    source: Arc<dyn ReportSource>,
    geocoder: Arc<dyn Geocoder>,
    config: ScannerConfig,
    last_alerts: Vec<Alert>,
}

impl AlertScanner {
    pub fn new(
        source: Arc<dyn ReportSource>,
        geocoder: Arc<dyn Geocoder>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            source,
            geocoder,
            config,
            last_alerts: Vec::new(),
        }
    }

    /// The most recent successfully computed alert set.
    pub fn alerts(&self) -> &[Alert] {
        &self.last_alerts
    }

    /// Run one scan cycle. On fetch failure the previous alert set is
    /// retained and returned.
    pub async fn scan(&mut self, viewer_id: Uuid, viewer: Coordinates) -> &[Alert] {
        match self.build_alerts(viewer_id, viewer).await {
            Ok(alerts) => {
                info!(target: TARGET_ALERTS,
                    "Scan for viewer {} produced {} alerts", viewer_id, alerts.len()
                );
                self.last_alerts = alerts;
            }
            Err(e) => {
                warn!(target: TARGET_ALERTS,
                    "Scan for viewer {} failed, keeping {} previous alerts: {}",
                    viewer_id, self.last_alerts.len(), e
                );
            }
        }
        &self.last_alerts
    }

    /// Scan on start and then on the configured interval until the cancel
    /// signal fires. A scan in flight when cancellation occurs is dropped
    /// unapplied.
    pub async fn run(
        mut self,
        viewer_id: Uuid,
        viewer: Coordinates,
        mut cancel: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    info!(target: TARGET_ALERTS, "Alert scan for viewer {} cancelled", viewer_id);
                    return;
                }
                _ = self.scan(viewer_id, viewer) => {}
            }

            tokio::select! {
                _ = cancel.changed() => {
                    info!(target: TARGET_ALERTS, "Alert scan for viewer {} cancelled", viewer_id);
                    return;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    async fn build_alerts(&self, viewer_id: Uuid, viewer: Coordinates) -> Result<Vec<Alert>> {
        let spotted =
            self.source
                .spotted_within_radius(viewer, self.config.radius_km)
                .await?;
        let lost_pets = self.source.lost_pets_for_owner(viewer_id).await?;

        let now = Utc::now();
        let mut seen: HashSet<AlertKey> = HashSet::new();
        let mut alerts = Vec::new();

        // Match alerts: the viewer's lost pets against every nearby sighting.
        for lost in &lost_pets {
            for sighting in &spotted {
                let Some(coordinates) = sighting.coordinates else {
                    continue;
                };

                let score = metadata_match_score(lost, sighting);
                if score < ALERT_SCORE_THRESHOLD {
                    continue;
                }

                let key = AlertKey::Match {
                    spotted_id: sighting.id,
                    lost_id: lost.id,
                };
                if !seen.insert(key) {
                    continue;
                }

                let priority = if score >= HIGH_MATCH_THRESHOLD {
                    AlertPriority::HighMatch
                } else {
                    AlertPriority::ModerateMatch
                };

                debug!(target: TARGET_ALERTS,
                    "Match alert for pet {} vs sighting {}: score {}",
                    lost.id, sighting.id, score
                );

                alerts.push(Alert {
                    priority,
                    species: sighting.species.clone(),
                    location: self.resolve_label(coordinates).await,
                    distance_km: round_distance_km(haversine_km(viewer, coordinates)),
                    age: age_text(sighting.observed_at, now),
                    coordinates,
                    detail: AlertDetail::Match {
                        spotted_id: sighting.id,
                        lost_id: lost.id,
                        score,
                        pet_name: lost.pet_name.clone(),
                    },
                });
            }
        }

        // Injured-proximity alerts for every hurt animal in range.
        for sighting in &spotted {
            if !sighting.injured {
                continue;
            }
            let Some(coordinates) = sighting.coordinates else {
                continue;
            };

            let key = AlertKey::Injured(sighting.id);
            if !seen.insert(key) {
                continue;
            }

            alerts.push(Alert {
                priority: AlertPriority::Injured,
                species: sighting.species.clone(),
                location: self.resolve_label(coordinates).await,
                distance_km: round_distance_km(haversine_km(viewer, coordinates)),
                age: age_text(sighting.observed_at, now),
                coordinates,
                detail: AlertDetail::Injured {
                    spotted_id: sighting.id,
                },
            });
        }

        // High matches first, then moderate, then injured; nearest first
        // within equal priority.
        alerts.sort_by(|a, b| {
            a.priority.cmp(&b.priority).then(
                a.distance_km
                    .partial_cmp(&b.distance_km)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        Ok(alerts)
    }

    async fn resolve_label(&self, coordinates: Coordinates) -> String {
        match self.geocoder.label_for(coordinates).await {
            Ok(label) => label,
            Err(e) => {
                debug!(target: TARGET_ALERTS,
                    "Reverse geocoding failed, using coordinate label: {}", e
                );
                fallback_label(coordinates)
            }
        }
    }
}
