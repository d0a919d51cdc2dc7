use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Row, Sqlite,
};
use std::str::FromStr;
use tokio::sync::OnceCell;
use tokio::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::ranking::CandidateMatch;
use crate::report::{Coordinates, MatchRecord, MatchStatus, PhotoRef, Report, ReportKind};
use crate::TARGET_DB;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        info!(target: TARGET_DB, "Creating database pool for: {}", database_url);

        let url = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let connect_options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        let mut conn = pool.acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                species TEXT NOT NULL,
                breed TEXT,
                pet_name TEXT,
                latitude REAL,
                longitude REAL,
                observed_at TEXT NOT NULL,
                photos TEXT NOT NULL,
                injured INTEGER NOT NULL DEFAULT 0,
                distinctive_marks TEXT,
                description TEXT,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                ranked INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_reports_kind_resolved ON reports (kind, resolved);
            CREATE INDEX IF NOT EXISTS idx_reports_user_id ON reports (user_id);

            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                spotted_id TEXT NOT NULL,
                lost_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                visual_score INTEGER NOT NULL,
                match_score INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                checked INTEGER NOT NULL DEFAULT 0,
                checked_at TEXT,
                notified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(spotted_id, lost_id)
            );
            CREATE INDEX IF NOT EXISTS idx_matches_owner_id ON matches (owner_id);
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(Database { pool })
    }

    pub async fn instance() -> &'static Database {
        static INSTANCE: OnceCell<Database> = OnceCell::const_new();

        INSTANCE
            .get_or_init(|| async {
                let database_url =
                    std::env::var("DATABASE_PATH").unwrap_or_else(|_| "pawmatch.db".to_string());
                Database::new(&database_url)
                    .await
                    .expect("Failed to initialize database")
            })
            .await
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Store a new report.
    pub async fn insert_report(&self, report: &Report) -> Result<()> {
        let photos = serde_json::to_string(&report.photos)?;
        sqlx::query(
            r#"
            INSERT INTO reports (
                id, kind, species, breed, pet_name, latitude, longitude,
                observed_at, photos, injured, distinctive_marks, description,
                user_id, created_at, resolved, ranked
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(report.id.to_string())
        .bind(report.kind.as_str())
        .bind(&report.species)
        .bind(&report.breed)
        .bind(&report.pet_name)
        .bind(report.coordinates.map(|c| c.latitude))
        .bind(report.coordinates.map(|c| c.longitude))
        .bind(report.observed_at.to_rfc3339())
        .bind(photos)
        .bind(report.injured)
        .bind(&report.distinctive_marks)
        .bind(&report.description)
        .bind(report.user_id.to_string())
        .bind(report.created_at.to_rfc3339())
        .bind(report.resolved)
        .bind(false)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_report(&self, id: Uuid) -> Result<Option<Report>> {
        let row = sqlx::query("SELECT * FROM reports WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(report_from_row).transpose()
    }

    /// All unresolved reports of the given kind, oldest first.
    pub async fn list_active(&self, kind: ReportKind) -> Result<Vec<Report>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reports
            WHERE kind = ?1 AND resolved = 0
            ORDER BY created_at ASC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(report_from_row).collect()
    }

    /// Unresolved lost-pet reports belonging to one owner.
    pub async fn lost_pets_for_owner(&self, owner_id: Uuid) -> Result<Vec<Report>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reports
            WHERE kind = 'lost' AND resolved = 0 AND user_id = ?1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(report_from_row).collect()
    }

    /// Unresolved spotted reports within `radius_km` of `center`. SQL narrows
    /// to reports that carry coordinates; the exact haversine filter runs
    /// here because SQLite has no trig functions without extensions.
    pub async fn spotted_within_radius(
        &self,
        center: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Report>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reports
            WHERE kind = 'spotted' AND resolved = 0
              AND latitude IS NOT NULL AND longitude IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut reports = Vec::new();
        for row in rows {
            let report = report_from_row(row)?;
            let Some(coordinates) = report.coordinates else {
                continue;
            };
            if haversine_km(center, coordinates) <= radius_km {
                reports.push(report);
            }
        }

        debug!(target: TARGET_DB,
            "Found {} spotted reports within {} km of ({}, {})",
            reports.len(), radius_km, center.latitude, center.longitude
        );
        Ok(reports)
    }

    /// Spotted reports not yet run through the candidate ranker.
    pub async fn unranked_spotted(&self, limit: i64) -> Result<Vec<Report>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reports
            WHERE kind = 'spotted' AND resolved = 0 AND ranked = 0
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(report_from_row).collect()
    }

    pub async fn mark_ranked(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE reports SET ranked = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-delete a report: it stops participating in ranking and alerts,
    /// while existing match records stay intact.
    pub async fn mark_resolved(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE reports SET resolved = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Create or refresh the match record for one (spotted, lost) pair.
    /// Re-ranking updates the scores in place; status, checked state, and
    /// notification state survive the update.
    pub async fn upsert_match(&self, candidate: &CandidateMatch) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO matches (
                spotted_id, lost_id, owner_id, visual_score, match_score,
                status, checked, notified, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, 0, ?6)
            ON CONFLICT(spotted_id, lost_id) DO UPDATE SET
                visual_score = excluded.visual_score,
                match_score = excluded.match_score
            RETURNING id
            "#,
        )
        .bind(candidate.spotted_id.to_string())
        .bind(candidate.lost_id.to_string())
        .bind(candidate.owner_id.to_string())
        .bind(candidate.visual_score)
        .bind(candidate.match_score)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    pub async fn get_match(&self, spotted_id: Uuid, lost_id: Uuid) -> Result<Option<MatchRecord>> {
        let row = sqlx::query("SELECT * FROM matches WHERE spotted_id = ?1 AND lost_id = ?2")
            .bind(spotted_id.to_string())
            .bind(lost_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(match_from_row).transpose()
    }

    /// All match records for lost pets owned by one user, best first.
    pub async fn matches_for_owner(&self, owner_id: Uuid) -> Result<Vec<MatchRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM matches
            WHERE owner_id = ?1
            ORDER BY match_score DESC, created_at ASC
            "#,
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(match_from_row).collect()
    }

    /// Record that the lost pet's owner confirmed this sighting.
    pub async fn mark_checked(&self, match_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE matches
            SET checked = 1, checked_at = ?1, status = 'confirmed'
            WHERE id = ?2
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(match_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_notified(&self, match_id: i64) -> Result<()> {
        sqlx::query("UPDATE matches SET notified = 1 WHERE id = ?1")
            .bind(match_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_match_status(&self, match_id: i64, status: MatchStatus) -> Result<()> {
        sqlx::query("UPDATE matches SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(match_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in database: {}", value))
}

fn report_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Report> {
    let id: String = row.get("id");
    let kind: String = row.get("kind");
    let user_id: String = row.get("user_id");
    let observed_at: String = row.get("observed_at");
    let created_at: String = row.get("created_at");
    let photos_json: String = row.get("photos");

    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let coordinates = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    let photos: Vec<PhotoRef> =
        serde_json::from_str(&photos_json).context("invalid photos payload in database")?;

    Ok(Report {
        id: Uuid::parse_str(&id)?,
        kind: ReportKind::from(kind.as_str()),
        species: row.get("species"),
        breed: row.get("breed"),
        pet_name: row.get("pet_name"),
        coordinates,
        observed_at: parse_timestamp(&observed_at)?,
        photos,
        injured: row.get("injured"),
        distinctive_marks: row.get("distinctive_marks"),
        description: row.get("description"),
        user_id: Uuid::parse_str(&user_id)?,
        created_at: parse_timestamp(&created_at)?,
        resolved: row.get("resolved"),
    })
}

fn match_from_row(row: sqlx::sqlite::SqliteRow) -> Result<MatchRecord> {
    let spotted_id: String = row.get("spotted_id");
    let lost_id: String = row.get("lost_id");
    let owner_id: String = row.get("owner_id");
    let status: String = row.get("status");
    let checked_at: Option<String> = row.get("checked_at");
    let created_at: String = row.get("created_at");

    Ok(MatchRecord {
        id: row.get("id"),
        spotted_id: Uuid::parse_str(&spotted_id)?,
        lost_id: Uuid::parse_str(&lost_id)?,
        owner_id: Uuid::parse_str(&owner_id)?,
        visual_score: row.get("visual_score"),
        match_score: row.get("match_score"),
        status: MatchStatus::from(status.as_str()),
        checked: row.get("checked"),
        checked_at: checked_at.as_deref().map(parse_timestamp).transpose()?,
        notified: row.get("notified"),
        created_at: parse_timestamp(&created_at)?,
    })
}
