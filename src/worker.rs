use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::db::Database;
use crate::embedding::EmbeddingProvider;
use crate::ranking::{rank_candidates, RankerConfig};
use crate::report::{Report, ReportKind};
use crate::TARGET_MATCHING;

/// How long the worker sleeps when no spotted reports are waiting.
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Back-off after a failed ranking attempt, so a struggling embedding
/// backend is not hammered.
const FAILURE_BACKOFF: Duration = Duration::from_secs(30);

/// Ranking worker loop: picks up spotted reports that have not been ranked
/// yet, ranks them against all active lost-pet reports, and upserts the
/// resulting match records. Runs until the cancel signal fires.
pub async fn ranking_loop(
    db: &Database,
    provider: Arc<dyn EmbeddingProvider>,
    config: RankerConfig,
    mut cancel: watch::Receiver<bool>,
) {
    info!(target: TARGET_MATCHING, "Starting ranking worker (threshold {})", config.threshold);

    loop {
        let pause = match process_next_spotted(db, provider.as_ref(), &config).await {
            Ok(true) => continue,
            Ok(false) => IDLE_POLL_INTERVAL,
            Err(e) => {
                error!(target: TARGET_MATCHING, "Ranking cycle failed: {:#}", e);
                FAILURE_BACKOFF
            }
        };

        tokio::select! {
            _ = cancel.changed() => {
                info!(target: TARGET_MATCHING, "Ranking worker stopping");
                return;
            }
            _ = sleep(pause) => {}
        }
    }
}

/// Rank the oldest unranked spotted report, if any. Returns whether a report
/// was processed.
async fn process_next_spotted(
    db: &Database,
    provider: &dyn EmbeddingProvider,
    config: &RankerConfig,
) -> Result<bool> {
    let Some(spotted) = db.unranked_spotted(1).await?.into_iter().next() else {
        return Ok(false);
    };

    let lost_pets = db.list_active(ReportKind::Lost).await?;
    rank_and_store(db, provider, &spotted, &lost_pets, config).await?;

    Ok(true)
}

/// Rank one spotted report and persist the matches. A report without photos
/// cannot be ranked; it is marked ranked so it is not retried forever.
pub async fn rank_and_store(
    db: &Database,
    provider: &dyn EmbeddingProvider,
    spotted: &Report,
    lost_pets: &[Report],
    config: &RankerConfig,
) -> Result<usize> {
    if !spotted.has_photos() {
        info!(target: TARGET_MATCHING,
            "Spotted report {} has no photos; nothing to rank", spotted.id
        );
        db.mark_ranked(spotted.id).await?;
        return Ok(0);
    }

    let matches = rank_candidates(provider, spotted, lost_pets, config).await?;

    for candidate in &matches {
        db.upsert_match(candidate).await?;
    }
    db.mark_ranked(spotted.id).await?;

    info!(target: TARGET_MATCHING,
        "Stored {} matches for spotted report {}", matches.len(), spotted.id
    );
    Ok(matches.len())
}
