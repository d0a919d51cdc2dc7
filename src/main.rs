use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use pawmatch::alerts::{AlertScanner, ReportSource, ScannerConfig};
use pawmatch::db::Database;
use pawmatch::embedding::shared_provider;
use pawmatch::environment::env_parse_or;
use pawmatch::geocode::HttpGeocoder;
use pawmatch::logging::configure_logging;
use pawmatch::ranking::{RankerConfig, DEFAULT_EMBEDDING_CONCURRENCY, DEFAULT_MATCH_THRESHOLD};
use pawmatch::report::Coordinates;
use pawmatch::scoring::ScoreCalibration;

/// Lost-pet matching service: ranks spotted reports against active lost-pet
/// reports, and optionally runs a local alert scan for one viewer.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Run the alert scanner for this viewer in addition to the ranking
    /// worker. Requires --viewer-lat and --viewer-lon.
    #[arg(long)]
    viewer: Option<Uuid>,

    #[arg(long, requires = "viewer", allow_hyphen_values = true)]
    viewer_lat: Option<f64>,

    #[arg(long, requires = "viewer", allow_hyphen_values = true)]
    viewer_lon: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    let cli = Cli::parse();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            error!("Failed to listen for ctrl-c");
        }
        let _ = cancel_tx.send(true);
    });

    let db = Database::instance().await;
    let provider = shared_provider().await?;

    let ranker_config = RankerConfig {
        threshold: env_parse_or("MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
        concurrency: env_parse_or("EMBEDDING_CONCURRENCY", DEFAULT_EMBEDDING_CONCURRENCY),
        calibration: ScoreCalibration::from_env(),
    };

    let mut tasks = Vec::new();

    let ranking_cancel = cancel_rx.clone();
    let ranking_provider: Arc<dyn pawmatch::embedding::EmbeddingProvider> = provider;
    tasks.push(tokio::spawn(async move {
        pawmatch::worker::ranking_loop(
            Database::instance().await,
            ranking_provider,
            ranker_config,
            ranking_cancel,
        )
        .await;
    }));

    if let (Some(viewer), Some(latitude), Some(longitude)) =
        (cli.viewer, cli.viewer_lat, cli.viewer_lon)
    {
        let geocoder_url = pawmatch::environment::env_or(
            "GEOCODER_URL",
            "https://nominatim.openstreetmap.org/",
        );
        let scanner = AlertScanner::new(
            Arc::new(db.clone()) as Arc<dyn ReportSource>,
            Arc::new(HttpGeocoder::new(&geocoder_url)?),
            ScannerConfig {
                radius_km: env_parse_or("ALERT_RADIUS_KM", 2.0),
                interval: std::time::Duration::from_secs(env_parse_or(
                    "SCAN_INTERVAL_SECONDS",
                    300,
                )),
            },
        );

        info!("Starting alert scanner for viewer {}", viewer);
        let scan_cancel = cancel_rx.clone();
        tasks.push(tokio::spawn(scanner.run(
            viewer,
            Coordinates::new(latitude, longitude),
            scan_cancel,
        )));
    }

    for task in tasks {
        let _ = task.await;
    }

    info!("Shutdown complete");
    Ok(())
}
