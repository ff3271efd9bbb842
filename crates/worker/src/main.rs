//! Package metadata worker binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pkgmeta_core::config::AppConfig;
use pkgmeta_core::{Hashes, MetadataKind, PackageCoordinate};
use pkgmeta_worker::{
    AppState, ComponentProjection, EvaluationOutcome, FetchCoordinator, TrackRequest,
    consume_lines, create_router, run_maintenance, track_component,
};
use std::net::SocketAddr;
use time::OffsetDateTime;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// pkgmetad - package metadata fetch coordinator and result synchronizer
#[derive(Parser, Debug)]
#[command(name = "pkgmetad")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PKGMETA_CONFIG",
        default_value = "config/pkgmeta.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize fetch result messages (JSON Lines) and serve /health and /metrics
    Consume {
        /// Input file, or "-" for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
    },
    /// Evaluate one package and trigger a fetch if its metadata is missing or stale
    Evaluate {
        /// Package URL
        #[arg(long)]
        purl: String,
        /// Metadata kind (integrity or health)
        #[arg(long)]
        kind: MetadataKind,
        /// UUID of the component the fetch is for
        #[arg(long)]
        uuid: Option<Uuid>,
        /// Mark the component as internal
        #[arg(long)]
        internal: bool,
    },
    /// Start tracking a component
    Track {
        /// Package URL
        #[arg(long)]
        purl: String,
        /// Component UUID (generated when omitted)
        #[arg(long)]
        uuid: Option<Uuid>,
        /// Mark the component as internal
        #[arg(long)]
        internal: bool,
        #[arg(long)]
        md5: Option<String>,
        #[arg(long)]
        sha1: Option<String>,
        #[arg(long)]
        sha256: Option<String>,
        #[arg(long)]
        sha512: Option<String>,
    },
    /// Delete metadata records no tracked component refers to
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("pkgmetad v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    // Register Prometheus metrics
    pkgmeta_worker::metrics::register_metrics();

    // Initialize metadata store
    let metadata = pkgmeta_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    let dispatcher = pkgmeta_worker::dispatch::from_config(&config.dispatch)
        .await
        .context("failed to initialize fetch dispatcher")?;
    let notifier = pkgmeta_worker::notify::from_config(&config.notify)
        .await
        .context("failed to initialize downstream notifier")?;

    let state = AppState::new(config, metadata, dispatcher, notifier)
        .context("invalid configuration")?;

    match args.command {
        Command::Consume { input } => consume(state, &input).await,
        Command::Evaluate {
            purl,
            kind,
            uuid,
            internal,
        } => evaluate(&state, &purl, kind, uuid, internal).await,
        Command::Track {
            purl,
            uuid,
            internal,
            md5,
            sha1,
            sha256,
            sha512,
        } => {
            let coordinate = PackageCoordinate::parse(&purl).context("invalid package URL")?;
            let request = TrackRequest {
                coordinate,
                uuid,
                internal,
                hashes: Hashes {
                    md5,
                    sha1,
                    sha256,
                    sha512,
                },
            };
            let component = track_component(&state, request, OffsetDateTime::now_utc())
                .await
                .context("failed to track component")?;
            println!("{}", component.uuid);
            Ok(())
        }
        Command::Sweep => {
            let stats = run_maintenance(state.metadata.as_ref())
                .await
                .context("orphan sweep failed")?;
            println!("{}", serde_json::to_string(&stats)?);
            Ok(())
        }
    }
}

/// Load configuration (file is optional, env vars can provide/override everything).
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();

    if config_path.exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("PKGMETA_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn consume(state: AppState, input: &str) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .server
        .bind
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!("Listening on {}", addr);

    let app = create_router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Operational HTTP server stopped");
        }
    });

    let stats = if input == "-" {
        consume_lines(&state, BufReader::new(tokio::io::stdin())).await?
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("failed to open {}", input))?;
        consume_lines(&state, BufReader::new(file)).await?
    };

    println!("{}", serde_json::to_string(&stats)?);
    if stats.failed > 0 {
        anyhow::bail!("{} result messages failed and need redelivery", stats.failed);
    }
    Ok(())
}

async fn evaluate(
    state: &AppState,
    purl: &str,
    kind: MetadataKind,
    uuid: Option<Uuid>,
    internal: bool,
) -> Result<()> {
    let coordinate = PackageCoordinate::parse(purl).context("invalid package URL")?;
    let coordinator = FetchCoordinator::select(kind, &coordinate, &state.policy);

    let mut component = ComponentProjection::new(coordinate).with_internal(internal);
    if let Some(uuid) = uuid {
        component = component.with_uuid(uuid);
    }

    let outcome = coordinator
        .evaluate(state, &component, OffsetDateTime::now_utc())
        .await
        .context("evaluation failed")?;

    match outcome {
        EvaluationOutcome::Unsupported(kind) => {
            println!("unsupported: {} metadata is not fetched for {}", kind, purl);
        }
        EvaluationOutcome::Health(row) => {
            println!("{} {}", row.purl, row.status.as_deref().unwrap_or("-"));
        }
        EvaluationOutcome::Integrity(row) => {
            println!("{} {}", row.purl, row.status.as_deref().unwrap_or("-"));
        }
    }
    Ok(())
}
