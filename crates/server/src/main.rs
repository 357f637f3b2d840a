//! Opp-Discover — opportunity discovery scan server
//!
//! Usage:
//!   opp-discover serve --port 3001       — Launch the HTTP API
//!   opp-discover run --user alice        — Run a scan from the CLI
//!   opp-discover purge                   — Drop expired scan records

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use engine::{
    BinanceClient, EntitlementProvider, FreeAccessOnly, RiskTolerance, ScanConfig, ScanError,
    ScanOrchestrator, ScanRequest, ScanStatusGateway, StatusResponse, StrategyRegistry,
    VolumeRankedUniverse,
};
use persistence::{Database, ScanState, ScanStore};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Parser)]
#[command(name = "opp-discover")]
#[command(about = "Opportunity discovery scan server", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the discovery web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Run a discovery scan from the CLI (no web server)
    Run {
        /// User to scan for
        #[arg(long)]
        user: String,
        /// Maximum number of opportunities to show
        #[arg(long)]
        limit: Option<u32>,
        /// Minimum confidence (0-100)
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Risk tolerance: conservative, balanced, aggressive
        #[arg(long, default_value = "balanced")]
        risk: String,
        /// Overwrite any in-flight scan for this user
        #[arg(long)]
        refresh: bool,
    },
    /// Drop expired scan records and lookup entries
    Purge,
}

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<ScanOrchestrator>,
    gateway: Arc<ScanStatusGateway>,
    registry: Arc<StrategyRegistry>,
    entitlements: Arc<dyn EntitlementProvider>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,persistence=debug,opp_discover=debug")
    } else {
        EnvFilter::new("info,engine=info,persistence=info,opp_discover=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn parse_risk_tolerance(s: &str) -> RiskTolerance {
    match s.to_lowercase().as_str() {
        "conservative" => RiskTolerance::Conservative,
        "aggressive" => RiskTolerance::Aggressive,
        _ => RiskTolerance::Balanced,
    }
}

fn db_path() -> String {
    std::env::var("OPP_DB_PATH").unwrap_or_else(|_| "data/opportunities.db".to_string())
}

async fn build_stack(config: ScanConfig) -> anyhow::Result<(AppState, Arc<ScanStore>)> {
    let path = db_path();
    let db = Database::new(&path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", path);

    let store = Arc::new(ScanStore::new(&db, config.result_ttl));
    let registry = Arc::new(StrategyRegistry::builtin());
    let entitlements: Arc<dyn EntitlementProvider> = Arc::new(FreeAccessOnly);
    let universe = Arc::new(VolumeRankedUniverse::new(Arc::new(BinanceClient::new())));

    let orchestrator = Arc::new(ScanOrchestrator::new(
        store.clone(),
        registry.clone(),
        entitlements.clone(),
        universe,
        config,
    ));
    let gateway = Arc::new(ScanStatusGateway::new(store.clone()));

    Ok((
        AppState {
            orchestrator,
            gateway,
            registry,
            entitlements,
        },
        store,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Run {
            user,
            limit,
            min_confidence,
            risk,
            refresh,
        } => {
            cmd_run(user, limit, min_confidence, risk, refresh).await?;
        }
        Commands::Purge => {
            cmd_purge().await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Opp-Discover v{} starting...", APP_VERSION);

    let config = ScanConfig::from_env();
    let (state, store) = build_stack(config).await?;

    // Periodic TTL sweep so expired scans do not linger in either layer.
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS)).await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Purged expired scan records"),
                Err(e) => warn!(error = %e, "TTL sweep failed"),
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/opportunities/discover", post(api_start_scan))
        .route("/opportunities/status/:scan_id", get(api_scan_status))
        .route("/opportunities/latest", get(api_latest_for_user))
        .route("/strategies", get(api_strategy_catalog))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Opp-Discover v{} ===", APP_VERSION);
    println!("Opportunity Discovery Server");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                        - Health check");
    println!("  POST /api/opportunities/discover        - Start a discovery scan");
    println!("  GET  /api/opportunities/status/:scan_id - Poll scan status");
    println!("  GET  /api/opportunities/latest?user_id= - Latest scan for a user");
    println!("  GET  /api/strategies?user_id=           - Strategy catalog with eligibility");
    println!("\n  Database: {}", db_path());
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Run command — CLI mode (no web server)
// ============================================================================

async fn cmd_run(
    user: String,
    limit: Option<u32>,
    min_confidence: Option<f64>,
    risk: String,
    refresh: bool,
) -> anyhow::Result<()> {
    println!("\n=== Opp-Discover v{} ===", APP_VERSION);

    let config = ScanConfig::from_env();
    let (state, _store) = build_stack(config).await?;

    let request = ScanRequest {
        user_id: user.clone(),
        force_refresh: refresh,
        limit,
        min_confidence: min_confidence.and_then(Decimal::from_f64_retain),
        risk_tolerance: parse_risk_tolerance(&risk),
    };

    let scan_id = match state.orchestrator.start_scan(request).await {
        Ok(id) => id,
        Err(e) => {
            println!("Scan rejected: {}", e);
            return Ok(());
        }
    };
    println!("User: {} | Risk: {} | Scan: {}\n", user, risk, scan_id);

    // Poll until the scan settles, mirroring what an HTTP client would do.
    let status = loop {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        let status = state.gateway.status(&scan_id).await;
        match status.state {
            ScanState::Complete | ScanState::Failed | ScanState::NotFound => break status,
            _ => {
                print!(
                    "\r  Scanning... {}/{} strategies                     ",
                    status.strategies_completed, status.strategies_total
                );
            }
        }
    };

    match status.state {
        ScanState::Complete => {
            println!(
                "\r  Complete ({}/{} strategies)                        \n",
                status.strategies_completed, status.strategies_total
            );
            print_opportunities(&status);
            print_performance(&status);
        }
        ScanState::Failed => {
            println!("\r  Scan failed — every strategy errored            ");
            print_performance(&status);
        }
        _ => println!("\r  Scan expired before completing                  "),
    }

    Ok(())
}

fn print_opportunities(status: &StatusResponse) {
    if status.opportunities.is_empty() {
        println!("No opportunities found.");
        return;
    }
    println!("Opportunities ({}):", status.opportunities.len());
    println!(
        "  {:>3}  {:<12} {:<16} {:>6} {:<6} {}",
        "#", "Symbol", "Strategy", "Conf", "Action", "Tier"
    );
    println!("  {}", "-".repeat(60));
    for (i, opp) in status.opportunities.iter().enumerate() {
        println!(
            "  {:>3}  {:<12} {:<16} {:>6.1} {:<6} {}",
            i + 1,
            opp.symbol,
            opp.strategy_id,
            opp.confidence,
            format!("{:?}", opp.action).to_lowercase(),
            if opp.fallback { "fallback" } else { "signal" },
        );
    }
}

fn print_performance(status: &StatusResponse) {
    println!("\nStrategy performance:");
    for (id, perf) in &status.strategy_performance {
        let note = perf.error.as_deref().unwrap_or("-");
        println!(
            "  {:<16} {:<10} {:>4} found {:>7}ms  {}",
            id,
            format!("{:?}", perf.outcome).to_lowercase(),
            perf.opportunities_found,
            perf.elapsed_ms,
            note,
        );
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "opp-discover",
        "version": APP_VERSION,
    }))
}

/// POST /api/opportunities/discover — accept a scan, return immediately
async fn api_start_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.orchestrator.start_scan(request).await {
        Ok(scan_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "scan_id": scan_id,
                "state": "initiated",
            })),
        ),
        Err(ScanError::NoEligibleStrategies) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": "no_eligible_strategies",
            })),
        ),
        Err(e @ ScanError::UniverseUnavailable(_)) => {
            error!("Scan start failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "universe_unavailable",
                    "detail": e.to_string(),
                })),
            )
        }
        Err(e @ ScanError::Store(_)) => {
            error!("Scan start failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "store_unavailable",
                    "detail": e.to_string(),
                })),
            )
        }
    }
}

/// GET /api/opportunities/status/:scan_id — poll scan progress.
/// Always 200 with a meaningful state; `not_found` only after TTL expiry.
async fn api_scan_status(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> Json<StatusResponse> {
    Json(state.gateway.status(&scan_id).await)
}

#[derive(Deserialize)]
struct LatestParams {
    user_id: String,
}

/// GET /api/opportunities/latest?user_id= — latest scan via the user index
async fn api_latest_for_user(
    State(state): State<AppState>,
    Query(params): Query<LatestParams>,
) -> Json<StatusResponse> {
    Json(state.gateway.latest_for_user(&params.user_id).await)
}

#[derive(Deserialize)]
struct CatalogParams {
    user_id: Option<String>,
}

/// GET /api/strategies?user_id= — strategy catalog with eligibility flags
async fn api_strategy_catalog(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Json<serde_json::Value> {
    let user_id = params.user_id.unwrap_or_default();
    let catalog = state
        .registry
        .catalog_for(&user_id, state.entitlements.as_ref());
    let total = catalog.len();
    Json(serde_json::json!({
        "strategies": catalog,
        "total": total,
    }))
}

// ============================================================================
// Purge command — drop expired records
// ============================================================================

async fn cmd_purge() -> anyhow::Result<()> {
    let path = db_path();
    let db = Database::new(&path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database opened: {}", path);

    let store = ScanStore::new(&db, ScanConfig::from_env().result_ttl);
    let removed = store
        .purge_expired()
        .await
        .map_err(|e| anyhow::anyhow!("Purge failed: {}", e))?;

    info!("Done! Removed {} expired rows.", removed);
    Ok(())
}
