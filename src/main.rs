//! Landhacker - land parcel price estimation
//!
//! A CLI tool that gathers comparable acreage sales for a locality,
//! clusters their prices per acre, and projects a price for a parcel
//! with a confidence score and a written explanation.
//!
//! Exit codes:
//!   0 - Success (estimate produced, or a non-estimate command completed)
//!   1 - Runtime error (connection, config, credits, IO, etc.)
//!   2 - Not enough comparable data to produce an estimate

mod analysis;
mod api;
mod cli;
mod config;
mod models;
mod report;
mod session;
mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::{
    ComparablesRequest, ComparablesResponse, DistanceRequest, DistanceResponse, EstimateInput,
    Observation, Report, ReportMetadata, EXIT_ERROR, EXIT_SUCCESS,
};
use session::{RequestSequencer, RunningProperties};
use std::path::{Path, PathBuf};
use std::time::Duration;
use store::{NewQuery, QueryStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(EXIT_ERROR);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is loaded first so [general] verbose can pick the log level
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_ERROR);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(args.quiet));

    info!("Landhacker v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let session = Session::new();
    match run(args, config, &session).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(EXIT_ERROR);
        }
    }
}

/// Handle --init-config: generate a default .landhacker.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  .landhacker.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .landhacker.toml")?;

    println!("✅ Created .landhacker.toml with default settings.");
    println!("   Edit it to customize the backend URL, credits, and report options.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Request bookkeeping shared by every estimate started in this process.
#[derive(Debug)]
struct Session {
    sequencer: RequestSequencer,
    running: RunningProperties,
}

impl Session {
    fn new() -> Self {
        Self {
            sequencer: RequestSequencer::new(),
            running: RunningProperties::new(),
        }
    }
}

/// Context passed to the estimate handler.
struct EstimateContext<'a> {
    config: Config,
    store: QueryStore,
    session: &'a Session,
}

/// Dispatch the requested command. Returns the exit code.
async fn run(args: Args, config: Config, session: &Session) -> Result<i32> {
    if args.check_health {
        return handle_check_health(&config).await;
    }

    let store = QueryStore::new(config.store.data_dir.clone());
    let user = args.user.as_deref().unwrap_or_default();

    if let Some(amount) = args.add_credits {
        return handle_add_credits(&store, user, amount);
    }

    if args.history {
        return handle_history(&store, user);
    }

    let ctx = EstimateContext {
        config,
        store,
        session,
    };

    run_estimate(&ctx, &args).await
}

/// Handle --check-health.
async fn handle_check_health(config: &Config) -> Result<i32> {
    let client = api::ApiClient::new(api_config(config))?;
    let health = client.check_health().await?;

    println!("🩺 Backend {}: {}", config.api.base_url, health.status);
    Ok(EXIT_SUCCESS)
}

/// Handle --add-credits: top up (or create) a user's profile.
fn handle_add_credits(store: &QueryStore, user: &str, amount: u64) -> Result<i32> {
    let balance = store.add_credits(user, amount)?;

    println!("💳 Added {} credits for {} (balance {})", amount, user, balance);
    Ok(EXIT_SUCCESS)
}

/// Handle --history: list saved queries for a user.
fn handle_history(store: &QueryStore, user: &str) -> Result<i32> {
    let queries = store.list_queries(user)?;

    if queries.is_empty() {
        println!("No saved queries for {}.", user);
        return Ok(EXIT_SUCCESS);
    }

    println!("📚 Saved queries for {} ({}):\n", user, queries.len());
    for query in &queries {
        println!(
            "   {}  {}  {} ({:.2} acres, {:.0}% confidence)",
            query.created_at.format("%Y-%m-%d %H:%M"),
            query.address,
            analysis::format_currency(query.estimate.projected_price),
            query.target_area,
            query.estimate.confidence
        );
    }
    println!("\n   Stored under {}", store.root().display());
    Ok(EXIT_SUCCESS)
}

/// Run one estimate: gather comparables, estimate, save, report.
async fn run_estimate(ctx: &EstimateContext<'_>, args: &Args) -> Result<i32> {
    let subject = args.subject();
    let locality = args.locality().to_string();

    let _running = ctx
        .session
        .running
        .try_start(&subject)
        .ok_or_else(|| anyhow::anyhow!("An estimate for {} is already running", subject))?;

    // Gate on credits before spending any backend calls
    let user = if args.dry_run { None } else { args.user.as_deref() };
    if let Some(user) = user {
        let profile = ctx.store.ensure_credits(user, ctx.config.store.min_credits)?;
        info!("User {} has {} credits", user, profile.credits);
    }

    let (comparables, distance) = ctx
        .session
        .sequencer
        .run_latest(gather_inputs(ctx, args))
        .await
        .ok_or_else(|| {
            anyhow::anyhow!("Request for {} was superseded by a newer one", subject)
        })??;

    if args.dry_run {
        return handle_dry_run(&comparables);
    }

    // Estimate
    println!("\n📐 Estimating price...");
    let input = EstimateInput {
        observations: comparables,
        target_area: args.acres,
        locality: locality.clone(),
    };
    let outcome = analysis::try_build_estimate(&input);
    let EstimateInput {
        observations: comparables,
        ..
    } = input;

    let (estimate, insufficient_reason) = match outcome {
        Ok(estimate) => (Some(estimate), None),
        Err(e) => {
            warn!("No estimate for {}: {}", subject, e);
            (None, Some(e.to_string()))
        }
    };

    // Save and charge only when an estimate was produced
    let mut saved_query_id = None;
    if let Some(user) = user {
        let query = estimate.as_ref().map(|estimate| NewQuery {
            address: &subject,
            locality: &locality,
            zip_code: args.zip.as_deref(),
            comparables: &comparables,
            estimate,
        });
        let saved = ctx
            .store
            .record_estimate(user, query, ctx.config.store.credits_per_query)?;
        if let Some(saved) = saved {
            println!(
                "💾 Saved query {} ({} credits left)",
                saved.id, saved.remaining_credits
            );
            saved_query_id = Some(saved.id);
        }
    }

    let report = Report {
        metadata: ReportMetadata {
            subject: subject.clone(),
            locality,
            zip_code: args.zip.clone(),
            target_area: args.acres,
            generated_at: Utc::now(),
            comparables_count: comparables.len(),
            distance,
            saved_query_id,
        },
        comparables,
        estimate,
        insufficient_reason,
    };

    // Generate and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(
            &report,
            report::MarkdownOptions {
                include_comparables: ctx.config.report.include_comparables,
            },
        ),
    };

    let output_path = PathBuf::from(&ctx.config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    match report.estimate {
        Some(ref estimate) => {
            println!("\n📊 Estimate Summary:");
            println!(
                "   Predicted price: {}",
                analysis::format_currency(estimate.projected_price)
            );
            println!(
                "   Price per acre: {} (range {} to {})",
                analysis::format_currency(estimate.mean_unit_price),
                analysis::format_currency(estimate.min),
                analysis::format_currency(estimate.max)
            );
            println!(
                "   Cluster: {} of {} comparables, {} outliers excluded",
                estimate.cluster_size, estimate.total_valid, estimate.outliers
            );
            println!("   Confidence: {:.0}%", estimate.confidence);
            println!(
                "\n✅ Estimate complete! Report saved to: {}",
                output_path.display()
            );
        }
        None => {
            eprintln!(
                "\n⛔ Not enough comparable data to estimate a price. Report saved to: {}",
                output_path.display()
            );
        }
    }

    Ok(report.exit_code())
}

/// Load comparables (file or backend) and the optional distance, concurrently.
async fn gather_inputs(
    ctx: &EstimateContext<'_>,
    args: &Args,
) -> Result<(Vec<Observation>, Option<DistanceResponse>)> {
    let needs_client = args.comparables.is_none() || args.distance_to.is_some();
    let client = if needs_client {
        Some(api::ApiClient::new(api_config(&ctx.config))?)
    } else {
        None
    };

    let comparables_fut = async {
        match (&args.comparables, &client) {
            (Some(path), _) => load_comparables_file(path),
            (None, Some(client)) => {
                let request = ComparablesRequest {
                    city: args.locality().to_string(),
                    acres: args
                        .acres
                        .unwrap_or(ctx.config.estimate.default_lookup_acres),
                    zip_code: args.zip.clone().unwrap_or_default(),
                };

                let spinner = start_spinner(args.quiet, "Fetching comparable properties...");
                let result = client.get_acres_prices(&request).await;
                if let Some(spinner) = spinner {
                    spinner.finish_and_clear();
                }
                result.map(|response| response.prices)
            }
            (None, None) => Ok(Vec::new()),
        }
    };

    let distance_fut = async {
        let (Some(client), Some(address), Some(destination)) =
            (&client, &args.address, &args.distance_to)
        else {
            return None;
        };

        let request = DistanceRequest {
            origins: address.clone(),
            destination: destination.clone(),
        };
        match client.get_distance_to_city(&request).await {
            Ok(distance) => Some(distance),
            Err(e) => {
                warn!("Distance lookup failed: {}", e);
                None
            }
        }
    };

    let (comparables, distance) = futures::future::join(comparables_fut, distance_fut).await;
    let comparables = comparables?;

    println!("🏘️  Loaded {} comparable properties", comparables.len());
    Ok((comparables, distance))
}

/// Read a comparables JSON file.
fn load_comparables_file(path: &Path) -> Result<Vec<Observation>> {
    info!("Loading comparables from: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read comparables file: {}", path.display()))?;
    let response = ComparablesResponse::from_json_str(&content)
        .with_context(|| format!("Failed to parse comparables file: {}", path.display()))?;

    Ok(response.prices)
}

/// Handle --dry-run: list comparables, estimate nothing.
fn handle_dry_run(comparables: &[Observation]) -> Result<i32> {
    println!("\n🔍 Dry run: listing comparables (no estimate, nothing saved)...\n");

    if comparables.is_empty() {
        println!("   No comparable properties found.");
    }
    for comp in comparables {
        let per_acre = comp
            .unit_price()
            .map(analysis::format_currency)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "     📄 {} | {} acres | {} | {} per acre",
            comp.label.as_deref().unwrap_or("Unknown"),
            comp.area
                .map(|a| analysis::format_number(a, 3))
                .unwrap_or_else(|| "-".to_string()),
            comp.price
                .map(analysis::format_currency)
                .unwrap_or_else(|| "-".to_string()),
            per_acre
        );
    }

    let usable = analysis::compute_unit_prices(comparables).len();
    println!("\n   Usable for estimation: {} of {}", usable, comparables.len());
    println!("\n✅ Dry run complete.");
    Ok(EXIT_SUCCESS)
}

fn start_spinner(quiet: bool, message: &'static str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}

fn api_config(config: &Config) -> api::ApiConfig {
    api::ApiConfig {
        base_url: config.api.base_url.clone(),
        timeout_seconds: config.api.timeout_seconds,
        token: config.api.token.clone(),
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load config, using defaults: {:#}", e);
            Ok(Config::default())
        }
    }
}
