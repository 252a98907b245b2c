//! sqlite-mysql-migrate CLI - SQLite to MySQL schema and data migration.

use clap::{Parser, Subcommand};
use sqlite_mysql_migrate::{
    Config, MigrateError, MigrationPlan, MigrationResult, Orchestrator, StatementStatus,
    ValidationReport,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "sqlite-mysql-migrate")]
#[command(about = "Migrate a SQLite database to MySQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    Run {
        /// Show the translated schema and creation order without touching the target
        #[arg(long)]
        dry_run: bool,

        /// Create the schema only, without copying rows
        #[arg(long)]
        skip_data: bool,

        /// Skip post-migration validation
        #[arg(long)]
        skip_validate: bool,

        /// Leave foreign-key column types as translated
        #[arg(long)]
        no_reconcile: bool,
    },

    /// Compare the target schema and data against the source
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel_token = setup_signal_handler();

    match cli.command {
        Commands::Run {
            dry_run,
            skip_data,
            skip_validate,
            no_reconcile,
        } => {
            if skip_data {
                config.migration.transfer_data = false;
            }
            if skip_validate {
                config.migration.validate = false;
            }
            if no_reconcile {
                config.migration.reconcile_types = false;
            }

            let orchestrator = Orchestrator::new(config).await?;

            if dry_run {
                let plan = orchestrator.plan().await?;
                orchestrator.close().await;
                if cli.output_json {
                    println!("{}", plan.to_json()?);
                } else {
                    print_plan(&plan);
                }
                return Ok(());
            }

            let reporter = cli
                .progress
                .then(|| spawn_progress_reporter(&orchestrator, cancel_token.clone()));

            let result = orchestrator.run(cancel_token.clone()).await;
            if let Some(reporter) = reporter {
                reporter.abort();
            }
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }

            if !result.is_success() {
                return Err(MigrateError::NoTablesCreated);
            }
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::new(config).await?;
            let report = orchestrator.validate(cancel_token).await?;
            orchestrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_validation(&report);
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await?;
            orchestrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (MySQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn print_plan(plan: &MigrationPlan) {
    println!("\nDry run: {} tables in creation order", plan.tables.len());
    for (i, table) in plan.tables.iter().enumerate() {
        println!("\n{}. {}", i + 1, table.name);
        println!("  {}", table.create_sql);
        for fk in &table.foreign_keys {
            println!("  + {}", fk);
        }
        for warning in &table.warnings {
            println!("  ! {}", warning);
        }
    }
    if !plan.cyclic_tables.is_empty() {
        println!("\nCircular dependencies: {}", plan.cyclic_tables.join(", "));
    }
    for fk in &plan.dangling_references {
        println!("Dangling reference: {}", fk);
    }
    for failure in &plan.untranslated {
        println!("Cannot translate {}: {}", failure.table, failure.error);
    }
}

fn print_summary(result: &MigrationResult) {
    let status_msg = match result.status.as_str() {
        "completed" => "Migration completed!",
        "completed_with_errors" => "Migration completed with errors.",
        _ => "Migration failed.",
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Tables: {}/{}",
        result.tables_created.len(),
        result.tables_total
    );
    for failure in &result.tables_failed {
        println!("    Failed: {} ({})", failure.table, failure.error);
    }
    if !result.cyclic_tables.is_empty() {
        println!("  Circular dependencies: {}", result.cyclic_tables.join(", "));
    }

    let applied = result.constraints_applied();
    println!(
        "  Foreign keys: {} applied, {} skipped",
        applied,
        result.constraints.len() - applied
    );
    for outcome in result
        .constraints
        .iter()
        .filter(|c| c.status != StatementStatus::Applied)
    {
        println!(
            "    {}: {}",
            outcome.table,
            outcome.error.as_deref().unwrap_or(&outcome.clause)
        );
    }

    if !result.reconciliations.is_empty() {
        println!("  Reconciled columns: {}", result.reconciliations.len());
    }
    if !result.indexes.is_empty() {
        let created = result
            .indexes
            .iter()
            .filter(|i| i.status == StatementStatus::Applied)
            .count();
        println!("  Indexes: {}/{}", created, result.indexes.len());
    }
    if result.transfer.is_some() {
        println!("  Rows: {}", result.rows_transferred);
    }

    match (&result.validation, &result.validation_error) {
        (Some(report), _) => print_validation(report),
        (None, Some(err)) => println!("  Validation error: {}", err),
        (None, None) => {}
    }
}

fn print_validation(report: &ValidationReport) {
    println!(
        "\nValidation: {}",
        if report.is_valid() { "MATCH" } else { "MISMATCH" }
    );
    println!("  Tables matched: {}", report.matched_tables.len());
    if !report.missing_in_target.is_empty() {
        println!("  Missing in target: {}", report.missing_in_target.join(", "));
    }
    if !report.missing_in_source.is_empty() {
        println!("  Missing in source: {}", report.missing_in_source.join(", "));
    }
    for table in report.tables.iter().filter(|t| !t.is_match()) {
        println!("  {}:", table.table);
        for column in &table.schema.missing_in_target {
            println!("    - {} (source only)", column);
        }
        for column in &table.schema.missing_in_source {
            println!("    + {} (target only)", column);
        }
        if let Some(data) = table.data.as_ref().filter(|d| !d.is_match()) {
            println!("    data: {}", data);
        }
    }
    if report.stopped_early {
        println!("  Stopped at the first mismatch");
    }
}

/// Print the rows-transferred counter to stderr every second.
fn spawn_progress_reporter(
    orchestrator: &Orchestrator,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let counter = orchestrator.progress_counter();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let line = serde_json::json!({
                        "rows_transferred": counter.load(Ordering::Relaxed),
                    });
                    eprintln!("{}", line);
                }
            }
        }
    })
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            let mut stream = match signal(kind) {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Failed to install {} handler: {}", name, e);
                    return;
                }
            };
            stream.recv().await;
            eprintln!("\nReceived {}. Stopping after the current statement...", name);
            token.cancel();
        });
    }

    cancel_token
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current statement...");
            token.cancel();
        }
    });

    cancel_token
}
