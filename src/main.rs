//! Iris - Accessibility Scan Service CLI

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use iris::config;
use iris::models::{Scan, ScanStatus, ScanUpdate};
use iris::orchestrator::CancelFlag;
use iris::report;
use iris::server;
use iris::service::ScanService;
use iris::store::{FileStore, ListFilter, PageOptions};

/// Iris - accessibility scans for web pages
#[derive(Parser)]
#[command(name = "iris", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Scan store file (overrides config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Path to the axe-core bundle (overrides config)
    #[arg(long, global = true)]
    axe_script: Option<PathBuf>,

    /// Page load timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new scan
    Create {
        /// Target URLs
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// List scans
    List {
        /// Only scans in this status (pending, running, completed, failed)
        #[arg(long)]
        status: Option<ScanStatus>,

        /// Sort expression, e.g. "createdAt:desc"
        #[arg(long)]
        sort_by: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        page: Option<usize>,
    },

    /// Show a scan as JSON
    Show { id: Uuid },

    /// Change targets and/or status of a scan
    Update {
        id: Uuid,

        /// Replacement target URLs
        #[arg(short, long = "target")]
        targets: Option<Vec<String>>,

        #[arg(long)]
        status: Option<ScanStatus>,
    },

    /// Delete a scan
    Delete { id: Uuid },

    /// Execute a pending or failed scan
    Execute {
        id: Uuid,

        /// Exit with code 1 if any violation is found
        #[arg(long)]
        fail_on_violations: bool,
    },

    /// Export the results of a completed scan
    Export {
        id: Uuid,

        /// Output format (csv or json)
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create and immediately execute a scan
    Run {
        /// Target URLs
        #[arg(required = true)]
        targets: Vec<String>,

        /// Exit with code 1 if any violation is found
        #[arg(long)]
        fail_on_violations: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
}

fn print_banner() {
    let banner = r#"
    ╔═══════════════════════════════════════╗
    ║  IRIS v0.1.0                          ║
    ║  Accessibility Scanner                ║
    ╚═══════════════════════════════════════╝
    "#;
    println!("{}", banner.cyan());
}

fn status_label(status: ScanStatus) -> colored::ColoredString {
    match status {
        ScanStatus::Pending => status.as_str().white(),
        ScanStatus::Running => status.as_str().cyan(),
        ScanStatus::Completed => status.as_str().green(),
        ScanStatus::Failed => status.as_str().red().bold(),
    }
}

fn print_summary(scan: &Scan) {
    println!("\n  {} {}", "Scan:".bold(), scan.id.to_string().cyan());
    println!("  {} {}", "Status:".bold(), status_label(scan.status));
    if let Some(ref reason) = scan.failure_reason {
        println!("  {} {}", "Reason:".bold(), reason.red());
    }

    if scan.results.is_empty() {
        return;
    }

    let mut builder = Builder::default();
    builder.push_record([
        "Target",
        "Violations",
        "Passes",
        "Inapplicable",
        "Incomplete",
        "Error",
    ]);
    for r in &scan.results {
        builder.push_record([
            r.target.clone(),
            r.violations.len().to_string(),
            r.passes.len().to_string(),
            r.inapplicable.len().to_string(),
            r.incomplete.len().to_string(),
            r.error.clone().unwrap_or_default(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");

    let totals = scan.totals();
    println!(
        "\n  {} {} {}",
        format!("{} Violations", totals.total_violations).red().bold(),
        format!("{} Passes", totals.total_passes).green(),
        format!("{} Failed targets", scan.failed_targets()).yellow(),
    );
}

fn print_list(scans: &[Scan]) {
    let mut builder = Builder::default();
    builder.push_record(["Id", "Status", "Targets", "Violations", "Passes", "Created"]);
    for s in scans {
        builder.push_record([
            s.id.to_string(),
            s.status.to_string(),
            s.targets.len().to_string(),
            s.total_violations.to_string(),
            s.total_passes.to_string(),
            s.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");
}

/// Runs the scan, cancelling between targets on Ctrl+C
async fn execute_interruptible(
    service: &ScanService,
    id: Uuid,
) -> std::result::Result<Scan, iris::error::IrisError> {
    let cancel = CancelFlag::new();
    let signal_flag = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n  {} finishing current target, then stopping",
                "Interrupted:".yellow().bold()
            );
            signal_flag.cancel();
        }
    });
    let outcome = service.execute_with_cancel(id, &cancel).await;
    watcher.abort();
    outcome
}

fn exit_on_violations(scan: &Scan, fail_on_violations: bool) {
    if fail_on_violations && scan.total_violations > 0 {
        println!(
            "\n  {} {} accessibility violations detected.",
            "FAIL:".red().bold(),
            scan.total_violations
        );
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "iris=debug" } else { "iris=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut app_config = config::resolve(cli.config.as_deref())?;
    let bind = match &cli.command {
        Commands::Serve { bind } => *bind,
        _ => None,
    };
    config::merge_cli_args(&mut app_config, cli.store, cli.axe_script, cli.timeout, bind);

    let store = Arc::new(FileStore::open(&app_config.store.path).await?);
    let service = iris::build_service(&app_config, store);

    match cli.command {
        Commands::Create { targets } => {
            let scan = service.create(targets).await?;
            println!("{}", scan.id);
        }

        Commands::List {
            status,
            sort_by,
            limit,
            page,
        } => {
            let result = service
                .query(
                    &ListFilter { status },
                    &PageOptions {
                        sort_by,
                        limit,
                        page,
                    },
                )
                .await?;
            print_list(&result.results);
            println!(
                "  Page {}/{} ({} scans)",
                result.page,
                result.total_pages.max(1),
                result.total_results
            );
        }

        Commands::Show { id } => {
            let scan = service.get(id).await?;
            println!("{}", serde_json::to_string_pretty(&scan)?);
        }

        Commands::Update {
            id,
            targets,
            status,
        } => {
            let scan = service.update(id, ScanUpdate { targets, status }).await?;
            print_summary(&scan);
        }

        Commands::Delete { id } => {
            service.delete(id).await?;
            println!("  {} {}", "Deleted".bold(), id);
        }

        Commands::Execute {
            id,
            fail_on_violations,
        } => {
            print_banner();
            let scan = execute_interruptible(&service, id).await?;
            print_summary(&scan);
            exit_on_violations(&scan, fail_on_violations);
        }

        Commands::Export { id, format, output } => match format.as_str() {
            "json" => {
                let scan = service.get(id).await?;
                // Same precondition as the tabular export
                iris::aggregate::to_table(&scan)?;
                let json = serde_json::to_string_pretty(&scan)?;
                match output {
                    Some(ref path) => {
                        std::fs::write(path, json)?;
                        info!("JSON report saved to {}", path.display());
                    }
                    None => println!("{json}"),
                }
            }
            _ => {
                let rows = service.export_table(id).await?;
                match output {
                    Some(ref path) => report::csv::export(&rows, path)?,
                    None => print!("{}", report::csv::render(&rows)),
                }
            }
        },

        Commands::Run {
            targets,
            fail_on_violations,
        } => {
            print_banner();
            let scan = service.create(targets).await?;
            println!("  {} {}", "Targets:".bold(), scan.targets.join(", ").green());
            let scan = execute_interruptible(&service, scan.id).await?;
            print_summary(&scan);
            exit_on_violations(&scan, fail_on_violations);
        }

        Commands::Serve { .. } => {
            print_banner();
            println!(
                "  {} {}",
                "Listening on:".bold(),
                app_config.server.bind.to_string().green()
            );
            println!(
                "  {} {}\n",
                "Store:".bold(),
                app_config.store.path.display().to_string().cyan()
            );
            server::serve(Arc::new(service), app_config.server.bind).await?;
        }
    }

    Ok(())
}
