use std::path::PathBuf;

use apkt_core::auth::StdinPrompt;
use apkt_core::batch::{run_report, BatchRequest};
use apkt_core::report::{load_units, ReportKind};
use apkt_core::{Config, Period};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "apkt-agent", about = "Download SAIDI/SAIFI reports from the APKT portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportArg {
    /// Cumulative SAIDI/SAIFI report
    Kumulatif,
    /// Monthly SAIDI/SAIFI report
    Bulanan,
    /// Per-fault-code detail report (one file per unit and kelompok)
    DetailGangguan,
}

impl From<ReportArg> for ReportKind {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::Kumulatif => ReportKind::Kumulatif,
            ReportArg::Bulanan => ReportKind::Bulanan,
            ReportArg::DetailGangguan => ReportKind::DetailGangguan,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch download for one report and period
    Download {
        /// Which report page to drive
        #[arg(long, value_enum)]
        report: ReportArg,

        /// Reporting period as YYYYMM
        #[arg(long)]
        period: String,

        /// YAML file with the unit list (selected_units key)
        #[arg(long, default_value = "units_selection.yaml")]
        units: PathBuf,

        /// Configuration file (default: config.yaml, then config.example.yaml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run the browser headless (overrides the config value)
        #[arg(long)]
        headless: Option<bool>,

        /// chromedriver endpoint (overrides the config value)
        #[arg(long)]
        webdriver_url: Option<String>,
    },
    /// Check that the portal login page is reachable
    Check {
        /// Configuration file (default: config.yaml, then config.example.yaml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

async fn download(
    report: ReportArg,
    period: &str,
    units_path: &PathBuf,
    config_path: Option<&PathBuf>,
    headless: Option<bool>,
    webdriver_url: Option<String>,
) -> Result<(), apkt_core::AgentError> {
    let mut config = Config::load(config_path.map(|p| p.as_path()))?;
    if let Some(headless) = headless {
        config.set("runtime.headless", serde_yaml::Value::Bool(headless));
    }
    if let Some(url) = webdriver_url {
        config.set("runtime.webdriver_url", serde_yaml::Value::String(url));
    }

    let period = Period::parse(period)?;
    let report: ReportKind = report.into();
    // The detail page has no data for the regional aggregate units.
    let exclude_regional = report == ReportKind::DetailGangguan;
    let units = load_units(units_path, exclude_regional)?;
    if units.is_empty() {
        return Err(apkt_core::AgentError::Config(format!(
            "no units to download in {}",
            units_path.display()
        )));
    }

    let root = PathBuf::from(config.get_str("workspace.root", "workspace"));
    let snapshot_date = chrono::Local::now().format("%Y%m%d").to_string();
    let ctx = apkt_core::create_run(&root, report.slug(), &period.to_string(), &snapshot_date)?;
    info!(run_id = %ctx.run_id, units = units.len(), "run created");

    let req = BatchRequest {
        report,
        period,
        units,
    };
    let result = run_report(&config, &ctx, &req, &StdinPrompt).await?;

    println!(
        "Downloaded {}/{} files ({} no data, {} failed)",
        result.files.len(),
        result.total,
        result.no_data,
        result.failed
    );
    println!("Run directory: {}", ctx.run_dir.display());
    if !result.errors.is_empty() {
        println!("See {} for per-unit errors", ctx.manifest_path().display());
    }
    Ok(())
}

async fn check(config_path: Option<&PathBuf>) -> Result<(), apkt_core::AgentError> {
    let config = Config::load(config_path.map(|p| p.as_path()))?;
    let url = config.get_str("apkt.login_url", "");
    if url.is_empty() {
        return Err(apkt_core::AgentError::Config(
            "apkt.login_url is not set".into(),
        ));
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()
        .map_err(|e| apkt_core::AgentError::Config(format!("http client: {e}")))?;
    match client.head(&url).send().await {
        Ok(resp) => {
            println!("{url} -> {}", resp.status());
            Ok(())
        }
        // Some gateways reject HEAD; try a plain GET before giving up.
        Err(head_err) => match client.get(&url).send().await {
            Ok(resp) => {
                println!("{url} -> {}", resp.status());
                Ok(())
            }
            Err(_) => Err(apkt_core::AgentError::Navigation(format!(
                "portal unreachable: {head_err}"
            ))),
        },
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Download {
            report,
            period,
            units,
            config,
            headless,
            webdriver_url,
        } => {
            download(
                report,
                &period,
                &units,
                config.as_ref(),
                headless,
                webdriver_url,
            )
            .await
        }
        Commands::Check { config } => check(config.as_ref()).await,
    };

    if let Err(e) = outcome {
        error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
