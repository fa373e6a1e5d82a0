use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use url::Url;

use cdp_session::{ChromiumSessionFactory, SessionConfig};
use feature_detectors::{DetectorSet, HttpClassifier};
use funnelprobe_cli::config::parse_pacing;
use funnelprobe_cli::{report, AppConfig, FsArtifactSink};
use journey_engine::JourneyRunner;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one or more storefronts through their purchase funnel
    Run(RunArgs),

    /// Show build information and the resolved configuration
    Status,
}

#[derive(Args)]
struct RunArgs {
    /// Target storefront URLs
    #[arg(required = true, value_name = "URL")]
    targets: Vec<String>,

    /// ISO country code for the synthetic shipping address
    #[arg(long, value_name = "CC")]
    country: Option<String>,

    /// Ceiling on simultaneously active browsing sessions
    #[arg(long, value_name = "N")]
    max_sessions: Option<usize>,

    /// Run the browser with a visible window
    #[arg(long)]
    headful: bool,

    /// Root directory for captured screenshots
    #[arg(long, value_name = "PATH")]
    artifacts_dir: Option<PathBuf>,

    /// Interaction speed profile: fast, normal, careful
    #[arg(long, value_name = "PROFILE")]
    pacing: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.debug)?;

    match cli.command {
        Commands::Run(args) => run(args, cli.output).await,
        Commands::Status => status(cli.output),
    }
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn run(args: RunArgs, output: OutputFormat) -> Result<()> {
    let pacing = args
        .pacing
        .as_deref()
        .map(|raw| parse_pacing(raw).with_context(|| format!("unknown pacing profile: {raw}")))
        .transpose()?;

    let config = AppConfig::from_env()?
        .with_max_sessions(args.max_sessions)?
        .with_country(args.country.clone())
        .with_artifacts_dir(args.artifacts_dir)
        .with_headful(args.headful)
        .with_pacing(pacing);

    let targets: Vec<String> = args
        .targets
        .iter()
        .map(|raw| normalize_target(raw))
        .collect::<Result<_>>()?;

    let mut session_cfg = SessionConfig::default();
    if !config.headless {
        session_cfg.headless = false;
    }

    let detectors = match config.classifier.clone() {
        Some(cfg) => {
            DetectorSet::with_classifier(Arc::new(HttpClassifier::new(cfg)?))
        }
        None => DetectorSet::rules_only(),
    };

    let sink = FsArtifactSink::create(config.artifacts_dir.clone()).await?;
    info!(target: "funnelprobe", dir = %sink.run_dir().display(), "artifact directory ready");

    let runner = Arc::new(JourneyRunner::new(
        Arc::new(ChromiumSessionFactory::new(session_cfg)),
        Arc::new(sink),
        detectors,
        config.runner_config(),
    ));

    let mut handles = Vec::with_capacity(targets.len());
    for target in &targets {
        let runner = Arc::clone(&runner);
        let target = target.clone();
        let country = args.country.clone();
        handles.push(tokio::spawn(async move {
            runner.run_journey(&target, country.as_deref()).await
        }));
    }

    let mut journeys = Vec::with_capacity(handles.len());
    for handle in handles {
        journeys.push(handle.await.context("journey task panicked")?);
    }

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&journeys)?),
        OutputFormat::Human => {
            for journey in &journeys {
                println!("{}", report::render(journey));
            }
        }
    }

    if journeys.iter().all(|j| j.error.is_some()) {
        bail!("every journey failed");
    }
    Ok(())
}

fn status(output: OutputFormat) -> Result<()> {
    let config = AppConfig::from_env()?;
    let summary = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "build_date": env!("FUNNELPROBE_BUILD_DATE"),
        "git": env!("FUNNELPROBE_GIT_HASH"),
        "max_sessions": config.max_sessions,
        "default_country": config.default_country,
        "pacing": config.pacing,
        "artifacts_dir": config.artifacts_dir,
        "classifier_configured": config.classifier.is_some(),
    });

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Human => {
            println!(
                "funnelprobe {} ({} {})",
                env!("CARGO_PKG_VERSION"),
                env!("FUNNELPROBE_BUILD_DATE"),
                env!("FUNNELPROBE_GIT_HASH"),
            );
            println!("max sessions:  {}", config.max_sessions);
            println!("country:       {}", config.default_country);
            println!("pacing:        {:?}", config.pacing);
            println!("artifacts dir: {}", config.artifacts_dir.display());
            println!(
                "classifier:    {}",
                if config.classifier.is_some() {
                    "configured"
                } else {
                    "disabled"
                }
            );
        }
    }
    Ok(())
}

/// Accept bare hostnames; everything downstream wants a full URL.
fn normalize_target(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = Url::parse(&candidate).with_context(|| format!("invalid target: {raw}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported target scheme: {}", parsed.scheme());
    }
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hostnames_gain_a_scheme() {
        assert_eq!(
            normalize_target("shop.example").unwrap(),
            "https://shop.example/"
        );
        assert_eq!(
            normalize_target("http://shop.example/sale").unwrap(),
            "http://shop.example/sale"
        );
    }

    #[test]
    fn non_web_schemes_are_rejected() {
        assert!(normalize_target("ftp://shop.example").is_err());
        assert!(normalize_target("not a url at all").is_err());
    }
}
