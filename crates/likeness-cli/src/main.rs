use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use likeness_client::{spawn_pipeline, Config, HttpTransport, Settled};
use likeness_core::{roster, Outcome, Presenter, SelectionResult, UploadedFile};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod terminal;

use terminal::TerminalPresenter;

#[derive(Parser)]
#[command(name = "likeness", about = "Identify who is in a photo")]
struct Cli {
    /// TOML config file (defaults to LIKENESS_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Classification endpoint URL, overrides the config
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single image
    Classify {
        /// Image file to classify
        path: PathBuf,
        /// Print the selection as JSON instead of a card
        #[arg(long)]
        json: bool,
        /// Show the score of every known class
        #[arg(long)]
        breakdown: bool,
    },
    /// Check that the classification service is up
    Health,
    /// List identities the service knows
    Roster,
}

/// Presenter for `--json` mode: the outcome is printed once it settles.
struct Silent;

impl Presenter for Silent {
    fn show_idle(&mut self) {}
    fn show_loading(&mut self) {}
    fn show_error(&mut self, _message: &str) {}
    fn show_result(&mut self, _result: &SelectionResult) {}
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    match cli.command {
        Commands::Classify {
            path,
            json,
            breakdown,
        } => classify(&config, path, json, breakdown).await,
        Commands::Health => {
            let transport = HttpTransport::new(&config)?;
            match transport.health().await {
                Ok(()) => {
                    println!("{}: healthy", config.health_url()?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => bail!("{}: {e}", config.health_url()?),
            }
        }
        Commands::Roster => {
            for identity in roster::list() {
                println!("{:<18} {:<18} {}", identity.label, identity.name, identity.sport);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Classify one image. A failed classification has already been shown to
/// the user, so it maps to a failing exit code rather than an error.
async fn classify(
    config: &Config,
    path: PathBuf,
    json: bool,
    breakdown: bool,
) -> Result<ExitCode> {
    let file = UploadedFile::from_path(&path, config.max_file_bytes)?;
    let transport = Arc::new(HttpTransport::new(config)?);

    let presenter: Box<dyn Presenter + Send> = if json {
        Box::new(Silent)
    } else {
        Box::new(TerminalPresenter::new(std::io::stdout(), breakdown))
    };
    tracing::info!(path = %path.display(), endpoint = %transport.endpoint(), "classifying");
    let handle = spawn_pipeline(transport, presenter);
    let outcome = match handle.classify(file).await? {
        Settled::Completed(outcome) => outcome,
        Settled::Superseded => bail!("submission superseded"),
    };

    report(&outcome, json)
}

/// Print the settled outcome in `--json` mode and pick the exit code.
fn report(outcome: &Outcome, json: bool) -> Result<ExitCode> {
    match outcome {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if json {
                println!("{}", serde_json::json!({ "error": err.to_string() }));
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
