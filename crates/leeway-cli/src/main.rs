use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use leeway_capture::DeviceGateway;
use leeway_core::{AnalysisBackend, AnalysisInput, DesignStyle, ImageSource, LeewayConfig, RoomType};
use leeway_gemini::GeminiClient;
use leeway_pipeline::{Phase, Pipeline, PipelineSnapshot};

/// Photograph a room and get interior design suggestions.
#[derive(Parser, Debug)]
#[command(name = "leeway", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use this config file instead of the default one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a room, from a photo or from a description alone.
    Analyze(AnalyzeArgs),
    /// Check that the design service is reachable.
    Check,
    /// Show the config file location.
    Config {
        /// Write a default config file if none exists.
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Analyze an existing photo.
    #[arg(long, conflicts_with_all = ["camera", "library"])]
    image: Option<PathBuf>,

    /// Take a new photo with the configured camera command.
    #[arg(long, conflicts_with = "library")]
    camera: bool,

    /// Use the most recent photo in the media library.
    #[arg(long)]
    library: bool,

    /// What you want from the room.
    #[arg(short, long)]
    description: Option<String>,

    /// Kind of room, e.g. bedroom or living-room.
    #[arg(long)]
    room_type: Option<RoomType>,

    /// Target style, e.g. minimalist or scandinavian.
    #[arg(long)]
    style: Option<DesignStyle>,

    /// Spending limit in dollars.
    #[arg(long, allow_negative_numbers = true)]
    budget: Option<f64>,

    /// Save camera photos to the media library.
    #[arg(long)]
    save: bool,

    /// Print the response as JSON.
    #[arg(long)]
    json: bool,
}

impl AnalyzeArgs {
    fn source(&self) -> Option<ImageSource> {
        if let Some(path) = &self.image {
            Some(ImageSource::File(path.clone()))
        } else if self.camera {
            Some(ImageSource::Camera)
        } else if self.library {
            Some(ImageSource::Library)
        } else {
            None
        }
    }

    fn input(&self) -> AnalysisInput {
        AnalysisInput {
            description: self.description.clone(),
            room_type: self.room_type,
            style: self.style,
            budget: self.budget,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the result.
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting leeway v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Analyze(args) => analyze(load_config(&cli)?, args).await,
        Command::Check => check(load_config(&cli)?).await,
        Command::Config { init } => show_config(cli.config.clone(), *init),
    }
}

fn load_config(cli: &Cli) -> Result<LeewayConfig> {
    let config = match &cli.config {
        Some(path) => LeewayConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LeewayConfig::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            LeewayConfig::default()
        }),
    };
    Ok(config.with_env_overrides())
}

async fn analyze(mut config: LeewayConfig, args: &AnalyzeArgs) -> Result<()> {
    if args.save {
        config.capture.save_captures = true;
    }

    let client = GeminiClient::from_config(&config);
    if !client.is_configured() {
        tracing::warn!("No Gemini API key configured (set GEMINI_API_KEY or api_keys.gemini)");
    }
    let gateway = DeviceGateway::from_config(&config.capture);

    let (pipeline, mut rx) = Pipeline::new(Arc::new(gateway), Arc::new(client));
    let mut pipeline = pipeline.with_save_captures(config.capture.save_captures);

    match args.source() {
        Some(source) => pipeline.start_capture(source, args.input()),
        None => pipeline.start_analysis(args.input()),
    };
    let done = pipeline.run_until_settled(&mut rx).await;

    match (&done.phase, &done.response) {
        (Phase::Analyzed, Some(_)) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&done.response)?);
            } else {
                print_report(&done);
            }
            Ok(())
        }
        _ => match done.error {
            Some(error) => {
                tracing::debug!(kind = %error.kind, detail = %error.detail, "Analysis did not complete");
                bail!("{}", error.message)
            }
            None => bail!("Analysis ended in the {} state", done.phase),
        },
    }
}

fn print_report(snapshot: &PipelineSnapshot) {
    let Some(response) = &snapshot.response else {
        return;
    };

    if let Some(request) = &snapshot.request {
        println!(
            "{} · {}",
            request.room_type().label(),
            request.style().label()
        );
        println!();
    }
    println!("{}", response.analysis);

    if snapshot.degraded {
        println!();
        println!("(The design service did not return structured suggestions.)");
        return;
    }

    for (i, suggestion) in response.suggestions.iter().enumerate() {
        println!();
        let cost = suggestion
            .estimated_cost
            .map(|c| format!("  ~${:.0}", c))
            .unwrap_or_default();
        println!(
            "{}. {} [{} · {} priority]{}",
            i + 1,
            suggestion.title,
            suggestion.category.label(),
            suggestion.priority.label(),
            cost
        );
        if !suggestion.description.is_empty() {
            println!("   {}", suggestion.description);
        }
    }

    if let Some(total) = response.total_estimated_cost() {
        println!();
        println!("Estimated total: ${:.0}", total);
    }
}

async fn check(config: LeewayConfig) -> Result<()> {
    let client = GeminiClient::from_config(&config);
    if !client.is_configured() {
        bail!("No Gemini API key configured (set GEMINI_API_KEY or api_keys.gemini)");
    }

    if client.test_connection().await {
        println!("ok: {} is reachable", client.model());
        Ok(())
    } else {
        bail!("{} is not reachable", client.model())
    }
}

fn show_config(path: Option<PathBuf>, init: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => LeewayConfig::config_path()?,
    };

    if init {
        if path.exists() {
            println!("{} already exists", path.display());
        } else {
            LeewayConfig::default()
                .save_to(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
            return Ok(());
        }
    }

    println!("{}", path.display());
    Ok(())
}
