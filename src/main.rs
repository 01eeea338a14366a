//! recipe-scan - extract ingredient and instruction text from recipe photos
//!
//! Command-line front end for the extraction pipeline.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use recipe_scan::config::{self, AppConfig};
use recipe_scan::storage;
use recipe_scan::vision::TesseractCli;
use recipe_scan::{Extraction, ExtractionPipeline};

/// recipe-scan - OCR for photographed recipe pages
#[derive(Parser, Debug)]
#[command(name = "recipe-scan")]
#[command(about = "Extract ingredient and instruction text from recipe photos")]
struct Args {
    /// Log per-region detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline on a JPEG or PNG file
    Extract {
        /// Image to read; its extension decides the decoder
        image: PathBuf,

        /// Config file (defaults to the user config, then built-in settings)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the full extraction as JSON
        #[arg(long)]
        json: bool,

        /// Save the normalized page and region crops here
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Write the default configuration file
    InitConfig {
        /// Target file (defaults to the user config location)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Check that the OCR engine can be launched
    Doctor {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Extract {
            image,
            config,
            json,
            debug_dir,
        } => run_extract(&image, config.as_deref(), json, debug_dir),
        Command::InitConfig { path, force } => run_init_config(path, force),
        Command::Doctor { config } => run_doctor(config.as_deref()),
    }
}

/// Load configuration from an explicit file, the user config, or defaults
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = storage::default_config_path() {
        if config_path.exists() {
            let config = config::load_config(&config_path)?;
            info!("Loaded configuration from {:?}", config_path);
            return Ok(config);
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn run_extract(
    image: &Path,
    config_path: Option<&Path>,
    json: bool,
    debug_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_or_create_config(config_path)?;
    let extension = image
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = std::fs::read(image).with_context(|| format!("Failed to read {:?}", image))?;

    let mut pipeline = ExtractionPipeline::with_tesseract(config)?;
    if let Some(dir) = debug_dir {
        pipeline = pipeline.with_debug_dir(dir);
    }

    let extraction = pipeline
        .extract(&bytes, &extension)
        .with_context(|| format!("Extraction failed for {:?}", image))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction)?);
    } else {
        print_extraction(&extraction);
    }
    Ok(())
}

fn print_extraction(extraction: &Extraction) {
    if extraction.is_empty() {
        println!("No reliable text found; try a sharper, better lit photo.");
    }
    for (label, text) in extraction.accepted() {
        println!("[{}]", label);
        println!("{}", text.trim());
        println!();
    }
    for (index, reason) in extraction.discarded() {
        println!("region {}: discarded, {}", index, reason);
    }
    for warning in &extraction.warnings {
        println!(
            "region {}: skipped, {:?} recognition failed: {}",
            warning.region_index, warning.profile, warning.reason
        );
    }
}

fn run_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => storage::default_config_path()?,
    };
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }
    config::save_config(&AppConfig::default(), &path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_doctor(config_path: Option<&Path>) -> Result<()> {
    let config = load_or_create_config(config_path)?;
    let engine = TesseractCli::from_settings(&config.recognizer);
    let version = engine.probe().with_context(|| {
        format!(
            "OCR engine '{}' is not usable",
            config.recognizer.tesseract_path
        )
    })?;
    println!("OCR engine: {}", version);
    println!(
        "Profiles: sparse psm {} / block psm {} (oem {})",
        config.recognizer.sparse.psm, config.recognizer.block.psm, config.recognizer.sparse.oem
    );
    Ok(())
}
