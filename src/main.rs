use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, warn};
use rayon::prelude::*;

use wheat_rust_lib::image_io::get_image_files_in_dir;
use wheat_rust_lib::output::{save_debug_images, save_json, write_summary_csv, BatchEntry};
use wheat_rust_lib::{read_input_file, Config, Diagnoser, DiagnosisRequest};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "Wheat rust severity and infected-area analysis")]
struct Args {
    /// Path to input image or directory
    #[clap(short, long)]
    input: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Identifier echoed back in the result (single image only)
    #[clap(long)]
    image_id: Option<String>,

    /// Also write each image's JSON response to <output>/json/<stem>.json
    #[clap(long)]
    json: bool,

    /// Enable debug mode (save rendered images and log more)
    #[clap(short, long)]
    debug: bool,

    /// Write the default configuration to the config path and exit
    #[clap(long)]
    init_config: bool,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        warn!("Config file {} not found, using defaults", args.config);
        Config::default()
    };

    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }

    if let Some(output) = args.output.clone() {
        config.output_base_dir = output;
    }

    config.validate()?;
    Ok(config)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_string()
}

fn diagnose_file(
    diagnoser: &Diagnoser,
    path: &Path,
    image_id: Option<&str>,
    output_dir: &Path,
    args: &Args,
) -> anyhow::Result<BatchEntry> {
    let input = read_input_file(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let stem = file_stem(path);
    let request = DiagnosisRequest::new(image_id.unwrap_or(&stem), input.filename.clone(), input.bytes);

    let outcome = diagnoser.diagnose(&request)?;

    if args.debug {
        save_debug_images(&outcome, output_dir, &stem)?;
    }

    if args.json {
        save_json(&outcome, output_dir, &stem)?;
    }

    Ok(BatchEntry {
        filename: input.filename,
        outcome,
    })
}

/// Main function
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if args.init_config {
        Config::default().save_to_file(&args.config)?;
        info!("Default configuration written to {}", args.config);
        return Ok(());
    }

    let config = load_config(&args)?;

    // Model and reference bank are loaded once; failure here is fatal
    let diagnoser = Diagnoser::from_config(&config).context("failed to initialise diagnosis service")?;

    let start_time = Instant::now();
    let input_path = PathBuf::from(&config.input_path);
    let output_dir = PathBuf::from(&config.output_base_dir);

    if input_path.is_file() {
        let entry = diagnose_file(&diagnoser, &input_path, args.image_id.as_deref(), &output_dir, &args)?;
        println!("{}", serde_json::to_string_pretty(&entry.outcome.to_json()?)?);
    } else if input_path.is_dir() {
        info!("Processing directory: {}", input_path.display());
        let files = get_image_files_in_dir(&input_path, &config.allowed_extensions)?;
        info!("Found {} image files", files.len());

        let run = |path: &PathBuf| match diagnose_file(&diagnoser, path, None, &output_dir, &args) {
            Ok(entry) => Some(entry),
            Err(e) => {
                error!("Error processing {}: {:#}", path.display(), e);
                None
            }
        };

        let entries: Vec<BatchEntry> = if config.use_parallel {
            files.par_iter().filter_map(run).collect()
        } else {
            files.iter().filter_map(run).collect()
        };

        let diagnosed = entries.iter().filter(|e| e.outcome.diagnosis().is_some()).count();
        info!("{} diagnosed, {} rejected", diagnosed, entries.len() - diagnosed);

        write_summary_csv(&entries, &output_dir)?;
        info!("Summary written to {}", output_dir.join("summary.csv").display());
    } else {
        bail!("Invalid input path: {}", input_path.display());
    }

    info!("Processing completed in {:.2} seconds", start_time.elapsed().as_secs_f64());

    Ok(())
}
