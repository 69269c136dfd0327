//! ATM Segmentation Tool
//!
//! Configuration-driven run of the full segmentation: load observations,
//! profile and classify every ATM, draw the configured quotas and export
//! the artifacts.
//!
//! # Usage
//!
//! ```bash
//! # From TOML config
//! cargo run --release --bin segment_atms -- --config configs/segmentation.toml
//!
//! # Generate sample config
//! cargo run --release --bin segment_atms -- --generate-config segmentation.toml
//! ```
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` for per-file
//! export messages.

use atm_segmentation::{
    ObservationLoader, SegmentationConfig, SegmentationExporter, SegmentationPipeline,
};
use std::path::Path;

/// Main entry point for the segmentation tool
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a path argument");
                std::process::exit(1);
            }
            run_from_config(&args[2])
        }
        "--generate-config" => {
            if args.len() < 3 {
                eprintln!("Error: --generate-config requires a path argument");
                std::process::exit(1);
            }
            generate_sample_config(&args[2])
        }
        "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        _ => {
            eprintln!("Unknown argument: {}", args[1]);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!(
        r#"
ATM Segmentation Tool

Usage:
    {program} --config <path.toml>       Run segmentation from config file
    {program} --generate-config <path>   Generate sample config file
    {program} --help                     Show this help

Examples:
    # Run with a config
    {program} --config configs/segmentation.toml

    # Generate sample config
    {program} --generate-config configs/segmentation.toml

For configuration options, see the generated sample config.
"#
    );
}

/// Generate a sample configuration file
fn generate_sample_config(path: &str) -> atm_segmentation::Result<()> {
    SegmentationConfig::sample().save_toml(path)?;
    println!("Generated sample config: {path}");
    println!("\nEdit the following fields before running:");
    println!("  - data.input: Observation table (.csv or .json)");
    println!("  - data.output_dir: Directory for exported artifacts");
    println!("  - selection.quotas: ATMs requested per precluster");
    Ok(())
}

/// Run segmentation from configuration file
fn run_from_config(config_path: &str) -> atm_segmentation::Result<()> {
    let config = SegmentationConfig::load_toml(config_path)?;
    log::info!("Loaded configuration: {config_path}");

    let data = config.data.clone().ok_or_else(|| {
        atm_segmentation::SegmentationError::config("the [data] section is required by this tool")
    })?;

    let loader = match &data.columns {
        Some(columns) => ObservationLoader::with_columns(columns.clone()),
        None => ObservationLoader::new(),
    };
    let observations = loader.load(Path::new(&data.input))?;

    let pipeline = SegmentationPipeline::from_config(config)?;
    let output = pipeline.run(&observations)?;

    log::info!("Classified {}", output.stats);
    println!("{}", output.selection.report);

    SegmentationExporter::new(&data.output_dir).export(&output, pipeline.config())?;
    log::info!("Artifacts written to {}", data.output_dir.display());
    Ok(())
}
