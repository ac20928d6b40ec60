//! Relief CLI - Command-line interface for the Relief terrain generator

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{generate, inspect};

#[derive(Parser)]
#[command(name = "relief")]
#[command(about = "Turn heightmap images into terrain meshes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a terrain mesh from a heightmap image
    Generate {
        /// Path to the heightmap image
        image: String,

        /// Driving mode (sync, async, or chunked)
        #[arg(long, default_value = "sync")]
        mode: String,

        /// Elevation of a fully white pixel (config value if omitted)
        #[arg(long, allow_negative_numbers = true)]
        height_scale: Option<f32>,

        /// Distance between adjacent grid columns and rows
        #[arg(long)]
        spacing: Option<f32>,

        /// Rows processed per tick in chunked mode
        #[arg(long)]
        rows_per_step: Option<u32>,

        /// Path to a terrain config file
        #[arg(long)]
        config: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (obj or json)
        #[arg(long, default_value = "obj")]
        format: String,
    },

    /// Show heightmap dimensions and luminance range
    Inspect {
        /// Path to the heightmap image
        image: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            image,
            mode,
            height_scale,
            spacing,
            rows_per_step,
            config,
            output,
            format,
        } => generate::run(generate::GenerateArgs {
            image,
            mode,
            height_scale,
            spacing,
            rows_per_step,
            config,
            output,
            format,
        }),
        Commands::Inspect { image } => inspect::run(&image),
    }
}
