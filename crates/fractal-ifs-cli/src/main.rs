//! fractal-ifs CLI - fractal compression of grayscale images

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

mod commands;
mod image_io;

/// Fractal (IFS) image compression tool.
#[derive(Parser)]
#[command(name = "fractal-ifs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image into a transform stream
    Encode {
        /// Input image (PNG, JPEG, GIF); colour is converted to grey
        input: PathBuf,

        /// Output transform stream
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        geometry: GeometryArgs,

        /// Also write the transforms as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Reconstruct an image from a transform stream
    Decode {
        /// Input transform stream
        input: PathBuf,

        /// Output image (format from extension)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Show what a transform stream contains
    Info {
        /// Input transform stream
        input: PathBuf,
    },

    /// Encode, decode and report per-iteration quality
    Eval {
        /// Input image
        input: PathBuf,

        /// Directory for the JSON/CSV report
        #[arg(long, default_value = "reports")]
        report_dir: PathBuf,

        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        decode: DecodeArgs,

        /// Compute DSSIM for every iteration (slower)
        #[arg(long)]
        dssim: bool,
    },
}

/// Block geometry and input preparation.
#[derive(Args, Debug, Clone)]
pub struct GeometryArgs {
    /// Source block size
    #[arg(long = "src", default_value_t = 8)]
    pub src_size: usize,

    /// Destination block size
    #[arg(long = "dst", default_value_t = 4)]
    pub dst_size: usize,

    /// Step between source block positions
    #[arg(long, default_value_t = 8)]
    pub stride: usize,

    /// Shrink the input by this factor (block averaging) before encoding
    #[arg(long, default_value_t = 1)]
    pub downscale: usize,
}

/// Seed image choices.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    /// All zeros
    Zero,
    /// Uniform noise in [0, 256)
    Random,
    /// Mid grey (128)
    Gray,
}

/// Decoding controls.
#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// Number of decoding passes
    #[arg(short = 'n', long, default_value_t = 8)]
    pub iterations: usize,

    /// Starting image
    #[arg(long, value_enum, default_value_t = SeedKind::Random)]
    pub seed: SeedKind,

    /// Generator seed for the random starting image
    #[arg(long, default_value_t = 0)]
    pub rng_seed: u64,

    /// Stop early once a pass changes the image by at most this MSE
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Write every intermediate image into this directory
    #[arg(long)]
    pub frames: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match cli.command {
        Commands::Encode { input, output, geometry, json } => {
            commands::encode::run(&input, &output, &geometry, json.as_deref(), cli.verbose)
        }
        Commands::Decode { input, output, decode } => {
            commands::decode::run(&input, &output, &decode, cli.verbose)
        }
        Commands::Info { input } => commands::info::run(&input),
        Commands::Eval { input, report_dir, geometry, decode, dssim } => {
            commands::eval::run(&input, &report_dir, &geometry, &decode, dssim, cli.verbose)
        }
    }
}
