use clap::{Parser, Subcommand};
use pixsqueeze::codec::RustCodec;
use pixsqueeze::compressor::ImageCompressor;
use pixsqueeze::types::CompressOptions;
use pixsqueeze::{config, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixsqueeze")]
#[command(about = "Adaptive image compression that never makes your images bigger")]
#[command(long_about = "\
Adaptive image compression that never makes your images bigger

Each image is inspected (dimensions, transparency, EXIF, ICC profile,
histogram, complexity) before a strategy is picked: skip it, re-encode it
losslessly, or re-encode it lossy at a tuned quality. When the result
grows past the input by more than 0.5% (2% with an explicit --quality),
the original bytes are kept instead.

Inputs:

  pixsqueeze compress photo.jpg               # one file, best format
  pixsqueeze compress photo.png -f webp -q 80  # one file, given format
  pixsqueeze compress photo.png -f webp -f avif -o out/
  pixsqueeze compress photos/ -o photos/small --max-width 1920

Outputs are named <stem>_compress[_<quality>].<ext>. Directory runs keep
the relative layout under the output directory and skip output/, .git,
node_modules and similar directories.

Run 'pixsqueeze gen-config' to generate a documented pixsqueeze.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./pixsqueeze.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a file or every image in a directory
    Compress {
        /// Image file or directory
        input: PathBuf,

        /// Output file, or output directory for multi-format and directory runs
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target format (repeat or comma-separate for several)
        #[arg(short = 'f', long = "format", value_delimiter = ',')]
        formats: Vec<String>,

        /// Quality 1-100 (omit for lossless)
        #[arg(short, long)]
        quality: Option<u32>,

        /// Maximum output width in pixels
        #[arg(long)]
        max_width: Option<u32>,

        /// Maximum output height in pixels
        #[arg(long)]
        max_height: Option<u32>,

        /// Only process the top level of a directory
        #[arg(long)]
        no_recursive: bool,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print everything known about an image as JSON
    Info {
        path: PathBuf,

        /// Human-readable summary instead of JSON
        #[arg(long)]
        text: bool,
    },
    /// Print a stock pixsqueeze.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Compress {
            input,
            output,
            formats,
            quality,
            max_width,
            max_height,
            no_recursive,
            json,
        } => {
            let compressor = build_compressor(cli.config.as_deref())?;
            let options = CompressOptions {
                quality,
                max_width,
                max_height,
            };
            let response = compressor.compress_universal(
                &input,
                output.as_deref(),
                &formats,
                &options,
                !no_recursive,
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                output::print_response(&response);
            }
            if !response.success {
                std::process::exit(1);
            }
        }
        Command::Info { path, text } => {
            let compressor = build_compressor(cli.config.as_deref())?;
            let report = compressor.image_info(&path)?;
            if text {
                output::print_image_info(&report);
            } else {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for `--json`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn build_compressor(
    explicit: Option<&Path>,
) -> Result<ImageCompressor<RustCodec>, config::ConfigError> {
    let config = config::load_config(explicit, Path::new("."))?;
    Ok(ImageCompressor::new(config, RustCodec::new()))
}
