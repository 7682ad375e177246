//! # Iconvert CLI - Character Encoding Converter
//!
//! Command-line interface for converting files and streams between
//! character encodings through the platform iconv subsystem.

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::io::{self, Read, Write};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use serde::Serialize;

#[cfg(feature = "cli")]
use iconvert::{Converter, Error as ConvertError};

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features disabled. Enable with --features cli");
    std::process::exit(1);
}

/// Iconvert: character encoding converter over platform iconv
#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "iconvert")]
#[command(version, about, long_about = None)]
#[command(author = "Iconvert Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Convert a file or stream between character encodings
    Convert(ConvertArgs),

    /// Validate that input is well-formed in a given encoding
    Validate(ValidateArgs),
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ConvertArgs {
    /// Source encoding name, as known to the platform (e.g. GBK)
    #[arg(short = 'f', long = "from")]
    from: String,

    /// Target encoding name, as known to the platform (e.g. UTF-8)
    #[arg(short = 't', long = "to")]
    to: String,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Convert in-place (overwrite input file)
    #[arg(long, conflicts_with = "output")]
    in_place: bool,

    /// Scratch buffer size for the conversion loop (KB)
    #[arg(long, default_value = "64")]
    buffer_size: usize,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ValidateArgs {
    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Expected encoding
    #[arg(short, long)]
    encoding: String,
}

#[cfg(feature = "cli")]
#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ConversionReport {
    success: bool,
    from: String,
    to: String,
    bytes_read: usize,
    bytes_written: usize,
    processing_time_ms: u64,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    encoding: String,
    bytes_checked: usize,
    error: Option<ConvertError>,
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert(ref args) => convert_command(args, &cli)?,
        Commands::Validate(ref args) => validate_command(args, &cli)?,
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn read_input(path: &Option<PathBuf>, verbose: bool) -> Result<Vec<u8>> {
    if let Some(path) = path {
        if verbose {
            eprintln!("Reading from: {}", path.display());
        }
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
    } else {
        if verbose {
            eprintln!("Reading from stdin");
        }
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    }
}

#[cfg(feature = "cli")]
fn convert_command(args: &ConvertArgs, cli: &Cli) -> Result<()> {
    let start_time = std::time::Instant::now();

    if cli.verbose {
        eprintln!("Converting from {} to {}", args.from, args.to);
    }

    let scratch_len = args.buffer_size.max(1) * 1024;
    let mut converter = Converter::with_scratch_len(&args.from, &args.to, scratch_len)
        .with_context(|| {
            format!(
                "Failed to create converter from {} to {}",
                args.from, args.to
            )
        })?;

    let input_data = read_input(&args.input, cli.verbose)?;

    let output_data = converter.convert(&input_data).context("Conversion failed")?;

    if args.in_place {
        if let Some(ref input_path) = args.input {
            fs::write(input_path, &output_data).with_context(|| {
                format!("Failed to write to input file: {}", input_path.display())
            })?;
            if cli.verbose {
                eprintln!("Updated file in-place: {}", input_path.display());
            }
        } else {
            anyhow::bail!("Cannot use --in-place without input file");
        }
    } else if let Some(ref output_path) = args.output {
        fs::write(output_path, &output_data)
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
        if cli.verbose {
            eprintln!("Wrote to: {}", output_path.display());
        }
    } else {
        io::stdout()
            .write_all(&output_data)
            .context("Failed to write to stdout")?;
    }

    let processing_time = start_time.elapsed();

    if cli.verbose {
        eprintln!(
            "Processed {} bytes -> {} bytes in {:?}",
            input_data.len(),
            output_data.len(),
            processing_time
        );
    }

    if let OutputFormat::Json = cli.format {
        let report = ConversionReport {
            success: true,
            from: args.from.clone(),
            to: args.to.clone(),
            bytes_read: input_data.len(),
            bytes_written: output_data.len(),
            processing_time_ms: processing_time.as_millis() as u64,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn validate_command(args: &ValidateArgs, cli: &Cli) -> Result<()> {
    let input_data = read_input(&args.input, cli.verbose)?;

    // Converting to UTF-8 exercises every byte of the input through the
    // declared source encoding.
    let outcome = iconvert::convert(&input_data, &args.encoding, "UTF-8");

    let report = ValidationReport {
        valid: outcome.is_ok(),
        encoding: args.encoding.clone(),
        bytes_checked: input_data.len(),
        error: outcome.as_ref().err().cloned(),
    };

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => match outcome {
            Ok(_) => println!("✓ Input is valid {}", args.encoding),
            Err(ref e) => {
                println!("✗ Input is not valid {}", args.encoding);
                println!("  {} (raw code {})", e, e.raw_os_error());
            }
        },
    }

    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}
