//! polystream command line interface
//!
//! Usage:
//!   polystream [OPTIONS] <model.json>
//!   polystream --help
//!
//! Examples:
//!   polystream pipeline.json                      # Schedule, size buffers, print loops
//!   polystream --parallel --split pipeline.json   # Mark parallel loops, split period statements
//!   polystream --reverse s:1 pipeline.json        # Run dimension 1 of s backwards
//!   polystream --emit=json pipeline.json          # Machine-readable report

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, error, info};
use polystream::ir::ModelDescription;
use polystream::report::CompilationReport;
use polystream::utils::poly_print::{print_model, print_schedule};
use polystream::{BufferSizingKind, CompilerOptions};
use std::fs;
use std::path::PathBuf;

/// polystream - schedules and buffers for polyhedral stream programs
#[derive(Parser, Debug)]
#[command(name = "polystream")]
#[command(version)]
#[command(about = "Polyhedral scheduling and periodic storage allocation", long_about = None)]
struct Cli {
    /// Model description (JSON)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Disable proximity optimization in the scheduler
    #[arg(long)]
    no_optimize: bool,

    /// Schedule the whole program as a single band
    #[arg(long)]
    whole_program: bool,

    /// Reverse a schedule dimension, as STATEMENT:DIM (repeatable)
    #[arg(long = "reverse", value_name = "STMT:DIM", value_parser = parse_reversal)]
    reversals: Vec<(String, usize)>,

    /// Split period statements to avoid modulo addressing
    #[arg(long)]
    split: bool,

    /// Separate loops over disjoint statement ranges
    #[arg(long)]
    separate: bool,

    /// Mark parallel loops
    #[arg(long)]
    parallel: bool,

    /// Buffer sizing strategy
    #[arg(long, default_value = "refined")]
    sizing: SizingArg,

    /// What to emit
    #[arg(long, default_value = "loops")]
    emit: EmitKind,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SizingArg {
    /// Dimension by dimension
    Classic,
    /// Per-dimension lower bounds with aliasing repair
    Refined,
}

impl From<SizingArg> for BufferSizingKind {
    fn from(arg: SizingArg) -> Self {
        match arg {
            SizingArg::Classic => BufferSizingKind::Classic,
            SizingArg::Refined => BufferSizingKind::Refined,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// Annotated loop nests
    Loops,
    /// Model with buffer sizes and statement flags
    Model,
    /// Prelude and period schedules
    Schedule,
    /// JSON report
    Json,
    /// Everything in text form
    All,
}

fn parse_reversal(text: &str) -> Result<(String, usize)> {
    let (name, dim) = text
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected STATEMENT:DIM, got {:?}", text))?;
    let dim = dim
        .parse()
        .with_context(|| format!("invalid dimension in {:?}", text))?;
    Ok((name.to_string(), dim))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("polystream v{}", polystream::VERSION);
    debug!("Input file: {:?}", cli.input);

    let text = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;
    let description = ModelDescription::from_json(&text)
        .with_context(|| format!("Failed to parse model description: {:?}", cli.input))?;
    let mut model = description
        .into_model()
        .with_context(|| "Failed to build the polyhedral model")?;

    let options = build_options(&cli);
    debug!("Compiler options: {:?}", options);

    let result = match polystream::compile(&mut model, &options) {
        Ok(result) => result,
        Err(e) => {
            error!("Compilation failed: {}", e);
            return Err(e.into());
        }
    };
    info!("Compilation complete");

    let output = match cli.emit {
        EmitKind::Loops => result.ast.to_string(),
        EmitKind::Model => print_model(&model),
        EmitKind::Schedule => print_schedule(&model, &result.schedule),
        EmitKind::Json => CompilationReport::new(&model, &result)
            .to_json()
            .with_context(|| "Failed to serialize the report")?,
        EmitKind::All => format!(
            "{}\n{}\n{}",
            print_model(&model),
            print_schedule(&model, &result.schedule),
            result.ast
        ),
    };
    write_output(&cli.output, &output)
}

fn build_options(cli: &Cli) -> CompilerOptions {
    let mut options = CompilerOptions::new()
        .with_optimization(!cli.no_optimize)
        .with_whole_program(cli.whole_program)
        .with_splitting(cli.split)
        .with_separation(cli.separate)
        .with_parallel(cli.parallel)
        .with_buffer_sizing(cli.sizing.into());
    for (name, dim) in &cli.reversals {
        options = options.with_reversal(name, *dim);
    }
    options
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)
                .with_context(|| format!("Failed to write output file: {:?}", p))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
