//! # chromtrace
//!
//! Parse chromatography text exports, select traces and export them.
//!
//! Each positional entry has the form
//! `<path>[:<filter>[:<options>[:<keywords>]]]`:
//!
//! ```bash
//! # MRM traces of events 1 and 2, coloured by precursor
//! chromtrace "run01.txt:mode=mrm,event=[1,2]:colorby=precursor"
//!
//! # Two files on separate rows, written to Parquet
//! chromtrace a.txt b.txt --filter mode=tic --parquet traces.parquet
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use chromtrace::config::Config;
use chromtrace::export;
use chromtrace::{required_axes, BatchPolicy, Defaults, Format, IdAllocator, PlotEntry};

/// Vendor override for `--format`.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Shimadzu,
    Thermo,
    Waters,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Shimadzu => Format::Shimadzu,
            FormatArg::Thermo => Format::Thermo,
            FormatArg::Waters => Format::Waters,
        }
    }
}

/// chromtrace - chromatography export parser and trace selector
#[derive(Parser)]
#[command(name = "chromtrace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Plot entries: <path>[:<filter>[:<options>[:<keywords>]]]
    #[arg(value_name = "ENTRY", required = true)]
    entries: Vec<String>,

    /// Filter applied to every entry, e.g. "mode=mrm"
    #[arg(short, long)]
    filter: Option<String>,

    /// Options applied to every entry, e.g. "colorby=event"
    #[arg(short, long)]
    options: Option<String>,

    /// Line keywords applied to every entry, e.g. "linewidth=1"
    #[arg(short, long)]
    keywords: Option<String>,

    /// TOML file with [filter], [options] and [keywords] defaults
    #[arg(short, long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Skip vendor detection and parse every file as this format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Write the selected traces as JSON
    #[arg(long, value_name = "OUTPUT")]
    json: Option<PathBuf>,

    /// Write the selected traces as Parquet
    #[arg(long, value_name = "OUTPUT")]
    parquet: Option<PathBuf>,

    /// Warn about unreadable files instead of aborting
    #[arg(long)]
    skip_invalid: bool,

    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let defaults = match &cli.config {
        Some(path) => Config::from_file(path)?.defaults()?,
        None => Defaults::builtin(),
    };
    let defaults = defaults
        .with_strings(
            cli.filter.as_deref(),
            cli.options.as_deref(),
            cli.keywords.as_deref(),
        )
        .context("Invalid global filter, options or keywords")?;

    let policy = if cli.skip_invalid {
        BatchPolicy::SkipInvalid
    } else {
        BatchPolicy::FailFast
    };
    let entries = PlotEntry::parse_all(
        &cli.entries,
        &defaults,
        cli.format.map(Format::from),
        &IdAllocator::new(),
        policy,
    )?;

    let (rows, cols) = required_axes(&entries);
    info!("{} files on a {rows}x{cols} grid", entries.len());
    for entry in &entries {
        println!(
            "{} [{}] {}: {} of {} traces selected",
            entry.file.path.display(),
            entry.file.format,
            entry.label().unwrap_or_default(),
            entry.traces().len(),
            entry.file.len(),
        );
    }

    let traces = export::collect_rows(&entries);
    if !traces.is_empty() {
        println!("{}", export::summary_table(&traces)?);
    }
    if let Some(path) = &cli.json {
        export::write_json(&traces, path)?;
    }
    if let Some(path) = &cli.parquet {
        export::write_parquet(&traces, path)?;
    }
    Ok(())
}
