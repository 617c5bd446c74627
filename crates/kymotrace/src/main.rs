//! kymotrace: write one intensity profile per annotated kymograph line.
//!
//! Reads a kymograph and an annotation image of the same size in which
//! lines are drawn dark on a light background. Every annotated line
//! becomes `series_<NN>.csv` in the output directory, and all lines are
//! also concatenated into `all_series.csv`.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin kymotrace -- [OPTIONS] <KYMOGRAPH_FILE> <LINE_FILE>
//! ```
//!
//! Logging goes to stderr through `env_logger`; set `RUST_LOG=debug` to
//! see per-stage pixel counts.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use kymotrace_export::{ALL_SERIES_FILENAME, CombinedSeriesWriter, series_filename, write_series};
use kymotrace_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use kymotrace_pipeline::{PipelineConfig, ReduceMethod, StagedResult, TimeAxis};

/// Extract per-line intensity profiles from a kymograph.
///
/// Lines are taken from an annotation image of the same size, drawn in
/// a dark color on a light background. Each line is sampled once per
/// row of the kymograph.
#[derive(Parser)]
#[command(name = "kymotrace", version)]
struct Cli {
    /// Image containing the kymograph (PNG, JPEG, BMP, TIFF).
    kymograph_file: PathBuf,

    /// Image containing the annotated lines.
    line_file: PathBuf,

    /// Width of the horizontal bar used to bridge gaps along a line (1-255).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DILATION)]
    dilation: u32,

    /// How pixels of a line are combined per row (max or mean).
    #[arg(long, default_value_t = ReduceMethod::default().to_string())]
    reduce_method: String,

    /// Annotation channel holding the lines (0=red, 1=green, 2=blue).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CHANNEL)]
    channel: u8,

    /// Skeleton components smaller than this many pixels are discarded.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_OBJECT_SIZE)]
    min_object_size: u32,

    /// Image axis that indexes time (rows or columns).
    #[arg(long, default_value_t = TimeAxis::default())]
    time_axis: TimeAxis,

    /// Directory that receives the CSV files (created if missing).
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Write the refined line mask to this path as PNG.
    #[arg(long)]
    save_mask: Option<PathBuf>,

    /// Print per-stage timing and counts to stderr.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// The reduction method is parsed here so that an unknown name is
/// reported before any input is read or output is written.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).context("parsing --config-json")?
    } else {
        PipelineConfig {
            dilation: cli.dilation,
            reduce_method: cli.reduce_method.parse()?,
            channel: cli.channel,
            min_object_size: cli.min_object_size,
            time_axis: cli.time_axis,
        }
    };
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = config_from_cli(cli)?;
    log::debug!("config: {config:?}");

    let data_bytes = fs::read(&cli.kymograph_file)
        .with_context(|| format!("reading {}", cli.kymograph_file.display()))?;
    let line_bytes = fs::read(&cli.line_file)
        .with_context(|| format!("reading {}", cli.line_file.display()))?;

    let (staged, diagnostics) = kymotrace_pipeline::process_staged_with_diagnostics(
        &data_bytes,
        &line_bytes,
        &config,
        &StdClock,
    )
    .with_context(|| {
        format!(
            "processing {} with {}",
            cli.kymograph_file.display(),
            cli.line_file.display()
        )
    })?;

    if cli.diagnostics || cli.json {
        print_diagnostics(&diagnostics, cli.json)?;
    }

    write_profiles(&staged, &cli.output_dir)?;

    if let Some(ref mask_path) = cli.save_mask {
        save_mask(&staged, mask_path)?;
    }

    Ok(())
}

/// Write every per-line CSV and the combined CSV into `output_dir`.
fn write_profiles(staged: &StagedResult, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let combined_path = output_dir.join(ALL_SERIES_FILENAME);
    let combined_file = File::create(&combined_path)
        .with_context(|| format!("creating {}", combined_path.display()))?;
    let mut combined = CombinedSeriesWriter::new(BufWriter::new(combined_file))
        .with_context(|| format!("writing {}", combined_path.display()))?;

    for (series_index, profile) in staged.profiles.iter().enumerate() {
        let path = output_dir.join(series_filename(series_index));
        let file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        write_series(BufWriter::new(file), profile)
            .with_context(|| format!("writing {}", path.display()))?;
        combined
            .append(series_index, profile)
            .with_context(|| format!("writing {}", combined_path.display()))?;
        log::debug!("line {} -> {}", profile.identifier, path.display());
    }

    let lines = combined.series_written();
    combined
        .finish()
        .with_context(|| format!("writing {}", combined_path.display()))?;

    log::info!(
        "wrote {lines} line profile(s) to {}",
        output_dir.display()
    );
    Ok(())
}

/// Save the refined mask, which is already in the orientation of the
/// input images.
fn save_mask(staged: &StagedResult, path: &Path) -> Result<()> {
    staged
        .refined
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("saving mask to {}", path.display()))?;
    log::info!("saved refined mask to {}", path.display());
    Ok(())
}

fn print_diagnostics(diagnostics: &PipelineDiagnostics, json: bool) -> Result<()> {
    if json {
        let text =
            serde_json::to_string_pretty(diagnostics).context("serializing diagnostics")?;
        eprintln!("{text}");
    } else {
        eprintln!("{}", diagnostics.report());
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
