//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`process_staged_with_diagnostics`] runs the same stage chain as
//! [`crate::process_staged`] while timing every transition with a
//! caller-supplied [`Clock`]. The crate itself never reads the system
//! time, so it stays deterministic and sans-IO.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::types::{LineProfile, PipelineConfig, PipelineError, StagedResult};

/// Time source used to measure stage durations.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current point in time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: decoding both images.
    pub decode: StageDiagnostics,
    /// Stage 1: line signal extraction.
    pub signal: StageDiagnostics,
    /// Stage 2: skeletonization.
    pub skeletonize: StageDiagnostics,
    /// Stage 3: small-object removal.
    pub remove_small_objects: StageDiagnostics,
    /// Stage 4: directional dilation.
    pub dilate: StageDiagnostics,
    /// Stage 5: connected-component partitioning.
    pub partition: StageDiagnostics,
    /// Stage 6: profile reduction.
    pub reduce: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the kymograph bytes.
        data_bytes: usize,
        /// Size of the annotation bytes.
        line_bytes: usize,
        /// Frame width in pixels (after any transposition).
        width: u32,
        /// Frame height in pixels, equal to the number of time points.
        height: u32,
        /// Whether the data image was transposed to put time on rows.
        transposed: bool,
    },
    /// Line signal extraction metrics.
    Signal {
        /// Annotation channel used.
        channel: u8,
        /// Foreground pixels in the signal.
        foreground_pixels: u64,
        /// Total pixel count.
        total_pixels: u64,
    },
    /// Skeletonization metrics.
    Skeletonize {
        /// Foreground pixels before thinning.
        pixels_before: u64,
        /// Foreground pixels after thinning.
        pixels_after: u64,
    },
    /// Small-object removal metrics.
    RemoveSmallObjects {
        /// Minimum component size kept.
        min_size: u32,
        /// Foreground pixels before removal.
        pixels_before: u64,
        /// Foreground pixels after removal.
        pixels_after: u64,
    },
    /// Directional dilation metrics.
    Dilate {
        /// Width of the horizontal structuring element.
        dilation: u32,
        /// Foreground pixels before dilation.
        pixels_before: u64,
        /// Foreground pixels after dilation.
        pixels_after: u64,
    },
    /// Partitioning metrics.
    Partition {
        /// Number of line regions.
        line_count: usize,
        /// Pixels in the smallest region.
        min_line_pixels: u64,
        /// Pixels in the largest region.
        max_line_pixels: u64,
    },
    /// Profile reduction metrics.
    Reduce {
        /// Reduction method name.
        method: String,
        /// Number of profiles produced.
        line_count: usize,
        /// Values per profile.
        samples_per_line: usize,
        /// NaN values across all profiles.
        nan_samples: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Frame width in pixels.
    pub image_width: u32,
    /// Frame height in pixels.
    pub image_height: u32,
    /// Number of lines found.
    pub line_count: usize,
    /// Values written across all profiles.
    pub total_samples: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{} ({} time points)",
            self.summary.image_width, self.summary.image_height, self.summary.image_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Lines: {}  |  Samples: {}",
            self.summary.line_count, self.summary.total_samples,
        ));

        lines.join("\n")
    }

    /// Stages in execution order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 7] {
        [
            ("Decode", &self.decode),
            ("Signal", &self.signal),
            ("Skeletonize", &self.skeletonize),
            ("Remove Small Objects", &self.remove_small_objects),
            ("Dilate", &self.dilate),
            ("Partition", &self.partition),
            ("Reduce", &self.reduce),
        ]
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            data_bytes,
            line_bytes,
            width,
            height,
            transposed,
        } => {
            let note = if *transposed { " (transposed)" } else { "" };
            format!("{data_bytes}+{line_bytes} bytes -> {width}x{height}{note}")
        }
        StageMetrics::Signal {
            channel,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("channel={channel} line px={foreground_pixels} ({density:.1}%)")
        }
        StageMetrics::Skeletonize {
            pixels_before,
            pixels_after,
        } => format!("{pixels_before}->{pixels_after} px"),
        StageMetrics::RemoveSmallObjects {
            min_size,
            pixels_before,
            pixels_after,
        } => format!("min={min_size} {pixels_before}->{pixels_after} px"),
        StageMetrics::Dilate {
            dilation,
            pixels_before,
            pixels_after,
        } => format!("1x{dilation} {pixels_before}->{pixels_after} px"),
        StageMetrics::Partition {
            line_count,
            min_line_pixels,
            max_line_pixels,
        } => format!("{line_count} lines (min={min_line_pixels} max={max_line_pixels} px)"),
        StageMetrics::Reduce {
            method,
            line_count,
            samples_per_line,
            nan_samples,
        } => format!("{method} {line_count}x{samples_per_line} samples, {nan_samples} NaN"),
    }
}

/// Count NaN values across a set of profiles.
pub(crate) fn count_nan_samples(profiles: &[LineProfile]) -> usize {
    profiles
        .iter()
        .map(|p| p.values.iter().filter(|v| v.is_nan()).count())
        .sum()
}

/// Run the full pipeline, timing every stage with `clock`.
///
/// # Errors
///
/// Same as [`crate::process`].
pub fn process_staged_with_diagnostics<C: Clock>(
    data_bytes: &[u8],
    line_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let pipeline_start = clock.now();

    let start = clock.now();
    let decoded = Pipeline::new(data_bytes.to_vec(), line_bytes.to_vec(), config.clone()).decode()?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: decoded.metrics(),
    };

    let start = clock.now();
    let extracted = decoded.extract_signal();
    let signal = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: extracted.metrics(),
    };

    let start = clock.now();
    let skeletonized = extracted.skeletonize();
    let skeletonize = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: skeletonized.metrics(),
    };

    let start = clock.now();
    let cleaned = skeletonized.remove_small_objects();
    let remove_small_objects = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: cleaned.metrics(),
    };

    let start = clock.now();
    let refined = cleaned.dilate();
    let dilate = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: refined.metrics(),
    };

    let start = clock.now();
    let partitioned = refined.partition();
    let partition = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: partitioned.metrics(),
    };

    let start = clock.now();
    let profiled = partitioned.reduce();
    let reduce = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: profiled.metrics(),
    };

    let result = profiled.into_result();
    let total_duration = clock.elapsed(&pipeline_start);

    let summary = PipelineSummary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        line_count: result.profiles.len(),
        total_samples: result.profiles.iter().map(LineProfile::len).sum(),
    };

    Ok((
        result,
        PipelineDiagnostics {
            decode,
            signal,
            skeletonize,
            remove_small_objects,
            dilate,
            partition,
            reduce,
            total_duration,
            summary,
        },
    ))
}
