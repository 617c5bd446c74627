//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use kymotrace_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(data: Vec<u8>, lines: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(data, lines, PipelineConfig::default())
//!     .decode()?
//!     .extract_signal()
//!     .skeletonize()
//!     .remove_small_objects()
//!     .dilate()
//!     .partition()
//!     .reduce()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying every previously computed intermediate. Skipping a stage or
//! calling stages out of order is a compile-time error.
//!
//! # Memory
//!
//! Every stage retains all earlier masks so that [`StagedResult`] can
//! expose them. Callers that only need the profiles should use
//! [`crate::process`], which drops the intermediates at the end.

use std::borrow::Cow;

use image::DynamicImage;

use crate::decode;
use crate::diagnostics::{StageMetrics, count_nan_samples};
use crate::morphology::{ImageprocMorphology, MorphologyOps, component_sizes, count_foreground};
use crate::partition::{self, LabeledSegmentation};
use crate::reduce;
use crate::refine;
use crate::signal;
use crate::types::{
    Dimensions, GrayImage, IntensityImage, LineProfile, PipelineConfig, PipelineError,
    StagedResult, TimeAxis,
};

/// State shared by every stage after decoding.
struct Frame {
    config: PipelineConfig,
    data: IntensityImage,
    dimensions: Dimensions,
}

impl Frame {
    const fn ops() -> ImageprocMorphology {
        ImageprocMorphology
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    data_source: Vec<u8>,
    line_source: Vec<u8>,
}

impl Pending {
    /// The raw kymograph bytes.
    #[must_use]
    pub fn data_source(&self) -> &[u8] {
        &self.data_source
    }

    /// The raw annotation image bytes.
    #[must_use]
    pub fn line_source(&self) -> &[u8] {
        &self.line_source
    }

    /// Validate the config, decode both images and bring the data image
    /// into the pipeline frame.
    ///
    /// The annotation image keeps its original orientation until the
    /// refined mask is partitioned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an out-of-range
    /// config, [`PipelineError::EmptyInput`] or
    /// [`PipelineError::ImageDecode`] when either image cannot be
    /// decoded, [`PipelineError::DimensionMismatch`] when the images
    /// differ in size, and [`PipelineError::UnsupportedPixelFormat`] for
    /// data images with an unknown pixel layout.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;

        let data_image = decode::decode(&self.data_source)?;
        let line_image = decode::decode(&self.line_source)?;

        let data_dimensions = decode::dimensions_of(&data_image);
        let line_dimensions = decode::dimensions_of(&line_image);
        if data_dimensions != line_dimensions {
            return Err(PipelineError::DimensionMismatch {
                data: data_dimensions,
                line: line_dimensions,
            });
        }

        let data = decode::to_intensity(&data_image, self.config.channel)?;
        let data = match self.config.time_axis {
            TimeAxis::Rows => data,
            TimeAxis::Columns => decode::transpose(&data),
        };
        let dimensions = Dimensions {
            width: data.width(),
            height: data.height(),
        };
        log::debug!(
            "decoded {data_dimensions} images, pipeline frame {dimensions} (time axis: {})",
            self.config.time_axis
        );

        Ok(Decoded {
            frame: Frame {
                config: self.config,
                data,
                dimensions,
            },
            line: line_image,
            source_bytes: (self.data_source.len(), self.line_source.len()),
        })
    }

    /// Run all remaining stages.
    ///
    /// # Errors
    ///
    /// See [`decode`](Self::decode).
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self
            .decode()?
            .extract_signal()
            .skeletonize()
            .remove_small_objects()
            .dilate()
            .partition()
            .reduce()
            .into_result())
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Both images decoded, the data image in the pipeline frame.
#[must_use = "pipeline stages are consumed by advancing, call .extract_signal() to continue"]
pub struct Decoded {
    frame: Frame,
    line: DynamicImage,
    source_bytes: (usize, usize),
}

impl Decoded {
    /// Single-channel data image.
    #[must_use]
    pub const fn data(&self) -> &IntensityImage {
        &self.frame.data
    }

    /// Annotation image in its original orientation.
    #[must_use]
    pub const fn line_image(&self) -> &DynamicImage {
        &self.line
    }

    /// Pipeline frame dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.frame.dimensions
    }

    /// Metrics describing the decode step.
    #[must_use]
    pub const fn metrics(&self) -> StageMetrics {
        StageMetrics::Decode {
            data_bytes: self.source_bytes.0,
            line_bytes: self.source_bytes.1,
            width: self.frame.dimensions.width,
            height: self.frame.dimensions.height,
            transposed: matches!(self.frame.config.time_axis, TimeAxis::Columns),
        }
    }

    /// Threshold the annotation image into a binary line signal.
    pub fn extract_signal(self) -> SignalExtracted {
        let signal = signal::convert_to_signal(&self.line, self.frame.config.channel);
        log::debug!("line signal: {} pixels", count_foreground(&signal));
        SignalExtracted {
            frame: self.frame,
            signal,
        }
    }
}

// ─────────────────────── Stage 2: SignalExtracted ─────────────────────

/// Binary line signal extracted from the annotation image.
#[must_use = "pipeline stages are consumed by advancing, call .skeletonize() to continue"]
pub struct SignalExtracted {
    frame: Frame,
    signal: GrayImage,
}

impl SignalExtracted {
    /// The binary line signal.
    #[must_use]
    pub const fn signal(&self) -> &GrayImage {
        &self.signal
    }

    /// Metrics describing the signal extraction step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Signal {
            channel: self.frame.config.channel,
            foreground_pixels: count_foreground(&self.signal),
            total_pixels: u64::from(self.frame.dimensions.width)
                * u64::from(self.frame.dimensions.height),
        }
    }

    /// Thin the signal to one-pixel-wide skeletons.
    pub fn skeletonize(self) -> Skeletonized {
        let skeleton = Frame::ops().skeletonize(&self.signal);
        log::debug!("skeleton: {} pixels", count_foreground(&skeleton));
        Skeletonized {
            frame: self.frame,
            signal: self.signal,
            skeleton,
        }
    }
}

// ───────────────────────── Stage 3: Skeletonized ─────────────────────

/// Signal thinned to skeletons.
#[must_use = "pipeline stages are consumed by advancing, call .remove_small_objects() to continue"]
pub struct Skeletonized {
    frame: Frame,
    signal: GrayImage,
    skeleton: GrayImage,
}

impl Skeletonized {
    /// The skeleton mask.
    #[must_use]
    pub const fn skeleton(&self) -> &GrayImage {
        &self.skeleton
    }

    /// Metrics describing the skeletonization step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Skeletonize {
            pixels_before: count_foreground(&self.signal),
            pixels_after: count_foreground(&self.skeleton),
        }
    }

    /// Drop skeleton components smaller than `min_object_size`.
    pub fn remove_small_objects(self) -> Cleaned {
        let cleaned =
            Frame::ops().remove_small_objects(&self.skeleton, self.frame.config.min_object_size);
        log::debug!(
            "small-object removal (< {} px): {} -> {} pixels",
            self.frame.config.min_object_size,
            count_foreground(&self.skeleton),
            count_foreground(&cleaned)
        );
        Cleaned {
            frame: self.frame,
            signal: self.signal,
            skeleton: self.skeleton,
            cleaned,
        }
    }
}

// ───────────────────────── Stage 4: Cleaned ──────────────────────────

/// Skeleton with noise components removed.
#[must_use = "pipeline stages are consumed by advancing, call .dilate() to continue"]
pub struct Cleaned {
    frame: Frame,
    signal: GrayImage,
    skeleton: GrayImage,
    cleaned: GrayImage,
}

impl Cleaned {
    /// The cleaned skeleton.
    #[must_use]
    pub const fn cleaned(&self) -> &GrayImage {
        &self.cleaned
    }

    /// Metrics describing the small-object removal step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::RemoveSmallObjects {
            min_size: self.frame.config.min_object_size,
            pixels_before: count_foreground(&self.skeleton),
            pixels_after: count_foreground(&self.cleaned),
        }
    }

    /// Grow the cleaned skeleton along image rows with the dilation bar.
    pub fn dilate(self) -> Refined {
        let refined =
            refine::directional_dilate(&Frame::ops(), &self.cleaned, self.frame.config.dilation);
        log::debug!(
            "directional dilation (1x{}): {} -> {} pixels",
            self.frame.config.dilation,
            count_foreground(&self.cleaned),
            count_foreground(&refined)
        );
        Refined {
            frame: self.frame,
            signal: self.signal,
            skeleton: self.skeleton,
            cleaned: self.cleaned,
            refined,
        }
    }
}

// ───────────────────────── Stage 5: Refined ──────────────────────────

/// Refined line mask, ready for partitioning.
#[must_use = "pipeline stages are consumed by advancing, call .partition() to continue"]
pub struct Refined {
    frame: Frame,
    signal: GrayImage,
    skeleton: GrayImage,
    cleaned: GrayImage,
    refined: GrayImage,
}

impl Refined {
    /// The refined mask.
    #[must_use]
    pub const fn refined(&self) -> &GrayImage {
        &self.refined
    }

    /// Metrics describing the dilation step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Dilate {
            dilation: self.frame.config.dilation,
            pixels_before: count_foreground(&self.cleaned),
            pixels_after: count_foreground(&self.refined),
        }
    }

    /// Split the refined mask into one region per connected line.
    ///
    /// Labeling happens in the pipeline frame, so with
    /// [`TimeAxis::Columns`] the mask is transposed first.
    pub fn partition(self) -> Partitioned {
        let segmentation = {
            let mask = match self.frame.config.time_axis {
                TimeAxis::Rows => Cow::Borrowed(&self.refined),
                TimeAxis::Columns => Cow::Owned(decode::transpose(&self.refined)),
            };
            partition::connected_components(&Frame::ops(), &mask)
        };
        if segmentation.is_empty() {
            log::warn!("no lines found in the annotation image");
        } else {
            log::debug!("partitioned into {} lines", segmentation.len());
        }
        Partitioned {
            frame: self.frame,
            signal: self.signal,
            skeleton: self.skeleton,
            cleaned: self.cleaned,
            refined: self.refined,
            segmentation,
        }
    }
}

// ───────────────────────── Stage 6: Partitioned ──────────────────────

/// Labeled line regions.
#[must_use = "pipeline stages are consumed by advancing, call .reduce() to continue"]
pub struct Partitioned {
    frame: Frame,
    signal: GrayImage,
    skeleton: GrayImage,
    cleaned: GrayImage,
    refined: GrayImage,
    segmentation: LabeledSegmentation,
}

impl Partitioned {
    /// The labeled segmentation.
    #[must_use]
    pub const fn segmentation(&self) -> &LabeledSegmentation {
        &self.segmentation
    }

    /// Metrics describing the partition step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let sizes: Vec<u64> = component_sizes(self.segmentation.labels())
            .into_iter()
            .skip(1)
            .collect();
        StageMetrics::Partition {
            line_count: self.segmentation.len(),
            min_line_pixels: sizes.iter().copied().min().unwrap_or(0),
            max_line_pixels: sizes.iter().copied().max().unwrap_or(0),
        }
    }

    /// Sample the data image along every line region.
    pub fn reduce(self) -> Profiled {
        let method = self.frame.config.reduce_method;
        let profiles: Vec<LineProfile> = self
            .segmentation
            .regions()
            .map(|(identifier, region)| {
                let profile = reduce::reduce_region(&self.frame.data, identifier, &region, method);
                log::trace!("line {identifier}: {} samples", profile.len());
                profile
            })
            .collect();
        Profiled {
            frame: self.frame,
            signal: self.signal,
            skeleton: self.skeleton,
            cleaned: self.cleaned,
            refined: self.refined,
            segmentation: self.segmentation,
            profiles,
        }
    }
}

// ───────────────────────── Stage 7: Profiled ─────────────────────────

/// Final stage: one profile per line.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Profiled {
    frame: Frame,
    signal: GrayImage,
    skeleton: GrayImage,
    cleaned: GrayImage,
    refined: GrayImage,
    segmentation: LabeledSegmentation,
    profiles: Vec<LineProfile>,
}

impl Profiled {
    /// The line profiles in segmentation order.
    #[must_use]
    pub fn profiles(&self) -> &[LineProfile] {
        &self.profiles
    }

    /// Metrics describing the reduction step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Reduce {
            method: self.frame.config.reduce_method.to_string(),
            line_count: self.profiles.len(),
            samples_per_line: self.frame.dimensions.height as usize,
            nan_samples: count_nan_samples(&self.profiles),
        }
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            data: self.frame.data,
            signal: self.signal,
            skeleton: self.skeleton,
            cleaned: self.cleaned,
            refined: self.refined,
            segmentation: self.segmentation,
            profiles: self.profiles,
            dimensions: self.frame.dimensions,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental line profile pipeline.
///
/// Created via [`Pipeline::new`], which stores the inputs and config
/// without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from kymograph bytes, annotation bytes and
    /// config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(data_bytes: Vec<u8>, line_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            data_source: data_bytes,
            line_source: line_bytes,
        }
    }
}
