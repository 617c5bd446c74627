//! Shared types for the kymotrace pipeline.

use std::fmt;
use std::str::FromStr;

use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::partition::LabeledSegmentation;
use crate::reduce::ReduceMethod;

/// Re-export `GrayImage` so downstream crates can reference binary
/// masks without depending on `image` directly.
///
/// Masks use `0` for background and [`FOREGROUND`] for line pixels.
pub use image::GrayImage;

/// Pixel value marking a line pixel in a binary mask.
pub const FOREGROUND: u8 = 255;

/// Single-channel data image with intensities widened to `f64`.
///
/// Values keep the scale of the source file: an 8-bit pixel of `100`
/// is stored as `100.0`, a 16-bit pixel of `4000` as `4000.0`.
pub type IntensityImage = ImageBuffer<Luma<f64>, Vec<f64>>;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels (number of columns).
    pub width: u32,
    /// Height in pixels (number of rows, i.e. time points).
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which image axis carries time.
///
/// The pipeline always samples one value per row. With
/// [`Columns`](Self::Columns) the data image is transposed right after
/// decoding. Line refinement still runs in image orientation, so the
/// dilation bar stays horizontal in the image, and the refined mask is
/// transposed just before partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeAxis {
    /// Time runs down the rows: one profile value per row.
    #[default]
    Rows,
    /// Time runs across the columns: one profile value per column.
    Columns,
}

impl TimeAxis {
    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rows => "rows",
            Self::Columns => "columns",
        }
    }
}

impl fmt::Display for TimeAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeAxis {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rows" => Ok(Self::Rows),
            "columns" => Ok(Self::Columns),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown time axis: {other} (expected rows or columns)"
            ))),
        }
    }
}

/// Configuration for the line segmentation and profile pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width of the horizontal `1 x dilation` structuring element used to
    /// bridge gaps along a line. `1` disables dilation.
    pub dilation: u32,

    /// How each row of a line region collapses to a single value.
    pub reduce_method: ReduceMethod,

    /// Annotation image channel used as the grayscale proxy
    /// (0 = red, 1 = green, 2 = blue). Ignored for single-channel images.
    pub channel: u8,

    /// Skeleton components with fewer pixels than this are discarded
    /// as noise.
    pub min_object_size: u32,

    /// Which image axis carries time.
    pub time_axis: TimeAxis,
}

impl PipelineConfig {
    /// Default dilation bar width.
    pub const DEFAULT_DILATION: u32 = 2;

    /// Largest dilation bar width accepted by [`validate`](Self::validate).
    pub const MAX_DILATION: u32 = 255;

    /// Default annotation channel (red).
    pub const DEFAULT_CHANNEL: u8 = 0;

    /// Default minimum skeleton component size in pixels.
    pub const DEFAULT_MIN_OBJECT_SIZE: u32 = 10;

    /// Check that every field is within its supported range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when `dilation` is outside
    /// `1..=255`, `channel` is greater than 2 or `min_object_size` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(1..=Self::MAX_DILATION).contains(&self.dilation) {
            return Err(PipelineError::InvalidConfig(format!(
                "dilation must be in 1..={}, got {}",
                Self::MAX_DILATION,
                self.dilation
            )));
        }
        if self.channel > 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "channel must be 0, 1 or 2, got {}",
                self.channel
            )));
        }
        if self.min_object_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_object_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dilation: Self::DEFAULT_DILATION,
            reduce_method: ReduceMethod::default(),
            channel: Self::DEFAULT_CHANNEL,
            min_object_size: Self::DEFAULT_MIN_OBJECT_SIZE,
            time_axis: TimeAxis::default(),
        }
    }
}

/// The intensity profile of one detected line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineProfile {
    /// Segmentation identifier of the line this profile was sampled from.
    pub identifier: u32,
    /// One value per row of the data image, in row order.
    pub values: Vec<f64>,
}

impl LineProfile {
    /// Number of time points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the profile has no time points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(time_index, intensity)` pairs in time order.
    pub fn samples(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().copied().enumerate()
    }
}

/// Result of running the full pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// One profile per detected line, in segmentation order.
    pub profiles: Vec<LineProfile>,

    /// Dimensions of the pipeline frame (after any transposition).
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved.
///
/// Used by the CLI to save the refined mask and by tests that need to
/// inspect individual stages.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 1: single-channel data image in the pipeline frame.
    pub data: IntensityImage,
    /// Stage 2: thresholded annotation signal, in image orientation.
    pub signal: GrayImage,
    /// Stage 3a: one-pixel-wide skeleton.
    pub skeleton: GrayImage,
    /// Stage 3b: skeleton with small components removed.
    pub cleaned: GrayImage,
    /// Stage 3c: refined mask after directional dilation, in image
    /// orientation.
    pub refined: GrayImage,
    /// Stage 4: labeled line components in the pipeline frame.
    pub segmentation: LabeledSegmentation,
    /// Stage 5: one profile per line.
    pub profiles: Vec<LineProfile>,
    /// Pipeline frame dimensions.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Drop the intermediates, keeping the profiles and dimensions.
    #[must_use]
    pub fn into_process_result(self) -> ProcessResult {
        ProcessResult {
            profiles: self.profiles,
            dimensions: self.dimensions,
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode an input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image uses a pixel layout the pipeline cannot read.
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// The data and line images do not have the same dimensions.
    #[error("data image is {data} but line image is {line}")]
    DimensionMismatch {
        /// Data (kymograph) image dimensions.
        data: Dimensions,
        /// Line annotation image dimensions.
        line: Dimensions,
    },

    /// The reduction method selector is not recognized.
    #[error("unknown reduction method: {0}")]
    UnknownReduceMethod(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
