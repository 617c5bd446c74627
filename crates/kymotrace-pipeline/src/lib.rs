//! kymotrace-pipeline: Pure line profile extraction pipeline (sans-IO).
//!
//! Turns a kymograph and a hand-drawn annotation image into one
//! intensity profile per annotated line:
//! decode -> signal extraction -> skeletonize -> small-object removal ->
//! directional dilation -> partition -> reduce.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! byte slices and returns structured data. Writing profiles to disk
//! lives in `kymotrace-export` and the `kymotrace` binary.

pub mod decode;
pub mod diagnostics;
pub mod morphology;
pub mod partition;
pub mod pipeline;
pub mod reduce;
pub mod refine;
pub mod signal;
pub mod types;

pub use diagnostics::process_staged_with_diagnostics;
pub use morphology::{ImageprocMorphology, MorphologyOps};
pub use partition::LabeledSegmentation;
pub use pipeline::Pipeline;
pub use reduce::ReduceMethod;
pub use types::{
    Dimensions, GrayImage, IntensityImage, LineProfile, PipelineConfig, PipelineError,
    ProcessResult, StagedResult, TimeAxis,
};

/// Run the full pipeline and return only the line profiles.
///
/// `data_bytes` is the kymograph, `line_bytes` the annotation image in
/// which lines are drawn dark on a light background. Both must decode to
/// the same dimensions. Profiles come back in identifier order, each
/// with one value per time point.
///
/// An annotation without any line is not an error: the result simply
/// holds no profiles.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation, [`PipelineError::EmptyInput`] or
/// [`PipelineError::ImageDecode`] if either image cannot be decoded,
/// [`PipelineError::DimensionMismatch`] if the images differ in size,
/// and [`PipelineError::UnsupportedPixelFormat`] if the kymograph has a
/// pixel layout that cannot be read as intensities.
pub fn process(
    data_bytes: &[u8],
    line_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    process_staged(data_bytes, line_bytes, config).map(StagedResult::into_process_result)
}

/// Run the full pipeline, keeping every intermediate mask.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    data_bytes: &[u8],
    line_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Pipeline::new(data_bytes.to_vec(), line_bytes.to_vec(), config.clone()).complete()
}
