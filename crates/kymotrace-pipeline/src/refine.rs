//! Line topology refinement.
//!
//! Turns a thick, possibly broken line signal into a mask where each
//! physical line is one connected component:
//!
//! 1. skeletonize, so stroke width no longer matters
//! 2. remove small objects, so specks are not bridged into real lines
//! 3. dilate with a `1 x dilation` horizontal bar, so gaps along a line
//!    close without fusing lines that sit on different rows

use image::{GrayImage, Luma};

use crate::morphology::MorphologyOps;
use crate::types::FOREGROUND;

/// Intermediate masks produced by [`refine`].
#[derive(Debug, Clone)]
pub struct Refinement {
    /// Output of skeletonization.
    pub skeleton: GrayImage,
    /// Skeleton with small components removed.
    pub cleaned: GrayImage,
    /// Final refined mask after directional dilation.
    pub refined: GrayImage,
}

/// Structuring element for directional dilation: one row of `width`
/// foreground pixels.
#[must_use]
pub fn horizontal_bar(width: u32) -> GrayImage {
    GrayImage::from_pixel(width.max(1), 1, Luma([FOREGROUND]))
}

/// Dilate `mask` along rows only.
#[must_use = "returns the dilated mask"]
pub fn directional_dilate<M: MorphologyOps>(ops: &M, mask: &GrayImage, dilation: u32) -> GrayImage {
    ops.dilate(mask, &horizontal_bar(dilation))
}

/// Run skeletonize, small-object removal and directional dilation.
#[must_use = "returns the refined masks"]
pub fn refine<M: MorphologyOps>(
    ops: &M,
    signal: &GrayImage,
    min_object_size: u32,
    dilation: u32,
) -> Refinement {
    let skeleton = ops.skeletonize(signal);
    let cleaned = ops.remove_small_objects(&skeleton, min_object_size);
    let refined = directional_dilate(ops, &cleaned, dilation);
    Refinement {
        skeleton,
        cleaned,
        refined,
    }
}
