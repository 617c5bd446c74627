//! Binary morphology primitives behind a pluggable capability trait.
//!
//! The refiner and partitioner only talk to [`MorphologyOps`]. The
//! default [`ImageprocMorphology`] binds dilation and connected-component
//! labeling to `imageproc`; thinning and small-object removal, which
//! `imageproc` does not provide, are built here on top of the same
//! labeling primitive.
//!
//! All masks are binary [`GrayImage`]s: `0` is background, anything else
//! is foreground. Outputs use [`FOREGROUND`] for set pixels.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::morphology::{Mask, grayscale_dilate};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::FOREGROUND;

/// Per-pixel component labels. `0` is background.
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Connectivity used for every component computation in the pipeline.
///
/// Small-object removal and line partitioning must agree on what counts
/// as connected, so both go through this constant.
pub const CONNECTIVITY: Connectivity = Connectivity::Eight;

/// Binary morphology capabilities used by the pipeline.
pub trait MorphologyOps {
    /// Thin every foreground region to a one-pixel-wide skeleton.
    ///
    /// Must preserve the number of connected components.
    fn skeletonize(&self, mask: &GrayImage) -> GrayImage;

    /// Delete connected components with fewer than `min_size` pixels.
    fn remove_small_objects(&self, mask: &GrayImage, min_size: u32) -> GrayImage;

    /// Dilate `mask` with the binary structuring element `element`,
    /// anchored at `(element.width() / 2, element.height() / 2)`.
    fn dilate(&self, mask: &GrayImage, element: &GrayImage) -> GrayImage;

    /// Label connected foreground components.
    ///
    /// Label values are only guaranteed to be distinct and non-zero;
    /// callers that need a stable order must impose it themselves.
    fn label(&self, mask: &GrayImage) -> LabelImage;
}

/// [`MorphologyOps`] backed by `imageproc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocMorphology;

impl MorphologyOps for ImageprocMorphology {
    fn skeletonize(&self, mask: &GrayImage) -> GrayImage {
        zhang_suen_thin(mask)
    }

    fn remove_small_objects(&self, mask: &GrayImage, min_size: u32) -> GrayImage {
        let labels = self.label(mask);
        let sizes = component_sizes(&labels);
        GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
            let label = labels.get_pixel(x, y).0[0] as usize;
            let keep = label != 0 && sizes[label] >= u64::from(min_size);
            Luma([if keep { FOREGROUND } else { 0 }])
        })
    }

    fn dilate(&self, mask: &GrayImage, element: &GrayImage) -> GrayImage {
        let center_x = u8::try_from(element.width() / 2).unwrap_or(u8::MAX);
        let center_y = u8::try_from(element.height() / 2).unwrap_or(u8::MAX);
        let footprint = Mask::from_image(element, center_x, center_y);
        let dilated = grayscale_dilate(&binarize(mask), &footprint);
        binarize(&dilated)
    }

    fn label(&self, mask: &GrayImage) -> LabelImage {
        connected_components(mask, CONNECTIVITY, Luma([0u8]))
    }
}

/// Map every non-zero pixel to [`FOREGROUND`].
#[must_use]
pub fn binarize(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([if mask.get_pixel(x, y).0[0] == 0 { 0 } else { FOREGROUND }])
    })
}

/// Number of foreground pixels in a binary mask.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}

/// Pixel count per label, indexed by label value (index 0 is background).
#[must_use]
pub fn component_sizes(labels: &LabelImage) -> Vec<u64> {
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut sizes = vec![0u64; max_label + 1];
    for p in labels.pixels() {
        sizes[p.0[0] as usize] += 1;
    }
    sizes[0] = 0;
    sizes
}

/// Neighbour offsets in Zhang-Suen order: P2 (north) clockwise to P9
/// (north-west).
const NEIGHBOURS: [(isize, isize); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Zhang-Suen thinning with the border treated as background.
///
/// Candidates are re-checked against the partially thinned grid just
/// before deletion. This keeps 2x2 blocks and other two-pixel-thick
/// fragments from vanishing in one sub-iteration, so every component
/// survives with at least one pixel.
#[must_use = "returns the thinned mask"]
pub fn zhang_suen_thin(mask: &GrayImage) -> GrayImage {
    let width = mask.width() as usize;
    let height = mask.height() as usize;
    let mut grid: Vec<bool> = mask.pixels().map(|p| p.0[0] != 0).collect();

    loop {
        let mut changed = false;
        for first_pass in [true, false] {
            let candidates: Vec<(usize, usize)> = (0..height)
                .flat_map(|y| (0..width).map(move |x| (x, y)))
                .filter(|&(x, y)| grid[y * width + x])
                .filter(|&(x, y)| is_deletable(&grid, width, height, x, y, first_pass))
                .collect();

            for (x, y) in candidates {
                if is_deletable(&grid, width, height, x, y, first_pass) {
                    grid[y * width + x] = false;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let set = grid[y as usize * width + x as usize];
        Luma([if set { FOREGROUND } else { 0 }])
    })
}

fn is_deletable(
    grid: &[bool],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    first_pass: bool,
) -> bool {
    let p = NEIGHBOURS.map(|(dx, dy)| {
        match (x.checked_add_signed(dx), y.checked_add_signed(dy)) {
            (Some(nx), Some(ny)) if nx < width && ny < height => grid[ny * width + nx],
            _ => false,
        }
    });

    let set_count = p.iter().filter(|&&v| v).count();
    if !(2..=6).contains(&set_count) {
        return false;
    }

    let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
    if transitions != 1 {
        return false;
    }

    let (north, east, south, west) = (p[0], p[2], p[4], p[6]);
    if first_pass {
        !(north && east && south) && !(east && south && west)
    } else {
        !(north && east && west) && !(north && south && west)
    }
}
