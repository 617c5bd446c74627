//! Line partitioning: one labeled region per connected line component.
//!
//! Labels coming out of [`MorphologyOps::label`] are only guaranteed to
//! be distinct. They are renumbered here so that identifiers run
//! `1..=n` in raster discovery order: the component containing the
//! first foreground pixel met scanning row by row gets identifier `1`,
//! and so on. Output file numbering relies on this order.

use std::collections::HashMap;

use image::{GrayImage, Luma};

use crate::morphology::{LabelImage, MorphologyOps};
use crate::types::FOREGROUND;

/// Disjoint line regions derived from a refined mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSegmentation {
    labels: LabelImage,
    count: u32,
}

impl LabeledSegmentation {
    /// Identifiers in enumeration order.
    pub fn identifiers(&self) -> impl Iterator<Item = u32> + use<> {
        1..=self.count
    }

    /// Number of line regions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count as usize
    }

    /// Returns `true` if no line regions were found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The renumbered label image (`0` is background).
    #[must_use]
    pub const fn labels(&self) -> &LabelImage {
        &self.labels
    }

    /// Boolean mask of one region, or `None` for an unknown identifier.
    #[must_use]
    pub fn region_by_identifier(&self, identifier: u32) -> Option<GrayImage> {
        if identifier == 0 || identifier > self.count {
            return None;
        }
        Some(GrayImage::from_fn(
            self.labels.width(),
            self.labels.height(),
            |x, y| {
                let inside = self.labels.get_pixel(x, y).0[0] == identifier;
                Luma([if inside { FOREGROUND } else { 0 }])
            },
        ))
    }

    /// `(identifier, region mask)` pairs in enumeration order.
    pub fn regions(&self) -> impl Iterator<Item = (u32, GrayImage)> + '_ {
        self.identifiers()
            .filter_map(|id| self.region_by_identifier(id).map(|region| (id, region)))
    }
}

/// Label `mask` into connected components with stable identifiers.
#[must_use = "returns the labeled segmentation"]
pub fn connected_components<M: MorphologyOps>(ops: &M, mask: &GrayImage) -> LabeledSegmentation {
    let (labels, count) = renumber_in_raster_order(&ops.label(mask));
    LabeledSegmentation { labels, count }
}

/// Renumber arbitrary distinct labels to `1..=n` by first appearance.
fn renumber_in_raster_order(raw: &LabelImage) -> (LabelImage, u32) {
    let mut mapping: HashMap<u32, u32> = HashMap::new();
    let mut next = 0u32;
    for p in raw.pixels() {
        let label = p.0[0];
        if label != 0 {
            mapping.entry(label).or_insert_with(|| {
                next += 1;
                next
            });
        }
    }

    let labels = LabelImage::from_fn(raw.width(), raw.height(), |x, y| {
        let label = raw.get_pixel(x, y).0[0];
        Luma([mapping.get(&label).copied().unwrap_or(0)])
    });
    (labels, next)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::morphology::ImageprocMorphology;

    /// Returns labels in reverse discovery order to prove that ordering
    /// does not depend on the labeling backend.
    struct ReversedLabels;

    impl MorphologyOps for ReversedLabels {
        fn skeletonize(&self, mask: &GrayImage) -> GrayImage {
            mask.clone()
        }

        fn remove_small_objects(&self, mask: &GrayImage, _min_size: u32) -> GrayImage {
            mask.clone()
        }

        fn dilate(&self, mask: &GrayImage, _element: &GrayImage) -> GrayImage {
            mask.clone()
        }

        fn label(&self, mask: &GrayImage) -> LabelImage {
            let raw = ImageprocMorphology.label(mask);
            LabelImage::from_fn(raw.width(), raw.height(), |x, y| {
                let l = raw.get_pixel(x, y).0[0];
                Luma([if l == 0 { 0 } else { 1000 - l }])
            })
        }
    }

    fn two_lines() -> GrayImage {
        GrayImage::from_fn(10, 6, |x, y| {
            let set = (y == 1 && x >= 5) || (y == 4 && x < 8);
            Luma([if set { FOREGROUND } else { 0 }])
        })
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let seg = connected_components(&ImageprocMorphology, &GrayImage::new(5, 5));
        assert!(seg.is_empty());
        assert_eq!(seg.len(), 0);
        assert_eq!(seg.regions().count(), 0);
    }

    #[test]
    fn single_component_region_equals_mask() {
        let mask = GrayImage::from_fn(8, 8, |x, y| {
            Luma([if y == 3 && (1..7).contains(&x) { FOREGROUND } else { 0 }])
        });
        let seg = connected_components(&ImageprocMorphology, &mask);
        assert_eq!(seg.identifiers().collect::<Vec<_>>(), vec![1]);
        assert_eq!(seg.region_by_identifier(1).unwrap(), mask);
    }

    #[test]
    fn identifiers_follow_raster_discovery_order() {
        let seg = connected_components(&ImageprocMorphology, &two_lines());
        assert_eq!(seg.len(), 2);
        // The row-1 line is met first when scanning, even though it starts
        // further right than the row-4 line.
        assert_eq!(seg.labels().get_pixel(5, 1).0[0], 1);
        assert_eq!(seg.labels().get_pixel(0, 4).0[0], 2);
    }

    #[test]
    fn ordering_is_independent_of_backend_labels() {
        let mask = two_lines();
        let reference = connected_components(&ImageprocMorphology, &mask);
        let reversed = connected_components(&ReversedLabels, &mask);
        assert_eq!(reference, reversed);
    }

    #[test]
    fn regions_are_disjoint_and_cover_mask() {
        let mask = two_lines();
        let seg = connected_components(&ImageprocMorphology, &mask);
        let regions: Vec<GrayImage> = seg.regions().map(|(_, r)| r).collect();
        for (x, y, p) in mask.enumerate_pixels() {
            let hits = regions
                .iter()
                .filter(|r| r.get_pixel(x, y).0[0] == FOREGROUND)
                .count();
            let expected = usize::from(p.0[0] == FOREGROUND);
            assert_eq!(hits, expected, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn unknown_identifier_has_no_region() {
        let seg = connected_components(&ImageprocMorphology, &two_lines());
        assert!(seg.region_by_identifier(0).is_none());
        assert!(seg.region_by_identifier(3).is_none());
    }

    #[test]
    fn rerun_is_identical() {
        let mask = two_lines();
        assert_eq!(
            connected_components(&ImageprocMorphology, &mask),
            connected_components(&ImageprocMorphology, &mask)
        );
    }
}
