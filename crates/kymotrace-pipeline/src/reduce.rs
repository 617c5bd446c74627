//! Profile reduction: collapse a line region to one value per row.
//!
//! The data image is multiplied by the region mask (zero outside the
//! region) and each row of the product is reduced with a
//! [`ReduceMethod`].
//!
//! # Known ambiguities
//!
//! - [`ReduceMethod::Max`] reports `0` for a row the region does not
//!   touch, which is indistinguishable from a real zero intensity.
//! - [`ReduceMethod::Mean`] divides by the number of region pixels in the
//!   row, so an untouched row yields `0 / 0 = NaN`.
//!
//! Both are reported as values, not errors.

use std::fmt;
use std::str::FromStr;

use image::GrayImage;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{IntensityImage, LineProfile, PipelineError};

/// Selects how the masked pixels of a row collapse to a single value.
///
/// Deserializes through [`FromStr`], so config files report the same
/// [`PipelineError::UnknownReduceMethod`] message as the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReduceMethod {
    /// Maximum of the zeroed row.
    #[default]
    Max,
    /// Sum of the zeroed row divided by the region pixel count.
    Mean,
}

impl ReduceMethod {
    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Mean => "mean",
        }
    }

    /// Reduce one row of `line_intensity` (already zeroed outside the
    /// region) given how many region pixels the row contains.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reduce_row(self, line_intensity: &[f64], region_count: usize) -> f64 {
        match self {
            Self::Max => line_intensity
                .iter()
                .copied()
                .reduce(f64::max)
                .unwrap_or(0.0),
            Self::Mean => line_intensity.iter().sum::<f64>() / region_count as f64,
        }
    }
}

impl fmt::Display for ReduceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReduceMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            other => Err(PipelineError::UnknownReduceMethod(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for ReduceMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Sample `data_image` inside `line_region` and reduce every row.
///
/// The profile has exactly `data_image.height()` values. Region pixels
/// outside the data image bounds are ignored.
#[must_use = "returns the line profile"]
pub fn line_profile_from_image_and_region(
    data_image: &IntensityImage,
    line_region: &GrayImage,
    method: ReduceMethod,
) -> Vec<f64> {
    let width = data_image.width();
    let mut row = Vec::with_capacity(width as usize);

    (0..data_image.height())
        .map(|y| {
            row.clear();
            let mut region_count = 0usize;
            for x in 0..width {
                let inside = line_region
                    .get_pixel_checked(x, y)
                    .is_some_and(|p| p.0[0] != 0);
                region_count += usize::from(inside);
                let weight = if inside { 1.0 } else { 0.0 };
                row.push(data_image.get_pixel(x, y).0[0] * weight);
            }
            method.reduce_row(&row, region_count)
        })
        .collect()
}

/// Build the [`LineProfile`] for one identified region.
#[must_use = "returns the line profile"]
pub fn reduce_region(
    data_image: &IntensityImage,
    identifier: u32,
    line_region: &GrayImage,
    method: ReduceMethod,
) -> LineProfile {
    LineProfile {
        identifier,
        values: line_profile_from_image_and_region(data_image, line_region, method),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::types::FOREGROUND;

    fn data(width: u32, height: u32, f: impl Fn(u32, u32) -> f64) -> IntensityImage {
        IntensityImage::from_fn(width, height, |x, y| Luma([f(x, y)]))
    }

    fn region(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            Luma([if f(x, y) { FOREGROUND } else { 0 }])
        })
    }

    #[test]
    fn parse_known_methods() {
        assert_eq!("max".parse::<ReduceMethod>().unwrap(), ReduceMethod::Max);
        assert_eq!("mean".parse::<ReduceMethod>().unwrap(), ReduceMethod::Mean);
    }

    #[test]
    fn parse_unknown_method_is_an_error() {
        let err = "median".parse::<ReduceMethod>().unwrap_err();
        assert!(matches!(err, PipelineError::UnknownReduceMethod(ref m) if m == "median"));
    }

    #[test]
    fn json_uses_the_same_names_and_errors_as_parse() {
        let method: ReduceMethod = serde_json::from_str("\"mean\"").unwrap();
        assert_eq!(method, ReduceMethod::Mean);
        assert_eq!(serde_json::to_string(&ReduceMethod::Max).unwrap(), "\"max\"");

        let err = serde_json::from_str::<ReduceMethod>("\"median\"").unwrap_err();
        assert!(
            err.to_string().contains("unknown reduction method: median"),
            "{err}"
        );
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!("MAX".parse::<ReduceMethod>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for method in [ReduceMethod::Max, ReduceMethod::Mean] {
            assert_eq!(method.to_string().parse::<ReduceMethod>().unwrap(), method);
        }
    }

    #[test]
    fn profile_length_equals_row_count() {
        let image = data(7, 13, |x, y| f64::from(x + y));
        let mask = region(7, 13, |x, y| x == y % 7);
        for method in [ReduceMethod::Max, ReduceMethod::Mean] {
            let profile = line_profile_from_image_and_region(&image, &mask, method);
            assert_eq!(profile.len(), 13);
        }
    }

    #[test]
    fn max_picks_largest_masked_value() {
        let image = data(4, 1, |x, _| f64::from(x) * 10.0);
        let mask = region(4, 1, |x, _| x == 1 || x == 2);
        let profile = line_profile_from_image_and_region(&image, &mask, ReduceMethod::Max);
        assert_eq!(profile, vec![20.0]);
    }

    #[test]
    fn max_ignores_values_outside_region() {
        let image = data(3, 1, |x, _| if x == 0 { 500.0 } else { 5.0 });
        let mask = region(3, 1, |x, _| x == 2);
        let profile = line_profile_from_image_and_region(&image, &mask, ReduceMethod::Max);
        assert_eq!(profile, vec![5.0]);
    }

    #[test]
    fn max_of_untouched_row_is_zero() {
        let image = data(3, 2, |_, _| 80.0);
        let mask = region(3, 2, |_, y| y == 0);
        let profile = line_profile_from_image_and_region(&image, &mask, ReduceMethod::Max);
        assert_eq!(profile, vec![80.0, 0.0]);
    }

    #[test]
    fn mean_divides_by_region_count() {
        let image = data(4, 1, |x, _| f64::from(x + 1));
        let mask = region(4, 1, |x, _| x >= 2);
        let profile = line_profile_from_image_and_region(&image, &mask, ReduceMethod::Mean);
        assert!((profile[0] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn mean_of_untouched_row_is_nan() {
        let image = data(3, 2, |_, _| 80.0);
        let mask = region(3, 2, |_, y| y == 1);
        let profile = line_profile_from_image_and_region(&image, &mask, ReduceMethod::Mean);
        assert!(profile[0].is_nan());
        assert!((profile[1] - 80.0).abs() < 1e-12);
    }

    #[test]
    fn max_and_mean_agree_on_single_pixel_rows() {
        let image = data(6, 9, |x, y| f64::from(x * 7 + y * 3));
        let mask = region(6, 9, |x, y| x == (y * 2) % 6);
        let max = line_profile_from_image_and_region(&image, &mask, ReduceMethod::Max);
        let mean = line_profile_from_image_and_region(&image, &mask, ReduceMethod::Mean);
        assert_eq!(max, mean);
    }

    #[test]
    fn reduce_region_keeps_identifier() {
        let image = data(2, 2, |_, _| 1.0);
        let mask = region(2, 2, |_, _| true);
        let profile = reduce_region(&image, 4, &mask, ReduceMethod::Max);
        assert_eq!(profile.identifier, 4);
        assert_eq!(profile.values, vec![1.0, 1.0]);
    }
}
