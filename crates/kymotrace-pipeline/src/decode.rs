//! Image decoding and data-plane extraction.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, TIFF) and produces either a
//! [`DynamicImage`] (for the annotation image, whose channel handling
//! lives in [`crate::signal`]) or a single-channel [`IntensityImage`]
//! (for the kymograph).

use image::{DynamicImage, ImageBuffer, Luma, Pixel};

use crate::types::{Dimensions, IntensityImage, PipelineError};

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Dimensions of a decoded image.
#[must_use]
pub fn dimensions_of(image: &DynamicImage) -> Dimensions {
    Dimensions {
        width: image.width(),
        height: image.height(),
    }
}

/// Extract one channel of the data image as `f64` intensities.
///
/// Single-channel images (with or without alpha) always contribute their
/// luma channel. Color images contribute `channel` (0 = red). Values are
/// widened, never rescaled, so 8-bit and 16-bit data keep their native
/// ranges.
///
/// # Errors
///
/// Returns [`PipelineError::UnsupportedPixelFormat`] for pixel layouts
/// the `image` crate adds in future versions.
pub fn to_intensity(image: &DynamicImage, channel: u8) -> Result<IntensityImage, PipelineError> {
    let channel = usize::from(channel);
    let plane = match image {
        DynamicImage::ImageLuma8(img) => channel_plane(img, 0),
        DynamicImage::ImageLumaA8(img) => channel_plane(img, 0),
        DynamicImage::ImageLuma16(img) => channel_plane(img, 0),
        DynamicImage::ImageLumaA16(img) => channel_plane(img, 0),
        DynamicImage::ImageRgb8(img) => channel_plane(img, channel),
        DynamicImage::ImageRgba8(img) => channel_plane(img, channel),
        DynamicImage::ImageRgb16(img) => channel_plane(img, channel),
        DynamicImage::ImageRgba16(img) => channel_plane(img, channel),
        DynamicImage::ImageRgb32F(img) => channel_plane(img, channel),
        DynamicImage::ImageRgba32F(img) => channel_plane(img, channel),
        other => {
            return Err(PipelineError::UnsupportedPixelFormat(format!(
                "{:?}",
                other.color()
            )));
        }
    };
    Ok(plane)
}

fn channel_plane<P>(image: &ImageBuffer<P, Vec<P::Subpixel>>, channel: usize) -> IntensityImage
where
    P: Pixel,
    P::Subpixel: Into<f64>,
{
    IntensityImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y).channels()[channel].into()])
    })
}

/// Swap rows and columns.
#[must_use = "returns the transposed image"]
pub fn transpose<P>(image: &ImageBuffer<P, Vec<P::Subpixel>>) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
{
    ImageBuffer::from_fn(image.height(), image.width(), |x, y| *image.get_pixel(y, x))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &DynamicImage) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn png_round_trip_keeps_dimensions() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::new(7, 3));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(
            dimensions_of(&decoded),
            Dimensions {
                width: 7,
                height: 3
            }
        );
    }

    #[test]
    fn luma8_values_are_widened_without_scaling() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, Luma([100])));
        let plane = to_intensity(&img, 0).unwrap();
        assert!(plane.pixels().all(|p| (p.0[0] - 100.0).abs() < f64::EPSILON));
    }

    #[test]
    fn luma16_values_keep_native_range() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(3, 1, Luma([4000]));
        let plane = to_intensity(&DynamicImage::ImageLuma16(img), 0).unwrap();
        assert!((plane.get_pixel(2, 0).0[0] - 4000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn luma_image_ignores_channel_selector() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(1, 1, Luma([42])));
        let plane = to_intensity(&img, 2).unwrap();
        assert!((plane.get_pixel(0, 0).0[0] - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rgb_image_uses_selected_channel() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            1,
            1,
            image::Rgb([10, 20, 30]),
        ));
        assert!((to_intensity(&img, 0).unwrap().get_pixel(0, 0).0[0] - 10.0).abs() < 1e-9);
        assert!((to_intensity(&img, 1).unwrap().get_pixel(0, 0).0[0] - 20.0).abs() < 1e-9);
        assert!((to_intensity(&img, 2).unwrap().get_pixel(0, 0).0[0] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn transpose_swaps_axes() {
        let img = image::GrayImage::from_fn(3, 2, |x, y| Luma([u8::try_from(x + 10 * y).unwrap()]));
        let t = transpose(&img);
        assert_eq!(t.dimensions(), (2, 3));
        assert_eq!(t.get_pixel(1, 2).0[0], 21);
        assert_eq!(transpose(&t), img);
    }
}
