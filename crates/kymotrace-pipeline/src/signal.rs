//! Annotation image to binary line signal.
//!
//! Lines are drawn dark on a light background. One channel is taken as a
//! grayscale proxy, inverted, and every pixel that is not at the
//! channel's full-scale value becomes foreground.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Primitive};

use crate::types::FOREGROUND;

/// Take the designated channel of the annotation image as 8-bit grayscale.
///
/// Single-channel images replicate their luma into every channel, so the
/// selector has no effect on them. 16-bit images are reduced to 8-bit.
#[must_use = "returns the single-channel annotation image"]
pub fn convert_to_grayscale(line_image: &DynamicImage, channel: u8) -> GrayImage {
    let rgb = line_image.to_rgb8();
    let channel = usize::from(channel.min(2));
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        Luma([rgb.get_pixel(x, y).0[channel]])
    })
}

/// Convert an annotation image into a binary mask where [`FOREGROUND`]
/// marks line pixels.
///
/// A pixel is foreground when its designated channel is below the
/// channel's maximum, compared at the image's native bit depth. For
/// 8-bit images this is `255 - value > 0`.
#[must_use = "returns the binary line signal"]
pub fn convert_to_signal(line_image: &DynamicImage, channel: u8) -> GrayImage {
    let selected = usize::from(channel.min(2));
    match line_image {
        DynamicImage::ImageLuma8(img) => below_full_scale(img, 0),
        DynamicImage::ImageLumaA8(img) => below_full_scale(img, 0),
        DynamicImage::ImageLuma16(img) => below_full_scale(img, 0),
        DynamicImage::ImageLumaA16(img) => below_full_scale(img, 0),
        DynamicImage::ImageRgb8(img) => below_full_scale(img, selected),
        DynamicImage::ImageRgba8(img) => below_full_scale(img, selected),
        DynamicImage::ImageRgb16(img) => below_full_scale(img, selected),
        DynamicImage::ImageRgba16(img) => below_full_scale(img, selected),
        DynamicImage::ImageRgb32F(img) => below_full_scale(img, selected),
        DynamicImage::ImageRgba32F(img) => below_full_scale(img, selected),
        other => threshold_inverted(&convert_to_grayscale(other, channel)),
    }
}

fn below_full_scale<P>(image: &ImageBuffer<P, Vec<P::Subpixel>>, channel: usize) -> GrayImage
where
    P: Pixel,
{
    let full_scale = <P::Subpixel as Primitive>::DEFAULT_MAX_VALUE;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = image.get_pixel(x, y).channels()[channel];
        Luma([if value < full_scale { FOREGROUND } else { 0 }])
    })
}

/// Invert a grayscale image and keep strictly positive values.
#[must_use = "returns the binary line signal"]
pub fn threshold_inverted(gray: &GrayImage) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let inverted = u8::MAX - gray.get_pixel(x, y).0[0];
        Luma([if inverted > 0 { FOREGROUND } else { 0 }])
    })
}
