//! Lanczos3 resampling through fast_image_resize

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::DynamicImage;
use std::num::NonZeroU32;

use crate::error::RenditionError;

const OPERATION: &str = "resize";

/// Resize to exactly `width` x `height`, ignoring aspect ratio
///
/// Images with an alpha channel stay RGBA; everything else comes back RGB.
pub fn resize_exact(
    image: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<DynamicImage, RenditionError> {
    let non_zero = |value: u32, what: &str| {
        NonZeroU32::new(value)
            .ok_or_else(|| RenditionError::transform_failed(OPERATION, format!("{} is 0", what)))
    };
    let src_width = non_zero(image.width(), "source width")?;
    let src_height = non_zero(image.height(), "source height")?;
    let dst_width = non_zero(width, "target width")?;
    let dst_height = non_zero(height, "target height")?;

    let has_alpha = image.color().has_alpha();
    let (pixels, pixel_type) = if has_alpha {
        (image.to_rgba8().into_raw(), PixelType::U8x4)
    } else {
        (image.to_rgb8().into_raw(), PixelType::U8x3)
    };

    let src_image = Image::from_vec_u8(src_width, src_height, pixels, pixel_type).map_err(|e| {
        RenditionError::transform_failed(OPERATION, format!("invalid source buffer: {:?}", e))
    })?;
    let mut dst_image = Image::new(dst_width, dst_height, pixel_type);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| RenditionError::transform_failed(OPERATION, format!("{:?}", e)))?;

    let buffer = dst_image.into_vec();
    let resized = if has_alpha {
        image::RgbaImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgba8)
    } else {
        image::RgbImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgb8)
    };

    resized.ok_or_else(|| {
        RenditionError::transform_failed(OPERATION, "output buffer has the wrong size")
    })
}
