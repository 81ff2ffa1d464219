//! Image encoders
//!
//! One encoder per output format behind a small object-safe trait, so the
//! executor can pick one at runtime through [`EncoderFactory`].

use image::codecs::gif::{GifEncoder as ImageGifEncoder, Repeat};
use image::{ColorType, DynamicImage, Frame, ImageEncoder as _, RgbImage};
use std::io::Cursor;

use super::format::OutputFormat;
use crate::error::RenditionError;

/// Default JPEG quality when neither the spec nor the config sets one
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Colour transparent pixels are flattened onto for formats without alpha
pub const DEFAULT_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Per-rendition encoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    pub background: [u8; 3],
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            background: DEFAULT_BACKGROUND,
        }
    }
}

impl EncodeOptions {
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }
}

pub trait ImageEncoder: Send + Sync {
    /// The output format this encoder produces
    fn format(&self) -> OutputFormat;

    fn encode(&self, image: &DynamicImage, options: &EncodeOptions)
        -> Result<Vec<u8>, RenditionError>;
}

pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(
        &self,
        image: &DynamicImage,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, RenditionError> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;

        // JPEG has no alpha channel
        let rgb = if image.color().has_alpha() {
            flatten_alpha(image, options.background).into_rgb8()
        } else {
            image.to_rgb8()
        };

        let mut output = Cursor::new(Vec::new());
        ImageJpegEncoder::new_with_quality(&mut output, options.jpeg_quality)
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| RenditionError::encode_failed("jpeg", e.to_string()))?;

        Ok(output.into_inner())
    }
}

pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(
        &self,
        image: &DynamicImage,
        _options: &EncodeOptions,
    ) -> Result<Vec<u8>, RenditionError> {
        use image::codecs::png::PngEncoder as ImagePngEncoder;

        let mut output = Cursor::new(Vec::new());
        let encoder = ImagePngEncoder::new(&mut output);
        write_rgb_or_rgba(encoder, image).map_err(|e| RenditionError::encode_failed("png", e))?;

        Ok(output.into_inner())
    }
}

/// Lossless WebP (the only WebP encoding the image crate provides)
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(
        &self,
        image: &DynamicImage,
        _options: &EncodeOptions,
    ) -> Result<Vec<u8>, RenditionError> {
        use image::codecs::webp::WebPEncoder as ImageWebPEncoder;

        let mut output = Cursor::new(Vec::new());
        let encoder = ImageWebPEncoder::new_lossless(&mut output);
        write_rgb_or_rgba(encoder, image).map_err(|e| RenditionError::encode_failed("webp", e))?;

        Ok(output.into_inner())
    }
}

/// Single-frame GIF
pub struct GifEncoder;

impl ImageEncoder for GifEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Gif
    }

    fn encode(
        &self,
        image: &DynamicImage,
        _options: &EncodeOptions,
    ) -> Result<Vec<u8>, RenditionError> {
        let mut output = Vec::new();
        {
            let mut encoder = ImageGifEncoder::new(&mut output);
            encoder
                .encode_frame(Frame::new(image.to_rgba8()))
                .map_err(|e| RenditionError::encode_failed("gif", e.to_string()))?;
        }
        Ok(output)
    }
}

pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(format: OutputFormat) -> Box<dyn ImageEncoder> {
        match format {
            OutputFormat::Jpeg => Box::new(JpegEncoder),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::Gif => Box::new(GifEncoder),
            OutputFormat::WebP => Box::new(WebPEncoder),
        }
    }
}

/// Encode every frame into a looping animated GIF
pub fn encode_animated_gif(frames: Vec<Frame>) -> Result<Vec<u8>, RenditionError> {
    let mut output = Vec::new();
    {
        let mut encoder = ImageGifEncoder::new(&mut output);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| RenditionError::encode_failed("gif", e.to_string()))?;
        encoder
            .encode_frames(frames)
            .map_err(|e| RenditionError::encode_failed("gif", e.to_string()))?;
    }
    Ok(output)
}

/// Composite an image over a solid colour, dropping its alpha channel
pub fn flatten_alpha(image: &DynamicImage, background: [u8; 3]) -> DynamicImage {
    let rgba = image.to_rgba8();
    let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |fg: u8, bg: u8| ((fg as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([
            blend(r, background[0]),
            blend(g, background[1]),
            blend(b, background[2]),
        ])
    });
    DynamicImage::ImageRgb8(flattened)
}

fn write_rgb_or_rgba<E: image::ImageEncoder>(
    encoder: E,
    image: &DynamicImage,
) -> Result<(), String> {
    let result = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
    } else {
        let rgb = image.to_rgb8();
        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
    };
    result.map_err(|e| e.to_string())
}
