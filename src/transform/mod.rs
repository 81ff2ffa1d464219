//! Image transform executor
//!
//! decode → auto-orient → run filter → pick output format → encode
//!
//! The executor only produces bytes in memory. Writing them anywhere is
//! the rendition service's job.

pub mod encoder;
pub mod format;
pub mod orientation;
pub mod resize;

use bytes::Bytes;
use image::codecs::gif::GifDecoder;
use image::io::Reader as ImageReader;
use image::{AnimationDecoder, DynamicImage, Frame, ImageFormat};
use rayon::prelude::*;
use std::io::{Cursor, Read};

use crate::config::ImageConfig;
use crate::error::RenditionError;
use crate::filters::Filter;
use crate::rendition::SourceImage;
use crate::storage::{with_reader, Storage};

pub use encoder::{EncodeOptions, EncoderFactory, ImageEncoder, DEFAULT_JPEG_QUALITY};
pub use format::{select_output_format, OutputFormat};
pub use orientation::{apply_orientation, read_orientation, Orientation};

/// Default ceiling on rendition size, 100 megapixels
pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 100_000_000;

/// Per-run state that operations may read and adjust
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformEnv {
    /// Format the source was decoded from
    pub original_format: ImageFormat,
    /// Set by `format-*`
    pub output_format: Option<OutputFormat>,
    /// Set by `jpegquality-*`
    pub jpeg_quality: Option<u8>,
    /// Set by `bgcolor-*`
    pub background: Option<[u8; 3]>,
    /// Largest width x height an operation may resize to
    pub max_output_pixels: u64,
}

impl TransformEnv {
    pub fn new(original_format: ImageFormat) -> Self {
        Self {
            original_format,
            output_format: None,
            jpeg_quality: None,
            background: None,
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
        }
    }

    pub fn with_max_output_pixels(mut self, max_output_pixels: u64) -> Self {
        self.max_output_pixels = max_output_pixels;
        self
    }

    /// Reject a resize target above the pixel ceiling
    pub fn check_output_size(
        &self,
        operation: &str,
        width: u32,
        height: u32,
    ) -> Result<(), RenditionError> {
        let pixels = width as u64 * height as u64;
        if pixels > self.max_output_pixels {
            return Err(RenditionError::transform_failed(
                operation,
                format!(
                    "output {}x{} ({} pixels) exceeds the limit of {} pixels",
                    width, height, pixels, self.max_output_pixels
                ),
            ));
        }
        Ok(())
    }
}

/// An encoded rendition, not yet stored anywhere
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub data: Bytes,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Executor {
    jpeg_quality: u8,
    max_output_pixels: u64,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
        }
    }
}

impl Executor {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            max_output_pixels: config.max_output_pixels,
        }
    }

    fn env(&self, original_format: ImageFormat) -> TransformEnv {
        TransformEnv::new(original_format).with_max_output_pixels(self.max_output_pixels)
    }

    /// Default JPEG quality when the spec does not set one
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Read the source file from `storage` and run `filter` over it
    pub fn run(
        &self,
        filter: &Filter,
        source: &SourceImage,
        storage: &dyn Storage,
    ) -> Result<GeneratedImage, RenditionError> {
        let data = with_reader(storage, &source.file, |reader| {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
        .map_err(|e| RenditionError::source_unavailable(format!("{}: {}", source.file, e)))?;

        self.run_on_bytes(filter, source, &data)
    }

    /// Run `filter` over already loaded source bytes
    pub fn run_on_bytes(
        &self,
        filter: &Filter,
        source: &SourceImage,
        data: &[u8],
    ) -> Result<GeneratedImage, RenditionError> {
        let original_format = image::guess_format(data).map_err(|e| {
            RenditionError::source_unavailable(format!("{}: {}", source.file, e))
        })?;

        if original_format == ImageFormat::Gif {
            let frames = decode_gif_frames(data)
                .map_err(|e| RenditionError::source_unavailable(format!("{}: {}", source.file, e)))?;
            if frames.len() > 1 {
                return self.run_animated(filter, source, frames);
            }
        }

        let image = image::load_from_memory_with_format(data, original_format)
            .map_err(|e| RenditionError::source_unavailable(format!("{}: {}", source.file, e)))?;
        let image = apply_orientation(image, read_orientation(data));

        let mut env = self.env(original_format);
        let image = filter.run(image, source, &mut env)?;
        let format = select_output_format(original_format, env.output_format, false);

        tracing::debug!(
            spec = %filter.spec(),
            source_format = ?original_format,
            output_format = %format,
            width = image.width(),
            height = image.height(),
            "Transformed image"
        );

        self.encode(&image, format, &env)
    }

    fn run_animated(
        &self,
        filter: &Filter,
        source: &SourceImage,
        frames: Vec<Frame>,
    ) -> Result<GeneratedImage, RenditionError> {
        let frame_count = frames.len();
        let mut frames = frames.into_iter();
        let Some(first) = frames.next() else {
            return Err(RenditionError::source_unavailable(format!(
                "{}: animation has no frames",
                source.file
            )));
        };

        // The first frame decides the output format and encoder settings
        let mut env = self.env(ImageFormat::Gif);
        let first_delay = first.delay();
        let first_image = filter.run(
            DynamicImage::ImageRgba8(first.into_buffer()),
            source,
            &mut env,
        )?;
        let format = select_output_format(ImageFormat::Gif, env.output_format, true);

        if format != OutputFormat::Gif {
            return self.encode(&first_image, format, &env);
        }

        let rest: Vec<Frame> = frames.collect();
        let transformed = rest
            .into_par_iter()
            .map(|frame| {
                let delay = frame.delay();
                let mut frame_env = self.env(ImageFormat::Gif);
                let image = filter.run(
                    DynamicImage::ImageRgba8(frame.into_buffer()),
                    source,
                    &mut frame_env,
                )?;
                Ok(Frame::from_parts(image.into_rgba8(), 0, 0, delay))
            })
            .collect::<Result<Vec<Frame>, RenditionError>>()?;

        let (width, height) = (first_image.width(), first_image.height());
        let mut output = Vec::with_capacity(frame_count);
        output.push(Frame::from_parts(first_image.into_rgba8(), 0, 0, first_delay));
        output.extend(transformed);

        tracing::debug!(
            spec = %filter.spec(),
            frames = frame_count,
            width,
            height,
            "Transformed animated gif"
        );

        let data = encoder::encode_animated_gif(output)?;
        Ok(GeneratedImage {
            data: Bytes::from(data),
            format: OutputFormat::Gif,
            width,
            height,
        })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        env: &TransformEnv,
    ) -> Result<GeneratedImage, RenditionError> {
        let mut options = EncodeOptions::default()
            .with_jpeg_quality(env.jpeg_quality.unwrap_or(self.jpeg_quality));
        if let Some(background) = env.background {
            options = options.with_background(background);
        }

        let data = EncoderFactory::create(format).encode(image, &options)?;
        Ok(GeneratedImage {
            data: Bytes::from(data),
            format,
            width: image.width(),
            height: image.height(),
        })
    }
}

fn decode_gif_frames(data: &[u8]) -> Result<Vec<Frame>, image::ImageError> {
    GifDecoder::new(Cursor::new(data))?
        .into_frames()
        .collect_frames()
}

/// Upright width and height of encoded image bytes, without a full decode
pub fn probe_dimensions(data: &[u8]) -> Result<(u32, u32), RenditionError> {
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| RenditionError::source_unavailable(e.to_string()))?
        .into_dimensions()
        .map_err(|e| RenditionError::source_unavailable(e.to_string()))?;

    if read_orientation(data).swaps_dimensions() {
        Ok((height, width))
    } else {
        Ok((width, height))
    }
}
