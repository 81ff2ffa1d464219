//! Image operations
//!
//! The baseline operations are a closed enum dispatched by `match`.
//! Operations registered at runtime live behind the `ExternalOperation`
//! trait and are carried in `Operation::External`.

use image::DynamicImage;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::rect::Rect;
use crate::error::RenditionError;
use crate::rendition::{SourceImage, VaryField};
use crate::transform::encoder::flatten_alpha;
use crate::transform::format::OutputFormat;
use crate::transform::resize::resize_exact;
use crate::transform::TransformEnv;

/// Vary fields of focal-point aware operations, in cache-key order
pub const FOCAL_POINT_FIELDS: [VaryField; 4] = [
    VaryField::FocalPointX,
    VaryField::FocalPointY,
    VaryField::FocalPointWidth,
    VaryField::FocalPointHeight,
];

/// Names of the operations every registry starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinOperation {
    Original,
    Width,
    Height,
    Max,
    Min,
    Fill,
    Crop,
    ForceWidth,
    ForceHeight,
    ForceFit,
    Scale,
    Format,
    JpegQuality,
    BackgroundColor,
}

impl BuiltinOperation {
    pub const ALL: [BuiltinOperation; 14] = [
        BuiltinOperation::Original,
        BuiltinOperation::Width,
        BuiltinOperation::Height,
        BuiltinOperation::Max,
        BuiltinOperation::Min,
        BuiltinOperation::Fill,
        BuiltinOperation::Crop,
        BuiltinOperation::ForceWidth,
        BuiltinOperation::ForceHeight,
        BuiltinOperation::ForceFit,
        BuiltinOperation::Scale,
        BuiltinOperation::Format,
        BuiltinOperation::JpegQuality,
        BuiltinOperation::BackgroundColor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Width => "width",
            Self::Height => "height",
            Self::Max => "max",
            Self::Min => "min",
            Self::Fill => "fill",
            Self::Crop => "crop",
            Self::ForceWidth => "forcewidth",
            Self::ForceHeight => "forceheight",
            Self::ForceFit => "forcefit",
            Self::Scale => "scale",
            Self::Format => "format",
            Self::JpegQuality => "jpegquality",
            Self::BackgroundColor => "bgcolor",
        }
    }
}

/// An operation contributed from outside the crate
///
/// Implementations must be pure functions of their arguments, the decoded
/// image and the source-image fields they list in `vary_fields`.
pub trait ExternalOperation: Send + Sync + fmt::Debug {
    /// The registered name
    fn name(&self) -> &str;

    /// Arguments in canonical form, used to rebuild the spec stage
    fn canonical_args(&self) -> Vec<String>;

    /// Source-image attributes the output depends on
    fn vary_fields(&self) -> &[VaryField] {
        &[]
    }

    fn run(
        &self,
        image: DynamicImage,
        source: &SourceImage,
        env: &mut TransformEnv,
    ) -> Result<DynamicImage, RenditionError>;
}

/// Absolute crop box in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// A parsed, runnable operation
#[derive(Debug, Clone)]
pub enum Operation {
    Original,
    Width(u32),
    Height(u32),
    Max { width: u32, height: u32 },
    Min { width: u32, height: u32 },
    Fill {
        width: u32,
        height: u32,
        /// Percentage (0-100) to zoom from the widest crop toward the focal point
        crop_closeness: u32,
    },
    Crop(CropBox),
    ForceWidth(u32),
    ForceHeight(u32),
    ForceFit { width: u32, height: u32 },
    Scale(u32),
    Format(OutputFormat),
    JpegQuality(u8),
    BackgroundColor([u8; 3]),
    External(Arc<dyn ExternalOperation>),
}

impl Operation {
    /// Build a builtin operation from its raw spec arguments
    ///
    /// `stage` is only used for error messages.
    pub fn parse(
        kind: BuiltinOperation,
        args: &[&str],
        stage: &str,
    ) -> Result<Self, RenditionError> {
        let invalid = |reason: String| RenditionError::invalid_spec(stage, reason);

        match kind {
            BuiltinOperation::Original => {
                expect_args(kind, args, 0, 0).map_err(invalid)?;
                Ok(Operation::Original)
            }
            BuiltinOperation::Width => Ok(Operation::Width(single_size(kind, args).map_err(invalid)?)),
            BuiltinOperation::Height => Ok(Operation::Height(single_size(kind, args).map_err(invalid)?)),
            BuiltinOperation::ForceWidth => {
                Ok(Operation::ForceWidth(single_size(kind, args).map_err(invalid)?))
            }
            BuiltinOperation::ForceHeight => {
                Ok(Operation::ForceHeight(single_size(kind, args).map_err(invalid)?))
            }
            BuiltinOperation::Max => {
                let (width, height) = single_box(kind, args).map_err(invalid)?;
                Ok(Operation::Max { width, height })
            }
            BuiltinOperation::Min => {
                let (width, height) = single_box(kind, args).map_err(invalid)?;
                Ok(Operation::Min { width, height })
            }
            BuiltinOperation::ForceFit => {
                let (width, height) = single_box(kind, args).map_err(invalid)?;
                Ok(Operation::ForceFit { width, height })
            }
            BuiltinOperation::Fill => {
                expect_args(kind, args, 1, 2).map_err(invalid)?;
                let (width, height) = parse_box(args[0]).map_err(invalid)?;
                let crop_closeness = match args.get(1) {
                    Some(arg) => parse_closeness(arg).map_err(invalid)?,
                    None => 0,
                };
                Ok(Operation::Fill {
                    width,
                    height,
                    crop_closeness,
                })
            }
            BuiltinOperation::Crop => {
                expect_args(kind, args, 1, 1).map_err(invalid)?;
                Ok(Operation::Crop(parse_crop_box(args[0]).map_err(invalid)?))
            }
            BuiltinOperation::Scale => {
                let percent = single_size(kind, args).map_err(invalid)?;
                Ok(Operation::Scale(percent))
            }
            BuiltinOperation::Format => {
                expect_args(kind, args, 1, 1).map_err(invalid)?;
                let format = OutputFormat::from_str(args[0]).map_err(invalid)?;
                Ok(Operation::Format(format))
            }
            BuiltinOperation::JpegQuality => {
                expect_args(kind, args, 1, 1).map_err(invalid)?;
                let quality: u8 = args[0]
                    .parse()
                    .map_err(|_| invalid("quality must be a number from 1 to 100".to_string()))?;
                if !(1..=100).contains(&quality) {
                    return Err(invalid("quality must be a number from 1 to 100".to_string()));
                }
                Ok(Operation::JpegQuality(quality))
            }
            BuiltinOperation::BackgroundColor => {
                expect_args(kind, args, 1, 1).map_err(invalid)?;
                Ok(Operation::BackgroundColor(parse_color(args[0]).map_err(invalid)?))
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Operation::Original => BuiltinOperation::Original.name(),
            Operation::Width(_) => BuiltinOperation::Width.name(),
            Operation::Height(_) => BuiltinOperation::Height.name(),
            Operation::Max { .. } => BuiltinOperation::Max.name(),
            Operation::Min { .. } => BuiltinOperation::Min.name(),
            Operation::Fill { .. } => BuiltinOperation::Fill.name(),
            Operation::Crop(_) => BuiltinOperation::Crop.name(),
            Operation::ForceWidth(_) => BuiltinOperation::ForceWidth.name(),
            Operation::ForceHeight(_) => BuiltinOperation::ForceHeight.name(),
            Operation::ForceFit { .. } => BuiltinOperation::ForceFit.name(),
            Operation::Scale(_) => BuiltinOperation::Scale.name(),
            Operation::Format(_) => BuiltinOperation::Format.name(),
            Operation::JpegQuality(_) => BuiltinOperation::JpegQuality.name(),
            Operation::BackgroundColor(_) => BuiltinOperation::BackgroundColor.name(),
            Operation::External(op) => op.name(),
        }
    }

    /// The spec stage this operation serializes to
    ///
    /// Two stages that parse to the same operation have the same canonical
    /// form, so cache keys do not depend on argument formatting.
    pub fn canonical(&self) -> String {
        let name = self.name();
        match self {
            Operation::Original => name.to_string(),
            Operation::Width(n)
            | Operation::Height(n)
            | Operation::ForceWidth(n)
            | Operation::ForceHeight(n)
            | Operation::Scale(n) => format!("{}-{}", name, n),
            Operation::Max { width, height }
            | Operation::Min { width, height }
            | Operation::ForceFit { width, height } => format!("{}-{}x{}", name, width, height),
            Operation::Fill {
                width,
                height,
                crop_closeness,
            } => {
                if *crop_closeness == 0 {
                    format!("{}-{}x{}", name, width, height)
                } else {
                    format!("{}-{}x{}-c{}", name, width, height, crop_closeness)
                }
            }
            Operation::Crop(b) => {
                format!("{}-{},{}:{},{}", name, b.left, b.top, b.right, b.bottom)
            }
            Operation::Format(format) => format!("{}-{}", name, format.as_str()),
            Operation::JpegQuality(quality) => format!("{}-{}", name, quality),
            Operation::BackgroundColor([r, g, b]) => {
                format!("{}-{:02x}{:02x}{:02x}", name, r, g, b)
            }
            Operation::External(op) => {
                let mut stage = name.to_string();
                for arg in op.canonical_args() {
                    stage.push('-');
                    stage.push_str(&arg);
                }
                stage
            }
        }
    }

    /// Source-image attributes this operation's output depends on
    pub fn vary_fields(&self) -> &[VaryField] {
        match self {
            Operation::Fill { .. } => &FOCAL_POINT_FIELDS,
            Operation::External(op) => op.vary_fields(),
            _ => &[],
        }
    }

    /// Apply this operation to `image`
    pub fn run(
        &self,
        image: DynamicImage,
        source: &SourceImage,
        env: &mut TransformEnv,
    ) -> Result<DynamicImage, RenditionError> {
        let (image_width, image_height) = (image.width(), image.height());

        match self {
            Operation::Original => Ok(image),

            Operation::Width(size) => {
                if image_width <= *size {
                    return Ok(image);
                }
                let scale = *size as f64 / image_width as f64;
                let height = scaled(image_height, scale);
                resize_exact(&image, *size, height)
            }

            Operation::Height(size) => {
                if image_height <= *size {
                    return Ok(image);
                }
                let scale = *size as f64 / image_height as f64;
                let width = scaled(image_width, scale);
                resize_exact(&image, width, *size)
            }

            Operation::Max { width, height } => {
                if image_width <= *width && image_height <= *height {
                    return Ok(image);
                }
                let horz_scale = *width as f64 / image_width as f64;
                let vert_scale = *height as f64 / image_height as f64;
                let (w, h) = if horz_scale < vert_scale {
                    (*width, scaled(image_height, horz_scale))
                } else {
                    (scaled(image_width, vert_scale), *height)
                };
                resize_exact(&image, w.max(1), h.max(1))
            }

            Operation::Min { width, height } => {
                if image_width <= *width || image_height <= *height {
                    return Ok(image);
                }
                let horz_scale = *width as f64 / image_width as f64;
                let vert_scale = *height as f64 / image_height as f64;
                let (w, h) = if horz_scale > vert_scale {
                    (*width, scaled(image_height, horz_scale))
                } else {
                    (scaled(image_width, vert_scale), *height)
                };
                resize_exact(&image, w.max(1), h.max(1))
            }

            Operation::Fill {
                width,
                height,
                crop_closeness,
            } => fill(image, source, *width, *height, *crop_closeness),

            Operation::Crop(crop_box) => crop_to_box(
                image,
                crop_box.left as f64,
                crop_box.top as f64,
                crop_box.right as f64,
                crop_box.bottom as f64,
            ),

            Operation::ForceWidth(size) => {
                resize_if_changed(self.name(), image, *size, image_height, env)
            }
            Operation::ForceHeight(size) => {
                resize_if_changed(self.name(), image, image_width, *size, env)
            }
            Operation::ForceFit { width, height } => {
                resize_if_changed(self.name(), image, *width, *height, env)
            }

            Operation::Scale(percent) => {
                let scale = *percent as f64 / 100.0;
                let w = scaled(image_width, scale);
                let h = scaled(image_height, scale);
                resize_if_changed(self.name(), image, w, h, env)
            }

            Operation::Format(format) => {
                env.output_format = Some(*format);
                Ok(image)
            }

            Operation::JpegQuality(quality) => {
                env.jpeg_quality = Some(*quality);
                Ok(image)
            }

            Operation::BackgroundColor(color) => {
                env.background = Some(*color);
                if image.color().has_alpha() {
                    Ok(flatten_alpha(&image, *color))
                } else {
                    Ok(image)
                }
            }

            Operation::External(op) => op.run(image, source, env),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Scale a dimension, truncating, never below one pixel
fn scaled(dimension: u32, scale: f64) -> u32 {
    (dimension as f64 * scale).clamp(1.0, u32::MAX as f64) as u32
}

/// Resize that may upscale, so it is held to the pixel ceiling
fn resize_if_changed(
    operation: &str,
    image: DynamicImage,
    width: u32,
    height: u32,
    env: &TransformEnv,
) -> Result<DynamicImage, RenditionError> {
    if width == image.width() && height == image.height() {
        return Ok(image);
    }
    env.check_output_size(operation, width, height)?;
    resize_exact(&image, width, height)
}

/// Crop to a box, clamping it to the image bounds first
///
/// A box that covers the whole image returns the image untouched.
fn crop_to_box(
    image: DynamicImage,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
) -> Result<DynamicImage, RenditionError> {
    let (image_width, image_height) = (image.width() as f64, image.height() as f64);

    let left = left.clamp(0.0, image_width) as u32;
    let top = top.clamp(0.0, image_height) as u32;
    let right = right.clamp(0.0, image_width) as u32;
    let bottom = bottom.clamp(0.0, image_height) as u32;

    if left >= right || top >= bottom {
        return Err(RenditionError::transform_failed(
            BuiltinOperation::Crop.name(),
            format!(
                "crop box {},{}:{},{} lies outside the {}x{} image",
                left,
                top,
                right,
                bottom,
                image.width(),
                image.height()
            ),
        ));
    }

    if left == 0 && top == 0 && right == image.width() && bottom == image.height() {
        return Ok(image);
    }

    Ok(image.crop_imm(left, top, right - left, bottom - top))
}

/// Crop toward the focal point to the target aspect ratio, then downscale
fn fill(
    image: DynamicImage,
    source: &SourceImage,
    width: u32,
    height: u32,
    crop_closeness: u32,
) -> Result<DynamicImage, RenditionError> {
    let image_width = image.width() as f64;
    let image_height = image.height() as f64;
    let target_width = width as f64;
    let target_height = height as f64;
    let focal_point = source.focal_point_rect();

    let crop_aspect_ratio = target_width / target_height;

    // Largest crop of the right aspect ratio that fits the image
    let crop_max_scale = image_width.min(image_height * crop_aspect_ratio);
    let crop_max_width = crop_max_scale;
    let crop_max_height = crop_max_scale / crop_aspect_ratio;

    let mut crop_width = crop_max_width;
    let mut crop_height = crop_max_height;

    if let Some(focal) = &focal_point {
        // Smallest crop of the right aspect ratio that still holds the focal point
        let crop_min_scale = focal.width().max(focal.height() * crop_aspect_ratio);
        let crop_min_width = crop_min_scale;
        let crop_min_height = crop_min_scale / crop_aspect_ratio;

        // The focal point may be larger than the image
        if crop_min_scale < crop_max_scale {
            // Zooming past this would mean upscaling
            let max_crop_closeness = f64::max(
                1.0 - (target_width - crop_min_width) / (crop_max_width - crop_min_width),
                1.0 - (target_height - crop_min_height) / (crop_max_height - crop_min_height),
            );
            let closeness = (crop_closeness as f64 / 100.0).min(max_crop_closeness);

            if (0.0..=1.0).contains(&closeness) {
                crop_width = crop_max_width + (crop_min_width - crop_max_width) * closeness;
                crop_height = crop_max_height + (crop_min_height - crop_max_height) * closeness;
            }
        }
    }

    // Extreme aspect ratios can shrink one side below a pixel
    let crop_width = crop_width.max(1.0);
    let crop_height = crop_height.max(1.0);

    let (fp_x, fp_y) = match &focal_point {
        Some(focal) => focal.centroid(),
        None => (image_width / 2.0, image_height / 2.0),
    };
    let fp_u = fp_x / image_width;
    let fp_v = fp_y / image_height;

    let crop_x = fp_x - (fp_u - 0.5) * crop_width;
    let crop_y = fp_y - (fp_v - 0.5) * crop_height;

    let mut rect = Rect::from_point(crop_x, crop_y, crop_width, crop_height);
    if let Some(focal) = &focal_point {
        rect = rect.move_to_cover(focal);
    }
    let rect = rect
        .move_to_clamp(&Rect::of_size(image.width(), image.height()))
        .round();

    let cropped = crop_to_box(image, rect.left, rect.top, rect.right, rect.bottom)?;

    let horz_scale = target_width / cropped.width() as f64;
    let vert_scale = target_height / cropped.height() as f64;
    if horz_scale.min(vert_scale) < 1.0 {
        resize_exact(&cropped, width, height)
    } else {
        Ok(cropped)
    }
}

fn expect_args(
    kind: BuiltinOperation,
    args: &[&str],
    min: usize,
    max: usize,
) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(format!(
            "{} takes {} argument(s), got {}",
            kind.name(),
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn single_size(kind: BuiltinOperation, args: &[&str]) -> Result<u32, String> {
    expect_args(kind, args, 1, 1)?;
    parse_positive(args[0])
}

fn single_box(kind: BuiltinOperation, args: &[&str]) -> Result<(u32, u32), String> {
    expect_args(kind, args, 1, 1)?;
    parse_box(args[0])
}

fn parse_positive(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{}' is not a positive integer", value)),
    }
}

/// Parse `WxH`
fn parse_box(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| format!("'{}' is not a WIDTHxHEIGHT size", value))?;
    Ok((parse_positive(width)?, parse_positive(height)?))
}

/// Parse `cNN` where NN is 0-100
fn parse_closeness(value: &str) -> Result<u32, String> {
    let percent = value
        .strip_prefix('c')
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| format!("'{}' is not a crop closeness (expected cNN)", value))?;
    if percent > 100 {
        return Err(format!("crop closeness {} exceeds 100", percent));
    }
    Ok(percent)
}

/// Parse `L,T:R,B`
fn parse_crop_box(value: &str) -> Result<CropBox, String> {
    let malformed = || format!("'{}' is not a LEFT,TOP:RIGHT,BOTTOM crop box", value);

    let (top_left, bottom_right) = value.split_once(':').ok_or_else(malformed)?;
    let (left, top) = top_left.split_once(',').ok_or_else(malformed)?;
    let (right, bottom) = bottom_right.split_once(',').ok_or_else(malformed)?;

    let coord = |s: &str| s.parse::<u32>().map_err(|_| malformed());
    let crop_box = CropBox {
        left: coord(left)?,
        top: coord(top)?,
        right: coord(right)?,
        bottom: coord(bottom)?,
    };

    if crop_box.left >= crop_box.right || crop_box.top >= crop_box.bottom {
        return Err(format!("crop box '{}' has no area", value));
    }
    Ok(crop_box)
}

/// Parse `rgb` or `rrggbb` hex
fn parse_color(value: &str) -> Result<[u8; 3], String> {
    let invalid = || format!("'{}' is not a hex colour", value);
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let expanded: String = match value.len() {
        3 => value.chars().flat_map(|c| [c, c]).collect(),
        6 => value.to_string(),
        _ => return Err(invalid()),
    };

    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}
