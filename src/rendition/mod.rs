//! Source images, renditions and the rendition cache

pub mod naming;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::filters::Rect;

pub use naming::{output_filename, rendition_path, DEFAULT_MAX_FILENAME_LENGTH};
pub use service::RenditionService;

/// File name recorded on placeholder renditions
pub const PLACEHOLDER_FILE: &str = "source-image-not-found";

/// Region of interest: centre point plus size, in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FocalPoint {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FocalPoint {
    pub fn rect(&self) -> Rect {
        Rect::from_point(
            self.x as f64,
            self.y as f64,
            self.width as f64,
            self.height as f64,
        )
    }
}

impl FromStr for FocalPoint {
    type Err = String;

    /// Parse `x,y,width,height`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<u32> = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| format!("invalid focal point '{}': expected x,y,width,height", s))?;

        match values.as_slice() {
            [x, y, width, height] => Ok(Self {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            }),
            _ => Err(format!(
                "invalid focal point '{}': expected x,y,width,height",
                s
            )),
        }
    }
}

/// Source-image attributes an operation's output can depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaryField {
    FocalPointX,
    FocalPointY,
    FocalPointWidth,
    FocalPointHeight,
}

/// An uploaded original
///
/// The stored file never changes once uploaded. Dimensions are those of
/// the upright image, so focal points use the same coordinates that
/// operations see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImage {
    pub id: u64,
    /// Storage name of the original file
    pub file: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub focal_point: Option<FocalPoint>,
}

impl SourceImage {
    pub fn new(id: u64, file: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            file: file.into(),
            width,
            height,
            focal_point: None,
        }
    }

    pub fn with_focal_point(mut self, focal_point: FocalPoint) -> Self {
        self.focal_point = Some(focal_point);
        self
    }

    /// Set the focal point from a rect, or clear it with `None`
    pub fn set_focal_point(&mut self, rect: Option<Rect>) {
        self.focal_point = rect.map(|rect| {
            let (x, y) = rect.centroid();
            FocalPoint {
                x: x.round().max(0.0) as u32,
                y: y.round().max(0.0) as u32,
                width: rect.width().round().max(0.0) as u32,
                height: rect.height().round().max(0.0) as u32,
            }
        });
    }

    pub fn has_focal_point(&self) -> bool {
        self.focal_point.is_some()
    }

    pub fn focal_point_rect(&self) -> Option<Rect> {
        self.focal_point.as_ref().map(FocalPoint::rect)
    }

    /// The whole image
    pub fn rect(&self) -> Rect {
        Rect::of_size(self.width, self.height)
    }

    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }

    pub fn is_landscape(&self) -> bool {
        self.height < self.width
    }

    /// Basename of the stored file
    pub fn filename(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }

    /// String form of a vary field, `None` when it is unset
    pub fn vary_value(&self, field: VaryField) -> Option<String> {
        let focal_point = self.focal_point.as_ref()?;
        let value = match field {
            VaryField::FocalPointX => focal_point.x,
            VaryField::FocalPointY => focal_point.y,
            VaryField::FocalPointWidth => focal_point.width,
            VaryField::FocalPointHeight => focal_point.height,
        };
        Some(value.to_string())
    }
}

/// Identity of a rendition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenditionKey {
    pub image_id: u64,
    pub filter_spec: String,
    pub vary_key: String,
}

impl RenditionKey {
    pub fn new(image_id: u64, filter_spec: impl Into<String>, vary_key: impl Into<String>) -> Self {
        Self {
            image_id,
            filter_spec: filter_spec.into(),
            vary_key: vary_key.into(),
        }
    }
}

impl fmt::Display for RenditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vary_key.is_empty() {
            write!(f, "{}:{}", self.image_id, self.filter_spec)
        } else {
            write!(f, "{}:{}:{}", self.image_id, self.filter_spec, self.vary_key)
        }
    }
}

/// A stored derivative of a source image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub image_id: u64,
    pub filter_spec: String,
    #[serde(default)]
    pub vary_key: String,
    /// Storage name of the rendition file
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

impl Rendition {
    pub fn new(key: RenditionKey, file: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            image_id: key.image_id,
            filter_spec: key.filter_spec,
            vary_key: key.vary_key,
            file: file.into(),
            width,
            height,
            created_at: Utc::now(),
        }
    }

    /// Zero-sized stand-in for a rendition whose source could not be read
    pub fn placeholder(key: RenditionKey) -> Self {
        Self::new(key, PLACEHOLDER_FILE, 0, 0)
    }

    pub fn is_placeholder(&self) -> bool {
        self.file == PLACEHOLDER_FILE && self.width == 0 && self.height == 0
    }

    pub fn key(&self) -> RenditionKey {
        RenditionKey::new(self.image_id, self.filter_spec.clone(), self.vary_key.clone())
    }

    /// Public URL below `base_url`
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.file)
    }
}
