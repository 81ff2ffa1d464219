// End-to-end rendition cache behaviour over in-memory collaborators

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use renditions::config::ImageConfig;
use renditions::filters::{short_sha1, ExternalOperation, OperationRegistry};
use renditions::rendition::VaryField;
use renditions::storage::{MemoryStorage, Storage};
use renditions::store::{MemoryRenditionStore, RenditionStore};
use renditions::transform::TransformEnv;
use renditions::{FocalPoint, RenditionError, RenditionService, SourceImage};
use std::io::Cursor;
use std::sync::Arc;

pub struct Harness {
    pub service: RenditionService,
    pub storage: Arc<MemoryStorage>,
    pub store: Arc<MemoryRenditionStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_registry(OperationRegistry::new())
    }

    pub fn with_registry(registry: OperationRegistry) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(MemoryRenditionStore::new());
        let service = RenditionService::new(
            Arc::new(registry),
            storage.clone(),
            store.clone(),
            &ImageConfig::default(),
        );
        Self {
            service,
            storage,
            store,
        }
    }

    pub fn add_source(&self, id: u64, name: &str, image: &DynamicImage, format: ImageFormat) -> SourceImage {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        self.storage.insert(name, buffer.into_inner());
        SourceImage::new(id, name, image.width(), image.height())
    }

    pub fn decode(&self, file: &str) -> DynamicImage {
        image::load_from_memory(&self.storage.get(file).unwrap()).unwrap()
    }
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    }))
}

#[test]
fn test_second_request_does_not_execute() {
    let harness = Harness::new();
    let source = harness.add_source(1, "original_images/photo.png", &gradient(400, 300), ImageFormat::Png);

    let first = harness.service.get_rendition(&source, "max-100x100").unwrap();
    assert_eq!((first.width, first.height), (100, 75));
    assert_eq!(harness.storage.reads(), 1);
    let writes = harness.storage.writes();

    for _ in 0..3 {
        let again = harness.service.get_rendition(&source, "max-100x100").unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(harness.storage.reads(), 1);
    assert_eq!(harness.storage.writes(), writes);
    assert_eq!(harness.store.len(), 1);
}

#[test]
fn test_missing_source_yields_placeholder() {
    let harness = Harness::new();
    let source = harness.add_source(1, "original_images/photo.png", &gradient(40, 30), ImageFormat::Png);
    harness.storage.remove("original_images/photo.png");

    let rendition = harness.service.get_rendition(&source, "width-20").unwrap();
    assert_eq!((rendition.width, rendition.height), (0, 0));
    assert!(rendition.is_placeholder());
    assert!(harness.store.is_empty());
}

#[test]
fn test_unknown_operation_is_fatal() {
    let harness = Harness::new();
    let source = harness.add_source(1, "original_images/photo.png", &gradient(40, 30), ImageFormat::Png);

    let err = harness.service.get_rendition(&source, "bogus-1").unwrap_err();
    assert!(matches!(err, RenditionError::InvalidFilterSpec { .. }));
    assert_eq!(harness.storage.reads(), 0);
}

#[test]
fn test_full_crop_matches_original() {
    let harness = Harness::new();
    let image = gradient(64, 48);
    let source = harness.add_source(1, "original_images/photo.png", &image, ImageFormat::Png);

    let cropped = harness.service.get_rendition(&source, "crop-0,0:64,48").unwrap();
    let original = harness.service.get_rendition(&source, "original").unwrap();

    assert_ne!(cropped.file, original.file);
    assert_eq!(
        harness.decode(&cropped.file).to_rgba8(),
        harness.decode(&original.file).to_rgba8()
    );
    assert_eq!(harness.decode(&original.file).to_rgba8(), image.to_rgba8());
}

#[test]
fn test_fill_toward_focal_point_scenario() {
    let harness = Harness::new();
    let source = harness
        .add_source(
            7,
            "original_images/landscape.jpg",
            &DynamicImage::ImageRgb8(gradient(800, 600).to_rgb8()),
            ImageFormat::Jpeg,
        )
        .with_focal_point(FocalPoint {
            x: 400,
            y: 300,
            width: 100,
            height: 100,
        });

    let rendition = harness.service.get_rendition(&source, "fill-200x200").unwrap();
    assert_eq!((rendition.width, rendition.height), (200, 200));
    assert_eq!(rendition.vary_key, short_sha1("400-300-100-100"));

    let cache_key = format!("{}{}", short_sha1("fill-200x200"), short_sha1("400-300-100-100"));
    assert_eq!(rendition.file, format!("images/7/landscape.{}.jpg", cache_key));

    let decoded = harness.decode(&rendition.file);
    assert_eq!((decoded.width(), decoded.height()), (200, 200));
}

#[test]
fn test_moving_focal_point_creates_new_rendition() {
    let harness = Harness::new();
    let mut source = harness.add_source(1, "original_images/photo.png", &gradient(400, 300), ImageFormat::Png);

    source.focal_point = Some(FocalPoint {
        x: 100,
        y: 100,
        width: 50,
        height: 50,
    });
    let a = harness.service.get_rendition(&source, "fill-100x100").unwrap();

    source.focal_point = Some(FocalPoint {
        x: 300,
        y: 200,
        width: 50,
        height: 50,
    });
    let b = harness.service.get_rendition(&source, "fill-100x100").unwrap();

    assert_ne!(a.vary_key, b.vary_key);
    assert_ne!(a.file, b.file);
    assert_eq!(harness.store.len(), 2);

    // width-* does not vary on the focal point
    let c = harness.service.get_rendition(&source, "width-100").unwrap();
    source.focal_point = None;
    let d = harness.service.get_rendition(&source, "width-100").unwrap();
    assert_eq!(c, d);
    assert!(c.vary_key.is_empty());
}

#[test]
fn test_output_format_and_extension() {
    let harness = Harness::new();
    let source = harness.add_source(1, "original_images/scan.bmp", &gradient(20, 20), ImageFormat::Bmp);

    let png = harness.service.get_rendition(&source, "original").unwrap();
    assert!(png.file.ends_with(".png"));

    let webp = harness.service.get_rendition(&source, "format-webp").unwrap();
    assert!(webp.file.ends_with(".webp"));
    assert_eq!(
        image::guess_format(&harness.storage.get(&webp.file).unwrap()).unwrap(),
        ImageFormat::WebP
    );
}

#[test]
fn test_long_source_name_is_truncated() {
    let harness = Harness::new();
    let name = format!("original_images/{}.png", "a".repeat(150));
    let source = harness.add_source(1, &name, &gradient(20, 20), ImageFormat::Png);

    let rendition = harness.service.get_rendition(&source, "width-10").unwrap();
    let filename = rendition.file.strip_prefix("images/1/").unwrap();
    assert_eq!(filename.chars().count(), 80);
}

#[test]
fn test_cascade_delete() {
    let harness = Harness::new();
    let a = harness.add_source(1, "original_images/a.png", &gradient(40, 40), ImageFormat::Png);
    let b = harness.add_source(2, "original_images/b.png", &gradient(40, 40), ImageFormat::Png);

    let a1 = harness.service.get_rendition(&a, "width-10").unwrap();
    harness.service.get_rendition(&a, "width-20").unwrap();
    let b1 = harness.service.get_rendition(&b, "width-10").unwrap();

    assert_eq!(harness.service.delete_renditions(&a).unwrap(), 2);
    assert!(!harness.storage.exists(&a1.file));
    assert!(harness.storage.exists(&b1.file));
    assert_eq!(harness.store.list_for_image(2).unwrap(), vec![b1]);
}

#[test]
fn test_same_basename_different_images() {
    let harness = Harness::new();
    let red = DynamicImage::ImageRgba8(RgbaImage::from_pixel(80, 40, Rgba([255, 0, 0, 255])));
    let blue = DynamicImage::ImageRgba8(RgbaImage::from_pixel(80, 40, Rgba([0, 0, 255, 255])));
    let a = harness.add_source(1, "a/photo.png", &red, ImageFormat::Png);
    let b = harness.add_source(2, "b/photo.png", &blue, ImageFormat::Png);

    let ra = harness.service.get_rendition(&a, "width-40").unwrap();
    let rb = harness.service.get_rendition(&b, "width-40").unwrap();
    assert_ne!(ra.file, rb.file);

    let pixel = harness.decode(&ra.file).to_rgba8().get_pixel(20, 10).0;
    assert!(pixel[0] > 200 && pixel[2] < 50, "{:?}", pixel);

    harness.service.delete_renditions(&b).unwrap();
    assert!(harness.storage.exists(&ra.file));
    assert!(!harness.storage.exists(&rb.file));
}

#[test]
fn test_derived_rendition_chain() {
    let harness = Harness::new();
    let source = harness.add_source(5, "original_images/photo.png", &gradient(400, 300), ImageFormat::Png);

    let parent = harness.service.get_rendition(&source, "max-200x200").unwrap();
    assert_eq!((parent.width, parent.height), (200, 150));

    let child = harness.service.get_derived_rendition(&parent, "format-webp").unwrap();
    assert_eq!(child.filter_spec, "max-200x200|format-webp");
    assert_eq!((child.width, child.height), (200, 150));
    assert!(child.file.ends_with(".webp"));
    assert_eq!(harness.service.renditions_for(&source).unwrap().len(), 2);
}

#[derive(Debug)]
struct Grayscale;

impl ExternalOperation for Grayscale {
    fn name(&self) -> &str {
        "grayscale"
    }

    fn canonical_args(&self) -> Vec<String> {
        Vec::new()
    }

    fn vary_fields(&self) -> &[VaryField] {
        &[VaryField::FocalPointX]
    }

    fn run(
        &self,
        image: DynamicImage,
        _source: &SourceImage,
        _env: &mut TransformEnv,
    ) -> Result<DynamicImage, RenditionError> {
        Ok(DynamicImage::ImageLuma8(image.to_luma8()))
    }
}

#[test]
fn test_registered_operation_runs_and_varies() {
    let mut registry = OperationRegistry::new();
    registry
        .register("grayscale", |args: &[&str]| {
            if args.is_empty() {
                Ok(Box::new(Grayscale) as Box<dyn ExternalOperation>)
            } else {
                Err("grayscale takes no arguments".to_string())
            }
        })
        .unwrap();

    let harness = Harness::with_registry(registry);
    let source = harness
        .add_source(1, "original_images/a.png", &gradient(20, 20), ImageFormat::Png)
        .with_focal_point(FocalPoint {
            x: 5,
            y: 5,
            width: 2,
            height: 2,
        });

    let rendition = harness.service.get_rendition(&source, "grayscale|width-10").unwrap();
    assert_eq!(rendition.filter_spec, "grayscale|width-10");
    assert_eq!(rendition.vary_key, short_sha1("5"));

    let pixel = harness.decode(&rendition.file).to_rgb8().get_pixel(3, 7).0;
    assert_eq!(pixel[0], pixel[1]);
    assert_eq!(pixel[1], pixel[2]);
}
