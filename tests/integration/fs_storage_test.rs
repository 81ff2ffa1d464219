// Filesystem storage and JSON index working together

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use renditions::config::ImageConfig;
use renditions::storage::{FileSystemStorage, Storage};
use renditions::store::{JsonRenditionStore, RenditionStore};
use renditions::{OperationRegistry, RenditionService, SourceImage};
use std::sync::Arc;
use tempfile::TempDir;

fn write_source(root: &std::path::Path, name: &str, width: u32, height: u32) {
    let path = root.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])))
        .save_with_format(&path, ImageFormat::Jpeg)
        .unwrap();
}

fn service(root: &std::path::Path) -> RenditionService {
    let storage = Arc::new(FileSystemStorage::new(root));
    let store = Arc::new(JsonRenditionStore::open(root.join("renditions.json")).unwrap());
    RenditionService::new(
        Arc::new(OperationRegistry::new()),
        storage,
        store,
        &ImageConfig::default(),
    )
}

#[test]
fn test_rendition_written_under_media_root() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "original_images/photo.jpg", 300, 200);
    let source = SourceImage::new(1, "original_images/photo.jpg", 300, 200);

    let rendition = service(dir.path()).get_rendition(&source, "width-150").unwrap();
    assert_eq!((rendition.width, rendition.height), (150, 100));
    assert!(rendition.file.starts_with("images/1/photo."));
    assert!(rendition.file.ends_with(".jpg"));

    let on_disk = image::open(dir.path().join(&rendition.file)).unwrap();
    assert_eq!((on_disk.width(), on_disk.height()), (150, 100));
}

#[test]
fn test_rows_survive_restart() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "original_images/photo.jpg", 300, 200);
    let source = SourceImage::new(1, "original_images/photo.jpg", 300, 200);

    let first = service(dir.path()).get_rendition(&source, "max-100x100").unwrap();

    // Removing the source proves the second lookup is served from the index
    std::fs::remove_file(dir.path().join("original_images/photo.jpg")).unwrap();
    let second = service(dir.path()).get_rendition(&source, "max-100x100").unwrap();
    assert_eq!(second, first);
    assert!(!second.is_placeholder());
}

#[test]
fn test_delete_removes_files_and_index_rows() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "original_images/photo.jpg", 300, 200);
    let source = SourceImage::new(1, "original_images/photo.jpg", 300, 200);

    let service = service(dir.path());
    let rendition = service.get_rendition(&source, "height-50").unwrap();
    assert!(service.storage().exists(&rendition.file));

    assert_eq!(service.delete_renditions(&source).unwrap(), 1);
    assert!(!dir.path().join(&rendition.file).exists());

    let reopened = JsonRenditionStore::open(dir.path().join("renditions.json")).unwrap();
    assert!(reopened.is_empty());
}

#[test]
fn test_missing_source_on_disk_gives_placeholder() {
    let dir = TempDir::new().unwrap();
    let source = SourceImage::new(1, "original_images/never-uploaded.jpg", 300, 200);

    let rendition = service(dir.path()).get_rendition(&source, "width-100").unwrap();
    assert!(rendition.is_placeholder());
    assert!(!dir.path().join("images").exists());
}
