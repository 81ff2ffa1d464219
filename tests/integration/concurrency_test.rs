// Concurrent callers requesting the same rendition

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use renditions::config::ImageConfig;
use renditions::storage::MemoryStorage;
use renditions::store::{MemoryRenditionStore, RenditionStore};
use renditions::{OperationRegistry, Rendition, RenditionService, SourceImage};
use std::io::Cursor;
use std::sync::Arc;

fn setup() -> (Arc<RenditionService>, Arc<MemoryStorage>, Arc<MemoryRenditionStore>, SourceImage) {
    let storage = Arc::new(MemoryStorage::new());
    let store = Arc::new(MemoryRenditionStore::new());

    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(320, 240, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    }));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    storage.insert("original_images/shared.png", buffer.into_inner());

    let service = Arc::new(RenditionService::new(
        Arc::new(OperationRegistry::new()),
        storage.clone(),
        store.clone(),
        &ImageConfig::default(),
    ));
    let source = SourceImage::new(1, "original_images/shared.png", 320, 240);
    (service, storage, store, source)
}

#[test]
fn test_racing_callers_converge_on_one_row() {
    let (service, storage, store, source) = setup();

    let results: Vec<Rendition> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let source = &source;
                scope.spawn(move || service.get_rendition(source, "fill-100x100").unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &results[0];
    assert!(results.iter().all(|r| r == first));
    assert_eq!(store.len(), 1);
    assert_eq!(store.stats().created, 1);
    assert!(storage.get(&first.file).is_some());
    // one source file plus one rendition file
    assert_eq!(storage.len(), 2);
}

#[test]
fn test_distinct_specs_in_parallel() {
    let (service, _storage, store, source) = setup();
    let specs = ["width-100", "height-100", "max-50x50", "fill-80x40", "crop-0,0:10,10"];

    std::thread::scope(|scope| {
        for spec in specs {
            let service = Arc::clone(&service);
            let source = &source;
            scope.spawn(move || {
                for _ in 0..3 {
                    service.get_rendition(source, spec).unwrap();
                }
            });
        }
    });

    assert_eq!(store.len(), specs.len());
    let listed = store.list_for_image(1).unwrap();
    assert_eq!(listed.len(), specs.len());
}
