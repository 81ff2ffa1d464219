// Filter spec parsing and cache key tests

use renditions::filters::{short_sha1, Filter, OperationRegistry};
use renditions::{FocalPoint, RenditionError, SourceImage};
use rstest::rstest;

fn registry() -> OperationRegistry {
    OperationRegistry::new()
}

#[rstest]
#[case("original", "original")]
#[case("width-200", "width-200")]
#[case("width-0200", "width-200")]
#[case("height-100", "height-100")]
#[case("max-100x100", "max-100x100")]
#[case("min-0640x480", "min-640x480")]
#[case("fill-200x200", "fill-200x200")]
#[case("fill-200x200-c0", "fill-200x200")]
#[case("fill-200x200-c050", "fill-200x200-c50")]
#[case("crop-10,10:50,50", "crop-10,10:50,50")]
#[case("forcewidth-10", "forcewidth-10")]
#[case("forceheight-10", "forceheight-10")]
#[case("forcefit-10x20", "forcefit-10x20")]
#[case("scale-50", "scale-50")]
#[case("format-jpg", "format-jpeg")]
#[case("format-WEBP", "format-webp")]
#[case("jpegquality-60", "jpegquality-60")]
#[case("bgcolor-fff", "bgcolor-ffffff")]
#[case("width-200|format-png|jpegquality-40", "width-200|format-png|jpegquality-40")]
fn test_canonical_spec(#[case] spec: &str, #[case] canonical: &str) {
    let filter = Filter::new(spec, &registry()).unwrap();
    assert_eq!(filter.spec(), canonical);
}

#[rstest]
#[case("bogus-1")]
#[case("")]
#[case("width")]
#[case("width-abc")]
#[case("width-0")]
#[case("width-100-200")]
#[case("max-100")]
#[case("fill-100x100-50")]
#[case("crop-50,50:10,10")]
#[case("crop-1,2,3,4")]
#[case("format-tiff")]
#[case("jpegquality-0")]
#[case("jpegquality-101")]
#[case("bgcolor-12")]
#[case("width-100||height-100")]
#[case("width-100|")]
#[case("-100")]
fn test_invalid_specs(#[case] spec: &str) {
    let err = Filter::new(spec, &registry()).unwrap_err();
    assert!(
        matches!(err, RenditionError::InvalidFilterSpec { .. }),
        "{spec}: {err}"
    );
}

#[test]
fn test_bogus_operation_names_the_stage() {
    let err = Filter::new("width-100|bogus-1", &registry()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid filter spec 'bogus-1': unrecognised operation 'bogus'"
    );
}

#[test]
fn test_equivalent_specs_share_cache_key() {
    let source = SourceImage::new(1, "original_images/a.jpg", 800, 600);
    let a = Filter::new("width-0200|format-jpg", &registry()).unwrap();
    let b = Filter::new("width-200|format-jpeg", &registry()).unwrap();
    assert_eq!(a.cache_key(&source), b.cache_key(&source));
}

#[test]
fn test_fill_scenario_cache_key() {
    let source = SourceImage::new(1, "original_images/a.jpg", 800, 600).with_focal_point(
        FocalPoint {
            x: 400,
            y: 300,
            width: 100,
            height: 100,
        },
    );
    let filter = Filter::new("fill-200x200", &registry()).unwrap();

    let expected = format!(
        "{}{}",
        short_sha1("fill-200x200"),
        short_sha1("400-300-100-100")
    );
    assert_eq!(filter.cache_key(&source), expected);
    assert_eq!(filter.cache_key(&source).len(), 16);
}

#[test]
fn test_width_cache_key_ignores_focal_point() {
    let plain = SourceImage::new(1, "a.jpg", 800, 600);
    let focused = plain.clone().with_focal_point(FocalPoint {
        x: 1,
        y: 2,
        width: 3,
        height: 4,
    });
    let filter = Filter::new("width-200", &registry()).unwrap();

    assert_eq!(filter.vary_key(&plain), "");
    assert_eq!(filter.vary_key(&focused), "");
    assert_eq!(filter.cache_key(&plain), filter.cache_key(&focused));
}

#[test]
fn test_vary_values_follow_operation_order() {
    let source = SourceImage::new(1, "a.jpg", 800, 600).with_focal_point(FocalPoint {
        x: 10,
        y: 20,
        width: 30,
        height: 40,
    });
    let filter = Filter::new("fill-100x100|width-50|fill-20x20", &registry()).unwrap();
    assert_eq!(
        filter.vary_values(&source),
        vec!["10", "20", "30", "40", "10", "20", "30", "40"]
    );
}

#[test]
fn test_filter_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Filter>();
    assert_send_sync::<OperationRegistry>();
}
