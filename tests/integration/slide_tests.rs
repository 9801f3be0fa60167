//! End-to-end slide tests against the counting decoder.

use std::sync::Arc;
use std::time::Duration;

use image::Rgb;

use sdpc_slide::slide::{PROPERTY_LEVEL_COUNT, PROPERTY_MPP_X, PROPERTY_VENDOR};
use sdpc_slide::{
    OpenError, ReadError, SdpcSlide, SharedSlide, SlideError, SlideInfo, SlideReader, SDPC_VENDOR,
};

use super::test_utils::{descriptor, open_slide, solid_jpeg, CountingLibrary};

// =============================================================================
// Geometry
// =============================================================================

#[test]
fn test_three_level_pyramid() {
    let library = CountingLibrary::new().into_arc();
    let slide = open_slide(&library);

    assert_eq!(slide.level_count(), 3);
    assert_eq!(
        slide.level_dimensions(),
        &[(1000, 1000), (250, 250), (62, 62)]
    );
    assert_eq!(slide.level_downsamples(), &[1.0, 4.0, 16.0]);
    assert_eq!(slide.properties()[PROPERTY_VENDOR], SDPC_VENDOR);
    assert_eq!(slide.properties()[PROPERTY_MPP_X], "0.25");
    assert_eq!(slide.properties()[PROPERTY_LEVEL_COUNT], "3");
}

#[test]
fn test_downsamples_are_powers() {
    let library = CountingLibrary::new()
        .with_header(4, 0.5)
        .with_descriptors(vec![
            Some(descriptor(800, 600, 0, 0)),
            Some(descriptor(400, 300, 0, 0)),
            Some(descriptor(200, 150, 0, 0)),
            Some(descriptor(100, 75, 0, 0)),
        ])
        .into_arc();
    let slide = open_slide(&library);

    let downsamples = slide.level_downsamples();
    assert_eq!(downsamples[0], 1.0);
    for (level, downsample) in downsamples.iter().enumerate() {
        assert_eq!(*downsample, downsamples[1].powi(level as i32));
    }

    let base = slide.dimensions();
    for &(width, height) in slide.level_dimensions() {
        assert!(width <= base.0 && height <= base.1);
    }
}

#[test]
fn test_slide_info_json() {
    let library = CountingLibrary::new().into_arc();
    let slide = open_slide(&library);

    let json = serde_json::to_value(SlideInfo::from_reader(&slide)).unwrap();
    assert_eq!(json["level_count"], 3);
    assert_eq!(json["levels"][2]["width"], 62);
    assert_eq!(json["levels"][1]["downsample"], 4.0);
    assert_eq!(json["properties"]["openslide.vendor"], "TEKSQRAY");
}

// =============================================================================
// Open Failures
// =============================================================================

#[test]
fn test_malformed_descriptor_closes_handle() {
    let library = CountingLibrary::new()
        .with_descriptors(vec![
            Some(descriptor(1000, 1000, 0, 0)),
            Some(b"width=10|height=10|boundWidth=0|\0".to_vec()),
            Some(descriptor(62, 62, 0, 0)),
        ])
        .into_arc();

    let result = SdpcSlide::open(Arc::clone(&library), "/slides/bad.sdpc");
    assert!(matches!(result, Err(OpenError::Descriptor { level: 1, .. })));
    assert_eq!(library.opens(), 1);
    assert_eq!(library.closes(), 1);
    library.assert_balanced();
}

#[test]
fn test_open_error_converts_to_slide_error() {
    let library = CountingLibrary::new().with_header(0, 0.25).into_arc();

    let result: Result<_, SlideError> =
        SdpcSlide::open(Arc::clone(&library), "/slides/bad.sdpc").map_err(SlideError::from);
    assert!(matches!(result, Err(SlideError::Open(OpenError::InvalidHeader { .. }))));
    assert_eq!(library.closes(), 1);
}

// =============================================================================
// Region Reads
// =============================================================================

#[test]
fn test_region_origin_scaled_to_level() {
    let library = CountingLibrary::new()
        .with_header(2, 0.5)
        .with_descriptors(vec![
            Some(descriptor(1000, 1000, 0, 0)),
            Some(descriptor(500, 500, 0, 0)),
        ])
        .into_arc();
    let slide = open_slide(&library);

    let region = slide.read_region((200, 200), 1, (32, 16)).unwrap();
    assert_eq!(region.dimensions(), (32, 16));
    assert_eq!(library.decode_calls(), vec![(32, 16, 100, 100, 1)]);
}

#[test]
fn test_pure_blue_survives_conversion() {
    let library = CountingLibrary::new().with_fill_bgr([255, 0, 0]).into_arc();
    let slide = open_slide(&library);

    let region = slide.read_region((0, 0), 0, (8, 8)).unwrap();
    assert!(region.pixels().all(|p| *p == Rgb([0, 0, 255])));
}

#[test]
fn test_buffers_balanced_on_success() {
    let library = CountingLibrary::new().into_arc();
    let slide = open_slide(&library);

    for level in 0..slide.level_count() {
        slide.read_region((0, 0), level, (16, 16)).unwrap();
    }
    drop(slide);

    // Three descriptors plus three regions
    assert_eq!(library.acquires(), 6);
    library.assert_balanced();
    assert_eq!(library.closes(), 1);
}

#[test]
fn test_buffers_balanced_on_failure() {
    let library = CountingLibrary::new()
        .with_decode_failure(-3, true)
        .into_arc();
    let slide = open_slide(&library);

    let result = slide.read_region((0, 0), 0, (16, 16));
    assert!(matches!(result, Err(ReadError::Decode { status: -3, .. })));
    assert_eq!(library.acquires(), 4);
    library.assert_balanced();
}

#[test]
fn test_read_after_close() {
    let library = CountingLibrary::new().into_arc();
    let mut slide = open_slide(&library);

    slide.close();
    assert!(matches!(slide.read_region((0, 0), 0, (4, 4)), Err(ReadError::Closed)));
    assert!(library.decode_calls().is_empty());
}

// =============================================================================
// Best Level and Thumbnail
// =============================================================================

#[test]
fn test_best_level_endpoints() {
    let library = CountingLibrary::new().into_arc();
    let slide = open_slide(&library);

    assert_eq!(slide.get_best_level_for_downsample(1.0), 0);
    let last = slide.level_downsamples()[2];
    assert_eq!(slide.get_best_level_for_downsample(last * last), 2);
}

#[test]
fn test_thumbnail_end_to_end() {
    let library = CountingLibrary::new().into_arc();
    let slide = open_slide(&library);

    let thumbnail = slide.get_thumbnail((64, 64)).unwrap();
    assert_eq!(thumbnail.dimensions(), (64, 64));
    assert_eq!(library.decode_calls(), vec![(62, 62, 0, 0, 2)]);
    assert_eq!(thumbnail.get_pixel(32, 32), &Rgb([0, 0, 255]));
}

// =============================================================================
// Close and Label
// =============================================================================

#[test]
fn test_close_twice_closes_once() {
    let library = CountingLibrary::new().into_arc();
    let mut slide = open_slide(&library);

    slide.close();
    slide.close();
    drop(slide);
    assert_eq!(library.closes(), 1);
}

#[test]
fn test_label_round_trip() {
    let jpeg = solid_jpeg(16, 8, [0, 200, 0]);
    let library = CountingLibrary::new().with_label(jpeg.clone()).into_arc();
    let slide = open_slide(&library);

    let bytes = slide.label_jpeg().unwrap();
    assert_eq!(&bytes[..], &jpeg[..]);

    let label = slide.label_image().unwrap();
    assert_eq!(label.dimensions(), (16, 8));
    let pixel = label.get_pixel(8, 4);
    assert!(pixel[1] > 150 && pixel[0] < 60 && pixel[2] < 60);

    drop(slide);
    library.assert_balanced();
}

#[test]
fn test_label_missing() {
    let library = CountingLibrary::new().into_arc();
    let slide = open_slide(&library);
    assert!(matches!(slide.label_image(), Err(ReadError::LabelUnavailable)));
}

// =============================================================================
// SharedSlide
// =============================================================================

#[tokio::test]
async fn test_shared_slide_concurrent_reads() {
    let library = CountingLibrary::new().into_arc();
    let shared = SharedSlide::new(open_slide(&library));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            shared
                .read_region((i * 16, 0), 0, (16, 16), Duration::from_secs(5))
                .await
        }));
    }
    for handle in handles {
        let region = handle.await.unwrap().unwrap();
        assert_eq!(region.dimensions(), (16, 16));
    }

    assert_eq!(library.decode_calls().len(), 8);
    shared.close();
    assert_eq!(library.closes(), 1);
    library.assert_balanced();
}
