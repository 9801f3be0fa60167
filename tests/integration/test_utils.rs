//! Test utilities for integration tests.
//!
//! Provides a counting in-process [`DecoderLibrary`] that hands out real heap
//! buffers and tracks every acquisition and release, plus helpers for
//! building descriptor strings and label JPEGs.

use std::collections::HashMap;
use std::ffi::CStr;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use libc::{c_char, c_int, c_uint, c_void};

use sdpc_slide::{DecoderLibrary, RawSlide, SdpcSlide, SlideHeader};

// =============================================================================
// Fixtures
// =============================================================================

/// Vendor-style level descriptor, NUL terminated.
pub fn descriptor(raw_w: i64, raw_h: i64, bound_w: i64, bound_h: i64) -> Vec<u8> {
    format!("width={raw_w}|height={raw_h}|boundWidth={bound_w}|boundHeight={bound_h}|\0")
        .into_bytes()
}

/// Encode a solid-colour JPEG.
pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 95)
        .encode_image(&image)
        .expect("encode label");
    out
}

// =============================================================================
// Counting Library
// =============================================================================

#[derive(Default)]
struct Ledger {
    buffers: HashMap<usize, Vec<u8>>,
    acquires: usize,
    releases: usize,
    foreign_releases: usize,
    decode_calls: Vec<(i32, i32, u32, u32, i32)>,
}

/// In-process decoder: fills regions with one BGR colour.
///
/// Pixel buffers, descriptors and label bytes are heap allocations owned by
/// the ledger until `release` is called with the same pointer.
pub struct CountingLibrary {
    header: SlideHeader,
    descriptors: Vec<Option<Vec<u8>>>,
    fill_bgr: [u8; 3],
    decode_status: i32,
    partial_on_failure: bool,
    failing_x: Option<u32>,
    label: Option<Vec<u8>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    ledger: Mutex<Ledger>,
}

impl CountingLibrary {
    /// Three levels at scale 0.25: 1000x1000, 250x250 and 62x62.
    pub fn new() -> Self {
        CountingLibrary {
            header: SlideHeader {
                hierarchy: 3,
                scale: 0.25,
                rate: 20.0,
            },
            descriptors: vec![
                Some(descriptor(1000, 1000, 0, 0)),
                Some(descriptor(256, 252, 6, 2)),
                Some(descriptor(64, 62, 2, 0)),
            ],
            fill_bgr: [255, 0, 0],
            decode_status: 0,
            partial_on_failure: false,
            failing_x: None,
            label: None,
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn with_header(mut self, hierarchy: i32, scale: f64) -> Self {
        self.header.hierarchy = hierarchy;
        self.header.scale = scale;
        self
    }

    pub fn with_descriptors(mut self, descriptors: Vec<Option<Vec<u8>>>) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn with_fill_bgr(mut self, fill: [u8; 3]) -> Self {
        self.fill_bgr = fill;
        self
    }

    /// Fail every decode with `status`, optionally leaving a buffer behind.
    pub fn with_decode_failure(mut self, status: i32, partial: bool) -> Self {
        self.decode_status = status;
        self.partial_on_failure = partial;
        self
    }

    /// Fail decodes whose level x coordinate equals `x`, leaving a buffer.
    pub fn failing_at_x(mut self, x: u32) -> Self {
        self.failing_x = Some(x);
        self
    }

    pub fn with_label(mut self, jpeg: Vec<u8>) -> Self {
        self.label = Some(jpeg);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn allocate(&self, mut data: Vec<u8>) -> *mut u8 {
        if data.is_empty() {
            data.push(0);
        }
        let ptr = data.as_mut_ptr();
        let mut ledger = self.ledger.lock().unwrap();
        ledger.acquires += 1;
        ledger.buffers.insert(ptr as usize, data);
        ptr
    }

    pub fn acquires(&self) -> usize {
        self.ledger.lock().unwrap().acquires
    }

    pub fn releases(&self) -> usize {
        self.ledger.lock().unwrap().releases
    }

    /// Releases of pointers this library never handed out.
    pub fn foreign_releases(&self) -> usize {
        self.ledger.lock().unwrap().foreign_releases
    }

    pub fn live_buffers(&self) -> usize {
        self.ledger.lock().unwrap().buffers.len()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// `(width, height, x, y, level)` of every decode call.
    pub fn decode_calls(&self) -> Vec<(i32, i32, u32, u32, i32)> {
        self.ledger.lock().unwrap().decode_calls.clone()
    }

    /// Assert no buffer leaked and none was released twice.
    pub fn assert_balanced(&self) {
        let ledger = self.ledger.lock().unwrap();
        assert_eq!(ledger.acquires, ledger.releases, "acquires != releases");
        assert!(ledger.buffers.is_empty(), "live buffers remain");
        assert_eq!(ledger.foreign_releases, 0, "unknown pointer released");
    }
}

impl DecoderLibrary for CountingLibrary {
    fn open(&self, _path: &CStr) -> Option<RawSlide> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Some(NonNull::<c_void>::dangling())
    }

    unsafe fn close(&self, _slide: RawSlide) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn header(&self, _slide: RawSlide) -> SlideHeader {
        self.header
    }

    unsafe fn decode_region(
        &self,
        _slide: RawSlide,
        out: *mut *mut u8,
        width: c_int,
        height: c_int,
        x: c_uint,
        y: c_uint,
        level: c_int,
    ) -> c_int {
        self.ledger
            .lock()
            .unwrap()
            .decode_calls
            .push((width, height, x, y, level));

        let status = match self.failing_x {
            Some(fail_x) if fail_x == x => 7,
            _ => self.decode_status,
        };
        if status != 0 {
            if self.partial_on_failure || self.failing_x.is_some() {
                *out = self.allocate(vec![0; 8]);
            }
            return status;
        }

        let pixels = width as usize * height as usize;
        *out = self.allocate(self.fill_bgr.repeat(pixels));
        0
    }

    unsafe fn level_descriptor(&self, _slide: RawSlide, level: c_int) -> *mut c_char {
        match self.descriptors.get(level as usize) {
            Some(Some(bytes)) => self.allocate(bytes.clone()).cast(),
            _ => std::ptr::null_mut(),
        }
    }

    unsafe fn label_jpeg(
        &self,
        _slide: RawSlide,
        width: *mut c_uint,
        height: *mut c_uint,
        size: *mut usize,
    ) -> *mut u8 {
        match &self.label {
            Some(bytes) => {
                *width = 0;
                *height = 0;
                *size = bytes.len();
                self.allocate(bytes.clone())
            }
            None => {
                *size = 0;
                std::ptr::null_mut()
            }
        }
    }

    unsafe fn release(&self, ptr: *mut c_void) {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.buffers.remove(&(ptr as usize)).is_some() {
            ledger.releases += 1;
        } else {
            ledger.foreign_releases += 1;
        }
    }
}

/// Open a slide at a dummy path.
pub fn open_slide(library: &Arc<CountingLibrary>) -> SdpcSlide<CountingLibrary> {
    SdpcSlide::open(Arc::clone(library), "/slides/test.sdpc").expect("open slide")
}
