//! In-process stand-in for the vendor library used by unit tests.

use std::collections::HashMap;
use std::ffi::CStr;
use std::ptr::NonNull;
use std::sync::Mutex;

use libc::{c_char, c_int, c_uint, c_void};

use super::{DecoderLibrary, RawSlide, SlideHeader};

/// Arguments of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeCall {
    pub width: i32,
    pub height: i32,
    pub x: u32,
    pub y: u32,
    pub level: i32,
}

#[derive(Default)]
pub(crate) struct MockState {
    buffers: HashMap<usize, Vec<u8>>,
    acquires: usize,
    releases: usize,
    unknown_releases: usize,
    opens: usize,
    closes: usize,
    decode_calls: Vec<DecodeCall>,
}

/// Counting mock: every pointer handed out is tracked until released.
pub struct MockLibrary {
    pub header: SlideHeader,
    pub descriptors: Vec<Option<Vec<u8>>>,
    pub fill_bgr: [u8; 3],
    pub decode_status: i32,
    pub partial_on_failure: bool,
    pub label: Option<Vec<u8>>,
    pub fail_open: bool,
    pub panic_on_close: bool,
    pub null_on_success: bool,
    pub(crate) state: Mutex<MockState>,
}

impl Default for MockLibrary {
    fn default() -> Self {
        MockLibrary {
            header: SlideHeader {
                hierarchy: 3,
                scale: 0.25,
                rate: 40.0,
            },
            descriptors: vec![
                Some(descriptor(1000, 1000, 0, 0)),
                Some(descriptor(260, 255, 10, 5)),
                Some(descriptor(62, 62, 0, 0)),
            ],
            fill_bgr: [255, 0, 0],
            decode_status: 0,
            partial_on_failure: false,
            label: None,
            fail_open: false,
            panic_on_close: false,
            null_on_success: false,
            state: Mutex::new(MockState::default()),
        }
    }
}

/// NUL-terminated descriptor in the vendor layout.
pub fn descriptor(raw_w: i64, raw_h: i64, bound_w: i64, bound_h: i64) -> Vec<u8> {
    format!("width={raw_w}|height={raw_h}|boundWidth={bound_w}|boundHeight={bound_h}|\0")
        .into_bytes()
}

impl MockLibrary {
    pub fn allocate(&self, mut data: Vec<u8>) -> *mut u8 {
        if data.is_empty() {
            data.push(0);
        }
        let mut state = self.state.lock().unwrap();
        let ptr = data.as_mut_ptr();
        state.acquires += 1;
        state.buffers.insert(ptr as usize, data);
        ptr
    }

    pub fn acquires(&self) -> usize {
        self.state.lock().unwrap().acquires
    }

    pub fn releases(&self) -> usize {
        self.state.lock().unwrap().releases
    }

    pub fn unknown_releases(&self) -> usize {
        self.state.lock().unwrap().unknown_releases
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().unwrap().buffers.len()
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn decode_calls(&self) -> Vec<DecodeCall> {
        self.state.lock().unwrap().decode_calls.clone()
    }
}

impl DecoderLibrary for MockLibrary {
    fn open(&self, _path: &CStr) -> Option<RawSlide> {
        if self.fail_open {
            return None;
        }
        self.state.lock().unwrap().opens += 1;
        Some(NonNull::<c_void>::dangling())
    }

    unsafe fn close(&self, _slide: RawSlide) {
        self.state.lock().unwrap().closes += 1;
        if self.panic_on_close {
            panic!("mock close failure");
        }
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
        self.state.lock().unwrap().decode_calls.push(DecodeCall {
            width,
            height,
            x,
            y,
            level,
        });

        if self.decode_status != 0 {
            if self.partial_on_failure {
                *out = self.allocate(vec![0; 16]);
            }
            return self.decode_status;
        }
        if self.null_on_success {
            return 0;
        }

        let pixels = (width as usize) * (height as usize);
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
                *width = 4;
                *height = 4;
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
        let mut state = self.state.lock().unwrap();
        if state.buffers.remove(&(ptr as usize)).is_some() {
            state.releases += 1;
        } else {
            state.unknown_releases += 1;
        }
    }
}
