//! Frame types flowing through the pipeline.
//!
//! Capture devices produce `FramePayload` values on their delivery thread.
//! The session controller wraps each payload into a `Frame` tagged with the
//! generation that was current when the frame was acquired; the dispatcher
//! uses the tag to discard results computed from a superseded device.

use std::time::Instant;

/// One sampled image buffer as produced by a capture device.
///
/// Pixel data is tightly packed RGB, `width * height * 3` bytes.
#[derive(Clone, Debug)]
pub struct FramePayload {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture instant.
    pub captured_at: Instant,
}

impl FramePayload {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
        }
    }
}

/// A frame tagged with the session generation active at acquisition time.
///
/// Owned by the dispatcher for the duration of one dispatch; never retained
/// after the detector call returns.
#[derive(Clone, Debug)]
pub struct Frame {
    payload: FramePayload,
    generation: u64,
}

impl Frame {
    pub fn new(payload: FramePayload, generation: u64) -> Self {
        Self {
            payload,
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn data(&self) -> &[u8] {
        &self.payload.data
    }

    pub fn width(&self) -> u32 {
        self.payload.width
    }

    pub fn height(&self) -> u32 {
        self.payload.height
    }

    pub fn captured_at(&self) -> Instant {
        self.payload.captured_at
    }

    pub fn is_empty(&self) -> bool {
        self.payload.data.is_empty()
    }
}
