//! Face/mask detection capability.
//!
//! The pipeline consumes detection as an opaque capability: a synchronous,
//! fallible function from a pixel buffer to a set of per-face results.
//! Backends in-tree:
//! - `StubDetector`: scripted results (tests, synthetic demo)
//! - `CpuDetector`: model-free luminance heuristic, an MVP stand-in usable
//!   without model assets
//!
//! Real model runtimes plug in behind the same trait.

mod cpu;
mod stub;

pub use cpu::CpuDetector;
pub use stub::StubDetector;

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

/// Classification of a single detected face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskStatus {
    Mask,
    NoMask,
}

/// One face found in a frame.
///
/// `face_id` is the position within this frame's result set, not a stable
/// identity across frames.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub face_id: usize,
    pub status: MaskStatus,
    pub confidence: f32,
}

/// Detector backend trait.
///
/// Implementations may be stateful (e.g. temporal smoothing), hence
/// `&mut self`. `detect` must treat the pixel slice as read-only and
/// ephemeral, and must be safe to call while the session reconfigures:
/// results computed from a superseded device are fenced downstream.
pub trait MaskDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame. Returns one entry per face found, in
    /// encounter order.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<FaceDetection>>;
}

/// Select a detector backend by configured name.
///
/// Backends are shared behind `Mutex` because `detect` takes `&mut self`.
pub fn detector_from_config(
    cfg: &crate::config::DetectorSettings,
) -> Result<Arc<Mutex<dyn MaskDetector>>> {
    match cfg.backend.as_str() {
        "cpu" => Ok(Arc::new(Mutex::new(CpuDetector::new(cfg.min_confidence)))),
        "stub" => Ok(Arc::new(Mutex::new(StubDetector::cycling()))),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}
