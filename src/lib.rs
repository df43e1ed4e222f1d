//! maskwatch
//!
//! Live-camera face/mask detection pipeline: owns a capture session, feeds
//! sampled frames to a detector at a bounded rate, and publishes a debounced
//! textual status to an observer.
//!
//! # Architecture
//!
//! Data flows device → dispatcher → detector → aggregator → observer; the
//! session controller governs device lifecycle and supersedes in-flight work
//! during reconfiguration. The pipeline enforces four invariants:
//!
//! 1. **Bounded inference**: at most one detection runs at a time; excess
//!    frames are dropped, never queued.
//! 2. **Generation fencing**: a monotonic counter identifies each period of
//!    one open device; results from superseded devices are discarded.
//! 3. **Debounced status**: observers see a status change at most once per
//!    debounce window, and only when the text actually changes.
//! 4. **Serialized configuration**: configure/switch/stop run one at a time
//!    on a single control thread; concurrent switch requests coalesce.
//!
//! # Module Structure
//!
//! - `device`: camera capability (`CameraHost`/`CameraDevice`, stub + V4L2)
//! - `detect`: detector capability (`MaskDetector`, stub + CPU heuristic)
//! - `frame`: frame payloads and generation tagging
//! - `dispatch`: backpressured frame → detector dispatch
//! - `status`: debounced status aggregation
//! - `session`: capture-session state machine and control thread
//! - `config`: file/env configuration for the daemon

pub mod config;
pub mod detect;
pub mod device;
pub mod dispatch;
pub mod frame;
pub mod session;
pub mod status;

pub use config::{CameraSettings, DetectorSettings, MaskwatchConfig};
pub use detect::{
    detector_from_config, CpuDetector, FaceDetection, MaskDetector, MaskStatus, StubDetector,
};
#[cfg(feature = "device-v4l2")]
pub use device::{V4l2CameraHost, V4l2HostConfig};
pub use device::{
    host_from_config, CameraDevice, CameraHost, CameraPosition, DeviceDescriptor, FrameSink,
    StubCameraHost, StubHostConfig, StubHostHandle,
};
pub use dispatch::FrameDispatcher;
pub use frame::{Frame, FramePayload};
pub use session::{SessionController, SessionState};
pub use status::{
    DetectionOutcome, StatusAggregator, StatusObserver, DEFAULT_DEBOUNCE, WAITING_STATUS,
};
