//! Capture device capability.
//!
//! This module defines how the pipeline talks to cameras:
//! - enumerate devices by logical position (front/back)
//! - open a device at a position
//! - start/stop frame delivery through an injected callback
//!
//! Frame delivery runs on a device-owned thread; the callback is invoked zero
//! or more times per second and must not block for long. Delivery ordering is
//! guaranteed only within one device instance, never across instances.
//!
//! Backends:
//! - `StubCameraHost`: synthetic/scripted source, always available (tests, demo)
//! - `V4l2CameraHost`: local V4L2 devices (feature: device-v4l2)

mod stub;
#[cfg(feature = "device-v4l2")]
mod v4l2;

pub use stub::{StubCameraHost, StubHostConfig, StubHostHandle};
#[cfg(feature = "device-v4l2")]
pub use v4l2::{V4l2CameraHost, V4l2HostConfig};

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::frame::FramePayload;

/// Logical camera position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraPosition {
    Front,
    Back,
}

impl CameraPosition {
    /// The opposite position; camera switches flip between the two.
    pub fn flipped(self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back => CameraPosition::Front,
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "front" => Ok(CameraPosition::Front),
            "back" => Ok(CameraPosition::Back),
            other => Err(anyhow!(
                "unknown camera position '{}' (expected 'front' or 'back')",
                other
            )),
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::Back => write!(f, "back"),
        }
    }
}

/// Descriptor for an enumerable capture device.
#[derive(Clone, Debug)]
pub struct DeviceDescriptor {
    pub position: CameraPosition,
    pub label: String,
}

/// Frame-delivery callback installed by the session controller at
/// (re)configuration time.
///
/// Invoked on the device's delivery thread. The sink behind it only performs
/// an admission check and a thread handoff; it never runs inference inline.
pub type FrameSink = Arc<dyn Fn(FramePayload) + Send + Sync>;

/// Host side of the device capability: enumerate and open devices.
pub trait CameraHost: Send {
    fn list_devices(&self) -> Vec<DeviceDescriptor>;

    /// Open the device at a logical position.
    ///
    /// Open failures are recoverable: the session stays usable and the call
    /// may be retried.
    fn open(&mut self, position: CameraPosition) -> Result<Box<dyn CameraDevice>>;
}

/// An open capture device. Dropping the handle releases the device.
pub trait CameraDevice: Send {
    /// Start delivering frames to `sink` on a device-owned thread.
    ///
    /// May be called at most once per open device.
    fn start_delivery(&mut self, sink: FrameSink) -> Result<()>;

    /// Stop frame delivery and join the delivery thread. Idempotent.
    fn stop_delivery(&mut self);
}

/// Select a camera host by configured source name.
pub fn host_from_config(cfg: &crate::config::CameraSettings) -> Result<Box<dyn CameraHost>> {
    match cfg.source.as_str() {
        "stub" => Ok(Box::new(StubCameraHost::new(StubHostConfig {
            width: cfg.width,
            height: cfg.height,
            target_fps: cfg.target_fps,
            fail_positions: Vec::new(),
        }))),
        #[cfg(feature = "device-v4l2")]
        "v4l2" => Ok(Box::new(V4l2CameraHost::new(V4l2HostConfig {
            back_device: cfg.back_device.clone(),
            front_device: cfg.front_device.clone(),
            width: cfg.width,
            height: cfg.height,
            target_fps: cfg.target_fps,
        }))),
        #[cfg(not(feature = "device-v4l2"))]
        "v4l2" => Err(anyhow!(
            "camera source 'v4l2' requires building with the device-v4l2 feature"
        )),
        other => Err(anyhow!("unknown camera source '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_flips_between_front_and_back() {
        assert_eq!(CameraPosition::Front.flipped(), CameraPosition::Back);
        assert_eq!(CameraPosition::Back.flipped(), CameraPosition::Front);
        assert_eq!(CameraPosition::Back.flipped().flipped(), CameraPosition::Back);
    }

    #[test]
    fn position_parses_case_insensitively() {
        assert_eq!(CameraPosition::parse("Front").unwrap(), CameraPosition::Front);
        assert_eq!(CameraPosition::parse("back").unwrap(), CameraPosition::Back);
        assert!(CameraPosition::parse("sideways").is_err());
    }
}
