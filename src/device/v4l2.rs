//! V4L2 camera host.
//!
//! Maps logical positions to local device nodes (e.g. back = /dev/video0,
//! front = /dev/video1) and delivers frames from a device-owned capture
//! thread. Format negotiation asks for packed RGB and falls back to whatever
//! the device reports when the request is refused.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};

use super::{CameraDevice, CameraHost, CameraPosition, DeviceDescriptor, FrameSink};
use crate::frame::FramePayload;

#[derive(Clone, Debug)]
pub struct V4l2HostConfig {
    /// Device path for the back position.
    pub back_device: String,
    /// Device path for the front position.
    pub front_device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Target frame rate; 0 leaves the device default in place.
    pub target_fps: u32,
}

impl Default for V4l2HostConfig {
    fn default() -> Self {
        Self {
            back_device: "/dev/video0".to_string(),
            front_device: "/dev/video1".to_string(),
            width: 640,
            height: 480,
            target_fps: 10,
        }
    }
}

/// V4L2 camera host.
pub struct V4l2CameraHost {
    config: V4l2HostConfig,
}

impl V4l2CameraHost {
    pub fn new(config: V4l2HostConfig) -> Self {
        Self { config }
    }

    fn device_path(&self, position: CameraPosition) -> &str {
        match position {
            CameraPosition::Back => &self.config.back_device,
            CameraPosition::Front => &self.config.front_device,
        }
    }
}

impl CameraHost for V4l2CameraHost {
    fn list_devices(&self) -> Vec<DeviceDescriptor> {
        [
            (CameraPosition::Back, self.config.back_device.clone()),
            (CameraPosition::Front, self.config.front_device.clone()),
        ]
        .into_iter()
        .filter(|(_, path)| Path::new(path).exists())
        .map(|(position, path)| DeviceDescriptor {
            position,
            label: path,
        })
        .collect()
    }

    fn open(&mut self, position: CameraPosition) -> Result<Box<dyn CameraDevice>> {
        use v4l::video::Capture;

        let path = self.device_path(position).to_string();
        let device = v4l::Device::with_path(&path)
            .with_context(|| format!("open v4l2 device {}", path))?;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("v4l2 {}: failed to set format: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("v4l2 {}: failed to set fps: {}", path, err);
            }
        }

        log::info!(
            "v4l2 camera {} opened at {} ({}x{})",
            path,
            position,
            format.width,
            format.height
        );
        Ok(Box::new(V4l2Camera {
            path,
            device: Some(device),
            width: format.width,
            height: format.height,
            worker: None,
        }))
    }
}

struct DeliveryWorker {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

struct V4l2Camera {
    path: String,
    /// Taken by the delivery thread when delivery starts.
    device: Option<v4l::Device>,
    width: u32,
    height: u32,
    worker: Option<DeliveryWorker>,
}

impl CameraDevice for V4l2Camera {
    fn start_delivery(&mut self, sink: FrameSink) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::io::traits::CaptureStream;

        let device = self
            .device
            .take()
            .ok_or_else(|| anyhow!("delivery already started for {}", self.path))?;
        let (width, height) = (self.width, self.height);
        let path = self.path.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();

        let join = std::thread::spawn(move || {
            let mut device = device;
            let mut stream =
                match v4l::prelude::MmapStream::with_buffers(&mut device, Type::VideoCapture, 4) {
                    Ok(stream) => stream,
                    Err(err) => {
                        log::error!("v4l2 {}: create buffer stream failed: {}", path, err);
                        return;
                    }
                };
            // stream.next() blocks until the next buffer; the stop flag is
            // observed between frames.
            while !stop_thread.load(Ordering::Acquire) {
                match stream.next() {
                    Ok((buf, _meta)) => sink(FramePayload::new(buf.to_vec(), width, height)),
                    Err(err) => {
                        log::warn!("v4l2 {}: frame capture failed: {}", path, err);
                        break;
                    }
                }
            }
        });

        self.worker = Some(DeliveryWorker { stop, join });
        Ok(())
    }

    fn stop_delivery(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            let _ = worker.join.join();
        }
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        self.stop_delivery();
    }
}
