//! Synthetic camera host.
//!
//! Always available; drives tests and the demo without hardware. Two delivery
//! modes, selected by `target_fps`:
//! - ticking (`target_fps > 0`): a delivery thread generates synthetic pixel
//!   ramps at the configured rate
//! - manual (`target_fps == 0`): tests inject frames through `StubHostHandle`
//!
//! The handle also records open/close counts and lets tests toggle simulated
//! open failures per position.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::Rng;

use super::{CameraDevice, CameraHost, CameraPosition, DeviceDescriptor, FrameSink};
use crate::frame::FramePayload;

#[derive(Clone, Debug)]
pub struct StubHostConfig {
    pub width: u32,
    pub height: u32,
    /// Frames per second for ticking mode; 0 means manual injection only.
    pub target_fps: u32,
    /// Positions whose `open` fails, simulating missing hardware.
    pub fail_positions: Vec<CameraPosition>,
}

impl Default for StubHostConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 10,
            fail_positions: Vec::new(),
        }
    }
}

struct ActiveSink {
    instance: u64,
    position: CameraPosition,
    sink: FrameSink,
}

struct HostShared {
    /// Sink of the device currently delivering, if any.
    active: Mutex<Option<ActiveSink>>,
    fail_positions: Mutex<Vec<CameraPosition>>,
    opened: AtomicU64,
    closed: AtomicU64,
    next_instance: AtomicU64,
    injected: AtomicU64,
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Synthetic camera host.
pub struct StubCameraHost {
    config: StubHostConfig,
    shared: Arc<HostShared>,
}

impl StubCameraHost {
    pub fn new(config: StubHostConfig) -> Self {
        let shared = Arc::new(HostShared {
            active: Mutex::new(None),
            fail_positions: Mutex::new(config.fail_positions.clone()),
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            next_instance: AtomicU64::new(0),
            injected: AtomicU64::new(0),
        });
        Self { config, shared }
    }

    /// Handle for injecting frames and observing device lifecycle. Any number
    /// of handles may coexist; they all share the host's state.
    pub fn handle(&self) -> StubHostHandle {
        StubHostHandle {
            shared: self.shared.clone(),
            width: self.config.width,
            height: self.config.height,
        }
    }
}

impl CameraHost for StubCameraHost {
    fn list_devices(&self) -> Vec<DeviceDescriptor> {
        [CameraPosition::Back, CameraPosition::Front]
            .into_iter()
            .map(|position| DeviceDescriptor {
                position,
                label: format!("stub {} camera", position),
            })
            .collect()
    }

    fn open(&mut self, position: CameraPosition) -> Result<Box<dyn CameraDevice>> {
        if lock_unpoisoned(&self.shared.fail_positions).contains(&position) {
            return Err(anyhow!("stub camera at position {} failed to open", position));
        }
        let instance = self.shared.next_instance.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        log::debug!("stub camera {} opened at {}", instance, position);
        Ok(Box::new(StubCamera {
            instance,
            position,
            config: self.config.clone(),
            shared: self.shared.clone(),
            worker: None,
        }))
    }
}

struct TickWorker {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

struct StubCamera {
    instance: u64,
    position: CameraPosition,
    config: StubHostConfig,
    shared: Arc<HostShared>,
    worker: Option<TickWorker>,
}

impl CameraDevice for StubCamera {
    fn start_delivery(&mut self, sink: FrameSink) -> Result<()> {
        {
            let mut active = lock_unpoisoned(&self.shared.active);
            if active.as_ref().is_some_and(|a| a.instance == self.instance) {
                return Err(anyhow!("delivery already started for this device"));
            }
            *active = Some(ActiveSink {
                instance: self.instance,
                position: self.position,
                sink: sink.clone(),
            });
        }

        if self.config.target_fps > 0 {
            let stop = Arc::new(AtomicBool::new(false));
            let stop_thread = stop.clone();
            let (width, height) = (self.config.width, self.config.height);
            let interval = Duration::from_millis(u64::from(1000 / self.config.target_fps.max(1)).max(1));
            let join = std::thread::spawn(move || {
                let mut tick: u64 = 0;
                while !stop_thread.load(Ordering::Acquire) {
                    sink(synthetic_payload(width, height, tick));
                    tick += 1;
                    std::thread::sleep(interval);
                }
            });
            self.worker = Some(TickWorker { stop, join });
        }
        Ok(())
    }

    fn stop_delivery(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            let _ = worker.join.join();
        }
        let mut active = lock_unpoisoned(&self.shared.active);
        if active.as_ref().is_some_and(|a| a.instance == self.instance) {
            *active = None;
        }
    }
}

impl Drop for StubCamera {
    fn drop(&mut self) {
        self.stop_delivery();
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        log::debug!("stub camera {} closed", self.instance);
    }
}

/// Injection and observation handle for a `StubCameraHost`.
#[derive(Clone)]
pub struct StubHostHandle {
    shared: Arc<HostShared>,
    width: u32,
    height: u32,
}

impl StubHostHandle {
    /// Deliver one synthetic frame to whichever device is currently
    /// delivering. Returns false when no device is active (the frame is
    /// dropped at the source).
    pub fn deliver_frame(&self) -> bool {
        let tick = self.shared.injected.fetch_add(1, Ordering::SeqCst);
        self.deliver_payload(synthetic_payload(self.width, self.height, tick))
    }

    /// Deliver a zero-length frame, exercising the empty-frame path.
    pub fn deliver_empty(&self) -> bool {
        self.deliver_payload(FramePayload::new(Vec::new(), self.width, self.height))
    }

    pub fn deliver_payload(&self, payload: FramePayload) -> bool {
        let sink = lock_unpoisoned(&self.shared.active)
            .as_ref()
            .map(|a| a.sink.clone());
        match sink {
            Some(sink) => {
                sink(payload);
                true
            }
            None => false,
        }
    }

    /// Position of the device currently delivering, if any.
    pub fn active_position(&self) -> Option<CameraPosition> {
        lock_unpoisoned(&self.shared.active).as_ref().map(|a| a.position)
    }

    /// Toggle simulated open failure for a position.
    pub fn set_open_failure(&self, position: CameraPosition, fail: bool) {
        let mut failures = lock_unpoisoned(&self.shared.fail_positions);
        failures.retain(|p| *p != position);
        if fail {
            failures.push(position);
        }
    }

    pub fn opened(&self) -> u64 {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// Synthetic pixel ramp with a little frame-local noise so consecutive frames
/// are never byte-identical.
fn synthetic_payload(width: u32, height: u32, tick: u64) -> FramePayload {
    let mut rng = rand::thread_rng();
    let len = (width as usize) * (height as usize) * 3;
    let mut data = vec![0u8; len];
    for (i, px) in data.iter_mut().enumerate() {
        let base = ((i as u64 + tick * 7) % 256) as u8;
        *px = base.wrapping_add(rng.gen_range(0..4));
    }
    FramePayload::new(data, width, height)
}
