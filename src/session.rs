//! Capture-session controller.
//!
//! Owns the camera device and the session state machine. All configuration
//! operations run on one control thread fed by a command channel, which makes
//! "one configuration operation in flight" structural: commands are processed
//! strictly one at a time, never interleaved. Public methods enqueue a
//! command and return without blocking the caller; completion is observable
//! through `state()`/`generation()` and the observer callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};

use crate::device::{CameraDevice, CameraHost, CameraPosition, FrameSink};
use crate::dispatch::FrameDispatcher;
use crate::frame::Frame;
use crate::status::{StatusAggregator, StatusObserver};

/// Capture-session lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configuring,
    Running,
    SwitchingDevice,
    Stopped,
}

enum Command {
    Configure { access_granted: bool },
    SwitchCamera,
    Stop,
    Shutdown,
}

struct SessionShared {
    state: Mutex<SessionState>,
    position: Mutex<CameraPosition>,
    /// Monotonic device generation; frames are tagged with it at acquisition
    /// time and results from superseded generations are fenced downstream.
    generation: Arc<AtomicU64>,
    /// Switch requests not yet folded into a reconfiguration.
    pending_switches: AtomicU64,
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to the capture-session control thread.
pub struct SessionController {
    commands: Sender<Command>,
    shared: Arc<SessionShared>,
    join: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Spawn the control thread.
    ///
    /// `generation` is the same cell handed to the frame dispatcher; the
    /// controller is its only writer.
    pub fn spawn(
        host: Box<dyn CameraHost>,
        dispatcher: FrameDispatcher,
        aggregator: Arc<StatusAggregator>,
        observer: Arc<dyn StatusObserver>,
        generation: Arc<AtomicU64>,
        initial_position: CameraPosition,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            state: Mutex::new(SessionState::Idle),
            position: Mutex::new(initial_position),
            generation,
            pending_switches: AtomicU64::new(0),
        });
        let (commands, receiver) = mpsc::channel();
        let control = ControlLoop {
            host,
            dispatcher,
            aggregator,
            observer,
            shared: shared.clone(),
            device: None,
        };
        let join = std::thread::spawn(move || control.run(receiver));
        Self {
            commands,
            shared,
            join: Some(join),
        }
    }

    /// Start (or restart) the session.
    ///
    /// With access denied the session stops and the observer is told; with
    /// access granted the device at the active position is opened, frame
    /// delivery attached, and the generation bumped.
    pub fn configure(&self, access_granted: bool) {
        self.send(Command::Configure { access_granted });
    }

    /// Request a camera switch. Valid only while `Running`; requests arriving
    /// while a switch is already pending are coalesced to the net final
    /// position rather than queued.
    pub fn switch_camera(&self) {
        self.shared.pending_switches.fetch_add(1, Ordering::AcqRel);
        self.send(Command::SwitchCamera);
    }

    /// Stop frame delivery and release the device. Idempotent.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn state(&self) -> SessionState {
        *lock_unpoisoned(&self.shared.state)
    }

    pub fn active_position(&self) -> CameraPosition {
        *lock_unpoisoned(&self.shared.position)
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Stop the session and join the control thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.send(Command::Stop);
        self.send(Command::Shutdown);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("session control thread panicked"))?;
        }
        Ok(())
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::warn!("session control thread is gone; command dropped");
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

struct ControlLoop {
    host: Box<dyn CameraHost>,
    dispatcher: FrameDispatcher,
    aggregator: Arc<StatusAggregator>,
    observer: Arc<dyn StatusObserver>,
    shared: Arc<SessionShared>,
    device: Option<Box<dyn CameraDevice>>,
}

impl ControlLoop {
    fn run(mut self, commands: Receiver<Command>) {
        while let Ok(command) = commands.recv() {
            match command {
                Command::Configure { access_granted } => self.handle_configure(access_granted),
                Command::SwitchCamera => self.handle_switch(),
                Command::Stop => self.handle_stop(),
                Command::Shutdown => break,
            }
        }
        self.teardown();
    }

    fn handle_configure(&mut self, access_granted: bool) {
        if !access_granted {
            self.teardown();
            self.set_state(SessionState::Stopped);
            log::info!("camera access denied; session stopped");
            self.observer.on_access_denied();
            return;
        }

        self.set_state(SessionState::Configuring);
        // Re-configuring from Running releases the active device first.
        self.teardown();
        self.aggregator.reset();

        let position = self.position();
        match self.open_and_start(position) {
            Ok(()) => self.set_state(SessionState::Running),
            Err(err) => {
                log::warn!("configure failed at position {}: {:#}", position, err);
                self.set_state(SessionState::Idle);
            }
        }
    }

    fn handle_switch(&mut self) {
        let pending = self.shared.pending_switches.swap(0, Ordering::AcqRel);
        if pending == 0 {
            // Already folded into an earlier switch.
            return;
        }
        if self.state() != SessionState::Running {
            debug_assert!(
                false,
                "switch_camera while session is {:?}",
                self.state()
            );
            log::warn!("switch_camera ignored: session is {:?}", self.state());
            return;
        }
        if pending % 2 == 0 {
            log::debug!(
                "coalesced {} switch requests back to the current position",
                pending
            );
            return;
        }

        let target = self.position().flipped();
        self.set_state(SessionState::SwitchingDevice);
        self.teardown();
        self.set_position(target);
        match self.open_and_start(target) {
            Ok(()) => self.set_state(SessionState::Running),
            Err(err) => {
                log::error!("switch to {} failed: {:#}", target, err);
                self.set_state(SessionState::Idle);
            }
        }
    }

    fn handle_stop(&mut self) {
        if self.state() == SessionState::Stopped {
            return;
        }
        self.teardown();
        self.set_state(SessionState::Stopped);
        log::info!("capture session stopped");
    }

    fn open_and_start(&mut self, position: CameraPosition) -> Result<()> {
        let mut device = self.host.open(position)?;

        // Frames are tagged with the generation this device belongs to; the
        // tag must be current before the first frame can arrive.
        let generation = self.shared.generation.load(Ordering::Acquire) + 1;
        let dispatcher = self.dispatcher.clone();
        let sink: FrameSink =
            Arc::new(move |payload| dispatcher.on_frame(Frame::new(payload, generation)));
        self.shared.generation.store(generation, Ordering::Release);

        device.start_delivery(sink)?;
        self.device = Some(device);
        log::info!("camera {} delivering (generation {})", position, generation);
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.stop_delivery();
            // Dropping the handle releases the device.
        }
    }

    fn state(&self) -> SessionState {
        *lock_unpoisoned(&self.shared.state)
    }

    fn set_state(&self, state: SessionState) {
        *lock_unpoisoned(&self.shared.state) = state;
    }

    fn position(&self) -> CameraPosition {
        *lock_unpoisoned(&self.shared.position)
    }

    fn set_position(&self, position: CameraPosition) {
        *lock_unpoisoned(&self.shared.position) = position;
    }
}
