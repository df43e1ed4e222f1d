//! Scripted detector for tests and the synthetic demo.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::{FaceDetection, MaskDetector, MaskStatus};

const STUB_CONFIDENCE: f32 = 0.9;

struct StubState {
    script: Mutex<VecDeque<Result<Vec<FaceDetection>>>>,
    /// When present, every `detect` call blocks until one message arrives.
    gate: Mutex<Option<Receiver<()>>>,
    calls: AtomicU64,
    completed: AtomicU64,
    cycle: bool,
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scripted detector backend.
///
/// Outcomes are served from a queue pushed by the test. When the queue is
/// empty, `new` instances report zero detections while `cycling` instances
/// rotate through a fixed set of plausible results so the synthetic demo
/// keeps producing status changes.
///
/// Clones share state, so a test can keep its own clone and script or observe
/// the instance the dispatcher owns without touching the dispatcher's lock.
#[derive(Clone)]
pub struct StubDetector {
    state: Arc<StubState>,
}

impl StubDetector {
    pub fn new() -> Self {
        Self::with_cycle(false)
    }

    pub fn cycling() -> Self {
        Self::with_cycle(true)
    }

    fn with_cycle(cycle: bool) -> Self {
        Self {
            state: Arc::new(StubState {
                script: Mutex::new(VecDeque::new()),
                gate: Mutex::new(None),
                calls: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                cycle,
            }),
        }
    }

    /// Queue the result of the next unscripted `detect` call.
    pub fn push_result(&self, faces: Vec<FaceDetection>) {
        lock_unpoisoned(&self.state.script).push_back(Ok(faces));
    }

    /// Queue a detection failure.
    pub fn push_error(&self, message: &str) {
        lock_unpoisoned(&self.state.script).push_back(Err(anyhow!("{}", message)));
    }

    /// Block subsequent `detect` calls until a message is sent on the paired
    /// channel; used to hold a detection in flight.
    pub fn set_gate(&self, gate: Receiver<()>) {
        *lock_unpoisoned(&self.state.gate) = Some(gate);
    }

    pub fn clear_gate(&self) {
        *lock_unpoisoned(&self.state.gate) = None;
    }

    /// Number of `detect` calls entered so far.
    pub fn calls(&self) -> u64 {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Number of `detect` calls that have returned.
    pub fn completed(&self) -> u64 {
        self.state.completed.load(Ordering::SeqCst)
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<FaceDetection>> {
        let call = self.state.calls.fetch_add(1, Ordering::SeqCst);

        {
            let gate = lock_unpoisoned(&self.state.gate);
            if let Some(rx) = gate.as_ref() {
                let _ = rx.recv();
            }
        }

        let scripted = lock_unpoisoned(&self.state.script).pop_front();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None if self.state.cycle => Ok(cycle_outcome(call)),
            None => Ok(Vec::new()),
        };

        self.state.completed.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

fn face(face_id: usize, status: MaskStatus) -> FaceDetection {
    FaceDetection {
        face_id,
        status,
        confidence: STUB_CONFIDENCE,
    }
}

fn cycle_outcome(call: u64) -> Vec<FaceDetection> {
    match call % 4 {
        0 => Vec::new(),
        1 => vec![face(0, MaskStatus::Mask)],
        2 => vec![face(0, MaskStatus::Mask), face(1, MaskStatus::NoMask)],
        _ => vec![face(0, MaskStatus::NoMask)],
    }
}
