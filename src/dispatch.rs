//! Frame dispatcher.
//!
//! Sits between the device's delivery thread and the detector:
//! - admits at most one frame at a time; excess frames are dropped, never
//!   queued, so processing rate is bounded by detector latency rather than
//!   capture rate
//! - runs the detector on a worker thread so delivery is never blocked
//! - fences results by generation so a camera switch mid-flight cannot leak
//!   results from the superseded device
//! - converts detector failures into an analysis-error signal

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::detect::MaskDetector;
use crate::frame::Frame;
use crate::status::{DetectionOutcome, StatusAggregator};

/// Backpressured frame → detector dispatch. Cheap to clone; clones share the
/// in-flight flag.
#[derive(Clone)]
pub struct FrameDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    detector: Arc<Mutex<dyn MaskDetector>>,
    aggregator: Arc<StatusAggregator>,
    /// Session's current generation; the session controller is the only
    /// writer.
    current_generation: Arc<AtomicU64>,
    /// Set while one detection is running.
    in_flight: AtomicBool,
}

impl FrameDispatcher {
    pub fn new(
        detector: Arc<Mutex<dyn MaskDetector>>,
        aggregator: Arc<StatusAggregator>,
        current_generation: Arc<AtomicU64>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                detector,
                aggregator,
                current_generation,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Frame-delivery entry point, invoked on the device's delivery thread,
    /// potentially concurrently with session reconfiguration.
    pub fn on_frame(&self, frame: Frame) {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::trace!("frame dropped: detection already in flight");
            return;
        }
        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || inner.process(frame));
    }
}

impl DispatcherInner {
    fn process(&self, frame: Frame) {
        let outcome = if frame.is_empty() {
            // Malformed/empty frames count as zero detections, not errors.
            Ok(Vec::new())
        } else {
            match self.detector.lock() {
                Ok(mut detector) => detector.detect(frame.data(), frame.width(), frame.height()),
                Err(_) => Err(anyhow::anyhow!("detector lock poisoned")),
            }
        };

        let current = self.current_generation.load(Ordering::Acquire);
        if frame.generation() == current {
            match outcome {
                Ok(faces) => self.aggregator.on_outcome(DetectionOutcome::Faces(faces)),
                Err(err) => {
                    log::warn!("detection failed: {:#}", err);
                    self.aggregator.on_outcome(DetectionOutcome::AnalysisError);
                }
            }
        } else {
            log::debug!(
                "discarding result from superseded generation {} (current {})",
                frame.generation(),
                current
            );
        }

        // Cleared only after the result has been forwarded or discarded; this
        // serializes completions within a generation.
        self.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{FaceDetection, MaskStatus, StubDetector};
    use crate::frame::FramePayload;
    use crate::status::StatusObserver;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<String>>,
    }

    impl StatusObserver for Recorder {
        fn on_status_changed(&self, text: &str) {
            self.statuses.lock().unwrap().push(text.to_string());
        }

        fn on_access_denied(&self) {}
    }

    fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out waiting for {}", what);
    }

    fn frame(generation: u64) -> Frame {
        Frame::new(FramePayload::new(vec![0u8; 12], 2, 2), generation)
    }

    #[test]
    fn forwards_fresh_results_to_the_aggregator() {
        let recorder = Arc::new(Recorder::default());
        let aggregator = Arc::new(StatusAggregator::new(recorder.clone(), Duration::ZERO));
        let stub = StubDetector::new();
        stub.push_result(vec![FaceDetection {
            face_id: 0,
            status: MaskStatus::Mask,
            confidence: 0.9,
        }]);
        let generation = Arc::new(AtomicU64::new(1));
        let dispatcher = FrameDispatcher::new(
            Arc::new(Mutex::new(stub.clone())),
            aggregator,
            generation,
        );

        dispatcher.on_frame(frame(1));
        wait_until("status emission", || {
            recorder
                .statuses
                .lock()
                .unwrap()
                .contains(&"1 face(s): wearing mask".to_string())
        });
    }

    #[test]
    fn discards_results_from_superseded_generations() {
        let recorder = Arc::new(Recorder::default());
        let aggregator = Arc::new(StatusAggregator::new(recorder.clone(), Duration::ZERO));
        let stub = StubDetector::new();
        stub.push_result(vec![FaceDetection {
            face_id: 0,
            status: MaskStatus::Mask,
            confidence: 0.9,
        }]);
        let generation = Arc::new(AtomicU64::new(2));
        let dispatcher = FrameDispatcher::new(
            Arc::new(Mutex::new(stub.clone())),
            aggregator,
            generation,
        );

        // Tagged with generation 1, current is 2.
        dispatcher.on_frame(frame(1));
        wait_until("detection completion", || stub.completed() == 1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(recorder.statuses.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_frames_skip_the_detector() {
        let recorder = Arc::new(Recorder::default());
        let aggregator = Arc::new(StatusAggregator::new(recorder.clone(), Duration::ZERO));
        let stub = StubDetector::new();
        let generation = Arc::new(AtomicU64::new(1));
        let dispatcher = FrameDispatcher::new(
            Arc::new(Mutex::new(stub.clone())),
            aggregator,
            generation,
        );

        dispatcher.on_frame(Frame::new(FramePayload::new(Vec::new(), 2, 2), 1));
        wait_until("no-face status", || {
            recorder
                .statuses
                .lock()
                .unwrap()
                .contains(&"no face found".to_string())
        });
        assert_eq!(stub.calls(), 0);
    }
}
