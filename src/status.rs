//! Status aggregation and observer notification.
//!
//! Converts raw per-frame detection outcomes into a stable, rate-limited,
//! human-readable status. Emission requires both a text change against the
//! last *emitted* text and an elapsed debounce window; candidates failing
//! either check are dropped, never queued. The next admitted outcome is
//! compared against the still-current emitted text, not the dropped one.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::detect::{FaceDetection, MaskStatus};

/// Default minimum interval between two status emissions.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Status text shown before the first detection of a session.
pub const WAITING_STATUS: &str = "waiting…";
const NO_FACE_STATUS: &str = "no face found";
const ANALYSIS_ERROR_STATUS: &str = "analysis error";

/// Boundary consumed by front-ends.
///
/// Callbacks arrive synchronously on pipeline threads and must not block for
/// long; marshaling to a presentation context is the observer's job.
pub trait StatusObserver: Send + Sync {
    fn on_status_changed(&self, text: &str);
    fn on_access_denied(&self);
}

/// Raw per-frame outcome forwarded by the dispatcher.
#[derive(Clone, Debug)]
pub enum DetectionOutcome {
    Faces(Vec<FaceDetection>),
    AnalysisError,
}

struct Emitted {
    text: String,
    at: Option<Instant>,
}

/// Debounced status aggregator.
///
/// Text and timestamp of the last emission are updated together under one
/// lock, so two near-simultaneous outcomes cannot both pass the check.
pub struct StatusAggregator {
    observer: Arc<dyn StatusObserver>,
    debounce: Duration,
    emitted: Mutex<Emitted>,
}

impl StatusAggregator {
    pub fn new(observer: Arc<dyn StatusObserver>, debounce: Duration) -> Self {
        Self {
            observer,
            debounce,
            emitted: Mutex::new(Emitted {
                text: WAITING_STATUS.to_string(),
                at: None,
            }),
        }
    }

    /// Restore the initial waiting status; called on session (re)start.
    ///
    /// The emission clock is cleared, so the first status change after a
    /// restart is not debounced away.
    pub fn reset(&self) {
        {
            let mut emitted = self.lock_emitted();
            emitted.text = WAITING_STATUS.to_string();
            emitted.at = None;
        }
        self.observer.on_status_changed(WAITING_STATUS);
    }

    /// Record one raw outcome observed now.
    pub fn on_outcome(&self, outcome: DetectionOutcome) {
        self.on_outcome_at(outcome, Instant::now());
    }

    /// Record one raw outcome with an explicit observation timestamp.
    pub fn on_outcome_at(&self, outcome: DetectionOutcome, at: Instant) {
        let text = synthesize(&outcome);
        {
            let mut emitted = self.lock_emitted();
            if emitted.text == text {
                return;
            }
            if let Some(last) = emitted.at {
                if at.saturating_duration_since(last) < self.debounce {
                    log::trace!("status change dropped inside debounce window");
                    return;
                }
            }
            emitted.text = text.clone();
            emitted.at = Some(at);
        }
        // Notified outside the lock; completions are already serialized
        // upstream by the dispatcher's at-most-one-in-flight policy.
        self.observer.on_status_changed(&text);
    }

    /// Last emitted status text.
    pub fn current_text(&self) -> String {
        self.lock_emitted().text.clone()
    }

    fn lock_emitted(&self) -> MutexGuard<'_, Emitted> {
        self.emitted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn synthesize(outcome: &DetectionOutcome) -> String {
    match outcome {
        DetectionOutcome::AnalysisError => ANALYSIS_ERROR_STATUS.to_string(),
        DetectionOutcome::Faces(faces) if faces.is_empty() => NO_FACE_STATUS.to_string(),
        DetectionOutcome::Faces(faces) => {
            let statuses: Vec<&str> = faces
                .iter()
                .map(|face| match face.status {
                    MaskStatus::Mask => "wearing mask",
                    MaskStatus::NoMask => "no mask",
                })
                .collect();
            format!("{} face(s): {}", faces.len(), statuses.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faces(statuses: &[MaskStatus]) -> DetectionOutcome {
        DetectionOutcome::Faces(
            statuses
                .iter()
                .enumerate()
                .map(|(face_id, status)| FaceDetection {
                    face_id,
                    status: *status,
                    confidence: 0.9,
                })
                .collect(),
        )
    }

    #[test]
    fn synthesizes_summary_texts() {
        assert_eq!(synthesize(&faces(&[])), "no face found");
        assert_eq!(
            synthesize(&faces(&[MaskStatus::Mask])),
            "1 face(s): wearing mask"
        );
        assert_eq!(
            synthesize(&faces(&[MaskStatus::Mask, MaskStatus::NoMask])),
            "2 face(s): wearing mask, no mask"
        );
        assert_eq!(
            synthesize(&DetectionOutcome::AnalysisError),
            "analysis error"
        );
    }
}
