//! Status aggregator properties, driven with explicit timestamps.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use maskwatch::{
    DetectionOutcome, FaceDetection, MaskStatus, StatusAggregator, StatusObserver, WAITING_STATUS,
};

const WINDOW: Duration = Duration::from_millis(500);

#[derive(Default)]
struct Recorder {
    statuses: Mutex<Vec<String>>,
}

impl Recorder {
    fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }
}

impl StatusObserver for Recorder {
    fn on_status_changed(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }

    fn on_access_denied(&self) {}
}

fn aggregator() -> (Arc<Recorder>, StatusAggregator) {
    let recorder = Arc::new(Recorder::default());
    let observer: Arc<dyn StatusObserver> = recorder.clone();
    (recorder, StatusAggregator::new(observer, WINDOW))
}

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
fn zero_faces_emit_no_face_found() {
    let (recorder, aggregator) = aggregator();
    aggregator.on_outcome_at(faces(&[]), Instant::now());

    assert_eq!(recorder.statuses(), vec!["no face found".to_string()]);
}

#[test]
fn single_masked_face_emits_once() {
    let (recorder, aggregator) = aggregator();
    let t0 = Instant::now();

    aggregator.on_outcome_at(faces(&[MaskStatus::Mask]), t0);
    // Identical result inside the window: no new emission.
    aggregator.on_outcome_at(faces(&[MaskStatus::Mask]), t0 + Duration::from_millis(100));
    // Identical result outside the window: still no new emission.
    aggregator.on_outcome_at(faces(&[MaskStatus::Mask]), t0 + Duration::from_secs(1));

    assert_eq!(recorder.statuses(), vec!["1 face(s): wearing mask".to_string()]);
}

#[test]
fn two_faces_are_listed_in_detection_order() {
    let (recorder, aggregator) = aggregator();
    aggregator.on_outcome_at(faces(&[MaskStatus::Mask, MaskStatus::NoMask]), Instant::now());

    assert_eq!(
        recorder.statuses(),
        vec!["2 face(s): wearing mask, no mask".to_string()]
    );
}

#[test]
fn changes_inside_the_window_are_dropped_not_queued() {
    let (recorder, aggregator) = aggregator();
    let t0 = Instant::now();

    aggregator.on_outcome_at(faces(&[MaskStatus::Mask]), t0);
    // Would change the text, but falls inside the window: dropped.
    aggregator.on_outcome_at(faces(&[MaskStatus::NoMask]), t0 + Duration::from_millis(200));
    // The dropped candidate is not re-emitted once the window elapses.
    assert_eq!(recorder.statuses().len(), 1);

    // The next admitted outcome is compared against the emitted text.
    aggregator.on_outcome_at(faces(&[MaskStatus::NoMask]), t0 + Duration::from_millis(600));
    assert_eq!(
        recorder.statuses(),
        vec![
            "1 face(s): wearing mask".to_string(),
            "1 face(s): no mask".to_string(),
        ]
    );
}

#[test]
fn detector_failure_emits_fixed_error_text_then_recovers() {
    let (recorder, aggregator) = aggregator();
    let t0 = Instant::now();

    aggregator.on_outcome_at(faces(&[MaskStatus::Mask]), t0);
    aggregator.on_outcome_at(DetectionOutcome::AnalysisError, t0 + Duration::from_millis(600));
    aggregator.on_outcome_at(faces(&[MaskStatus::Mask]), t0 + Duration::from_millis(1200));

    assert_eq!(
        recorder.statuses(),
        vec![
            "1 face(s): wearing mask".to_string(),
            "analysis error".to_string(),
            "1 face(s): wearing mask".to_string(),
        ]
    );
}

#[test]
fn at_most_one_emission_per_window() {
    let (recorder, aggregator) = aggregator();
    let t0 = Instant::now();

    // Alternating outcomes every 100 ms for one second.
    for i in 0..10u64 {
        let outcome = if i % 2 == 0 {
            faces(&[MaskStatus::Mask])
        } else {
            faces(&[MaskStatus::NoMask])
        };
        aggregator.on_outcome_at(outcome, t0 + Duration::from_millis(i * 100));
    }

    let statuses = recorder.statuses();
    assert!(statuses.len() <= 3, "emitted {} times: {:?}", statuses.len(), statuses);
    // Consecutive emissions never repeat the same text.
    for pair in statuses.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[test]
fn reset_restores_waiting_and_clears_the_emission_clock() {
    let (recorder, aggregator) = aggregator();
    let t0 = Instant::now();

    aggregator.on_outcome_at(faces(&[MaskStatus::Mask]), t0);
    aggregator.reset();
    assert_eq!(aggregator.current_text(), WAITING_STATUS);

    // Immediately after a reset the next change is not debounced away.
    aggregator.on_outcome_at(faces(&[]), t0 + Duration::from_millis(1));

    assert_eq!(
        recorder.statuses(),
        vec![
            "1 face(s): wearing mask".to_string(),
            WAITING_STATUS.to_string(),
            "no face found".to_string(),
        ]
    );
}
