//! Full-pipeline pair reconstruction with the Kalman strategies.

use std::sync::Arc;

use nalgebra::Vector3;

use gammarec_core::{
    DetectorType, EventType, Hit, LayeredGeometry, RawEvent, RawEventList, VolumeId,
};
use gammarec_tracking::{
    Kalman2DStrategy, Kalman3DStrategy, KalmanConfig, SequencingStrategy, Tracker,
    TrackingConfig,
};

fn config() -> KalmanConfig {
    KalmanConfig::new().with_sigma(0.05)
}

fn tracker(strategy: Box<dyn SequencingStrategy>) -> Tracker {
    let mut geo = LayeredGeometry::new(0.0, 1.0);
    geo.register_volume(VolumeId(1), 0);
    Tracker::new(Arc::new(geo), TrackingConfig::default(), strategy).unwrap()
}

fn hit(x: f64, y: f64, z: f64) -> Hit {
    Hit::new(Vector3::new(x, y, z), 200.0)
        .with_detector(DetectorType::Strip2D)
        .with_volume(VolumeId(1))
}

/// An isolated topmost hit over six doubly occupied layers, so the
/// vertex search succeeds on its own. One branch wiggles in both
/// projections, the other is perfectly straight.
fn conversion_event() -> RawEvent {
    let mut event = RawEvent::new();
    event.add_hit(hit(0.0, 0.0, 0.0));
    let wiggly_x = [-0.25, -0.62, -0.88, -1.24, -1.45, -1.80];
    let wiggly_y = [0.08, 0.22, 0.28, 0.44, 0.50, 0.64];
    let straight_x = [0.30, 0.58, 0.86, 1.14, 1.42, 1.70];
    let straight_y = [-0.10, -0.20, -0.30, -0.40, -0.50, -0.60];
    for i in 0..6 {
        let z = -(1.0 + i as f64);
        event.add_hit(hit(wiggly_x[i], wiggly_y[i], z));
        event.add_hit(hit(straight_x[i], straight_y[i], z));
    }
    event
}

fn assert_reconstructed_pair(list: &RawEventList) {
    let best = list.best_try().unwrap();
    assert_eq!(best.event_type(), EventType::Pair);
    assert!(best.is_good());
    assert!(best.vertex().is_some());
    assert!(best.pair_quality_factor().is_finite());
    assert!(best.pair_quality_factor() >= 0.0);

    let electron = best.electron_track().unwrap();
    let positron = best.positron_track().unwrap();
    assert!(best.track_data(electron).unwrap().children.len() > 2);
    assert!(best.track_data(positron).unwrap().children.len() > 2);
    let down = best.track_data(electron).unwrap().fixed_direction.unwrap();
    assert!(down.z < 0.0);
}

#[test]
fn test_kalman2d_pair_end_to_end() {
    let tracker = tracker(Box::new(Kalman2DStrategy::new(config())));
    let mut list = RawEventList::from_event(conversion_event());
    tracker.analyze(&mut list).unwrap();
    assert_reconstructed_pair(&list);
}

#[test]
fn test_kalman3d_pair_end_to_end() {
    let tracker = tracker(Box::new(Kalman3DStrategy::new(config())));
    let mut list = RawEventList::from_event(conversion_event());
    tracker.analyze(&mut list).unwrap();
    assert_reconstructed_pair(&list);
}

#[test]
fn test_evaluation_preserves_pair_scores() {
    // the chi-square scores assigned during pair tracking must survive
    // a later evaluation pass untouched
    let strategy = Kalman2DStrategy::new(config());
    let tracker = tracker(Box::new(Kalman2DStrategy::new(config())));
    let mut list = RawEventList::from_event(conversion_event());
    tracker.analyze(&mut list).unwrap();

    let event = list.get_mut(0).unwrap();
    assert!(event.vertex().is_some());
    let before = event.pair_quality_factor();
    strategy.evaluate_tracks(&tracker, event).unwrap();
    assert_eq!(event.pair_quality_factor(), before);
}

#[test]
fn test_no_vertex_falls_through_to_compton() {
    let tracker = tracker(Box::new(Kalman2DStrategy::new(config())));
    let mut event = RawEvent::new();
    event.add_hit(hit(0.0, 0.0, 0.0));
    event.add_hit(hit(0.3, 0.1, -1.0));
    event.add_hit(hit(0.2, 0.5, -2.0));
    let mut list = RawEventList::from_event(event);
    tracker.analyze(&mut list).unwrap();

    let best = list.get(0).unwrap();
    assert_eq!(best.event_type(), EventType::Compton);
    assert!(best.is_good());
    assert!(best.track_quality_factor().is_finite());
}
