//! Pearson-correlation sequencing strategy.

use gammarec_core::{EventType, RawEvent, NO_QUALITY_FACTOR};

use crate::error::Result;
use crate::strategy::SequencingStrategy;
use crate::tracker::Tracker;

/// Scores hypotheses by the Pearson correlation of energy deposit and
/// deflection angle against the position along the sequence.
///
/// Per-track scores fold into the event score as `1 - prod(1 - qf)`, so
/// one well-correlated track dominates the hypothesis ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct PearsonStrategy;

impl PearsonStrategy {
    fn folded_track_score(event: &mut RawEvent) -> Result<f64> {
        let mut remainder = 1.0;
        for track in event.tracks() {
            let score = event.track(track)?.pearson_correlation(false);
            event.track_data_mut(track)?.quality_factor = score;
            remainder *= 1.0 - score;
        }
        Ok(1.0 - remainder)
    }
}

impl SequencingStrategy for PearsonStrategy {
    fn name(&self) -> &'static str {
        "pearson"
    }

    fn evaluate_tracks(&self, tracker: &Tracker, event: &mut RawEvent) -> Result<()> {
        if event.vertex().is_some() {
            let mut remainder = 1.0;
            for track in [event.electron_track(), event.positron_track()]
                .into_iter()
                .flatten()
            {
                let score = event.track(track)?.pearson_correlation(false);
                event.track_data_mut(track)?.quality_factor = score;
                remainder *= 1.0 - score;
            }
            event.set_event_type(EventType::Pair);
            event.set_good(true);
            event.set_pair_quality_factor(1.0 - remainder);
            return Ok(());
        }

        let folded = Self::folded_track_score(event)?;
        event.set_track_quality_factor(tracker.geometry_score(event) + folded);
        event.set_pair_quality_factor(NO_QUALITY_FACTOR);
        tracker.classify_sequenced_event(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gammarec_core::{DetectorType, Hit, VolumeId};
    use nalgebra::Vector3;

    fn straight_track_event() -> (RawEvent, gammarec_core::ReseId) {
        let mut event = RawEvent::new();
        let mut previous = None;
        let mut ids = Vec::new();
        for i in 0..5 {
            let id = event.add_hit(
                Hit::new(Vector3::new(0.0, 0.0, -f64::from(i)), 100.0 + 10.0 * f64::from(i))
                    .with_detector(DetectorType::Strip2D)
                    .with_volume(VolumeId(1)),
            );
            if let Some(previous) = previous {
                event.link(previous, id);
            }
            previous = Some(id);
            ids.push(id);
        }
        event.create_tracks().unwrap();
        let track = event.tracks()[0];
        event.set_track_start(track, ids[0]).unwrap();
        event.set_track_stop(track, ids[4]).unwrap();
        (event, track)
    }

    #[test]
    fn test_straight_rising_track_score() {
        // energies rise monotonically (correlation 1), deflection angles
        // are all zero (degenerate, term drops): (2 - 1 - 0)/4
        let (mut event, track) = straight_track_event();
        let folded = PearsonStrategy::folded_track_score(&mut event).unwrap();
        let track_score = event.track_data(track).unwrap().quality_factor;
        assert_relative_eq!(track_score, 0.25, epsilon = 1e-9);
        assert_relative_eq!(folded, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_folded_score_bounded() {
        let (mut event, _) = straight_track_event();
        let folded = PearsonStrategy::folded_track_score(&mut event).unwrap();
        assert!((0.0..=1.0).contains(&folded));
    }
}
