//! Spearman rank-correlation sequencing strategy.

use gammarec_core::{EventType, RawEvent, ReseId, NO_QUALITY_FACTOR};

use crate::error::Result;
use crate::strategy::SequencingStrategy;
use crate::tracker::Tracker;

/// Scores hypotheses like [`PearsonStrategy`](crate::PearsonStrategy)
/// but with Spearman rank correlations, making the score robust against
/// outlier energy deposits. A designated vertex is accepted as a pair as
/// soon as both branches are scored.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankStrategy;

impl RankStrategy {
    fn folded_track_score(event: &mut RawEvent) -> Result<f64> {
        let mut remainder = 1.0;
        for track in event.tracks() {
            let score = event.track(track)?.spearman_rank_correlation();
            event.track_data_mut(track)?.quality_factor = score;
            remainder *= 1.0 - score;
        }
        Ok(1.0 - remainder)
    }
}

impl SequencingStrategy for RankStrategy {
    fn name(&self) -> &'static str {
        "rank"
    }

    fn evaluate_track(&self, event: &mut RawEvent, track: ReseId) -> Result<()> {
        let score = event.track(track)?.spearman_rank_correlation();
        event.track_data_mut(track)?.quality_factor = score;
        Ok(())
    }

    fn evaluate_tracks(&self, tracker: &Tracker, event: &mut RawEvent) -> Result<()> {
        if event.vertex().is_some() {
            let mut remainder = 1.0;
            for track in [event.electron_track(), event.positron_track()]
                .into_iter()
                .flatten()
            {
                let score = event.track(track)?.spearman_rank_correlation();
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

    fn straight_track_event() -> (RawEvent, ReseId) {
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
    fn test_rising_energies_rank_perfectly() {
        // five members stay below the angle-correlation threshold, so the
        // score is (1 - rank_correlation)/2 = 0 for rising energies
        let (mut event, track) = straight_track_event();
        let strategy = RankStrategy;
        strategy.evaluate_track(&mut event, track).unwrap();
        let score = event.track_data(track).unwrap().quality_factor;
        assert_relative_eq!(score, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_folded_score_bounded() {
        let (mut event, _) = straight_track_event();
        let folded = RankStrategy::folded_track_score(&mut event).unwrap();
        assert!((0.0..=1.0).contains(&folded));
    }
}
