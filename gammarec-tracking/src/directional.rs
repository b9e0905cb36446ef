//! Sequencing strategy for detectors with intrinsic direction
//! measurement.

use tracing::debug;

use gammarec_core::{RawEvent, RawEventList, ReseId};

use crate::error::Result;
use crate::strategy::SequencingStrategy;
use crate::tracker::Tracker;

/// Trusts externally measured electron directions attached to the event.
///
/// Hypotheses are generated the usual way, but every track containing a
/// measured element is anchored there: the element becomes the track
/// start, the measured direction overrides the geometric one, and the
/// track scores perfectly. Events without measurements degrade to the
/// default behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionalStrategy;

impl DirectionalStrategy {
    fn apply_measurements(event: &mut RawEvent) -> Result<()> {
        let measurements: Vec<_> = event.measurements().to_vec();
        for measurement in measurements {
            let Some(track) = event
                .tracks()
                .into_iter()
                .find(|&track| {
                    event
                        .track_data(track)
                        .is_ok_and(|data| data.children.contains(&measurement.rese))
                })
            else {
                continue;
            };
            if event.n_links(measurement.rese) > 1 {
                debug!(
                    event = event.event_id(),
                    rese = %measurement.rese,
                    "measured element is not a chain end, ignoring measurement"
                );
                continue;
            }
            event.set_track_start(track, measurement.rese)?;
            event.track_data_mut(track)?.fixed_direction = Some(measurement.direction);
            event.set_start_point(Some(measurement.rese));
        }
        Ok(())
    }
}

impl SequencingStrategy for DirectionalStrategy {
    fn name(&self) -> &'static str {
        "directional"
    }

    fn track_comptons(
        &self,
        tracker: &Tracker,
        event: &RawEvent,
    ) -> Result<Option<RawEventList>> {
        let hypotheses = tracker.default_track_comptons(event)?;
        if event.measurements().is_empty() {
            return Ok(hypotheses);
        }
        let Some(mut hypotheses) = hypotheses else {
            return Ok(None);
        };
        for hypothesis in hypotheses.iter_mut() {
            Self::apply_measurements(hypothesis)?;
        }
        Ok(Some(hypotheses))
    }

    fn evaluate_track(&self, event: &mut RawEvent, track: ReseId) -> Result<()> {
        // the measured direction is authoritative
        event.track_data_mut(track)?.quality_factor = 1.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gammarec_core::{DetectorType, DirectionalMeasurement, Hit, VolumeId};
    use nalgebra::Vector3;

    fn hit(z: f64, energy: f64) -> Hit {
        Hit::new(Vector3::new(0.0, 0.0, z), energy)
            .with_detector(DetectorType::Strip3DDirectional)
            .with_volume(VolumeId(1))
    }

    #[test]
    fn test_measurement_anchors_track() {
        let mut event = RawEvent::new();
        let a = event.add_hit(hit(0.0, 100.0));
        let b = event.add_hit(hit(-1.0, 200.0));
        let c = event.add_hit(hit(-2.0, 300.0));
        event.link(a, b);
        event.link(b, c);
        event.create_tracks().unwrap();

        let direction = Vector3::new(0.0, 0.0, -1.0);
        event.add_measurement(DirectionalMeasurement { rese: a, direction });

        DirectionalStrategy::apply_measurements(&mut event).unwrap();
        let track = event.tracks()[0];
        let data = event.track_data(track).unwrap();
        assert_eq!(data.start, Some(a));
        assert_eq!(data.fixed_direction, Some(direction));
        assert_eq!(event.start_point(), Some(a));
    }

    #[test]
    fn test_interior_measurement_is_ignored() {
        let mut event = RawEvent::new();
        let a = event.add_hit(hit(0.0, 100.0));
        let b = event.add_hit(hit(-1.0, 200.0));
        let c = event.add_hit(hit(-2.0, 300.0));
        event.link(a, b);
        event.link(b, c);
        event.create_tracks().unwrap();

        event.add_measurement(DirectionalMeasurement {
            rese: b,
            direction: Vector3::new(0.0, 0.0, -1.0),
        });

        DirectionalStrategy::apply_measurements(&mut event).unwrap();
        let track = event.tracks()[0];
        assert_eq!(event.track_data(track).unwrap().start, None);
    }

    #[test]
    fn test_perfect_track_score() {
        let mut event = RawEvent::new();
        let a = event.add_hit(hit(0.0, 100.0));
        let b = event.add_hit(hit(-1.0, 200.0));
        event.link(a, b);
        event.create_tracks().unwrap();
        let track = event.tracks()[0];

        let strategy = DirectionalStrategy;
        strategy.evaluate_track(&mut event, track).unwrap();
        assert_eq!(event.track_data(track).unwrap().quality_factor, 1.0);
    }
}
