//! Bayesian sequencing strategy backed by trained response histograms.

use std::path::Path;

use nalgebra::Vector3;
use tracing::{debug, warn};

use gammarec_core::{RawEvent, ReseId, NO_QUALITY_FACTOR};
use gammarec_response::{ResponseHistogram, TrackResponse};

use crate::error::{Error, Result};
use crate::strategy::SequencingStrategy;
use crate::tracker::Tracker;

/// Good-count threshold below which a segment lookup is discarded.
const MIN_ENTRIES_GOOD: f64 = 1.0;

/// Bad-count threshold below which a segment lookup is discarded.
const MIN_ENTRIES_BAD: f64 = 10.0;

/// Scores sequence hypotheses with likelihood ratios from a trained
/// response set.
///
/// Each track segment (start, central, stop — or the dual case for
/// two-site tracks) looks up good and bad counts binned in the segment
/// kinematics; the per-segment odds ratios multiply into a track ratio,
/// folded with the overall good/bad prior. The event score is
/// `1 - prod(track_ratio/(1+track_ratio))`, so 0 is best and the
/// candidate list sorts ascending, opposite to the default.
pub struct BayesianStrategy {
    response: TrackResponse,
    file_name: String,
}

impl BayesianStrategy {
    /// Loads the response set anchored at the `.t.goodbad.rsp` file and
    /// validates its shape.
    pub fn new(anchor: &Path) -> Result<Self> {
        let response = TrackResponse::load(anchor)?;

        let expected: [(&ResponseHistogram, usize); 9] = [
            (&response.goodbad, 1),
            (&response.good_start, 3),
            (&response.bad_start, 3),
            (&response.good_central, 5),
            (&response.bad_central, 5),
            (&response.good_stop, 2),
            (&response.bad_stop, 2),
            (&response.good_dual, 3),
            (&response.bad_dual, 3),
        ];
        for (histogram, dimension) in expected {
            if histogram.dimension() != dimension {
                return Err(Error::Config(format!(
                    "response histogram {} has {} axes, expected {}",
                    histogram.name(),
                    histogram.dimension(),
                    dimension
                )));
            }
            if histogram.sum() == 0.0 {
                return Err(Error::Config(format!(
                    "response histogram {} is empty",
                    histogram.name()
                )));
            }
        }

        Ok(Self {
            response,
            file_name: anchor.display().to_string(),
        })
    }

    /// Angle of the segment direction against the layer normal, folded
    /// into the upper hemisphere, in degrees.
    fn angle_in(from: Vector3<f64>, to: Vector3<f64>) -> f64 {
        let mut angle = gammarec_core::math::angle_between(&(to - from), &Vector3::z());
        if angle > std::f64::consts::FRAC_PI_2 {
            angle = std::f64::consts::PI - angle;
        }
        angle.to_degrees()
    }

    /// Scattering angle at the central element, in degrees.
    fn angle_out_theta(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> f64 {
        gammarec_core::math::angle_between(&(b - a), &(c - b)).to_degrees()
    }

    /// Azimuthal scattering angle around the incoming direction, in
    /// degrees.
    fn angle_out_phi(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> f64 {
        let incoming = b - a;
        let e1 = incoming.cross(&Vector3::z());
        let e2 = incoming.cross(&(c - b));
        gammarec_core::math::angle_between(&e1, &e2).to_degrees()
    }

    /// Odds ratio of the track being correctly sequenced, in (0, 1);
    /// 0 when no segment had sufficient statistics.
    fn sequence_probability(&self, event: &RawEvent, track: ReseId) -> Result<f64> {
        let view = event.track(track)?;
        let members = view.ordered_members()?;
        let position = |id: ReseId| {
            event
                .rese(id)
                .map_or(Vector3::zeros(), |rese| rese.position)
        };
        let energy = |id: ReseId| event.rese(id).map_or(0.0, |rese| rese.energy);
        let count = |histogram: &ResponseHistogram, values: &[f64]| {
            histogram.get(values).unwrap_or(0.0)
        };

        let mut etot = event.rese(track).map_or(0.0, |rese| rese.energy);
        let mut good_bad_ratio = 1.0;
        let mut points_with_statistics = 0u32;

        if members.len() == 2 {
            let edep = energy(members[0]);
            let angle_in = Self::angle_in(position(members[0]), position(members[1]));
            let values = [etot, angle_in, edep];
            let n_good = self.response.good_dual.get_interpolated(&values).unwrap_or(0.0);
            let n_bad = self.response.bad_dual.get_interpolated(&values).unwrap_or(0.0);
            if n_good >= MIN_ENTRIES_GOOD && n_bad >= MIN_ENTRIES_BAD {
                good_bad_ratio *= n_good * self.response.bad_dual.sum()
                    / (n_bad * self.response.good_dual.sum());
                points_with_statistics += 1;
            }
        } else {
            // start segment
            let edep = energy(members[0]);
            let angle_in = Self::angle_in(position(members[0]), position(members[1]));
            let values = [etot, angle_in, edep];
            let n_good = count(&self.response.good_start, &values);
            let n_bad = count(&self.response.bad_start, &values);
            if n_good >= MIN_ENTRIES_GOOD && n_bad >= MIN_ENTRIES_BAD {
                good_bad_ratio *= n_good * self.response.bad_start.sum()
                    / (n_bad * self.response.good_start.sum());
                points_with_statistics += 1;
            }

            // central segments carry the energy still left in the track
            for window in members.windows(3) {
                etot -= energy(window[0]);
                let edep = energy(window[1]);
                let angle_in = Self::angle_in(position(window[0]), position(window[1]));
                let theta = Self::angle_out_theta(
                    position(window[0]),
                    position(window[1]),
                    position(window[2]),
                );
                let phi = Self::angle_out_phi(
                    position(window[0]),
                    position(window[1]),
                    position(window[2]),
                );
                let values = [etot, angle_in, edep, phi, theta];
                let n_good = count(&self.response.good_central, &values);
                let n_bad = count(&self.response.bad_central, &values);
                if n_good >= MIN_ENTRIES_GOOD && n_bad >= MIN_ENTRIES_BAD {
                    good_bad_ratio *= n_good * self.response.bad_central.sum()
                        / (n_bad * self.response.good_central.sum());
                    points_with_statistics += 1;
                }
            }

            // stop segment
            let last = members[members.len() - 1];
            let before = members[members.len() - 2];
            let values = [energy(last), Self::angle_in(position(before), position(last))];
            let n_good = count(&self.response.good_stop, &values);
            let n_bad = count(&self.response.bad_stop, &values);
            if n_good >= MIN_ENTRIES_GOOD && n_bad >= MIN_ENTRIES_BAD {
                good_bad_ratio *= n_good * self.response.bad_stop.sum()
                    / (n_bad * self.response.good_stop.sum());
                points_with_statistics += 1;
            }
        }

        if good_bad_ratio != 1.0 && points_with_statistics > 0 {
            let prior = count(&self.response.goodbad, &[0.5])
                / count(&self.response.goodbad, &[1.5]).max(f64::MIN_POSITIVE);
            good_bad_ratio *= prior;
            Ok(good_bad_ratio / (1.0 + good_bad_ratio))
        } else {
            debug!(
                event = event.event_id(),
                track = %track,
                "insufficient response statistics for sequence"
            );
            Ok(0.0)
        }
    }
}

impl SequencingStrategy for BayesianStrategy {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn evaluate_track(&self, event: &mut RawEvent, track: ReseId) -> Result<()> {
        let probability = self.sequence_probability(event, track)?;
        event.track_data_mut(track)?.quality_factor = 1.0 - probability;
        Ok(())
    }

    fn evaluate_tracks(&self, tracker: &Tracker, event: &mut RawEvent) -> Result<()> {
        if event.vertex().is_some() {
            return tracker.default_evaluate_pairs(event);
        }

        let mut total = 1.0;
        for track in event.tracks() {
            if event.track_data(track)?.start.is_none() {
                warn!(event = event.event_id(), track = %track, "track has no start point");
                continue;
            }
            let probability = self.sequence_probability(event, track)?;
            event.track_data_mut(track)?.quality_factor = 1.0 - probability;
            total *= probability;
        }

        // 0 is good, 1 is bad
        event.set_track_quality_factor(1.0 - total);
        event.set_pair_quality_factor(NO_QUALITY_FACTOR);
        tracker.classify_sequenced_event(event);
        Ok(())
    }

    fn sort_descending(&self) -> bool {
        false
    }

    fn extra_options(&self) -> String {
        format!("# Response file:               {}\n", self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gammarec_core::{DetectorType, Hit, VolumeId};
    use gammarec_response::Axis;
    use tempfile::tempdir;

    /// Two bins along the first axis: every test lookup lands in the
    /// lower one (`primary`), the upper one (`secondary`) only shapes
    /// the histogram sum so the odds ratios do not cancel.
    fn skewed_histogram(
        name: &str,
        axes: &[(f64, f64)],
        primary: f64,
        secondary: f64,
    ) -> ResponseHistogram {
        let axes = axes
            .iter()
            .enumerate()
            .map(|(i, &(min, max))| {
                let bins = if i == 0 { 2 } else { 1 };
                Axis::new(format!("axis{i}"), bins, min, max).unwrap()
            })
            .collect();
        let mut histogram = ResponseHistogram::new(name, axes);
        let mut lower: Vec<f64> = histogram
            .axes()
            .iter()
            .map(|a| (a.min + a.max) / 2.0)
            .collect();
        lower[0] = histogram.axes()[0].bin_center(0);
        let mut upper = lower.clone();
        upper[0] = histogram.axes()[0].bin_center(1);
        histogram.fill(&lower, primary).unwrap();
        histogram.fill(&upper, secondary).unwrap();
        histogram
    }

    fn write_response_set(dir: &Path, bad_primary: f64) -> std::path::PathBuf {
        let mut goodbad = ResponseHistogram::new(
            "goodbad",
            vec![Axis::new("kind", 2, 0.0, 2.0).unwrap()],
        );
        goodbad.fill(&[0.5], 40.0).unwrap();
        goodbad.fill(&[1.5], 10.0).unwrap();
        goodbad.save(&dir.join("set.t.goodbad.rsp")).unwrap();

        let energy = (0.0, 10000.0);
        let angle = (0.0, 180.0);
        for (suffix, axes) in [
            (".t.start.good.rsp", vec![energy, angle, energy]),
            (".t.start.bad.rsp", vec![energy, angle, energy]),
            (
                ".t.central.good.rsp",
                vec![energy, angle, energy, angle, angle],
            ),
            (
                ".t.central.bad.rsp",
                vec![energy, angle, energy, angle, angle],
            ),
            (".t.stop.good.rsp", vec![energy, angle]),
            (".t.stop.bad.rsp", vec![energy, angle]),
            (".t.dual.good.rsp", vec![energy, angle, energy]),
            (".t.dual.bad.rsp", vec![energy, angle, energy]),
        ] {
            let histogram = if suffix.contains("good") {
                skewed_histogram(suffix, &axes, 30.0, 10.0)
            } else {
                skewed_histogram(suffix, &axes, bad_primary, 36.0)
            };
            histogram.save(&dir.join(format!("set{suffix}"))).unwrap();
        }
        dir.join("set.t.goodbad.rsp")
    }

    fn tracked_event(n: usize) -> (RawEvent, ReseId) {
        let mut event = RawEvent::new();
        let mut previous = None;
        let mut ids = Vec::new();
        for i in 0..n {
            let id = event.add_hit(
                Hit::new(
                    nalgebra::Vector3::new(0.0, 0.0, -(i as f64)),
                    100.0 + 20.0 * i as f64,
                )
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
        event.set_track_stop(track, ids[n - 1]).unwrap();
        (event, track)
    }

    #[test]
    fn test_setup_validates_shape() {
        let dir = tempdir().unwrap();
        let anchor = write_response_set(dir.path(), 12.0);
        assert!(BayesianStrategy::new(&anchor).is_ok());
    }

    #[test]
    fn test_missing_files_fail_setup() {
        let dir = tempdir().unwrap();
        let anchor = write_response_set(dir.path(), 12.0);
        std::fs::remove_file(dir.path().join("set.t.central.bad.rsp")).unwrap();
        assert!(BayesianStrategy::new(&anchor).is_err());
    }

    #[test]
    fn test_dual_track_probability_in_range() {
        let dir = tempdir().unwrap();
        let anchor = write_response_set(dir.path(), 12.0);
        let strategy = BayesianStrategy::new(&anchor).unwrap();

        let (event, track) = tracked_event(2);
        let probability = strategy.sequence_probability(&event, track).unwrap();
        assert!(probability > 0.0 && probability < 1.0);
    }

    #[test]
    fn test_long_track_probability_in_range() {
        let dir = tempdir().unwrap();
        let anchor = write_response_set(dir.path(), 12.0);
        let strategy = BayesianStrategy::new(&anchor).unwrap();

        let (event, track) = tracked_event(5);
        let probability = strategy.sequence_probability(&event, track).unwrap();
        assert!(probability > 0.0 && probability < 1.0);
    }

    #[test]
    fn test_insufficient_statistics_degrade_to_zero() {
        let dir = tempdir().unwrap();
        // bad counts below the threshold of 10 discard every segment
        let anchor = write_response_set(dir.path(), 5.0);
        let strategy = BayesianStrategy::new(&anchor).unwrap();

        let (mut event, track) = tracked_event(3);
        let probability = strategy.sequence_probability(&event, track).unwrap();
        assert_eq!(probability, 0.0);

        strategy.evaluate_track(&mut event, track).unwrap();
        assert_eq!(event.track_data(track).unwrap().quality_factor, 1.0);
    }

    #[test]
    fn test_sorts_ascending() {
        let dir = tempdir().unwrap();
        let anchor = write_response_set(dir.path(), 12.0);
        let strategy = BayesianStrategy::new(&anchor).unwrap();
        assert!(!strategy.sort_descending());
    }
}
