//! Two-view Kalman-filter pair strategy.
//!
//! Fits the electron and positron branches of a conversion vertex as two
//! independent projections: each view carries a (position, slope) state
//! propagated plane by plane with a multiple-scattering process noise,
//! smoothed backwards, and scored by the smoothing chi-square. The view
//! fits are combined afterwards into 3D branch directions.

use nalgebra::{Matrix2, Vector2, Vector3};
use tracing::debug;

use gammarec_core::{EventType, Hit, RawEvent, ReseId};

use crate::error::Result;
use crate::kalman::{
    layer_radiation_lengths, next_bracketed_energy, planes_below, pruned_rms, scattering_sigma,
    BranchFit, KalmanConfig, FIT_POINTS, REUSE_PENALTY, SLOPE_VARIANCE, START_ENERGY_MEV,
};
use crate::strategy::SequencingStrategy;
use crate::tracker::Tracker;

/// Ceiling of the per-view energy estimate (MeV).
const ENERGY_CLAMP_MEV: f64 = 500_000.0;

/// One measurement projection of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    X,
    Y,
}

impl View {
    fn coord(self, position: &Vector3<f64>) -> f64 {
        match self {
            View::X => position.x,
            View::Y => position.y,
        }
    }
}

/// Kalman pair reconstruction over two independent strip views.
///
/// Only the pair stage differs from the defaults; Compton sequencing and
/// scoring fall through to the base algorithms.
#[derive(Debug, Clone, Default)]
pub struct Kalman2DStrategy {
    config: KalmanConfig,
}

impl Kalman2DStrategy {
    /// Creates the strategy with the given filter configuration.
    pub fn new(config: KalmanConfig) -> Self {
        Self { config }
    }

    /// One filter pass at an assumed energy: walks the planes below the
    /// vertex, claims the measurement nearest to the projection on each,
    /// and smooths backwards. Returns the smoothed states top-down, the
    /// smoothing chi-square, and the claimed elements, vertex first.
    fn filter(
        &self,
        tracker: &Tracker,
        event: &RawEvent,
        energy_mev: f64,
        height_x0: f64,
        previous: &[ReseId],
        view: View,
    ) -> Result<(Vec<Vector2<f64>>, f64, Vec<ReseId>)> {
        let vertex = event.vertex().ok_or(gammarec_core::Error::MissingVertex)?;
        let vertex_rese = event
            .rese(vertex)
            .ok_or(gammarec_core::Error::UnknownElement(vertex))?;
        let vertex_position = vertex_rese.position;

        let gain = 1.0 / (self.config.sigma * self.config.sigma);
        let height = self.config.layer_height;

        let mut x = Vector2::new(view.coord(&vertex_position), 0.0);
        let mut c = Matrix2::new(
            self.config.sigma * self.config.sigma,
            0.0,
            0.0,
            SLOPE_VARIANCE,
        );

        let mut chosen = vec![vertex];
        let mut measurements = vec![x[0]];
        let mut filtered = vec![x];
        let mut covariances = vec![c];
        let mut transitions: Vec<Matrix2<f64>> = Vec::new();
        // index 0 is a placeholder so projection k belongs to state k
        let mut projections = vec![Vector2::zeros()];
        let mut projected_cov = vec![Matrix2::zeros()];
        let mut projected_cov_inv = vec![Matrix2::zeros()];

        let mut previous_z = vertex_position.z;
        for (plane_z, hits) in planes_below(tracker, event, vertex_position.z) {
            if filtered.len() >= FIT_POINTS {
                break;
            }
            let distance = previous_z - plane_z;
            // only subsequent planes continue a branch
            if distance > 1.5 * self.config.layer_spacing {
                break;
            }
            previous_z = plane_z;

            let t = scattering_sigma(energy_mev, height_x0);
            let f = Matrix2::new(1.0, distance, 0.0, 1.0);
            let q = Matrix2::new(
                t * t * height * height / 3.0,
                t * t * height / 2.0,
                t * t * height / 2.0,
                t * t,
            );

            let x_proj = f * x;
            let c_proj = f * c * f.transpose() + q;
            let Some(c_proj_inv) = c_proj.try_inverse() else {
                break;
            };
            let mut information = c_proj_inv;
            information[(0, 0)] += gain;
            let Some(c_next) = information.try_inverse() else {
                break;
            };

            let spread = c_proj[(0, 0)].sqrt();
            let mut best: Option<(f64, ReseId)> = None;
            for &id in &hits {
                let Some(rese) = event.rese(id) else { continue };
                let mut weight = (view.coord(&rese.position) - x_proj[0]).abs() / spread;
                if previous.contains(&id) {
                    weight += REUSE_PENALTY;
                }
                if best.is_none_or(|b| weight < b.0) {
                    best = Some((weight, id));
                }
            }
            let Some((_, pick)) = best else { break };
            let Some(rese) = event.rese(pick) else { break };
            let m = view.coord(&rese.position);
            chosen.push(pick);

            x = c_next * (c_proj_inv * x_proj + Vector2::new(gain * m, 0.0));
            c = c_next;

            transitions.push(f);
            projections.push(x_proj);
            projected_cov.push(c_proj);
            projected_cov_inv.push(c_proj_inv);
            filtered.push(x);
            covariances.push(c);
            measurements.push(m);
        }

        let n = filtered.len();
        if n < 2 {
            return Ok((Vec::new(), 0.0, chosen));
        }

        // Rauch-Tung-Striebel smoothing, accumulating the chi-square of
        // the smoothed residuals
        let measurement_variance = self.config.sigma * self.config.sigma;
        let mut smoothed = vec![Vector2::zeros(); n];
        let mut smoothed_cov = vec![Matrix2::zeros(); n];
        smoothed[n - 1] = filtered[n - 1];
        smoothed_cov[n - 1] = covariances[n - 1];

        let mut chi2 = 0.0;
        for i in (0..n - 1).rev() {
            let a = covariances[i] * transitions[i].transpose() * projected_cov_inv[i + 1];
            smoothed[i] = filtered[i] + a * (smoothed[i + 1] - projections[i + 1]);
            smoothed_cov[i] =
                covariances[i] + a * (smoothed_cov[i + 1] - projected_cov[i + 1]) * a.transpose();
            let residual = measurements[i] - smoothed[i][0];
            let variance = measurement_variance - smoothed_cov[i][(0, 0)];
            chi2 += residual * residual / variance;
        }

        Ok((smoothed, chi2, chosen))
    }

    /// Fits one branch, iterating the assumed energy until the
    /// multiple-scattering estimate agrees with it.
    fn search_branch(
        &self,
        tracker: &Tracker,
        event: &RawEvent,
        height_x0: f64,
        previous: &[ReseId],
        view: View,
    ) -> Result<BranchFit<Vector2<f64>>> {
        let mut energy = START_ENERGY_MEV;
        let mut loops = 0;
        loop {
            let (states, chi2, chosen) =
                self.filter(tracker, event, energy, height_x0, previous, view)?;
            if states.len() < 2 {
                return Ok(BranchFit::rejected(chosen));
            }
            let estimate = self.view_energy(&states, height_x0).min(ENERGY_CLAMP_MEV);
            match next_bracketed_energy(estimate, energy, loops) {
                Some(next) => {
                    loops += 1;
                    energy = next;
                }
                None => {
                    return Ok(BranchFit {
                        states,
                        energy: estimate,
                        chi2,
                        chosen,
                    })
                }
            }
        }
    }

    /// Fits both branches of one view; the second branch pays a weight
    /// penalty for measurements the first one claimed.
    fn search_tracks(
        &self,
        tracker: &Tracker,
        event: &RawEvent,
        view: View,
    ) -> Result<(BranchFit<Vector2<f64>>, BranchFit<Vector2<f64>>)> {
        let vertex = event.vertex().ok_or(gammarec_core::Error::MissingVertex)?;
        let position = event
            .rese(vertex)
            .ok_or(gammarec_core::Error::UnknownElement(vertex))?
            .position;
        let height_x0 = layer_radiation_lengths(tracker, &position, self.config.layer_height);

        let first = self.search_branch(tracker, event, height_x0, &[], view)?;
        if first.states.len() < 2 {
            return Ok((first, BranchFit::rejected(Vec::new())));
        }
        let second = self.search_branch(tracker, event, height_x0, &first.chosen, view)?;
        Ok((first, second))
    }

    /// Electron energy (MeV) from the spread of the smoothed deflection
    /// angles of one view.
    fn view_energy(&self, states: &[Vector2<f64>], height_x0: f64) -> f64 {
        if states.len() < 3 {
            return f64::INFINITY;
        }
        let tilt = states[1][1].atan().cos();
        let correction = (height_x0 / tilt).exp();
        let angles: Vec<f64> = states.iter().map(|s| s[1].atan()).collect();
        let mut deflections: Vec<f64> = angles
            .windows(2)
            .map(|w| (w[1] - w[0]) / correction)
            .collect();
        // the last segment leaves the fitted range
        deflections.pop();
        let rms = pruned_rms(&mut deflections);
        13.6 * height_x0.sqrt() * (1.0 + 0.038 * height_x0.ln()) / (rms * tilt.sqrt())
    }

    /// Branch energy (MeV) from the kink between the first two segments,
    /// combining the x and y view measurement chains.
    fn combined_view_energy(
        &self,
        event: &RawEvent,
        height_x0: f64,
        chosen_x: &[ReseId],
        chosen_y: &[ReseId],
    ) -> f64 {
        let n = chosen_x.len().min(chosen_y.len());
        let position = |id: ReseId| event.rese(id).map_or(Vector3::zeros(), |r| r.position);
        let mut first_segment: Option<Vector3<f64>> = None;
        for i in 0..n.saturating_sub(1) {
            let segment = Vector3::new(
                position(chosen_x[i + 1]).x - position(chosen_x[i]).x,
                position(chosen_y[i + 1]).y - position(chosen_y[i]).y,
                position(chosen_x[i + 1]).z - position(chosen_x[i]).z,
            )
            .normalize();
            if let Some(first) = first_segment {
                let angle = first.angle(&segment);
                let theta = segment.z.acos();
                // segments point downward, the crossing is measured
                // against the upward normal
                let depth = height_x0 / (std::f64::consts::PI - theta).cos();
                return 13.6 / angle * depth.sqrt() * (1.0 + 0.038 * depth.ln());
            }
            first_segment = Some(segment);
        }
        0.0
    }

    /// Unit direction of a branch from the first smoothed state of each
    /// view, pointing downward.
    fn branch_direction(state_x: &Vector2<f64>, state_y: &Vector2<f64>) -> Vector3<f64> {
        let tx = state_x[1];
        let ty = state_y[1];
        let norm = (tx * tx + ty * ty + 1.0).sqrt();
        Vector3::new(tx / norm, ty / norm, -1.0 / norm)
    }

    /// Absorbs the claimed measurements of both views into a track,
    /// chaining them in claim order.
    fn build_branch(
        event: &mut RawEvent,
        track: ReseId,
        mut stop: ReseId,
        chosen_x: &[ReseId],
        chosen_y: &[ReseId],
    ) -> Result<()> {
        for &id in chosen_x.iter().chain(chosen_y).skip(1) {
            if !event.top().contains(&id) {
                continue;
            }
            event.track_append(track, id, Some(stop))?;
            event.set_track_stop(track, id)?;
            stop = id;
        }
        Ok(())
    }
}

impl SequencingStrategy for Kalman2DStrategy {
    fn name(&self) -> &'static str {
        "kalman2d"
    }

    fn track_pairs(&self, tracker: &Tracker, event: &mut RawEvent) -> Result<()> {
        let vertex = event.vertex().ok_or(gammarec_core::Error::MissingVertex)?;
        let vertex_rese = event
            .rese(vertex)
            .ok_or(gammarec_core::Error::UnknownElement(vertex))?;
        let vertex_position = vertex_rese.position;
        let vertex_hit = Hit {
            position: vertex_rese.position,
            energy: 0.0,
            time: vertex_rese.time,
            position_resolution: vertex_rese.position_resolution,
            energy_resolution: vertex_rese.energy_resolution,
            time_resolution: vertex_rese.time_resolution,
            detector: vertex_rese.detector,
            volume: vertex_rese.volume,
        };

        let (first_x, second_x) = self.search_tracks(tracker, event, View::X)?;
        if first_x.chi2 == 0.0 && second_x.chi2 == 0.0 {
            return Ok(());
        }
        let (mut first_y, mut second_y) = self.search_tracks(tracker, event, View::Y)?;
        if first_y.chi2 == 0.0 && second_y.chi2 == 0.0 {
            return Ok(());
        }

        // pair the views by energy ordering
        if (first_x.energy - second_x.energy) * (first_y.energy - second_y.energy) < 0.0 {
            std::mem::swap(&mut first_y, &mut second_y);
        }

        if first_x.chosen.len() <= 2 || first_y.chosen.len() <= 2 {
            debug!(event = event.event_id(), "leading pair branch too short");
            return Ok(());
        }

        let height_x0 =
            layer_radiation_lengths(tracker, &vertex_position, self.config.layer_height);
        let electron_energy =
            self.combined_view_energy(event, height_x0, &first_x.chosen, &first_y.chosen);
        let positron_energy = if second_x.chosen.len() > 2 && second_y.chosen.len() > 2 {
            self.combined_view_energy(event, height_x0, &second_x.chosen, &second_y.chosen)
        } else {
            0.0
        };

        let electron = event.new_track();
        event.track_absorb(electron, vertex)?;
        event.set_track_start(electron, vertex)?;
        Self::build_branch(event, electron, vertex, &first_x.chosen, &first_y.chosen)?;

        // the positron grows from a zero-energy stand-in at the vertex so
        // the conversion energy is not counted twice
        let stand_in = event.add_hit(vertex_hit);
        let positron = event.new_track();
        event.track_absorb(positron, stand_in)?;
        event.set_track_start(positron, stand_in)?;
        Self::build_branch(event, positron, stand_in, &second_x.chosen, &second_y.chosen)?;

        let electron_len = event.track_data(electron)?.children.len();
        let positron_len = event.track_data(positron)?.children.len();
        if electron_len <= 2 || positron_len <= 2 {
            debug!(
                event = event.event_id(),
                electron_len, positron_len, "pair branches too short, dissolving"
            );
            event.dissolve_track(electron)?;
            event.dissolve_track(positron)?;
            return Ok(());
        }

        let electron_direction =
            Self::branch_direction(&first_x.states[0], &first_y.states[0]);
        let positron_direction =
            Self::branch_direction(&second_x.states[0], &second_y.states[0]);

        let electron_chi = first_x.chi2 + first_y.chi2;
        let positron_chi = second_x.chi2 + second_y.chi2;

        {
            let data = event.track_data_mut(electron)?;
            data.fixed_direction = Some(electron_direction);
            data.quality_factor = electron_chi;
        }
        {
            let data = event.track_data_mut(positron)?;
            data.fixed_direction = Some(positron_direction);
            data.quality_factor = positron_chi;
        }

        debug!(
            event = event.event_id(),
            electron_energy, positron_energy, "pair branches fitted"
        );

        event.set_electron_track(Some(electron));
        event.set_positron_track(Some(positron));
        event.set_pair_quality_factor(electron_chi + positron_chi);
        event.set_event_type(EventType::Pair);
        event.set_good(true);
        Ok(())
    }

    fn evaluate_tracks(&self, tracker: &Tracker, event: &mut RawEvent) -> Result<()> {
        // pair scores are chi-squares set while tracking; rescoring them
        // with the correlation discriminator would discard the fit
        if event.vertex().is_some() {
            return Ok(());
        }
        tracker.default_evaluate_tracks(event)
    }

    fn extra_options(&self) -> String {
        format!(
            "# Kalman position resolution:  {:.4} cm\n# Kalman layer height:         {:.4} cm\n",
            self.config.sigma, self.config.layer_height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingConfig;
    use gammarec_core::{DetectorType, LayeredGeometry, VolumeId};
    use std::sync::Arc;

    fn tracker() -> Tracker {
        let mut geo = LayeredGeometry::new(0.0, 1.0);
        geo.register_volume(VolumeId(1), 0);
        Tracker::new(
            Arc::new(geo),
            TrackingConfig::default(),
            Box::new(Kalman2DStrategy::new(KalmanConfig::new().with_sigma(0.05))),
        )
        .unwrap()
    }

    fn strategy() -> Kalman2DStrategy {
        Kalman2DStrategy::new(KalmanConfig::new().with_sigma(0.05))
    }

    fn hit(x: f64, y: f64, z: f64) -> Hit {
        Hit::new(Vector3::new(x, y, z), 200.0)
            .with_detector(DetectorType::Strip2D)
            .with_volume(VolumeId(1))
    }

    /// A vertex with two diverging branches below it: a kinked electron
    /// branch (finite energy estimate in both views) and a perfectly
    /// straight positron branch (estimate clamped high in both views),
    /// so the view pairing never swaps.
    fn pair_event() -> (RawEvent, ReseId) {
        let mut event = RawEvent::new();
        let vertex = event.add_hit(hit(0.0, 0.0, 0.0));
        let electron_x = [-0.25, -0.62, -0.88, -1.24, -1.45, -1.80];
        let electron_y = [0.08, 0.22, 0.28, 0.44, 0.50, 0.64];
        let positron_x = [0.30, 0.58, 0.86, 1.14, 1.42, 1.70];
        let positron_y = [-0.10, -0.20, -0.30, -0.40, -0.50, -0.60];
        for i in 0..6 {
            let z = -(1.0 + i as f64);
            event.add_hit(hit(electron_x[i], electron_y[i], z));
            event.add_hit(hit(positron_x[i], positron_y[i], z));
        }
        event.set_vertex(Some(vertex));
        event.set_vertex_direction(-1);
        (event, vertex)
    }

    #[test]
    fn test_filter_follows_single_column() {
        let tracker = tracker();
        let strategy = strategy();
        let mut event = RawEvent::new();
        let vertex = event.add_hit(hit(0.0, 0.0, 0.0));
        for i in 1..=6 {
            event.add_hit(hit(0.02 * f64::from(i), 0.0, -f64::from(i)));
        }
        event.set_vertex(Some(vertex));

        let height_x0 = layer_radiation_lengths(
            &tracker,
            &Vector3::zeros(),
            KalmanConfig::default().layer_height,
        );
        let (states, chi2, chosen) = strategy
            .filter(&tracker, &event, 20.0, height_x0, &[], View::X)
            .unwrap();
        assert_eq!(chosen.len(), FIT_POINTS);
        assert_eq!(states.len(), FIT_POINTS);
        assert!(chi2.is_finite());
        assert!(chi2 >= 0.0);
    }

    #[test]
    fn test_second_branch_avoids_first() {
        let tracker = tracker();
        let strategy = strategy();
        let mut event = RawEvent::new();
        let vertex = event.add_hit(hit(0.0, 0.0, 0.0));
        let mut near = Vec::new();
        let mut far = Vec::new();
        for i in 1..=5 {
            let z = -f64::from(i);
            near.push(event.add_hit(hit(0.01 * f64::from(i), 0.0, z)));
            far.push(event.add_hit(hit(0.5 + 0.2 * f64::from(i), 0.0, z)));
        }
        event.set_vertex(Some(vertex));

        let (first, second) = strategy.search_tracks(&tracker, &event, View::X).unwrap();
        assert_eq!(first.chosen[1..], near[..]);
        assert_eq!(second.chosen[1..], far[..]);
    }

    #[test]
    fn test_track_pairs_reconstructs_pair() {
        let tracker = tracker();
        let strategy = strategy();
        let (mut event, _) = pair_event();

        strategy.track_pairs(&tracker, &mut event).unwrap();

        let electron = event.electron_track().unwrap();
        let positron = event.positron_track().unwrap();
        assert_eq!(event.event_type(), EventType::Pair);
        assert!(event.is_good());
        assert!(event.pair_quality_factor() > 0.0);
        assert!(event.pair_quality_factor().is_finite());
        assert!(event.track_data(electron).unwrap().children.len() > 2);
        assert!(event.track_data(positron).unwrap().children.len() > 2);
        let down = event
            .track_data(electron)
            .unwrap()
            .fixed_direction
            .unwrap();
        assert!(down.z < 0.0);
    }

    #[test]
    fn test_straight_single_column_is_no_pair() {
        // a perfectly straight lone column fits with zero chi-square in
        // both branches, which rejects the pair hypothesis
        let tracker = tracker();
        let strategy = strategy();
        let mut event = RawEvent::new();
        let vertex = event.add_hit(hit(0.0, 0.0, 0.0));
        for i in 1..=5 {
            event.add_hit(hit(0.0, 0.0, -f64::from(i)));
        }
        event.set_vertex(Some(vertex));

        strategy.track_pairs(&tracker, &mut event).unwrap();
        assert!(event.electron_track().is_none());
        assert!(event.positron_track().is_none());
    }

    #[test]
    fn test_vertex_required() {
        let tracker = tracker();
        let strategy = strategy();
        let mut event = RawEvent::new();
        event.add_hit(hit(0.0, 0.0, 0.0));
        assert!(strategy.track_pairs(&tracker, &mut event).is_err());
    }
}
