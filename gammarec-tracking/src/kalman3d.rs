//! Full-state Kalman-filter pair strategy.
//!
//! Extends the two-view filter to a joint (x, slope_x, y, slope_y)
//! state, so both transverse coordinates constrain the same trajectory.
//! Beyond the shared pair machinery this variant can bridge empty or
//! implausible planes with a pseudo-measurement at the projection, and
//! it falls back to a chi-square scan over the top planes when the
//! structural vertex search comes up empty.

use nalgebra::{Matrix4, Vector3, Vector4};
use tracing::debug;

use gammarec_core::{EventType, Hit, RawEvent, ReseId};

use crate::error::Result;
use crate::kalman::{
    layer_radiation_lengths, next_bracketed_energy, planes_below, robust_energy_pick,
    scattering_sigma, BranchFit, KalmanConfig, FIT_POINTS, REUSE_PENALTY, SLOPE_VARIANCE,
    START_ENERGY_MEV,
};
use crate::strategy::SequencingStrategy;
use crate::tracker::Tracker;

/// Ceiling of the branch energy estimate (MeV).
const ENERGY_CLAMP_MEV: f64 = 50_000.0;

/// Normalized residual above which a plane measurement is replaced by
/// the projection once the fit is established.
const MAX_OFFSET: f64 = 30.0;

/// Largest summed branch chi-square accepted by the vertex scan.
const VERTEX_CHI_LIMIT: f64 = 50.0;

/// Kalman pair reconstruction with a joint transverse state.
///
/// Only the pair stage differs from the defaults; Compton sequencing and
/// scoring fall through to the base algorithms.
#[derive(Debug, Clone, Default)]
pub struct Kalman3DStrategy {
    config: KalmanConfig,
}

impl Kalman3DStrategy {
    /// Creates the strategy with the given filter configuration.
    pub fn new(config: KalmanConfig) -> Self {
        Self { config }
    }

    /// One filter pass at an assumed energy. Claims the plane hit with
    /// the smallest normalized transverse residual; once more than three
    /// states are fitted, a residual above [`MAX_OFFSET`] keeps the
    /// projection instead, bridging the plane without claiming a hit.
    fn filter(
        &self,
        tracker: &Tracker,
        event: &RawEvent,
        energy_mev: f64,
        height_x0: f64,
        previous: &[ReseId],
    ) -> Result<(Vec<Vector4<f64>>, f64, Vec<ReseId>)> {
        let vertex = event.vertex().ok_or(gammarec_core::Error::MissingVertex)?;
        let vertex_position = event
            .rese(vertex)
            .ok_or(gammarec_core::Error::UnknownElement(vertex))?
            .position;

        let sigma2 = self.config.sigma * self.config.sigma;
        let gain = 1.0 / sigma2;
        let height = self.config.layer_height;

        let mut x = Vector4::new(vertex_position.x, 0.0, vertex_position.y, 0.0);
        let mut c = Matrix4::from_diagonal(&Vector4::new(
            sigma2,
            SLOPE_VARIANCE,
            sigma2,
            SLOPE_VARIANCE,
        ));

        let mut chosen = vec![vertex];
        let mut measurements = vec![(x[0], x[2])];
        let mut filtered = vec![x];
        let mut covariances = vec![c];
        let mut transitions: Vec<Matrix4<f64>> = Vec::new();
        // index 0 is a placeholder so projection k belongs to state k
        let mut projections = vec![Vector4::zeros()];
        let mut projected_cov = vec![Matrix4::zeros()];
        let mut projected_cov_inv = vec![Matrix4::zeros()];

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
            let mut f = Matrix4::identity();
            f[(0, 1)] = distance;
            f[(2, 3)] = distance;

            let mut q = Matrix4::zeros();
            q[(0, 0)] = t * t * height * height / 3.0;
            q[(2, 2)] = t * t * height * height / 3.0;
            q[(0, 1)] = t * t * height / 2.0;
            q[(1, 0)] = t * t * height / 2.0;
            q[(2, 3)] = t * t * height / 2.0;
            q[(3, 2)] = t * t * height / 2.0;
            q[(1, 1)] = t * t;
            q[(3, 3)] = t * t;

            let x_proj = f * x;
            let c_proj = f * c * f.transpose() + q;
            let Some(c_proj_inv) = c_proj.try_inverse() else {
                break;
            };
            let mut information = c_proj_inv;
            information[(0, 0)] += gain;
            information[(2, 2)] += gain;
            let Some(c_next) = information.try_inverse() else {
                break;
            };

            let spread = c_proj[(0, 0)].sqrt();
            let mut best: Option<(f64, ReseId)> = None;
            for &id in &hits {
                let Some(rese) = event.rese(id) else { continue };
                let dx = rese.position.x - x_proj[0];
                let dy = rese.position.y - x_proj[2];
                let mut weight = (dx * dx + dy * dy).sqrt() / spread;
                if previous.contains(&id) {
                    weight += REUSE_PENALTY;
                }
                if best.is_none_or(|b| weight < b.0) {
                    best = Some((weight, id));
                }
            }

            let (mx, my) = match best {
                Some((weight, id)) if weight <= MAX_OFFSET || filtered.len() <= 3 => {
                    chosen.push(id);
                    let position = event.rese(id).map_or(Vector3::zeros(), |r| r.position);
                    (position.x, position.y)
                }
                _ => (x_proj[0], x_proj[2]),
            };

            x = c_next * (c_proj_inv * x_proj + Vector4::new(gain * mx, 0.0, gain * my, 0.0));
            c = c_next;

            transitions.push(f);
            projections.push(x_proj);
            projected_cov.push(c_proj);
            projected_cov_inv.push(c_proj_inv);
            filtered.push(x);
            covariances.push(c);
            measurements.push((mx, my));
        }

        let n = filtered.len();
        if n < 2 {
            return Ok((Vec::new(), 0.0, chosen));
        }

        // Rauch-Tung-Striebel smoothing with the chi-square reduced by
        // the degrees of freedom
        let mut smoothed = vec![Vector4::zeros(); n];
        let mut smoothed_cov = vec![Matrix4::zeros(); n];
        smoothed[n - 1] = filtered[n - 1];
        smoothed_cov[n - 1] = covariances[n - 1];

        let mut chi2 = 0.0;
        for i in (0..n - 1).rev() {
            let a = covariances[i] * transitions[i].transpose() * projected_cov_inv[i + 1];
            smoothed[i] = filtered[i] + a * (smoothed[i + 1] - projections[i + 1]);
            smoothed_cov[i] =
                covariances[i] + a * (smoothed_cov[i + 1] - projected_cov[i + 1]) * a.transpose();
            let rx = measurements[i].0 - smoothed[i][0];
            let ry = measurements[i].1 - smoothed[i][2];
            let residual = (rx * rx + ry * ry).sqrt();
            let vx = sigma2 - smoothed_cov[i][(0, 0)];
            let vy = sigma2 - smoothed_cov[i][(2, 2)];
            let variance = (vx * vx + vy * vy).sqrt();
            chi2 += residual * residual / variance;
        }
        // reduced by the degrees of freedom; three states carry none
        chi2 = if n > 3 {
            chi2 / (n as f64 - 3.0)
        } else {
            f64::INFINITY
        };

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
    ) -> Result<BranchFit<Vector4<f64>>> {
        let mut energy = START_ENERGY_MEV;
        let mut loops = 0;
        loop {
            let (states, chi2, chosen) =
                self.filter(tracker, event, energy, height_x0, previous)?;
            if states.len() < 3 {
                return Ok(BranchFit::rejected(chosen));
            }
            let estimate = Self::scattering_energy(&states, height_x0).min(ENERGY_CLAMP_MEV);
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

    /// Fits both branches; the second pays a weight penalty for hits the
    /// first one claimed.
    fn search_tracks(
        &self,
        tracker: &Tracker,
        event: &RawEvent,
    ) -> Result<(BranchFit<Vector4<f64>>, BranchFit<Vector4<f64>>)> {
        let vertex = event.vertex().ok_or(gammarec_core::Error::MissingVertex)?;
        let position = event
            .rese(vertex)
            .ok_or(gammarec_core::Error::UnknownElement(vertex))?
            .position;
        let height_x0 = layer_radiation_lengths(tracker, &position, self.config.layer_height);

        let first = self.search_branch(tracker, event, height_x0, &[])?;
        if first.states.len() < 3 {
            return Ok((first, BranchFit::rejected(Vec::new())));
        }
        let second = self.search_branch(tracker, event, height_x0, &first.chosen)?;
        Ok((first, second))
    }

    /// Branch energy (MeV) from the per-segment scattering angles of the
    /// smoothed trajectory, with a robust pick over the estimates.
    fn scattering_energy(states: &[Vector4<f64>], height_x0: f64) -> f64 {
        let mut estimates = Vec::new();
        let mut previous: Option<Vector3<f64>> = None;
        for state in states {
            let tx = state[1];
            let ty = state[3];
            let theta = (1.0 / (tx * tx + ty * ty + 1.0)).acos();
            let phi = ty.atan2(tx);
            let direction = Vector3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            );
            if let Some(previous) = previous {
                let angle = previous.angle(&direction);
                let depth = height_x0 / theta.cos();
                let estimate = 13.6 / angle * depth.sqrt() * (1.0 + 0.038 * depth.ln());
                estimates.push(if estimate.is_finite() { estimate } else { 1e6 });
            }
            previous = Some(direction);
        }
        robust_energy_pick(&mut estimates)
    }

    /// Unit direction of a branch from its first smoothed slopes,
    /// pointing downward.
    fn branch_direction(state: &Vector4<f64>) -> Vector3<f64> {
        let tx = state[1];
        let ty = state[3];
        let phi = ty.atan2(tx);
        let theta = if ty == 0.0 { 0.0 } else { (ty / phi.sin()).atan() };
        Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), -theta.cos())
    }
}

impl SequencingStrategy for Kalman3DStrategy {
    fn name(&self) -> &'static str {
        "kalman3d"
    }

    /// The structural vertex search runs first; when it finds nothing,
    /// every hit in the top two occupied planes is tried as a vertex and
    /// the one with the smallest summed branch chi-square wins, if that
    /// minimum is acceptable.
    fn check_for_pair(&self, tracker: &Tracker, event: &RawEvent) -> Option<RawEvent> {
        if let Some(found) = tracker.default_check_for_pair(event) {
            return Some(found);
        }

        let planes = planes_below(tracker, event, f64::INFINITY);
        let mut best: Option<(f64, ReseId)> = None;
        for (_, hits) in planes.iter().take(2) {
            for &candidate in hits {
                let mut probe = event.duplicate();
                probe.set_vertex(Some(candidate));
                let Ok((first, second)) = self.search_tracks(tracker, &probe) else {
                    continue;
                };
                if first.chi2 == 0.0 && second.chi2 == 0.0 {
                    continue;
                }
                if first.chosen.len() <= 2 || second.chosen.len() <= 2 {
                    continue;
                }
                let chi = first.chi2 + second.chi2;
                if !chi.is_finite() {
                    continue;
                }
                if best.is_none_or(|b| chi < b.0) {
                    best = Some((chi, candidate));
                }
            }
        }

        let (chi, vertex) = best?;
        if chi > VERTEX_CHI_LIMIT {
            return None;
        }
        debug!(event = event.event_id(), vertex = %vertex, chi, "vertex from chi-square scan");
        let mut with_vertex = event.duplicate();
        with_vertex.set_vertex(Some(vertex));
        with_vertex.set_vertex_direction(-1);
        Some(with_vertex)
    }

    fn track_pairs(&self, tracker: &Tracker, event: &mut RawEvent) -> Result<()> {
        let vertex = event.vertex().ok_or(gammarec_core::Error::MissingVertex)?;
        let vertex_rese = event
            .rese(vertex)
            .ok_or(gammarec_core::Error::UnknownElement(vertex))?;
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

        let (first, second) = self.search_tracks(tracker, event)?;
        let chi_total = first.chi2 + second.chi2;
        if chi_total.is_infinite()
            || (first.chi2 == 0.0 && second.chi2 == 0.0)
            || first.chosen.len() <= 2
            || second.chosen.len() <= 2
        {
            debug!(event = event.event_id(), "pair fit rejected");
            return Ok(());
        }

        let electron = event.new_track();
        event.track_absorb(electron, vertex)?;
        event.set_track_start(electron, vertex)?;
        let mut stop = vertex;
        for &id in &first.chosen[1..] {
            if !event.top().contains(&id) {
                continue;
            }
            event.track_append(electron, id, Some(stop))?;
            event.set_track_stop(electron, id)?;
            stop = id;
        }

        // the positron grows from a zero-energy stand-in at the vertex so
        // the conversion energy is not counted twice
        let stand_in = event.add_hit(vertex_hit);
        let positron = event.new_track();
        event.track_absorb(positron, stand_in)?;
        event.set_track_start(positron, stand_in)?;
        let mut stop = stand_in;
        for &id in &second.chosen[1..] {
            if !event.top().contains(&id) {
                continue;
            }
            event.track_append(positron, id, Some(stop))?;
            event.set_track_stop(positron, id)?;
            stop = id;
        }

        // everything the fits left loose, calorimeter deposits included,
        // joins the nearer branch
        let loose: Vec<ReseId> = event
            .top()
            .iter()
            .copied()
            .filter(|&id| id != electron && id != positron)
            .collect();
        for id in loose {
            if event.min_distance(electron, id) < event.min_distance(positron, id) {
                event.track_absorb(electron, id)?;
            } else {
                event.track_absorb(positron, id)?;
            }
        }

        let electron_direction = Self::branch_direction(&first.states[0]);
        let positron_direction = Self::branch_direction(&second.states[0]);

        {
            let data = event.track_data_mut(electron)?;
            data.fixed_direction = Some(electron_direction);
            data.quality_factor = first.chi2;
        }
        {
            let data = event.track_data_mut(positron)?;
            data.fixed_direction = Some(positron_direction);
            data.quality_factor = second.chi2;
        }

        let total_energy = first.energy + second.energy;
        if total_energy > 0.0 && total_energy.is_finite() {
            let photon = (electron_direction * first.energy
                + positron_direction * second.energy)
                / total_energy;
            debug!(
                event = event.event_id(),
                energy_mev = total_energy,
                direction = ?photon.normalize(),
                "pair photon reconstructed"
            );
        }

        event.set_electron_track(Some(electron));
        event.set_positron_track(Some(positron));
        event.set_pair_quality_factor(chi_total);
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
