//! Shared machinery of the Kalman-filter pair strategies.
//!
//! Both the two-view and the full 3D strategy run a discrete Kalman
//! filter with a Rauch-Tung-Striebel smoother over the planes below a
//! conversion vertex, picking one measurement per plane, and iterate the
//! assumed electron energy until the multiple-scattering estimate agrees
//! with it. This module holds the configuration, the physical constants,
//! and the scattering-statistics helpers common to both.

use nalgebra::Vector3;
use tracing::warn;

use gammarec_core::{RawEvent, Rese, ReseId};

use crate::tracker::Tracker;

/// Variance of the initial slope estimate, tan²(60°).
pub(crate) const SLOPE_VARIANCE: f64 = 3.0;

/// Weight penalty for measurements already claimed by the first branch.
pub(crate) const REUSE_PENALTY: f64 = 24.0;

/// Assumed electron energy (MeV) of the first filter pass.
pub(crate) const START_ENERGY_MEV: f64 = 20.0;

/// Number of filtered points per branch, vertex included.
pub(crate) const FIT_POINTS: usize = 7;

/// Upper bound on the energy bracketing iterations.
pub(crate) const MAX_ENERGY_LOOPS: u32 = 9;

/// Hits closer than this in depth share a plane (cm).
pub(crate) const PLANE_TOLERANCE: f64 = 1e-4;

/// Deflection angles larger than this multiple of the RMS are pruned
/// before the energy is re-estimated.
const OUTLIER_RMS_FACTOR: f64 = 3.0;

/// Configuration shared by the Kalman pair strategies.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KalmanConfig {
    /// Hit position resolution (cm) in the measurement plane.
    pub sigma: f64,
    /// Material thickness of one tracker layer (cm).
    pub layer_height: f64,
    /// Vertical distance between adjacent layers (cm).
    pub layer_spacing: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            // 1 mm strip pitch / sqrt(12)
            sigma: 0.029,
            layer_height: 0.05,
            layer_spacing: 1.0,
        }
    }
}

impl KalmanConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hit position resolution (cm), clamped to positive.
    #[must_use]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        if sigma <= 0.0 {
            warn!(sigma, "position resolution must be positive, keeping default");
            return self;
        }
        self.sigma = sigma;
        self
    }

    /// Sets the layer material thickness (cm), clamped to positive.
    #[must_use]
    pub fn with_layer_height(mut self, height: f64) -> Self {
        if height <= 0.0 {
            warn!(height, "layer height must be positive, keeping default");
            return self;
        }
        self.layer_height = height;
        self
    }

    /// Sets the layer spacing (cm), clamped to positive.
    #[must_use]
    pub fn with_layer_spacing(mut self, spacing: f64) -> Self {
        if spacing <= 0.0 {
            warn!(spacing, "layer spacing must be positive, keeping default");
            return self;
        }
        self.layer_spacing = spacing;
        self
    }
}

/// One fitted branch: the smoothed states, the multiple-scattering
/// energy estimate (MeV), the smoothing chi-square, and the measurements
/// the filter claimed, vertex first.
pub(crate) struct BranchFit<S> {
    pub states: Vec<S>,
    pub energy: f64,
    pub chi2: f64,
    pub chosen: Vec<ReseId>,
}

impl<S> BranchFit<S> {
    pub(crate) fn rejected(chosen: Vec<ReseId>) -> Self {
        Self {
            states: Vec::new(),
            energy: 0.0,
            chi2: 0.0,
            chosen,
        }
    }
}

/// RMS of the projected multiple-Coulomb-scattering angle for an
/// electron of `energy_mev` crossing `x0_lengths` radiation lengths.
pub(crate) fn scattering_sigma(energy_mev: f64, x0_lengths: f64) -> f64 {
    13.6 / energy_mev * x0_lengths.sqrt() * (1.0 + 0.038 * x0_lengths.ln())
}

/// Material of one layer crossing at `position`, in radiation lengths.
pub(crate) fn layer_radiation_lengths(
    tracker: &Tracker,
    position: &Vector3<f64>,
    layer_height: f64,
) -> f64 {
    let below = position - Vector3::new(0.0, 0.0, layer_height);
    tracker.geometry().path_in_radiation_lengths(position, &below)
}

/// Tracker hits strictly below depth `depth`, grouped into planes of
/// equal depth, ordered top-down.
pub(crate) fn planes_below(
    tracker: &Tracker,
    event: &RawEvent,
    depth: f64,
) -> Vec<(f64, Vec<ReseId>)> {
    let mut hits: Vec<ReseId> = event
        .top()
        .iter()
        .copied()
        .filter(|&id| tracker.is_in_tracker(event, id))
        .filter(|&id| !event.rese(id).is_some_and(Rese::is_track))
        .filter(|&id| {
            event
                .rese(id)
                .is_some_and(|r| r.position.z < depth - PLANE_TOLERANCE)
        })
        .collect();
    hits.sort_by(|&a, &b| {
        let za = event.rese(a).map_or(0.0, |r| r.position.z);
        let zb = event.rese(b).map_or(0.0, |r| r.position.z);
        zb.total_cmp(&za)
    });

    let mut planes: Vec<(f64, Vec<ReseId>)> = Vec::new();
    for id in hits {
        let z = event.rese(id).map_or(0.0, |r| r.position.z);
        match planes.last_mut() {
            Some((plane_z, members)) if (*plane_z - z).abs() < PLANE_TOLERANCE => {
                members.push(id);
            }
            _ => planes.push((z, vec![id])),
        }
    }
    planes
}

/// RMS of a deflection-angle sample with iterative outlier rejection:
/// as long as the largest magnitude exceeds three times the RMS it is
/// removed and the RMS recomputed.
pub(crate) fn pruned_rms(deflections: &mut Vec<f64>) -> f64 {
    loop {
        if deflections.is_empty() {
            return 0.0;
        }
        let sum: f64 = deflections.iter().map(|d| d * d).sum();
        let rms = (sum / deflections.len() as f64).sqrt();
        let largest = deflections.iter().fold(0.0, |m: f64, d| m.max(d.abs()));
        if largest / rms > OUTLIER_RMS_FACTOR {
            deflections.retain(|d| d.abs() != largest);
        } else {
            return rms;
        }
    }
}

/// Robust pick from a sample of per-segment energy estimates: drop the
/// extremes, then take the first value at or above one standard
/// deviation below the mean.
pub(crate) fn robust_energy_pick(estimates: &mut Vec<f64>) -> f64 {
    estimates.sort_by(f64::total_cmp);
    if estimates.len() < 3 {
        return f64::INFINITY;
    }
    estimates.pop();
    estimates.remove(0);

    let average: f64 = estimates.iter().sum::<f64>() / estimates.len() as f64;
    let variance: f64 = estimates
        .iter()
        .map(|e| (e - average) * (e - average))
        .sum::<f64>()
        / estimates.len() as f64;
    let spread = variance.sqrt();

    let index = estimates
        .partition_point(|&e| e < average - spread)
        .min(estimates.len() - 1);
    estimates[index]
}

/// Applies the ×3/÷3 energy bracketing rule: returns the next assumed
/// energy, or `None` when the estimate is consistent with the current
/// assumption or the iteration budget is spent.
pub(crate) fn next_bracketed_energy(estimate: f64, assumed: f64, loops: u32) -> Option<f64> {
    if loops >= MAX_ENERGY_LOOPS {
        return None;
    }
    if estimate / assumed < 1.0 / 3.0 {
        Some(assumed / 3.0)
    } else if estimate / assumed > 3.0 {
        Some(assumed * 3.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_config_clamps_to_positive() {
        let config = KalmanConfig::new()
            .with_sigma(-1.0)
            .with_layer_height(0.0)
            .with_layer_spacing(-0.5);
        let defaults = KalmanConfig::default();
        assert_relative_eq!(config.sigma, defaults.sigma);
        assert_relative_eq!(config.layer_height, defaults.layer_height);
        assert_relative_eq!(config.layer_spacing, defaults.layer_spacing);
    }

    #[test]
    fn test_scattering_sigma_falls_with_energy() {
        let low = scattering_sigma(10.0, 0.01);
        let high = scattering_sigma(100.0, 0.01);
        assert!(low > high);
        assert!(high > 0.0);
    }

    #[test]
    fn test_pruned_rms_drops_outlier() {
        let mut sample = vec![0.01, -0.012, 0.009, -0.011, 0.5];
        let rms = pruned_rms(&mut sample);
        assert_eq!(sample.len(), 4);
        assert!(rms < 0.02);
    }

    #[test]
    fn test_pruned_rms_keeps_consistent_sample() {
        let mut sample = vec![0.01, -0.012, 0.009];
        let rms = pruned_rms(&mut sample);
        assert_eq!(sample.len(), 3);
        assert_relative_eq!(
            rms,
            ((0.01f64.powi(2) + 0.012f64.powi(2) + 0.009f64.powi(2)) / 3.0).sqrt()
        );
    }

    #[test]
    fn test_robust_pick_ignores_extremes() {
        let mut estimates = vec![100.0, 102.0, 98.0, 101.0, 1e6, 1.0];
        let pick = robust_energy_pick(&mut estimates);
        assert!((90.0..=110.0).contains(&pick));
    }

    #[test]
    fn test_robust_pick_needs_three_entries() {
        let mut estimates = vec![100.0, 200.0];
        assert!(robust_energy_pick(&mut estimates).is_infinite());
    }

    #[test]
    fn test_energy_bracketing() {
        assert_eq!(next_bracketed_energy(200.0, 20.0, 0), Some(60.0));
        assert_eq!(next_bracketed_energy(2.0, 20.0, 0), Some(20.0 / 3.0));
        assert_eq!(next_bracketed_energy(30.0, 20.0, 0), None);
        assert_eq!(next_bracketed_energy(200.0, 20.0, MAX_ENERGY_LOOPS), None);
    }
}
