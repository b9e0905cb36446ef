//! Derived quantities of tracks: ordered walks, directions, straightness.
//!
//! A [`TrackView`] borrows a track inside its owning event and computes
//! everything that depends on the link ordering: least-squares average
//! direction, endpoint directions, center of gravity, and the Pearson and
//! Spearman straightness scores used by the sequencing strategies.

use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::event::RawEvent;
use crate::math::angle_between;
use crate::rese::{ReseId, TrackData};

/// Track length at which the angle term joins the rank correlation.
pub const START_ANGLE_CORRELATION: usize = 6;

/// A read-only view of one track within its event.
#[derive(Clone, Copy)]
pub struct TrackView<'a> {
    event: &'a RawEvent,
    id: ReseId,
    data: &'a TrackData,
}

impl RawEvent {
    /// Borrows a track for derived-quantity computation.
    pub fn track(&self, id: ReseId) -> Result<TrackView<'_>> {
        let data = self
            .rese(id)
            .ok_or(Error::UnknownElement(id))?
            .as_track()
            .ok_or(Error::NotATrack(id))?;
        Ok(TrackView { event: self, id, data })
    }
}

/// Iterator walking a track's link chain from one endpoint.
pub struct TrackWalk<'a> {
    event: &'a RawEvent,
    previous: Option<ReseId>,
    current: Option<ReseId>,
}

impl<'a> TrackWalk<'a> {
    fn new(event: &'a RawEvent, start: ReseId) -> Self {
        Self {
            event,
            previous: None,
            current: Some(start),
        }
    }
}

impl Iterator for TrackWalk<'_> {
    type Item = ReseId;

    fn next(&mut self) -> Option<ReseId> {
        let current = self.current?;
        let next = self
            .event
            .rese(current)
            .into_iter()
            .flat_map(|rese| rese.links.iter().copied())
            .find(|&l| Some(l) != self.previous);
        self.previous = Some(current);
        self.current = next;
        Some(current)
    }
}

impl<'a> TrackView<'a> {
    /// The track's id.
    pub fn id(&self) -> ReseId {
        self.id
    }

    /// Track bookkeeping.
    pub fn data(&self) -> &'a TrackData {
        self.data
    }

    /// Number of constituent elements.
    pub fn len(&self) -> usize {
        self.data.children.len()
    }

    /// True for a track without constituents.
    pub fn is_empty(&self) -> bool {
        self.data.children.is_empty()
    }

    /// Walks the link chain from the designated start point.
    pub fn walk(&self) -> Result<TrackWalk<'a>> {
        let start = self.data.start.ok_or(Error::MissingStartPoint(self.id))?;
        Ok(TrackWalk::new(self.event, start))
    }

    /// Walks the link chain from an arbitrary endpoint.
    pub fn walk_from(&self, endpoint: ReseId) -> TrackWalk<'a> {
        TrackWalk::new(self.event, endpoint)
    }

    /// Members in link order, starting at the designated start point.
    pub fn ordered_members(&self) -> Result<Vec<ReseId>> {
        Ok(self.walk()?.collect())
    }

    fn position(&self, id: ReseId) -> Vector3<f64> {
        self.event.rese(id).map_or(Vector3::zeros(), |r| r.position)
    }

    fn energy(&self, id: ReseId) -> f64 {
        self.event.rese(id).map_or(0.0, |r| r.energy)
    }

    /// Least-squares line fit through all members, with depth (z) as the
    /// free coordinate. Returns the unnormalized direction (bx, by, 1);
    /// degenerate same-depth tracks fall back to stop − start.
    pub fn average_direction(&self) -> Result<Vector3<f64>> {
        if let Some(fixed) = self.data.fixed_direction {
            return Ok(fixed);
        }
        let start = self.data.start.ok_or(Error::MissingStartPoint(self.id))?;
        let stop = self.data.stop.ok_or(Error::MissingStopPoint(self.id))?;

        let n = self.data.children.len() as f64;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_z = 0.0;
        let mut sum_xz = 0.0;
        let mut sum_yz = 0.0;
        let mut sum_z2 = 0.0;
        for &member in &self.data.children {
            let p = self.position(member);
            sum_x += p.x;
            sum_y += p.y;
            sum_z += p.z;
            sum_xz += p.x * p.z;
            sum_yz += p.y * p.z;
            sum_z2 += p.z * p.z;
        }
        let d = n * sum_z2 - sum_z * sum_z;
        if d == 0.0 {
            return Ok(self.position(stop) - self.position(start));
        }
        let a1 = (n * sum_yz - sum_z * sum_y) / d;
        let b1 = (n * sum_xz - sum_z * sum_x) / d;
        Ok(Vector3::new(b1, a1, 1.0))
    }

    /// Energy-weighted mean position of the members.
    pub fn center_of_gravity(&self) -> Result<Vector3<f64>> {
        let mut weighted = Vector3::zeros();
        let mut weight = 0.0;
        for &member in &self.data.children {
            weighted += self.energy(member) * self.position(member);
            weight += self.energy(member);
        }
        if weight == 0.0 {
            return Err(Error::ZeroEnergy);
        }
        Ok(weighted / weight)
    }

    /// Outgoing unit direction at an endpoint, averaged over up to
    /// `length` members when `length > 1`.
    pub fn direction_of_endpoint(&self, endpoint: ReseId, length: usize) -> Result<Vector3<f64>> {
        if !self.data.endpoints.contains(&endpoint) {
            return Err(Error::NotAnEndpoint(
                endpoint,
                self.event.n_links(endpoint),
            ));
        }
        let here = self.position(endpoint);
        if length <= 1 {
            let neighbor = self
                .event
                .rese(endpoint)
                .and_then(|r| r.links.first().copied())
                .ok_or(Error::NotAnEndpoint(endpoint, 0))?;
            return Ok((here - self.position(neighbor)).normalize());
        }
        let chain: Vec<ReseId> = self.walk_from(endpoint).collect();
        let reference = if chain.len() <= length {
            chain[chain.len() - 1]
        } else {
            chain[length]
        };
        Ok((here - self.position(reference)).normalize())
    }

    /// Unit direction at the stop point.
    pub fn final_direction(&self) -> Result<Vector3<f64>> {
        let stop = self.data.stop.ok_or(Error::MissingStopPoint(self.id))?;
        let rese = self.event.rese(stop).ok_or(Error::UnknownElement(stop))?;
        if rese.n_links() != 1 {
            return Err(Error::NotAnEndpoint(stop, rese.n_links()));
        }
        Ok((rese.position - self.position(rese.links[0])).normalize())
    }

    /// Deflection angles at each interior member along the walk.
    pub fn deflection_angles(&self) -> Result<Vec<f64>> {
        let members = self.ordered_members()?;
        let mut angles = Vec::new();
        for window in members.windows(3) {
            let a = self.position(window[1]) - self.position(window[0]);
            let b = self.position(window[2]) - self.position(window[1]);
            angles.push(angle_between(&a, &b));
        }
        Ok(angles)
    }

    /// Pearson-correlation straightness score.
    ///
    /// Correlates member energies and deflection angles against the walk
    /// index. With `one_is_good` the raw correlations are averaged
    /// (1 = best); otherwise the score is folded so 0 is best:
    /// (2 − cE − cA)/4 with the angle term, (1 − cE)/2 without.
    pub fn pearson_correlation(&self, one_is_good: bool) -> f64 {
        if self.len() < 2 || self.data.start.is_none() || self.data.stop.is_none() {
            return 0.0;
        }
        let Ok(members) = self.ordered_members() else {
            return 0.0;
        };
        let energies: Vec<f64> = members.iter().map(|&m| self.energy(m)).collect();
        let d_angles = match self.deflection_angles() {
            Ok(angles) => angles,
            Err(_) => return 0.0,
        };

        let score_angle = if d_angles.len() >= 2 {
            pearson_vs_index(&d_angles).unwrap_or(0.0)
        } else {
            0.0
        };
        let score_energy = pearson_vs_index(&energies).unwrap_or_else(|| {
            // degenerate spread counts as fully correlated
            index_correlation_numerator(&energies)
        });

        if one_is_good {
            if d_angles.len() >= 3 {
                (score_energy + score_angle) / 2.0
            } else {
                score_energy
            }
        } else if d_angles.len() >= 3 {
            (2.0 - score_energy - score_angle) / 4.0
        } else {
            (1.0 - score_energy) / 2.0
        }
    }

    /// Spearman rank-correlation straightness score, 0 = best.
    ///
    /// Ranks energies (and, for tracks of at least
    /// [`START_ANGLE_CORRELATION`] members, deflection angles) against
    /// the walk index: (2 − cE − cA)/4 with the angle term, (1 − cE)/2
    /// without.
    pub fn spearman_rank_correlation(&self) -> f64 {
        if self.len() < 2 || self.data.start.is_none() || self.data.stop.is_none() {
            return 0.0;
        }
        let Ok(members) = self.ordered_members() else {
            return 0.0;
        };
        let energies: Vec<f64> = members.iter().map(|&m| self.energy(m)).collect();
        let Ok(d_angles) = self.deflection_angles() else {
            return 0.0;
        };

        let coefficient_energy = if energies.len() >= 2 {
            rank_correlation(&energies)
        } else {
            0.0
        };

        if energies.len() >= START_ANGLE_CORRELATION {
            let coefficient_angle = rank_correlation(&d_angles);
            (2.0 - coefficient_energy - coefficient_angle) / 4.0
        } else {
            (1.0 - coefficient_energy) / 2.0
        }
    }
}

/// Pearson correlation of `values[i]` against the index `i + 1`.
/// `None` when the value spread is degenerate.
fn pearson_vs_index(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    let mut sum_xy = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    for (i, &v) in values.iter().enumerate() {
        let x = (i + 1) as f64;
        sum_xy += x * v;
        sum_x += x;
        sum_y += v;
        sum_x2 += x * x;
        sum_y2 += v * v;
    }
    sum_xy /= n;
    sum_x /= n;
    sum_y /= n;
    sum_x2 /= n;
    sum_y2 /= n;
    let denom = (sum_x2 - sum_x * sum_x).sqrt() * (sum_y2 - sum_y * sum_y).sqrt();
    if denom == 0.0 {
        None
    } else {
        Some((sum_xy - sum_x * sum_y) / denom)
    }
}

/// Covariance numerator used when the denominator degenerates.
fn index_correlation_numerator(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean_x = (n + 1.0) / 2.0;
    let mean_y: f64 = values.iter().sum::<f64>() / n;
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| ((i + 1) as f64 - mean_x) * (v - mean_y))
        .sum::<f64>()
        / n
}

/// Spearman rank correlation of the values against their index:
/// r = 1 − 6 Σ d² / (N (N² − 1)).
fn rank_correlation(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let sum: f64 = order
        .iter()
        .enumerate()
        .map(|(position, &index)| {
            let d = index as f64 - position as f64;
            d * d
        })
        .sum();
    let n = n as f64;
    1.0 - 6.0 * sum / (n * (n * n - 1.0))
}

impl RawEvent {
    /// Orders every two-endpoint track from one endpoint and designates
    /// start and stop. The endpoint with the larger depth becomes the
    /// start when no better information exists.
    pub fn orient_tracks_by_depth(&mut self) -> Result<()> {
        for track in self.tracks() {
            let data = self.track_data(track)?;
            if data.endpoints.len() != 2 || data.start.is_some() {
                continue;
            }
            let (a, b) = (data.endpoints[0], data.endpoints[1]);
            let za = self.rese(a).map_or(0.0, |r| r.position.z);
            let zb = self.rese(b).map_or(0.0, |r| r.position.z);
            let (start, stop) = if za >= zb { (a, b) } else { (b, a) };
            self.set_track_start(track, start)?;
            self.set_track_stop(track, stop)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rese::Hit;
    use approx::assert_relative_eq;

    /// Builds a linked, oriented track from a list of (position, energy).
    fn linked_track(points: &[(f64, f64, f64, f64)]) -> (RawEvent, ReseId) {
        let mut event = RawEvent::new();
        let ids: Vec<ReseId> = points
            .iter()
            .map(|&(x, y, z, e)| event.add_hit(Hit::new(Vector3::new(x, y, z), e)))
            .collect();
        for pair in ids.windows(2) {
            event.link(pair[0], pair[1]);
        }
        event.create_tracks().unwrap();
        let track = event.tracks()[0];
        event.set_track_start(track, ids[0]).unwrap();
        event.set_track_stop(track, ids[ids.len() - 1]).unwrap();
        (event, track)
    }

    #[test]
    fn test_walk_order() {
        let (event, track) = linked_track(&[
            (0.0, 0.0, 0.0, 100.0),
            (0.0, 0.0, -1.0, 90.0),
            (0.0, 0.0, -2.0, 80.0),
        ]);
        let view = event.track(track).unwrap();
        let members = view.ordered_members().unwrap();
        assert_eq!(members.len(), 3);
        let z: Vec<f64> = members
            .iter()
            .map(|&m| event.rese(m).unwrap().position.z)
            .collect();
        assert_eq!(z, vec![0.0, -1.0, -2.0]);
    }

    #[test]
    fn test_average_direction_straight() {
        let (event, track) = linked_track(&[
            (0.0, 0.0, 0.0, 100.0),
            (1.0, 0.0, -1.0, 90.0),
            (2.0, 0.0, -2.0, 80.0),
        ]);
        let view = event.track(track).unwrap();
        let dir = view.average_direction().unwrap();
        // x falls by one per unit z: slope b1 = -1
        assert_relative_eq!(dir.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(dir.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(dir.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_average_direction_degenerate_depth() {
        let (event, track) = linked_track(&[
            (0.0, 0.0, 0.0, 100.0),
            (1.0, 0.0, 0.0, 90.0),
            (2.0, 0.0, 0.0, 80.0),
        ]);
        let view = event.track(track).unwrap();
        let dir = view.average_direction().unwrap();
        assert_relative_eq!(dir.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(dir.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_center_of_gravity() {
        let (event, track) =
            linked_track(&[(0.0, 0.0, 0.0, 100.0), (0.0, 0.0, -2.0, 300.0)]);
        let view = event.track(track).unwrap();
        let cog = view.center_of_gravity().unwrap();
        assert_relative_eq!(cog.z, -1.5);
    }

    #[test]
    fn test_final_direction() {
        let (event, track) = linked_track(&[
            (0.0, 0.0, 0.0, 100.0),
            (0.0, 0.0, -1.0, 90.0),
            (0.0, 1.0, -2.0, 80.0),
        ]);
        let view = event.track(track).unwrap();
        let dir = view.final_direction().unwrap();
        let expected = Vector3::new(0.0, 1.0, -1.0).normalize();
        assert_relative_eq!(dir.x, expected.x, epsilon = 1e-12);
        assert_relative_eq!(dir.y, expected.y, epsilon = 1e-12);
        assert_relative_eq!(dir.z, expected.z, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_perfectly_ordered_short_track() {
        // energies rise with the walk index, so the energy correlation is
        // exactly 1 and the folded score is 0 (best)
        let (event, track) = linked_track(&[
            (0.0, 0.0, 0.0, 100.0),
            (0.0, 0.0, -1.0, 200.0),
            (0.0, 0.0, -2.0, 300.0),
        ]);
        let view = event.track(track).unwrap();
        assert_relative_eq!(view.pearson_correlation(false), 0.0, epsilon = 1e-12);
        assert_relative_eq!(view.pearson_correlation(true), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spearman_perfectly_ordered_short_track() {
        let (event, track) = linked_track(&[
            (0.0, 0.0, 0.0, 100.0),
            (0.0, 0.0, -1.0, 200.0),
            (0.0, 0.0, -2.0, 300.0),
        ]);
        let view = event.track(track).unwrap();
        assert_relative_eq!(view.spearman_rank_correlation(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spearman_uses_angle_term_for_long_tracks() {
        let points: Vec<(f64, f64, f64, f64)> = (0..7)
            .map(|i| {
                let f = f64::from(i);
                // gently increasing kink and energy along the walk
                (0.05 * f * f, 0.0, -f, 100.0 + 10.0 * f)
            })
            .collect();
        let (event, track) = linked_track(&points);
        let view = event.track(track).unwrap();
        let score = view.spearman_rank_correlation();
        assert!(score.is_finite());
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let (event, track) = linked_track(&[
            (0.0, 0.0, 0.0, 100.0),
            (0.3, 0.0, -1.0, 250.0),
            (0.5, 0.1, -2.0, 180.0),
            (0.6, 0.3, -3.0, 90.0),
        ]);
        let view = event.track(track).unwrap();
        let first = view.pearson_correlation(false);
        let second = view.pearson_correlation(false);
        assert_relative_eq!(first, second);
        let first = view.spearman_rank_correlation();
        let second = view.spearman_rank_correlation();
        assert_relative_eq!(first, second);
    }

    #[test]
    fn test_orient_tracks_by_depth() {
        let mut event = RawEvent::new();
        let a = event.add_hit(Hit::new(Vector3::new(0.0, 0.0, -2.0), 100.0));
        let b = event.add_hit(Hit::new(Vector3::new(0.0, 0.0, -1.0), 100.0));
        let c = event.add_hit(Hit::new(Vector3::new(0.0, 0.0, 0.0), 100.0));
        event.link(a, b);
        event.link(b, c);
        event.create_tracks().unwrap();
        event.orient_tracks_by_depth().unwrap();
        let track = event.tracks()[0];
        let data = event.track_data(track).unwrap();
        assert_eq!(data.start, Some(c));
        assert_eq!(data.stop, Some(a));
    }
}
