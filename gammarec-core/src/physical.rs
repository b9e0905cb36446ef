//! Physical-event summaries materialized from reconstructed raw events.
//!
//! The raw event keeps the full interaction graph; downstream analysis
//! wants a compact summary per classification. Materialization is lazy
//! and cached; changing the event type invalidates the cache.

use nalgebra::Vector3;

use crate::event::{EventType, RawEvent};
use crate::rese::ReseId;

/// Compact summary of a Compton scatter event.
#[derive(Debug, Clone, PartialEq)]
pub struct ComptonEvent {
    /// Energy of the first interaction (keV).
    pub energy_d1: f64,
    /// Energy of everything after the first interaction (keV).
    pub energy_d2: f64,
    /// Energy resolution of the first interaction (keV).
    pub energy_resolution_d1: f64,
    /// Energy resolution of the remainder (keV).
    pub energy_resolution_d2: f64,
    /// Position of the first interaction (cm).
    pub position_d1: Vector3<f64>,
    /// Position of the second interaction (cm).
    pub position_d2: Vector3<f64>,
    /// Recoil electron direction, when a track starts the sequence.
    pub electron_direction: Option<Vector3<f64>>,
    /// Quality factor of the electron track, when present.
    pub track_quality_factor: Option<f64>,
    /// Number of interaction sites in the sequence.
    pub sequence_length: usize,
    /// Smallest distance between consecutive interaction sites (cm).
    pub lever_arm: f64,
    /// Quality factor of the best sequence ordering.
    pub compton_quality_factor1: f64,
    /// Quality factor of the second best ordering.
    pub compton_quality_factor2: f64,
    /// Quality factor of the clustering stage.
    pub clustering_quality_factor: f64,
}

/// Compact summary of a pair-production event.
#[derive(Debug, Clone, PartialEq)]
pub struct PairEvent {
    /// Pair production point (cm).
    pub vertex: Vector3<f64>,
    /// Electron branch energy (keV).
    pub electron_energy: f64,
    /// Positron branch energy (keV).
    pub positron_energy: f64,
    /// Electron branch direction (unit vector).
    pub electron_direction: Vector3<f64>,
    /// Positron branch direction (unit vector).
    pub positron_direction: Vector3<f64>,
    /// Energy deposited at the vertex itself (keV).
    pub initial_energy_deposit: f64,
    /// Pair quality factor.
    pub quality_factor: f64,
}

/// Compact summary of a single-site photo absorption.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoEvent {
    /// Deposited energy (keV).
    pub energy: f64,
    /// Interaction position (cm).
    pub position: Vector3<f64>,
}

/// Compact summary of a minimum-ionizing particle crossing.
#[derive(Debug, Clone, PartialEq)]
pub struct MuonEvent {
    /// Total deposited energy (keV).
    pub energy: f64,
    /// Average direction of the muon track (unit vector).
    pub direction: Vector3<f64>,
    /// Energy-weighted centroid of the track (cm).
    pub center_of_gravity: Vector3<f64>,
}

/// Summary of an event that could not be reconstructed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnidentifiableEvent {
    /// Long-form rejection description.
    pub reason: String,
}

/// The materialized physical interpretation of one raw event.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalEvent {
    /// Compton scatter sequence.
    Compton(ComptonEvent),
    /// Electron/positron pair.
    Pair(PairEvent),
    /// Photo absorption.
    Photo(PhotoEvent),
    /// Minimum-ionizing particle.
    Muon(MuonEvent),
    /// Nothing reconstructible.
    Unidentifiable(UnidentifiableEvent),
}

impl PhysicalEvent {
    /// The event type this summary corresponds to.
    pub fn event_type(&self) -> EventType {
        match self {
            PhysicalEvent::Compton(_) => EventType::Compton,
            PhysicalEvent::Pair(_) => EventType::Pair,
            PhysicalEvent::Photo(_) => EventType::Photo,
            PhysicalEvent::Muon(_) => EventType::Mip,
            PhysicalEvent::Unidentifiable(_) => EventType::Unknown,
        }
    }

    /// Total energy carried by this summary.
    pub fn energy(&self) -> f64 {
        match self {
            PhysicalEvent::Compton(c) => c.energy_d1 + c.energy_d2,
            PhysicalEvent::Pair(p) => p.electron_energy + p.positron_energy,
            PhysicalEvent::Photo(p) => p.energy,
            PhysicalEvent::Muon(m) => m.energy,
            PhysicalEvent::Unidentifiable(_) => 0.0,
        }
    }
}

impl RawEvent {
    /// Materializes (and caches) the physical interpretation of the
    /// current reconstruction state.
    pub fn physical_event(&mut self) -> &PhysicalEvent {
        if self.physical.is_none() {
            let materialized = self.materialize();
            self.physical = Some(materialized);
        }
        // populated directly above
        match &self.physical {
            Some(physical) => physical,
            None => unreachable!(),
        }
    }

    fn materialize(&self) -> PhysicalEvent {
        match self.event_type() {
            EventType::Compton => self.materialize_compton(),
            EventType::Pair => self.materialize_pair(),
            EventType::Photo => self.materialize_photo(),
            EventType::Mip => self.materialize_muon(),
            EventType::Shower | EventType::Unknown => self.materialize_unidentifiable(),
        }
    }

    fn materialize_compton(&self) -> PhysicalEvent {
        let Some(start) = self.start_point() else {
            return self.materialize_unidentifiable();
        };
        let Some(start_rese) = self.rese(start) else {
            return self.materialize_unidentifiable();
        };
        let Some(&second) = start_rese.links.first() else {
            return self.materialize_unidentifiable();
        };
        let Some(second_rese) = self.rese(second) else {
            return self.materialize_unidentifiable();
        };

        let total = self.total_energy();
        let energy_d1 = start_rese.energy;
        let energy_d2 = total - energy_d1;
        let total_res_sq: f64 = self
            .top()
            .iter()
            .filter_map(|&id| self.rese(id))
            .map(|r| r.energy_resolution * r.energy_resolution)
            .sum();
        let res_d1 = start_rese.energy_resolution;
        let res_d2 = (total_res_sq - res_d1 * res_d1).max(0.0).sqrt();

        // walk the top-level sequence for length and lever arm
        let mut sequence = vec![start];
        let mut previous = None;
        let mut current = start;
        while let Some(next) = self
            .rese(current)
            .and_then(|r| r.links.iter().copied().find(|&l| Some(l) != previous))
        {
            sequence.push(next);
            previous = Some(current);
            current = next;
        }
        let mut lever_arm = f64::MAX;
        for pair in sequence.windows(2) {
            let d = self.min_distance(pair[0], pair[1]);
            if d < lever_arm {
                lever_arm = d;
            }
        }

        let (electron_direction, track_quality_factor) = match self.track(start) {
            Ok(view) => {
                let direction = view.average_direction().ok().map(|d| d.normalize());
                (direction, Some(view.data().quality_factor))
            }
            Err(_) => (None, None),
        };

        PhysicalEvent::Compton(ComptonEvent {
            energy_d1,
            energy_d2,
            energy_resolution_d1: res_d1,
            energy_resolution_d2: res_d2,
            position_d1: start_rese.position,
            position_d2: second_rese.position,
            electron_direction,
            track_quality_factor,
            sequence_length: sequence.len(),
            lever_arm,
            compton_quality_factor1: self.compton_quality_factor(),
            compton_quality_factor2: self.compton_quality_factor2(),
            clustering_quality_factor: self.clustering_quality_factor(),
        })
    }

    fn materialize_pair(&self) -> PhysicalEvent {
        let (Some(vertex), Some(electron), Some(positron)) = (
            self.vertex(),
            self.electron_track(),
            self.positron_track(),
        ) else {
            return self.materialize_unidentifiable();
        };
        let (Ok(electron_view), Ok(positron_view)) =
            (self.track(electron), self.track(positron))
        else {
            return self.materialize_unidentifiable();
        };
        let (Ok(electron_dir), Ok(positron_dir)) = (
            electron_view.average_direction(),
            positron_view.average_direction(),
        ) else {
            return self.materialize_unidentifiable();
        };
        let Some(vertex_rese) = self.rese(vertex) else {
            return self.materialize_unidentifiable();
        };

        let electron_energy = self.rese(electron).map_or(0.0, |r| r.energy);
        let positron_energy = self.rese(positron).map_or(0.0, |r| r.energy);

        PhysicalEvent::Pair(PairEvent {
            vertex: vertex_rese.position,
            electron_energy,
            positron_energy,
            electron_direction: normalize_or_zero(electron_dir),
            positron_direction: normalize_or_zero(positron_dir),
            initial_energy_deposit: vertex_rese.energy,
            quality_factor: self.pair_quality_factor(),
        })
    }

    fn materialize_photo(&self) -> PhysicalEvent {
        let Some(&only) = self.top().first() else {
            return self.materialize_unidentifiable();
        };
        let Some(rese) = self.rese(only) else {
            return self.materialize_unidentifiable();
        };
        PhysicalEvent::Photo(PhotoEvent {
            energy: rese.energy,
            position: rese.position,
        })
    }

    fn materialize_muon(&self) -> PhysicalEvent {
        // the longest track carries the muon
        let mut best: Option<ReseId> = None;
        let mut best_len = 0;
        for track in self.tracks() {
            if let Ok(data) = self.track_data(track) {
                if data.children.len() > best_len {
                    best_len = data.children.len();
                    best = Some(track);
                }
            }
        }
        let Some(track) = best else {
            return self.materialize_unidentifiable();
        };
        let Ok(view) = self.track(track) else {
            return self.materialize_unidentifiable();
        };
        let (Ok(direction), Ok(center_of_gravity)) =
            (view.average_direction(), view.center_of_gravity())
        else {
            return self.materialize_unidentifiable();
        };
        PhysicalEvent::Muon(MuonEvent {
            energy: self.total_energy(),
            direction: normalize_or_zero(direction),
            center_of_gravity,
        })
    }

    fn materialize_unidentifiable(&self) -> PhysicalEvent {
        PhysicalEvent::Unidentifiable(UnidentifiableEvent {
            reason: self.rejection_reason().long().to_string(),
        })
    }
}

fn normalize_or_zero(v: Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm == 0.0 {
        v
    } else {
        v / norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rese::Hit;
    use approx::assert_relative_eq;

    #[test]
    fn test_photo_materialization() {
        let mut event = RawEvent::new();
        event.add_hit(Hit::new(Vector3::new(1.0, 2.0, 3.0), 662.0));
        event.set_event_type(EventType::Photo);
        match event.physical_event() {
            PhysicalEvent::Photo(photo) => {
                assert_relative_eq!(photo.energy, 662.0);
                assert_relative_eq!(photo.position.z, 3.0);
            }
            other => panic!("expected photo event, got {other:?}"),
        }
    }

    #[test]
    fn test_compton_materialization() {
        let mut event = RawEvent::new();
        let a = event.add_hit(
            Hit::new(Vector3::new(0.0, 0.0, 0.0), 200.0).with_energy_resolution(5.0),
        );
        let b = event.add_hit(
            Hit::new(Vector3::new(0.0, 0.0, -5.0), 300.0).with_energy_resolution(4.0),
        );
        event.link(a, b);
        event.set_start_point(Some(a));
        event.set_event_type(EventType::Compton);
        match event.physical_event() {
            PhysicalEvent::Compton(compton) => {
                assert_relative_eq!(compton.energy_d1, 200.0);
                assert_relative_eq!(compton.energy_d2, 300.0);
                assert_relative_eq!(compton.lever_arm, 5.0);
                assert_eq!(compton.sequence_length, 2);
                assert_relative_eq!(compton.energy_resolution_d1, 5.0);
                assert_relative_eq!(compton.energy_resolution_d2, 4.0);
            }
            other => panic!("expected compton event, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_materializes_unidentifiable() {
        let mut event = RawEvent::new();
        event.add_hit(Hit::new(Vector3::zeros(), 100.0));
        event.reject(crate::RejectionReason::SingleSiteEvent);
        match event.physical_event() {
            PhysicalEvent::Unidentifiable(summary) => {
                assert!(summary.reason.contains("single interaction site"));
            }
            other => panic!("expected unidentifiable event, got {other:?}"),
        }
    }

    #[test]
    fn test_compton_without_start_degrades() {
        let mut event = RawEvent::new();
        event.add_hit(Hit::new(Vector3::zeros(), 100.0));
        event.set_event_type(EventType::Compton);
        assert!(matches!(
            event.physical_event(),
            PhysicalEvent::Unidentifiable(_)
        ));
    }
}
