//! Sequencing strategy for gas / drift-chamber volumes.

use tracing::{debug, warn};

use gammarec_core::{RawEvent, RawEventList, Rese, ReseId};

use crate::error::Result;
use crate::strategy::SequencingStrategy;
use crate::tracker::Tracker;

/// Radius (cm) within which a hit continues an existing chain end.
const SEARCH_RADIUS: f64 = 0.5;

/// Chains gas-volume hits by spatial proximity instead of layer
/// structure.
///
/// Gas hits have no layer ordering, so each track grows from the hit
/// closest to the energy-weighted center of gravity of the unassigned
/// hits, repeatedly attaching the nearest hit within [`SEARCH_RADIUS`]
/// of either chain end. Isolated hits inside a finished track's radius
/// are treated as delta-ray debris and dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct GasStrategy;

impl SequencingStrategy for GasStrategy {
    fn name(&self) -> &'static str {
        "gas"
    }

    fn track_comptons(
        &self,
        tracker: &Tracker,
        event: &RawEvent,
    ) -> Result<Option<RawEventList>> {
        debug!(event = event.event_id(), "chaining gas-volume hits");
        let mut working = event.duplicate();
        let mut finished: Vec<ReseId> = Vec::new();

        let position = |event: &RawEvent, id: ReseId| {
            event
                .rese(id)
                .map_or(nalgebra::Vector3::zeros(), |r| r.position)
        };
        let unassigned = |event: &RawEvent, finished: &[ReseId]| -> Vec<ReseId> {
            event
                .top()
                .iter()
                .copied()
                .filter(|&id| tracker.is_in_tracker(event, id))
                .filter(|&id| !event.rese(id).is_some_and(Rese::is_track))
                .filter(|&id| !finished.contains(&id))
                .collect()
        };

        loop {
            let pool = unassigned(&working, &finished);
            if pool.is_empty() {
                break;
            }

            let mut weight = 0.0;
            let mut center = nalgebra::Vector3::zeros();
            for &id in &pool {
                if let Some(rese) = working.rese(id) {
                    weight += rese.energy;
                    center += rese.energy * rese.position;
                }
            }
            if weight == 0.0 {
                warn!(event = event.event_id(), "gas hits carry no energy");
                break;
            }
            center /= weight;

            let Some(&start) = pool.iter().min_by(|&&a, &&b| {
                let da = (position(&working, a) - center).norm();
                let db = (position(&working, b) - center).norm();
                da.total_cmp(&db)
            }) else {
                break;
            };

            let track = working.new_track();
            working.track_append(track, start, None)?;

            // attach the nearest unassigned hit to either chain end
            loop {
                let endpoints = working.track_data(track)?.endpoints.clone();
                let pool = unassigned(&working, &finished);
                let mut best: Option<(f64, ReseId, ReseId)> = None;
                for &candidate in &pool {
                    for &endpoint in &endpoints {
                        let distance = (position(&working, endpoint)
                            - position(&working, candidate))
                        .norm();
                        if best.as_ref().is_none_or(|b| distance < b.0) {
                            best = Some((distance, endpoint, candidate));
                        }
                    }
                }
                match best {
                    Some((distance, endpoint, candidate)) if distance < SEARCH_RADIUS => {
                        working.track_append(track, candidate, Some(endpoint))?;
                    }
                    _ => break,
                }
            }

            // drop stray hits inside the chain's bounding radius
            let track_center = working.track(track)?.center_of_gravity()?;
            let members = working.track_data(track)?.children.clone();
            let radius = members
                .iter()
                .map(|&id| (position(&working, id) - track_center).norm())
                .fold(0.0, f64::max);
            for id in unassigned(&working, &finished) {
                if (position(&working, id) - track_center).norm() < radius {
                    debug!(event = event.event_id(), hit = %id, "dropping stray gas hit");
                    working.delete(id);
                }
            }

            if members.len() > 1 {
                debug!(
                    event = event.event_id(),
                    track = %track,
                    members = members.len(),
                    "gas track chained"
                );
            } else {
                // a lone hit stays a hit
                working.dissolve_track(track)?;
                finished.push(start);
            }
        }

        let mut list = RawEventList::new();
        list.push(working);
        Ok(Some(list))
    }
}
