//! The tracking orchestrator and its default algorithms.
//!
//! [`Tracker`] drives the per-event-list analysis: pair-vertex search,
//! MIP/shower identification, Compton sequence hypothesis generation,
//! scoring, and pruning. The default algorithms live here; the active
//! [`SequencingStrategy`] overrides individual stages.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use gammarec_core::math::angle_between;
use gammarec_core::{
    EventType, Hit, RawEvent, RawEventList, RejectionReason, Rese, ReseId, TrackerGeometry,
    NO_QUALITY_FACTOR,
};

use crate::config::TrackingConfig;
use crate::error::{Error, Result};
use crate::strategy::SequencingStrategy;

/// Layer window scanned around a pair-vertex candidate.
const VERTEX_SEARCH_RANGE: usize = 30;

/// Pair score below which a tracked pair is discarded.
const PAIR_SCORE_THRESHOLD: f64 = -3.3;

/// Number of search retries when growing pair branches layer by layer.
const PAIR_SEARCH_TRIALS: u32 = 10;

/// Deviation samples averaged when trimming pair branches.
const PAIR_TRIM_EVALUATIONS: usize = 4;

/// Allowed deviation relative to the largest sampled one.
const PAIR_TRIM_FACTOR: f64 = 1.3;

/// Lower bound of the allowed pair-branch deviation (radians).
const PAIR_TRIM_FLOOR: f64 = 8.0 * std::f64::consts::PI / 180.0;

/// Minimum member count of a MIP track.
const MIP_MIN_ELEMENTS: usize = 4;

/// Largest deflection (radians) between consecutive MIP segments.
const MIP_MIN_STRAIGHTNESS: f64 = 0.05;

/// The tracking stage: finds pair vertices, MIP crossings, and Compton
/// electron track sequences in every event of a list.
pub struct Tracker {
    config: TrackingConfig,
    geometry: Arc<dyn TrackerGeometry>,
    strategy: Box<dyn SequencingStrategy>,
    detector_indices: Vec<usize>,
}

impl Tracker {
    /// Creates a tracker over the given geometry.
    ///
    /// Detector names that the geometry does not know are dropped with a
    /// warning; an empty resolved list is a configuration error.
    pub fn new(
        geometry: Arc<dyn TrackerGeometry>,
        config: TrackingConfig,
        strategy: Box<dyn SequencingStrategy>,
    ) -> Result<Self> {
        let mut detector_indices = Vec::new();
        for name in &config.detectors {
            match geometry.detectors().iter().position(|d| &d.name == name) {
                Some(index) => detector_indices.push(index),
                None => warn!(name, "unknown tracking detector ignored"),
            }
        }
        if detector_indices.is_empty() {
            return Err(Error::Config(
                "no valid tracking detector configured, electron tracking impossible".to_string(),
            ));
        }
        Ok(Self {
            config,
            geometry,
            strategy,
            detector_indices,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// The geometry the tracker queries.
    pub fn geometry(&self) -> &dyn TrackerGeometry {
        self.geometry.as_ref()
    }

    /// True when the element sits in one of the tracking detectors.
    /// Tracks are built from tracker elements only, so they qualify.
    pub fn is_in_tracker(&self, event: &RawEvent, id: ReseId) -> bool {
        let Some(rese) = event.rese(id) else {
            return false;
        };
        if rese.is_track() {
            return true;
        }
        self.geometry
            .detector_of(rese.volume)
            .is_some_and(|d| self.detector_indices.contains(&d))
    }

    fn n_tracker_elements(&self, event: &RawEvent) -> usize {
        event
            .top()
            .iter()
            .filter(|&&id| self.is_in_tracker(event, id))
            .count()
    }

    /// Runs the full tracking stage over a list of event incarnations.
    ///
    /// The list is expanded with sequence hypotheses, every hypothesis is
    /// scored, and the list is pruned to the configured keep-count. An
    /// event without at least two tracker elements passes through
    /// untouched.
    pub fn analyze(&self, list: &mut RawEventList) -> Result<()> {
        let trackable = list
            .iter()
            .any(|event| self.n_tracker_elements(event) >= 2);
        if !trackable {
            debug!("no event with at least two tracker elements, skipping tracking");
            return Ok(());
        }

        let mut identified = false;

        if self.config.search_pairs {
            let mut last_vertex = None;
            for i in 0..list.len() {
                let replacement = list
                    .get(i)
                    .and_then(|event| self.strategy.check_for_pair(self, event));
                if let Some(replacement) = replacement {
                    list.as_mut_slice()[i] = replacement;
                    last_vertex = Some(i);
                }
            }
            if let Some(index) = last_vertex {
                for event in list.iter_mut() {
                    if event.vertex().is_some() {
                        self.strategy.track_pairs(self, event)?;
                    }
                }
                list.set_best_try(index);
                list.set_optimum(index);
                identified = true;
            }
        }

        if !identified && self.config.search_mips {
            let mut mip_index = None;
            for (i, event) in list.iter_mut().enumerate() {
                self.check_for_mips(event)?;
                if matches!(event.event_type(), EventType::Mip | EventType::Shower) {
                    mip_index = Some(i);
                    identified = true;
                }
            }
            if let Some(index) = mip_index {
                list.set_best_try(index);
                list.set_optimum(index);
            }
        }

        if !identified && self.config.search_comptons {
            // expand every incarnation into its sequence hypotheses
            let incoming = std::mem::take(list);
            for event in incoming {
                match self.strategy.track_comptons(self, &event)? {
                    Some(hypotheses) => {
                        for hypothesis in hypotheses {
                            list.push(hypothesis);
                        }
                    }
                    None => list.push(event),
                }
            }

            // every undirected track spawns a second hypothesis walking
            // the chain from the opposite endpoint
            let mut e = 0;
            while e < list.len() {
                let tracks = list.as_slice()[e].tracks();
                for track in tracks {
                    let endpoints = {
                        let event = &list.as_slice()[e];
                        match event.track_data(track) {
                            Ok(data) if data.start.is_none() && data.endpoints.len() == 2 => {
                                Some((data.endpoints[0], data.endpoints[1]))
                            }
                            _ => None,
                        }
                    };
                    let Some((first, second)) = endpoints else {
                        continue;
                    };
                    let mut reversed = list.as_slice()[e].duplicate();
                    reversed.set_track_start(track, first)?;
                    reversed.set_track_stop(track, second)?;
                    let event = &mut list.as_mut_slice()[e];
                    event.set_track_start(track, second)?;
                    event.set_track_stop(track, first)?;
                    list.push(reversed);
                }
                e += 1;
            }

            list.as_mut_slice().par_iter_mut().for_each(|event| {
                if let Err(error) = self.strategy.evaluate_tracks(self, event) {
                    debug!(event = event.event_id(), %error, "hypothesis evaluation failed");
                    event.set_track_quality_factor(NO_QUALITY_FACTOR);
                    event.reject(RejectionReason::TrackNotValid);
                }
            });

            list.sort_by_track_quality(!self.strategy.sort_descending());
            list.set_best_try(0);
            list.truncate(self.config.sequences_to_keep);
        }

        Ok(())
    }

    // --- pairs --------------------------------------------------------------

    /// Searches for a pair-conversion vertex: a hit that is alone in its
    /// layer, has nothing directly above, and is followed by a run of
    /// multiply occupied layers below. On success returns a duplicate of
    /// the event with the vertex designated.
    pub(crate) fn default_check_for_pair(&self, event: &RawEvent) -> Option<RawEvent> {
        let mut candidates: Vec<ReseId> = event
            .top()
            .iter()
            .copied()
            .filter(|&id| self.is_in_tracker(event, id))
            .collect();
        candidates.sort_by(|&a, &b| {
            let za = event.rese(a).map_or(0.0, |r| r.position.z);
            let zb = event.rese(b).map_or(0.0, |r| r.position.z);
            zb.total_cmp(&za)
        });

        for &candidate in &candidates {
            let Some(candidate_rese) = event.rese(candidate) else {
                continue;
            };

            let mut alone_in_layer = true;
            let mut above = [0i32; VERTEX_SEARCH_RANGE];
            let mut below = [0i32; VERTEX_SEARCH_RANGE];
            for &other in &candidates {
                if other == candidate {
                    continue;
                }
                let Some(other_rese) = event.rese(other) else {
                    continue;
                };
                let Some(distance) = self.geometry.layer_distance(candidate_rese, other_rese)
                else {
                    continue;
                };
                if distance == 0 {
                    alone_in_layer = false;
                    break;
                }
                let bin = distance.unsigned_abs() as usize;
                if bin < VERTEX_SEARCH_RANGE {
                    if distance > 0 {
                        below[bin] += 1;
                    } else {
                        above[bin] += 1;
                    }
                }
            }
            if !alone_in_layer {
                continue;
            }
            // anything directly above disqualifies a conversion point
            if above[1] != 0 {
                continue;
            }

            let mut start_index = 0usize; // first layer with 2+ hits, twice in a row of three
            let mut stop_index = 0usize; // last occupied layer before a two-layer gap
            let mut busy_layers = 0i32;
            for d in 1..VERTEX_SEARCH_RANGE - 1 {
                if below[d] == 0 && below[d + 1] == 0 {
                    break;
                }
                stop_index = d;
                if start_index == 0 && below[d] > 1 && below[d + 2] > 1 {
                    start_index = d;
                }
                if start_index != 0 && below[d] >= 2 {
                    busy_layers += 1;
                }
            }

            // a single trailing track does not count as pair structure
            let mut d = stop_index;
            while d > 2 {
                if below[d - 1] >= 2 && below[d - 2] >= 2 {
                    break;
                }
                stop_index = d;
                d -= 1;
            }

            let occupancy_fraction =
                f64::from(busy_layers) / (stop_index as f64 - start_index as f64);
            if busy_layers > i32::try_from(self.config.layers_for_vertex_search).unwrap_or(4)
                && occupancy_fraction > 0.5
            {
                debug!(
                    event = event.event_id(),
                    vertex = %candidate,
                    busy_layers,
                    "pair vertex found"
                );
                let mut with_vertex = event.duplicate();
                with_vertex.set_vertex(Some(candidate));
                with_vertex.set_vertex_direction(-1);
                return Some(with_vertex);
            }
        }
        None
    }

    /// Grows the electron and positron branches of a vertex event layer
    /// by layer, trims kinked branch heads, reconciles the two starts
    /// into a common vertex, and scores the result.
    pub(crate) fn default_track_pairs(&self, event: &mut RawEvent) -> Result<()> {
        let vertex = event.vertex().ok_or(gammarec_core::Error::MissingVertex)?;
        let vertex_hit = {
            let rese = event
                .rese(vertex)
                .ok_or(gammarec_core::Error::UnknownElement(vertex))?;
            Hit {
                position: rese.position,
                energy: 0.0,
                time: rese.time,
                position_resolution: rese.position_resolution,
                energy_resolution: rese.energy_resolution,
                time_resolution: rese.time_resolution,
                detector: rese.detector,
                volume: rese.volume,
            }
        };

        debug!(event = event.event_id(), vertex = %vertex, "pair tracking");

        let electron = event.new_track();
        event.track_absorb(electron, vertex)?;
        event.set_track_start(electron, vertex)?;

        // the positron grows from a zero-energy stand-in at the vertex so
        // the conversion energy is not counted twice
        let stand_in = event.add_hit(vertex_hit);
        let positron = event.new_track();
        event.track_absorb(positron, stand_in)?;
        event.set_track_start(positron, stand_in)?;

        let mut electron_stop = vertex;
        let mut positron_stop = stand_in;
        let mut have_electron_direction = false;
        let mut have_positron_direction = false;

        // layer counter in the growth direction; advances even past
        // empty layers, giving up after a fixed number of misses
        let mut step = if event.vertex_direction() < 0 { -1i32 } else { 1 };

        loop {
            let mut layer: Vec<ReseId> = Vec::new();
            let mut trials = 0;
            while layer.is_empty() && trials < PAIR_SEARCH_TRIALS {
                trials += 1;
                let vertex_rese = event
                    .rese(vertex)
                    .ok_or(gammarec_core::Error::UnknownElement(vertex))?;
                for &id in event.top() {
                    if id == electron || id == positron {
                        continue;
                    }
                    if !self.is_in_tracker(event, id) {
                        continue;
                    }
                    let Some(rese) = event.rese(id) else { continue };
                    if rese.is_track() {
                        continue;
                    }
                    // the geometry counts depth positive downward; the
                    // step counter runs the other way
                    if self.geometry.layer_distance(vertex_rese, rese) == Some(-step) {
                        layer.push(id);
                    }
                }
                if step < 0 {
                    step -= 1;
                } else {
                    step += 1;
                }
            }

            if layer.is_empty() {
                break;
            }

            let angle_to = |stop: ReseId, track: ReseId, target: ReseId| -> f64 {
                let Ok(view) = event.track(track) else {
                    return f64::MAX;
                };
                let Ok(direction) = view.final_direction() else {
                    return f64::MAX;
                };
                let stop_position = event.rese(stop).map_or(nalgebra::Vector3::zeros(), |r| r.position);
                let target_position =
                    event.rese(target).map_or(nalgebra::Vector3::zeros(), |r| r.position);
                angle_between(&direction, &(target_position - stop_position))
            };

            let mut best_electron: Option<ReseId> = None;
            let mut best_positron: Option<ReseId> = None;

            if layer.len() == 1 {
                if !have_electron_direction {
                    best_electron = Some(layer[0]);
                } else if !have_positron_direction {
                    best_positron = Some(layer[0]);
                } else if angle_to(electron_stop, electron, layer[0])
                    < angle_to(positron_stop, positron, layer[0])
                {
                    best_electron = Some(layer[0]);
                } else {
                    best_positron = Some(layer[0]);
                }
            } else if !have_electron_direction && !have_positron_direction {
                best_electron = Some(layer[0]);
                best_positron = Some(layer[1]);
            } else if have_electron_direction && !have_positron_direction {
                // straightest continuation for the electron, any other
                // candidate feeds the positron
                let mut best_score = f64::MAX;
                for &id in &layer {
                    let score = angle_to(electron_stop, electron, id);
                    if score < best_score {
                        best_score = score;
                        best_electron = Some(id);
                    }
                }
                best_positron = layer.iter().copied().find(|&id| Some(id) != best_electron);
            } else if !have_electron_direction && have_positron_direction {
                let mut best_score = f64::MAX;
                for &id in &layer {
                    let score = angle_to(positron_stop, positron, id);
                    if score < best_score {
                        best_score = score;
                        best_positron = Some(id);
                    }
                }
                best_electron = layer.iter().copied().find(|&id| Some(id) != best_positron);
            } else {
                // both directions known: the ordered pair minimizing the
                // summed squared angular deviations wins
                let mut best_score = f64::MAX;
                for (r, &first) in layer.iter().enumerate() {
                    for &second in &layer[r + 1..] {
                        for (e_cand, p_cand) in [(first, second), (second, first)] {
                            let ea = angle_to(electron_stop, electron, e_cand);
                            let pa = angle_to(positron_stop, positron, p_cand);
                            let score = ea * ea + pa * pa;
                            if score < best_score {
                                best_score = score;
                                best_electron = Some(e_cand);
                                best_positron = Some(p_cand);
                            }
                        }
                    }
                }
            }

            if let Some(id) = best_electron {
                event.track_append(electron, id, Some(electron_stop))?;
                event.set_track_stop(electron, id)?;
                electron_stop = id;
                have_electron_direction = true;
            }
            if let Some(id) = best_positron {
                event.track_append(positron, id, Some(positron_stop))?;
                event.set_track_stop(positron, id)?;
                positron_stop = id;
                have_positron_direction = true;
            }
        }

        self.eliminate_pair_deviations(event, electron)?;
        self.eliminate_pair_deviations(event, positron)?;

        // the trimming may have moved either start; re-anchor both
        // branches on a shared vertex at the shallower of the two
        let electron_start = event
            .track_data(electron)?
            .start
            .ok_or(gammarec_core::Error::MissingStartPoint(electron))?;
        let positron_start = event
            .track_data(positron)?
            .start
            .ok_or(gammarec_core::Error::MissingStartPoint(positron))?;
        let electron_z = event.rese(electron_start).map_or(0.0, |r| r.position.z);
        let positron_z = event.rese(positron_start).map_or(0.0, |r| r.position.z);

        let clone_hit = |event: &RawEvent, id: ReseId| -> Option<Hit> {
            event.rese(id).map(|r| Hit {
                position: r.position,
                energy: r.energy,
                time: r.time,
                position_resolution: r.position_resolution,
                energy_resolution: r.energy_resolution,
                time_resolution: r.time_resolution,
                detector: r.detector,
                volume: r.volume,
            })
        };

        if electron_z < positron_z {
            if let Some(hit) = clone_hit(event, positron_start) {
                let shared = event.add_hit(hit);
                event.link(electron_start, shared);
                event.track_absorb(electron, shared)?;
                event.set_track_start(electron, shared)?;
                event.set_vertex(Some(shared));
            }
        } else if electron_z > positron_z {
            if let Some(hit) = clone_hit(event, electron_start) {
                let shared = event.add_hit(hit);
                event.link(positron_start, shared);
                event.track_absorb(positron, shared)?;
                event.set_track_start(positron, shared)?;
                event.set_vertex(Some(shared));
            }
        } else {
            event.set_vertex(Some(electron_start));
        }

        // remaining loose elements join the nearer branch
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

        let electron_len = event.track_data(electron)?.children.len();
        let positron_len = event.track_data(positron)?.children.len();
        if electron_len > 2 && positron_len > 2 {
            event.set_electron_track(Some(electron));
            event.set_positron_track(Some(positron));
            self.strategy.evaluate_tracks(self, event)?;
        } else {
            debug!(
                event = event.event_id(),
                electron_len, positron_len, "pair branches too short, dissolving"
            );
            event.dissolve_track(electron)?;
            event.dissolve_track(positron)?;
        }
        Ok(())
    }

    /// Walks a pair branch from its start and discards leading members
    /// that deviate far more than the straightest segments do.
    pub(crate) fn eliminate_pair_deviations(
        &self,
        event: &mut RawEvent,
        track: ReseId,
    ) -> Result<()> {
        let Some(start) = event.track_data(track)?.start else {
            return Ok(());
        };
        if event.n_links(start) != 1 {
            return Ok(());
        }
        let mut chain: Vec<ReseId> = event.track(track)?.walk_from(start).collect();
        if chain.len() < 3 {
            return Ok(());
        }

        let position = |event: &RawEvent, id: ReseId| {
            event
                .rese(id)
                .map_or(nalgebra::Vector3::zeros(), |r| r.position)
        };
        let deviation_at = |event: &RawEvent, a: ReseId, b: ReseId, c: ReseId| {
            let first = position(event, b) - position(event, a);
            let second = position(event, c) - position(event, b);
            angle_between(&first, &second)
        };

        let mut deviations: Vec<f64> = chain
            .windows(3)
            .map(|w| deviation_at(event, w[0], w[1], w[2]))
            .collect();
        if deviations.len() <= PAIR_TRIM_EVALUATIONS {
            return Ok(());
        }
        deviations.sort_by(f64::total_cmp);

        let average: f64 =
            deviations[..PAIR_TRIM_EVALUATIONS].iter().sum::<f64>() / PAIR_TRIM_EVALUATIONS as f64;
        let max_deviation =
            (deviations[PAIR_TRIM_EVALUATIONS - 1] * PAIR_TRIM_FACTOR).max(PAIR_TRIM_FLOOR);

        // first segment at or below the average deviation
        let mut anchor = chain.len() - 3;
        for i in 0..chain.len() - 2 {
            if deviation_at(event, chain[i], chain[i + 1], chain[i + 2]) <= average {
                anchor = i;
                break;
            }
        }

        // walk back toward the start, discarding members that kink the
        // chain beyond the allowed deviation
        let mut best_start = chain[anchor];
        let mut removed: Vec<ReseId> = Vec::new();
        let mut i = anchor;
        while i > 0 {
            let mut s = i - 1;
            let mut deviation = deviation_at(event, chain[s], chain[i], chain[i + 1]);
            while deviation > max_deviation && s > 0 {
                let discarded = chain.remove(s);
                removed.push(discarded);
                s -= 1;
                i -= 1;
                deviation = deviation_at(event, chain[s], chain[i], chain[i + 1]);
            }
            if deviation < max_deviation {
                best_start = chain[s];
                i = s;
            } else {
                removed.push(chain.remove(s));
                break;
            }
        }

        if removed.is_empty() {
            return Ok(());
        }
        for id in removed {
            debug!(event = event.event_id(), member = %id, "trimming kinked branch member");
            event.track_release(track, id)?;
        }
        // releasing cleared links along the walk; restore the chain
        for pair in chain.windows(2) {
            event.link(pair[0], pair[1]);
        }
        let endpoints: Vec<ReseId> = chain
            .iter()
            .copied()
            .filter(|&id| event.n_links(id) == 1)
            .collect();
        event.track_data_mut(track)?.endpoints = endpoints;
        event.set_track_start(track, best_start)?;
        if let Some(&last) = chain.last() {
            event.set_track_stop(track, last)?;
        }
        Ok(())
    }

    // --- MIPs ---------------------------------------------------------------

    /// Looks for straight through-going tracks: exactly one long straight
    /// chain classifies the event as a MIP crossing, several straight
    /// chains as a shower.
    pub(crate) fn check_for_mips(&self, event: &mut RawEvent) -> Result<()> {
        let mut hits: Vec<Option<ReseId>> = event
            .top()
            .iter()
            .copied()
            .filter(|&id| self.is_in_tracker(event, id))
            .map(Some)
            .collect();
        hits.sort_by(|a, b| {
            let z = |id: &Option<ReseId>| {
                id.and_then(|id| event.rese(id)).map_or(0.0, |r| r.position.z)
            };
            z(b).total_cmp(&z(a))
        });

        let position = |event: &RawEvent, id: ReseId| {
            event
                .rese(id)
                .map_or(nalgebra::Vector3::zeros(), |r| r.position)
        };

        // consume straight triple combinations into candidate chains
        let mut candidates: Vec<Vec<ReseId>> = Vec::new();
        for i in 0..hits.len() {
            let Some(first) = hits[i] else { continue };
            for j in i + 1..hits.len() {
                let Some(second) = hits[j] else { continue };
                let mut direction = position(event, second) - position(event, first);
                let mut chain: Vec<ReseId> = Vec::new();
                for k in j + 1..hits.len() {
                    let Some(third) = hits[k] else { continue };
                    let next = position(event, third) - position(event, second);
                    if angle_between(&direction, &next) < MIP_MIN_STRAIGHTNESS {
                        if chain.is_empty() {
                            chain.extend([first, second, third]);
                            hits[i] = None;
                            hits[j] = None;
                        } else {
                            chain.push(third);
                        }
                        hits[k] = None;
                        direction = next;
                    }
                }
                if !chain.is_empty() {
                    candidates.push(chain);
                    break;
                }
            }
        }

        let integrate = |event: &mut RawEvent, members: &[ReseId]| -> Result<ReseId> {
            for pair in members.windows(2) {
                event.link(pair[0], pair[1]);
            }
            let track = event.new_track();
            for &member in members {
                event.track_absorb(track, member)?;
            }
            event.find_endpoints()?;
            event.set_track_start(track, members[0])?;
            event.set_track_stop(track, members[members.len() - 1])?;
            Ok(track)
        };

        if candidates.len() == 1 {
            if candidates[0].len() > MIP_MIN_ELEMENTS {
                let members = candidates.remove(0);
                let track = integrate(event, &members)?;
                self.strategy.evaluate_track(event, track)?;
                event.set_event_type(EventType::Mip);
                event.set_good(true);
                info!(event = event.event_id(), members = members.len(), "MIP found");
            }
        } else if candidates.len() > 1 {
            info!(event = event.event_id(), tracks = candidates.len(), "shower found");
            event.set_event_type(EventType::Shower);
            for members in candidates {
                let track = integrate(event, &members)?;
                self.strategy.evaluate_track(event, track)?;
                event.set_good(true);
            }
        }
        Ok(())
    }

    // --- Comptons -----------------------------------------------------------

    /// Generates the Compton sequence hypotheses for one event.
    ///
    /// Unambiguous layer neighbors are linked directly. With few
    /// remaining ambiguities every alternative linking is branched into
    /// its own hypothesis; with many, a single greedy hypothesis is grown
    /// by repeatedly applying the best continuation.
    pub(crate) fn default_track_comptons(
        &self,
        event: &RawEvent,
    ) -> Result<Option<RawEventList>> {
        // group tracker elements per subsystem, keyed by the signed layer
        // distance to the first element seen there
        let mut masters: Vec<ReseId> = Vec::new();
        let mut dist_lists: Vec<Vec<(ReseId, i32)>> = Vec::new();
        for &id in event.top() {
            if !self.is_in_tracker(event, id) {
                continue;
            }
            let Some(rese) = event.rese(id) else { continue };
            let mut added = false;
            for (m, &master) in masters.iter().enumerate() {
                let Some(master_rese) = event.rese(master) else { continue };
                let Some(dist) = self.geometry.layer_distance(master_rese, rese) else {
                    continue;
                };
                dist_lists[m].push((id, dist));
                added = true;
            }
            if !added {
                masters.push(id);
                dist_lists.push(vec![(id, 0)]);
            }
        }
        for list in &mut dist_lists {
            list.sort_by_key(|&(_, dist)| dist);
        }

        let mut occupancy: Vec<HashMap<i32, u32>> = vec![HashMap::new(); dist_lists.len()];
        for (m, list) in dist_lists.iter().enumerate() {
            for &(_, dist) in list {
                *occupancy[m].entry(dist).or_insert(0) += 1;
            }
        }

        // link everything unambiguous; each link resolves one ambiguity
        let mut seed = event.duplicate();
        let mut n_ambiguities: usize = 0;
        let mut pure_ambiguity = true;
        for (m, list) in dist_lists.iter().enumerate() {
            n_ambiguities += list.len();
            let mut last: Option<(ReseId, i32)> = None;
            for &(id, dist) in list {
                if occupancy[m].get(&dist).copied().unwrap_or(0) != 1 {
                    last = None;
                    continue;
                }
                if let Some((last_id, last_dist)) = last {
                    if (dist - last_dist).unsigned_abs() <= self.config.max_layer_jump {
                        seed.link(id, last_id);
                        n_ambiguities -= 1;
                        pure_ambiguity = false;
                    }
                }
                last = Some((id, dist));
            }
        }

        if pure_ambiguity && self.config.reject_pure_ambiguities {
            info!(event = event.event_id(), "rejecting purely ambiguous event");
            let mut rejected = event.duplicate();
            rejected.reject(RejectionReason::PureAmbiguity);
            let mut list = RawEventList::new();
            list.push(rejected);
            return Ok(Some(list));
        }

        if n_ambiguities <= self.config.max_ambiguities {
            debug!(
                event = event.event_id(),
                n_ambiguities, "branching ambiguous sequences"
            );
            let mut list = RawEventList::new();
            list.push(seed.duplicate());

            for dist_list in &dist_lists {
                for (pos, &(main, main_dist)) in dist_list.iter().enumerate() {
                    if seed.n_links(main) >= 2 {
                        continue;
                    }

                    // partners: entries at the nearest different distance
                    // within the allowed layer jump
                    let mut diff = 0i32;
                    let mut partners: Vec<ReseId> = Vec::new();
                    for &(partner, dist) in &dist_list[pos + 1..] {
                        if dist == main_dist {
                            continue;
                        }
                        if diff == 0 {
                            diff = dist - main_dist;
                        }
                        if diff != dist - main_dist
                            || diff.unsigned_abs() > self.config.max_layer_jump
                        {
                            break;
                        }
                        partners.push(partner);
                    }

                    let snapshot = list.len();
                    let mut spawned: Vec<RawEvent> = Vec::new();
                    for t in 0..snapshot {
                        let Some(incarnation) = list.get(t) else { continue };
                        if incarnation.n_links(main) == 2 {
                            continue;
                        }
                        let is_linked = |a: ReseId, b: ReseId| {
                            incarnation.rese(a).is_some_and(|r| r.is_linked_to(b))
                        };

                        for &p1 in &partners {
                            if is_linked(main, p1) {
                                continue;
                            }
                            if incarnation.n_links(p1) <= 1 {
                                let mut dup = incarnation.duplicate();
                                dup.link(main, p1);
                                spawned.push(dup);
                            }
                        }

                        if incarnation.n_links(main) > 0 {
                            continue;
                        }
                        for (i1, &p1) in partners.iter().enumerate() {
                            if incarnation.n_links(p1) > 1 || is_linked(main, p1) {
                                continue;
                            }
                            for &p2 in &partners[i1 + 1..] {
                                if incarnation.n_links(p2) > 1 || is_linked(main, p2) {
                                    continue;
                                }
                                let mut dup = incarnation.duplicate();
                                dup.link(main, p1);
                                dup.link(main, p2);
                                spawned.push(dup);
                            }
                        }
                    }
                    for dup in spawned {
                        list.push(dup);
                    }
                }
            }

            // upgrade links to tracks, dropping closed loops
            let mut survivors = RawEventList::new();
            for mut hypothesis in list {
                match hypothesis.create_tracks() {
                    Ok(()) => survivors.push(hypothesis),
                    Err(gammarec_core::Error::CircularGraph) => {
                        debug!(event = event.event_id(), "dropping closed-loop hypothesis");
                    }
                    Err(error) => return Err(error.into()),
                }
            }
            if survivors.is_empty() {
                let mut fallback = event.duplicate();
                fallback.clear_links();
                survivors.push(fallback);
            }
            Ok(Some(survivors))
        } else {
            debug!(
                event = event.event_id(),
                n_ambiguities, "greedy high-multiplicity tracking"
            );
            let mut working = seed;
            match working.create_tracks() {
                Ok(()) => {}
                Err(gammarec_core::Error::CircularGraph) => {
                    warn!(event = event.event_id(), "no crystallization point for greedy tracking");
                    return Ok(None);
                }
                Err(error) => return Err(error.into()),
            }

            loop {
                // best continuation over all (track endpoint, neighbor)
                // combinations within the layer jump
                let mut best: Option<(f64, ReseId, ReseId, ReseId, Option<ReseId>)> = None;
                for track in working.tracks() {
                    let endpoints = working.track_data(track)?.endpoints.clone();
                    for endpoint in endpoints {
                        let Ok(direction) =
                            working.track(track)?.direction_of_endpoint(endpoint, 1)
                        else {
                            continue;
                        };
                        let Some(endpoint_rese) = working.rese(endpoint) else { continue };
                        for &other in working.top() {
                            if other == track {
                                continue;
                            }
                            let Some(other_rese) = working.rese(other) else { continue };
                            if other_rese.is_track() {
                                let other_endpoints =
                                    working.track_data(other)?.endpoints.clone();
                                for other_endpoint in other_endpoints {
                                    let Some(oe_rese) = working.rese(other_endpoint) else {
                                        continue;
                                    };
                                    let Some(dist) =
                                        self.geometry.layer_distance(endpoint_rese, oe_rese)
                                    else {
                                        continue;
                                    };
                                    if dist == 0
                                        || dist.unsigned_abs() > self.config.max_layer_jump
                                    {
                                        continue;
                                    }
                                    let angle = angle_between(
                                        &direction,
                                        &(oe_rese.position - endpoint_rese.position),
                                    );
                                    if best.as_ref().is_none_or(|b| angle < b.0) {
                                        best = Some((
                                            angle,
                                            track,
                                            endpoint,
                                            other,
                                            Some(other_endpoint),
                                        ));
                                    }
                                }
                            } else {
                                let Some(dist) =
                                    self.geometry.layer_distance(endpoint_rese, other_rese)
                                else {
                                    continue;
                                };
                                if dist == 0 || dist.unsigned_abs() > self.config.max_layer_jump
                                {
                                    continue;
                                }
                                let angle = angle_between(
                                    &direction,
                                    &(other_rese.position - endpoint_rese.position),
                                );
                                if best.as_ref().is_none_or(|b| angle < b.0) {
                                    best = Some((angle, track, endpoint, other, None));
                                }
                            }
                        }
                    }
                }

                let Some((_, track, endpoint, next, next_endpoint)) = best else {
                    break;
                };
                match next_endpoint {
                    None => {
                        working.track_append(track, next, Some(endpoint))?;
                    }
                    Some(other_endpoint) => {
                        merge_tracks(&mut working, track, endpoint, next, other_endpoint)?;
                    }
                }
            }

            let mut list = RawEventList::new();
            list.push(working);
            Ok(Some(list))
        }
    }

    // --- evaluation ---------------------------------------------------------

    /// Scores one sequence hypothesis: a geometry term favoring fewer
    /// independent elements plus the mean per-track sequence score.
    /// Vertex events are scored as pairs instead.
    pub(crate) fn default_evaluate_tracks(&self, event: &mut RawEvent) -> Result<()> {
        if event.vertex().is_some() {
            return self.default_evaluate_pairs(event);
        }

        let mut n_tracks = 0u32;
        let mut n_remaining = 0u32;
        for &id in event.top() {
            if !self.is_in_tracker(event, id) {
                continue;
            }
            if event.rese(id).is_some_and(Rese::is_track) {
                n_tracks += 1;
            } else {
                n_remaining += 1;
            }
        }
        let mut geometry_score = f64::from(n_tracks + n_remaining);
        if geometry_score != 0.0 {
            geometry_score = 1.0 / geometry_score;
        }
        geometry_score *= 2.0;

        let mut sequence_score = 0.0;
        let tracks = event.tracks();
        for &track in &tracks {
            self.strategy.evaluate_track(event, track)?;
            sequence_score += event.track_data(track)?.quality_factor;
        }
        if n_tracks != 0 {
            sequence_score /= f64::from(n_tracks);
        }

        event.set_track_quality_factor(geometry_score + sequence_score);
        event.set_pair_quality_factor(NO_QUALITY_FACTOR);
        self.classify_sequenced_event(event);
        Ok(())
    }

    /// Marks a scored, still-unclassified hypothesis as a Compton event
    /// and designates its start point from the first ordered track.
    pub(crate) fn classify_sequenced_event(&self, event: &mut RawEvent) {
        if event.event_type() != EventType::Unknown {
            return;
        }
        event.set_event_type(EventType::Compton);
        event.set_good(true);
        if event.start_point().is_none() {
            let start = event
                .tracks()
                .iter()
                .find_map(|&track| event.track_data(track).ok().and_then(|data| data.start));
            event.set_start_point(start);
        }
    }

    /// Geometry term of the default hypothesis score: twice the inverse
    /// count of independent tracker elements.
    pub(crate) fn geometry_score(&self, event: &RawEvent) -> f64 {
        let n = self.n_tracker_elements(event);
        if n == 0 {
            0.0
        } else {
            2.0 / n as f64
        }
    }

    /// Scores a tracked pair: the summed straightness of both branches.
    pub(crate) fn default_evaluate_pairs(&self, event: &mut RawEvent) -> Result<()> {
        let mut score = NO_QUALITY_FACTOR;
        if let (Some(electron), Some(positron)) =
            (event.electron_track(), event.positron_track())
        {
            let electron_score = event.track(electron)?.pearson_correlation(false);
            event.track_data_mut(electron)?.quality_factor = electron_score;
            let positron_score = event.track(positron)?.pearson_correlation(false);
            event.track_data_mut(positron)?.quality_factor = positron_score;
            score = electron_score + positron_score;
        }

        if score < PAIR_SCORE_THRESHOLD {
            debug!(event = event.event_id(), score, "pair below threshold");
            event.set_good(false);
        } else {
            event.set_event_type(EventType::Pair);
            event.set_good(true);
        }
        event.set_pair_quality_factor(score);
        Ok(())
    }

    // --- reporting ----------------------------------------------------------

    /// Multi-line options summary, written into result-file headers.
    pub fn options_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Tracking - FoM options:");
        let _ = writeln!(out, "# ");
        let _ = writeln!(out, "# Strategy:                     {}", self.strategy.name());
        let _ = writeln!(out, "# Search MIPs:                  {}", self.config.search_mips);
        let _ = writeln!(out, "# Search Pairs:                 {}", self.config.search_pairs);
        let _ = writeln!(out, "# Search Comptons:              {}", self.config.search_comptons);
        let _ = writeln!(out, "# Max. number of ambiguities:   {}", self.config.max_ambiguities);
        let _ = writeln!(out, "# Max. layer jump Compton:      {}", self.config.max_layer_jump);
        let _ = writeln!(out, "# Number of sequences to keep:  {}", self.config.sequences_to_keep);
        let _ = writeln!(
            out,
            "# Reject pure ambiguities:      {}",
            self.config.reject_pure_ambiguities
        );
        let extra = self.strategy.extra_options();
        if !extra.is_empty() {
            let _ = write!(out, "{extra}");
        }
        let _ = writeln!(out, "# ");
        out
    }
}

/// Absorbs `from` into `into`, joining the two chains at the given
/// endpoints and keeping all member links intact.
fn merge_tracks(
    event: &mut RawEvent,
    into: ReseId,
    endpoint: ReseId,
    from: ReseId,
    from_endpoint: ReseId,
) -> Result<()> {
    let children = std::mem::take(&mut event.track_data_mut(from)?.children);
    for &child in &children {
        event.track_absorb(into, child)?;
    }
    event.delete(from);
    event.link(endpoint, from_endpoint);

    let members = event.track_data(into)?.children.clone();
    let endpoints: Vec<ReseId> = members
        .iter()
        .copied()
        .filter(|&id| event.n_links(id) == 1)
        .collect();
    event.track_data_mut(into)?.endpoints = endpoints;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pearson::PearsonStrategy;
    use gammarec_core::{DetectorType, LayeredGeometry, VolumeId};
    use nalgebra::Vector3;

    fn geometry(spacing: f64) -> Arc<LayeredGeometry> {
        let mut geo = LayeredGeometry::new(0.0, spacing);
        geo.register_volume(VolumeId(1), 0);
        Arc::new(geo)
    }

    fn tracker_with(config: TrackingConfig) -> Tracker {
        Tracker::new(geometry(1.0), config, Box::new(PearsonStrategy)).unwrap()
    }

    fn tracker() -> Tracker {
        tracker_with(TrackingConfig::default())
    }

    fn hit(x: f64, y: f64, z: f64, energy: f64) -> Hit {
        Hit::new(Vector3::new(x, y, z), energy)
            .with_detector(DetectorType::Strip2D)
            .with_volume(VolumeId(1))
    }

    #[test]
    fn test_unknown_detector_is_config_error() {
        let config = TrackingConfig::new().with_detectors(["nonexistent"]);
        let result = Tracker::new(geometry(1.0), config, Box::new(PearsonStrategy));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_is_in_tracker() {
        let tracker = tracker();
        let mut event = RawEvent::new();
        let inside = event.add_hit(hit(0.0, 0.0, 0.0, 100.0));
        let outside = event.add_hit(Hit::new(Vector3::new(0.0, 0.0, -20.0), 100.0));
        assert!(tracker.is_in_tracker(&event, inside));
        assert!(!tracker.is_in_tracker(&event, outside));
    }

    #[test]
    fn test_analyze_without_tracker_hits_is_noop() {
        let tracker = tracker();
        let mut event = RawEvent::new();
        event.add_hit(Hit::new(Vector3::new(0.0, 0.0, -20.0), 300.0));
        event.add_hit(Hit::new(Vector3::new(1.0, 0.0, -21.0), 300.0));
        let mut list = RawEventList::from_event(event);
        tracker.analyze(&mut list).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(0).unwrap().event_type(), EventType::Unknown);
        assert_eq!(list.get(0).unwrap().tracks().len(), 0);
    }

    #[test]
    fn test_two_hit_compton_sequencing() {
        let config = TrackingConfig::new()
            .with_search_pairs(false)
            .with_search_mips(false);
        let tracker = tracker_with(config);
        let mut event = RawEvent::new();
        event.add_hit(hit(0.0, 0.0, 0.0, 200.0));
        event.add_hit(hit(0.0, 0.0, -1.0, 300.0));
        let mut list = RawEventList::from_event(event);
        tracker.analyze(&mut list).unwrap();

        let best = list.get(0).unwrap();
        assert_eq!(best.event_type(), EventType::Compton);
        assert_eq!(best.tracks().len(), 1);
        assert!(best.track_quality_factor().is_finite());
        assert!(best.track_quality_factor() < NO_QUALITY_FACTOR);
        assert!(best.start_point().is_some());
    }

    #[test]
    fn test_compton_physical_event() {
        let config = TrackingConfig::new()
            .with_search_pairs(false)
            .with_search_mips(false);
        let tracker = tracker_with(config);
        let mut event = RawEvent::new();
        event.add_hit(hit(0.0, 0.0, 0.0, 200.0));
        event.add_hit(hit(0.0, 0.0, -1.0, 300.0));
        let mut list = RawEventList::from_event(event);
        tracker.analyze(&mut list).unwrap();

        let best = list.get_mut(0).unwrap();
        match best.physical_event() {
            gammarec_core::PhysicalEvent::Compton(compton) => {
                assert!((compton.energy_d1 + compton.energy_d2 - 500.0).abs() < 1e-9);
            }
            other => panic!("expected compton, got {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_invariant_after_sequencing() {
        let config = TrackingConfig::new()
            .with_search_pairs(false)
            .with_search_mips(false);
        let tracker = tracker_with(config);
        let mut event = RawEvent::new();
        for i in 0..4 {
            event.add_hit(hit(0.1 * f64::from(i), 0.0, -f64::from(i), 100.0 + f64::from(i)));
        }
        let mut list = RawEventList::from_event(event);
        tracker.analyze(&mut list).unwrap();

        for event in &list {
            for track in event.tracks() {
                let data = event.track_data(track).unwrap();
                for &endpoint in &data.endpoints {
                    assert!(event.n_links(endpoint) <= 1);
                }
            }
        }
    }

    #[test]
    fn test_ambiguity_boundary_branches_or_greedy() {
        // two hits per layer over two layers: every element stays
        // ambiguous, giving 4 unresolved entries
        let build = || {
            let mut event = RawEvent::new();
            event.add_hit(hit(0.0, 0.0, 0.0, 100.0));
            event.add_hit(hit(1.0, 0.0, 0.0, 110.0));
            event.add_hit(hit(0.0, 0.0, -1.0, 120.0));
            event.add_hit(hit(1.0, 0.0, -1.0, 130.0));
            event
        };

        let branching = tracker_with(TrackingConfig::new().with_max_ambiguities(5));
        let hypotheses = branching
            .default_track_comptons(&build())
            .unwrap()
            .unwrap();
        assert!(hypotheses.len() > 1);

        let greedy = tracker_with(TrackingConfig::new().with_max_ambiguities(3));
        let hypotheses = greedy.default_track_comptons(&build()).unwrap().unwrap();
        assert_eq!(hypotheses.len(), 1);
    }

    #[test]
    fn test_pure_ambiguity_rejection() {
        let config = TrackingConfig::new().with_reject_pure_ambiguities(true);
        let tracker = tracker_with(config);
        let mut event = RawEvent::new();
        // two hits in each of two layers: no unambiguous neighbor exists
        event.add_hit(hit(0.0, 0.0, 0.0, 100.0));
        event.add_hit(hit(1.0, 0.0, 0.0, 110.0));
        event.add_hit(hit(0.0, 0.0, -1.0, 120.0));
        event.add_hit(hit(1.0, 0.0, -1.0, 130.0));

        let hypotheses = tracker.default_track_comptons(&event).unwrap().unwrap();
        assert_eq!(hypotheses.len(), 1);
        assert_eq!(
            hypotheses.get(0).unwrap().rejection_reason(),
            RejectionReason::PureAmbiguity
        );
    }

    #[test]
    fn test_mip_detection_and_energy_conservation() {
        let tracker = tracker();
        let mut event = RawEvent::new();
        for i in 0..6 {
            event.add_hit(hit(0.0, 0.0, -f64::from(i), 150.0));
        }
        tracker.check_for_mips(&mut event).unwrap();
        assert_eq!(event.event_type(), EventType::Mip);
        assert!(event.is_good());
        assert_eq!(event.tracks().len(), 1);

        match event.physical_event() {
            gammarec_core::PhysicalEvent::Muon(muon) => {
                assert!((muon.energy - 900.0).abs() < 1e-9);
            }
            other => panic!("expected muon, got {other:?}"),
        }
    }

    #[test]
    fn test_short_straight_chain_is_not_a_mip() {
        let tracker = tracker();
        let mut event = RawEvent::new();
        for i in 0..4 {
            event.add_hit(hit(0.0, 0.0, -f64::from(i), 150.0));
        }
        tracker.check_for_mips(&mut event).unwrap();
        assert_eq!(event.event_type(), EventType::Unknown);
        assert!(event.tracks().is_empty());
    }

    #[test]
    fn test_pair_vertex_detection() {
        let tracker = tracker();
        let mut event = RawEvent::new();
        // isolated conversion point followed by many doubly occupied layers
        event.add_hit(hit(0.0, 0.0, 0.0, 500.0));
        for i in 1..=8 {
            let z = -f64::from(i);
            let spread = 0.2 * f64::from(i);
            event.add_hit(hit(spread, 0.0, z, 200.0));
            event.add_hit(hit(-spread, 0.0, z, 200.0));
        }

        let with_vertex = tracker.default_check_for_pair(&event).unwrap();
        assert!(with_vertex.vertex().is_some());
        assert_eq!(with_vertex.vertex_direction(), -1);
        // the original stays untouched
        assert!(event.vertex().is_none());
    }

    #[test]
    fn test_no_vertex_in_single_track_pattern() {
        let tracker = tracker();
        let mut event = RawEvent::new();
        for i in 0..8 {
            event.add_hit(hit(0.0, 0.0, -f64::from(i), 200.0));
        }
        assert!(tracker.default_check_for_pair(&event).is_none());
    }

    #[test]
    fn test_pair_tracking_round_trip() {
        let tracker = tracker();
        let mut event = RawEvent::new();
        event.add_hit(hit(0.0, 0.0, 0.0, 500.0));
        for i in 1..=8 {
            let z = -f64::from(i);
            let spread = 0.2 * f64::from(i);
            event.add_hit(hit(spread, 0.0, z, 200.0));
            event.add_hit(hit(-spread, 0.0, z, 200.0));
        }
        let mut list = RawEventList::from_event(event);
        tracker.analyze(&mut list).unwrap();

        let best = list.best_try().unwrap();
        assert_eq!(best.event_type(), EventType::Pair);
        assert!(best.is_good());
        assert!(best.vertex().is_some());
        let electron = best.electron_track().unwrap();
        let positron = best.positron_track().unwrap();
        assert!(best.track_data(electron).unwrap().children.len() > 2);
        assert!(best.track_data(positron).unwrap().children.len() > 2);
        assert!(best.pair_quality_factor().is_finite());
    }

    #[test]
    fn test_sequences_to_keep_truncates() {
        let config = TrackingConfig::new()
            .with_search_pairs(false)
            .with_search_mips(false)
            .with_sequences_to_keep(2);
        let tracker = tracker_with(config);
        let mut event = RawEvent::new();
        event.add_hit(hit(0.0, 0.0, 0.0, 100.0));
        event.add_hit(hit(1.0, 0.0, 0.0, 110.0));
        event.add_hit(hit(0.0, 0.0, -1.0, 120.0));
        event.add_hit(hit(1.0, 0.0, -1.0, 130.0));
        let mut list = RawEventList::from_event(event);
        tracker.analyze(&mut list).unwrap();
        assert_eq!(list.len(), 2);
        // ranked descending: the best hypothesis comes first
        assert!(
            list.get(0).unwrap().track_quality_factor()
                >= list.get(1).unwrap().track_quality_factor()
        );
    }

    #[test]
    fn test_options_string_is_stable() {
        let tracker = tracker();
        let options = tracker.options_string();
        assert!(options.contains("# Search MIPs:"));
        assert!(options.contains("# Search Pairs:"));
        assert!(options.contains("# Search Comptons:"));
        assert!(options.contains("# Max. number of ambiguities:   5"));
        assert!(options.contains("# Max. layer jump Compton:      1"));
        assert!(options.contains("# Number of sequences to keep:  1"));
        assert!(options.contains("# Reject pure ambiguities:      false"));
    }

    #[test]
    fn test_merge_tracks_keeps_links() {
        let mut event = RawEvent::new();
        let a = event.add_hit(hit(0.0, 0.0, 0.0, 100.0));
        let b = event.add_hit(hit(0.0, 0.0, -1.0, 100.0));
        let c = event.add_hit(hit(0.0, 0.0, -2.0, 100.0));
        let d = event.add_hit(hit(0.0, 0.0, -3.0, 100.0));
        event.link(a, b);
        event.link(c, d);
        event.create_tracks().unwrap();
        let tracks = event.tracks();
        assert_eq!(tracks.len(), 2);

        merge_tracks(&mut event, tracks[0], b, tracks[1], c).unwrap();
        assert_eq!(event.tracks().len(), 1);
        let data = event.track_data(tracks[0]).unwrap();
        assert_eq!(data.children.len(), 4);
        assert_eq!(data.endpoints.len(), 2);
        assert_eq!(event.n_links(b), 2);
        assert_eq!(event.n_links(c), 2);
    }
}
