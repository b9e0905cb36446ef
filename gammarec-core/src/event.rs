//! The raw event: arena of sub-elements plus reconstruction bookkeeping.
//!
//! A [`RawEvent`] owns every RESE of one event in an id-addressed arena.
//! Hypothesis branching duplicates the whole arena; ids stay stable across
//! duplication, so link and containment references survive the copy.

use nalgebra::Vector3;
use tracing::debug;

use crate::error::{Error, Result};
use crate::rejection::RejectionReason;
use crate::rese::{Hit, Rese, ReseId, ReseKind, TrackData};
use crate::NO_QUALITY_FACTOR;

/// Classification of a reconstructed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventType {
    /// Not yet classified.
    #[default]
    Unknown,
    /// Compton scatter sequence.
    Compton,
    /// Electron/positron pair.
    Pair,
    /// Minimum ionizing particle (muon).
    Mip,
    /// Multiple near-straight sub-tracks.
    Shower,
    /// Single-site photo absorption.
    Photo,
}

impl EventType {
    /// Human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Unknown => "Unknown",
            EventType::Compton => "Compton",
            EventType::Pair => "Pair",
            EventType::Mip => "MIP",
            EventType::Shower => "Shower",
            EventType::Photo => "Photo",
        }
    }
}

/// An externally measured direction attached to one sub-element, supplied
/// by detectors with intrinsic direction measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalMeasurement {
    /// The sub-element the measurement belongs to.
    pub rese: ReseId,
    /// Measured electron direction (unit vector).
    pub direction: Vector3<f64>,
}

/// One event's full interaction graph plus reconstruction state.
#[derive(Debug, Clone)]
pub struct RawEvent {
    slots: Vec<Option<Rese>>,
    top: Vec<ReseId>,
    event_id: u64,
    event_time: f64,
    event_type: EventType,
    good: bool,
    rejection: RejectionReason,
    vertex: Option<ReseId>,
    vertex_direction: i32,
    electron_track: Option<ReseId>,
    positron_track: Option<ReseId>,
    start_point: Option<ReseId>,
    measurements: Vec<DirectionalMeasurement>,
    clustering_quality_factor: f64,
    compton_quality_factor1: f64,
    compton_quality_factor2: f64,
    track_quality_factor: f64,
    pair_quality_factor: f64,
    pub(crate) physical: Option<crate::physical::PhysicalEvent>,
}

impl Default for RawEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl RawEvent {
    /// Creates an empty event.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            top: Vec::new(),
            event_id: 0,
            event_time: 0.0,
            event_type: EventType::Unknown,
            good: false,
            rejection: RejectionReason::None,
            vertex: None,
            vertex_direction: 0,
            electron_track: None,
            positron_track: None,
            start_point: None,
            measurements: Vec::new(),
            clustering_quality_factor: NO_QUALITY_FACTOR,
            compton_quality_factor1: NO_QUALITY_FACTOR,
            compton_quality_factor2: NO_QUALITY_FACTOR,
            track_quality_factor: NO_QUALITY_FACTOR,
            pair_quality_factor: NO_QUALITY_FACTOR,
            physical: None,
        }
    }

    /// Deep copy for hypothesis branching. Ids are preserved; the copy
    /// shares nothing with the original.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    // --- identity ---------------------------------------------------------

    /// Numerical event id.
    pub fn event_id(&self) -> u64 {
        self.event_id
    }

    /// Sets the numerical event id.
    pub fn set_event_id(&mut self, id: u64) {
        self.event_id = id;
    }

    /// Event time (s).
    pub fn event_time(&self) -> f64 {
        self.event_time
    }

    /// Sets the event time.
    pub fn set_event_time(&mut self, time: f64) {
        self.event_time = time;
    }

    // --- arena ------------------------------------------------------------

    /// Access a sub-element, `None` for deleted or foreign ids.
    pub fn rese(&self, id: ReseId) -> Option<&Rese> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutable access to a sub-element.
    pub fn rese_mut(&mut self, id: ReseId) -> Option<&mut Rese> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// All live sub-element ids, including ones absorbed into containers.
    pub fn ids(&self) -> impl Iterator<Item = ReseId> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|rese| rese.id))
    }

    /// Top-level sub-elements: everything not absorbed into a container.
    pub fn top(&self) -> &[ReseId] {
        &self.top
    }

    /// Number of top-level sub-elements.
    pub fn n_top(&self) -> usize {
        self.top.len()
    }

    /// Adds a measured hit as a top-level element.
    pub fn add_hit(&mut self, hit: Hit) -> ReseId {
        let id = ReseId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        self.slots.push(Some(Rese::from_hit(id, hit)));
        self.top.push(id);
        self.physical = None;
        id
    }

    /// Adds a pre-grouped cluster of hits as one top-level element.
    ///
    /// The child hits are created inside the event but not placed at top
    /// level; the cluster carries the energy-weighted centroid.
    pub fn add_cluster(&mut self, hits: &[Hit]) -> Result<ReseId> {
        let total: f64 = hits.iter().map(|h| h.energy).sum();
        if total <= 0.0 {
            return Err(Error::ZeroEnergy);
        }
        let mut children = Vec::with_capacity(hits.len());
        for &hit in hits {
            let id = ReseId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
            self.slots.push(Some(Rese::from_hit(id, hit)));
            children.push(id);
        }
        let position = hits
            .iter()
            .fold(Vector3::zeros(), |acc, h| acc + h.energy * h.position)
            / total;
        let time = hits.iter().map(|h| h.time).fold(f64::MAX, f64::min);
        let first = hits[0];
        let id = ReseId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        let mut rese = Rese::from_hit(
            id,
            Hit {
                position,
                energy: total,
                time,
                ..first
            },
        );
        rese.kind = ReseKind::Cluster { children };
        self.slots.push(Some(rese));
        self.top.push(id);
        self.physical = None;
        Ok(id)
    }

    /// Creates an empty track node at top level.
    pub fn new_track(&mut self) -> ReseId {
        let id = ReseId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        self.slots.push(Some(Rese::empty_track(id)));
        self.top.push(id);
        self.physical = None;
        id
    }

    /// Removes an element (and everything it contains) from the event.
    pub fn delete(&mut self, id: ReseId) {
        if let Some(rese) = self.rese(id) {
            let children: Vec<ReseId> = rese.children().to_vec();
            for child in children {
                self.delete(child);
            }
        }
        self.top.retain(|&t| t != id);
        // drop dangling links to the removed element
        for slot in self.slots.iter_mut().flatten() {
            slot.links.retain(|&l| l != id);
        }
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = None;
        }
        self.physical = None;
    }

    // --- links ------------------------------------------------------------

    /// Adds a bidirectional link between two elements.
    pub fn link(&mut self, a: ReseId, b: ReseId) {
        self.link_one_way(a, b);
        self.link_one_way(b, a);
    }

    /// Adds a one-sided link from `a` to `b`. One-sided links are
    /// reconciled by [`RawEvent::find_endpoints`].
    pub fn link_one_way(&mut self, a: ReseId, b: ReseId) {
        if let Some(rese) = self.rese_mut(a) {
            if !rese.links.contains(&b) {
                rese.links.push(b);
            }
        }
    }

    /// Removes the link between two elements in both directions.
    pub fn unlink(&mut self, a: ReseId, b: ReseId) {
        if let Some(rese) = self.rese_mut(a) {
            rese.links.retain(|&l| l != b);
        }
        if let Some(rese) = self.rese_mut(b) {
            rese.links.retain(|&l| l != a);
        }
    }

    /// Removes every link in the event.
    pub fn clear_links(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.links.clear();
        }
    }

    /// Number of links of an element (0 for unknown ids).
    pub fn n_links(&self, id: ReseId) -> usize {
        self.rese(id).map_or(0, Rese::n_links)
    }

    // --- containment ------------------------------------------------------

    /// Moves `child` (currently at top level) into `track`, updating the
    /// track's aggregate position, energy, and time.
    pub fn track_absorb(&mut self, track: ReseId, child: ReseId) -> Result<()> {
        if self.rese(child).is_none() {
            return Err(Error::UnknownElement(child));
        }
        self.top.retain(|&t| t != child);
        let (child_pos, child_energy, child_time) = {
            let c = self.rese(child).ok_or(Error::UnknownElement(child))?;
            (c.position, c.energy, c.time)
        };
        let rese = self.rese_mut(track).ok_or(Error::UnknownElement(track))?;
        let Some(data) = rese.as_track_mut() else {
            return Err(Error::NotATrack(track));
        };
        if !data.children.contains(&child) {
            data.children.push(child);
        }
        self.update_track_aggregates(track, child_pos, child_energy, child_time);
        self.physical = None;
        Ok(())
    }

    fn update_track_aggregates(
        &mut self,
        track: ReseId,
        child_pos: Vector3<f64>,
        child_energy: f64,
        child_time: f64,
    ) {
        if let Some(rese) = self.rese_mut(track) {
            let old_energy = rese.energy;
            rese.energy += child_energy;
            if rese.energy > 0.0 {
                rese.position =
                    (old_energy * rese.position + child_energy * child_pos) / rese.energy;
            } else {
                rese.position = child_pos;
            }
            rese.time = rese.time.min(child_time);
        }
    }

    /// Removes `child` from `track`, returning it to top level; the
    /// track's aggregates are recomputed and links of the child removed.
    pub fn track_release(&mut self, track: ReseId, child: ReseId) -> Result<()> {
        let links: Vec<ReseId> = self
            .rese(child)
            .ok_or(Error::UnknownElement(child))?
            .links
            .clone();
        for other in links {
            self.unlink(child, other);
        }
        let rese = self.rese_mut(track).ok_or(Error::UnknownElement(track))?;
        let Some(data) = rese.as_track_mut() else {
            return Err(Error::NotATrack(track));
        };
        data.children.retain(|&c| c != child);
        data.endpoints.retain(|&e| e != child);
        if data.start == Some(child) {
            data.start = None;
        }
        if data.stop == Some(child) {
            data.stop = None;
        }
        self.top.push(child);
        self.recompute_track_aggregates(track)?;
        self.physical = None;
        Ok(())
    }

    /// Dissolves a track: children return to top level with their links
    /// cleared, the track node is removed.
    pub fn dissolve_track(&mut self, track: ReseId) -> Result<()> {
        let children: Vec<ReseId> = {
            let rese = self.rese(track).ok_or(Error::UnknownElement(track))?;
            rese.as_track().ok_or(Error::NotATrack(track))?.children.clone()
        };
        for child in children {
            let links: Vec<ReseId> = self
                .rese(child)
                .map(|c| c.links.clone())
                .unwrap_or_default();
            for other in links {
                self.unlink(child, other);
            }
            self.top.push(child);
        }
        self.top.retain(|&t| t != track);
        if let Some(slot) = self.slots.get_mut(track.index()) {
            *slot = None;
        }
        if self.electron_track == Some(track) {
            self.electron_track = None;
        }
        if self.positron_track == Some(track) {
            self.positron_track = None;
        }
        self.physical = None;
        Ok(())
    }

    fn recompute_track_aggregates(&mut self, track: ReseId) -> Result<()> {
        let children: Vec<ReseId> = {
            let rese = self.rese(track).ok_or(Error::UnknownElement(track))?;
            rese.as_track().ok_or(Error::NotATrack(track))?.children.clone()
        };
        let mut energy = 0.0;
        let mut weighted = Vector3::zeros();
        let mut time = f64::MAX;
        for child in &children {
            if let Some(c) = self.rese(*child) {
                energy += c.energy;
                weighted += c.energy * c.position;
                time = time.min(c.time);
            }
        }
        if let Some(rese) = self.rese_mut(track) {
            rese.energy = energy;
            rese.position = if energy > 0.0 { weighted / energy } else { Vector3::zeros() };
            rese.time = time;
        }
        Ok(())
    }

    // --- aggregate queries -------------------------------------------------

    /// Total energy of the event: sum over all top-level elements.
    pub fn total_energy(&self) -> f64 {
        self.top
            .iter()
            .filter_map(|&id| self.rese(id))
            .map(|rese| rese.energy)
            .sum()
    }

    /// Number of independent top-level elements.
    pub fn sequence_length(&self) -> usize {
        self.top.len()
    }

    /// Number of constituents of the longest track.
    pub fn track_length(&self) -> usize {
        self.top
            .iter()
            .filter_map(|&id| self.rese(id))
            .filter_map(Rese::as_track)
            .map(|data| data.children.len())
            .max()
            .unwrap_or(0)
    }

    /// Smallest distance between the leaf hits of two elements.
    pub fn min_distance(&self, a: ReseId, b: ReseId) -> f64 {
        let mut leaves_a = Vec::new();
        let mut leaves_b = Vec::new();
        self.collect_leaf_positions(a, &mut leaves_a);
        self.collect_leaf_positions(b, &mut leaves_b);
        let mut min = f64::MAX;
        for pa in &leaves_a {
            for pb in &leaves_b {
                let d = (pa - pb).norm();
                if d < min {
                    min = d;
                }
            }
        }
        min
    }

    fn collect_leaf_positions(&self, id: ReseId, out: &mut Vec<Vector3<f64>>) {
        if let Some(rese) = self.rese(id) {
            if rese.children().is_empty() {
                out.push(rese.position);
            } else {
                for &child in rese.children() {
                    self.collect_leaf_positions(child, out);
                }
            }
        }
    }

    // --- classification and bookkeeping ------------------------------------

    /// Event classification.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Sets the event classification and invalidates the cached physical
    /// event if the type changed.
    pub fn set_event_type(&mut self, event_type: EventType) {
        if self.event_type != event_type {
            self.physical = None;
        }
        self.event_type = event_type;
    }

    /// True if the event was successfully reconstructed.
    pub fn is_good(&self) -> bool {
        self.good
    }

    /// Sets the good flag.
    pub fn set_good(&mut self, good: bool) {
        self.good = good;
    }

    /// Rejection reason, [`RejectionReason::None`] when not rejected.
    pub fn rejection_reason(&self) -> RejectionReason {
        self.rejection
    }

    /// Marks the event bad with the given reason.
    pub fn reject(&mut self, reason: RejectionReason) {
        debug!(event = self.event_id, reason = reason.short(), "event rejected");
        self.good = false;
        self.rejection = reason;
        self.physical = None;
    }

    /// Pair vertex, if designated.
    pub fn vertex(&self) -> Option<ReseId> {
        self.vertex
    }

    /// Designates the pair vertex.
    pub fn set_vertex(&mut self, vertex: Option<ReseId>) {
        self.vertex = vertex;
        self.physical = None;
    }

    /// Vertex growth direction: −1 downward, +1 upward, 0 unset.
    pub fn vertex_direction(&self) -> i32 {
        self.vertex_direction
    }

    /// Sets the vertex growth direction.
    pub fn set_vertex_direction(&mut self, direction: i32) {
        self.vertex_direction = direction;
    }

    /// Electron track of a pair event.
    pub fn electron_track(&self) -> Option<ReseId> {
        self.electron_track
    }

    /// Sets the electron track.
    pub fn set_electron_track(&mut self, track: Option<ReseId>) {
        self.electron_track = track;
        self.physical = None;
    }

    /// Positron track of a pair event.
    pub fn positron_track(&self) -> Option<ReseId> {
        self.positron_track
    }

    /// Sets the positron track.
    pub fn set_positron_track(&mut self, track: Option<ReseId>) {
        self.positron_track = track;
        self.physical = None;
    }

    /// First interaction of the event, if decided.
    pub fn start_point(&self) -> Option<ReseId> {
        self.start_point
    }

    /// Sets the first interaction of the event.
    pub fn set_start_point(&mut self, start: Option<ReseId>) {
        self.start_point = start;
        self.physical = None;
    }

    /// Directional measurement records attached to this event.
    pub fn measurements(&self) -> &[DirectionalMeasurement] {
        &self.measurements
    }

    /// Attaches a directional measurement record.
    pub fn add_measurement(&mut self, measurement: DirectionalMeasurement) {
        self.measurements.push(measurement);
    }

    // --- quality factors ----------------------------------------------------

    /// Clustering quality factor.
    pub fn clustering_quality_factor(&self) -> f64 {
        self.clustering_quality_factor
    }

    /// Sets the clustering quality factor.
    pub fn set_clustering_quality_factor(&mut self, qf: f64) {
        self.clustering_quality_factor = qf;
    }

    /// Quality factor of the best Compton sequence.
    pub fn compton_quality_factor(&self) -> f64 {
        self.compton_quality_factor1
    }

    /// Quality factor of the second best Compton sequence.
    pub fn compton_quality_factor2(&self) -> f64 {
        self.compton_quality_factor2
    }

    /// Sets both Compton sequence quality factors.
    pub fn set_compton_quality_factors(&mut self, best: f64, second: f64) {
        self.compton_quality_factor1 = best;
        self.compton_quality_factor2 = second;
    }

    /// Overall track quality factor.
    pub fn track_quality_factor(&self) -> f64 {
        self.track_quality_factor
    }

    /// Sets the overall track quality factor.
    pub fn set_track_quality_factor(&mut self, qf: f64) {
        self.track_quality_factor = qf;
    }

    /// Pair quality factor.
    pub fn pair_quality_factor(&self) -> f64 {
        self.pair_quality_factor
    }

    /// Sets the pair quality factor.
    pub fn set_pair_quality_factor(&mut self, qf: f64) {
        self.pair_quality_factor = qf;
    }

    // --- track building -----------------------------------------------------

    /// Converts fully linked chains into track nodes.
    ///
    /// Every linked top-level element seeds a track that transitively
    /// absorbs everything reachable via links. Afterwards
    /// [`RawEvent::find_endpoints`] reconciles one-sided links and
    /// registers endpoints. A component where every member keeps two or
    /// more links is a closed loop and fails with
    /// [`Error::CircularGraph`].
    pub fn create_tracks(&mut self) -> Result<()> {
        let seeds: Vec<ReseId> = self.top.clone();
        for seed in seeds {
            let Some(rese) = self.rese(seed) else { continue };
            if rese.is_track() || !rese.has_links() {
                continue;
            }
            if !self.top.contains(&seed) {
                continue; // already absorbed
            }

            // collect the component following outgoing links
            let mut component = vec![seed];
            let mut i = 0;
            while i < component.len() {
                let links: Vec<ReseId> = self
                    .rese(component[i])
                    .map(|r| r.links.clone())
                    .unwrap_or_default();
                for l in links {
                    if !component.contains(&l) {
                        component.push(l);
                    }
                }
                i += 1;
            }

            let circular = component
                .iter()
                .all(|&id| self.rese(id).is_some_and(|r| r.n_links() >= 2));
            if circular {
                return Err(Error::CircularGraph);
            }

            let track = self.new_track();
            for member in component {
                self.track_absorb(track, member)?;
            }
            debug!(event = self.event_id, track = %track, "created track");
        }

        self.find_endpoints()
    }

    /// Reconciles one-sided links inside every track and registers the
    /// elements with exactly one remaining link as endpoints.
    ///
    /// A one-sided link from an element with two or more links is simply
    /// dropped; from an element whose only link it is, the link is
    /// answered instead, and the partner sheds its most distant other
    /// link to keep interior elements at two links.
    pub fn find_endpoints(&mut self) -> Result<()> {
        let tracks: Vec<ReseId> = self
            .top
            .iter()
            .copied()
            .filter(|&id| self.rese(id).is_some_and(Rese::is_track))
            .collect();

        for track in tracks {
            let members: Vec<ReseId> = self
                .rese(track)
                .and_then(Rese::as_track)
                .map(|data| data.children.clone())
                .unwrap_or_default();

            for &member in &members {
                let mut a = 0;
                loop {
                    let Some(&partner) = self.rese(member).and_then(|r| r.links.get(a)) else {
                        break;
                    };
                    let answered = self
                        .rese(partner)
                        .is_some_and(|p| p.is_linked_to(member));
                    if answered {
                        a += 1;
                        continue;
                    }
                    if self.n_links(member) > 1 {
                        if let Some(rese) = self.rese_mut(member) {
                            rese.links.retain(|&l| l != partner);
                        }
                    } else {
                        // answer the link; the partner sheds its most
                        // distant other link first
                        if self.n_links(partner) > 1 {
                            let mut dist = 0.0;
                            let mut shed = None;
                            let partner_links: Vec<ReseId> = self
                                .rese(partner)
                                .map(|p| p.links.clone())
                                .unwrap_or_default();
                            for other in partner_links {
                                let d = self.min_distance(other, partner);
                                if d > dist {
                                    dist = d;
                                    shed = Some(other);
                                }
                            }
                            if let Some(shed) = shed {
                                self.unlink(partner, shed);
                            }
                        }
                        self.link_one_way(partner, member);
                        a += 1;
                    }
                }
            }

            let circular = !members.is_empty()
                && members
                    .iter()
                    .all(|&id| self.rese(id).is_some_and(|r| r.n_links() >= 2));
            if circular {
                return Err(Error::CircularGraph);
            }

            let endpoints: Vec<ReseId> = members
                .iter()
                .copied()
                .filter(|&id| self.n_links(id) == 1)
                .collect();
            if let Some(data) = self.rese_mut(track).and_then(Rese::as_track_mut) {
                data.endpoints = endpoints;
            }
        }
        Ok(())
    }

    // --- track end designation ----------------------------------------------

    /// Designates the first interaction of a track. The element must be a
    /// member with at most one link.
    pub fn set_track_start(&mut self, track: ReseId, start: ReseId) -> Result<()> {
        let n = self.n_links(start);
        if n > 1 {
            return Err(Error::NotAnEndpoint(start, n));
        }
        let rese = self.rese_mut(track).ok_or(Error::UnknownElement(track))?;
        let data = rese.as_track_mut().ok_or(Error::NotATrack(track))?;
        data.start = Some(start);
        if !data.endpoints.contains(&start) {
            data.endpoints.push(start);
        }
        self.physical = None;
        Ok(())
    }

    /// Designates the last interaction of a track.
    pub fn set_track_stop(&mut self, track: ReseId, stop: ReseId) -> Result<()> {
        let n = self.n_links(stop);
        if n > 1 {
            return Err(Error::NotAnEndpoint(stop, n));
        }
        let rese = self.rese_mut(track).ok_or(Error::UnknownElement(track))?;
        let data = rese.as_track_mut().ok_or(Error::NotATrack(track))?;
        data.stop = Some(stop);
        if !data.endpoints.contains(&stop) {
            data.endpoints.push(stop);
        }
        self.physical = None;
        Ok(())
    }

    /// Grows a track by one element: links `new` to the current endpoint
    /// `old`, absorbs it, and refreshes the endpoint list.
    pub fn track_append(&mut self, track: ReseId, new: ReseId, old: Option<ReseId>) -> Result<()> {
        match old {
            None => {
                self.track_absorb(track, new)?;
            }
            Some(old) => {
                self.track_absorb(track, new)?;
                self.link(new, old);
            }
        }
        let members: Vec<ReseId> = self
            .rese(track)
            .and_then(Rese::as_track)
            .map(|data| data.children.clone())
            .unwrap_or_default();
        let endpoints: Vec<ReseId> = members
            .iter()
            .copied()
            .filter(|&id| self.n_links(id) <= 1)
            .collect();
        if let Some(data) = self.rese_mut(track).and_then(Rese::as_track_mut) {
            data.endpoints = endpoints;
        }
        Ok(())
    }

    /// Track data accessor, as an error-typed convenience.
    pub fn track_data(&self, track: ReseId) -> Result<&TrackData> {
        self.rese(track)
            .ok_or(Error::UnknownElement(track))?
            .as_track()
            .ok_or(Error::NotATrack(track))
    }

    /// Mutable track data accessor.
    pub fn track_data_mut(&mut self, track: ReseId) -> Result<&mut TrackData> {
        self.rese_mut(track)
            .ok_or(Error::UnknownElement(track))?
            .as_track_mut()
            .ok_or(Error::NotATrack(track))
    }

    /// All top-level track ids.
    pub fn tracks(&self) -> Vec<ReseId> {
        self.top
            .iter()
            .copied()
            .filter(|&id| self.rese(id).is_some_and(Rese::is_track))
            .collect()
    }
}
