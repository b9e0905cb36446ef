//! Reconstructed event sub-elements (RESEs).
//!
//! A RESE is one node of an event's interaction graph: a single detector
//! hit, a cluster of hits, or a track (an ordered chain of hits/clusters).
//! RESEs live in a per-event arena and refer to each other by [`ReseId`];
//! the undirected `links` adjacency expresses "these two elements are
//! plausible sequential interactions".

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier of a sub-element within one event's arena.
///
/// Ids are assigned at insertion, never reused, and preserved when an
/// event is duplicated for hypothesis branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReseId(pub u32);

impl ReseId {
    /// Returns the arena slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ReseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Detector technology a hit was measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DetectorType {
    /// Unknown or not yet assigned.
    Unknown,
    /// Double-sided strip detector (2D position, depth from layer).
    Strip2D,
    /// Calorimeter block.
    Calorimeter,
    /// Strip detector with depth resolution.
    Strip3D,
    /// Scintillator slab.
    Scintillator,
    /// Drift chamber / gas volume.
    DriftChamber,
    /// Strip detector with intrinsic direction measurement.
    Strip3DDirectional,
    /// Anger camera.
    AngerCamera,
    /// Voxelized 3D detector.
    Voxel3D,
    /// Guard ring.
    GuardRing,
}

impl DetectorType {
    /// Numeric tag used in evta serialization.
    pub fn id(self) -> u8 {
        match self {
            DetectorType::Unknown => 0,
            DetectorType::Strip2D => 1,
            DetectorType::Calorimeter => 2,
            DetectorType::Strip3D => 3,
            DetectorType::Scintillator => 4,
            DetectorType::DriftChamber => 5,
            DetectorType::Strip3DDirectional => 6,
            DetectorType::AngerCamera => 7,
            DetectorType::Voxel3D => 8,
            DetectorType::GuardRing => 9,
        }
    }
}

/// Opaque handle into the geometry: identifies the physical detector
/// volume a hit occurred in. Owned by the RESE, interpreted only by the
/// geometry query interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolumeId(pub u32);

/// Plain measured-hit data used to populate an event.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Position in detector coordinates (cm).
    pub position: Vector3<f64>,
    /// Deposited energy (keV).
    pub energy: f64,
    /// Interaction time (s).
    pub time: f64,
    /// One-sigma position uncertainty per axis (cm).
    pub position_resolution: Vector3<f64>,
    /// One-sigma energy uncertainty (keV).
    pub energy_resolution: f64,
    /// One-sigma time uncertainty (s).
    pub time_resolution: f64,
    /// Detector technology.
    pub detector: DetectorType,
    /// Geometry volume handle.
    pub volume: VolumeId,
}

impl Hit {
    /// Creates a hit with the given position and energy; everything else
    /// defaults to zero resolutions in an unknown detector.
    pub fn new(position: Vector3<f64>, energy: f64) -> Self {
        Self {
            position,
            energy,
            time: 0.0,
            position_resolution: Vector3::zeros(),
            energy_resolution: 0.0,
            time_resolution: 0.0,
            detector: DetectorType::Unknown,
            volume: VolumeId(0),
        }
    }

    /// Sets the interaction time.
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Sets the position resolution.
    pub fn with_position_resolution(mut self, resolution: Vector3<f64>) -> Self {
        self.position_resolution = resolution;
        self
    }

    /// Sets the energy resolution.
    pub fn with_energy_resolution(mut self, resolution: f64) -> Self {
        self.energy_resolution = resolution;
        self
    }

    /// Sets the detector type.
    pub fn with_detector(mut self, detector: DetectorType) -> Self {
        self.detector = detector;
        self
    }

    /// Sets the geometry volume handle.
    pub fn with_volume(mut self, volume: VolumeId) -> Self {
        self.volume = volume;
        self
    }
}

/// Track-specific bookkeeping carried by a [`ReseKind::Track`] node.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackData {
    /// Constituent elements, in absorption order.
    pub children: Vec<ReseId>,
    /// Designated first interaction, if ordered.
    pub start: Option<ReseId>,
    /// Designated last interaction, if ordered.
    pub stop: Option<ReseId>,
    /// Endpoint candidates (elements with exactly one link).
    pub endpoints: Vec<ReseId>,
    /// Externally measured direction overriding geometric inference.
    pub fixed_direction: Option<Vector3<f64>>,
    /// Score assigned by the active sequencing strategy.
    pub quality_factor: f64,
}

impl TrackData {
    pub(crate) fn new() -> Self {
        Self {
            children: Vec::new(),
            start: None,
            stop: None,
            endpoints: Vec::new(),
            fixed_direction: None,
            quality_factor: crate::NO_QUALITY_FACTOR,
        }
    }
}

/// The node variants of the event graph.
#[derive(Debug, Clone, PartialEq)]
pub enum ReseKind {
    /// A single detector hit.
    Hit,
    /// An unordered group of hits treated as one interaction site.
    Cluster {
        /// Constituent elements.
        children: Vec<ReseId>,
    },
    /// An ordered chain of interaction sites.
    Track(TrackData),
}

/// One node of an event's interaction graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Rese {
    /// Identity within the owning event.
    pub id: ReseId,
    /// Position (cm); for containers, the energy-weighted centroid.
    pub position: Vector3<f64>,
    /// Energy (keV); for containers, the sum over children.
    pub energy: f64,
    /// Time (s); for containers, the earliest child time.
    pub time: f64,
    /// One-sigma position uncertainty (cm).
    pub position_resolution: Vector3<f64>,
    /// One-sigma energy uncertainty (keV).
    pub energy_resolution: f64,
    /// One-sigma time uncertainty (s).
    pub time_resolution: f64,
    /// Detector technology.
    pub detector: DetectorType,
    /// Geometry volume handle.
    pub volume: VolumeId,
    /// Undirected adjacency to other elements of the same event.
    pub links: Vec<ReseId>,
    /// Node variant.
    pub kind: ReseKind,
}

impl Rese {
    pub(crate) fn from_hit(id: ReseId, hit: Hit) -> Self {
        Self {
            id,
            position: hit.position,
            energy: hit.energy,
            time: hit.time,
            position_resolution: hit.position_resolution,
            energy_resolution: hit.energy_resolution,
            time_resolution: hit.time_resolution,
            detector: hit.detector,
            volume: hit.volume,
            links: Vec::new(),
            kind: ReseKind::Hit,
        }
    }

    pub(crate) fn empty_track(id: ReseId) -> Self {
        Self {
            id,
            position: Vector3::zeros(),
            energy: 0.0,
            time: f64::MAX,
            position_resolution: Vector3::zeros(),
            energy_resolution: 0.0,
            time_resolution: 0.0,
            detector: DetectorType::Unknown,
            volume: VolumeId(0),
            links: Vec::new(),
            kind: ReseKind::Track(TrackData::new()),
        }
    }

    /// Number of links to other elements.
    #[inline]
    pub fn n_links(&self) -> usize {
        self.links.len()
    }

    /// True if this element links to `other`.
    #[inline]
    pub fn is_linked_to(&self, other: ReseId) -> bool {
        self.links.contains(&other)
    }

    /// True if this element has at least one link.
    #[inline]
    pub fn has_links(&self) -> bool {
        !self.links.is_empty()
    }

    /// True for track nodes.
    #[inline]
    pub fn is_track(&self) -> bool {
        matches!(self.kind, ReseKind::Track(_))
    }

    /// True for single-hit nodes.
    #[inline]
    pub fn is_hit(&self) -> bool {
        matches!(self.kind, ReseKind::Hit)
    }

    /// Track bookkeeping, if this is a track.
    pub fn as_track(&self) -> Option<&TrackData> {
        match &self.kind {
            ReseKind::Track(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable track bookkeeping, if this is a track.
    pub fn as_track_mut(&mut self) -> Option<&mut TrackData> {
        match &mut self.kind {
            ReseKind::Track(data) => Some(data),
            _ => None,
        }
    }

    /// Child elements for containers, empty for hits.
    pub fn children(&self) -> &[ReseId] {
        match &self.kind {
            ReseKind::Hit => &[],
            ReseKind::Cluster { children } => children,
            ReseKind::Track(data) => &data.children,
        }
    }
}
