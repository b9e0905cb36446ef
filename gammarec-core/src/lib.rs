//! gammarec-core: Event data model for Compton/pair track reconstruction.
//!
//! This crate provides the interaction-graph data model the tracking
//! stages operate on: sub-elements (hits, clusters, tracks) in an
//! id-addressed per-event arena, the raw event container with link-graph
//! maintenance and hypothesis duplication, physical-event materialization,
//! evta text serialization, and the geometry query interface.
//!

pub mod error;
pub mod event;
pub mod evta;
pub mod geometry;
pub mod list;
pub mod math;
pub mod physical;
pub mod rejection;
pub mod rese;
pub mod track;

pub use error::{Error, Result};
pub use event::{DirectionalMeasurement, EventType, RawEvent};
pub use geometry::{DetectorInfo, LayeredGeometry, Material, MaterialPath, TrackerGeometry};
pub use list::RawEventList;
pub use physical::{
    ComptonEvent, MuonEvent, PairEvent, PhotoEvent, PhysicalEvent, UnidentifiableEvent,
};
pub use rejection::RejectionReason;
pub use rese::{DetectorType, Hit, Rese, ReseId, ReseKind, TrackData, VolumeId};
pub use track::{TrackView, TrackWalk, START_ANGLE_CORRELATION};

/// Sentinel for a quality factor that was never computed; ranked after
/// every real score regardless of the sort direction.
pub const NO_QUALITY_FACTOR: f64 = f64::MAX / 3.0;
