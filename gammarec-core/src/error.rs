//! Error types for gammarec-core.

use thiserror::Error;

use crate::rese::ReseId;

/// Result type alias for event-model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the event data model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The link graph of a track closes on itself; no endpoints exist.
    #[error("circular link graph: every element keeps two links after cleanup")]
    CircularGraph,

    /// An operation required a track but was given another element kind.
    #[error("element {0} is not a track")]
    NotATrack(ReseId),

    /// A stale or foreign id was passed into an event.
    #[error("no element {0} in this event")]
    UnknownElement(ReseId),

    /// A track operation needed a start point that was never designated.
    #[error("track {0} has no start point")]
    MissingStartPoint(ReseId),

    /// A track operation needed a stop point that was never designated.
    #[error("track {0} has no stop point")]
    MissingStopPoint(ReseId),

    /// A start or stop candidate carries more than one link.
    #[error("element {0} has {1} links and cannot serve as a track end")]
    NotAnEndpoint(ReseId, usize),

    /// Pair handling was invoked on an event without a vertex.
    #[error("event has no pair vertex")]
    MissingVertex,

    /// A weighted average was requested over elements without energy.
    #[error("cannot average over elements with zero total energy")]
    ZeroEnergy,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
