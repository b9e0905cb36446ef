//! gammarec-response: Response-function histograms for Bayesian track
//! sequencing.
//!
//! Provides n-dimensional binned histograms with a line-oriented text
//! format and the nine-file trained response set the Bayesian sequencing
//! strategy consumes.
//!

pub mod error;
pub mod histogram;
pub mod track_response;

pub use error::{Error, Result};
pub use histogram::{Axis, ResponseHistogram};
pub use track_response::{TrackResponse, GOODBAD_SUFFIX};
