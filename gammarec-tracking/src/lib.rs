//! gammarec-tracking: Pair, muon, and Compton-sequence tracking.
//!
//! The [`Tracker`] drives the three reconstruction stages over a list of
//! event incarnations: pair-vertex search, minimum-ionizing-particle
//! search, and Compton-sequence search with ambiguity branching. A
//! [`SequencingStrategy`] plugs in the sequencing and scoring policy;
//! every strategy inherits the default algorithms and overrides only the
//! stages where it differs:
//!
//! - [`PearsonStrategy`]: energy/position correlation scoring (default).
//! - [`RankStrategy`]: Spearman rank correlations, robust to outliers.
//! - [`BayesianStrategy`]: odds ratios from trained response histograms.
//! - [`ChiSquareStrategy`]: placeholder falling through to the defaults.
//! - [`DirectionalStrategy`]: trusts measured electron directions.
//! - [`GasStrategy`]: proximity chaining for drift-chamber volumes.
//! - [`Kalman2DStrategy`] / [`Kalman3DStrategy`]: Kalman-filter pair
//!   fits with multiple-scattering energy estimation.

pub mod bayesian;
pub mod chisquare;
pub mod config;
pub mod directional;
pub mod error;
pub mod gas;
pub mod kalman;
pub mod kalman2d;
pub mod kalman3d;
pub mod pearson;
pub mod rank;
pub mod strategy;
pub mod tracker;

pub use bayesian::BayesianStrategy;
pub use chisquare::ChiSquareStrategy;
pub use config::{TrackingConfig, MAX_AMBIGUITIES};
pub use directional::DirectionalStrategy;
pub use error::{Error, Result};
pub use gas::GasStrategy;
pub use kalman::KalmanConfig;
pub use kalman2d::Kalman2DStrategy;
pub use kalman3d::Kalman3DStrategy;
pub use pearson::PearsonStrategy;
pub use rank::RankStrategy;
pub use strategy::SequencingStrategy;
pub use tracker::Tracker;
