//! The trained response set used by Bayesian track sequencing.
//!
//! Nine histograms belong together, discovered from one anchor file
//! carrying the mandatory `.t.goodbad.rsp` suffix. The anchor's prefix
//! locates the eight companions: good/bad counts for the start, central,
//! stop, and dual track segments. A missing or misnamed file is a hard
//! setup failure.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::histogram::ResponseHistogram;

/// Mandatory suffix of the anchor file.
pub const GOODBAD_SUFFIX: &str = ".t.goodbad.rsp";

const COMPANIONS: [&str; 8] = [
    ".t.start.good.rsp",
    ".t.start.bad.rsp",
    ".t.central.good.rsp",
    ".t.central.bad.rsp",
    ".t.stop.good.rsp",
    ".t.stop.bad.rsp",
    ".t.dual.good.rsp",
    ".t.dual.bad.rsp",
];

/// The full trained response set for track sequencing.
#[derive(Debug, Clone)]
pub struct TrackResponse {
    /// Overall good/bad prior (1 axis; 0.5 = good bin, 1.5 = bad bin).
    pub goodbad: ResponseHistogram,
    /// Good counts for track start segments (Etot, angle in, Edep).
    pub good_start: ResponseHistogram,
    /// Bad counts for track start segments.
    pub bad_start: ResponseHistogram,
    /// Good counts for central segments
    /// (Etot, angle in, Edep, angle out phi, angle out theta).
    pub good_central: ResponseHistogram,
    /// Bad counts for central segments.
    pub bad_central: ResponseHistogram,
    /// Good counts for stop segments (Edep, angle in).
    pub good_stop: ResponseHistogram,
    /// Bad counts for stop segments.
    pub bad_stop: ResponseHistogram,
    /// Good counts for two-site tracks (Etot, angle in, Edep).
    pub good_dual: ResponseHistogram,
    /// Bad counts for two-site tracks.
    pub bad_dual: ResponseHistogram,
}

impl TrackResponse {
    /// Loads the anchor file and its eight companions.
    pub fn load(anchor: &Path) -> Result<Self> {
        if !anchor.exists() {
            return Err(Error::FileNotFound(anchor.to_path_buf()));
        }
        let anchor_str = anchor.to_string_lossy();
        let Some(prefix) = anchor_str.strip_suffix(GOODBAD_SUFFIX) else {
            return Err(Error::BadSuffix {
                path: anchor.to_path_buf(),
                expected: GOODBAD_SUFFIX,
            });
        };

        let companion = |suffix: &str| -> Result<ResponseHistogram> {
            let path = PathBuf::from(format!("{prefix}{suffix}"));
            if !path.exists() {
                return Err(Error::FileNotFound(path));
            }
            ResponseHistogram::load(&path)
        };

        let response = Self {
            goodbad: ResponseHistogram::load(anchor)?,
            good_start: companion(COMPANIONS[0])?,
            bad_start: companion(COMPANIONS[1])?,
            good_central: companion(COMPANIONS[2])?,
            bad_central: companion(COMPANIONS[3])?,
            good_stop: companion(COMPANIONS[4])?,
            bad_stop: companion(COMPANIONS[5])?,
            good_dual: companion(COMPANIONS[6])?,
            bad_dual: companion(COMPANIONS[7])?,
        };
        debug!(prefix, "loaded track response set");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Axis;
    use tempfile::tempdir;

    fn small(name: &str, dimension: usize) -> ResponseHistogram {
        let axes = (0..dimension)
            .map(|i| Axis::new(format!("axis{i}"), 4, 0.0, 100.0).unwrap())
            .collect();
        let mut histogram = ResponseHistogram::new(name, axes);
        histogram.fill(&vec![50.0; dimension], 10.0).unwrap();
        histogram
    }

    fn write_set(dir: &Path, prefix: &str) {
        small("goodbad", 1)
            .save(&dir.join(format!("{prefix}.t.goodbad.rsp")))
            .unwrap();
        for (suffix, dimension) in [
            (".t.start.good.rsp", 3),
            (".t.start.bad.rsp", 3),
            (".t.central.good.rsp", 5),
            (".t.central.bad.rsp", 5),
            (".t.stop.good.rsp", 2),
            (".t.stop.bad.rsp", 2),
            (".t.dual.good.rsp", 3),
            (".t.dual.bad.rsp", 3),
        ] {
            small(suffix, dimension)
                .save(&dir.join(format!("{prefix}{suffix}")))
                .unwrap();
        }
    }

    #[test]
    fn test_load_complete_set() {
        let dir = tempdir().unwrap();
        write_set(dir.path(), "silicon");
        let response = TrackResponse::load(&dir.path().join("silicon.t.goodbad.rsp")).unwrap();
        assert_eq!(response.good_central.dimension(), 5);
        assert_eq!(response.good_stop.dimension(), 2);
        assert!(response.goodbad.sum() > 0.0);
    }

    #[test]
    fn test_bad_suffix_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wrong.rsp");
        small("x", 1).save(&path).unwrap();
        assert!(matches!(
            TrackResponse::load(&path),
            Err(Error::BadSuffix { .. })
        ));
    }

    #[test]
    fn test_missing_companion_fails() {
        let dir = tempdir().unwrap();
        write_set(dir.path(), "partial");
        std::fs::remove_file(dir.path().join("partial.t.dual.bad.rsp")).unwrap();
        assert!(matches!(
            TrackResponse::load(&dir.path().join("partial.t.goodbad.rsp")),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_missing_anchor_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            TrackResponse::load(&dir.path().join("nothing.t.goodbad.rsp")),
            Err(Error::FileNotFound(_))
        ));
    }
}
