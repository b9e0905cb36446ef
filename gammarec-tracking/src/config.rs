//! Tracking configuration.

use tracing::warn;

/// Upper ambiguity count for the exhaustive hypothesis branching; above
/// it the greedy sequencer takes over.
pub const MAX_AMBIGUITIES: usize = 5;

/// Configuration of the tracking stage.
///
/// Built with `with_*` setters; out-of-range values are clamped to their
/// minimum with a warning instead of failing, so a sloppy configuration
/// file degrades loudly but keeps running.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackingConfig {
    /// Search for pair-production vertices.
    pub search_pairs: bool,
    /// Search for minimum-ionizing particle crossings.
    pub search_mips: bool,
    /// Search for Compton electron tracks.
    pub search_comptons: bool,
    /// Largest layer gap bridged when linking Compton track elements.
    pub max_layer_jump: u32,
    /// Number of sequence hypotheses kept per event after ranking.
    pub sequences_to_keep: usize,
    /// Reject events whose link graph is entirely ambiguous.
    pub reject_pure_ambiguities: bool,
    /// Link-graph ambiguity count above which the exhaustive branching
    /// gives way to the greedy sequencer.
    pub max_ambiguities: usize,
    /// Minimum number of occupied layers below a vertex candidate.
    pub layers_for_vertex_search: u32,
    /// Names of the detectors that take part in electron tracking.
    pub detectors: Vec<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            search_pairs: true,
            search_mips: true,
            search_comptons: true,
            max_layer_jump: 1,
            sequences_to_keep: 1,
            reject_pure_ambiguities: false,
            max_ambiguities: MAX_AMBIGUITIES,
            layers_for_vertex_search: 4,
            detectors: vec!["tracker".to_string()],
        }
    }
}

impl TrackingConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the pair search.
    #[must_use]
    pub fn with_search_pairs(mut self, search: bool) -> Self {
        self.search_pairs = search;
        self
    }

    /// Enables or disables the MIP search.
    #[must_use]
    pub fn with_search_mips(mut self, search: bool) -> Self {
        self.search_mips = search;
        self
    }

    /// Enables or disables the Compton track search.
    #[must_use]
    pub fn with_search_comptons(mut self, search: bool) -> Self {
        self.search_comptons = search;
        self
    }

    /// Sets the largest bridged layer gap, clamped to at least 1.
    #[must_use]
    pub fn with_max_layer_jump(mut self, jump: u32) -> Self {
        if jump < 1 {
            warn!(jump, "maximum layer jump below 1, using 1");
        }
        self.max_layer_jump = jump.max(1);
        self
    }

    /// Sets the number of kept sequence hypotheses, clamped to at least 1.
    #[must_use]
    pub fn with_sequences_to_keep(mut self, keep: usize) -> Self {
        if keep < 1 {
            warn!(keep, "number of sequences to keep below 1, using 1");
        }
        self.sequences_to_keep = keep.max(1);
        self
    }

    /// Sets whether entirely ambiguous link graphs reject the event.
    #[must_use]
    pub fn with_reject_pure_ambiguities(mut self, reject: bool) -> Self {
        self.reject_pure_ambiguities = reject;
        self
    }

    /// Sets the ambiguity limit of the exhaustive branching.
    #[must_use]
    pub fn with_max_ambiguities(mut self, limit: usize) -> Self {
        self.max_ambiguities = limit;
        self
    }

    /// Sets the vertex-search layer threshold, clamped to at least 4.
    #[must_use]
    pub fn with_layers_for_vertex_search(mut self, layers: u32) -> Self {
        if layers < 4 {
            warn!(layers, "vertex search needs at least 4 layers, using 4");
        }
        self.layers_for_vertex_search = layers.max(4);
        self
    }

    /// Sets the list of tracking detector names.
    #[must_use]
    pub fn with_detectors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detectors = names.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackingConfig::default();
        assert!(config.search_pairs);
        assert!(config.search_mips);
        assert!(config.search_comptons);
        assert_eq!(config.max_layer_jump, 1);
        assert_eq!(config.sequences_to_keep, 1);
        assert_eq!(config.max_ambiguities, MAX_AMBIGUITIES);
        assert!(!config.reject_pure_ambiguities);
    }

    #[test]
    fn test_clamping() {
        let config = TrackingConfig::new()
            .with_max_layer_jump(0)
            .with_sequences_to_keep(0)
            .with_layers_for_vertex_search(2);
        assert_eq!(config.max_layer_jump, 1);
        assert_eq!(config.sequences_to_keep, 1);
        assert_eq!(config.layers_for_vertex_search, 4);
    }

    #[test]
    fn test_detector_list() {
        let config = TrackingConfig::new().with_detectors(["tracker", "gas"]);
        assert_eq!(config.detectors, vec!["tracker", "gas"]);
    }
}
