//! Chi-square sequencing strategy stub.

use crate::strategy::SequencingStrategy;

/// Placeholder for a chi-square track discriminator.
///
/// The discriminator itself is not implemented; every stage falls back
/// to the default algorithms, so selecting this strategy behaves exactly
/// like the base configuration. Kept so the strategy set matches the
/// configuration surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChiSquareStrategy;

impl SequencingStrategy for ChiSquareStrategy {
    fn name(&self) -> &'static str {
        "chisquare"
    }

    fn extra_options(&self) -> String {
        "# Chi-square discriminator:     not implemented, default scoring\n".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegates_to_defaults() {
        let strategy = ChiSquareStrategy;
        assert_eq!(strategy.name(), "chisquare");
        assert!(strategy.sort_descending());
        assert!(!strategy.extra_options().is_empty());
    }
}
