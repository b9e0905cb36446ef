//! The pluggable sequencing strategy interface.

use gammarec_core::{RawEvent, RawEventList, ReseId};

use crate::error::Result;
use crate::tracker::Tracker;

/// One track-sequencing and scoring policy.
///
/// The [`Tracker`](crate::Tracker) drives the overall analysis and owns
/// the default algorithms; a strategy overrides the stages where it
/// differs. Every default forwards back into the tracker, so a strategy
/// that only changes the scoring inherits the full sequencing machinery.
pub trait SequencingStrategy: Send + Sync {
    /// Strategy name, as printed in the options summary.
    fn name(&self) -> &'static str;

    /// Searches for a pair-production vertex; on success returns a
    /// duplicate of the event with the vertex designated.
    fn check_for_pair(&self, tracker: &Tracker, event: &RawEvent) -> Option<RawEvent> {
        tracker.default_check_for_pair(event)
    }

    /// Tracks the electron and positron branches of a vertex event.
    fn track_pairs(&self, tracker: &Tracker, event: &mut RawEvent) -> Result<()> {
        tracker.default_track_pairs(event)
    }

    /// Generates the Compton sequence hypotheses for one event. `None`
    /// keeps the incoming event unchanged.
    fn track_comptons(
        &self,
        tracker: &Tracker,
        event: &RawEvent,
    ) -> Result<Option<RawEventList>> {
        tracker.default_track_comptons(event)
    }

    /// Scores one sequence hypothesis, setting the event's track and
    /// pair quality factors.
    fn evaluate_tracks(&self, tracker: &Tracker, event: &mut RawEvent) -> Result<()> {
        tracker.default_evaluate_tracks(event)
    }

    /// Scores one track, storing the result on the track.
    fn evaluate_track(&self, event: &mut RawEvent, track: ReseId) -> Result<()> {
        let score = event.track(track)?.pearson_correlation(false);
        event.track_data_mut(track)?.quality_factor = score;
        Ok(())
    }

    /// True when larger track quality factors are better (the default
    /// scoring convention).
    fn sort_descending(&self) -> bool {
        true
    }

    /// Strategy-specific lines appended to the options summary.
    fn extra_options(&self) -> String {
        String::new()
    }
}
