//! Per-event rejection reasons.
//!
//! A rejected event is never a process-level failure: the reason is stored
//! on the event and inspected by the caller after analysis.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why an event was rejected during reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RejectionReason {
    /// Not rejected.
    #[default]
    None,
    /// Too many hits for the Compton sequence reconstruction.
    TooManyHitsCsr,
    /// Hits in detector 1 only.
    D1Only,
    /// Hits in detector 2 only.
    D2Only,
    /// Hits in detector 3 only.
    D3Only,
    /// Hits in detector 4 only.
    D4Only,
    /// Hits in detector 5 only.
    D5Only,
    /// Hits in detector 6 only.
    D6Only,
    /// Hits in detector 7 only.
    D7Only,
    /// Hits in detector 8 only.
    D8Only,
    /// One track and nothing else.
    OneTrackOnly,
    /// Two tracks and nothing else.
    TwoTracksOnly,
    /// A track failed validation.
    TrackNotValid,
    /// The interaction sequence is not acceptable.
    SequenceBad,
    /// Too many hits overall.
    TooManyHits,
    /// The event does not start in detector 1.
    EventStartNotD1,
    /// The event start could not be decided.
    EventStartUndecided,
    /// The electron direction points backwards.
    ElectronDirectionBad,
    /// The Compton sequence quality is below threshold.
    CsrThreshold,
    /// No acceptable Compton sequence combination found.
    CsrNoGoodCombination,
    /// Two-site event of the COMPTEL type.
    ComptelTypeEvent,
    /// COMPTEL-type event with bad kinematics.
    ComptelTypeKinematicsBad,
    /// Only a single interaction site.
    SingleSiteEvent,
    /// The event has no hits.
    NoHits,
    /// Total energy outside the configured window.
    TotalEnergyOutOfLimits,
    /// Lever arm outside the configured window.
    LeverArmOutOfLimits,
    /// Event id outside the configured window.
    EventIdOutOfLimits,
    /// The event does not originate from the selected object.
    NotFromObject,
    /// Too many track elements remained undecided.
    TooManyUndecidedTrackElements,
    /// An external quality flag marked the event bad.
    ExternalBadEventFlag,
    /// Event clustering: too many hits.
    EventClusteringTooManyHits,
    /// Too many alternative event incarnations.
    TooManyEventIncarnations,
    /// Event clustering left unresolved hits.
    EventClusteringUnresolvedHits,
    /// Event clustering found no origins.
    EventClusteringNoOrigins,
    /// Event clustering energy out of bounds.
    EventClusteringEnergyOutOfBounds,
    /// The link graph was entirely ambiguous and pure ambiguities are
    /// configured to be rejected.
    PureAmbiguity,
}

impl RejectionReason {
    /// All named reasons, for exhaustive reporting.
    pub const ALL: [RejectionReason; 36] = [
        RejectionReason::None,
        RejectionReason::TooManyHitsCsr,
        RejectionReason::D1Only,
        RejectionReason::D2Only,
        RejectionReason::D3Only,
        RejectionReason::D4Only,
        RejectionReason::D5Only,
        RejectionReason::D6Only,
        RejectionReason::D7Only,
        RejectionReason::D8Only,
        RejectionReason::OneTrackOnly,
        RejectionReason::TwoTracksOnly,
        RejectionReason::TrackNotValid,
        RejectionReason::SequenceBad,
        RejectionReason::TooManyHits,
        RejectionReason::EventStartNotD1,
        RejectionReason::EventStartUndecided,
        RejectionReason::ElectronDirectionBad,
        RejectionReason::CsrThreshold,
        RejectionReason::CsrNoGoodCombination,
        RejectionReason::ComptelTypeEvent,
        RejectionReason::ComptelTypeKinematicsBad,
        RejectionReason::SingleSiteEvent,
        RejectionReason::NoHits,
        RejectionReason::TotalEnergyOutOfLimits,
        RejectionReason::LeverArmOutOfLimits,
        RejectionReason::EventIdOutOfLimits,
        RejectionReason::NotFromObject,
        RejectionReason::TooManyUndecidedTrackElements,
        RejectionReason::ExternalBadEventFlag,
        RejectionReason::EventClusteringTooManyHits,
        RejectionReason::TooManyEventIncarnations,
        RejectionReason::EventClusteringUnresolvedHits,
        RejectionReason::EventClusteringNoOrigins,
        RejectionReason::EventClusteringEnergyOutOfBounds,
        RejectionReason::PureAmbiguity,
    ];

    /// Short label, suitable for tables and compact logs.
    pub fn short(self) -> &'static str {
        match self {
            RejectionReason::None => "None",
            RejectionReason::TooManyHitsCsr => "Too many hits (CSR)",
            RejectionReason::D1Only => "D1 only",
            RejectionReason::D2Only => "D2 only",
            RejectionReason::D3Only => "D3 only",
            RejectionReason::D4Only => "D4 only",
            RejectionReason::D5Only => "D5 only",
            RejectionReason::D6Only => "D6 only",
            RejectionReason::D7Only => "D7 only",
            RejectionReason::D8Only => "D8 only",
            RejectionReason::OneTrackOnly => "One track only",
            RejectionReason::TwoTracksOnly => "Two tracks only",
            RejectionReason::TrackNotValid => "Track not valid",
            RejectionReason::SequenceBad => "Sequence bad",
            RejectionReason::TooManyHits => "Too many hits",
            RejectionReason::EventStartNotD1 => "Start not in D1",
            RejectionReason::EventStartUndecided => "Start undecided",
            RejectionReason::ElectronDirectionBad => "Electron direction bad",
            RejectionReason::CsrThreshold => "Below CSR threshold",
            RejectionReason::CsrNoGoodCombination => "No good CSR combination",
            RejectionReason::ComptelTypeEvent => "COMPTEL type event",
            RejectionReason::ComptelTypeKinematicsBad => "COMPTEL kinematics bad",
            RejectionReason::SingleSiteEvent => "Single site event",
            RejectionReason::NoHits => "No hits",
            RejectionReason::TotalEnergyOutOfLimits => "Total energy out of limits",
            RejectionReason::LeverArmOutOfLimits => "Lever arm out of limits",
            RejectionReason::EventIdOutOfLimits => "Event id out of limits",
            RejectionReason::NotFromObject => "Not from object",
            RejectionReason::TooManyUndecidedTrackElements => "Too many undecided track elements",
            RejectionReason::ExternalBadEventFlag => "External bad event flag",
            RejectionReason::EventClusteringTooManyHits => "Event clustering: too many hits",
            RejectionReason::TooManyEventIncarnations => "Too many event incarnations",
            RejectionReason::EventClusteringUnresolvedHits => "Event clustering: unresolved hits",
            RejectionReason::EventClusteringNoOrigins => "Event clustering: no origins",
            RejectionReason::EventClusteringEnergyOutOfBounds => {
                "Event clustering: energy out of bounds"
            }
            RejectionReason::PureAmbiguity => "Pure ambiguity",
        }
    }

    /// Long description, suitable for reports.
    pub fn long(self) -> &'static str {
        match self {
            RejectionReason::None => "None",
            RejectionReason::TooManyHitsCsr => {
                "Event rejected: too many hits for the Compton sequence reconstruction"
            }
            RejectionReason::D1Only => "Event rejected: only hits in detector 1",
            RejectionReason::D2Only => "Event rejected: only hits in detector 2",
            RejectionReason::D3Only => "Event rejected: only hits in detector 3",
            RejectionReason::D4Only => "Event rejected: only hits in detector 4",
            RejectionReason::D5Only => "Event rejected: only hits in detector 5",
            RejectionReason::D6Only => "Event rejected: only hits in detector 6",
            RejectionReason::D7Only => "Event rejected: only hits in detector 7",
            RejectionReason::D8Only => "Event rejected: only hits in detector 8",
            RejectionReason::OneTrackOnly => {
                "Event rejected: the event consists of exactly one track and nothing else"
            }
            RejectionReason::TwoTracksOnly => {
                "Event rejected: the event consists of exactly two tracks and nothing else"
            }
            RejectionReason::TrackNotValid => "Event rejected: a track failed validation",
            RejectionReason::SequenceBad => {
                "Event rejected: the interaction sequence is not acceptable"
            }
            RejectionReason::TooManyHits => "Event rejected: too many hits",
            RejectionReason::EventStartNotD1 => {
                "Event rejected: the event does not start in detector 1"
            }
            RejectionReason::EventStartUndecided => {
                "Event rejected: the start of the event could not be decided"
            }
            RejectionReason::ElectronDirectionBad => {
                "Event rejected: the recoil electron direction points backwards"
            }
            RejectionReason::CsrThreshold => {
                "Event rejected: the Compton sequence quality is below the threshold"
            }
            RejectionReason::CsrNoGoodCombination => {
                "Event rejected: no acceptable Compton sequence combination was found"
            }
            RejectionReason::ComptelTypeEvent => {
                "Event rejected: two-site event without track (COMPTEL type)"
            }
            RejectionReason::ComptelTypeKinematicsBad => {
                "Event rejected: COMPTEL-type event with unacceptable kinematics"
            }
            RejectionReason::SingleSiteEvent => {
                "Event rejected: the event consists of a single interaction site"
            }
            RejectionReason::NoHits => "Event rejected: the event contains no hits",
            RejectionReason::TotalEnergyOutOfLimits => {
                "Event rejected: the total energy is outside the configured window"
            }
            RejectionReason::LeverArmOutOfLimits => {
                "Event rejected: the lever arm is outside the configured window"
            }
            RejectionReason::EventIdOutOfLimits => {
                "Event rejected: the event id is outside the configured window"
            }
            RejectionReason::NotFromObject => {
                "Event rejected: the event does not originate from the selected object"
            }
            RejectionReason::TooManyUndecidedTrackElements => {
                "Event rejected: too many track elements remained undecided"
            }
            RejectionReason::ExternalBadEventFlag => {
                "Event rejected: an external quality flag marked the event bad"
            }
            RejectionReason::EventClusteringTooManyHits => {
                "Event rejected: event clustering found too many hits"
            }
            RejectionReason::TooManyEventIncarnations => {
                "Event rejected: too many alternative event incarnations"
            }
            RejectionReason::EventClusteringUnresolvedHits => {
                "Event rejected: event clustering left unresolved hits"
            }
            RejectionReason::EventClusteringNoOrigins => {
                "Event rejected: event clustering found no origins"
            }
            RejectionReason::EventClusteringEnergyOutOfBounds => {
                "Event rejected: event clustering energy out of bounds"
            }
            RejectionReason::PureAmbiguity => {
                "Event rejected: the link graph is entirely ambiguous"
            }
        }
    }
}
