//! Ordered collection of competing event incarnations.
//!
//! During reconstruction one measured event spawns multiple incarnations,
//! one per explored hypothesis. The list keeps them ranked by quality and
//! prunes down to a configured keep-count; the original unmodified event
//! always remains as a fallback, so the list is never empty after
//! initialization.

use crate::event::RawEvent;

/// Competing incarnations of one measured event.
#[derive(Debug, Clone, Default)]
pub struct RawEventList {
    events: Vec<RawEvent>,
    best_try: Option<usize>,
    optimum: Option<usize>,
}

impl RawEventList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list seeded with the initial (unmodified) event.
    pub fn from_event(event: RawEvent) -> Self {
        Self {
            events: vec![event],
            best_try: None,
            optimum: None,
        }
    }

    /// Number of incarnations.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no incarnation is present.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends an incarnation.
    pub fn push(&mut self, event: RawEvent) {
        self.events.push(event);
    }

    /// Borrow an incarnation.
    pub fn get(&self, index: usize) -> Option<&RawEvent> {
        self.events.get(index)
    }

    /// Mutably borrow an incarnation.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut RawEvent> {
        self.events.get_mut(index)
    }

    /// Iterates over the incarnations.
    pub fn iter(&self) -> std::slice::Iter<'_, RawEvent> {
        self.events.iter()
    }

    /// Mutably iterates over the incarnations.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, RawEvent> {
        self.events.iter_mut()
    }

    /// The incarnations as a slice.
    pub fn as_slice(&self) -> &[RawEvent] {
        &self.events
    }

    /// The incarnations as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [RawEvent] {
        &mut self.events
    }

    /// Removes and returns an incarnation.
    pub fn remove(&mut self, index: usize) -> RawEvent {
        self.best_try = None;
        self.optimum = None;
        self.events.remove(index)
    }

    /// Consumes the list, returning the incarnations.
    pub fn into_events(self) -> Vec<RawEvent> {
        self.events
    }

    /// Sorts by track quality factor; `ascending` when lower scores are
    /// better, descending otherwise (the default convention). Unscored
    /// incarnations ([`NO_QUALITY_FACTOR`](crate::NO_QUALITY_FACTOR))
    /// always sort to the end.
    pub fn sort_by_track_quality(&mut self, ascending: bool) {
        self.best_try = None;
        self.optimum = None;
        let key = |event: &RawEvent| event.track_quality_factor();
        if ascending {
            self.events.sort_by(|a, b| key(a).total_cmp(&key(b)));
        } else {
            self.events.sort_by(|a, b| {
                let (a, b) = (key(a), key(b));
                if a == crate::NO_QUALITY_FACTOR {
                    return std::cmp::Ordering::Greater;
                }
                if b == crate::NO_QUALITY_FACTOR {
                    return std::cmp::Ordering::Less;
                }
                b.total_cmp(&a)
            });
        }
    }

    /// Keeps only the first `keep` incarnations (call after sorting).
    pub fn truncate(&mut self, keep: usize) {
        self.events.truncate(keep.max(1));
    }

    /// Marks the currently most promising incarnation.
    pub fn set_best_try(&mut self, index: usize) {
        if index < self.events.len() {
            self.best_try = Some(index);
        }
    }

    /// The currently most promising incarnation.
    pub fn best_try(&self) -> Option<&RawEvent> {
        self.best_try.and_then(|i| self.events.get(i))
    }

    /// Marks the final reconstruction choice.
    pub fn set_optimum(&mut self, index: usize) {
        if index < self.events.len() {
            self.optimum = Some(index);
        }
    }

    /// The final reconstruction choice.
    pub fn optimum(&self) -> Option<&RawEvent> {
        self.optimum.and_then(|i| self.events.get(i))
    }
}

impl<'a> IntoIterator for &'a RawEventList {
    type Item = &'a RawEvent;
    type IntoIter = std::slice::Iter<'a, RawEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl IntoIterator for RawEventList {
    type Item = RawEvent;
    type IntoIter = std::vec::IntoIter<RawEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
