//! Text serialization of raw events in the evta line format.
//!
//! One event is one `SE` record: `SE`, `ID <id>`, `TI <time>`, then one
//! `HT <detector>;<x>;<y>;<z>;<energy>;<time>` line per hit. Containers
//! serialize their leaf hits. Positions and energies are fixed-point with
//! five decimals by default, or scientific with the requested precision;
//! times are always scientific.

use std::fmt::Write as _;

use crate::event::RawEvent;
use crate::rese::ReseId;

/// Formats a float the way C's `%e` does: `d.ddde[+-]XX` with a signed
/// two-digit exponent.
fn scientific(value: f64, precision: usize) -> String {
    let raw = format!("{value:.precision$e}");
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(rest) => ('-', rest),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => raw,
    }
}

fn pad(value: &str, width: usize) -> String {
    format!("{value:>width$}")
}

impl RawEvent {
    /// Serializes the event as one evta `SE` record.
    ///
    /// `scientific_precision` > 0 switches positions and energies to
    /// scientific notation with that many digits; otherwise they are
    /// fixed-point with five decimals.
    pub fn to_evta_string(&self, scientific_precision: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "SE");
        let _ = writeln!(out, "ID {}", self.event_id());
        let _ = writeln!(out, "TI {:.9}", self.event_time());
        for &id in self.top() {
            self.write_leaf_hits(id, scientific_precision, &mut out);
        }
        out
    }

    fn write_leaf_hits(&self, id: ReseId, scientific_precision: usize, out: &mut String) {
        let Some(rese) = self.rese(id) else { return };
        if rese.children().is_empty() {
            let (width_pos, width_energy, width_time, precision) = if scientific_precision > 0 {
                (
                    scientific_precision + 7,
                    scientific_precision + 6,
                    scientific_precision + 6,
                    scientific_precision,
                )
            } else {
                (10, 10, 11, 5)
            };
            let fmt = |v: f64, width: usize| {
                if scientific_precision > 0 {
                    pad(&scientific(v, precision), width)
                } else {
                    format!("{v:>width$.precision$}")
                }
            };
            let _ = writeln!(
                out,
                "HT {};{};{};{};{};{}",
                rese.detector.id(),
                fmt(rese.position.x, width_pos),
                fmt(rese.position.y, width_pos),
                fmt(rese.position.z, width_pos),
                fmt(rese.energy, width_energy),
                pad(&scientific(rese.time, precision), width_time),
            );
        } else {
            for &child in rese.children() {
                self.write_leaf_hits(child, scientific_precision, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rese::{DetectorType, Hit};
    use nalgebra::Vector3;

    #[test]
    fn test_scientific_formatting() {
        assert_eq!(scientific(1.5, 5), "1.50000e+00");
        assert_eq!(scientific(-0.0123, 3), "-1.230e-02");
        assert_eq!(scientific(0.0, 2), "0.00e+00");
    }

    #[test]
    fn test_event_record_layout() {
        let mut event = RawEvent::new();
        event.set_event_id(42);
        event.set_event_time(1.25);
        event.add_hit(
            Hit::new(Vector3::new(1.0, -2.0, 3.5), 511.0)
                .with_detector(DetectorType::Strip2D)
                .with_time(1e-6),
        );

        let text = event.to_evta_string(0);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "SE");
        assert_eq!(lines[1], "ID 42");
        assert_eq!(lines[2], "TI 1.250000000");
        assert!(lines[3].starts_with("HT 1;"));
        assert_eq!(lines[3].matches(';').count(), 5);
        assert!(lines[3].contains("511.00000"));
        assert!(lines[3].contains("1.00000e-06"));
    }

    #[test]
    fn test_tracks_serialize_their_hits() {
        let mut event = RawEvent::new();
        let a = event.add_hit(Hit::new(Vector3::new(0.0, 0.0, 0.0), 100.0));
        let b = event.add_hit(Hit::new(Vector3::new(0.0, 0.0, -1.0), 200.0));
        event.link(a, b);
        event.create_tracks().unwrap();

        let text = event.to_evta_string(0);
        assert_eq!(text.lines().filter(|l| l.starts_with("HT ")).count(), 2);
    }
}
