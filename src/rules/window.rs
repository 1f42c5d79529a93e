//! Recency window parsing.
//!
//! Windows are written as a sequence of decimal numbers with unit suffixes,
//! e.g. `48h`, `1h30m`, `90m`, `1.5h`. Accepted units are `ns`, `us`, `µs`,
//! `ms`, `s`, `m`, `h` and `d`. A bare `0` is also accepted.

use chrono::TimeDelta;

const UNITS: [(&str, f64); 9] = [
    ("ns", 1e-9),
    ("us", 1e-6),
    ("µs", 1e-6),
    ("μs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3_600.0),
    ("d", 86_400.0),
];

/// Parses a window expression. Returns `None` if it isn't one.
#[must_use]
pub fn parse_window(input: &str) -> Option<TimeDelta> {
    let mut rest = input.trim();
    if rest == "0" {
        return Some(TimeDelta::zero());
    }
    if rest.is_empty() {
        return None;
    }

    let mut seconds = 0.0_f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        // Longest suffix first so `ms` isn't read as `m`.
        let (unit, scale) = UNITS
            .iter()
            .filter(|(unit, _)| rest.starts_with(unit))
            .max_by_key(|(unit, _)| unit.len())?;
        seconds += value * scale;
        rest = &rest[unit.len()..];
    }

    #[allow(clippy::cast_possible_truncation)]
    let millis = (seconds * 1_000.0).round() as i64;
    TimeDelta::try_milliseconds(millis)
}
