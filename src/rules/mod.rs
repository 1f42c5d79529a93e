//! Rule matching.
//!
//! A [`Rule`] is a chain of filters evaluated in order, stopping at the first
//! one that rejects:
//!
//! 1. window: the program must have started within the recency window
//! 2. day of week: the program's start weekday must be listed
//! 3. station: a concrete station id must equal the candidate station
//! 4. content: performer, title and keyword substrings
//!
//! Every filter passes when its field is unset. Matching is case-sensitive
//! substring containment. [`RuleSet::any_matches`] ORs the rules together.
//!
//! A rule with no station, title, performer or keyword matches every program
//! of every station. That is legal; [`Rule::is_catch_all`] lets configuration
//! loading warn about it.

mod error;
mod window;

pub use error::RuleError;
pub use window::parse_window;

use chrono::{DateTime, Datelike, TimeDelta, Weekday};
use chrono_tz::Tz;
use tracing::{trace, warn};

use crate::program::Program;

/// Station id matching any station.
pub const WILDCARD_STATION: &str = "*";

/// Window used when a configured window can't be parsed.
pub const FALLBACK_WINDOW: TimeDelta = TimeDelta::hours(24);

/// Raw rule fields as configured, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFields {
    pub station_id: String,
    pub title: String,
    pub performer: String,
    pub keyword: String,
    pub window: String,
    pub days: Vec<String>,
}

/// A validated matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    name: String,
    station_id: String,
    title: String,
    performer: String,
    keyword: String,
    window: Option<TimeDelta>,
    days: Vec<Weekday>,
}

impl Rule {
    /// Validates `fields` into a rule called `name`.
    ///
    /// An unparsable window is replaced by [`FALLBACK_WINDOW`] with a
    /// warning; a zero window means no window.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::UnknownDay`] for a day token that isn't a
    /// three-letter English weekday.
    pub fn new(name: impl Into<String>, fields: RuleFields) -> Result<Self, RuleError> {
        let name = name.into();

        let days = fields
            .days
            .iter()
            .map(|token| parse_day(token).ok_or_else(|| RuleError::unknown_day(&name, token)))
            .collect::<Result<Vec<_>, _>>()?;

        let window = if fields.window.trim().is_empty() {
            None
        } else if let Some(window) = parse_window(&fields.window) {
            (window > TimeDelta::zero()).then_some(window)
        } else {
            warn!(
                rule = %name,
                window = %fields.window,
                "unparsable window, falling back to 24h"
            );
            Some(FALLBACK_WINDOW)
        };

        Ok(Self {
            name,
            station_id: fields.station_id,
            title: fields.title,
            performer: fields.performer,
            keyword: fields.keyword,
            window,
            days,
        })
    }

    /// Rule name (its configuration key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The concrete station this rule targets, if any.
    #[must_use]
    pub fn station(&self) -> Option<&str> {
        (!self.is_station_wildcard()).then_some(self.station_id.as_str())
    }

    /// Whether this rule accepts any station.
    #[must_use]
    pub fn is_station_wildcard(&self) -> bool {
        self.station_id.is_empty() || self.station_id == WILDCARD_STATION
    }

    /// Effective recency window.
    #[must_use]
    pub fn window(&self) -> Option<TimeDelta> {
        self.window
    }

    /// Configured weekdays; empty means every day.
    #[must_use]
    pub fn days(&self) -> &[Weekday] {
        &self.days
    }

    /// True for a rule with no station, title, performer or keyword.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.is_station_wildcard()
            && self.title.is_empty()
            && self.performer.is_empty()
            && self.keyword.is_empty()
    }

    /// Evaluates the filter chain for `program` aired on `station_id`.
    #[must_use]
    pub fn matches(&self, station_id: &str, program: &Program, now: DateTime<Tz>) -> bool {
        self.window_accepts(program, now)
            && self.day_accepts(program)
            && self.station_accepts(station_id)
            && self.content_accepts(program)
    }

    fn window_accepts(&self, program: &Program, now: DateTime<Tz>) -> bool {
        let Some(window) = self.window else {
            return true;
        };
        match program.start_time() {
            Ok(start) => start + window >= now,
            Err(e) => {
                trace!(rule = %self.name, error = %e, "window filter rejected unparsable start");
                false
            }
        }
    }

    fn day_accepts(&self, program: &Program) -> bool {
        if self.days.is_empty() {
            return true;
        }
        program
            .start_time()
            .is_ok_and(|start| self.days.contains(&start.weekday()))
    }

    fn station_accepts(&self, station_id: &str) -> bool {
        self.is_station_wildcard() || self.station_id == station_id
    }

    fn content_accepts(&self, program: &Program) -> bool {
        contains_if_set(&program.performer, &self.performer)
            && contains_if_set(&program.title, &self.title)
            && (self.keyword.is_empty() || keyword_found(program, &self.keyword))
    }
}

fn contains_if_set(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.contains(needle)
}

fn keyword_found(program: &Program, keyword: &str) -> bool {
    [
        &program.title,
        &program.performer,
        &program.info,
        &program.description,
    ]
    .into_iter()
    .chain(program.tags.iter())
    .any(|field| field.contains(keyword))
}

fn parse_day(token: &str) -> Option<Weekday> {
    match token.trim().to_ascii_lowercase().as_str() {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// The active rules of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// True if any rule accepts `program`.
    #[must_use]
    pub fn any_matches(&self, station_id: &str, program: &Program, now: DateTime<Tz>) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.matches(station_id, program, now))
    }

    /// True if some rule accepts every station.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.rules.iter().any(Rule::is_station_wildcard)
    }

    /// True if some rule names `station_id` explicitly.
    #[must_use]
    pub fn targets(&self, station_id: &str) -> bool {
        self.rules.iter().any(|r| r.station() == Some(station_id))
    }

    /// Whether the catalog of `station_id` is worth fetching at all.
    #[must_use]
    pub fn wants_station(&self, station_id: &str) -> bool {
        self.has_wildcard() || self.targets(station_id)
    }

    /// Stations named explicitly by rules, in rule order, without repeats.
    #[must_use]
    pub fn named_stations(&self) -> Vec<&str> {
        let mut stations: Vec<&str> = Vec::new();
        for station in self.rules.iter().filter_map(Rule::station) {
            if !stations.contains(&station) {
                stations.push(station);
            }
        }
        stations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::program::CATALOG_TZ;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        CATALOG_TZ.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn program(station: &str, start: &str, title: &str) -> Program {
        Program {
            station_id: station.to_string(),
            start: start.to_string(),
            end: start.to_string(),
            title: title.to_string(),
            ..Program::default()
        }
    }

    fn rule(fields: RuleFields) -> Rule {
        Rule::new("test", fields).unwrap()
    }

    #[test]
    fn test_title_rule_matches_sunday_morning_program() {
        let r = rule(RuleFields {
            title: "Title".to_string(),
            ..RuleFields::default()
        });
        let p = program("FMT", "20230625050000", "Title");
        assert!(r.matches("FMT", &p, at(2023, 6, 25, 6, 0)));
        assert!(!r.matches("FMT", &program("FMT", "20230625050000", "Other"), at(2023, 6, 25, 6, 0)));
    }

    #[test]
    fn test_catch_all_rule_matches_everything() {
        let r = rule(RuleFields::default());
        assert!(r.is_catch_all());
        let now = at(2023, 6, 25, 6, 0);
        for (station, start, title) in [
            ("FMT", "20230625050000", "a"),
            ("TBS", "20230101000000", ""),
            ("JOAK", "garbage", "x"),
        ] {
            assert!(r.matches(station, &program(station, start, title), now));
        }
    }

    #[test]
    fn test_wildcard_station_is_still_catch_all() {
        let r = rule(RuleFields {
            station_id: "*".to_string(),
            ..RuleFields::default()
        });
        assert!(r.is_catch_all());
        assert!(r.is_station_wildcard());
        assert_eq!(r.station(), None);
    }

    #[test]
    fn test_window_filter() {
        let r = rule(RuleFields {
            window: "2h".to_string(),
            ..RuleFields::default()
        });
        let p = program("FMT", "20230625050000", "Title");
        assert!(r.matches("FMT", &p, at(2023, 6, 25, 6, 0)));
        assert!(r.matches("FMT", &p, at(2023, 6, 25, 7, 0)));
        assert!(!r.matches("FMT", &p, at(2023, 6, 25, 7, 1)));
        assert!(!r.matches("FMT", &program("FMT", "bad", "Title"), at(2023, 6, 25, 6, 0)));
    }

    #[test]
    fn test_window_rejects_regardless_of_other_filters() {
        let r = rule(RuleFields {
            station_id: "FMT".to_string(),
            title: "Title".to_string(),
            window: "30m".to_string(),
            ..RuleFields::default()
        });
        let p = program("FMT", "20230625050000", "Title");
        assert!(!r.matches("FMT", &p, at(2023, 6, 25, 6, 0)));
    }

    #[test]
    fn test_zero_and_absent_window_do_not_filter() {
        let p = program("FMT", "20200101000000", "Title");
        let now = at(2023, 6, 25, 6, 0);
        for window in ["", "0", "0s"] {
            let r = rule(RuleFields {
                window: window.to_string(),
                ..RuleFields::default()
            });
            assert_eq!(r.window(), None);
            assert!(r.matches("FMT", &p, now));
        }
    }

    #[test]
    fn test_unparsable_window_falls_back_to_a_day() {
        let r = rule(RuleFields {
            window: "one week".to_string(),
            ..RuleFields::default()
        });
        assert_eq!(r.window(), Some(FALLBACK_WINDOW));
        let p = program("FMT", "20230625050000", "Title");
        assert!(r.matches("FMT", &p, at(2023, 6, 26, 5, 0)));
        assert!(!r.matches("FMT", &p, at(2023, 6, 26, 5, 1)));
    }

    #[test]
    fn test_day_filter() {
        let r = rule(RuleFields {
            days: vec!["SUN".to_string(), "mon".to_string()],
            ..RuleFields::default()
        });
        let now = at(2023, 7, 1, 0, 0);
        // 2023-06-25 is a Sunday, 06-26 a Monday, 06-27 a Tuesday.
        assert!(r.matches("FMT", &program("FMT", "20230625050000", ""), now));
        assert!(r.matches("FMT", &program("FMT", "20230626235900", ""), now));
        assert!(!r.matches("FMT", &program("FMT", "20230627000000", ""), now));
    }

    #[test]
    fn test_day_uses_catalog_time_zone() {
        let r = rule(RuleFields {
            days: vec!["sun".to_string()],
            ..RuleFields::default()
        });
        // 00:30 JST Sunday is still Saturday in UTC.
        let p = program("FMT", "20230625003000", "");
        assert!(r.matches("FMT", &p, at(2023, 7, 1, 0, 0)));
    }

    #[test]
    fn test_unknown_day_is_rejected() {
        let err = Rule::new(
            "weekday",
            RuleFields {
                days: vec!["monday".to_string()],
                ..RuleFields::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::UnknownDay { .. }));
        assert!(err.to_string().contains("weekday"));
    }

    #[test]
    fn test_station_filter() {
        let r = rule(RuleFields {
            station_id: "FMT".to_string(),
            ..RuleFields::default()
        });
        let now = at(2023, 6, 25, 6, 0);
        assert!(r.matches("FMT", &program("FMT", "20230625050000", ""), now));
        assert!(!r.matches("TBS", &program("TBS", "20230625050000", ""), now));
    }

    #[test]
    fn test_content_filters_are_case_sensitive_substrings() {
        let r = rule(RuleFields {
            performer: "怜奈".to_string(),
            ..RuleFields::default()
        });
        let mut p = program("FMT", "20230625050000", "");
        p.performer = "山崎怜奈".to_string();
        let now = at(2023, 6, 25, 6, 0);
        assert!(r.matches("FMT", &p, now));

        let r = rule(RuleFields {
            title: "title".to_string(),
            ..RuleFields::default()
        });
        assert!(!r.matches("FMT", &program("FMT", "20230625050000", "Title"), now));
    }

    #[test]
    fn test_keyword_searches_every_text_field() {
        let r = rule(RuleFields {
            keyword: "jazz".to_string(),
            ..RuleFields::default()
        });
        let now = at(2023, 6, 25, 6, 0);
        let base = program("FMT", "20230625050000", "");
        assert!(!r.matches("FMT", &base, now));

        let cases: [fn(&mut Program); 5] = [
            |p| p.title = "late jazz".to_string(),
            |p| p.performer = "jazz trio".to_string(),
            |p| p.info = "<p>jazz</p>".to_string(),
            |p| p.description = "all jazz".to_string(),
            |p| p.tags = vec!["rock".to_string(), "jazz".to_string()],
        ];
        for set in cases {
            let mut p = base.clone();
            set(&mut p);
            assert!(r.matches("FMT", &p, now), "{p:?}");
        }
    }

    #[test]
    fn test_content_filters_are_anded() {
        let r = rule(RuleFields {
            title: "News".to_string(),
            performer: "DJ".to_string(),
            ..RuleFields::default()
        });
        let now = at(2023, 6, 25, 6, 0);
        let mut p = program("FMT", "20230625050000", "Morning News");
        assert!(!r.matches("FMT", &p, now));
        p.performer = "DJ Morning".to_string();
        assert!(r.matches("FMT", &p, now));
    }

    #[test]
    fn test_rule_set_is_an_or_in_any_order() {
        let a = rule(RuleFields {
            station_id: "TBS".to_string(),
            ..RuleFields::default()
        });
        let b = rule(RuleFields {
            title: "Title".to_string(),
            ..RuleFields::default()
        });
        let p = program("FMT", "20230625050000", "Title");
        let now = at(2023, 6, 25, 6, 0);
        assert!(!a.matches("FMT", &p, now));
        assert!(b.matches("FMT", &p, now));
        assert!(RuleSet::new(vec![a.clone(), b.clone()]).any_matches("FMT", &p, now));
        assert!(RuleSet::new(vec![b, a]).any_matches("FMT", &p, now));
        assert!(!RuleSet::default().any_matches("FMT", &p, now));
    }

    #[test]
    fn test_station_interest() {
        let set = RuleSet::new(vec![
            rule(RuleFields {
                station_id: "TBS".to_string(),
                ..RuleFields::default()
            }),
            rule(RuleFields {
                station_id: "MBS".to_string(),
                ..RuleFields::default()
            }),
            rule(RuleFields {
                station_id: "TBS".to_string(),
                title: "x".to_string(),
                ..RuleFields::default()
            }),
        ]);
        assert!(!set.has_wildcard());
        assert!(set.wants_station("TBS"));
        assert!(!set.wants_station("FMT"));
        assert_eq!(set.named_stations(), ["TBS", "MBS"]);

        let mut rules: Vec<Rule> = set.iter().cloned().collect();
        rules.push(rule(RuleFields {
            title: "y".to_string(),
            ..RuleFields::default()
        }));
        let set = RuleSet::new(rules);
        assert!(set.has_wildcard());
        assert!(set.wants_station("FMT"));
    }
}
