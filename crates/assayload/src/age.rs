//! Developmental age parsing
//!
//! Specimen and gel lane ages are free text in a small controlled grammar.
//! Each age resolves to a range in post-coital days: embryonic days map to
//! themselves, postnatal ages are offset by [`BIRTH_OFFSET`].
//!
//! | Age                          | min     | max     |
//! |------------------------------|---------|---------|
//! | `embryonic day 9.5`          | 9.5     | 9.5     |
//! | `embryonic day 9.5-10.5`     | 9.5     | 10.5    |
//! | `embryonic day 8,9.5`        | 8.0     | 9.5     |
//! | `postnatal day 5`            | 26.01   | 26.01   |
//! | `postnatal week 2`           | 35.01   | 35.01   |
//! | `postnatal adult`            | 42.01   | 1846.0  |
//! | `Not Specified`              | -1.0    | -1.0    |
//!
//! The shorthand `E9.5` and `P5` is accepted and stored in canonical form.

use assayload_common::CommonError;
use regex::Regex;

/// Days from conception to birth added to postnatal ages
pub const BIRTH_OFFSET: f64 = 21.01;

/// Upper bound for open-ended postnatal ages
pub const MAX_AGE: f64 = 1846.0;

/// Ages that are valid but carry no range
pub const UNRESOLVED_AGES: [&str; 3] = ["Not Specified", "Not Applicable", "Not Resolved"];

/// A parsed age with its canonical text
#[derive(Debug, Clone, PartialEq)]
pub struct AgeRange {
    pub age: String,
    pub min: f64,
    pub max: f64,
}

impl AgeRange {
    fn new(age: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            age: age.into(),
            min,
            max,
        }
    }

    /// False for "Not Specified" style ages (min/max of -1)
    pub fn is_resolved(&self) -> bool {
        self.min >= 0.0 && self.max >= 0.0
    }
}

/// Compiled age grammar
pub struct AgeParser {
    qualified: Regex,
    shorthand: Regex,
}

impl AgeParser {
    pub fn new() -> Result<Self, CommonError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| CommonError::Parse(format!("age pattern: {}", e)))
        };

        Ok(Self {
            qualified: compile(r"^(embryonic|postnatal) (day|week|month) ([0-9.,\- ]+)$")?,
            shorthand: compile(r"^([EP])([0-9.]+(?:-[0-9.]+)?)$")?,
        })
    }

    /// Parse an age; `None` means the text is not a recognizable age
    pub fn parse(&self, raw: &str) -> Option<AgeRange> {
        let age = raw.trim();

        if UNRESOLVED_AGES.contains(&age) {
            return Some(AgeRange::new(age, -1.0, -1.0));
        }

        match age {
            "embryonic" => return Some(AgeRange::new(age, 0.0, 21.0)),
            "postnatal" => return Some(AgeRange::new(age, BIRTH_OFFSET, MAX_AGE)),
            "postnatal newborn" => return Some(AgeRange::new(age, BIRTH_OFFSET, 25.0)),
            "postnatal adult" => return Some(AgeRange::new(age, 42.01, MAX_AGE)),
            _ => {},
        }

        if let Some(caps) = self.shorthand.captures(age) {
            let stage = if &caps[1] == "E" { "embryonic" } else { "postnatal" };
            return self.parse_qualified(&format!("{} day {}", stage, &caps[2]));
        }

        self.parse_qualified(age)
    }

    fn parse_qualified(&self, age: &str) -> Option<AgeRange> {
        let caps = self.qualified.captures(age)?;
        let postnatal = &caps[1] == "postnatal";
        let days_per_unit = match &caps[2] {
            "day" => 1.0,
            "week" => 7.0,
            _ => 30.0,
        };

        let values = caps[3]
            .split([',', '-'])
            .map(str::trim)
            .map(|v| v.parse::<f64>().ok())
            .collect::<Option<Vec<f64>>>()?;

        if values.is_empty() || values.iter().any(|v| *v < 0.0) {
            return None;
        }

        // Embryonic ages are only given in days
        if !postnatal && days_per_unit != 1.0 {
            return None;
        }

        let to_days = |v: f64| {
            if postnatal {
                v * days_per_unit + BIRTH_OFFSET
            } else {
                v
            }
        };

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(AgeRange::new(age, round2(to_days(min)), round2(to_days(max))))
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Render an age bound the way the store loads it ("9.5", "26.01", "-1")
pub fn format_bound(v: f64) -> String {
    let rounded = round2(v);
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        let text = format!("{:.2}", rounded);
        text.trim_end_matches('0').to_string()
    }
}
