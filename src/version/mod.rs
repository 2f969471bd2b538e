//! Version identifiers for the two-checkpoint versioning ritual.
//!
//! An identifier has the shape `sequence:type:yy:mm:dd:hh:mm:ss`, where the
//! type tag marks the checkpoint: `B` (before changes were applied), `A`
//! (after replacement) or `O` (official, committee approved).

mod history;

pub use history::{sanitize_comments, validate, ValidationReport, VersionHistoryEntry};

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from generating or parsing version identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The type tag is not one of B, A, O.
    #[error("Invalid version type '{0}' (expected B, A or O)")]
    InvalidType(String),

    /// Wrong number of colon-delimited fields.
    #[error("Version identifier must have 8 fields, found {0}")]
    FieldCount(usize),

    /// A numeric field did not parse.
    #[error("Invalid {field} in version identifier: '{value}'")]
    InvalidField { field: &'static str, value: String },

    /// The date/time fields do not form a real instant.
    #[error("Version identifier does not encode a valid date and time")]
    InvalidDateTime,

    /// Years outside 2000..=2099 cannot be encoded in two digits.
    #[error("Year {0} cannot be encoded as a two-digit version year")]
    YearOutOfRange(i32),
}

/// Checkpoint kind encoded in an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionType {
    /// Snapshot taken before suggestions were rewritten
    Before,
    /// Snapshot taken after the document was replaced
    After,
    /// Committee-approved version
    Official,
}

impl VersionType {
    /// Single-letter tag used in identifiers.
    pub fn tag(self) -> char {
        match self {
            VersionType::Before => 'B',
            VersionType::After => 'A',
            VersionType::Official => 'O',
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            VersionType::Before => "Before",
            VersionType::After => "After",
            VersionType::Official => "Official",
        }
    }
}

impl FromStr for VersionType {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(VersionType::Before),
            "A" => Ok(VersionType::After),
            "O" => Ok(VersionType::Official),
            other => Err(VersionError::InvalidType(other.to_string())),
        }
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// An immutable version identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionIdentifier(String);

impl VersionIdentifier {
    /// Build an identifier from a counter, a type and a local timestamp.
    pub fn generate(
        counter: u64,
        kind: VersionType,
        at: NaiveDateTime,
    ) -> Result<Self, VersionError> {
        let year = at.year();
        if !(2000..=2099).contains(&year) {
            return Err(VersionError::YearOutOfRange(year));
        }

        Ok(Self(format!(
            "{}:{}:{:02}:{:02}:{:02}:{:02}:{:02}:{:02}",
            counter,
            kind.tag(),
            year - 2000,
            at.month(),
            at.day(),
            at.hour(),
            at.minute(),
            at.second()
        )))
    }

    /// Build an identifier from a textual type tag.
    pub fn generate_tagged(counter: u64, tag: &str, at: NaiveDateTime) -> Result<Self, VersionError> {
        Self::generate(counter, tag.parse()?, at)
    }

    /// Parse this identifier back into its fields.
    pub fn parse(&self) -> Result<ParsedVersion, VersionError> {
        self.0.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VersionIdentifier {
    type Err = VersionError;

    /// Accepts only strings that parse as a well-formed identifier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<ParsedVersion>()?;
        Ok(Self(s.to_string()))
    }
}

/// Fields of a parsed identifier. `year` is the two-digit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedVersion {
    pub sequence: u64,
    pub kind: VersionType,
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl ParsedVersion {
    /// Four-digit year.
    pub fn full_year(&self) -> i32 {
        2000 + self.year as i32
    }

    /// The encoded instant.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.full_year(), self.month, self.day)?.and_hms_opt(
            self.hour,
            self.minute,
            self.second,
        )
    }

    /// Display form, e.g. "September 30, 2025 at 9:15 AM".
    pub fn format_for_display(&self) -> String {
        match self.datetime() {
            Some(dt) => dt.format("%B %-d, %Y at %-I:%M %p").to_string(),
            None => format!(
                "{:02}/{:02}/{} {:02}:{:02}",
                self.month,
                self.day,
                self.full_year(),
                self.hour,
                self.minute
            ),
        }
    }
}

impl FromStr for ParsedVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 8 {
            return Err(VersionError::FieldCount(fields.len()));
        }

        fn number<T: FromStr>(field: &'static str, value: &str) -> Result<T, VersionError> {
            value
                .parse()
                .map_err(|_| VersionError::InvalidField { field, value: value.to_string() })
        }

        let parsed = ParsedVersion {
            sequence: number("sequence", fields[0])?,
            kind: fields[1].parse()?,
            year: number("year", fields[2])?,
            month: number("month", fields[3])?,
            day: number("day", fields[4])?,
            hour: number("hour", fields[5])?,
            minute: number("minute", fields[6])?,
            second: number("second", fields[7])?,
        };

        if parsed.year > 99 || parsed.datetime().is_none() {
            return Err(VersionError::InvalidDateTime);
        }
        Ok(parsed)
    }
}
