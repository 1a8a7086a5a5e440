//! UTCTime and GeneralizedTime values
//!
//! Both time types share one value representation, an instant in UTC. Each
//! [`TimeKind`] carries its own pattern, parser and canonical formatter, so
//! adding a time type means adding a variant here.

use crate::error::{Asn1Error, Asn1Result};
use crate::tag::Tag;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;

static UTC_TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})?(Z|[+-][0-9]{4})$")
        .expect("UTCTime pattern is a valid regex")
});

static GENERALIZED_TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]{4})([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})?([0-9]{2})?(?:([.,])([0-9]+))?(Z|[+-][0-9]{4})?$",
    )
        .expect("GeneralizedTime pattern is a valid regex")
});

/// The time types of the TIME family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeKind {
    /// UTCTime: two-digit year, second precision
    UtcTime,
    /// GeneralizedTime: four-digit year, optional fractional seconds
    GeneralizedTime,
}

impl TimeKind {
    /// Universal tag of the time type
    pub fn tag(self) -> Tag {
        match self {
            TimeKind::UtcTime => Tag::UTC_TIME,
            TimeKind::GeneralizedTime => Tag::GENERALIZED_TIME,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeKind::UtcTime => "UTCTime",
            TimeKind::GeneralizedTime => "GeneralizedTime",
        }
    }

    /// Check whether `text` follows the relaxed pattern of this time type
    pub fn matches(self, text: &str) -> bool {
        match self {
            TimeKind::UtcTime => UTC_TIME_PATTERN.is_match(text),
            TimeKind::GeneralizedTime => GENERALIZED_TIME_PATTERN.is_match(text),
        }
    }

    /// Parse a time string into an instant
    ///
    /// # Arguments
    /// * `text` - The time string as found in the content octets
    /// * `canonical` - Require the DER form (seconds present, `Z` zone,
    ///   `.` separator, no trailing fractional zeros)
    ///
    /// A GeneralizedTime without zone designator is local time and is taken
    /// as UTC.
    pub fn parse(self, text: &str, canonical: bool) -> Asn1Result<TimeValue> {
        match self {
            TimeKind::UtcTime => parse_utc_time(text, canonical),
            TimeKind::GeneralizedTime => parse_generalized_time(text, canonical),
        }
    }

    /// Format an instant in the canonical pattern of this time type
    pub fn format(self, value: &TimeValue) -> Asn1Result<String> {
        let instant = value.instant();
        match self {
            TimeKind::UtcTime => {
                let year = instant.year();
                if !(1950..=2049).contains(&year) {
                    return Err(Asn1Error::IllegalValue(format!(
                        "Year {} cannot be represented as UTCTime",
                        year
                    )));
                }
                if instant.nanosecond() != 0 {
                    return Err(Asn1Error::IllegalValue(format!(
                        "UTCTime cannot carry fractional seconds: {}",
                        value
                    )));
                }
                Ok(instant.format("%y%m%d%H%M%SZ").to_string())
            }
            TimeKind::GeneralizedTime => {
                let mut text = instant.format("%Y%m%d%H%M%S").to_string();
                if text.len() != 14 {
                    return Err(Asn1Error::IllegalValue(format!(
                        "Year out of range for GeneralizedTime: {}",
                        value
                    )));
                }
                let nanos = instant.nanosecond();
                if nanos != 0 {
                    let fraction = format!("{:09}", nanos);
                    text.push('.');
                    text.push_str(fraction.trim_end_matches('0'));
                }
                text.push('Z');
                Ok(text)
            }
        }
    }
}

impl fmt::Display for TimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of the TIME family: an instant in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeValue {
    instant: DateTime<Utc>,
}

impl TimeValue {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// Constructs a time value from calendar fields in UTC
    pub fn from_ymd_hms(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Asn1Result<Self> {
        build_instant(year, month, day, hour, minute, second, 0, 0).map(Self::new)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instant.to_rfc3339())
    }
}

fn parse_utc_time(text: &str, canonical: bool) -> Asn1Result<TimeValue> {
    let caps = UTC_TIME_PATTERN.captures(text).ok_or_else(|| {
        Asn1Error::IllegalValue(format!("'{}' does not match the UTCTime pattern", text))
    })?;
    if canonical && (caps.get(6).is_none() || &caps[7] != "Z") {
        return Err(Asn1Error::IllegalValue(format!(
            "'{}' is not a canonical UTCTime (YYMMDDhhmmssZ)",
            text
        )));
    }
    let yy = number(&caps, 1)?;
    let year = (if yy >= 50 { 1900 + yy } else { 2000 + yy }) as i32;
    let second = caps.get(6).map(|_| number(&caps, 6)).transpose()?.unwrap_or(0);
    let offset = offset_minutes(&caps[7])?;
    build_instant(
        year,
        number(&caps, 2)?,
        number(&caps, 3)?,
        number(&caps, 4)?,
        number(&caps, 5)?,
        second,
        0,
        offset,
    )
    .map(TimeValue::new)
}

fn parse_generalized_time(text: &str, canonical: bool) -> Asn1Result<TimeValue> {
    let caps = GENERALIZED_TIME_PATTERN.captures(text).ok_or_else(|| {
        Asn1Error::IllegalValue(format!(
            "'{}' does not match the GeneralizedTime pattern",
            text
        ))
    })?;
    let has_minutes = caps.get(5).is_some();
    let has_seconds = caps.get(6).is_some();
    let fraction = caps.get(8).map(|m| m.as_str());
    if fraction.is_some() && !has_seconds {
        return Err(Asn1Error::IllegalValue(format!(
            "'{}': fractional hours and minutes are not supported",
            text
        )));
    }
    if canonical {
        let zone_ok = caps.get(9).map(|m| m.as_str() == "Z").unwrap_or(false);
        let separator_ok = caps.get(7).map(|m| m.as_str() == ".").unwrap_or(true);
        let fraction_ok = fraction.map(|f| !f.ends_with('0')).unwrap_or(true);
        if !(has_minutes && has_seconds && zone_ok && separator_ok && fraction_ok) {
            return Err(Asn1Error::IllegalValue(format!(
                "'{}' is not a canonical GeneralizedTime (YYYYMMDDhhmmss[.f]Z)",
                text
            )));
        }
    }
    let nanos = match fraction {
        Some(digits) if digits.len() > 9 => {
            return Err(Asn1Error::IllegalValue(format!(
                "'{}': more than nanosecond precision",
                text
            )))
        }
        Some(digits) => {
            let padded = format!("{:0<9}", digits);
            padded
                .parse::<u32>()
                .map_err(|e| Asn1Error::IllegalValue(format!("Invalid fraction in '{}': {}", text, e)))?
        }
        None => 0,
    };
    let offset = match caps.get(9) {
        Some(zone) => offset_minutes(zone.as_str())?,
        None => 0,
    };
    let minute = if has_minutes { number(&caps, 5)? } else { 0 };
    let second = if has_seconds { number(&caps, 6)? } else { 0 };
    build_instant(
        number(&caps, 1)? as i32,
        number(&caps, 2)?,
        number(&caps, 3)?,
        number(&caps, 4)?,
        minute,
        second,
        nanos,
        offset,
    )
    .map(TimeValue::new)
}

fn number(caps: &Captures<'_>, group: usize) -> Asn1Result<u32> {
    caps[group]
        .parse::<u32>()
        .map_err(|e| Asn1Error::IllegalValue(format!("Invalid time field '{}': {}", &caps[group], e)))
}

/// Zone designator in minutes east of UTC
fn offset_minutes(zone: &str) -> Asn1Result<i64> {
    if zone == "Z" {
        return Ok(0);
    }
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let field = |range: std::ops::Range<usize>| -> Asn1Result<u32> {
        zone.get(range)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| Asn1Error::IllegalValue(format!("Invalid zone '{}'", zone)))?
            .parse()
            .map_err(|e| Asn1Error::IllegalValue(format!("Invalid zone '{}': {}", zone, e)))
    };
    let hours = field(1..3)?;
    let minutes = field(3..5)?;
    verify(hours, "Zone hour", 0, 23)?;
    verify(minutes, "Zone minute", 0, 59)?;
    Ok(sign * (hours as i64 * 60 + minutes as i64))
}

#[allow(clippy::too_many_arguments)]
fn build_instant(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    nanos: u32,
    offset_minutes: i64,
) -> Asn1Result<DateTime<Utc>> {
    verify(month, "Month", 1, 12)?;
    verify(hour, "Hour", 0, 23)?;
    verify(minute, "Minute", 0, 59)?;
    verify(second, "Second", 0, 59)?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        Asn1Error::IllegalValue(format!("Invalid date {:04}-{:02}-{:02}", year, month, day))
    })?;
    let naive = date
        .and_hms_nano_opt(hour, minute, second, nanos)
        .ok_or_else(|| Asn1Error::IllegalValue(format!("Invalid time {:02}:{:02}:{:02}", hour, minute, second)))?;
    Ok(Utc.from_utc_datetime(&naive) - Duration::minutes(offset_minutes))
}

fn verify(value: u32, name: &str, lower_bound: u32, upper_bound: u32) -> Asn1Result<()> {
    if value < lower_bound || value > upper_bound {
        Err(Asn1Error::IllegalValue(format!(
            "{} is out of range [{}, {}], got {}",
            name, lower_bound, upper_bound, value
        )))
    } else {
        Ok(())
    }
}
