use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("month anchor must be formatted as MM-YYYY")]
pub struct InvalidDate;

/// A calendar month, stored as its first instant in UTC.
///
/// Billing dates are only meaningful at month granularity, so the day and time
/// components are always zero and anchors compare by month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthAnchor(DateTime<Utc>);

impl MonthAnchor {
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidDate> {
        if !(1..=12).contains(&month) {
            return Err(InvalidDate);
        }

        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .map(Self)
            .ok_or(InvalidDate)
    }

    /// Truncates a stored timestamp down to the month it falls in.
    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self::new(value.year(), value.month()).unwrap_or(Self(value))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

/// Parses an `MM-YYYY` designator such as `07-2025`.
pub fn parse_month_anchor(input: &str) -> Result<MonthAnchor, InvalidDate> {
    let (month, year) = input.trim().split_once('-').ok_or(InvalidDate)?;

    if month.len() != 2 || year.len() != 4 {
        return Err(InvalidDate);
    }
    if !month.bytes().chain(year.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(InvalidDate);
    }

    let month: u32 = month.parse().map_err(|_| InvalidDate)?;
    let year: i32 = year.parse().map_err(|_| InvalidDate)?;

    MonthAnchor::new(year, month)
}

impl FromStr for MonthAnchor {
    type Err = InvalidDate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_month_anchor(s)
    }
}

impl Display for MonthAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:04}", self.month(), self.year())
    }
}

impl From<MonthAnchor> for DateTime<Utc> {
    fn from(value: MonthAnchor) -> Self {
        value.0
    }
}

impl Serialize for MonthAnchor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthAnchor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_month_anchor(&raw).map_err(serde::de::Error::custom)
    }
}
