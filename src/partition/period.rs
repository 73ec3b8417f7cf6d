//! Partition periods.
//!
//! A period maps any UTC timestamp onto the identifier of the file that holds
//! it (`yyyyMMdd`, `yyyyMM`, `yyyy`) and parses identifiers back into the
//! period's start.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime};

use crate::error::{Error, Result};

pub const SECOND_MS: i64 = 1_000;
pub const MINUTE_MS: i64 = 60 * SECOND_MS;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Partitioning period of a series. All calendar math is UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionPeriod {
    Day,
    Month,
    Year,
}

impl PartitionPeriod {
    pub fn name(self) -> &'static str {
        match self {
            PartitionPeriod::Day => "DAY",
            PartitionPeriod::Month => "MONTH",
            PartitionPeriod::Year => "YEAR",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "DAY" => Some(PartitionPeriod::Day),
            "MONTH" => Some(PartitionPeriod::Month),
            "YEAR" => Some(PartitionPeriod::Year),
            _ => None,
        }
    }

    /// Length of a partition identifier in digits.
    pub fn id_len(self) -> usize {
        match self {
            PartitionPeriod::Day => 8,
            PartitionPeriod::Month => 6,
            PartitionPeriod::Year => 4,
        }
    }

    /// True when `name` has this period's digit-only identifier shape.
    pub fn matches(self, name: &str) -> bool {
        name.len() == self.id_len() && name.bytes().all(|b| b.is_ascii_digit())
    }

    /// Identifier of the partition holding `timestamp_ms`.
    pub fn filename(self, timestamp_ms: i64) -> Result<String> {
        let date = date_of(timestamp_ms)?;
        let (year, month, day) = (date.year(), u8::from(date.month()), date.day());
        Ok(match self {
            PartitionPeriod::Day => format!("{year:04}{month:02}{day:02}"),
            PartitionPeriod::Month => format!("{year:04}{month:02}"),
            PartitionPeriod::Year => format!("{year:04}"),
        })
    }

    /// Period-aligned floor of `timestamp_ms`.
    pub fn start(self, timestamp_ms: i64) -> Result<i64> {
        let date = date_of(timestamp_ms)?;
        let first = match self {
            PartitionPeriod::Day => date,
            PartitionPeriod::Month => calendar(date.year(), date.month(), 1)?,
            PartitionPeriod::Year => calendar(date.year(), Month::January, 1)?,
        };
        Ok(midnight_ms(first))
    }

    /// Start of the partition named `id`. Missing fields default to their minimum.
    pub fn parse_start(self, id: &str) -> Result<i64> {
        let invalid = || Error::InvalidPartitionId {
            value: id.to_string(),
            period: self.name(),
        };
        if !self.matches(id) {
            return Err(invalid());
        }
        let field = |range: std::ops::Range<usize>| id[range].parse::<u16>().map_err(|_| invalid());
        let year = field(0..4)? as i32;
        let month = match self {
            PartitionPeriod::Day | PartitionPeriod::Month => field(4..6)? as u8,
            PartitionPeriod::Year => 1,
        };
        let day = match self {
            PartitionPeriod::Day => field(6..8)? as u8,
            _ => 1,
        };
        let month = Month::try_from(month).map_err(|_| invalid())?;
        let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;
        Ok(midnight_ms(date))
    }

    /// Start of the period following the one starting at `start_ms`.
    pub fn next_start(self, start_ms: i64) -> Result<i64> {
        let date = date_of(start_ms)?;
        let next = match self {
            PartitionPeriod::Day => date
                .next_day()
                .ok_or(Error::InvalidTimestamp(start_ms))?,
            PartitionPeriod::Month => {
                let year = if date.month() == Month::December {
                    date.year() + 1
                } else {
                    date.year()
                };
                calendar(year, date.month().next(), 1)?
            }
            PartitionPeriod::Year => calendar(date.year() + 1, Month::January, 1)?,
        };
        Ok(midnight_ms(next))
    }
}

impl fmt::Display for PartitionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn date_of(timestamp_ms: i64) -> Result<Date> {
    let nanos = timestamp_ms as i128 * 1_000_000;
    let date = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|_| Error::InvalidTimestamp(timestamp_ms))?
        .date();
    // Identifiers are fixed at four year digits.
    if !(0..=9999).contains(&date.year()) {
        return Err(Error::InvalidTimestamp(timestamp_ms));
    }
    Ok(date)
}

fn calendar(year: i32, month: Month, day: u8) -> Result<Date> {
    Date::from_calendar_date(year, month, day).map_err(|_| {
        Error::InvalidTimestamp(year as i64)
    })
}

fn midnight_ms(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp() * SECOND_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-11-11T00:00:00Z
    const NOV_11_2024: i64 = 1_731_283_200_000;

    #[test]
    fn parse_start_defaults_missing_fields() {
        assert_eq!(
            PartitionPeriod::Year.parse_start("2024").unwrap(),
            1_704_067_200_000 // 2024-01-01
        );
        assert_eq!(
            PartitionPeriod::Month.parse_start("202402").unwrap(),
            1_706_745_600_000 // 2024-02-01
        );
        assert_eq!(
            PartitionPeriod::Day.parse_start("20240229").unwrap(),
            1_709_164_800_000 // 2024-02-29
        );
    }

    #[test]
    fn matchers_accept_only_their_own_shape() {
        assert!(PartitionPeriod::Day.matches("20240229"));
        assert!(!PartitionPeriod::Day.matches("202402"));
        assert!(!PartitionPeriod::Day.matches("2024022a"));
        assert!(PartitionPeriod::Month.matches("202402"));
        assert!(!PartitionPeriod::Month.matches("2024"));
        assert!(PartitionPeriod::Year.matches("2024"));
        assert!(!PartitionPeriod::Year.matches("20240229"));
        assert!(!PartitionPeriod::Year.matches("series.json"));
    }

    #[test]
    fn malformed_ids_fail() {
        assert!(PartitionPeriod::Day.parse_start("20230229").is_err());
        assert!(PartitionPeriod::Month.parse_start("202413").is_err());
        assert!(PartitionPeriod::Month.parse_start("202400").is_err());
        assert!(matches!(
            PartitionPeriod::Year.parse_start("24"),
            Err(Error::InvalidPartitionId { period: "YEAR", .. })
        ));
    }

    #[test]
    fn filename_and_start() {
        let t = NOV_11_2024 + 13 * HOUR_MS + 5 * MINUTE_MS;
        assert_eq!(PartitionPeriod::Day.filename(t).unwrap(), "20241111");
        assert_eq!(PartitionPeriod::Month.filename(t).unwrap(), "202411");
        assert_eq!(PartitionPeriod::Year.filename(t).unwrap(), "2024");
        assert_eq!(PartitionPeriod::Day.start(t).unwrap(), NOV_11_2024);
        assert_eq!(
            PartitionPeriod::Month.start(t).unwrap(),
            PartitionPeriod::Month.parse_start("202411").unwrap()
        );
    }

    #[test]
    fn negative_timestamps_floor_to_the_previous_day() {
        assert_eq!(PartitionPeriod::Day.filename(-1).unwrap(), "19691231");
        assert_eq!(PartitionPeriod::Day.start(-1).unwrap(), -DAY_MS);
    }

    #[test]
    fn next_start_crosses_boundaries() {
        let feb = PartitionPeriod::Month.parse_start("202402").unwrap();
        let mar = PartitionPeriod::Month.parse_start("202403").unwrap();
        assert_eq!(PartitionPeriod::Month.next_start(feb).unwrap(), mar);
        assert_eq!(mar - feb, 29 * DAY_MS);

        let dec = PartitionPeriod::Month.parse_start("202312").unwrap();
        assert_eq!(
            PartitionPeriod::Month.next_start(dec).unwrap(),
            PartitionPeriod::Month.parse_start("202401").unwrap()
        );

        let y2024 = PartitionPeriod::Year.parse_start("2024").unwrap();
        assert_eq!(PartitionPeriod::Year.next_start(y2024).unwrap() - y2024, 366 * DAY_MS);
    }

    #[test]
    fn period_names_round_trip() {
        for period in [PartitionPeriod::Day, PartitionPeriod::Month, PartitionPeriod::Year] {
            assert_eq!(PartitionPeriod::parse(period.name()), Some(period));
            assert_eq!(
                serde_json::to_string(&period).unwrap(),
                format!("\"{}\"", period.name())
            );
        }
    }
}
