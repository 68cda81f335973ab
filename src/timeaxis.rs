//! CF time-axis decoding and calendar-aware resampling buckets
//!
//! The time coordinate of a netCDF cube stores raw offsets plus a CF `units`
//! attribute such as `"days since 2019-01-01 00:00:00"`. This module decodes
//! that axis into timestamps and maps timestamps onto the coarser buckets
//! described by a `TimeResolution` specification (`1D`, `5D`, `6H`, `1M`, ...).

use crate::errors::{Nc2TifError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Decodes the named time coordinate of an open netCDF file into timestamps.
///
/// # Errors
///
/// Returns an error if the coordinate variable is missing, carries no string
/// `units` attribute, or the units cannot be parsed as CF time units.
pub fn decode_time_axis(file: &netcdf::File, coord_name: &str) -> Result<Vec<NaiveDateTime>> {
    let var = file
        .variable(coord_name)
        .ok_or_else(|| Nc2TifError::MissingCoordinate {
            name: coord_name.to_string(),
        })?;

    let units = var
        .attribute("units")
        .and_then(|attr| attr.value().ok())
        .and_then(|value| match value {
            netcdf::AttributeValue::Str(s) => Some(s),
            _ => None,
        })
        .ok_or_else(|| {
            Nc2TifError::TimeUnits(format!(
                "variable '{}' has no string 'units' attribute",
                coord_name
            ))
        })?;

    let (step_seconds, epoch) = parse_cf_units(&units)?;

    let raw: Vec<f64> = var.get_values::<f64, _>(..)?;
    Ok(raw
        .into_iter()
        .map(|offset| epoch + Duration::milliseconds((offset * step_seconds * 1000.0).round() as i64))
        .collect())
}

/// Parses a CF time-units string (`"<unit> since <datetime>"`) into the number
/// of seconds per stored step and the epoch the offsets count from.
pub fn parse_cf_units(units: &str) -> Result<(f64, NaiveDateTime)> {
    let mut parts = units.splitn(2, " since ");
    let unit = parts
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_lowercase();
    let epoch_str = parts
        .next()
        .map(str::trim)
        .ok_or_else(|| Nc2TifError::TimeUnits(format!("'{}' is missing 'since'", units)))?;

    let step_seconds = match unit.as_str() {
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
        "days" | "day" | "d" => 86_400.0,
        other => {
            return Err(Nc2TifError::TimeUnits(format!(
                "unsupported time unit '{}'",
                other
            )))
        }
    };

    let epoch = parse_epoch(epoch_str)
        .ok_or_else(|| Nc2TifError::TimeUnits(format!("cannot parse epoch '{}'", epoch_str)))?;

    Ok((step_seconds, epoch))
}

fn parse_epoch(text: &str) -> Option<NaiveDateTime> {
    // Strip a trailing Z or " UTC" marker; CF epochs are treated as naive.
    let text = text
        .trim_end_matches('Z')
        .trim_end_matches(" UTC")
        .trim();

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Calendar unit of a resampling bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

/// A resampling bucket specification: `count` multiples of `unit`
///
/// Hours, days and weeks are fixed spans anchored at midnight of the earliest
/// timestamp's day. Months and years follow the calendar, anchored at the
/// earliest timestamp's month or year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeResolution {
    pub count: u32,
    pub unit: TimeUnit,
}

impl FromStr for TimeResolution {
    type Err = Nc2TifError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| Nc2TifError::InvalidResolution(format!("'{}' has no unit suffix", s)))?;
        let (digits, suffix) = s.split_at(split);

        let count: u32 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| Nc2TifError::InvalidResolution(format!("bad count in '{}'", s)))?
        };
        if count == 0 {
            return Err(Nc2TifError::InvalidResolution(format!(
                "count must be positive in '{}'",
                s
            )));
        }

        let unit = match suffix.to_ascii_uppercase().as_str() {
            "H" => TimeUnit::Hours,
            "D" => TimeUnit::Days,
            "W" => TimeUnit::Weeks,
            "M" => TimeUnit::Months,
            "Y" | "A" => TimeUnit::Years,
            other => {
                return Err(Nc2TifError::InvalidResolution(format!(
                    "unknown unit '{}' in '{}'",
                    other, s
                )))
            }
        };

        Ok(TimeResolution { count, unit })
    }
}

impl TimeResolution {
    /// The anchor all buckets of this resolution are aligned against,
    /// derived from the earliest timestamp on the axis.
    pub fn anchor_for(&self, earliest: NaiveDateTime) -> NaiveDateTime {
        let date = earliest.date();
        let date = match self.unit {
            TimeUnit::Hours | TimeUnit::Days | TimeUnit::Weeks => date,
            TimeUnit::Months => date.with_day(1).unwrap_or(date),
            TimeUnit::Years => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        };
        date.and_time(NaiveTime::MIN)
    }

    /// Maps a timestamp onto the start of its bucket.
    pub fn bucket_start(&self, t: NaiveDateTime, anchor: NaiveDateTime) -> NaiveDateTime {
        match self.unit {
            TimeUnit::Hours | TimeUnit::Days | TimeUnit::Weeks => {
                let span = self.span_seconds();
                let k = (t - anchor).num_seconds().div_euclid(span);
                anchor + Duration::seconds(k * span)
            }
            TimeUnit::Months => {
                let months = (t.year() - anchor.year()) * 12
                    + (t.month0() as i32 - anchor.month0() as i32);
                let k = months.div_euclid(self.count as i32);
                let total = anchor.year() * 12 + anchor.month0() as i32 + k * self.count as i32;
                let (year, month0) = (total.div_euclid(12), total.rem_euclid(12));
                NaiveDate::from_ymd_opt(year, month0 as u32 + 1, 1)
                    .unwrap_or_else(|| anchor.date())
                    .and_time(NaiveTime::MIN)
            }
            TimeUnit::Years => {
                let k = (t.year() - anchor.year()).div_euclid(self.count as i32);
                let year = anchor.year() + k * self.count as i32;
                NaiveDate::from_ymd_opt(year, 1, 1)
                    .unwrap_or_else(|| anchor.date())
                    .and_time(NaiveTime::MIN)
            }
        }
    }

    /// Start of the bucket immediately following the one starting at `start`.
    fn next_start(&self, start: NaiveDateTime) -> NaiveDateTime {
        match self.unit {
            TimeUnit::Hours | TimeUnit::Days | TimeUnit::Weeks => {
                start + Duration::seconds(self.span_seconds())
            }
            TimeUnit::Months => {
                let total = start.year() * 12 + start.month0() as i32 + self.count as i32;
                let (year, month0) = (total.div_euclid(12), total.rem_euclid(12));
                NaiveDate::from_ymd_opt(year, month0 as u32 + 1, 1)
                    .unwrap_or_else(|| start.date())
                    .and_time(NaiveTime::MIN)
            }
            TimeUnit::Years => NaiveDate::from_ymd_opt(start.year() + self.count as i32, 1, 1)
                .unwrap_or_else(|| start.date())
                .and_time(NaiveTime::MIN),
        }
    }

    fn span_seconds(&self) -> i64 {
        let unit_seconds = match self.unit {
            TimeUnit::Hours => 3_600,
            TimeUnit::Days => 86_400,
            TimeUnit::Weeks => 7 * 86_400,
            // Calendar units never reach this path
            TimeUnit::Months | TimeUnit::Years => 0,
        };
        i64::from(self.count) * unit_seconds
    }
}

/// Assigns every timestamp on the axis to its resampling bucket.
///
/// The bucket axis is contiguous from the first to the last occupied bucket;
/// a bucket spanned by the axis but containing no timestamps still appears
/// (its slice comes out all-missing downstream). Returns the chronologically
/// ordered bucket starts together with, for each input timestamp, the index
/// of the bucket it falls in. Bucket starts are unique, strictly ordered and
/// non-overlapping by construction.
pub fn assign_buckets(
    times: &[NaiveDateTime],
    resolution: TimeResolution,
) -> (Vec<NaiveDateTime>, Vec<usize>) {
    let (earliest, latest) = match (times.iter().min(), times.iter().max()) {
        (Some(&a), Some(&b)) => (a, b),
        _ => return (Vec::new(), Vec::new()),
    };
    let anchor = resolution.anchor_for(earliest);
    let last = resolution.bucket_start(latest, anchor);

    let mut starts = vec![resolution.bucket_start(earliest, anchor)];
    let mut current = starts[0];
    while current < last {
        let next = resolution.next_start(current);
        if next <= current {
            break;
        }
        starts.push(next);
        current = next;
    }

    let index: BTreeMap<NaiveDateTime, usize> =
        starts.iter().enumerate().map(|(i, &s)| (s, i)).collect();

    let membership = times
        .iter()
        .map(|&t| index[&resolution.bucket_start(t, anchor)])
        .collect();
    (starts, membership)
}
