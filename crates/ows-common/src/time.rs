//! Temporal resolution of layers: search windows and dataset grouping.
//!
//! Every window returned here is a closed interval in UTC with `start <= end`,
//! ready to hand to the catalogue query unchanged.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::bbox::{solar_offset_for_longitude, BoundingBox};

/// Units reported for the `time` grouping dimension.
pub const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";

/// Time resolution configured on a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeResolution {
    /// One observation per local solar day.
    #[default]
    Raw,
    /// Daily summary products.
    Day,
    /// Monthly summary products.
    Month,
    /// Yearly summary products.
    Year,
}

impl TimeResolution {
    /// Parse a configuration value. Accepts the legacy `solar` and `summary` names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "solar" => Some(Self::Raw),
            "day" | "summary" => Some(Self::Day),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw)
    }

    pub fn is_day(&self) -> bool {
        matches!(self, Self::Day)
    }

    pub fn is_month(&self) -> bool {
        matches!(self, Self::Month)
    }

    pub fn is_year(&self) -> bool {
        matches!(self, Self::Year)
    }

    /// Compute the catalogue search window for a requested instant.
    ///
    /// RAW resolution needs the request geobox to find the local solar day;
    /// the summary resolutions ignore it.
    pub fn search_times(
        &self,
        t: DateTime<Utc>,
        geobox: Option<&BoundingBox>,
    ) -> Result<SearchWindow, TimeError> {
        match self {
            Self::Raw => {
                let geobox = geobox.ok_or(TimeError::GeoboxRequired)?;
                self.search_times_with_offset(t, geobox.solar_offset())
            }
            _ => self.search_times_with_offset(t, Utc.fix()),
        }
    }

    /// Compute the search window with an explicit local offset.
    ///
    /// The offset only affects RAW resolution.
    pub fn search_times_with_offset(
        &self,
        t: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<SearchWindow, TimeError> {
        let date = t.date_naive();
        let (first, last) = match self {
            Self::Raw => {
                let start = offset
                    .from_local_datetime(&midnight(date)?)
                    .single()
                    .ok_or(TimeError::OutOfRange)?
                    .with_timezone(&Utc);
                debug!(%t, offset = offset.local_minus_utc(), "solar day window");
                return SearchWindow::new(start, start + Duration::days(1) - Duration::seconds(1));
            }
            Self::Day => (date, date),
            Self::Month => {
                let first = date.with_day(1).ok_or(TimeError::OutOfRange)?;
                (first, last_day_of_month(first)?)
            }
            Self::Year => (
                NaiveDate::from_ymd_opt(date.year(), 1, 1).ok_or(TimeError::OutOfRange)?,
                NaiveDate::from_ymd_opt(date.year(), 12, 31).ok_or(TimeError::OutOfRange)?,
            ),
        };
        SearchWindow::new(
            Utc.from_utc_datetime(&midnight(first)?),
            Utc.from_utc_datetime(&end_of_day(last)?),
        )
    }

    /// Grouping rule the catalogue should apply to datasets of this layer.
    pub fn dataset_groupby(&self) -> GroupBy {
        GroupBy { resolution: *self }
    }
}

fn midnight(date: NaiveDate) -> Result<NaiveDateTime, TimeError> {
    date.and_hms_opt(0, 0, 0).ok_or(TimeError::OutOfRange)
}

fn end_of_day(date: NaiveDate) -> Result<NaiveDateTime, TimeError> {
    date.and_hms_opt(23, 59, 59).ok_or(TimeError::OutOfRange)
}

fn last_day_of_month(first: NaiveDate) -> Result<NaiveDate, TimeError> {
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).ok_or(TimeError::OutOfRange)
}

/// A closed UTC search interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SearchWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeError> {
        if start > end {
            return Err(TimeError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Time metadata of one catalogue dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetTime {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Centre longitude of the dataset footprint.
    pub longitude: Option<f64>,
    /// Explicit local offset; takes precedence over `longitude`.
    pub utc_offset: Option<FixedOffset>,
}

impl DatasetTime {
    pub fn instant(t: DateTime<Utc>) -> Self {
        Self {
            begin: t,
            end: t,
            longitude: None,
            utc_offset: None,
        }
    }

    pub fn with_longitude(mut self, lon: f64) -> Self {
        self.longitude = Some(lon);
        self
    }

    pub fn center_time(&self) -> DateTime<Utc> {
        self.begin + (self.end - self.begin) / 2
    }

    /// Calendar date of the dataset's centre time in local solar time.
    pub fn solar_day(&self) -> NaiveDate {
        let offset = self
            .utc_offset
            .or_else(|| self.longitude.map(solar_offset_for_longitude))
            .unwrap_or_else(|| Utc.fix());
        self.center_time().with_timezone(&offset).date_naive()
    }
}

/// Bucket key produced by a [`GroupBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    SolarDay(NaiveDate),
    Instant(DateTime<Utc>),
}

/// Dataset grouping rule for a time resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupBy {
    resolution: TimeResolution,
}

impl GroupBy {
    /// Name of the grouped dimension.
    pub fn dimension(&self) -> &'static str {
        if self.resolution.is_raw() {
            "solar_day"
        } else {
            "time"
        }
    }

    pub fn units(&self) -> &'static str {
        TIME_UNITS
    }

    pub fn group_key(&self, ds: &DatasetTime) -> GroupKey {
        if self.resolution.is_raw() {
            GroupKey::SolarDay(ds.solar_day())
        } else {
            GroupKey::Instant(ds.begin)
        }
    }

    /// Representative instant used to order datasets within and across buckets.
    pub fn sort_key(&self, ds: &DatasetTime) -> DateTime<Utc> {
        ds.begin
    }

    /// Bucket items by group key; each bucket is ordered by sort key.
    pub fn group<T, F>(&self, items: impl IntoIterator<Item = T>, time_of: F) -> BTreeMap<GroupKey, Vec<T>>
    where
        F: Fn(&T) -> &DatasetTime,
    {
        let mut groups: BTreeMap<GroupKey, Vec<T>> = BTreeMap::new();
        for item in items {
            groups.entry(self.group_key(time_of(&item))).or_default().push(item);
        }
        for bucket in groups.values_mut() {
            bucket.sort_by_key(|item| self.sort_key(time_of(item)));
        }
        groups
    }
}

/// Parse an ISO 8601 instant; naive values are taken as UTC.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, TimeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&midnight(date)?));
    }

    Err(TimeError::InvalidFormat(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TimeError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("RAW time resolution requires a geobox")]
    GeoboxRequired,

    #[error("Date out of supported range")]
    OutOfRange,

    #[error("Search window start {start} is after end {end}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}
