//! Tests for temporal search windows and dataset grouping.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use ows_common::time::TIME_UNITS;
use ows_common::{BoundingBox, DatasetTime, GroupKey, TimeError, TimeResolution};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// A 1x2 degree box in south-eastern Australia centred on 150E.
fn east_coast_geobox() -> BoundingBox {
    BoundingBox::new(149.5, -35.0, 150.5, -33.0)
}

// ============================================================================
// Search windows
// ============================================================================

#[test]
fn test_day_window() {
    let window = TimeResolution::Day
        .search_times(utc(2020, 6, 7, 0, 0, 0), None)
        .unwrap();
    assert_eq!(window.start, utc(2020, 6, 7, 0, 0, 0));
    assert_eq!(window.end, utc(2020, 6, 7, 23, 59, 59));
}

#[test]
fn test_day_window_ignores_geobox_and_time_of_day() {
    let geobox = east_coast_geobox();
    let window = TimeResolution::Day
        .search_times(utc(2020, 6, 7, 18, 30, 0), Some(&geobox))
        .unwrap();
    assert_eq!(window.start, utc(2020, 6, 7, 0, 0, 0));
    assert_eq!(window.end, utc(2020, 6, 7, 23, 59, 59));
}

#[test]
fn test_month_window() {
    let geobox = east_coast_geobox();
    let window = TimeResolution::Month
        .search_times(utc(2020, 6, 1, 0, 0, 0), Some(&geobox))
        .unwrap();
    assert_eq!(window.start, utc(2020, 6, 1, 0, 0, 0));
    assert_eq!(window.end, utc(2020, 6, 30, 23, 59, 59));
}

#[test]
fn test_month_window_february_leap_year() {
    let window = TimeResolution::Month
        .search_times(utc(2020, 2, 17, 5, 0, 0), None)
        .unwrap();
    assert_eq!(window.start, utc(2020, 2, 1, 0, 0, 0));
    assert_eq!(window.end, utc(2020, 2, 29, 23, 59, 59));
}

#[test]
fn test_year_window() {
    let window = TimeResolution::Year
        .search_times(utc(2020, 6, 1, 0, 0, 0), None)
        .unwrap();
    assert_eq!(window.start, utc(2020, 1, 1, 0, 0, 0));
    assert_eq!(window.end, utc(2020, 12, 31, 23, 59, 59));
}

#[test]
fn test_raw_window_utc_plus_ten() {
    let geobox = east_coast_geobox();
    let window = TimeResolution::Raw
        .search_times(utc(2020, 6, 7, 20, 20, 0), Some(&geobox))
        .unwrap();
    // Local midnight of 2020-06-07 at UTC+10.
    assert_eq!(window.start, utc(2020, 6, 6, 14, 0, 0));
    assert_eq!(window.end, utc(2020, 6, 7, 13, 59, 59));
    assert_eq!(window.duration().num_seconds(), 24 * 3600 - 1);
}

#[test]
fn test_raw_window_explicit_offset() {
    let offset = FixedOffset::east_opt(10 * 3600 + 5 * 60).unwrap();
    let window = TimeResolution::Raw
        .search_times_with_offset(utc(2020, 6, 7, 20, 20, 0), offset)
        .unwrap();
    assert_eq!(window.start, utc(2020, 6, 6, 13, 55, 0));
    assert_eq!(window.end, utc(2020, 6, 7, 13, 54, 59));
}

#[test]
fn test_raw_window_western_hemisphere() {
    let geobox = BoundingBox::new(-76.0, 38.0, -74.0, 40.0);
    let window = TimeResolution::Raw
        .search_times(utc(2021, 3, 2, 1, 0, 0), Some(&geobox))
        .unwrap();
    assert_eq!(window.start, utc(2021, 3, 2, 5, 0, 0));
    assert_eq!(window.end, utc(2021, 3, 3, 4, 59, 59));
}

#[test]
fn test_raw_window_requires_geobox() {
    let result = TimeResolution::Raw.search_times(utc(2020, 6, 7, 0, 0, 0), None);
    assert!(matches!(result, Err(TimeError::GeoboxRequired)));
}

#[test]
fn test_windows_are_ordered() {
    let geobox = east_coast_geobox();
    for res in [
        TimeResolution::Raw,
        TimeResolution::Day,
        TimeResolution::Month,
        TimeResolution::Year,
    ] {
        let window = res.search_times(utc(2019, 12, 31, 23, 59, 59), Some(&geobox)).unwrap();
        assert!(window.start <= window.end, "{:?}", res);
    }
}

// ============================================================================
// Grouping
// ============================================================================

#[test]
fn test_raw_groupby_uses_solar_day() {
    let gby = TimeResolution::Raw.dataset_groupby();
    assert_eq!(gby.dimension(), "solar_day");

    // 20:20 UTC at 150E is 06:20 the next local day.
    let ds = DatasetTime::instant(utc(2020, 6, 7, 20, 20, 0)).with_longitude(150.0);
    assert_eq!(
        gby.group_key(&ds),
        GroupKey::SolarDay(NaiveDate::from_ymd_opt(2020, 6, 8).unwrap())
    );
}

#[test]
fn test_explicit_offset_overrides_longitude() {
    let gby = TimeResolution::Raw.dataset_groupby();
    let mut ds = DatasetTime::instant(utc(2020, 6, 7, 20, 20, 0)).with_longitude(150.0);
    ds.utc_offset = Some(FixedOffset::east_opt(0).unwrap());
    assert_eq!(
        gby.group_key(&ds),
        GroupKey::SolarDay(NaiveDate::from_ymd_opt(2020, 6, 7).unwrap())
    );
}

#[test]
fn test_summary_groupby_uses_interval_start() {
    for res in [TimeResolution::Day, TimeResolution::Month, TimeResolution::Year] {
        let gby = res.dataset_groupby();
        assert_eq!(gby.dimension(), "time");
        assert_eq!(gby.units(), TIME_UNITS);

        let ds = DatasetTime {
            begin: utc(2020, 6, 1, 0, 0, 0),
            end: utc(2020, 6, 30, 23, 59, 59),
            longitude: Some(150.0),
            utc_offset: None,
        };
        assert_eq!(gby.group_key(&ds), GroupKey::Instant(ds.begin));
        assert_eq!(gby.sort_key(&ds), ds.begin);
    }
}

#[test]
fn test_group_buckets_are_sorted() {
    let gby = TimeResolution::Raw.dataset_groupby();
    let datasets = vec![
        ("late", DatasetTime::instant(utc(2020, 6, 7, 1, 0, 0)).with_longitude(150.0)),
        ("early", DatasetTime::instant(utc(2020, 6, 6, 23, 0, 0)).with_longitude(150.0)),
        ("next", DatasetTime::instant(utc(2020, 6, 7, 15, 0, 0)).with_longitude(150.0)),
    ];

    let groups = gby.group(datasets, |(_, t)| t);
    let names: Vec<Vec<&str>> = groups
        .values()
        .map(|bucket| bucket.iter().map(|(n, _)| *n).collect())
        .collect();
    assert_eq!(names, vec![vec!["early", "late"], vec!["next"]]);
}
