mod common;

use common::utc;
use skylog_core::config::{TimezoneConfig, TimezoneSource};
use skylog_core::session::{lookup_for, night_key, NauticalTimezone, TimezoneLookup, ZoneTimezone};

#[test]
fn test_zone_lookup_follows_political_zones() {
    let zones = ZoneTimezone::new();
    assert_eq!(zones.zone_name(40.4168, -3.7038).as_deref(), Some("Europe/Madrid"));

    // Madrid keeps CET/CEST although it lies west of Greenwich.
    assert_eq!(zones.offset_hours(40.4168, -3.7038, utc(2024, 1, 15, 22, 0, 0)), Some(1.0));
    assert_eq!(zones.offset_hours(40.4168, -3.7038, utc(2024, 7, 15, 22, 0, 0)), Some(2.0));
    assert_eq!(NauticalTimezone.offset_hours(40.4168, -3.7038, utc(2024, 1, 15, 22, 0, 0)), Some(0.0));

    // Half-hour zone.
    assert_eq!(zones.offset_hours(28.6139, 77.2090, utc(2024, 1, 15, 18, 0, 0)), Some(5.5));
}

#[test]
fn test_zone_offset_moves_night_key() {
    let zones = ZoneTimezone::new();
    // 11:30 UTC in January is 12:30 in Madrid: a new night has begun.
    let t = utc(2024, 1, 15, 11, 30, 0);
    let zone = zones.offset_hours(40.4168, -3.7038, t).unwrap();
    let nautical = NauticalTimezone.offset_hours(40.4168, -3.7038, t).unwrap();
    assert_eq!(night_key(t, zone), chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    assert_eq!(night_key(t, nautical), chrono::NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
}

#[test]
fn test_invalid_site_has_no_offset() {
    let zones = ZoneTimezone::new();
    let t = utc(2024, 1, 15, 0, 0, 0);
    assert_eq!(zones.offset_hours(f64::NAN, 10.0, t), None);
    assert_eq!(zones.offset_hours(45.0, 200.0, t), None);
    assert_eq!(NauticalTimezone.offset_hours(95.0, 10.0, t), None);
}

#[test]
fn test_lookup_for_config() {
    let t = utc(2024, 1, 15, 0, 0, 0);

    let default = lookup_for(&TimezoneConfig::default());
    assert_eq!(default.offset_hours(40.4168, -3.7038, t), Some(1.0));

    let nautical = lookup_for(&TimezoneConfig {
        source: TimezoneSource::Nautical,
        fixed_offset_hours: None,
    });
    assert_eq!(nautical.offset_hours(40.4168, -3.7038, t), Some(0.0));

    let fixed = lookup_for(&TimezoneConfig {
        source: TimezoneSource::Zone,
        fixed_offset_hours: Some(-6.0),
    });
    assert_eq!(fixed.offset_hours(40.4168, -3.7038, t), Some(-6.0));
}
