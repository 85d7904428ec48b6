mod common;

use chrono::NaiveDate;

use common::{record, utc};
use skylog_core::record::{ImageRecord, ImageType};
use skylog_core::session::{group_sessions, night_key};
use skylog_core::store::Store;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_night_rolls_over_at_local_noon() {
    // UTC-7: local noon is 19:00 UTC.
    assert_eq!(night_key(utc(2023, 10, 1, 19, 0, 1), -7.0), date(2023, 10, 1));
    assert_eq!(night_key(utc(2023, 10, 2, 18, 59, 59), -7.0), date(2023, 10, 1));
    assert_eq!(night_key(utc(2023, 10, 2, 19, 0, 1), -7.0), date(2023, 10, 2));
}

#[test]
fn test_local_noon_starts_the_night() {
    // Exactly 12:00:00 local belongs to the night that begins then.
    assert_eq!(night_key(utc(2023, 10, 2, 19, 0, 0), -7.0), date(2023, 10, 2));
    assert_eq!(night_key(utc(2023, 10, 2, 2, 0, 0), 10.0), date(2023, 10, 2));
    assert_eq!(night_key(utc(2023, 10, 2, 12, 0, 0), 0.0), date(2023, 10, 2));
    assert_eq!(night_key(utc(2023, 10, 2, 11, 59, 59), 0.0), date(2023, 10, 1));
}

#[test]
fn test_session_view_at_local_noon() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_images(vec![
            record("/before.fits", ImageType::Light, utc(2023, 10, 2, 18, 59, 59), -7.0),
            record("/noon.fits", ImageType::Light, utc(2023, 10, 2, 19, 0, 0), -7.0),
        ])
        .unwrap();

    let before = store.image_by_filename("/before.fits").unwrap().unwrap();
    let noon = store.image_by_filename("/noon.fits").unwrap().unwrap();
    assert_eq!(store.session_of(before.id).unwrap(), Some(date(2023, 10, 1)));
    assert_eq!(store.session_of(noon.id).unwrap(), Some(date(2023, 10, 2)));

    let names: Vec<_> = store
        .session_images(date(2023, 10, 2))
        .unwrap()
        .into_iter()
        .map(|i| i.record.filename)
        .collect();
    assert_eq!(names, ["/noon.fits"]);
}

#[test]
fn test_night_key_east_of_utc() {
    // UTC+10: 01:00 UTC is 11:00 local, still the previous night.
    assert_eq!(night_key(utc(2023, 6, 15, 1, 0, 0), 10.0), date(2023, 6, 14));
    assert_eq!(night_key(utc(2023, 6, 15, 2, 30, 0), 10.0), date(2023, 6, 15));
    // Half-hour zones.
    assert_eq!(night_key(utc(2023, 6, 15, 6, 29, 0), 5.5), date(2023, 6, 14));
    assert_eq!(night_key(utc(2023, 6, 15, 6, 31, 0), 5.5), date(2023, 6, 15));
}

#[test]
fn test_store_view_matches_night_key() {
    let store = Store::open_in_memory().unwrap();
    let captures = [
        (utc(2023, 10, 1, 19, 0, 1), -7.0),
        (utc(2023, 10, 2, 18, 59, 59), -7.0),
        (utc(2023, 10, 2, 19, 0, 1), -7.0),
        (utc(2023, 10, 2, 19, 0, 0), -7.0),
        (utc(2023, 6, 15, 6, 29, 0), 5.5),
        (utc(2023, 6, 15, 6, 31, 0), 5.5),
        (utc(2024, 2, 29, 23, 59, 59), 0.0),
    ];
    let records: Vec<ImageRecord> = captures
        .iter()
        .enumerate()
        .map(|(i, (t, off))| record(&format!("/data/{i}.fits"), ImageType::Light, *t, *off))
        .collect();
    store.insert_images(records).unwrap();

    for image in store.all_images().unwrap() {
        let expected = image.record.night_session();
        assert!(expected.is_some());
        assert_eq!(store.session_of(image.id).unwrap(), expected, "{}", image.record.filename);
    }
}

#[test]
fn test_sessions_view_counts() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_images(vec![
            record("/a.fits", ImageType::Light, utc(2023, 10, 2, 3, 0, 0), -7.0),
            record("/b.fits", ImageType::Light, utc(2023, 10, 2, 4, 0, 0), -7.0),
            record("/c.fits", ImageType::Flat, utc(2023, 10, 2, 12, 0, 0), -7.0),
            record("/d.fits", ImageType::Light, utc(2023, 10, 3, 4, 0, 0), -7.0),
        ])
        .unwrap();

    let sessions = store.night_sessions().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].date, date(2023, 10, 1));
    assert_eq!(sessions[0].image_count, 3);
    assert_eq!(sessions[0].light_count, 2);
    assert_eq!(sessions[0].first_capture, utc(2023, 10, 2, 3, 0, 0));
    assert_eq!(sessions[0].last_capture, utc(2023, 10, 2, 12, 0, 0));
    assert_eq!(sessions[1].date, date(2023, 10, 2));

    let images = store.session_images(date(2023, 10, 1)).unwrap();
    let names: Vec<_> = images.iter().map(|i| i.record.filename.as_str()).collect();
    assert_eq!(names, ["/a.fits", "/b.fits", "/c.fits"]);
}

#[test]
fn test_image_without_offset_has_no_session() {
    let store = Store::open_in_memory().unwrap();
    let mut r = record("/nooff.fits", ImageType::Light, utc(2023, 10, 2, 3, 0, 0), 0.0);
    r.timezone_offset = None;
    r.offset_origin = None;
    store.insert_images(vec![r]).unwrap();

    let image = store.image_by_filename("/nooff.fits").unwrap().unwrap();
    assert_eq!(store.session_of(image.id).unwrap(), None);
    assert!(store.night_sessions().unwrap().is_empty());
}

#[test]
fn test_group_sessions_in_memory() {
    let store = Store::open_in_memory().unwrap();
    let mut t1 = record("/t1.fits", ImageType::Light, utc(2023, 10, 2, 4, 0, 0), -7.0);
    t1.target = Some("M 31".into());
    let mut t2 = record("/t2.fits", ImageType::Light, utc(2023, 10, 2, 3, 0, 0), -7.0);
    t2.target = Some("NGC 7000".into());
    let mut t3 = record("/t3.fits", ImageType::Light, utc(2023, 10, 2, 5, 0, 0), -7.0);
    t3.target = Some("M 31".into());
    store.insert_images(vec![t1, t2, t3]).unwrap();

    let sessions = group_sessions(store.all_images().unwrap());
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].images[0].record.filename, "/t2.fits");
    assert_eq!(sessions[0].targets(), ["NGC 7000", "M 31"]);
}
