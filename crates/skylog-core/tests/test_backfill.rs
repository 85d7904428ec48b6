mod common;

use common::{record, utc};
use skylog_core::record::{ImageRecord, ImageType, OffsetOrigin};
use skylog_core::store::Store;

fn without_offset(mut r: ImageRecord) -> ImageRecord {
    r.timezone_offset = None;
    r.offset_origin = None;
    r
}

fn offset_of(store: &Store, filename: &str) -> (Option<f64>, Option<OffsetOrigin>) {
    let image = store.image_by_filename(filename).unwrap().unwrap();
    (image.record.timezone_offset, image.record.offset_origin)
}

#[test]
fn test_light_takes_nearest_offset_same_telescope() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_images(vec![
            record("/near.fits", ImageType::Light, utc(2023, 10, 2, 3, 0, 0), -7.0),
            record("/far.fits", ImageType::Light, utc(2023, 10, 2, 9, 0, 0), -6.0),
            without_offset(record("/target.fits", ImageType::Light, utc(2023, 10, 2, 4, 0, 0), 0.0)),
        ])
        .unwrap();

    assert_eq!(store.backfill_timezones().unwrap(), 1);
    assert_eq!(
        offset_of(&store, "/target.fits"),
        (Some(-7.0), Some(OffsetOrigin::Backfill))
    );
}

#[test]
fn test_light_ignores_other_telescope() {
    let store = Store::open_in_memory().unwrap();
    let mut source = record("/src.fits", ImageType::Light, utc(2023, 10, 2, 3, 0, 0), -7.0);
    source.telescope = Some("Esprit 100".into());
    store
        .insert_images(vec![
            source,
            without_offset(record("/target.fits", ImageType::Light, utc(2023, 10, 2, 4, 0, 0), 0.0)),
        ])
        .unwrap();

    assert_eq!(store.backfill_timezones().unwrap(), 0);
    assert_eq!(offset_of(&store, "/target.fits"), (None, None));
}

#[test]
fn test_dark_matches_on_filter_not_telescope() {
    let store = Store::open_in_memory().unwrap();
    let mut source = record("/src.fits", ImageType::Light, utc(2023, 10, 2, 3, 0, 0), -7.0);
    source.telescope = Some("Esprit 100".into());
    source.filter = Some("Ha".into());

    let mut dark_ha = without_offset(record("/dark_ha.fits", ImageType::Dark, utc(2023, 10, 2, 5, 0, 0), 0.0));
    dark_ha.filter = Some("Ha".into());
    let mut bias_oiii = without_offset(record("/bias_oiii.fits", ImageType::Bias, utc(2023, 10, 2, 5, 0, 0), 0.0));
    bias_oiii.filter = Some("OIII".into());
    let dark_any = without_offset(record("/dark_any.fits", ImageType::MasterDark, utc(2023, 10, 2, 6, 0, 0), 0.0));

    store
        .insert_images(vec![source, dark_ha, bias_oiii, dark_any])
        .unwrap();

    assert_eq!(store.backfill_timezones().unwrap(), 2);
    assert_eq!(offset_of(&store, "/dark_ha.fits").0, Some(-7.0));
    assert_eq!(offset_of(&store, "/dark_any.fits").0, Some(-7.0));
    assert_eq!(offset_of(&store, "/bias_oiii.fits").0, None);
}

#[test]
fn test_window_is_twelve_hours() {
    let inside = Store::open_in_memory().unwrap();
    inside
        .insert_images(vec![
            record("/src.fits", ImageType::Light, utc(2023, 10, 2, 0, 0, 0), -7.0),
            without_offset(record("/inside.fits", ImageType::Light, utc(2023, 10, 2, 11, 59, 0), 0.0)),
        ])
        .unwrap();
    assert_eq!(inside.backfill_timezones().unwrap(), 1);
    assert_eq!(offset_of(&inside, "/inside.fits").0, Some(-7.0));

    let outside = Store::open_in_memory().unwrap();
    outside
        .insert_images(vec![
            record("/src.fits", ImageType::Light, utc(2023, 10, 2, 0, 0, 0), -7.0),
            without_offset(record("/outside.fits", ImageType::Light, utc(2023, 10, 2, 12, 1, 0), 0.0)),
        ])
        .unwrap();
    assert_eq!(outside.backfill_timezones().unwrap(), 0);
    assert_eq!(offset_of(&outside, "/outside.fits").0, None);
}

#[test]
fn test_backfilled_offsets_seed_further_records() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_images(vec![
            record("/src.fits", ImageType::Light, utc(2023, 10, 2, 0, 0, 0), -7.0),
            without_offset(record("/a.fits", ImageType::Light, utc(2023, 10, 2, 10, 0, 0), 0.0)),
            // Within 12 h of /a.fits but not of the location source.
            without_offset(record("/b.fits", ImageType::Light, utc(2023, 10, 2, 20, 0, 0), 0.0)),
        ])
        .unwrap();

    assert_eq!(store.backfill_timezones().unwrap(), 2);
    assert_eq!(
        offset_of(&store, "/a.fits"),
        (Some(-7.0), Some(OffsetOrigin::Backfill))
    );
    assert_eq!(
        offset_of(&store, "/b.fits"),
        (Some(-7.0), Some(OffsetOrigin::Backfill))
    );
}

#[test]
fn test_backfill_is_idempotent() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_images(vec![
            record("/src.fits", ImageType::Light, utc(2023, 10, 2, 0, 0, 0), -7.0),
            without_offset(record("/a.fits", ImageType::Light, utc(2023, 10, 2, 10, 0, 0), 0.0)),
            without_offset(record("/b.fits", ImageType::Light, utc(2023, 10, 2, 20, 0, 0), 0.0)),
            without_offset(record("/lone.fits", ImageType::Light, utc(2023, 10, 9, 20, 0, 0), 0.0)),
        ])
        .unwrap();

    assert_eq!(store.backfill_timezones().unwrap(), 2);
    let first: Vec<_> = store
        .all_images()
        .unwrap()
        .into_iter()
        .map(|i| (i.record.filename, i.record.timezone_offset))
        .collect();

    assert_eq!(store.backfill_timezones().unwrap(), 0);
    let second: Vec<_> = store
        .all_images()
        .unwrap()
        .into_iter()
        .map(|i| (i.record.filename, i.record.timezone_offset))
        .collect();
    assert_eq!(first, second);
    assert_eq!(offset_of(&store, "/lone.fits").0, None);
}

#[test]
fn test_other_instrument_never_contributes() {
    let store = Store::open_in_memory().unwrap();
    let mut source = record("/src.fits", ImageType::Light, utc(2023, 10, 2, 3, 0, 0), -7.0);
    source.instrument = Some("QHY268M".into());
    store
        .insert_images(vec![
            source,
            without_offset(record("/t.fits", ImageType::Light, utc(2023, 10, 2, 3, 30, 0), 0.0)),
        ])
        .unwrap();
    assert_eq!(store.backfill_timezones().unwrap(), 0);
}
