mod common;

use chrono::NaiveDate;

use common::{record, utc};
use skylog_core::error::SkylogError;
use skylog_core::record::{ImageRecord, ImageType};
use skylog_core::store::{Facet, ImageFilter, Store};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn frame(name: &str, image_type: ImageType, time: chrono::DateTime<chrono::Utc>, target: Option<&str>, filter: &str) -> ImageRecord {
    let mut r = record(name, image_type, time, -7.0);
    r.target = target.map(str::to_string);
    r.filter = Some(filter.into());
    r.focal_length = Some(250.0);
    r
}

fn catalog() -> Store {
    let store = Store::open_in_memory().unwrap();
    let mut other = frame("/l3.fits", ImageType::Light, utc(2023, 10, 3, 5, 0, 0), Some("NGC 7000"), "Ha");
    other.telescope = Some("Esprit 100".into());
    other.focal_length = Some(550.0);
    other.instrument = Some("QHY268M".into());
    store
        .insert_images(vec![
            frame("/l1.fits", ImageType::Light, utc(2023, 10, 2, 4, 0, 0), Some("M 31"), "Ha"),
            frame("/l2.fits", ImageType::Light, utc(2023, 10, 3, 4, 0, 0), Some("M 31"), "OIII"),
            other,
            frame("/f1.fits", ImageType::Flat, utc(2023, 10, 2, 12, 0, 0), None, "Ha"),
        ])
        .unwrap();
    store
}

fn names(store: &Store, filter: &ImageFilter) -> Vec<String> {
    store
        .filter_images(filter)
        .unwrap()
        .into_iter()
        .map(|i| i.record.filename)
        .collect()
}

#[test]
fn test_facets_combine() {
    let store = catalog();

    assert_eq!(names(&store, &ImageFilter::new()).len(), 4);
    assert_eq!(
        names(&store, &ImageFilter::new().with(Facet::Target, "M 31")),
        ["/l1.fits", "/l2.fits"]
    );
    // Different facets must all match.
    assert_eq!(
        names(
            &store,
            &ImageFilter::new().with(Facet::Target, "M 31").with(Facet::Filter, "Ha")
        ),
        ["/l1.fits"]
    );
    // Values of one facet are alternatives.
    assert_eq!(
        names(
            &store,
            &ImageFilter::new().with(Facet::Filter, "Ha").with(Facet::Filter, "OIII")
        ),
        ["/l1.fits", "/f1.fits", "/l2.fits", "/l3.fits"]
    );
    assert_eq!(
        names(&store, &ImageFilter::new().with(Facet::Instrument, "QHY268M")),
        ["/l3.fits"]
    );
}

#[test]
fn test_night_and_telescope_facets() {
    let store = catalog();

    assert_eq!(
        names(&store, &ImageFilter::new().with(Facet::Night, "2023-10-02")),
        ["/l2.fits", "/l3.fits"]
    );
    assert_eq!(
        names(
            &store,
            &ImageFilter::new()
                .with(Facet::Night, "2023-10-01")
                .with_types(&[ImageType::Light])
        ),
        ["/l1.fits"]
    );
    assert_eq!(
        names(&store, &ImageFilter::new().with(Facet::Telescope, "RedCat 51 250mm")),
        ["/l1.fits", "/f1.fits", "/l2.fits"]
    );
}

#[test]
fn test_facet_values() {
    let store = catalog();
    assert_eq!(store.facet_values(Facet::Night).unwrap(), ["2023-10-01", "2023-10-02"]);
    assert_eq!(store.facet_values(Facet::Target).unwrap(), ["M 31", "NGC 7000"]);
    assert_eq!(
        store.facet_values(Facet::Telescope).unwrap(),
        ["Esprit 100 550mm", "RedCat 51 250mm"]
    );
    assert_eq!(store.facet_values(Facet::Filter).unwrap(), ["Ha", "OIII"]);
}

#[test]
fn test_filter_clause_parsing() {
    assert_eq!(
        ImageFilter::parse_clause("target=M 31").unwrap(),
        (Facet::Target, "M 31".to_string())
    );
    assert_eq!(
        ImageFilter::parse_clause("camera=QHY268M").unwrap(),
        (Facet::Instrument, "QHY268M".to_string())
    );
    for bad in ["target", "colour=red", "filter= "] {
        assert!(
            matches!(ImageFilter::parse_clause(bad), Err(SkylogError::InvalidFilter(_))),
            "{bad:?}"
        );
    }
}

#[test]
fn test_sky_brightness_series() {
    let store = Store::open_in_memory().unwrap();
    let mut a = record("/a.fits", ImageType::Light, utc(2023, 10, 2, 5, 0, 0), -7.0);
    a.sky_brightness = Some(21.5);
    let mut b = record("/b.fits", ImageType::Light, utc(2023, 10, 2, 4, 0, 0), -7.0);
    b.sky_brightness = Some(21.3);
    let unmeasured = record("/c.fits", ImageType::Light, utc(2023, 10, 2, 6, 0, 0), -7.0);
    let mut next = record("/d.fits", ImageType::Light, utc(2023, 10, 3, 4, 0, 0), -7.0);
    next.sky_brightness = Some(20.9);
    store.insert_images(vec![a, b, unmeasured, next]).unwrap();

    let samples = store.sky_brightness(date(2023, 10, 1)).unwrap();
    let values: Vec<f64> = samples.iter().map(|s| s.mpsas).collect();
    assert_eq!(values, [21.3, 21.5]);
    assert_eq!(samples[0].capture_time, utc(2023, 10, 2, 4, 0, 0));
    assert_eq!(samples[0].local_time, utc(2023, 10, 1, 21, 0, 0).naive_utc());

    assert!(store.sky_brightness(date(2023, 9, 1)).unwrap().is_empty());
    assert_eq!(store.latest_session().unwrap(), Some(date(2023, 10, 2)));
}
