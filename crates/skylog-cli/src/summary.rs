use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use console::Style;
use skylog_core::analysis::AnalysisReport;
use skylog_core::calibration::CalibrationSet;
use skylog_core::ingest::ScanSummary;
use skylog_core::project::{CoverageReport, ProjectLayout};
use skylog_core::record::{ImageId, ImageRecord, StoredImage};
use skylog_core::store::{Facet, SessionSummary, SkySample, Store};

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    good: Style,
    warn: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            good: Style::new().green(),
            warn: Style::new().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn title(s: &Styles, text: &str) {
    println!();
    println!("  {}", s.title.apply_to(text));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(text.chars().count())));
    println!();
}

fn row(s: &Styles, label: &str, value: impl std::fmt::Display) {
    println!("  {:<14}{}", s.label.apply_to(label), s.value.apply_to(value));
}

fn opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_scan_summary(folders: &[PathBuf], summary: &ScanSummary) {
    let s = Styles::new();
    title(&s, "Scan");
    for folder in folders {
        println!("  {:<14}{}", s.label.apply_to("Folder"), s.path.apply_to(folder.display()));
    }
    row(&s, "Submitted", summary.submitted);
    println!(
        "  {:<14}{}",
        s.label.apply_to("Inserted"),
        s.good.apply_to(summary.inserted)
    );
    if summary.unreadable > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Unreadable"),
            s.warn.apply_to(summary.unreadable)
        );
    }
    if summary.dropped > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Dropped"),
            s.warn.apply_to(summary.dropped)
        );
    }
    println!();
}

pub fn print_sessions(sessions: &[SessionSummary], targets: &HashMap<NaiveDate, Vec<String>>) {
    let s = Styles::new();
    title(&s, "Night sessions");
    if sessions.is_empty() {
        println!("  {}", s.label.apply_to("No sessions yet"));
    }
    for session in sessions {
        let names = targets
            .get(&session.date)
            .map(|t| t.join(", "))
            .unwrap_or_default();
        println!(
            "  {}  {:>5} images  {:>5} lights  {} .. {}  {}",
            s.value.apply_to(session.date),
            session.image_count,
            session.light_count,
            session.first_capture.format("%H:%M"),
            session.last_capture.format("%H:%M UTC"),
            s.label.apply_to(names),
        );
    }
    println!();
}

pub fn print_session_images(date: NaiveDate, images: &[StoredImage]) {
    let s = Styles::new();
    title(&s, &format!("Night of {date}"));
    for image in images {
        let r = &image.record;
        println!(
            "  {:>6}  {}  {:<12}{:<8}{:<10}{}",
            image.id,
            r.capture_time.format("%H:%M:%S"),
            opt(&r.image_type),
            opt(&r.filter),
            opt(&r.exposure_time),
            s.path.apply_to(&r.filename),
        );
    }
    println!();
}

pub fn print_calibration_set(store: &Store, set: &CalibrationSet) -> Result<()> {
    let s = Styles::new();
    title(&s, &format!("Calibration for image {}", set.light));
    row(&s, "Session", set.session);
    let bias = store.image(set.master_bias)?;
    let dark = store.image(set.master_dark)?;
    println!(
        "  {:<14}{} {}",
        s.label.apply_to("Master bias"),
        s.value.apply_to(bias.id),
        s.path.apply_to(&bias.record.filename)
    );
    println!(
        "  {:<14}{} {}",
        s.label.apply_to("Master dark"),
        s.value.apply_to(dark.id),
        s.path.apply_to(&dark.record.filename)
    );
    row(&s, "Flats", set.flats.len());
    println!();
    Ok(())
}

pub fn print_analysis_report(report: &AnalysisReport) {
    let s = Styles::new();
    title(&s, "Analysis");
    for result in &report.succeeded {
        let m = &result.metrics;
        println!(
            "  {:>6}  FWHM {:>6.2}  SNR {:>8.1}  ecc {:>4.2}  median {:>8.1}  stars {}",
            s.value.apply_to(result.image_id),
            m.fwhm,
            m.snr,
            m.eccentricity,
            m.median,
            m.stars_detected,
        );
    }
    for (id, err) in &report.failed {
        println!("  {:>6}  {}", s.value.apply_to(id), s.warn.apply_to(err));
    }
    println!();
}

pub fn print_record(r: &ImageRecord) {
    let s = Styles::new();
    title(&s, &r.filename);
    row(&s, "Captured", r.capture_time.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
    row(&s, "Type", opt(&r.image_type));
    row(&s, "Target", opt(&r.target));
    row(&s, "Instrument", opt(&r.instrument));
    row(&s, "Telescope", opt(&r.telescope));
    row(&s, "Filter", opt(&r.filter));
    row(&s, "Exposure", opt(&r.exposure_time));
    row(&s, "Gain", opt(&r.gain));
    row(&s, "Offset", opt(&r.offset));
    row(&s, "Sensor temp", opt(&r.sensor_temperature));
    if let (Some(w), Some(h)) = (r.width, r.height) {
        row(&s, "Dimensions", format!("{w}x{h}"));
    }
    if let Some(scale) = r.plate_scale {
        row(&s, "Plate scale", format!("{scale:.2}\"/px"));
    }
    row(&s, "UTC offset", opt(&r.timezone_offset));
    row(&s, "Session", opt(&r.night_session()));
    println!();
}

pub fn print_images(images: &[StoredImage]) {
    let s = Styles::new();
    title(&s, &format!("{} image(s)", images.len()));
    for image in images {
        let r = &image.record;
        println!(
            "  {:>6}  {}  {:<12}{:<12}{:<8}{:<10}{}",
            image.id,
            r.capture_time.format("%Y-%m-%d %H:%M"),
            opt(&r.image_type),
            opt(&r.target),
            opt(&r.filter),
            opt(&r.exposure_time),
            s.path.apply_to(&r.filename),
        );
    }
    println!();
}

pub fn print_facet_values(facet: Facet, values: &[String]) {
    let s = Styles::new();
    title(&s, &format!("Values of {facet}"));
    if values.is_empty() {
        println!("  {}", s.label.apply_to("None"));
    }
    for value in values {
        println!("  {}", s.value.apply_to(value));
    }
    println!();
}

fn id_list(ids: &[ImageId]) -> String {
    ids.iter().map(ImageId::to_string).collect::<Vec<_>>().join(", ")
}

pub fn print_coverage(report: &CoverageReport) {
    let s = Styles::new();
    title(&s, "Coverage");
    row(&s, "Target", opt(&report.target));
    row(&s, "Lights", report.lights.len());
    for (label, missing) in [
        ("No bias", &report.missing_bias),
        ("No dark", &report.missing_dark),
        ("No flats", &report.missing_flats),
    ] {
        if !missing.is_empty() {
            println!("  {:<14}{}", s.label.apply_to(label), s.warn.apply_to(id_list(missing)));
        }
    }
    for night in &report.nights_missing_flats {
        println!("  {:<14}{}", s.label.apply_to("Flats needed"), s.warn.apply_to(night));
    }
    if report.is_complete() {
        println!("  {}", s.good.apply_to("Every light is fully calibrated"));
    }
    println!();
}

pub fn print_project(layout: &ProjectLayout) {
    let s = Styles::new();
    title(&s, "Project");
    println!("  {:<14}{}", s.label.apply_to("Root"), s.path.apply_to(layout.root.display()));
    for night in &layout.nights {
        println!(
            "  {}  {:>4} lights  {:>3} darks  {:>3} biases  {:>3} flats  {}",
            s.value.apply_to(night.night),
            night.lights,
            night.darks,
            night.biases,
            night.flats,
            s.good.apply_to(format!("{} new link(s)", night.created)),
        );
    }
    if !layout.unplaced.is_empty() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("No night"),
            s.warn.apply_to(id_list(&layout.unplaced))
        );
    }
    println!();
}

pub fn print_sky(night: NaiveDate, samples: &[SkySample]) {
    let s = Styles::new();
    title(&s, &format!("Sky brightness, night of {night}"));
    if samples.is_empty() {
        println!("  {}", s.label.apply_to("No readings"));
        println!();
        return;
    }
    for sample in samples {
        println!(
            "  {}  {:>6.2} mag/arcsec\u{b2}  {}",
            sample.local_time.format("%H:%M"),
            sample.mpsas,
            s.label.apply_to(sample.image_id),
        );
    }
    let darkest = samples.iter().map(|x| x.mpsas).fold(f64::MIN, f64::max);
    row(&s, "Darkest", format!("{darkest:.2}"));
    println!();
}
