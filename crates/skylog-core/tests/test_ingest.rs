mod common;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;
use tempfile::tempdir;

use common::{write_fits, Card};
use skylog_core::config::IngestConfig;
use skylog_core::ingest::{EventBus, FileEvent, FolderWatcher, Ingestor, Scanner, TaskQueue};
use skylog_core::progress::NoOpReporter;
use skylog_core::record::{ImageType, OffsetOrigin};
use skylog_core::session::{FixedTimezone, NauticalTimezone};
use skylog_core::store::Store;

fn light(dir: &Path, name: &str, date_obs: &str, site: bool) {
    let mut cards = vec![
        Card::Text("DATE-OBS", date_obs),
        Card::Text("IMAGETYP", "Light Frame"),
        Card::Text("INSTRUME", "ZWO ASI2600MM"),
        Card::Text("TELESCOP", "RedCat 51"),
    ];
    if site {
        cards.push(Card::Number("SITELAT", 34.5));
        cards.push(Card::Number("SITELONG", -105.0));
    }
    write_fits(dir, name, &Array2::zeros((2, 2)), &cards);
}

fn ingestor(store: &Store, batch_size: usize) -> Ingestor {
    let config = IngestConfig {
        batch_size,
        workers: 2,
        ..IngestConfig::default()
    };
    Ingestor::new(store.clone(), &config, Arc::new(NauticalTimezone)).unwrap()
}

#[test]
fn test_scan_inserts_and_skips_known() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("2023-10-01");
    std::fs::create_dir(&nested).unwrap();
    light(dir.path(), "a.fits", "2023-10-02T03:00:00", true);
    light(&nested, "b.FIT", "2023-10-02T04:00:00", true);
    std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

    let store = Store::open_in_memory().unwrap();
    let ingestor = ingestor(&store, 1);

    let first = ingestor.scan_folder(dir.path(), &NoOpReporter).unwrap();
    assert_eq!(first.submitted, 2);
    assert_eq!(first.inserted, 2);
    assert_eq!(first.unreadable, 0);

    let second = ingestor.scan_folder(dir.path(), &NoOpReporter).unwrap();
    assert_eq!(second.submitted, 0);
    assert_eq!(store.all_images().unwrap().len(), 2);
    ingestor.shutdown();
}

#[test]
fn test_same_folder_by_another_name_is_not_reingested() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("night");
    std::fs::create_dir(&nested).unwrap();
    light(dir.path(), "a.fits", "2023-10-02T03:00:00", true);

    let store = Store::open_in_memory().unwrap();
    let ingestor = ingestor(&store, 1);

    let first = ingestor.scan_folder(&nested.join(".."), &NoOpReporter).unwrap();
    assert_eq!(first.inserted, 1);
    let stored = &store.all_images().unwrap()[0].record.filename;
    assert_eq!(
        Path::new(stored),
        dir.path().canonicalize().unwrap().join("a.fits")
    );

    let second = ingestor.scan_folder(dir.path(), &NoOpReporter).unwrap();
    assert_eq!(second.submitted, 0);
    assert_eq!(store.all_images().unwrap().len(), 1);
    ingestor.shutdown();
}

#[test]
fn test_corrupt_file_is_recorded_once() {
    let dir = tempdir().unwrap();
    light(dir.path(), "good.fits", "2023-10-02T03:00:00", true);
    std::fs::write(dir.path().join("broken.fits"), b"SIMPLE  = garbage").unwrap();

    let store = Store::open_in_memory().unwrap();
    let ingestor = ingestor(&store, 8);

    let summary = ingestor.scan_folder(dir.path(), &NoOpReporter).unwrap();
    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.unreadable, 1);

    // The broken file is in the ledger and is not retried.
    let broken = dir.path().join("broken.fits");
    assert!(store
        .known_filenames()
        .unwrap()
        .contains(broken.to_string_lossy().as_ref()));
    let again = ingestor.scan_folder(dir.path(), &NoOpReporter).unwrap();
    assert_eq!(again.submitted, 0);
}

#[test]
fn test_ingest_backfills_offsets() {
    let dir = tempdir().unwrap();
    light(dir.path(), "site.fits", "2023-10-02T03:00:00", true);
    light(dir.path(), "nosite.fits", "2023-10-02T04:00:00", false);

    let store = Store::open_in_memory().unwrap();
    let ingestor = ingestor(&store, 1);
    ingestor.scan_folder(dir.path(), &NoOpReporter).unwrap();

    let image = store
        .image_by_filename(&dir.path().join("nosite.fits").to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(image.record.image_type, Some(ImageType::Light));
    assert_eq!(image.record.timezone_offset, Some(-7.0));
    assert_eq!(image.record.offset_origin, Some(OffsetOrigin::Backfill));
}

#[test]
fn test_ingest_paths_drops_duplicates() {
    let dir = tempdir().unwrap();
    light(dir.path(), "a.fits", "2023-10-02T03:00:00", true);
    let path = dir.path().join("a.fits");

    let store = Store::open_in_memory().unwrap();
    let ingestor = ingestor(&store, 1);
    let first = ingestor.ingest_paths(vec![path.clone()], &NoOpReporter);
    assert_eq!(first.inserted, 1);

    let again = ingestor.ingest_paths(vec![path, dir.path().join("skip.txt")], &NoOpReporter);
    assert_eq!(again.submitted, 1);
    assert_eq!(again.inserted, 0);
    assert_eq!(again.dropped, 1);
}

#[test]
fn test_fixed_timezone_ingest() {
    let dir = tempdir().unwrap();
    light(dir.path(), "a.fits", "2023-10-02T03:00:00", true);

    let store = Store::open_in_memory().unwrap();
    let ingestor = Ingestor::new(
        store.clone(),
        &IngestConfig::default(),
        Arc::new(FixedTimezone::new(-6.0)),
    )
    .unwrap();
    ingestor.scan_folder(dir.path(), &NoOpReporter).unwrap();
    assert_eq!(store.all_images().unwrap()[0].record.timezone_offset, Some(-6.0));
}

#[test]
fn test_scan_missing_folder_errors() {
    let store = Store::open_in_memory().unwrap();
    let ingestor = ingestor(&store, 1);
    assert!(ingestor
        .scan_folder(Path::new("/definitely/not/here"), &NoOpReporter)
        .is_err());
}

#[test]
fn test_task_queue_runs_every_item() {
    let queue = TaskQueue::new(3).unwrap();
    assert_eq!(queue.workers(), 3);

    let completions = queue.submit_all(0..50u32, |n| n * 2);
    assert_eq!(completions.total(), 50);
    let mut results: Vec<u32> = completions.collect();
    results.sort_unstable();
    assert_eq!(results, (0..50).map(|n| n * 2).collect::<Vec<_>>());

    let ticket = queue.submit(|| "done");
    assert_eq!(ticket.wait().unwrap(), "done");
    queue.shutdown();
}

#[test]
fn test_event_bus_preserves_order_per_subscriber() {
    let bus = Arc::new(EventBus::<u32>::new());
    let a = bus.subscribe();
    let b = bus.subscribe();

    let publisher = Arc::clone(&bus);
    std::thread::spawn(move || {
        for i in 0..100u32 {
            publisher.publish(i);
        }
    })
    .join()
    .unwrap();

    let expected: Vec<u32> = (0..100).collect();
    assert_eq!(a.drain(), expected);
    assert_eq!(b.drain(), expected);

    drop(b);
    assert_eq!(bus.publish(100), 1);
    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(a.recv_timeout(Duration::from_millis(100)), Some(100));
}

#[test]
fn test_watcher_announces_settled_files_once() {
    let dir = tempdir().unwrap();
    let bus = Arc::new(EventBus::<FileEvent>::new());
    let events = bus.subscribe();
    let mut watcher = FolderWatcher::new(
        vec![dir.path().to_path_buf()],
        Scanner::new(&["fits", "xisf"]),
        Arc::clone(&bus),
        HashSet::new(),
    );

    light(dir.path(), "new.fits", "2023-10-02T03:00:00", true);
    std::fs::write(dir.path().join("empty.fits"), b"").unwrap();

    // First sighting only records the size.
    assert!(watcher.poll().is_empty());
    let announced = watcher.poll();
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].path, dir.path().join("new.fits"));
    assert_eq!(announced[0].extension, "fits");

    assert!(watcher.poll().is_empty());
    let received = events.drain();
    assert_eq!(received, announced);
}

#[test]
fn test_watcher_skips_known_files() {
    let dir = tempdir().unwrap();
    light(dir.path(), "old.fits", "2023-10-02T03:00:00", true);
    let known: HashSet<String> = [dir.path().join("old.fits").to_string_lossy().into_owned()]
        .into_iter()
        .collect();

    let bus = Arc::new(EventBus::<FileEvent>::new());
    let mut watcher = FolderWatcher::new(
        vec![dir.path().to_path_buf()],
        Scanner::new(&["fits"]),
        bus,
        known,
    );
    assert!(watcher.poll().is_empty());
    assert!(watcher.poll().is_empty());
}
