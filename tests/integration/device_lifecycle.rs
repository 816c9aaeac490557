//! Integration tests for the graphics device lifecycle.

use std::sync::{Arc, Mutex};

use rplot::device::{Configuration, DeviceStatus, Dimension};
use rplot::interpreter::mock::Operation;
use rplot::snapshot::SnapshotsUpdate;

use crate::common::fixtures::{params, Session, TracedDir};
use crate::common::init_test_logging;

fn record(device: &rplot::GraphicsDevice) -> Arc<Mutex<Vec<SnapshotsUpdate>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    device.add_listener(move |update| sink.lock().unwrap().push(update.clone()));
    seen
}

/// A redraw produces a new version; the scan keeps it and drops the old one.
#[tokio::test]
async fn test_update_picks_up_redraw() {
    init_test_logging();
    let session = Session::new();
    let traced = TracedDir::with_files(&["snapshot_normal_0_0.png", "snapshot_sketch_0_0.png"]);
    session.produce_into(&traced);
    let device = session.open(&traced);
    let seen = record(&device);

    device.update().await.unwrap();

    assert_eq!(traced.names(), vec!["snapshot_normal_0_1.png"]);
    let update = device.last_update();
    assert_eq!(update.normal.len(), 1);
    assert_eq!(update.normal[0].version(), 1);
    assert_eq!(seen.lock().unwrap().len(), 2);
}

/// Two updates over an unchanged directory notify at most once.
#[tokio::test]
async fn test_unchanged_directory_notifies_once() {
    let session = Session::new();
    let traced = TracedDir::with_files(&["snapshot_normal_0_0.png"]);
    let device = session.open(&traced);
    let seen = record(&device);

    device.update().await.unwrap();
    device.update().await.unwrap();
    device.update().await.unwrap();

    // Replay plus one change
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_clear_all_removes_files() {
    let session = Session::new();
    let traced = TracedDir::with_files(&[
        "snapshot_normal_0_0.png",
        "snapshot_normal_1_2.png",
        "snapshot_zoomed_1_0.png",
    ]);
    let device = session.open(&traced);
    device.update().await.unwrap();
    let seen = record(&device);

    device.clear_all_snapshots();

    assert_eq!(device.last_update(), SnapshotsUpdate::empty());
    assert!(traced.names().is_empty());
    assert_eq!(seen.lock().unwrap().last(), Some(&SnapshotsUpdate::empty()));
}

#[tokio::test]
async fn test_clear_snapshot_keeps_others() {
    let session = Session::new();
    let traced = TracedDir::with_files(&["snapshot_normal_0_0.png", "snapshot_normal_1_0.png"]);
    let device = session.open(&traced);
    device.update().await.unwrap();

    device.clear_snapshot(0);
    // Unknown slot: still not an error
    device.clear_snapshot(42);

    assert_eq!(traced.names(), vec!["snapshot_normal_1_0.png"]);
    assert_eq!(device.last_update().normal.len(), 1);
}

/// A device whose init failed accepts calls and does nothing.
#[tokio::test]
async fn test_failed_device_degrades_gracefully() {
    let session = Session::new();
    session.mock.fail_init("Error: there is no package called 'rplugingraphics'");
    let traced = TracedDir::with_files(&["snapshot_normal_0_0.png"]);
    let device = session.open(&traced);

    assert_eq!(device.status(), DeviceStatus::Failed);
    device.update().await.unwrap();
    let resized = Configuration::new(params(800, 600, Some(75)), Some(0));
    assert!(device.set_configuration(resized).is_none());

    assert_eq!(session.mock.rescale_count(), 0);
    assert!(device.last_update().is_empty());
    assert_eq!(traced.names(), vec!["snapshot_normal_0_0.png"]);
}

/// A successful reset brings a failed device back.
#[tokio::test]
async fn test_reset_recovers_failed_device() {
    let session = Session::new();
    session.mock.fail_init("Error in init");
    let traced = TracedDir::with_files(&["snapshot_normal_0_0.png"]);
    let device = session.open(&traced);
    assert!(!device.is_loaded());

    session.mock.succeed_init();
    assert_eq!(device.reset(), DeviceStatus::Loaded);

    device.update().await.unwrap();
    assert_eq!(device.last_update().normal.len(), 1);
}

/// Resolution changes re-initialize with the initial size.
#[tokio::test]
async fn test_resolution_change_resets_device() {
    let session = Session::new();
    let traced = TracedDir::new();
    let device = session.open(&traced);

    let config = Configuration::new(params(1024, 768, Some(150)), None);
    assert!(device.set_configuration(config).is_none());

    let directory = traced.path().to_string_lossy().replace('\\', "/");
    session.mock.assert_operations(&[
        Operation::InitDevice {
            directory: directory.clone(),
            dimension: Dimension::new(640, 480),
            resolution: Some(75),
        },
        Operation::InitDevice {
            directory,
            dimension: Dimension::new(640, 480),
            resolution: Some(150),
        },
    ]);
}

/// Size changes for a rendered slot redraw only that slot.
#[tokio::test]
async fn test_dimension_change_rescales_slot() {
    let session = Session::new();
    let traced = TracedDir::with_files(&["snapshot_normal_3_0.png"]);
    session.produce_into(&traced);
    let device = session.open(&traced);
    device.update().await.unwrap();
    session.mock.clear_operations();

    let config = Configuration::new(params(320, 240, Some(75)), Some(3));
    device.set_configuration(config).unwrap().await.unwrap();

    session.mock.assert_operations(&[Operation::Rescale {
        snapshot_number: Some(3),
        dimension: Dimension::new(320, 240),
    }]);
    assert_eq!(device.configuration().snapshot_number, Some(3));
    assert_eq!(session.mock.init_count(), 0);

    // Recorded at the new size now: repeating is a no-op
    assert!(device.set_configuration(config).is_none());
}

/// Disposal restores the parent device and leaves files alone.
#[tokio::test]
async fn test_dispose_restores_parent() {
    let session = Session::new();
    let outer_dir = TracedDir::new();
    let inner_dir = TracedDir::with_files(&["snapshot_normal_0_0.png"]);
    let outer = session.open(&outer_dir);
    let inner = session.open(&inner_dir);
    inner.update().await.unwrap();

    inner.dispose();

    assert!(session.registry.is_current(outer.id()));
    assert_eq!(inner.status(), DeviceStatus::Disposed);
    assert!(inner_dir.exists("snapshot_normal_0_0.png"));
}
