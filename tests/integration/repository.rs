//! Integration tests for the graphics repository.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rplot::device::Configuration;
use rplot::GraphicsRepository;

use crate::common::fixtures::{params, Session, TracedDir};

fn record(repository: &GraphicsRepository) -> Arc<Mutex<Vec<Vec<PathBuf>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    repository.add_snapshot_listener(move |files| sink.lock().unwrap().push(files.to_vec()));
    seen
}

fn names(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .filter_map(|f| f.file_name()?.to_str().map(String::from))
        .collect()
}

/// Listeners follow the active device across switches.
#[tokio::test]
async fn test_listeners_follow_active_device() {
    let session = Session::new();
    let repository = GraphicsRepository::new();
    let seen = record(&repository);

    let first_dir = TracedDir::with_files(&["snapshot_normal_0_0.png"]);
    let first = session.open(&first_dir);
    repository.set_active_device(Arc::clone(&first));
    repository.update().unwrap().await.unwrap();

    let second_dir = TracedDir::with_files(&["snapshot_normal_4_0.png", "snapshot_normal_5_0.png"]);
    let second = session.open(&second_dir);
    repository.set_active_device(Arc::clone(&second));
    repository.update().unwrap().await.unwrap();

    let seen = seen.lock().unwrap();
    let last = seen.last().unwrap();
    assert_eq!(
        names(last),
        vec!["snapshot_normal_4_0.png", "snapshot_normal_5_0.png"]
    );
    assert!(seen.iter().any(|files| names(files) == vec!["snapshot_normal_0_0.png"]));
}

/// Late subscribers get the active device's current files.
#[tokio::test]
async fn test_late_subscriber_replay() {
    let session = Session::new();
    let repository = GraphicsRepository::new();
    let traced = TracedDir::with_files(&["snapshot_normal_0_0.png"]);
    let device = session.open(&traced);
    repository.set_active_device(device);
    repository.update().unwrap().await.unwrap();

    let seen = record(&repository);

    assert_eq!(names(&seen.lock().unwrap()[0]), vec!["snapshot_normal_0_0.png"]);
}

#[tokio::test]
async fn test_removing_last_device_publishes_empty_list() {
    let session = Session::new();
    let repository = GraphicsRepository::new();
    let traced = TracedDir::with_files(&["snapshot_normal_0_0.png"]);
    let device = session.open(&traced);
    repository.set_active_device(Arc::clone(&device));
    repository.update().unwrap().await.unwrap();
    let seen = record(&repository);

    repository.remove_device(device.id());

    assert!(seen.lock().unwrap().last().unwrap().is_empty());
    assert!(repository.active_device().is_none());
    // Removing a device never deletes its files
    assert!(traced.exists("snapshot_normal_0_0.png"));
}

#[tokio::test]
async fn test_configuration_forwarding() {
    let session = Session::new();
    let repository = GraphicsRepository::new();
    assert!(repository.set_configuration(Configuration::new(params(1, 1, None), None)).is_none());

    let traced = TracedDir::new();
    let device = session.open(&traced);
    repository.set_active_device(Arc::clone(&device));

    let config = Configuration::new(params(1024, 768, Some(75)), None);
    repository.set_configuration(config);

    assert_eq!(repository.configuration(), Some(config));
    assert_eq!(device.configuration(), config);
}

/// Removing a listener stops delivery; doing it twice is harmless.
#[tokio::test]
async fn test_remove_snapshot_listener() {
    let session = Session::new();
    let repository = GraphicsRepository::new();
    let seen = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&seen);
    let id = repository.add_snapshot_listener(move |_| *sink.lock().unwrap() += 1);

    repository.remove_snapshot_listener(id);
    repository.remove_snapshot_listener(id);

    let traced = TracedDir::new();
    repository.set_active_device(session.open(&traced));
    assert_eq!(*seen.lock().unwrap(), 1);
}
