//! Integration tests for rescale coalescing and stale-work discard.
//!
//! The mock interpreter holds rescales so requests pile up behind one in
//! flight, the way fast window resizes do.

use rplot::device::Configuration;
use rplot::interpreter::mock::Operation;

use crate::common::fixtures::{params, Session, TracedDir};
use crate::common::init_test_logging;

fn targeted_rescales(session: &Session, number: u32) -> usize {
    session
        .mock
        .operations()
        .iter()
        .filter(|op| {
            matches!(op, Operation::Rescale { snapshot_number: Some(n), .. } if *n == number)
        })
        .count()
}

/// Identical requests behind a running one share a handle and run once.
#[tokio::test]
async fn test_identical_resizes_coalesce() {
    init_test_logging();
    let session = Session::new();
    let traced = TracedDir::with_files(&["snapshot_normal_1_0.png"]);
    let device = session.open(&traced);
    device.update().await.unwrap();

    let started = session.mock.rescale_started();
    // Drop the permit left by the first rescale
    started.notified().await;

    session.mock.hold_rescales();
    let in_flight = device.update();
    started.notified().await;

    let resized = Configuration::new(params(800, 600, Some(75)), Some(1));
    let a = device.set_configuration(resized).unwrap();
    let b = device.set_configuration(resized).unwrap();
    assert!(a.same_task(&b));
    assert_eq!(device.pending_rescales(), 1);

    session.mock.release_all();
    in_flight.await.unwrap();
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(targeted_rescales(&session, 1), 1);
}

/// Distinct sizes are all served, in order.
#[tokio::test]
async fn test_distinct_resizes_run_in_order() {
    let session = Session::new();
    let traced = TracedDir::with_files(&["snapshot_normal_1_0.png"]);
    let device = session.open(&traced);
    device.update().await.unwrap();

    let started = session.mock.rescale_started();
    started.notified().await;

    session.mock.hold_rescales();
    let in_flight = device.update();
    started.notified().await;

    let first = device
        .set_configuration(Configuration::new(params(800, 600, Some(75)), Some(1)))
        .unwrap();
    let second = device
        .set_configuration(Configuration::new(params(1024, 768, Some(75)), Some(1)))
        .unwrap();
    assert!(!first.same_task(&second));

    session.mock.release_all();
    in_flight.await.unwrap();
    first.await.unwrap();
    second.await.unwrap();

    let sizes: Vec<_> = session
        .mock
        .operations()
        .into_iter()
        .filter_map(|op| match op {
            Operation::Rescale {
                snapshot_number: Some(1),
                dimension,
            } => Some((dimension.width, dimension.height)),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![(800, 600), (1024, 768)]);
}

/// Work queued for a device that lost focus resolves without running.
#[tokio::test]
async fn test_stale_device_work_is_dropped() {
    let session = Session::new();
    let traced = TracedDir::with_files(&["snapshot_normal_1_0.png"]);
    let device = session.open(&traced);
    device.update().await.unwrap();

    let started = session.mock.rescale_started();
    started.notified().await;

    session.mock.hold_rescales();
    let in_flight = device.update();
    started.notified().await;
    let queued = device
        .set_configuration(Configuration::new(params(800, 600, Some(75)), Some(1)))
        .unwrap();

    // A nested device takes over
    let other_dir = TracedDir::new();
    let other = session.open(&other_dir);
    assert!(session.registry.is_current(other.id()));

    session.mock.release_all();
    in_flight.await.unwrap();
    queued.await.unwrap();

    assert_eq!(targeted_rescales(&session, 1), 0);
}

/// Interpreter failures reach the caller and don't wedge the queue.
#[tokio::test]
async fn test_rescale_failure_then_recovery() {
    let session = Session::new();
    let traced = TracedDir::with_files(&["snapshot_normal_0_0.png"]);
    let device = session.open(&traced);

    session
        .mock
        .inject_rescale_error(rplot::GraphicsError::Interpreter("R is busy".to_string()));
    assert!(device.update().await.is_err());
    assert!(device.last_update().is_empty());

    device.update().await.unwrap();
    assert_eq!(device.last_update().normal.len(), 1);
}
