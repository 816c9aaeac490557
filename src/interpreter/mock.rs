//! Mock interpreter for unit testing.
//!
//! Records every call, can fail on demand, can hold rescales until the test
//! releases them, and can play the producer by writing files on rescale.
//!
//! # Example
//!
//! ```rust,ignore
//! use rplot::interpreter::mock::{MockInterpreter, Operation};
//!
//! let mock = MockInterpreter::new();
//! mock.hold_rescales();
//! let handle = device.update();
//! mock.rescale_started().notified().await;
//! mock.release_rescale();
//! handle.await.unwrap();
//!
//! mock.assert_contains(&Operation::Rescale { snapshot_number: None, dimension });
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{Notify, Semaphore};
use tracing::trace;

use super::{ExecutionResult, Interpreter};
use crate::device::{Dimension, InitProperties};
use crate::error::{GraphicsError, Result};

/// Recorded call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    InitDevice {
        directory: String,
        dimension: Dimension,
        resolution: Option<u32>,
    },
    Rescale {
        snapshot_number: Option<u32>,
        dimension: Dimension,
    },
}

/// Callback invoked when a rescale completes, standing in for the producer.
pub type ProducerFn = dyn Fn(Option<u32>, Dimension) + Send + Sync;

/// Mock interpreter for testing without an R process.
#[derive(Default)]
pub struct MockInterpreter {
    operation_log: Mutex<Vec<Operation>>,
    init_stderr: Mutex<Option<String>>,
    init_error: Mutex<Option<GraphicsError>>,
    rescale_error: Mutex<Option<GraphicsError>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    producer: Mutex<Option<Arc<ProducerFn>>>,
    started: Arc<Notify>,
}

impl MockInterpreter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Configuration ===

    /// Make every following `init_device` report `stderr`.
    pub fn fail_init(&self, stderr: &str) {
        *self.init_stderr.lock().unwrap_or_else(PoisonError::into_inner) = Some(stderr.to_string());
    }

    /// Make `init_device` succeed again.
    pub fn succeed_init(&self) {
        *self.init_stderr.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Inject a transport error for the next `init_device`.
    pub fn inject_init_error(&self, error: GraphicsError) {
        *self.init_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Inject an error for the next rescale.
    pub fn inject_rescale_error(&self, error: GraphicsError) {
        *self.rescale_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Run `producer` whenever a rescale completes successfully.
    pub fn set_producer<F>(&self, producer: F)
    where
        F: Fn(Option<u32>, Dimension) + Send + Sync + 'static,
    {
        *self.producer.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(producer));
    }

    // === Flow control ===

    /// Block rescales until [`MockInterpreter::release_rescale`] is called.
    pub fn hold_rescales(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let one held rescale finish.
    pub fn release_rescale(&self) {
        if let Some(gate) = self.gate.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            gate.add_permits(1);
        }
    }

    /// Stop holding rescales and release the ones in flight.
    pub fn release_all(&self) {
        if let Some(gate) = self.gate.lock().unwrap_or_else(PoisonError::into_inner).take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Notified every time a rescale call starts.
    #[must_use]
    pub fn rescale_started(&self) -> Arc<Notify> {
        Arc::clone(&self.started)
    }

    // === Assertions ===

    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.operation_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of rescale calls made so far.
    #[must_use]
    pub fn rescale_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, Operation::Rescale { .. }))
            .count()
    }

    /// Number of init calls made so far.
    #[must_use]
    pub fn init_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, Operation::InitDevice { .. }))
            .count()
    }

    /// Assert specific operations were performed.
    ///
    /// # Panics
    ///
    /// Panics if the operations don't match.
    pub fn assert_operations(&self, expected: &[Operation]) {
        let actual = self.operations();
        assert_eq!(
            actual, expected,
            "Operation mismatch.\nExpected: {expected:#?}\nActual: {actual:#?}",
        );
    }

    /// Assert a specific operation was performed at least once.
    ///
    /// # Panics
    ///
    /// Panics if the operation was not found.
    pub fn assert_contains(&self, expected: &Operation) {
        let ops = self.operations();
        assert!(
            ops.contains(expected),
            "Expected operation {expected:?} not found in: {ops:#?}",
        );
    }

    pub fn clear_operations(&self) {
        self.operation_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record_op(&self, op: Operation) {
        trace!(?op, "Recording interpreter call");
        self.operation_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

impl Interpreter for MockInterpreter {
    fn init_device(&self, properties: &InitProperties) -> Result<ExecutionResult> {
        self.record_op(Operation::InitDevice {
            directory: properties.snapshot_directory.clone(),
            dimension: properties.screen_parameters.dimension,
            resolution: properties.screen_parameters.resolution,
        });

        if let Some(error) = self.init_error.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(error);
        }

        Ok(
            match self.init_stderr.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
                Some(stderr) => ExecutionResult::failure(stderr.clone()),
                None => ExecutionResult::success("[1] TRUE"),
            },
        )
    }

    fn rescale(&self, snapshot_number: Option<u32>, dimension: Dimension) -> BoxFuture<'static, Result<()>> {
        self.record_op(Operation::Rescale {
            snapshot_number,
            dimension,
        });
        self.started.notify_one();

        let error = self.rescale_error.lock().unwrap_or_else(PoisonError::into_inner).take();
        let gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let producer = self.producer.lock().unwrap_or_else(PoisonError::into_inner).clone();

        async move {
            if let Some(gate) = gate {
                // A closed semaphore means the gate was torn down; proceed.
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            if let Some(error) = error {
                return Err(error);
            }
            if let Some(producer) = producer {
                producer(snapshot_number, dimension);
            }
            Ok(())
        }
        .boxed()
    }
}
