//! Control interface towards the R interpreter.
//!
//! The interpreter is an external process that owns the actual graphics
//! device. The engine only needs two calls from it, both treated as opaque:
//! initialize a device over a traced directory, and redraw plots at a new
//! size. The transport (and any timeout policy) lives behind this trait.

pub mod mock;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::device::{Dimension, InitProperties};
use crate::error::Result;

/// Output of a synchronous interpreter call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// A call succeeded if it wrote nothing but whitespace to stderr.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.stderr.trim().is_empty()
    }
}

/// Calls the engine makes into the interpreter.
///
/// # Implementation Notes
///
/// - `init_device` may block; it is only called from `reset()`
/// - `rescale` must not block the caller: do the work inside the future
/// - After a successful `rescale` the interpreter is expected to have written
///   the redrawn snapshot files into the traced directory
pub trait Interpreter: Send + Sync {
    /// Initialize (or re-initialize) the graphics device.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure. Interpreter-side failures are
    /// reported through a non-blank `stderr` instead.
    fn init_device(&self, properties: &InitProperties) -> Result<ExecutionResult>;

    /// Redraw one plot slot, or every plot when `snapshot_number` is `None`,
    /// at the given size.
    fn rescale(&self, snapshot_number: Option<u32>, dimension: Dimension) -> BoxFuture<'static, Result<()>>;
}

/// Shared interpreter handle.
pub type SharedInterpreter = Arc<dyn Interpreter>;
