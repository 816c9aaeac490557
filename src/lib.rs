//! Snapshot synchronization and rescale coalescing for R graphics devices.
//!
//! The interpreter renders plots as PNG files into a traced directory. This
//! library keeps an authoritative view of those files per device, asks the
//! interpreter to redraw at new sizes without flooding it, and notifies UI
//! listeners when the visible plot set changes.
//!
//! # Modules
//!
//! - `snapshot`: File naming, directory scanning and duplicate reduction
//! - `device`: Graphics device state machine, registry and rescale queue
//! - `repository`: Active-device tracking and listener fan-out
//! - `interpreter`: Control interface towards the interpreter (plus a mock)
//! - `listeners`: Observer lists with subscription ids
//! - `config`: `graphics.toml` settings
//! - `error`: Error types with user-recoverable hints
//! - `logging`: `tracing` subscriber setup
#![forbid(unsafe_code)]

pub mod config;
pub mod device;
pub mod error;
pub mod interpreter;
pub mod listeners;
pub mod logging;
pub mod repository;
pub mod snapshot;

pub use device::{DeviceContext, GraphicsDevice};
pub use error::{GraphicsError, Result};
pub use repository::GraphicsRepository;
