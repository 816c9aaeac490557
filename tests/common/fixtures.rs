//! Test fixture helpers for traced directories and device sessions.
//!
//! Directories live in a `TempDir` and are cleaned up on drop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rplot::device::{DeviceContext, DeviceRegistry, Dimension, GraphicsDevice, ScreenParameters};
use rplot::interpreter::mock::MockInterpreter;
use tempfile::TempDir;
use tokio::runtime::Handle;

/// A real traced directory in a temp location.
pub struct TracedDir {
    pub dir: TempDir,
}

impl TracedDir {
    /// # Panics
    ///
    /// Panics if the temp directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a directory pre-populated with empty files.
    #[must_use]
    pub fn with_files(names: &[&str]) -> Self {
        let traced = Self::new();
        for name in names {
            traced.touch(name);
        }
        traced
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn touch(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"\x89PNG").unwrap_or_else(|e| panic!("Failed to write {path:?}: {e}"));
        path
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// File names present, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be read.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .expect("Failed to read traced directory")
            .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

impl Default for TracedDir {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use]
pub fn params(width: u32, height: u32, resolution: Option<u32>) -> ScreenParameters {
    ScreenParameters::new(Dimension::new(width, height), resolution)
}

/// Mock interpreter plus registry shared by the devices of one test.
pub struct Session {
    pub mock: Arc<MockInterpreter>,
    pub registry: Arc<DeviceRegistry>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mock: Arc::new(MockInterpreter::new()),
            registry: Arc::new(DeviceRegistry::new()),
        }
    }

    /// Must be called from inside a tokio runtime.
    #[must_use]
    pub fn context(&self) -> DeviceContext {
        DeviceContext::new(self.mock.clone(), Arc::clone(&self.registry), Handle::current())
    }

    /// Open a device over `traced` at 640x480, resolution 75.
    #[must_use]
    pub fn open(&self, traced: &TracedDir) -> Arc<GraphicsDevice> {
        GraphicsDevice::new(self.context(), traced.path(), params(640, 480, Some(75)))
    }

    /// Make every rescale write a new normal render for the requested slot
    /// (slot 0 for untargeted redraws), like the real producer.
    pub fn produce_into(&self, traced: &TracedDir) {
        let dir = traced.path().to_path_buf();
        let version = AtomicU32::new(1);
        self.mock.set_producer(move |number, _dimension| {
            let v = version.fetch_add(1, Ordering::SeqCst);
            let name = format!("snapshot_normal_{}_{v}.png", number.unwrap_or(0));
            let _ = std::fs::write(dir.join(name), b"\x89PNG");
        });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
