//! Screen parameters and device configuration types.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a plot viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Double both sides, saturating.
    #[must_use]
    pub const fn doubled(self) -> Self {
        Self {
            width: self.width.saturating_mul(2),
            height: self.height.saturating_mul(2),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Viewport size plus rasterization resolution (DPI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenParameters {
    pub dimension: Dimension,
    /// `None` lets the interpreter pick its default.
    pub resolution: Option<u32>,
}

impl ScreenParameters {
    #[must_use]
    pub const fn new(dimension: Dimension, resolution: Option<u32>) -> Self {
        Self {
            dimension,
            resolution,
        }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimension.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimension.height
    }

    /// Same parameters with another viewport size.
    #[must_use]
    pub const fn with_dimension(self, dimension: Dimension) -> Self {
        Self { dimension, ..self }
    }

    /// Scale for a hi-dpi display: twice the pixels at twice the resolution.
    #[must_use]
    pub fn scaled_for_hidpi(self) -> Self {
        Self {
            dimension: self.dimension.doubled(),
            resolution: self.resolution.map(|r| r.saturating_mul(2)),
        }
    }
}

/// What a device is currently showing and at which size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub screen_parameters: ScreenParameters,
    /// Plot slot the latest rescale/update was tracking, if any.
    pub snapshot_number: Option<u32>,
}

impl Configuration {
    #[must_use]
    pub const fn new(screen_parameters: ScreenParameters, snapshot_number: Option<u32>) -> Self {
        Self {
            screen_parameters,
            snapshot_number,
        }
    }

    #[must_use]
    pub const fn with_screen_parameters(self, screen_parameters: ScreenParameters) -> Self {
        Self {
            screen_parameters,
            ..self
        }
    }

    #[must_use]
    pub const fn with_snapshot_number(self, snapshot_number: Option<u32>) -> Self {
        Self {
            snapshot_number,
            ..self
        }
    }
}

/// Parameters sent to the interpreter when (re)initializing a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitProperties {
    /// Traced directory with forward slashes on every platform.
    pub snapshot_directory: String,
    pub screen_parameters: ScreenParameters,
}

impl InitProperties {
    #[must_use]
    pub fn new(
        directory: &Path,
        dimension: Dimension,
        resolution: Option<u32>,
        hidpi: bool,
    ) -> Self {
        let parameters = ScreenParameters::new(dimension, resolution);
        Self {
            snapshot_directory: directory.to_string_lossy().replace('\\', "/"),
            screen_parameters: if hidpi {
                parameters.scaled_for_hidpi()
            } else {
                parameters
            },
        }
    }
}

/// Lifecycle state of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// `reset()` has not completed yet.
    Uninitialized,
    /// The interpreter accepted the last `reset()`.
    Loaded,
    /// The last `reset()` reported an error; updates are no-ops.
    Failed,
    /// The device was disposed together with its session.
    Disposed,
}
