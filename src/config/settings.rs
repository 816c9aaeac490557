//! Graphics settings loaded from `graphics.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use super::path::PathResolver;
use crate::device::{Dimension, ScreenParameters};
use crate::error::{GraphicsError, Result};

/// File name looked up under the user's config directory.
pub const CONFIG_FILE_NAME: &str = "graphics.toml";

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

const FULL_HD_HEIGHT: u32 = 1080;
const QUAD_HD_HEIGHT: u32 = 1440;
const ULTRA_HD_HEIGHT: u32 = 2160;

const FALLBACK_RESOLUTION: u32 = 150;
const FULL_HD_RESOLUTION: u32 = 300;
const QUAD_HD_RESOLUTION: u32 = 450;
const ULTRA_HD_RESOLUTION: u32 = 600;

const RESOLUTION_DIVISOR: u32 = 4;
const MINIMAL_RESOLUTION: u32 = 75;

/// Device settings.
///
/// # Example TOML
///
/// ```toml
/// width = 1280
/// height = 720
/// resolution = 150
/// hidpi = false
/// full_screen = false
/// traced_directory = "~/.cache/rplot/traced"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphicsSettings {
    /// Initial viewport width in pixels.
    pub width: u32,
    /// Initial viewport height in pixels.
    pub height: u32,
    /// Rasterization resolution. Derived from `height` when unset.
    pub resolution: Option<u32>,
    pub hidpi: bool,
    /// Plots are shown full screen rather than in a tool window.
    pub full_screen: bool,
    /// Where the interpreter writes snapshots. Relative paths resolve
    /// against the settings file.
    pub traced_directory: Option<PathBuf>,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            resolution: None,
            hidpi: false,
            full_screen: false,
            traced_directory: None,
        }
    }
}

impl GraphicsSettings {
    /// Load and validate settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ConfigNotFound`] if the file is missing,
    /// [`GraphicsError::ConfigParse`] on bad TOML and
    /// [`GraphicsError::ConfigInvalid`] if validation fails.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading graphics settings");

        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GraphicsError::ConfigNotFound {
                    path: path.display().to_string(),
                }
            } else {
                GraphicsError::Io(e)
            }
        })?;
        debug!(bytes = content.len(), "Read settings file");

        let mut settings = Self::from_toml(&content)?;
        if let Some(traced) = settings.traced_directory.take() {
            let resolver = PathResolver::new(path)?;
            settings.traced_directory = Some(resolver.resolve(&traced)?);
        }
        Ok(settings)
    }

    /// Load settings, falling back to defaults if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or is invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path) {
            Err(GraphicsError::ConfigNotFound { path }) => {
                debug!(path = %path, "No settings file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self> {
        trace!("Parsing settings content");
        let settings: Self =
            toml::from_str(content).map_err(|e| GraphicsError::ConfigParse(format!("TOML: {e}")))?;
        settings.validate()?;
        debug!(
            size = %settings.dimension(),
            resolution = ?settings.resolution,
            hidpi = settings.hidpi,
            "Settings parsed"
        );
        Ok(settings)
    }

    /// Serialize the settings as pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GraphicsError::ConfigParse(format!("TOML: {e}")))
    }

    /// Check that sizes and resolution are usable.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ConfigInvalid`] for a zero-sized viewport or
    /// a zero resolution.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GraphicsError::ConfigInvalid(format!(
                "viewport must be non-empty, got {}",
                self.dimension()
            )));
        }
        if self.resolution == Some(0) {
            return Err(GraphicsError::ConfigInvalid(
                "resolution must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn dimension(&self) -> Dimension {
        Dimension::new(self.width, self.height)
    }

    /// Initial screen parameters for a new device.
    #[must_use]
    pub fn screen_parameters(&self) -> ScreenParameters {
        let resolution = self
            .resolution
            .unwrap_or_else(|| default_resolution(self.height, self.full_screen));
        ScreenParameters::new(self.dimension(), Some(resolution))
    }
}

/// Resolution that keeps plots legible on a screen of the given height.
///
/// Outside full-screen mode plots are small, so the resolution is divided by
/// four but never drops below 75.
#[must_use]
pub fn default_resolution(screen_height: u32, full_screen: bool) -> u32 {
    let resolution = match screen_height {
        h if h >= ULTRA_HD_HEIGHT => ULTRA_HD_RESOLUTION,
        h if h >= QUAD_HD_HEIGHT => QUAD_HD_RESOLUTION,
        h if h >= FULL_HD_HEIGHT => FULL_HD_RESOLUTION,
        _ => FALLBACK_RESOLUTION,
    };
    if full_screen {
        resolution
    } else {
        (resolution / RESOLUTION_DIVISOR).max(MINIMAL_RESOLUTION)
    }
}

/// `<config dir>/rplot/graphics.toml`.
///
/// # Errors
///
/// Returns an error if the platform has no config directory.
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| {
        GraphicsError::ConfigInvalid("Could not determine config directory".to_string())
    })?;
    Ok(base.join("rplot").join(CONFIG_FILE_NAME))
}
