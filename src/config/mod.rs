//! Graphics settings.
//!
//! Settings live in `<config dir>/rplot/graphics.toml`. Every field is
//! optional; a missing file means defaults.

mod path;
mod settings;

pub use path::{home_dir, resolve_path, PathResolver};
pub use settings::{default_config_path, default_resolution, GraphicsSettings, CONFIG_FILE_NAME};
