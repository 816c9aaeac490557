//! Integration tests for settings files.

use rplot::config::{GraphicsSettings, CONFIG_FILE_NAME};
use rplot::device::{DeviceStatus, Dimension, GraphicsDevice};
use rplot::error::GraphicsError;
use rplot::interpreter::mock::Operation;

use crate::common::fixtures::{Session, TracedDir};

fn write_settings(dir: &TracedDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, content).unwrap();
    path
}

/// Settings drive the device's initial parameters.
#[tokio::test]
async fn test_settings_feed_device_init() {
    let config_dir = TracedDir::new();
    std::fs::create_dir(config_dir.path().join("traced")).unwrap();
    let path = write_settings(
        &config_dir,
        r#"
width = 800
height = 600
resolution = 96
hidpi = true
traced_directory = "traced"
"#,
    );

    let settings = GraphicsSettings::load(&path).unwrap();
    let traced = settings.traced_directory.clone().unwrap();

    let session = Session::new();
    let context = session.context().with_hidpi(settings.hidpi);
    let device = GraphicsDevice::new(context, &traced, settings.screen_parameters());

    assert_eq!(device.status(), DeviceStatus::Loaded);
    assert_eq!(device.traced_directory(), traced.as_path());
    session.mock.assert_operations(&[Operation::InitDevice {
        directory: traced.to_string_lossy().replace('\\', "/"),
        dimension: Dimension::new(1600, 1200),
        resolution: Some(192),
    }]);
}

#[test]
fn test_windowed_default_resolution() {
    let config_dir = TracedDir::new();
    let path = write_settings(&config_dir, "height = 1440\n");

    let settings = GraphicsSettings::load(&path).unwrap();
    assert_eq!(settings.screen_parameters().resolution, Some(112));
}

#[test]
fn test_full_screen_default_resolution() {
    let config_dir = TracedDir::new();
    let path = write_settings(&config_dir, "height = 2160\nfull_screen = true\n");

    let settings = GraphicsSettings::load(&path).unwrap();
    assert_eq!(settings.screen_parameters().resolution, Some(600));
}

#[test]
fn test_malformed_settings() {
    let config_dir = TracedDir::new();
    let path = write_settings(&config_dir, "width = \"wide\"\n");

    let err = GraphicsSettings::load(&path).unwrap_err();
    assert!(matches!(err, GraphicsError::ConfigParse(_)));
    assert!(err.suggestion().is_some());

    let err = GraphicsSettings::load_or_default(&path).unwrap_err();
    assert!(matches!(err, GraphicsError::ConfigParse(_)));
}

#[test]
fn test_missing_settings_fall_back_to_defaults() {
    let config_dir = TracedDir::new();
    let settings = GraphicsSettings::load_or_default(config_dir.path().join(CONFIG_FILE_NAME)).unwrap();
    assert_eq!(settings, GraphicsSettings::default());
}
