use cncpendant_communication::FirmwareKind;
use cncpendant_settings::{Config, SettingsError};

#[test]
fn test_toml_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.connection.port = "/dev/ttyACM0".to_string();
    config.connection.preferred_dialect = Some(FirmwareKind::Grbl);
    config.device.xon_xoff = true;
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(!loaded.connection.is_auto_port());
}

#[test]
fn test_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.device.priority_lines = 0;
    config.save_to_file(&path).unwrap();
    assert_eq!(Config::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[connection]\nport = \"COM3\"\npreferred_dialect = \"grbl\"\n\n[device]\nnormal_lines = 8\n",
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.connection.port, "COM3");
    assert_eq!(config.connection.preferred_dialect, Some(FirmwareKind::Grbl));
    assert_eq!(config.connection.baud_rates, vec![115200, 250000, 57600]);
    assert_eq!(config.device.normal_lines, 8);
    assert_eq!(config.device.watchdog_timeout_ms, 2500);
    assert_eq!(config.device_config().normal_lines, 8);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[device]\nwatchdog_timeout_ms = 0\n").unwrap();
    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::InvalidSetting { .. })
    ));

    std::fs::write(&path, "[device\n").unwrap();
    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::TomlParse(_))
    ));
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    assert!(matches!(
        Config::default().save_to_file(&path),
        Err(SettingsError::Format(_))
    ));
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}
