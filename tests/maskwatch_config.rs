use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use maskwatch::{CameraPosition, MaskwatchConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MASKWATCH_CONFIG",
        "MASKWATCH_DEBOUNCE_MS",
        "MASKWATCH_DETECTOR",
        "MASKWATCH_CAMERA_SOURCE",
        "MASKWATCH_CAMERA_POSITION",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "debounce_ms": 250,
        "detector": {
            "backend": "stub",
            "min_confidence": 0.9
        },
        "camera": {
            "source": "stub",
            "initial_position": "front",
            "width": 320,
            "height": 240,
            "target_fps": 5,
            "back_device": "/dev/video9",
            "front_device": "/dev/video8"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("MASKWATCH_CONFIG", file.path());
    std::env::set_var("MASKWATCH_DETECTOR", "cpu");
    std::env::set_var("MASKWATCH_CAMERA_POSITION", "back");

    let cfg = MaskwatchConfig::load().expect("load config");

    assert_eq!(cfg.debounce, Duration::from_millis(250));
    assert_eq!(cfg.detector.backend, "cpu");
    assert_eq!(cfg.detector.min_confidence, 0.9);
    assert_eq!(cfg.camera.source, "stub");
    assert_eq!(cfg.camera.initial_position, CameraPosition::Back);
    assert_eq!(cfg.camera.width, 320);
    assert_eq!(cfg.camera.height, 240);
    assert_eq!(cfg.camera.target_fps, 5);
    assert_eq!(cfg.camera.back_device, "/dev/video9");
    assert_eq!(cfg.camera.front_device, "/dev/video8");

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MaskwatchConfig::load().expect("load defaults");

    assert_eq!(cfg.debounce, Duration::from_millis(500));
    assert_eq!(cfg.detector.backend, "cpu");
    assert_eq!(cfg.camera.source, "stub");
    assert_eq!(cfg.camera.initial_position, CameraPosition::Back);

    clear_env();
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MASKWATCH_DEBOUNCE_MS", "0");
    assert!(MaskwatchConfig::load().is_err());

    std::env::set_var("MASKWATCH_DEBOUNCE_MS", "not-a-number");
    assert!(MaskwatchConfig::load().is_err());

    clear_env();

    std::env::set_var("MASKWATCH_CAMERA_POSITION", "sideways");
    assert!(MaskwatchConfig::load().is_err());

    clear_env();
}
