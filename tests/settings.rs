use glitch_overlay::settings::Settings;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.json");
    let s = Settings::load(path.to_str().unwrap()).unwrap();
    assert_eq!(s, Settings::default());
}

#[test]
fn reads_recognised_options() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(
        &path,
        r#"{
            "loop": true,
            "tick_interval_ms": 50,
            "effects_path": "assets/frames",
            "ip_lookup": true,
            "ip_lookup_timeout_ms": 1500
        }"#,
    )
    .unwrap();
    let s = Settings::load(path.to_str().unwrap()).unwrap();
    assert!(s.loop_sequence);
    assert_eq!(s.tick_interval(), Duration::from_millis(50));
    assert_eq!(s.effects_path, Some(PathBuf::from("assets/frames")));
    assert!(s.ip_lookup);
    assert_eq!(s.ip_lookup_timeout(), Duration::from_millis(1500));
    assert!(!s.debug_logging);
}

#[test]
fn save_then_load_keeps_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let mut s = Settings::default();
    s.loop_sequence = true;
    s.ip_lookup_endpoints = Some(vec!["http://localhost:9/".into()]);
    s.log_file = Some(dir.path().join("overlay.log"));
    s.save(path.to_str().unwrap()).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"loop\": true"));
    assert_eq!(Settings::load(path.to_str().unwrap()).unwrap(), s);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, "{ loop: yes").unwrap();
    assert!(Settings::load(path.to_str().unwrap()).is_err());
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn unreadable_file_yields_defaults_with_warning() {
    let dir = tempdir().unwrap();
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    // A directory can't be read as a file.
    let s = tracing::subscriber::with_default(subscriber, || {
        Settings::load(dir.path().to_str().unwrap()).unwrap()
    });
    assert_eq!(s, Settings::default());
    let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(log.contains("could not read settings"), "log was: {log}");
}

#[test]
fn missing_file_is_not_reported() {
    let dir = tempdir().unwrap();
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        Settings::load(dir.path().join("nope.json").to_str().unwrap()).unwrap()
    });
    assert!(captured.0.lock().unwrap().is_empty());
}
