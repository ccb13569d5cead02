/*
 * Integration tests for the hint scheduling stack
 *
 * These tests drive the public HintManager surface end to end: JSON
 * configuration in, background scheduling thread running, real file writes
 * observed on disk.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hint_core::{HintManager, InMemoryPropertyStore, PropertyStore};

struct Fixture {
    _dir: tempfile::TempDir,
    json: String,
    min_freq: PathBuf,
    max_freq: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let min_freq = dir.path().join("scaling_min_freq");
    let max_freq = dir.path().join("scaling_max_freq");
    fs::write(&min_freq, "").unwrap();
    fs::write(&max_freq, "").unwrap();

    let json = format!(
        r#"{{
            "Nodes": [
                {{
                    "Name": "cpu-min-freq",
                    "Path": "{min}",
                    "Values": ["1512000", "1134000", "384000"],
                    "ResetOnInit": true
                }},
                {{
                    "Name": "cpu-max-freq",
                    "Path": "{max}",
                    "Values": ["1512000", "1134000"],
                    "DefaultIndex": 0,
                    "ResetOnInit": true
                }},
                {{
                    "Name": "powerhal-state",
                    "Path": "vendor.powerhal.state",
                    "Type": "Property",
                    "Values": ["SUSTAINED", ""],
                    "ResetOnInit": true
                }}
            ],
            "Actions": [
                {{ "PowerHint": "INTERACTION", "Node": "cpu-min-freq", "Value": "1134000", "Duration": 400 }},
                {{ "PowerHint": "LAUNCH", "Node": "cpu-min-freq", "Value": "1512000", "Duration": 0 }},
                {{ "PowerHint": "LAUNCH", "Node": "cpu-max-freq", "Value": "1512000", "Duration": 0 }},
                {{ "PowerHint": "SUSTAINED_PERFORMANCE", "Node": "powerhal-state", "Value": "SUSTAINED", "Duration": 0 }}
            ]
        }}"#,
        min = min_freq.display(),
        max = max_freq.display()
    );

    Fixture {
        _dir: dir,
        json,
        min_freq,
        max_freq,
    }
}

fn wait_for_content(path: &Path, expected: &str) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        if fs::read_to_string(path).map_or(false, |content| content == expected) {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_defaults_written_at_startup() {
    let fx = fixture();
    let manager = HintManager::from_json(&fx.json).unwrap();
    assert!(manager.is_running());
    assert!(wait_for_content(&fx.min_freq, "384000"));
    assert!(wait_for_content(&fx.max_freq, "1512000"));
}

#[test]
fn test_from_file_round_trip() {
    let fx = fixture();
    let config_path = fx._dir.path().join("hintd.json");
    fs::write(&config_path, &fx.json).unwrap();

    let manager = HintManager::from_file(&config_path).unwrap();
    assert!(wait_for_content(&fx.min_freq, "384000"));

    assert!(manager.do_hint("LAUNCH"));
    assert!(wait_for_content(&fx.min_freq, "1512000"));
    assert!(wait_for_content(&fx.max_freq, "1512000"));

    assert!(manager.end_hint("LAUNCH"));
    assert!(wait_for_content(&fx.min_freq, "384000"));
    assert!(wait_for_content(&fx.max_freq, "1512000"));
}

#[test]
fn test_from_file_missing_config() {
    assert!(HintManager::from_file("/nonexistent/hintd.json").is_err());
}

#[test]
fn test_timed_hint_expires_and_reveals_lower_priority() {
    let fx = fixture();
    let manager = HintManager::from_json(&fx.json).unwrap();
    assert!(wait_for_content(&fx.min_freq, "384000"));

    // INTERACTION (400ms) holds the mid value, LAUNCH preempts it with the
    // top value indefinitely.
    assert!(manager.do_hint("INTERACTION"));
    assert!(wait_for_content(&fx.min_freq, "1134000"));
    assert!(manager.do_hint("LAUNCH"));
    assert!(wait_for_content(&fx.min_freq, "1512000"));

    // Ending LAUNCH reveals INTERACTION again if it has not expired yet,
    // and eventually the default.
    assert!(manager.end_hint("LAUNCH"));
    assert!(wait_for_content(&fx.min_freq, "384000"));
}

#[test]
fn test_property_node_through_injected_store() {
    let fx = fixture();
    let store = Arc::new(InMemoryPropertyStore::new());
    let manager = HintManager::from_json_with_store(&fx.json, store.clone()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while store.get("vendor.powerhal.state").as_deref() != Some("") {
        assert!(Instant::now() < deadline, "default never reached the store");
        thread::sleep(Duration::from_millis(10));
    }

    assert!(manager.do_hint("SUSTAINED_PERFORMANCE"));
    let deadline = Instant::now() + Duration::from_secs(2);
    while store.get("vendor.powerhal.state").as_deref() != Some("SUSTAINED") {
        assert!(Instant::now() < deadline, "hint never reached the store");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_dump_reflects_live_state() {
    let fx = fixture();
    let manager = HintManager::from_json(&fx.json).unwrap();
    assert!(wait_for_content(&fx.min_freq, "384000"));

    assert!(manager.do_hint("LAUNCH"));
    assert!(wait_for_content(&fx.min_freq, "1512000"));

    let mut out = Vec::new();
    manager.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("Begin hintd nodes"));
    assert!(text.contains(&format!(
        "cpu-min-freq\t{}\t0\t1512000",
        fx.min_freq.display()
    )));
    assert!(text.contains("End hintd nodes"));
}
