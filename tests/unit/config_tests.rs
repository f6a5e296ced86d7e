//! Configuration loading and validation.

use fxcast_rs::publisher::{ConfigError, MulticastConfig};
use std::io::Write;

#[test]
fn test_load_full_config_file() {
    let json = r#"{
        "incremental_feed_a": {"multicast_ip": "239.50.1.1", "port": 16001},
        "incremental_feed_b": {"multicast_ip": "239.50.1.2", "port": 16002},
        "security_definition_feed": {"multicast_ip": "239.50.1.10", "port": 16010},
        "snapshot_feed": {"multicast_ip": "239.50.1.20", "port": 16020},
        "channel_feeds_a": [
            {"channel_id": 1, "multicast_ip": "239.50.2.1", "port": 16101,
             "instruments": ["EURUSD"], "description": "majors"}
        ],
        "channel_feeds_b": [
            {"channel_id": 1, "multicast_ip": "239.50.2.2", "port": 16102,
             "instruments": ["EURUSD"]}
        ],
        "incremental_interval_ms": 50,
        "snapshot_interval_seconds": 120,
        "heartbeat_interval_seconds": 15,
        "conflation_interval_ms": 250,
        "book_depth": 5
    }"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = MulticastConfig::load(file.path()).unwrap();
    assert_eq!(config.incremental_feed_a.multicast_ip, "239.50.1.1");
    assert_eq!(config.incremental_feed_a.interface_ip, "0.0.0.0");
    assert_eq!(config.channel_feeds_a.len(), 1);
    assert_eq!(config.channel_feeds_a[0].instruments, vec!["EURUSD"]);
    assert_eq!(config.incremental_interval_ms, 50);
    assert_eq!(config.snapshot_interval_seconds, 120);
    assert_eq!(config.heartbeat_interval_seconds, 15);
    assert_eq!(config.conflation_interval_ms, 250);
    assert_eq!(config.book_depth, 5);
    // Defaulted field.
    assert!(config.send_statistics);
}

#[test]
fn test_missing_file_falls_back_to_default_layout() {
    let config = MulticastConfig::load("/nonexistent/path/feeds.json").unwrap();
    assert_eq!(config.incremental_feed_a.multicast_ip, "239.100.1.1");
    assert_eq!(config.channel_feeds_a.len(), 2);
}

#[test]
fn test_malformed_file_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{ not json").unwrap();
    assert!(matches!(
        MulticastConfig::load(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_unicast_address_is_fatal() {
    let json = r#"{
        "incremental_feed_a": {"multicast_ip": "10.0.0.1", "port": 16001},
        "incremental_feed_b": {"multicast_ip": "239.50.1.2", "port": 16002},
        "security_definition_feed": {"multicast_ip": "239.50.1.10", "port": 16010},
        "snapshot_feed": {"multicast_ip": "239.50.1.20", "port": 16020}
    }"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    assert!(matches!(
        MulticastConfig::load(file.path()),
        Err(ConfigError::NotMulticast(addr)) if addr == "10.0.0.1"
    ));
}

#[test]
fn test_duplicate_channel_id_is_fatal() {
    let json = r#"{
        "incremental_feed_a": {"multicast_ip": "239.50.1.1", "port": 16001},
        "incremental_feed_b": {"multicast_ip": "239.50.1.2", "port": 16002},
        "security_definition_feed": {"multicast_ip": "239.50.1.10", "port": 16010},
        "snapshot_feed": {"multicast_ip": "239.50.1.20", "port": 16020},
        "channel_feeds_a": [
            {"channel_id": 3, "multicast_ip": "239.50.2.1", "port": 16101},
            {"channel_id": 3, "multicast_ip": "239.50.2.3", "port": 16103}
        ]
    }"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    assert!(matches!(
        MulticastConfig::load(file.path()),
        Err(ConfigError::DuplicateChannel(3))
    ));
}
