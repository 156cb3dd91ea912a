// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn missing_file_yields_defaults() {
    let config = DaemonConfig::load(Path::new("/definitely/not/here.toml")).unwrap();
    assert_eq!(config.broker.port, 5672);
    assert_eq!(config.store.port, 6379);
    assert!(!config.memory_store);
}

#[test]
fn sections_override_defaults_independently() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("convoy.toml");
    std::fs::write(
        &path,
        r#"
memory_store = true

[broker]
host_name = "mq.internal"
prefetch = 64

[engine]
lease_ttl_s = 15
lease_renew_s = 5

[transport]
bind_addr = "127.0.0.1:9000"

[log]
filter = "debug"
"#,
    )
    .unwrap();

    let config = DaemonConfig::load(&path).unwrap();
    assert!(config.memory_store);
    assert_eq!(config.broker.host_name, "mq.internal");
    assert_eq!(config.broker.prefetch, 64);
    // Untouched broker fields keep their defaults.
    assert_eq!(config.broker.port, 5672);
    assert_eq!(config.engine.lease_ttl_s, 15);
    assert_eq!(config.engine.lease_renew_s, 5);
    assert_eq!(config.transport.bind_addr, "127.0.0.1:9000");
    assert_eq!(config.log.filter, "debug");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("convoy.toml");
    std::fs::write(&path, "[broker\nhost_name = ").unwrap();
    assert!(matches!(DaemonConfig::load(&path), Err(ConfigError::Parse { .. })));
}
