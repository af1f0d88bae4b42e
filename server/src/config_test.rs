use super::*;
use std::collections::HashMap;

fn config_from(pairs: &[(&str, &str)]) -> Result<RelayConfig, ConfigError> {
    let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    RelayConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn defaults_when_nothing_is_set() {
    let cfg = config_from(&[]).unwrap();
    assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert!(cfg.blocked_hosts.is_empty());
    assert_eq!(cfg.fetch, FetchConfig::default());
    assert_eq!(cfg.outbound_queue, DEFAULT_OUTBOUND_QUEUE);
    assert!(!cfg.relay.close_sockets_on_disconnect);
}

#[test]
fn parses_overrides() {
    let cfg = config_from(&[
        ("PORT", "8080"),
        ("RELAY_BIND_ADDR", "127.0.0.1"),
        ("RELAY_BLOCKED_HOSTS", " localhost , metadata.internal,, "),
        ("RELAY_CONNECT_TIMEOUT_SECS", "3"),
        ("RELAY_REQUEST_TIMEOUT_SECS", "30"),
        ("RELAY_MAX_REDIRECTS", "2"),
        ("RELAY_OUTBOUND_QUEUE", "16"),
        ("RELAY_CLOSE_SOCKETS_ON_DISCONNECT", "true"),
    ])
    .unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.bind_addr, "127.0.0.1");
    assert_eq!(cfg.blocked_hosts, vec!["localhost".to_owned(), "metadata.internal".to_owned()]);
    assert_eq!(cfg.fetch.connect_timeout, Duration::from_secs(3));
    assert_eq!(cfg.fetch.request_timeout, Some(Duration::from_secs(30)));
    assert_eq!(cfg.fetch.max_redirects, 2);
    assert_eq!(cfg.outbound_queue, 16);
    assert!(cfg.relay.close_sockets_on_disconnect);
}

#[test]
fn unparseable_numbers_fall_back_to_defaults() {
    let cfg = config_from(&[("RELAY_CONNECT_TIMEOUT_SECS", "soon"), ("RELAY_OUTBOUND_QUEUE", "0")]).unwrap();
    assert_eq!(cfg.fetch.connect_timeout, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));
    assert_eq!(cfg.outbound_queue, 1);
}

#[test]
fn invalid_port_is_an_error() {
    let err = config_from(&[("PORT", "http")]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPort(ref raw) if raw == "http"));
}

#[test]
fn invalid_bool_is_an_error() {
    let err = config_from(&[("RELAY_CLOSE_SOCKETS_ON_DISCONNECT", "maybe")]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBool { var: "RELAY_CLOSE_SOCKETS_ON_DISCONNECT", .. }));
}
