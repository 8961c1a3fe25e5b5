use std::collections::HashMap;

use super::*;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_match_the_dispatch_defaults() {
    let settings = settings_from(None, env_of(&[])).expect("settings");
    assert_eq!(settings.server_bind, "127.0.0.1:8080");
    assert_eq!(settings.max_body_bytes, 2 * 1024 * 1024);
    assert_eq!(settings.to_dispatch_config(), DispatchConfig::default());
}

#[test]
fn file_values_override_defaults() {
    let file = r#"
        bind_addr = "0.0.0.0:9000"
        friendly_redirect = false
        csp_nonce = true
        response_headers = ["X-Frame-Options=DENY", "Referrer-Policy = no-referrer"]
        writer_pool_size = 4
    "#;

    let settings = settings_from(Some(file), env_of(&[])).expect("settings");
    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert!(!settings.friendly_redirect);
    assert!(settings.csp_nonce);
    assert_eq!(
        settings.response_headers,
        vec![
            ("X-Frame-Options".to_string(), "DENY".to_string()),
            ("Referrer-Policy".to_string(), "no-referrer".to_string()),
        ]
    );
    assert_eq!(settings.to_dispatch_config().writer_pool_size, 4);
}

#[test]
fn environment_wins_and_prefixed_names_beat_legacy_ones() {
    let file = r#"bind_addr = "0.0.0.0:9000""#;
    let env = env_of(&[
        ("SERVER_BIND", "10.0.0.1:1"),
        ("APP__BIND_ADDR", "10.0.0.2:2"),
        ("APP__HIDE_ERROR_TRACE", "yes"),
        ("APP__RESPONSE_HEADERS", "X-A=1; X-B=2"),
        ("APP__SYSTEM_INFO_CONTROLLER", "/oops"),
    ]);

    let settings = settings_from(Some(file), env).expect("settings");
    assert_eq!(settings.server_bind, "10.0.0.2:2");
    assert!(settings.hide_error_trace);
    assert_eq!(settings.response_headers.len(), 2);
    assert_eq!(settings.to_dispatch_config().system_info_controller, "/oops");

    let legacy = settings_from(None, env_of(&[("SERVER_BIND", "10.0.0.1:1")])).expect("settings");
    assert_eq!(legacy.server_bind, "10.0.0.1:1");
}

#[test]
fn malformed_values_are_rejected() {
    assert!(settings_from(None, env_of(&[("APP__CSP_NONCE", "maybe")])).is_err());
    assert!(settings_from(None, env_of(&[("APP__WRITER_POOL_SIZE", "many")])).is_err());
    assert!(settings_from(Some("friendly_redirect = \"sure\""), env_of(&[])).is_err());
    assert!(parse_header("no-separator").is_err());
    assert!(parse_header("=value").is_err());
}
