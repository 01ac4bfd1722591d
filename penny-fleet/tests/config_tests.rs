use penny_fleet::{FleetConfig, FleetError, ProfileConfig};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

#[test]
fn default_fleet_has_three_profiles() {
    let config = FleetConfig::default();
    assert_eq!(config.default_profile, "personal");
    assert_eq!(
        config.profiles.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["personal", "research", "work"]
    );
    assert_eq!(config.profiles["work"].base_url, "http://heart-work:31009");
    assert_eq!(config.profiles["work"].timeout_ms, 30_000);
}

#[test]
fn overrides_apply_per_profile() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("PENNY_URL_WORK", "https://work.example:8443"),
        ("PENNY_TOKEN_WORK", "tok-work"),
        ("PENNY_REFRESH_SECRET_PERSONAL", "secret"),
    ]);
    let mut config = FleetConfig::default();
    config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.profiles["work"].base_url, "https://work.example:8443");
    assert_eq!(config.profiles["work"].token.as_deref(), Some("tok-work"));
    assert_eq!(
        config.profiles["personal"].refresh_secret.as_deref(),
        Some("secret")
    );
    assert_eq!(config.profiles["research"].token, None);
}

#[test]
fn hyphenated_profiles_use_underscored_variables() {
    let mut config = FleetConfig::default();
    config
        .profiles
        .insert("side-project".into(), ProfileConfig::new("http://side:31009"));
    config.apply_overrides(|key| (key == "PENNY_TOKEN_SIDE_PROJECT").then(|| "t".to_string()));
    assert_eq!(config.profiles["side-project"].token.as_deref(), Some("t"));
}

#[test]
fn validation_rejects_bad_urls() {
    let mut config = FleetConfig::default();
    config.profiles.insert("work".into(), ProfileConfig::new("heart-work:31009"));
    assert!(matches!(
        config.validated_profiles(),
        Err(FleetError::Config(msg)) if msg.contains("work")
    ));
}

#[test]
fn validation_rejects_case_duplicates() {
    let mut config = FleetConfig::default();
    config
        .profiles
        .insert("Work".into(), ProfileConfig::new("http://other:31009"));
    assert!(matches!(
        config.validated_profiles(),
        Err(FleetError::Config(msg)) if msg.contains("more than once")
    ));
}

#[test]
fn validation_requires_default_profile() {
    let mut config = FleetConfig::default();
    config.default_profile = "finance".into();
    assert!(matches!(
        config.validated_profiles(),
        Err(FleetError::Config(_))
    ));

    config.default_profile = "not valid!".into();
    assert!(matches!(
        config.validated_profiles(),
        Err(FleetError::InvalidProfile(_))
    ));
}

#[test]
fn config_deserializes_from_json() {
    let config: FleetConfig = serde_json::from_value(serde_json::json!({
        "default_profile": "work",
        "fleet": {
            "work": { "base_url": "http://heart-work:31009", "token": "abc" }
        }
    }))
    .unwrap();
    assert_eq!(config.default_profile, "work");
    assert_eq!(config.profiles["work"].timeout_ms, 30_000);
    assert_eq!(config.validated_profiles().unwrap().len(), 1);
}

#[test]
fn profile_debug_redacts_secrets() {
    let profile = ProfileConfig {
        token: Some("tok-123456".into()),
        refresh_secret: Some("correct horse".into()),
        ..ProfileConfig::new("http://heart-personal:31009")
    };
    let debug = format!("{profile:?}");
    assert!(debug.contains("[REDACTED]"));
    assert!(!debug.contains("tok-123456"));
    assert!(!debug.contains("correct horse"));
}
