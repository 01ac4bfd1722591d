use penny_types::{BackendId, ProfileName, RelationId, SessionId, TypeId};
use std::collections::HashSet;
use std::str::FromStr;

// ── SessionId ─────────────────────────────────────────────────────

#[test]
fn session_id_new_is_unique() {
    assert_ne!(SessionId::new(), SessionId::new());
}

#[test]
fn session_id_display_and_parse() {
    let id = SessionId::new();
    let parsed = SessionId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn session_id_parse_invalid() {
    assert!(SessionId::parse("not-a-uuid").is_err());
    assert!(SessionId::from_str("garbage").is_err());
}

// ── ProfileName ───────────────────────────────────────────────────

#[test]
fn profile_name_is_case_insensitive() {
    let a = ProfileName::parse("WORK").unwrap();
    let b = ProfileName::parse(" work ").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "work");
}

#[test]
fn profile_name_default_is_personal() {
    assert_eq!(ProfileName::default().as_str(), "personal");
}

#[test]
fn profile_name_rejects_blank() {
    let err = ProfileName::parse("   ").unwrap_err();
    assert_eq!(err.path, "profile_name");
}

#[test]
fn profile_name_rejects_path_characters() {
    assert!(ProfileName::parse("../etc").is_err());
    assert!(ProfileName::parse("work space").is_err());
}

#[test]
fn profile_name_serde_normalizes() {
    let name: ProfileName = serde_json::from_str("\"Research\"").unwrap();
    assert_eq!(name.as_str(), "research");
    assert_eq!(serde_json::to_string(&name).unwrap(), "\"research\"");
    assert!(serde_json::from_str::<ProfileName>("\"\"").is_err());
}

// ── BackendId ─────────────────────────────────────────────────────

#[test]
fn backend_id_ignores_trailing_slash_and_case() {
    let a = BackendId::from_base_url("http://Heart-Work:31009/");
    let b = BackendId::from_base_url("http://heart-work:31009");
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    set.insert(b);
    assert_eq!(set.len(), 1);
}

// ── Remote ids ────────────────────────────────────────────────────

#[test]
fn remote_ids_are_transparent_strings() {
    let id = RelationId::from("rel_123");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"rel_123\"");
    let back: RelationId = serde_json::from_str("\"rel_123\"").unwrap();
    assert_eq!(back, id);
    assert_eq!(TypeId::new("type_1").to_string(), "type_1");
}
