use penny_types::{GraphStats, LiveSchemaSnapshot, LiveType, Space, SpaceId, TypeId};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn space_accepts_camel_case_fields() {
    let space: Space = serde_json::from_value(json!({
        "id": "space_1",
        "name": "Research",
        "icon": "🔬",
        "isPersonal": true
    }))
    .unwrap();

    assert_eq!(space.id, SpaceId::from("space_1"));
    assert_eq!(space.name, "Research");
    assert!(space.is_personal);
}

#[test]
fn space_defaults_missing_fields() {
    let space: Space = serde_json::from_value(json!({ "id": "space_2" })).unwrap();
    assert_eq!(space.name, "");
    assert_eq!(space.icon, None);
    assert!(!space.is_personal);
}

#[test]
fn graph_stats_accepts_camel_case_and_partial_bodies() {
    let stats: GraphStats = serde_json::from_value(json!({
        "totalObjects": 42,
        "totalTypes": 3,
        "objectsByType": { "Project": 40, "Note": 2 }
    }))
    .unwrap();

    assert_eq!(stats.total_objects, 42);
    assert_eq!(stats.total_types, 3);
    assert_eq!(stats.total_relations, 0);
    assert_eq!(stats.objects_by_type["Project"], 40);
    assert_eq!(stats.storage_bytes, 0);
}

#[test]
fn snapshot_finds_types_by_normalized_name() {
    let snapshot = LiveSchemaSnapshot::new(
        vec![LiveType {
            id: TypeId::from("type_1"),
            name: "Reading List".into(),
            relation_ids: None,
        }],
        Vec::new(),
    );

    assert_eq!(snapshot.types_named("readinglist").len(), 1);
    assert!(snapshot.has_type(&TypeId::from("type_1")));
}
