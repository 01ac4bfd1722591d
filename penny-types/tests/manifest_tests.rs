use penny_types::{Layout, RelationFormat, RelationSpec, SchemaManifest, TypeSpec};
use pretty_assertions::assert_eq;
use serde_json::json;

fn project_manifest() -> SchemaManifest {
    SchemaManifest::new("space_1").with_type(
        TypeSpec::new("Project")
            .with_relation("Status", RelationFormat::Status)
            .with_relation("Due Date", RelationFormat::Date),
    )
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn parses_full_manifest() {
    let manifest = SchemaManifest::from_json(json!({
        "space_target": "space_1",
        "name": "projects",
        "ensure_types": [{
            "name": "Project",
            "layout": "todo",
            "relations": [
                {"name": "Status", "format": "status"},
                {"name": "Due Date", "format": "date"}
            ]
        }]
    }))
    .unwrap();

    assert_eq!(manifest.label(), "projects");
    assert_eq!(manifest.ensure_types.len(), 1);
    let project = &manifest.ensure_types[0];
    assert_eq!(project.layout, Layout::Todo);
    assert_eq!(
        project.relations,
        vec![
            RelationSpec::new("Status", RelationFormat::Status),
            RelationSpec::new("Due Date", RelationFormat::Date),
        ]
    );
}

#[test]
fn relations_may_be_bare_names() {
    let manifest = SchemaManifest::from_json(json!({
        "space_id": "space_1",
        "types": [{"name": "Project", "relations": ["Status", "Owner"]}]
    }))
    .unwrap();

    let relations = &manifest.ensure_types[0].relations;
    assert_eq!(relations[0].name, "Status");
    assert_eq!(relations[0].format, RelationFormat::Shorttext);
    assert_eq!(relations[1].name, "Owner");
}

#[test]
fn text_is_an_alias_for_shorttext() {
    let spec: RelationSpec =
        serde_json::from_value(json!({"name": "Summary", "format": "text"})).unwrap();
    assert_eq!(spec.format, RelationFormat::Shorttext);
}

#[test]
fn unknown_format_is_a_validation_error() {
    let err = SchemaManifest::from_json(json!({
        "space_target": "s",
        "ensure_types": [{"name": "Project", "relations": [{"name": "X", "format": "hologram"}]}]
    }))
    .unwrap_err();
    assert_eq!(err.path, "manifest");
}

#[test]
fn missing_space_is_a_validation_error() {
    let err = SchemaManifest::from_json(json!({"ensure_types": []})).unwrap_err();
    assert_eq!(err.path, "manifest");
}

#[test]
fn from_json_str_validates() {
    assert!(SchemaManifest::from_json_str(r#"{"space_target": " "}"#).is_err());
    assert!(SchemaManifest::from_json_str("{not json").is_err());
}

// ── Validation ───────────────────────────────────────────────────

#[test]
fn valid_manifest_passes() {
    assert!(project_manifest().validate().is_ok());
}

#[test]
fn blank_type_name_is_rejected_with_path() {
    let manifest = SchemaManifest::new("s").with_type(TypeSpec::new("  "));
    let err = manifest.validate().unwrap_err();
    assert_eq!(err.path, "ensure_types[0].name");
}

#[test]
fn punctuation_only_relation_name_is_rejected() {
    let manifest = SchemaManifest::new("s")
        .with_type(TypeSpec::new("Project").with_relation("!!!", RelationFormat::Shorttext));
    let err = manifest.validate().unwrap_err();
    assert_eq!(err.path, "ensure_types[0].relations[0].name");
}

#[test]
fn overlong_name_is_rejected() {
    let manifest = SchemaManifest::new("s").with_type(TypeSpec::new("x".repeat(101)));
    assert!(manifest.validate().is_err());
    let manifest = SchemaManifest::new("s").with_type(TypeSpec::new("x".repeat(100)));
    assert!(manifest.validate().is_ok());
}

#[test]
fn duplicate_type_names_after_normalization_are_rejected() {
    let manifest = SchemaManifest::new("s")
        .with_type(TypeSpec::new("Project"))
        .with_type(TypeSpec::new(" project "));
    let err = manifest.validate().unwrap_err();
    assert_eq!(err.path, "ensure_types[1].name");
    assert!(err.message.contains("ensure_types[0]"));
}

#[test]
fn conflicting_relation_formats_are_rejected() {
    let manifest = SchemaManifest::new("s")
        .with_type(TypeSpec::new("Project").with_relation("Status", RelationFormat::Status))
        .with_type(TypeSpec::new("Task").with_relation("status", RelationFormat::Number));
    let err = manifest.validate().unwrap_err();
    assert_eq!(err.path, "ensure_types[1].relations[0].format");
}

#[test]
fn repeated_relations_with_same_format_collapse() {
    let manifest = SchemaManifest::new("s")
        .with_type(
            TypeSpec::new("Project")
                .with_relation("Status", RelationFormat::Shorttext)
                .with_relation(" status ", RelationFormat::Shorttext),
        )
        .with_type(TypeSpec::new("Task").with_relation("STATUS", RelationFormat::Shorttext));
    manifest.validate().unwrap();

    let unique = manifest.unique_relations();
    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].name, "Status");
}

#[test]
fn standalone_relations_follow_type_relations() {
    let mut manifest = project_manifest();
    manifest
        .ensure_relations
        .push(RelationSpec::new("Priority", RelationFormat::Select));
    manifest
        .ensure_relations
        .push(RelationSpec::new("status", RelationFormat::Status));

    let names: Vec<&str> = manifest
        .unique_relations()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["Status", "Due Date", "Priority"]);
}
