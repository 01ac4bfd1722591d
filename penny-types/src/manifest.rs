//! Declarative schema manifests.
//!
//! A manifest names the types (and the relations they carry) that must exist
//! in a space. Manifests arrive as loosely-shaped JSON from the agent layer and
//! are validated here, at the boundary, into tagged structures before any
//! reconciliation logic sees them.

use crate::name::normalize_name;
use crate::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest accepted type or relation name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Value format of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationFormat {
    #[default]
    #[serde(alias = "text")]
    Shorttext,
    Longtext,
    Number,
    Select,
    Multiselect,
    Date,
    File,
    Checkbox,
    Url,
    Email,
    Phone,
    Object,
    Tag,
    Status,
}

impl RelationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shorttext => "shorttext",
            Self::Longtext => "longtext",
            Self::Number => "number",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Date => "date",
            Self::File => "file",
            Self::Checkbox => "checkbox",
            Self::Url => "url",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Object => "object",
            Self::Tag => "tag",
            Self::Status => "status",
        }
    }
}

/// Default layout for objects of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Basic,
    Profile,
    Todo,
    Note,
    Bookmark,
    Set,
    Collection,
}

/// A relation (typed field) that must exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RelationSpecRepr")]
pub struct RelationSpec {
    pub name: String,
    pub format: RelationFormat,
    pub description: Option<String>,
}

impl RelationSpec {
    pub fn new(name: impl Into<String>, format: RelationFormat) -> Self {
        Self {
            name: name.into(),
            format,
            description: None,
        }
    }

    /// Normalized identity key of this relation.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Relations may be written as a bare name or as a full object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RelationSpecRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        format: RelationFormat,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<RelationSpecRepr> for RelationSpec {
    fn from(repr: RelationSpecRepr) -> Self {
        match repr {
            RelationSpecRepr::Name(name) => Self::new(name, RelationFormat::default()),
            RelationSpecRepr::Full {
                name,
                format,
                description,
            } => Self {
                name,
                format,
                description,
            },
        }
    }
}

/// An object type that must exist, with the relations it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl TypeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relations: Vec::new(),
            layout: Layout::default(),
            description: None,
            icon: None,
        }
    }

    /// Builder-style helper adding a relation.
    pub fn with_relation(mut self, name: impl Into<String>, format: RelationFormat) -> Self {
        self.relations.push(RelationSpec::new(name, format));
        self
    }

    /// Normalized identity key of this type.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// The desired schema of one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaManifest {
    /// Space the schema is reconciled into.
    #[serde(alias = "space_id")]
    pub space_target: String,
    /// Optional manifest label, used in logs and reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "types")]
    pub ensure_types: Vec<TypeSpec>,
    /// Stand-alone relations not attached to any type.
    #[serde(default, alias = "relations")]
    pub ensure_relations: Vec<RelationSpec>,
}

impl SchemaManifest {
    pub fn new(space_target: impl Into<String>) -> Self {
        Self {
            space_target: space_target.into(),
            name: None,
            ensure_types: Vec::new(),
            ensure_relations: Vec::new(),
        }
    }

    pub fn with_type(mut self, spec: TypeSpec) -> Self {
        self.ensure_types.push(spec);
        self
    }

    /// Parses and validates a manifest from an untyped JSON payload.
    pub fn from_json(value: serde_json::Value) -> ValidationResult<Self> {
        let manifest: Self = serde_json::from_value(value)
            .map_err(|e| ValidationError::new("manifest", e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parses and validates a manifest from JSON text.
    pub fn from_json_str(text: &str) -> ValidationResult<Self> {
        let manifest: Self = serde_json::from_str(text)
            .map_err(|e| ValidationError::new("manifest", e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks the structural rules a manifest must satisfy before planning.
    ///
    /// Relations repeated under the same normalized name are fine as long as
    /// they agree on format; they collapse into one relation.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.space_target.trim().is_empty() {
            return Err(ValidationError::new("space_target", "must not be blank"));
        }

        let mut type_keys: HashMap<String, usize> = HashMap::new();
        let mut formats: HashMap<String, (RelationFormat, String)> = HashMap::new();

        for (i, spec) in self.ensure_types.iter().enumerate() {
            let path = format!("ensure_types[{i}].name");
            check_name(&spec.name, &path)?;
            if let Some(first) = type_keys.insert(spec.key(), i) {
                return Err(ValidationError::new(
                    path,
                    format!(
                        "'{}' duplicates ensure_types[{first}] after normalization",
                        spec.name
                    ),
                ));
            }
            for (j, relation) in spec.relations.iter().enumerate() {
                let path = format!("ensure_types[{i}].relations[{j}]");
                check_relation(relation, path, &mut formats)?;
            }
        }

        for (j, relation) in self.ensure_relations.iter().enumerate() {
            check_relation(relation, format!("ensure_relations[{j}]"), &mut formats)?;
        }

        Ok(())
    }

    /// Every distinct relation the manifest references, first declaration
    /// wins, in declaration order (type relations before stand-alone ones).
    pub fn unique_relations(&self) -> Vec<&RelationSpec> {
        let mut seen = std::collections::HashSet::new();
        self.ensure_types
            .iter()
            .flat_map(|t| t.relations.iter())
            .chain(self.ensure_relations.iter())
            .filter(|r| seen.insert(r.key()))
            .collect()
    }

    /// Label used in logs.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.space_target)
    }
}

fn check_name(name: &str, path: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::new(path, "must not be blank"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            path,
            format!("longer than {MAX_NAME_LEN} characters"),
        ));
    }
    if normalize_name(name).is_empty() {
        return Err(ValidationError::new(
            path,
            format!("'{name}' contains no letters or digits"),
        ));
    }
    Ok(())
}

fn check_relation(
    relation: &RelationSpec,
    path: String,
    formats: &mut HashMap<String, (RelationFormat, String)>,
) -> ValidationResult<()> {
    check_name(&relation.name, &format!("{path}.name"))?;
    match formats.get(&relation.key()) {
        Some((format, first)) if *format != relation.format => Err(ValidationError::new(
            format!("{path}.format"),
            format!(
                "'{}' is declared as {} here but as {} at {first}",
                relation.name,
                relation.format.as_str(),
                format.as_str()
            ),
        )),
        Some(_) => Ok(()),
        None => {
            formats.insert(relation.key(), (relation.format, path));
            Ok(())
        }
    }
}
