use crate::store::IdStrategy;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Datetime format accepted by `datetime` fields unless overridden per field.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Reserved key for the system-generated document identifier.
pub const ID_KEY: &str = "_id";

/// Top-level schema definition parsed from the config YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub options: SchemaOptions,
    #[serde(default)]
    pub models: HashMap<String, ModelDefinition>,
    #[serde(default)]
    pub user: UserConfig,
}

/// Store-wide options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaOptions {
    #[serde(default)]
    pub id_strategy: IdStrategy,
}

/// Definition of a single model: its backing collection plus an ordered
/// list of field definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Backing collection name; defaults to the model name.
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default, deserialize_with = "ordered_fields")]
    pub fields: Vec<FieldDefinition>,
}

impl ModelDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Configuration for the built-in user model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_username_field")]
    pub username_field: String,
    #[serde(default = "default_user_collection")]
    pub collection: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        UserConfig {
            username_field: default_username_field(),
            collection: default_user_collection(),
        }
    }
}

fn default_username_field() -> String {
    "username".to_string()
}

fn default_user_collection() -> String {
    "user".to_string()
}

/// Field type enumeration. Auto kinds are computed server-side and never
/// accepted from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    String,
    Number,
    Boolean,
    Datetime,
    ForeignKey,
    ManyToMany,
    AutoSequence,
    AutoTimestamp,
}

impl FieldKind {
    pub fn is_auto(self) -> bool {
        matches!(self, FieldKind::AutoSequence | FieldKind::AutoTimestamp)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, FieldKind::ForeignKey | FieldKind::ManyToMany)
    }
}

/// Definition of a single field within a model.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    /// chrono format string for `datetime` fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Related model name for `foreign_key` / `many_to_many` fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// For `auto_timestamp`: only set the value at creation time.
    pub create_only: bool,
}

impl FieldDefinition {
    fn from_options(name: String, options: FieldOptions) -> Self {
        FieldDefinition {
            name,
            kind: options.kind,
            required: options.required,
            unique: options.unique,
            format: options.format,
            to: options.to,
            create_only: options.create_only,
        }
    }

    /// The effective datetime format for this field.
    pub fn datetime_format(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_DATETIME_FORMAT)
    }
}

/// Per-field options as they appear in the YAML mapping. A field entry with
/// no options at all (`name:`) is a plain optional string field.
#[derive(Debug, Clone, Default, Deserialize)]
struct FieldOptions {
    #[serde(rename = "type", default)]
    kind: FieldKind,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    create_only: bool,
}

/// Deserialize the `fields` mapping into an ordered field list, preserving
/// the order fields were declared in the config.
fn ordered_fields<'de, D>(deserializer: D) -> Result<Vec<FieldDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FieldsVisitor;

    impl<'de> Visitor<'de> for FieldsVisitor {
        type Value = Vec<FieldDefinition>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of field name to field options")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut fields: Vec<FieldDefinition> = Vec::new();
            while let Some((name, options)) = map.next_entry::<String, Option<FieldOptions>>()? {
                if fields.iter().any(|f| f.name == name) {
                    return Err(de::Error::custom(format!("duplicate field '{name}'")));
                }
                fields.push(FieldDefinition::from_options(
                    name,
                    options.unwrap_or_default(),
                ));
            }
            Ok(fields)
        }
    }

    deserializer.deserialize_map(FieldsVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_order_is_preserved() {
        let def: ModelDefinition = serde_yaml::from_str(
            r#"
fields:
  zulu: { type: string }
  alpha: { type: number }
  mike: { type: boolean }
"#,
        )
        .unwrap();

        let names: Vec<&str> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn null_options_default_to_string() {
        let def: ModelDefinition = serde_yaml::from_str("fields:\n  name:\n").unwrap();
        let field = def.field("name").unwrap();
        assert_eq!(field.kind, FieldKind::String);
        assert!(!field.required);
        assert!(!field.unique);
    }

    #[test]
    fn unknown_field_kind_is_rejected() {
        let result: Result<ModelDefinition, _> =
            serde_yaml::from_str("fields:\n  x: { type: blob }\n");
        assert!(result.is_err());
    }

    #[test]
    fn auto_kinds() {
        assert!(FieldKind::AutoSequence.is_auto());
        assert!(FieldKind::AutoTimestamp.is_auto());
        assert!(!FieldKind::Datetime.is_auto());
        assert!(FieldKind::ForeignKey.is_relational());
        assert!(FieldKind::ManyToMany.is_relational());
    }
}
