use crate::error::{CrudkitError, Result};
use crate::model::Model;
use crate::schema::{
    parse_schema, parse_schema_str, FieldDefinition, FieldKind, ModelDefinition, SchemaDefinition,
    UserConfig, ID_KEY,
};
use crate::store::{Backend, Collection, MemoryBackend};
use crate::user::User;
use std::path::Path;
use std::sync::Arc;

/// The schema registry: the shared, read-only context that binds model
/// definitions to a storage backend.
///
/// A `Registry` is built once at startup. `Model` and `User` values are
/// constructed fresh from it per operation; they borrow the registry and are
/// cheap to create, so concurrent request handling needs no locking at this
/// layer.
pub struct Registry {
    schema: SchemaDefinition,
    user_def: ModelDefinition,
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("schema", &self.schema)
            .field("user_def", &self.user_def)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Build a registry from an already-parsed schema and a backend.
    /// Fails with a `Schema` error if the schema is malformed.
    pub fn new(schema: SchemaDefinition, backend: Arc<dyn Backend>) -> Result<Self> {
        validate_schema(&schema)?;
        let user_def = build_user_def(&schema.user);
        log::debug!(
            "schema registry loaded with {} model(s)",
            schema.models.len()
        );
        Ok(Registry {
            schema,
            user_def,
            backend,
        })
    }

    /// Load a config YAML file and back it with an in-memory store using the
    /// configured id strategy.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let schema = parse_schema(path.as_ref())?;
        let backend = Arc::new(MemoryBackend::with_strategy(schema.options.id_strategy));
        Registry::new(schema, backend)
    }

    /// Same as [`Registry::open`], from a YAML string.
    pub fn from_config_str(content: &str) -> Result<Self> {
        let schema = parse_schema_str(content)?;
        let backend = Arc::new(MemoryBackend::with_strategy(schema.options.id_strategy));
        Registry::new(schema, backend)
    }

    /// Resolve a model name to a fresh `Model` instance.
    pub fn model(&self, name: &str) -> Result<Model<'_>> {
        self.schema
            .models
            .get_key_value(name)
            .map(|(key, def)| Model::new(self, key, def))
            .ok_or_else(|| CrudkitError::ModelNotFound(name.to_string()))
    }

    /// The built-in user model.
    pub fn user(&self) -> User<'_> {
        User::new(self)
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub(crate) fn user_def(&self) -> &ModelDefinition {
        &self.user_def
    }

    pub(crate) fn user_config(&self) -> &UserConfig {
        &self.schema.user
    }

    pub(crate) fn collection<'a>(&'a self, name: &'a str) -> Collection<'a> {
        Collection::new(&*self.backend, name)
    }
}

/// Load-time schema checks. These are fatal: a registry is never constructed
/// from a schema that fails them.
fn validate_schema(schema: &SchemaDefinition) -> Result<()> {
    for (model_name, def) in &schema.models {
        for field in &def.fields {
            if field.name == ID_KEY {
                return Err(CrudkitError::Schema(format!(
                    "model '{model_name}': field name '{ID_KEY}' is reserved"
                )));
            }
            if field.kind.is_relational() {
                let target = field.to.as_deref().ok_or_else(|| {
                    CrudkitError::Schema(format!(
                        "model '{model_name}': relational field '{}' requires 'to'",
                        field.name
                    ))
                })?;
                if !schema.models.contains_key(target) {
                    return Err(CrudkitError::Schema(format!(
                        "model '{model_name}': field '{}' points at unknown model '{target}'",
                        field.name
                    )));
                }
            }
        }
    }

    if schema.user.username_field == "password" || schema.user.username_field == ID_KEY {
        return Err(CrudkitError::Schema(format!(
            "'{}' cannot be used as the username field",
            schema.user.username_field
        )));
    }

    Ok(())
}

/// The fixed credential schema of the user model. The stored hash and salt
/// are system fields, deliberately absent from it.
fn build_user_def(config: &UserConfig) -> ModelDefinition {
    ModelDefinition {
        collection: Some(config.collection.clone()),
        fields: vec![
            FieldDefinition {
                name: config.username_field.clone(),
                kind: FieldKind::String,
                required: true,
                unique: true,
                format: None,
                to: None,
                create_only: false,
            },
            FieldDefinition {
                name: "password".to_string(),
                kind: FieldKind::String,
                required: true,
                unique: false,
                format: None,
                to: None,
                create_only: false,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_name() {
        let registry = Registry::from_config_str("models:\n  thing: {}\n").unwrap();
        assert!(registry.model("thing").is_ok());
        let err = registry.model("other").unwrap_err();
        assert!(matches!(err, CrudkitError::ModelNotFound(_)));
    }

    #[test]
    fn relational_field_requires_target() {
        let err = Registry::from_config_str(
            "models:\n  a:\n    fields:\n      b: { type: foreign_key }\n",
        )
        .unwrap_err();
        assert!(matches!(err, CrudkitError::Schema(_)));
    }

    #[test]
    fn relational_target_must_exist() {
        let err = Registry::from_config_str(
            "models:\n  a:\n    fields:\n      b: { type: foreign_key, to: ghost }\n",
        )
        .unwrap_err();
        assert!(matches!(err, CrudkitError::Schema(_)));
    }

    #[test]
    fn reserved_field_name() {
        let err =
            Registry::from_config_str("models:\n  a:\n    fields:\n      _id: {}\n").unwrap_err();
        assert!(matches!(err, CrudkitError::Schema(_)));
    }

    #[test]
    fn self_referencing_model_is_allowed() {
        let registry = Registry::from_config_str(
            "models:\n  node:\n    fields:\n      parent: { type: foreign_key, to: node }\n",
        )
        .unwrap();
        assert!(registry.model("node").is_ok());
    }

    #[test]
    fn username_field_cannot_be_password() {
        let err = Registry::from_config_str("user:\n  username_field: password\n").unwrap_err();
        assert!(matches!(err, CrudkitError::Schema(_)));
    }
}
