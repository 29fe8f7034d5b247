// The user model: the generic CRUD engine wrapped around a fixed credential
// schema, plus password hashing and authentication.

mod password;

pub use password::{hash_password, verify_password};

use crate::error::{CrudkitError, Result};
use crate::model::{repr_document, Model};
use crate::registry::Registry;
use crate::store::{DocumentId, Fields, Filter, RawDocument};
use serde_json::Value;

const PASSWORD_KEY: &str = "password";
const SALT_KEY: &str = "salt";

/// The built-in user model.
///
/// Wraps a [`Model`] with a fixed two-field schema: the username field (name
/// configurable) and the write-only password. The stored hash and salt are
/// system fields outside the schema, so user CRUD bypasses the generic
/// field pipeline and runs its own validation instead.
pub struct User<'a> {
    model: Model<'a>,
    registry: &'a Registry,
}

impl<'a> User<'a> {
    pub(crate) fn new(registry: &'a Registry) -> Self {
        User {
            model: Model::new(registry, "user", registry.user_def()),
            registry,
        }
    }

    pub fn username_field(&self) -> &str {
        &self.registry.user_config().username_field
    }

    /// Whether exactly one user with this username exists.
    pub fn user_exists(&self, username: &Value) -> Result<bool> {
        // Deliberately == 1, not >= 1: an ambiguous username (duplicates
        // racing past the create check) is treated as "no such user", the
        // same way authenticate rejects it.
        Ok(self.find_by_username(username)?.len() == 1)
    }

    /// Validate raw input for create/update.
    ///
    /// On create, both credential fields must be present and the username
    /// must not already be taken (a dedicated existence check, independent of
    /// field-level uniqueness). On update this is a no-op; `update` filters
    /// keys before anything else.
    pub fn validate(&self, data: &Fields, existing_id: Option<&DocumentId>) -> Result<()> {
        if existing_id.is_some() {
            return Ok(());
        }

        let username = data.get(self.username_field());
        if username.is_none() || !data.contains_key(PASSWORD_KEY) {
            return Err(CrudkitError::validation_document(
                "Username and password must be provided",
            ));
        }
        if let Some(username) = username {
            if self.user_exists(username)? {
                return Err(CrudkitError::validation_document("That user already exists"));
            }
        }
        Ok(())
    }

    /// Create a user: the raw password is popped, hashed with a fresh salt,
    /// and replaced by the hash + salt pair before anything is stored.
    pub fn create(&self, mut data: Fields) -> Result<Fields> {
        self.validate(&data, None)?;

        if let Some(raw) = data.remove(PASSWORD_KEY) {
            let raw = raw
                .as_str()
                .ok_or_else(|| CrudkitError::validation(PASSWORD_KEY, "Input must be a string"))?;
            let (hash, salt) = password::hash_password(raw)?;
            data.insert(PASSWORD_KEY.to_string(), Value::String(hash));
            data.insert(SALT_KEY.to_string(), Value::String(salt));
        }

        let id = self.model.collection().insert(data)?;
        log::debug!("created user {id}");
        Ok(strip_credentials(self.model.retrieve_by_id(&id)?))
    }

    /// Update a user. Only the username field and `password` may be supplied;
    /// anything else is rejected up front so the stored hash and salt cannot
    /// be manipulated directly. A new password is re-hashed with a fresh salt.
    pub fn update(&self, id: &str, mut data: Fields) -> Result<Fields> {
        self.check_invalid_keys(&data)?;

        let id = self.model.parse_id(id)?;
        if !self.model.exists_id(&id)? {
            return Err(CrudkitError::NotFound {
                collection: self.model.collection().name().to_string(),
                id: id.to_string(),
            });
        }
        self.validate(&data, Some(&id))?;

        if let Some(raw) = data.remove(PASSWORD_KEY) {
            let raw = raw
                .as_str()
                .ok_or_else(|| CrudkitError::validation(PASSWORD_KEY, "Input must be a string"))?;
            let (hash, salt) = password::hash_password(raw)?;
            data.insert(PASSWORD_KEY.to_string(), Value::String(hash));
            data.insert(SALT_KEY.to_string(), Value::String(salt));
        }

        self.model.collection().update_one(&id, data)?;
        Ok(strip_credentials(self.model.retrieve_by_id(&id)?))
    }

    /// The representation of a single user, credentials stripped.
    pub fn retrieve(&self, id: &str) -> Result<Fields> {
        Ok(strip_credentials(self.model.retrieve(id)?))
    }

    /// Delete a user.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.model.delete(id)
    }

    /// Representations of every matching user, with the stored hash and salt
    /// stripped from each.
    pub fn to_repr(&self, filter: &Fields) -> Result<Vec<Fields>> {
        Ok(self
            .model
            .to_repr(filter)?
            .into_iter()
            .map(strip_credentials)
            .collect())
    }

    /// Check credentials. Fails if either credential is empty, if the
    /// username matches zero or more than one user, or if the password does
    /// not verify against the stored hash. Success returns the user's
    /// representation with no credential fields.
    pub fn authenticate(&self, username: &str, raw_password: &str) -> Result<Fields> {
        if username.is_empty() || raw_password.is_empty() {
            return Err(CrudkitError::Authentication(
                "username and password must be provided".to_string(),
            ));
        }

        let mut users = self.find_by_username(&Value::String(username.to_string()))?;
        if users.len() != 1 {
            return Err(self.rejected());
        }
        let user = users.remove(0);

        let stored_hash = user
            .fields
            .get(PASSWORD_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| self.rejected())?;
        if !password::verify_password(raw_password, stored_hash)? {
            return Err(self.rejected());
        }

        Ok(strip_credentials(repr_document(user)))
    }

    fn find_by_username(&self, username: &Value) -> Result<Vec<RawDocument>> {
        self.model
            .collection()
            .find(&Filter::new().eq(self.username_field(), username.clone()))
    }

    fn check_invalid_keys(&self, data: &Fields) -> Result<()> {
        for key in data.keys() {
            if key != self.username_field() && key != PASSWORD_KEY {
                return Err(CrudkitError::validation(key, "Invalid field"));
            }
        }
        Ok(())
    }

    fn rejected(&self) -> CrudkitError {
        CrudkitError::Authentication("invalid username or password".to_string())
    }
}

/// Remove the stored hash and salt from an outward representation. The raw
/// password never reaches storage, so this covers every credential field.
fn strip_credentials(mut repr: Fields) -> Fields {
    repr.remove(PASSWORD_KEY);
    repr.remove(SALT_KEY);
    repr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::from_config_str("models: {}\n").unwrap()
    }

    fn credentials(username: &str, password: &str) -> Fields {
        [
            ("username".to_string(), json!(username)),
            ("password".to_string(), json!(password)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn create_then_authenticate() {
        let registry = registry();
        let user = registry.user();

        let created = user.create(credentials("a", "p")).unwrap();
        assert!(!created.contains_key("password"));
        assert!(!created.contains_key("salt"));

        let authed = user.authenticate("a", "p").unwrap();
        assert_eq!(authed["username"], json!("a"));
        assert!(!authed.contains_key("password"));
        assert!(!authed.contains_key("salt"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let registry = registry();
        let user = registry.user();
        user.create(credentials("a", "p")).unwrap();

        let err = user.authenticate("a", "wrong").unwrap_err();
        assert!(matches!(err, CrudkitError::Authentication(_)));
    }

    #[test]
    fn unknown_user_is_rejected() {
        let registry = registry();
        let user = registry.user();
        let err = user.authenticate("nobody", "p").unwrap_err();
        assert!(matches!(err, CrudkitError::Authentication(_)));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let registry = registry();
        let user = registry.user();
        user.create(credentials("a", "p")).unwrap();

        assert!(user.authenticate("", "p").is_err());
        assert!(user.authenticate("a", "").is_err());
    }

    #[test]
    fn duplicate_username_fails_create() {
        let registry = registry();
        let user = registry.user();
        user.create(credentials("a", "p")).unwrap();

        let err = user.create(credentials("a", "other")).unwrap_err();
        assert_eq!(err.to_string(), "That user already exists");
        assert_eq!(err.field(), None);
    }

    #[test]
    fn create_requires_both_credentials() {
        let registry = registry();
        let user = registry.user();

        let err = user
            .create([("username".to_string(), json!("a"))].into_iter().collect())
            .unwrap_err();
        assert_eq!(err.to_string(), "Username and password must be provided");
    }

    #[test]
    fn update_rejects_foreign_keys() {
        let registry = registry();
        let user = registry.user();
        let created = user.create(credentials("a", "p")).unwrap();
        let id = created["_id"].as_str().unwrap();

        for key in ["salt", "hash", "admin"] {
            let err = user
                .update(id, [(key.to_string(), json!("x"))].into_iter().collect())
                .unwrap_err();
            assert_eq!(err.field(), Some(key));
            assert_eq!(err.to_string(), "Invalid field");
        }
    }

    #[test]
    fn update_rehashes_a_new_password() {
        let registry = registry();
        let user = registry.user();
        let created = user.create(credentials("a", "p")).unwrap();
        let id = created["_id"].as_str().unwrap();

        user.update(
            id,
            [("password".to_string(), json!("q"))].into_iter().collect(),
        )
        .unwrap();

        assert!(user.authenticate("a", "q").is_ok());
        assert!(user.authenticate("a", "p").is_err());
    }

    #[test]
    fn to_repr_strips_credentials_from_every_user() {
        let registry = registry();
        let user = registry.user();
        user.create(credentials("a", "p")).unwrap();
        user.create(credentials("b", "p")).unwrap();

        let reprs = user.to_repr(&Fields::new()).unwrap();
        assert_eq!(reprs.len(), 2);
        for repr in &reprs {
            assert!(!repr.contains_key("password"));
            assert!(!repr.contains_key("salt"));
        }
    }

    #[test]
    fn custom_username_field() {
        let registry = Registry::from_config_str("user:\n  username_field: email\n").unwrap();
        let user = registry.user();
        assert_eq!(user.username_field(), "email");

        let created = user
            .create(
                [
                    ("email".to_string(), json!("a@b.c")),
                    ("password".to_string(), json!("p")),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap();
        assert_eq!(created["email"], json!("a@b.c"));
        assert!(user.authenticate("a@b.c", "p").is_ok());
    }

    #[test]
    fn ambiguous_username_does_not_count_as_existing() {
        let registry = registry();
        let user = registry.user();

        // Two same-username documents, inserted raw as if concurrent creates
        // had raced past the duplicate check.
        for _ in 0..2 {
            user.model
                .collection()
                .insert([("username".to_string(), json!("a"))].into_iter().collect())
                .unwrap();
        }

        assert!(!user.user_exists(&json!("a")).unwrap());
        // authenticate refuses the ambiguous name outright.
        assert!(user.authenticate("a", "p").is_err());
    }

    #[test]
    fn raw_password_is_never_stored() {
        let registry = registry();
        let user = registry.user();
        user.create(credentials("a", "p")).unwrap();

        // Inspect the raw collection, bypassing to_repr.
        let raw = registry
            .user()
            .model
            .collection()
            .find(&Filter::new())
            .unwrap();
        let stored = raw[0].fields["password"].as_str().unwrap();
        assert_ne!(stored, "p");
        assert!(stored.starts_with("$argon2id$"));
        assert!(raw[0].fields.contains_key("salt"));
    }
}
