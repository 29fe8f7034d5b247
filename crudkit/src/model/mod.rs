// The generic model: a schema bound to a backing collection, with the
// validate -> compute -> persist pipeline shared by every CRUD operation.

use crate::error::{CrudkitError, Result};
use crate::field::Field;
use crate::registry::Registry;
use crate::schema::{ModelDefinition, ID_KEY};
use crate::store::{Collection, DocumentId, Fields, Filter, RawDocument};
use serde_json::Value;

/// A named schema bound to one backing collection.
///
/// Models are stateless and constructed fresh per operation from the
/// [`Registry`]; they borrow all of their data and are cheap to create.
pub struct Model<'a> {
    registry: &'a Registry,
    name: &'a str,
    def: &'a ModelDefinition,
}

impl std::fmt::Debug for Model<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("def", &self.def)
            .finish_non_exhaustive()
    }
}

impl<'a> Model<'a> {
    pub(crate) fn new(registry: &'a Registry, name: &'a str, def: &'a ModelDefinition) -> Self {
        Model {
            registry,
            name,
            def,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub(crate) fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Handle to the backing collection.
    pub fn collection(&self) -> Collection<'a> {
        let name = self.def.collection.as_deref().unwrap_or(self.name);
        self.registry.collection(name)
    }

    /// The schema field names of this model, in declaration order.
    pub fn fieldnames(&self) -> Vec<&str> {
        self.def.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn field_by_name<'s>(&'s self, key: &str) -> Option<Field<'s>> {
        self.def.field(key).map(|def| Field::new(self, def))
    }

    /// All documents matching a flat equality filter.
    ///
    /// Array filter values (multi-valued query-string parameters) collapse to
    /// a single concatenated string before matching; everything else passes
    /// through unchanged.
    pub fn find(&self, filter: &Fields) -> Result<Vec<RawDocument>> {
        let mut query = Filter::new();
        for (key, value) in filter {
            query = query.eq(key.clone(), flatten_filter_value(value));
        }
        self.collection().find(&query)
    }

    /// JSON-safe representations of every document matching the filter, in
    /// insertion order.
    pub fn to_repr(&self, filter: &Fields) -> Result<Vec<Fields>> {
        Ok(self.find(filter)?.into_iter().map(repr_document).collect())
    }

    /// The representation of a single document, by external id string.
    pub fn retrieve(&self, id: &str) -> Result<Fields> {
        let id = self.parse_id(id)?;
        self.retrieve_by_id(&id)
    }

    pub(crate) fn retrieve_by_id(&self, id: &DocumentId) -> Result<Fields> {
        let docs = self
            .collection()
            .find(&Filter::new().with_id(id.clone()))?;
        docs.into_iter()
            .next()
            .map(repr_document)
            .ok_or_else(|| self.not_found(id))
    }

    /// Whether exactly one document with this id exists.
    pub fn exists(&self, id: &str) -> Result<bool> {
        let id = self.parse_id(id)?;
        self.exists_id(&id)
    }

    pub(crate) fn exists_id(&self, id: &DocumentId) -> Result<bool> {
        let count = self
            .collection()
            .count(&Filter::new().with_id(id.clone()))?;
        Ok(count == 1)
    }

    /// Run the validation pipeline over raw input.
    ///
    /// Empty input is a valid (empty) document body. Required fields must be
    /// present, unknown keys are rejected, each supplied value is checked by
    /// its field, and finally every auto field is computed and injected —
    /// unconditionally, since user-supplied values for auto fields were
    /// already rejected.
    pub fn validate(&self, data: &Fields, existing_id: Option<&DocumentId>) -> Result<Fields> {
        for field in &self.def.fields {
            // Auto fields are computed, never supplied; `required` cannot
            // apply to them on input.
            if field.required && !field.kind.is_auto() && !data.contains_key(&field.name) {
                return Err(CrudkitError::validation(
                    &field.name,
                    "This field is required",
                ));
            }
        }

        let mut validated = data.clone();

        for (key, value) in data {
            let field = self
                .field_by_name(key)
                .ok_or_else(|| CrudkitError::validation(key, "Invalid field"))?;
            field.validate(value, existing_id)?;
        }

        for def in self.def.fields.iter().filter(|f| f.kind.is_auto()) {
            let value = Field::new(self, def).compute(existing_id)?;
            validated.insert(def.name.clone(), value);
        }

        Ok(validated)
    }

    /// Validate and insert a new document, returning its representation.
    /// Validation failure prevents any collection mutation.
    pub fn create(&self, data: Fields) -> Result<Fields> {
        let validated = self.validate(&data, None)?;
        let id = self.collection().insert(validated)?;
        log::debug!("created {}/{id}", self.name);
        self.retrieve_by_id(&id)
    }

    /// Validate and merge-update an existing document: only supplied keys
    /// change, all others keep their prior values.
    pub fn update(&self, id: &str, data: Fields) -> Result<Fields> {
        let id = self.parse_id(id)?;
        if !self.exists_id(&id)? {
            return Err(self.not_found(&id));
        }

        let validated = self.validate(&data, Some(&id))?;
        self.collection().update_one(&id, validated)?;
        self.retrieve_by_id(&id)
    }

    /// Remove a document.
    pub fn delete(&self, id: &str) -> Result<()> {
        let id = self.parse_id(id)?;
        if !self.exists_id(&id)? {
            return Err(self.not_found(&id));
        }
        self.collection().delete_one(&id)?;
        log::debug!("deleted {}/{id}", self.name);
        Ok(())
    }

    pub(crate) fn parse_id(&self, raw: &str) -> Result<DocumentId> {
        self.collection().id_strategy().parse(raw)
    }

    fn not_found(&self, id: &DocumentId) -> CrudkitError {
        CrudkitError::NotFound {
            collection: self.collection().name().to_string(),
            id: id.to_string(),
        }
    }
}

/// Turn a stored document into its outward, JSON-safe representation: the
/// internal identifier is coerced to its string form under `_id`, field
/// values pass through as-is.
pub(crate) fn repr_document(doc: RawDocument) -> Fields {
    let mut repr = doc.fields;
    repr.insert(ID_KEY.to_string(), Value::String(doc.id.to_string()));
    repr
}

/// Collapse a multi-valued filter value to a single scalar.
fn flatten_filter_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let joined: String = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            Value::String(joined)
        }
        other => other.clone(),
    }
}
