// Typed field validation and auto-field computation. Each field check is
// independent; the model layer sequences them and stops at the first failure.

use crate::error::{CrudkitError, Result};
use crate::model::Model;
use crate::schema::{FieldDefinition, FieldKind};
use crate::store::{DocumentId, Filter};
use chrono::{NaiveDateTime, Utc};
use serde_json::Value;

/// Format used when storing auto timestamps. Parses back with the default
/// datetime input format.
pub const AUTO_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A field definition bound to the model it belongs to. Constructed on the
/// fly during validation; holds no state of its own.
pub struct Field<'a> {
    model: &'a Model<'a>,
    def: &'a FieldDefinition,
}

impl<'a> Field<'a> {
    pub(crate) fn new(model: &'a Model<'a>, def: &'a FieldDefinition) -> Self {
        Field { model, def }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn kind(&self) -> FieldKind {
        self.def.kind
    }

    /// Validate a user-supplied value for this field.
    ///
    /// When a document is being updated, `existing_id` excludes that document
    /// from the uniqueness check so a document can be saved with its own
    /// unchanged unique values.
    pub fn validate(&self, value: &Value, existing_id: Option<&DocumentId>) -> Result<()> {
        if self.def.kind.is_auto() {
            return Err(self.error("Auto fields cannot be set manually"));
        }

        if self.def.unique {
            self.check_unique(value, existing_id)?;
        }

        match self.def.kind {
            FieldKind::String => {
                if !value.is_string() {
                    return Err(self.error("Input must be a string"));
                }
            }
            FieldKind::Number => {
                if !value.is_number() {
                    return Err(self.error("Input must be numeric"));
                }
            }
            FieldKind::Boolean => {
                if !value.is_boolean() {
                    return Err(self.error("Input must be true or false"));
                }
            }
            FieldKind::Datetime => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| self.error("Input must be a string"))?;
                NaiveDateTime::parse_from_str(raw, self.def.datetime_format())
                    .map_err(|err| self.error(err.to_string()))?;
            }
            FieldKind::ForeignKey => {
                self.validate_reference(value)?;
            }
            FieldKind::ManyToMany => {
                let items = value
                    .as_array()
                    .ok_or_else(|| self.error("Input must be a list"))?;
                for item in items {
                    self.validate_reference(item)?;
                }
            }
            FieldKind::AutoSequence | FieldKind::AutoTimestamp => unreachable!("rejected above"),
        }

        Ok(())
    }

    /// Compute the server-assigned value for an auto field. Never driven by
    /// user input; the model injects the result after input validation.
    pub fn compute(&self, existing_id: Option<&DocumentId>) -> Result<Value> {
        match self.def.kind {
            FieldKind::AutoSequence => match existing_id {
                // Sequence numbers never change after creation.
                Some(id) => self.original_value(id),
                None => {
                    let count = self.model.collection().count(&Filter::new())?;
                    Ok(Value::from(count + 1))
                }
            },
            FieldKind::AutoTimestamp => match existing_id {
                Some(id) if self.def.create_only => self.original_value(id),
                _ => Ok(Value::String(
                    Utc::now().format(AUTO_TIMESTAMP_FORMAT).to_string(),
                )),
            },
            _ => Err(CrudkitError::Schema(format!(
                "field '{}' is not an auto field",
                self.def.name
            ))),
        }
    }

    /// Uniqueness check: any other document with the same value for this
    /// field is a conflict. Check-then-act; concurrent creates can race past
    /// it (backing-store constraints are the caller's recourse).
    fn check_unique(&self, value: &Value, existing_id: Option<&DocumentId>) -> Result<()> {
        let mut filter = Filter::new().eq(self.def.name.clone(), value.clone());
        if let Some(id) = existing_id {
            filter = filter.excluding(id.clone());
        }

        if self.model.collection().count(&filter)? > 0 {
            return Err(self.error(format!(
                "{} with this {} already exists",
                self.model.name(),
                self.def.name
            )));
        }
        Ok(())
    }

    /// Check that a value is a well-formed identifier resolving to an
    /// existing document of the related model.
    fn validate_reference(&self, value: &Value) -> Result<()> {
        let related_name = self.def.to.as_deref().ok_or_else(|| {
            CrudkitError::Schema(format!("relational field '{}' has no target", self.def.name))
        })?;
        let related = self.model.registry().model(related_name)?;

        let raw = value.as_str().ok_or_else(|| self.error("Invalid id"))?;
        let id = match related.collection().id_strategy().parse(raw) {
            Ok(id) => id,
            Err(CrudkitError::InvalidId(_)) => return Err(self.error("Invalid id")),
            Err(err) => return Err(err),
        };

        if !related.exists_id(&id)? {
            return Err(self.error(format!("Cannot find {related_name} with ID {raw}")));
        }
        Ok(())
    }

    /// The value this field currently holds on the stored document.
    fn original_value(&self, id: &DocumentId) -> Result<Value> {
        let docs = self
            .model
            .collection()
            .find(&Filter::new().with_id(id.clone()))?;
        let doc = docs
            .into_iter()
            .next()
            .ok_or_else(|| CrudkitError::NotFound {
                collection: self.model.collection().name().to_string(),
                id: id.to_string(),
            })?;
        Ok(doc.fields.get(&self.def.name).cloned().unwrap_or(Value::Null))
    }

    fn error(&self, message: impl Into<String>) -> CrudkitError {
        CrudkitError::validation(&self.def.name, message)
    }
}
