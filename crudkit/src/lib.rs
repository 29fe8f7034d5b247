//! crudkit — a schema-driven CRUD engine.
//!
//! Model collections are declared in a YAML config; crudkit turns each
//! declaration into generic create/read/update/delete behavior with typed
//! field validation, relational integrity checks, server-computed auto
//! fields, and a built-in user model with credential hashing.

pub mod error;
pub mod field;
pub mod model;
pub mod registry;
pub mod schema;
pub mod store;
pub mod user;

pub use error::{CrudkitError, Result};
pub use model::Model;
pub use registry::Registry;
pub use schema::{FieldDefinition, FieldKind, SchemaDefinition};
pub use store::{Backend, DocumentId, Fields, Filter, IdStrategy, MemoryBackend, RawDocument};
pub use user::User;
