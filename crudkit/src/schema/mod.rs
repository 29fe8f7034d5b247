// Declarative schema: serde types plus the YAML parser.

mod parser;
mod types;

pub use parser::{parse_schema, parse_schema_str};
pub use types::{
    FieldDefinition, FieldKind, ModelDefinition, SchemaDefinition, SchemaOptions, UserConfig,
    DEFAULT_DATETIME_FORMAT, ID_KEY,
};
