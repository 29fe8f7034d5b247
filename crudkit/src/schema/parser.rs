use super::types::SchemaDefinition;
use crate::error::Result;
use std::path::Path;

/// Parse a config YAML file into a SchemaDefinition.
pub fn parse_schema(path: &Path) -> Result<SchemaDefinition> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse a config YAML string into a SchemaDefinition.
pub fn parse_schema_str(content: &str) -> Result<SchemaDefinition> {
    let schema: SchemaDefinition = serde_yaml::from_str(content)?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "models:\n  note:\n    fields:\n      body: {{ type: string }}\n"
        )
        .unwrap();

        let schema = parse_schema(file.path()).unwrap();
        assert!(schema.models.contains_key("note"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = parse_schema(Path::new("/no/such/config.yml")).unwrap_err();
        assert!(matches!(err, crate::CrudkitError::Io(_)));
    }
}
