use super::{Backend, DocumentId, Fields, Filter, IdStrategy, RawDocument};
use crate::error::{CrudkitError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

type CollectionMap = HashMap<String, Vec<RawDocument>>;

/// Thread-safe in-memory backend. Documents are kept per collection in
/// insertion order; every query is a linear scan. Intended for tests, demos,
/// and as the reference implementation of the [`Backend`] contract.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<CollectionMap>,
    strategy: IdStrategy,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    pub fn with_strategy(strategy: IdStrategy) -> Self {
        MemoryBackend {
            collections: RwLock::new(CollectionMap::new()),
            strategy,
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, CollectionMap>> {
        self.collections
            .read()
            .map_err(|_| CrudkitError::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, CollectionMap>> {
        self.collections
            .write()
            .map_err(|_| CrudkitError::Storage("memory store lock poisoned".into()))
    }
}

impl Backend for MemoryBackend {
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<RawDocument>> {
        let store = self.read()?;
        let docs = match store.get(collection) {
            Some(docs) => docs,
            None => return Ok(vec![]),
        };
        Ok(docs.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let store = self.read()?;
        let docs = match store.get(collection) {
            Some(docs) => docs,
            None => return Ok(0),
        };
        Ok(docs.iter().filter(|d| filter.matches(d)).count() as u64)
    }

    fn insert(&self, collection: &str, fields: Fields) -> Result<DocumentId> {
        let id = self.strategy.generate();
        let mut store = self.write()?;
        store
            .entry(collection.to_string())
            .or_default()
            .push(RawDocument {
                id: id.clone(),
                fields,
            });
        Ok(id)
    }

    fn update_one(&self, collection: &str, id: &DocumentId, fields: Fields) -> Result<()> {
        let mut store = self.write()?;
        let docs = store
            .get_mut(collection)
            .ok_or_else(|| CrudkitError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let doc = docs
            .iter_mut()
            .find(|d| d.id == *id)
            .ok_or_else(|| CrudkitError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        // Merge semantics: only supplied keys change.
        for (key, value) in fields {
            doc.fields.insert(key, value);
        }
        Ok(())
    }

    fn delete_one(&self, collection: &str, id: &DocumentId) -> Result<()> {
        let mut store = self.write()?;
        let docs = store
            .get_mut(collection)
            .ok_or_else(|| CrudkitError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let before = docs.len();
        docs.retain(|d| d.id != *id);
        if docs.len() == before {
            return Err(CrudkitError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn id_strategy(&self) -> IdStrategy {
        self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn insert_and_find() {
        let backend = MemoryBackend::new();
        let id = backend
            .insert("notes", fields(&[("body", json!("hello"))]))
            .unwrap();

        let all = backend.find("notes", &Filter::new()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].fields["body"], json!("hello"));
    }

    #[test]
    fn find_preserves_insertion_order() {
        let backend = MemoryBackend::new();
        for n in 0..5 {
            backend
                .insert("notes", fields(&[("n", json!(n))]))
                .unwrap();
        }
        let all = backend.find("notes", &Filter::new()).unwrap();
        let ns: Vec<i64> = all.iter().map(|d| d.fields["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn equality_filter() {
        let backend = MemoryBackend::new();
        backend
            .insert("notes", fields(&[("tag", json!("a"))]))
            .unwrap();
        backend
            .insert("notes", fields(&[("tag", json!("b"))]))
            .unwrap();

        let matched = backend
            .find("notes", &Filter::new().eq("tag", "a"))
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(backend.count("notes", &Filter::new()).unwrap(), 2);
    }

    #[test]
    fn filter_excluding_id() {
        let backend = MemoryBackend::new();
        let id = backend
            .insert("notes", fields(&[("tag", json!("a"))]))
            .unwrap();

        let count = backend
            .count("notes", &Filter::new().eq("tag", "a").excluding(id))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn update_one_merges() {
        let backend = MemoryBackend::new();
        let id = backend
            .insert(
                "notes",
                fields(&[("body", json!("hello")), ("tag", json!("a"))]),
            )
            .unwrap();

        backend
            .update_one("notes", &id, fields(&[("tag", json!("b"))]))
            .unwrap();

        let doc = &backend.find("notes", &Filter::new()).unwrap()[0];
        assert_eq!(doc.fields["body"], json!("hello"));
        assert_eq!(doc.fields["tag"], json!("b"));
    }

    #[test]
    fn update_missing_is_not_found() {
        let backend = MemoryBackend::new();
        backend.insert("notes", Fields::new()).unwrap();
        let ghost = IdStrategy::Uuid.generate();
        let err = backend
            .update_one("notes", &ghost, Fields::new())
            .unwrap_err();
        assert!(matches!(err, CrudkitError::NotFound { .. }));
    }

    #[test]
    fn delete_one_removes() {
        let backend = MemoryBackend::new();
        let id = backend.insert("notes", Fields::new()).unwrap();
        backend.delete_one("notes", &id).unwrap();
        assert_eq!(backend.count("notes", &Filter::new()).unwrap(), 0);
        assert!(backend.delete_one("notes", &id).is_err());
    }
}
