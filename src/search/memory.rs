use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::model::{Entity, Id};
use crate::search::query::QueryString;
use crate::search::traits::{SearchHits, SearchIndex};

/// Process-local index holding each document as the JSON it would be sent
/// to Elasticsearch, so queries see the same field layout.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    indices: RwLock<HashMap<&'static str, BTreeMap<Id, Value>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents<T: Entity>(&self) -> Vec<Value> {
        self.indices
            .read()
            .get(T::INDEX_NAME)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn decode<T: Entity>(documents: Vec<Value>) -> Result<Vec<T>> {
    documents
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(anyhow::Error::from))
        .collect::<Result<Vec<T>>>()
        .with_context(|| format!("Failed to decode {} documents", T::ENTITY_NAME))
}

#[async_trait::async_trait]
impl<T: Entity> SearchIndex<T> for InMemoryIndex {
    async fn save(&self, entity: &T) -> Result<()> {
        let id = entity
            .id()
            .with_context(|| format!("Cannot index an unsaved {}", T::ENTITY_NAME))?;
        let document = serde_json::to_value(entity)?;

        self.indices
            .write()
            .entry(T::INDEX_NAME)
            .or_default()
            .insert(id, document);
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<SearchHits<T>> {
        let query = QueryString::parse(query);
        let matching = self
            .documents::<T>()
            .into_iter()
            .filter(|doc| query.matches(doc))
            .collect();
        Ok(SearchHits::new(decode(matching)?))
    }

    async fn delete_by_id(&self, id: Id) -> Result<()> {
        if let Some(docs) = self.indices.write().get_mut(T::INDEX_NAME) {
            docs.remove(&id);
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.indices.write().remove(T::INDEX_NAME);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self
            .indices
            .read()
            .get(T::INDEX_NAME)
            .map_or(0, |docs| docs.len() as u64))
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        decode(self.documents::<T>())
    }
}
