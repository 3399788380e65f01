use crate::model::{Application, Entity, Id, Instance, WmisComponent};
use anyhow::Result;

/// Secondary full-text projection of one entity type. Never authoritative.
#[async_trait::async_trait]
pub trait SearchIndex<T: Entity>: Send + Sync {
    /// Upsert the given value as the document for its id.
    async fn save(&self, entity: &T) -> Result<()>;
    /// Free-text query in `query_string` syntax. Hits come back unordered.
    async fn search(&self, query: &str) -> Result<SearchHits<T>>;
    async fn delete_by_id(&self, id: Id) -> Result<()>;
    async fn delete_all(&self) -> Result<()>;
    async fn count(&self) -> Result<u64>;
    async fn find_all(&self) -> Result<Vec<T>>;
}

pub trait Index:
    SearchIndex<Application> + SearchIndex<Instance> + SearchIndex<WmisComponent> + Send + Sync
{
}

impl<T> Index for T where
    T: SearchIndex<Application> + SearchIndex<Instance> + SearchIndex<WmisComponent> + Send + Sync
{
}

/// The index understood the request but refused the query itself, e.g. a
/// `query_string` syntax error. Distinct from the index being unreachable.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct QueryRejected {
    pub reason: String,
}

/// Result of a single `search` call, consumed lazily.
#[derive(Debug)]
pub struct SearchHits<T> {
    hits: std::vec::IntoIter<T>,
}

impl<T> SearchHits<T> {
    pub fn new(hits: Vec<T>) -> Self {
        Self {
            hits: hits.into_iter(),
        }
    }
}

impl<T> Iterator for SearchHits<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.hits.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hits.size_hint()
    }
}
