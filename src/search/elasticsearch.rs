use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{Entity, Id};
use crate::search::traits::{QueryRejected, SearchHits, SearchIndex};

/// Upper bound on hits returned by one search; the index's default result window.
const MAX_RESULT_WINDOW: usize = 10_000;

/// Search index backed by an Elasticsearch cluster over its REST API.
#[derive(Debug, Clone)]
pub struct ElasticsearchIndex {
    client: Client,
    base_url: String,
    index_prefix: String,
}

#[derive(Deserialize)]
struct SearchResponse<T> {
    hits: HitsEnvelope<T>,
}

#[derive(Deserialize)]
struct HitsEnvelope<T> {
    #[serde(default)]
    total: Option<TotalHits>,
    hits: Vec<Hit<T>>,
}

#[derive(Deserialize)]
struct TotalHits {
    value: u64,
}

impl<T> HitsEnvelope<T> {
    /// Matches beyond the returned page, if the result window cut any off.
    fn truncated(&self) -> Option<u64> {
        let total = self.total.as_ref()?.value;
        let missing = total.saturating_sub(self.hits.len() as u64);
        (missing > 0).then_some(missing)
    }
}

#[derive(Deserialize)]
struct Hit<T> {
    #[serde(rename = "_source")]
    source: T,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

impl ElasticsearchIndex {
    pub fn new(base_url: &str, index_prefix: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create Elasticsearch client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index_prefix: index_prefix.unwrap_or_default(),
        })
    }

    fn index_url<T: Entity>(&self) -> String {
        format!("{}/{}{}", self.base_url, self.index_prefix, T::INDEX_NAME)
    }

    async fn query<T: Entity>(&self, query: Value) -> Result<Vec<T>> {
        let response = self
            .client
            .post(format!("{}/_search", self.index_url::<T>()))
            .json(&json!({
                "query": query,
                "size": MAX_RESULT_WINDOW,
                "track_total_hits": true,
            }))
            .send()
            .await
            .with_context(|| format!("Failed to reach search index {}", T::INDEX_NAME))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(search_failure(status, &body));
        }

        let body: SearchResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode hits from {}", T::INDEX_NAME))?;

        if let Some(missing) = body.hits.truncated() {
            log::warn!(
                "Search on {} returned {} hits; {} further matches were cut off",
                T::INDEX_NAME,
                body.hits.hits.len(),
                missing
            );
        }

        Ok(body.hits.hits.into_iter().map(|hit| hit.source).collect())
    }
}

/// Client errors on `_search` are the query's fault; anything else is the cluster's.
fn search_failure(status: StatusCode, body: &str) -> anyhow::Error {
    if status.is_client_error() {
        let reason = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|error| {
                error
                    .pointer("/error/root_cause/0/reason")
                    .or_else(|| error.pointer("/error/reason"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("Search index rejected the query ({})", status));
        return QueryRejected { reason }.into();
    }
    anyhow!("Search index returned {}: {}", status, body)
}

/// A missing index behaves as an empty one; any other failure status is an error.
fn tolerate_missing_index(response: Response) -> Result<Option<Response>> {
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    Ok(Some(response.error_for_status()?))
}

#[async_trait::async_trait]
impl<T: Entity> SearchIndex<T> for ElasticsearchIndex {
    async fn save(&self, entity: &T) -> Result<()> {
        let id = entity
            .id()
            .with_context(|| format!("Cannot index an unsaved {}", T::ENTITY_NAME))?;

        self.client
            .put(format!("{}/_doc/{}", self.index_url::<T>(), id))
            .json(entity)
            .send()
            .await
            .with_context(|| format!("Failed to reach search index {}", T::INDEX_NAME))?
            .error_for_status()
            .with_context(|| format!("Failed to index {} {}", T::ENTITY_NAME, id))?;

        Ok(())
    }

    async fn search(&self, query: &str) -> Result<SearchHits<T>> {
        let hits = self
            .query::<T>(json!({ "query_string": { "query": query } }))
            .await?;
        Ok(SearchHits::new(hits))
    }

    async fn delete_by_id(&self, id: Id) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/_doc/{}", self.index_url::<T>(), id))
            .send()
            .await
            .with_context(|| format!("Failed to reach search index {}", T::INDEX_NAME))?;

        // Deleting an absent document reports 404 as well.
        tolerate_missing_index(response)?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let response = self
            .client
            .post(format!(
                "{}/_delete_by_query?refresh=true",
                self.index_url::<T>()
            ))
            .json(&json!({ "query": { "match_all": {} } }))
            .send()
            .await
            .with_context(|| format!("Failed to reach search index {}", T::INDEX_NAME))?;

        tolerate_missing_index(response)?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .get(format!("{}/_count", self.index_url::<T>()))
            .send()
            .await
            .with_context(|| format!("Failed to reach search index {}", T::INDEX_NAME))?;

        match tolerate_missing_index(response)? {
            Some(response) => {
                let body: CountResponse = response
                    .json()
                    .await
                    .context("Failed to decode count response")?;
                Ok(body.count)
            }
            None => Ok(0),
        }
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        self.query::<T>(json!({ "match_all": {} })).await
    }
}
