use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::alerts::Alerts;
use crate::api::error::ApiError;
use crate::model::{Entity, Id, Instance, WmisComponent};
use crate::search::{self, Index, QueryRejected, SearchIndex};
use crate::store::traits::{Detached, EntityStore, Store};

/// Shared per-process resources: the authoritative store, the search index
/// mirroring it, and the alert header builder.
#[derive(Debug)]
pub struct Services<S, I> {
    pub store: S,
    pub index: I,
    pub alerts: Alerts,
}

pub type AppState<S, I> = Arc<Services<S, I>>;

impl<S, I> Services<S, I> {
    pub fn new(store: S, index: I, alerts: Alerts) -> Self {
        Self {
            store,
            index,
            alerts,
        }
    }

    /// Re-read `entity` from the store and upsert it into the index.
    /// The store write has already succeeded, so a failure here only leaves
    /// the index stale until the next write or a reindex.
    async fn mirror<T>(&self, entity: &T)
    where
        T: Entity,
        S: EntityStore<T>,
        I: SearchIndex<T>,
    {
        if let Err(e) = search::index(&self.store, &self.index, entity).await {
            log::warn!(
                "Failed to mirror {} {:?} into the search index: {:#}",
                T::ENTITY_NAME,
                entity.id(),
                e
            );
        }
    }

    /// Re-mirror children whose parent reference the store just cleared, so
    /// their documents stop pointing at the deleted row.
    async fn mirror_detached(&self, detached: &Detached)
    where
        S: Store,
        I: Index,
    {
        for &id in &detached.instances {
            if let Err(e) = search::index_by_id::<Instance, S, I>(&self.store, &self.index, id).await {
                log::warn!("Failed to re-index detached instance {}: {:#}", id, e);
            }
        }
        for &id in &detached.components {
            if let Err(e) =
                search::index_by_id::<WmisComponent, S, I>(&self.store, &self.index, id).await
            {
                log::warn!("Failed to re-index detached wMISComponent {}: {:#}", id, e);
            }
        }
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

fn check_identifier<T: Entity>(path_id: Id, entity: &T) -> Result<(), ApiError> {
    match entity.id() {
        None => Err(ApiError::validation(T::ENTITY_NAME, "idnull", "Invalid id")),
        Some(body_id) if body_id != path_id => {
            Err(ApiError::validation(T::ENTITY_NAME, "idinvalid", "Invalid ID"))
        }
        Some(_) => Ok(()),
    }
}

/// POST /api/{resource}
pub async fn create_entity<T, S, I>(
    State(state): State<AppState<S, I>>,
    RequestJson(entity): RequestJson<T>,
) -> Result<(StatusCode, HeaderMap, Json<T>), ApiError>
where
    T: Entity,
    S: EntityStore<T> + 'static,
    I: SearchIndex<T> + 'static,
{
    log::debug!("REST request to save {} : {:?}", T::ENTITY_NAME, entity);
    if entity.id().is_some() {
        return Err(ApiError::conflict(
            T::ENTITY_NAME,
            "idexists",
            &format!("A new {} cannot already have an ID", T::ENTITY_NAME),
        ));
    }

    let result = state.store.create(entity).await?;
    let id = result
        .id()
        .context("Store returned a created row without identifier")?;
    state.mirror(&result).await;

    let mut headers = state.alerts.created(T::ENTITY_NAME, id);
    if let Ok(location) = HeaderValue::from_str(&format!("/api/{}/{}", T::RESOURCE, id)) {
        headers.insert(LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(result)))
}

/// PUT /api/{resource}/{id}
pub async fn update_entity<T, S, I>(
    Path(id): Path<Id>,
    State(state): State<AppState<S, I>>,
    RequestJson(entity): RequestJson<T>,
) -> Result<(HeaderMap, Json<T>), ApiError>
where
    T: Entity,
    S: EntityStore<T> + 'static,
    I: SearchIndex<T> + 'static,
{
    log::debug!("REST request to update {} : {}, {:?}", T::ENTITY_NAME, id, entity);
    check_identifier(id, &entity)?;
    if !state.store.exists_by_id(id).await? {
        return Err(ApiError::not_found(T::ENTITY_NAME, id));
    }

    let result = state.store.save(entity).await?;
    state.mirror(&result).await;

    Ok((state.alerts.updated(T::ENTITY_NAME, id), Json(result)))
}

/// PATCH /api/{resource}/{id}
///
/// Only the non-null scalar fields of the body are applied. The merged row
/// is written to the index as-is, without the re-read a full update does.
pub async fn partial_update_entity<T, S, I>(
    Path(id): Path<Id>,
    State(state): State<AppState<S, I>>,
    RequestJson(patch): RequestJson<T>,
) -> Result<(HeaderMap, Json<T>), ApiError>
where
    T: Entity,
    S: EntityStore<T> + 'static,
    I: SearchIndex<T> + 'static,
{
    log::debug!(
        "REST request to partial update {} partially : {}, {:?}",
        T::ENTITY_NAME,
        id,
        patch
    );
    check_identifier(id, &patch)?;
    if !state.store.exists_by_id(id).await? {
        return Err(ApiError::not_found(T::ENTITY_NAME, id));
    }

    let Some(mut existing) = state.store.find_by_id(id).await? else {
        return Err(ApiError::not_found(T::ENTITY_NAME, id));
    };
    existing.merge_from(&patch);

    let saved = state.store.save(existing).await?;
    if let Err(e) = state.index.save(&saved).await {
        log::warn!(
            "Failed to mirror {} {} into the search index: {:#}",
            T::ENTITY_NAME,
            id,
            e
        );
    }

    Ok((state.alerts.updated(T::ENTITY_NAME, id), Json(saved)))
}

/// GET /api/{resource}
pub async fn list_entities<T, S, I>(
    State(state): State<AppState<S, I>>,
) -> Result<Json<Vec<T>>, ApiError>
where
    T: Entity,
    S: EntityStore<T> + 'static,
    I: Send + Sync + 'static,
{
    log::debug!("REST request to get all {}", T::RESOURCE);
    Ok(Json(state.store.find_all().await?))
}

/// GET /api/{resource}/{id}
pub async fn get_entity<T, S, I>(
    Path(id): Path<Id>,
    State(state): State<AppState<S, I>>,
) -> Result<Json<T>, ApiError>
where
    T: Entity,
    S: EntityStore<T> + 'static,
    I: Send + Sync + 'static,
{
    log::debug!("REST request to get {} : {}", T::ENTITY_NAME, id);
    state
        .store
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(T::ENTITY_NAME, id))
}

/// DELETE /api/{resource}/{id}
pub async fn delete_entity<T, S, I>(
    Path(id): Path<Id>,
    State(state): State<AppState<S, I>>,
) -> Result<(StatusCode, HeaderMap), ApiError>
where
    T: Entity,
    S: Store + EntityStore<T> + 'static,
    I: Index + SearchIndex<T> + 'static,
{
    log::debug!("REST request to delete {} : {}", T::ENTITY_NAME, id);
    let detached = EntityStore::<T>::delete_by_id(&state.store, id).await?;
    if let Err(e) = SearchIndex::<T>::delete_by_id(&state.index, id).await {
        log::warn!(
            "Failed to remove {} {} from the search index: {:#}",
            T::ENTITY_NAME,
            id,
            e
        );
    }
    state.mirror_detached(&detached).await;

    Ok((StatusCode::NO_CONTENT, state.alerts.deleted(T::ENTITY_NAME, id)))
}

/// GET /api/_search/{resource}?query=
pub async fn search_entities<T, S, I>(
    Query(params): Query<SearchQuery>,
    State(state): State<AppState<S, I>>,
) -> Result<Json<Vec<T>>, ApiError>
where
    T: Entity,
    S: Send + Sync + 'static,
    I: SearchIndex<T> + 'static,
{
    log::debug!(
        "REST request to search {} for query {}",
        T::RESOURCE,
        params.query
    );
    let hits = state
        .index
        .search(&params.query)
        .await
        .map_err(|e| match e.downcast::<QueryRejected>() {
            Ok(rejected) => ApiError::InvalidQuery(rejected.reason),
            Err(e) => ApiError::IndexUnavailable(e),
        })?;

    Ok(Json(hits.collect()))
}
