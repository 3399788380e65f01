use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::model::{Application, Entity, Instance, WmisComponent};
use crate::search::{Index, SearchIndex};
use crate::store::traits::{EntityStore, Store};

pub fn create_router<S: Store + 'static, I: Index + 'static>() -> Router<AppState<S, I>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .merge(entity_routes::<Application, S, I>())
        .merge(entity_routes::<Instance, S, I>())
        .merge(entity_routes::<WmisComponent, S, I>())
}

/// CRUD and search endpoints for one entity type, rooted at `/api/{resource}`.
fn entity_routes<T, S, I>() -> Router<AppState<S, I>>
where
    T: Entity,
    S: Store + EntityStore<T> + 'static,
    I: Index + SearchIndex<T> + 'static,
{
    let collection = format!("/api/{}", T::RESOURCE);
    let item = format!("/api/{}/:id", T::RESOURCE);
    let search = format!("/api/_search/{}", T::RESOURCE);

    Router::new()
        .route(
            &collection,
            post(handlers::create_entity::<T, S, I>).get(handlers::list_entities::<T, S, I>),
        )
        .route(
            &item,
            get(handlers::get_entity::<T, S, I>)
                .put(handlers::update_entity::<T, S, I>)
                .patch(handlers::partial_update_entity::<T, S, I>)
                .delete(handlers::delete_entity::<T, S, I>),
        )
        .route(&search, get(handlers::search_entities::<T, S, I>))
}
