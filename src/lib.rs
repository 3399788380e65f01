pub mod api;
pub mod config;
pub mod model;
pub mod search;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;
pub use api::{Alerts, ApiError, AppState, Services};

// Export all model types
pub use model::*;

// Export store and index types
pub use search::{ElasticsearchIndex, InMemoryIndex, Index, SearchIndex};
pub use store::{Detached, EntityStore, InMemoryStore, PostgresStore, Store};

/// Wire a store and an index into the full HTTP application.
pub fn build_app<S, I>(store: S, index: I, alerts: Alerts) -> axum::Router
where
    S: Store + 'static,
    I: Index + 'static,
{
    let services = std::sync::Arc::new(Services::new(store, index, alerts));
    routes::create_router().with_state(services)
}
