pub mod elasticsearch;
pub mod memory;
pub mod query;
pub mod traits;

pub use elasticsearch::*;
pub use memory::*;
pub use traits::*;

use anyhow::{Context, Result};

use crate::model::{Entity, Id};
use crate::store::EntityStore;

/// Mirror the stored row for `entity` into the index.
///
/// The row is re-read from the store instead of trusting the caller's copy,
/// so only durably written state reaches the index. Returns `false` when the
/// row no longer exists and nothing was written.
pub async fn index<T, S, I>(store: &S, index: &I, entity: &T) -> Result<bool>
where
    T: Entity,
    S: EntityStore<T> + ?Sized,
    I: SearchIndex<T> + ?Sized,
{
    let id = entity
        .id()
        .with_context(|| format!("Cannot index an unsaved {}", T::ENTITY_NAME))?;

    index_by_id::<T, S, I>(store, index, id).await
}

/// Same as [`index`] for a row known only by id.
pub async fn index_by_id<T, S, I>(store: &S, index: &I, id: Id) -> Result<bool>
where
    T: Entity,
    S: EntityStore<T> + ?Sized,
    I: SearchIndex<T> + ?Sized,
{
    match store.find_by_id(id).await? {
        Some(current) => {
            index.save(&current).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Rebuild the index for `T` from the store. Returns the number of documents written.
pub async fn reindex<T, S, I>(store: &S, index: &I) -> Result<usize>
where
    T: Entity,
    S: EntityStore<T> + ?Sized,
    I: SearchIndex<T> + ?Sized,
{
    index.delete_all().await?;

    let rows = store.find_all().await?;
    for row in &rows {
        index.save(row).await?;
    }
    log::info!("Reindexed {} {} documents", rows.len(), T::ENTITY_NAME);

    Ok(rows.len())
}
