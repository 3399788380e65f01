use crate::model::{Application, Entity, Id, Instance, WmisComponent};
use anyhow::Result;

/// Authoritative persistence for one entity type.
#[async_trait::async_trait]
pub trait EntityStore<T: Entity>: Send + Sync {
    /// Insert a new row; the store assigns the id. Fails if `entity` already has one.
    async fn create(&self, entity: T) -> Result<T>;
    async fn exists_by_id(&self, id: Id) -> Result<bool>;
    async fn find_by_id(&self, id: Id) -> Result<Option<T>>;
    /// All rows ordered by id.
    async fn find_all(&self) -> Result<Vec<T>>;
    /// Upsert by id. An entity without id is inserted as by `create`.
    async fn save(&self, entity: T) -> Result<T>;
    /// Absent ids are not an error. Returns the child rows whose reference
    /// to the deleted row was cleared.
    async fn delete_by_id(&self, id: Id) -> Result<Detached>;
}

/// Children left without a parent by a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detached {
    pub instances: Vec<Id>,
    pub components: Vec<Id>,
}

impl Detached {
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.components.is_empty()
    }
}

pub trait Store:
    EntityStore<Application> + EntityStore<Instance> + EntityStore<WmisComponent> + Send + Sync
{
}

impl<T> Store for T where
    T: EntityStore<Application> + EntityStore<Instance> + EntityStore<WmisComponent> + Send + Sync
{
}

pub(crate) fn ensure_unsaved<T: Entity>(entity: &T) -> Result<()> {
    if let Some(id) = entity.id() {
        anyhow::bail!(
            "A new {} cannot already have an ID (got {})",
            T::ENTITY_NAME,
            id
        );
    }
    Ok(())
}
