use anyhow::{bail, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::model::{Application, ApplicationRef, Id, Instance, InstanceRef, WmisComponent};
use crate::store::traits::{ensure_unsaved, Detached, EntityStore};

/// Process-local store with the same row semantics as `PostgresStore`:
/// one shared id sequence, foreign keys checked on write, parent references
/// resolved on read and nulled when the parent row is deleted.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    sequence: Id,
    applications: BTreeMap<Id, Application>,
    instances: BTreeMap<Id, Instance>,
    components: BTreeMap<Id, WmisComponent>,
}

impl Tables {
    fn id_for(&mut self, id: Option<Id>) -> Id {
        match id {
            Some(id) => {
                self.sequence = self.sequence.max(id);
                id
            }
            None => {
                self.sequence += 1;
                self.sequence
            }
        }
    }

    fn application_ref(&self, reference: Option<&ApplicationRef>) -> Result<Option<ApplicationRef>> {
        let Some(id) = reference.and_then(|r| r.id) else {
            return Ok(None);
        };
        match self.applications.get(&id) {
            Some(application) => Ok(Some(application.to_ref())),
            None => bail!("application {} does not exist", id),
        }
    }

    fn instance_ref(&self, reference: Option<&InstanceRef>) -> Result<Option<InstanceRef>> {
        let Some(id) = reference.and_then(|r| r.id) else {
            return Ok(None);
        };
        match self.instances.get(&id) {
            Some(instance) => Ok(Some(instance.to_ref())),
            None => bail!("instance {} does not exist", id),
        }
    }

    // Rows keep only the parent id; the rest of the reference is joined on read.
    fn read_instance(&self, row: &Instance) -> Instance {
        let mut instance = row.clone();
        instance.application = row.application.as_ref().map(|r| {
            self.applications
                .get(&r.id.unwrap_or_default())
                .map(Application::to_ref)
                .unwrap_or_else(|| r.clone())
        });
        instance
    }

    fn read_component(&self, row: &WmisComponent) -> WmisComponent {
        let mut component = row.clone();
        component.instance = row.instance.as_ref().map(|r| {
            self.instances
                .get(&r.id.unwrap_or_default())
                .map(Instance::to_ref)
                .unwrap_or_else(|| r.clone())
        });
        component
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EntityStore<Application> for InMemoryStore {
    async fn create(&self, entity: Application) -> Result<Application> {
        ensure_unsaved(&entity)?;
        EntityStore::<Application>::save(self, entity).await
    }

    async fn exists_by_id(&self, id: Id) -> Result<bool> {
        Ok(self.tables.read().applications.contains_key(&id))
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<Application>> {
        Ok(self.tables.read().applications.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Application>> {
        Ok(self.tables.read().applications.values().cloned().collect())
    }

    async fn save(&self, mut entity: Application) -> Result<Application> {
        let mut tables = self.tables.write();
        let id = tables.id_for(entity.id);
        entity.id = Some(id);

        let mut row = Application::default();
        row.id = entity.id;
        row.application_name = entity.application_name.clone();
        tables.applications.insert(id, row);

        Ok(entity)
    }

    async fn delete_by_id(&self, id: Id) -> Result<Detached> {
        let mut tables = self.tables.write();
        let mut detached = Detached::default();
        if tables.applications.remove(&id).is_some() {
            for (child_id, instance) in tables.instances.iter_mut() {
                if instance.application.as_ref().and_then(|a| a.id) == Some(id) {
                    instance.application = None;
                    detached.instances.push(*child_id);
                }
            }
        }
        Ok(detached)
    }
}

#[async_trait::async_trait]
impl EntityStore<Instance> for InMemoryStore {
    async fn create(&self, entity: Instance) -> Result<Instance> {
        ensure_unsaved(&entity)?;
        EntityStore::<Instance>::save(self, entity).await
    }

    async fn exists_by_id(&self, id: Id) -> Result<bool> {
        Ok(self.tables.read().instances.contains_key(&id))
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<Instance>> {
        let tables = self.tables.read();
        Ok(tables.instances.get(&id).map(|row| tables.read_instance(row)))
    }

    async fn find_all(&self) -> Result<Vec<Instance>> {
        let tables = self.tables.read();
        Ok(tables
            .instances
            .values()
            .map(|row| tables.read_instance(row))
            .collect())
    }

    async fn save(&self, mut entity: Instance) -> Result<Instance> {
        let mut tables = self.tables.write();
        let application = tables.application_ref(entity.application.as_ref())?;
        let id = tables.id_for(entity.id);
        entity.id = Some(id);

        let mut row = Instance::default();
        row.id = entity.id;
        row.country_name = entity.country_name.clone();
        row.application = application;
        tables.instances.insert(id, row);

        Ok(entity)
    }

    async fn delete_by_id(&self, id: Id) -> Result<Detached> {
        let mut tables = self.tables.write();
        let mut detached = Detached::default();
        if tables.instances.remove(&id).is_some() {
            for (child_id, component) in tables.components.iter_mut() {
                if component.instance.as_ref().and_then(|i| i.id) == Some(id) {
                    component.instance = None;
                    detached.components.push(*child_id);
                }
            }
        }
        Ok(detached)
    }
}

#[async_trait::async_trait]
impl EntityStore<WmisComponent> for InMemoryStore {
    async fn create(&self, entity: WmisComponent) -> Result<WmisComponent> {
        ensure_unsaved(&entity)?;
        EntityStore::<WmisComponent>::save(self, entity).await
    }

    async fn exists_by_id(&self, id: Id) -> Result<bool> {
        Ok(self.tables.read().components.contains_key(&id))
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<WmisComponent>> {
        let tables = self.tables.read();
        Ok(tables.components.get(&id).map(|row| tables.read_component(row)))
    }

    async fn find_all(&self) -> Result<Vec<WmisComponent>> {
        let tables = self.tables.read();
        Ok(tables
            .components
            .values()
            .map(|row| tables.read_component(row))
            .collect())
    }

    async fn save(&self, mut entity: WmisComponent) -> Result<WmisComponent> {
        let mut tables = self.tables.write();
        let instance = tables.instance_ref(entity.instance.as_ref())?;
        let id = tables.id_for(entity.id);
        entity.id = Some(id);

        let row = WmisComponent {
            instance,
            ..entity.clone()
        };
        tables.components.insert(id, row);

        Ok(entity)
    }

    async fn delete_by_id(&self, id: Id) -> Result<Detached> {
        self.tables.write().components.remove(&id);
        Ok(Detached::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_sequential_ids_across_types() {
        let store = InMemoryStore::new();

        let application = store.create(Application::new("portal")).await.unwrap();
        let instance = store.create(Instance::new("Norway")).await.unwrap();

        assert_eq!(application.id, Some(1));
        assert_eq!(instance.id, Some(2));
    }

    #[tokio::test]
    async fn create_rejects_preset_identifier() {
        let store = InMemoryStore::new();

        let result = store.create(Application::new("portal").with_id(1)).await;

        assert!(result.is_err());
        assert!(EntityStore::<Application>::find_all(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn created_row_is_found_by_id() {
        let store = InMemoryStore::new();
        let created = store
            .create(WmisComponent::new("AAAAAAAAAA", "AAAAAAAAAA"))
            .await
            .unwrap();

        let found: Option<WmisComponent> = store.find_by_id(created.id.unwrap()).await.unwrap();

        let found = found.unwrap();
        assert_eq!(found, created);
        assert_eq!(found.component_name.as_deref(), Some("AAAAAAAAAA"));
    }

    #[tokio::test]
    async fn save_upserts_unknown_identifier() {
        let store = InMemoryStore::new();

        store.save(Application::new("portal").with_id(50)).await.unwrap();
        let next = store.create(Application::new("intranet")).await.unwrap();

        assert!(EntityStore::<Application>::exists_by_id(&store, 50).await.unwrap());
        assert_eq!(next.id, Some(51));
    }

    #[tokio::test]
    async fn save_does_not_persist_inverse_collection() {
        let store = InMemoryStore::new();
        let mut application = Application::new("portal");
        application.add_instance(Instance::new("Norway").with_id(9));

        let saved = store.create(application).await.unwrap();
        let found: Application = store.find_by_id(saved.id.unwrap()).await.unwrap().unwrap();

        assert!(found.instances().is_empty());
    }

    #[tokio::test]
    async fn reads_resolve_current_parent_attributes() {
        let store = InMemoryStore::new();
        let application = store.create(Application::new("portal")).await.unwrap();
        let mut instance = Instance::new("Norway");
        instance.set_application(Some(&application));
        let instance = store.create(instance).await.unwrap();

        let mut renamed = application.clone();
        renamed.application_name = Some("intranet".to_string());
        store.save(renamed).await.unwrap();

        let found: Instance = store.find_by_id(instance.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(
            found.application.and_then(|a| a.application_name).as_deref(),
            Some("intranet")
        );
    }

    #[tokio::test]
    async fn save_rejects_unknown_parent() {
        let store = InMemoryStore::new();
        let mut component = WmisComponent::new("kernel", "core");
        component.instance = Some(InstanceRef {
            id: Some(404),
            country_name: None,
        });

        assert!(store.create(component).await.is_err());
    }

    #[tokio::test]
    async fn deleting_parent_nulls_child_reference() {
        let store = InMemoryStore::new();
        let application = store.create(Application::new("portal")).await.unwrap();
        let mut instance = Instance::new("Norway");
        instance.set_application(Some(&application));
        let instance = store.create(instance).await.unwrap();

        let detached = EntityStore::<Application>::delete_by_id(&store, application.id.unwrap())
            .await
            .unwrap();

        assert_eq!(detached.instances, vec![instance.id.unwrap()]);
        let found: Instance = store.find_by_id(instance.id.unwrap()).await.unwrap().unwrap();
        assert!(found.application.is_none());
    }

    #[tokio::test]
    async fn deleting_instance_reports_detached_components() {
        let store = InMemoryStore::new();
        let instance = store.create(Instance::new("Norway")).await.unwrap();
        let mut attached = WmisComponent::new("kernel", "core");
        attached.set_instance(Some(&instance));
        let attached = store.create(attached).await.unwrap();
        store.create(WmisComponent::new("loose", "none")).await.unwrap();

        let detached = EntityStore::<Instance>::delete_by_id(&store, instance.id.unwrap())
            .await
            .unwrap();

        assert_eq!(detached.components, vec![attached.id.unwrap()]);
        assert!(detached.instances.is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_id_is_not_an_error() {
        let store = InMemoryStore::new();
        let detached = EntityStore::<WmisComponent>::delete_by_id(&store, 12)
            .await
            .unwrap();
        assert!(detached.is_empty());
    }
}
