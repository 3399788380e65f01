use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Row,
};

use crate::model::{Application, ApplicationRef, Id, Instance, InstanceRef, WmisComponent};
use crate::store::traits::{ensure_unsaved, Detached, EntityStore};

const SELECT_APPLICATIONS: &str = "SELECT id, application_name FROM application";

const SELECT_INSTANCES: &str = r#"
    SELECT i.id, i.country_name, i.application_id, a.application_name
    FROM instance i
    LEFT JOIN application a ON a.id = i.application_id
"#;

const SELECT_COMPONENTS: &str = r#"
    SELECT c.id, c.component_name, c.description, c.instance_id, i.country_name
    FROM wmis_component c
    LEFT JOIN instance i ON i.id = c.instance_id
"#;

const INSERT_APPLICATION: &str =
    "INSERT INTO application (id, application_name) VALUES ($1, $2)";

const UPSERT_APPLICATION: &str = r#"
    INSERT INTO application (id, application_name) VALUES ($1, $2)
    ON CONFLICT (id) DO UPDATE SET
        application_name = EXCLUDED.application_name
"#;

const INSERT_INSTANCE: &str =
    "INSERT INTO instance (id, country_name, application_id) VALUES ($1, $2, $3)";

const UPSERT_INSTANCE: &str = r#"
    INSERT INTO instance (id, country_name, application_id) VALUES ($1, $2, $3)
    ON CONFLICT (id) DO UPDATE SET
        country_name = EXCLUDED.country_name,
        application_id = EXCLUDED.application_id
"#;

const INSERT_COMPONENT: &str = r#"
    INSERT INTO wmis_component (id, component_name, description, instance_id)
    VALUES ($1, $2, $3, $4)
"#;

const UPSERT_COMPONENT: &str = r#"
    INSERT INTO wmis_component (id, component_name, description, instance_id)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (id) DO UPDATE SET
        component_name = EXCLUDED.component_name,
        description = EXCLUDED.description,
        instance_id = EXCLUDED.instance_id
"#;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ids come from one sequence shared by every table.
    async fn next_id(&self) -> Result<Id> {
        sqlx::query_scalar::<_, Id>("SELECT nextval('sequence_generator')")
            .fetch_one(&self.pool)
            .await
            .context("Failed to allocate identifier")
    }

    /// Id for an upsert. An explicit id moves the sequence past it so a
    /// later `create` never lands on the same row.
    async fn id_for(&self, id: Option<Id>) -> Result<Id> {
        let Some(id) = id else {
            return self.next_id().await;
        };

        sqlx::query(
            "SELECT setval('sequence_generator', GREATEST($1, (SELECT last_value FROM sequence_generator)))",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to advance identifier sequence")?;
        Ok(id)
    }

    async fn exists_in(&self, sql: &str, id: Id) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check row existence")
    }

    /// Clear child references with `detach_sql` (returning the child ids),
    /// then delete the row, in one transaction.
    async fn detach_and_delete(&self, detach_sql: &str, delete_sql: &str, id: Id) -> Result<Vec<Id>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let children = sqlx::query_scalar::<_, Id>(detach_sql)
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .context("Failed to detach child rows")?;

        sqlx::query(delete_sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete row")?;

        tx.commit().await.context("Failed to commit delete")?;
        Ok(children)
    }

    async fn insert_application(&self, sql: &str, id: Id, entity: &Application) -> Result<()> {
        sqlx::query(sql)
            .bind(id)
            .bind(&entity.application_name)
            .execute(&self.pool)
            .await
            .context("Failed to save application")?;
        Ok(())
    }

    async fn insert_instance(&self, sql: &str, id: Id, entity: &Instance) -> Result<()> {
        sqlx::query(sql)
            .bind(id)
            .bind(&entity.country_name)
            .bind(entity.application.as_ref().and_then(|a| a.id))
            .execute(&self.pool)
            .await
            .context("Failed to save instance")?;
        Ok(())
    }

    async fn insert_component(&self, sql: &str, id: Id, entity: &WmisComponent) -> Result<()> {
        sqlx::query(sql)
            .bind(id)
            .bind(&entity.component_name)
            .bind(&entity.description)
            .bind(entity.instance.as_ref().and_then(|i| i.id))
            .execute(&self.pool)
            .await
            .context("Failed to save WMIS component")?;
        Ok(())
    }
}

fn application_from_row(row: &PgRow) -> Result<Application, sqlx::Error> {
    let mut application = Application::default();
    application.id = Some(row.try_get("id")?);
    application.application_name = row.try_get("application_name")?;
    Ok(application)
}

fn instance_from_row(row: &PgRow) -> Result<Instance, sqlx::Error> {
    let application_id: Option<Id> = row.try_get("application_id")?;
    let application_name: Option<String> = row.try_get("application_name")?;

    let mut instance = Instance::default();
    instance.id = Some(row.try_get("id")?);
    instance.country_name = row.try_get("country_name")?;
    instance.application = application_id.map(|id| ApplicationRef {
        id: Some(id),
        application_name,
    });
    Ok(instance)
}

fn component_from_row(row: &PgRow) -> Result<WmisComponent, sqlx::Error> {
    let instance_id: Option<Id> = row.try_get("instance_id")?;
    let country_name: Option<String> = row.try_get("country_name")?;

    Ok(WmisComponent {
        id: Some(row.try_get("id")?),
        component_name: row.try_get("component_name")?,
        description: row.try_get("description")?,
        instance: instance_id.map(|id| InstanceRef {
            id: Some(id),
            country_name,
        }),
    })
}

#[async_trait::async_trait]
impl EntityStore<Application> for PostgresStore {
    async fn create(&self, mut entity: Application) -> Result<Application> {
        ensure_unsaved(&entity)?;
        let id = self.next_id().await?;
        self.insert_application(INSERT_APPLICATION, id, &entity).await?;

        entity.id = Some(id);
        Ok(entity)
    }

    async fn exists_by_id(&self, id: Id) -> Result<bool> {
        self.exists_in("SELECT EXISTS(SELECT 1 FROM application WHERE id = $1)", id)
            .await
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<Application>> {
        let row = sqlx::query("SELECT id, application_name FROM application WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch application")?;

        row.as_ref()
            .map(application_from_row)
            .transpose()
            .context("Failed to decode application")
    }

    async fn find_all(&self) -> Result<Vec<Application>> {
        let rows = sqlx::query(&format!("{SELECT_APPLICATIONS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list applications")?;

        rows.iter()
            .map(application_from_row)
            .collect::<Result<_, _>>()
            .context("Failed to decode applications")
    }

    async fn save(&self, mut entity: Application) -> Result<Application> {
        let id = self.id_for(entity.id).await?;
        self.insert_application(UPSERT_APPLICATION, id, &entity).await?;

        entity.id = Some(id);
        Ok(entity)
    }

    async fn delete_by_id(&self, id: Id) -> Result<Detached> {
        let instances = self
            .detach_and_delete(
                "UPDATE instance SET application_id = NULL WHERE application_id = $1 RETURNING id",
                "DELETE FROM application WHERE id = $1",
                id,
            )
            .await?;

        Ok(Detached {
            instances,
            ..Detached::default()
        })
    }
}

#[async_trait::async_trait]
impl EntityStore<Instance> for PostgresStore {
    async fn create(&self, mut entity: Instance) -> Result<Instance> {
        ensure_unsaved(&entity)?;
        let id = self.next_id().await?;
        self.insert_instance(INSERT_INSTANCE, id, &entity).await?;

        entity.id = Some(id);
        Ok(entity)
    }

    async fn exists_by_id(&self, id: Id) -> Result<bool> {
        self.exists_in("SELECT EXISTS(SELECT 1 FROM instance WHERE id = $1)", id)
            .await
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<Instance>> {
        let row = sqlx::query(&format!("{SELECT_INSTANCES} WHERE i.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch instance")?;

        row.as_ref()
            .map(instance_from_row)
            .transpose()
            .context("Failed to decode instance")
    }

    async fn find_all(&self) -> Result<Vec<Instance>> {
        let rows = sqlx::query(&format!("{SELECT_INSTANCES} ORDER BY i.id"))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list instances")?;

        rows.iter()
            .map(instance_from_row)
            .collect::<Result<_, _>>()
            .context("Failed to decode instances")
    }

    async fn save(&self, mut entity: Instance) -> Result<Instance> {
        let id = self.id_for(entity.id).await?;
        self.insert_instance(UPSERT_INSTANCE, id, &entity).await?;

        entity.id = Some(id);
        Ok(entity)
    }

    async fn delete_by_id(&self, id: Id) -> Result<Detached> {
        let components = self
            .detach_and_delete(
                "UPDATE wmis_component SET instance_id = NULL WHERE instance_id = $1 RETURNING id",
                "DELETE FROM instance WHERE id = $1",
                id,
            )
            .await?;

        Ok(Detached {
            components,
            ..Detached::default()
        })
    }
}

#[async_trait::async_trait]
impl EntityStore<WmisComponent> for PostgresStore {
    async fn create(&self, mut entity: WmisComponent) -> Result<WmisComponent> {
        ensure_unsaved(&entity)?;
        let id = self.next_id().await?;
        self.insert_component(INSERT_COMPONENT, id, &entity).await?;

        entity.id = Some(id);
        Ok(entity)
    }

    async fn exists_by_id(&self, id: Id) -> Result<bool> {
        self.exists_in(
            "SELECT EXISTS(SELECT 1 FROM wmis_component WHERE id = $1)",
            id,
        )
        .await
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<WmisComponent>> {
        let row = sqlx::query(&format!("{SELECT_COMPONENTS} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch WMIS component")?;

        row.as_ref()
            .map(component_from_row)
            .transpose()
            .context("Failed to decode WMIS component")
    }

    async fn find_all(&self) -> Result<Vec<WmisComponent>> {
        let rows = sqlx::query(&format!("{SELECT_COMPONENTS} ORDER BY c.id"))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list WMIS components")?;

        rows.iter()
            .map(component_from_row)
            .collect::<Result<_, _>>()
            .context("Failed to decode WMIS components")
    }

    async fn save(&self, mut entity: WmisComponent) -> Result<WmisComponent> {
        let id = self.id_for(entity.id).await?;
        self.insert_component(UPSERT_COMPONENT, id, &entity).await?;

        entity.id = Some(id);
        Ok(entity)
    }

    async fn delete_by_id(&self, id: Id) -> Result<Detached> {
        sqlx::query("DELETE FROM wmis_component WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete WMIS component")?;
        Ok(Detached::default())
    }
}
