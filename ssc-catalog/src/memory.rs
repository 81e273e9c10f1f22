//! In-memory catalog for tests and offline runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use ssc_core::{
    CatalogSnapshot, ObjectType, SqlColumn, SqlDataResult, SqlForeignKey, SqlIndex, SqlJob,
    SqlJobSchedule, SqlJobStep, SqlObject, SqlPermission, SqlPrimaryKey, SqlTable, SqlType,
};

use crate::{Catalog, CatalogError, CatalogSession};

#[derive(Debug, Default)]
struct Shared {
    snapshot: RwLock<CatalogSnapshot>,
    delay: RwLock<Option<Duration>>,
    fail_close: AtomicBool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    queries: AtomicUsize,
}

/// A catalog serving rows from memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    shared: Arc<Shared>,
}

impl MemoryCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        let catalog = Self::default();
        *write(&catalog.shared.snapshot) = snapshot;
        catalog
    }

    /// Insert or replace an object, keyed by schema, name and type.
    pub fn upsert(&self, object: SqlObject) {
        let mut snapshot = write(&self.shared.snapshot);
        snapshot.objects.retain(|o| {
            !(o.schema == object.schema && o.name == object.name && o.type_code == object.type_code)
        });
        snapshot.objects.push(object);
    }

    pub fn grant(&self, permission: SqlPermission) {
        write(&self.shared.snapshot).permissions.push(permission);
    }

    /// Delay every query by `delay`; used to exercise request timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *write(&self.shared.delay) = delay;
    }

    /// Make every session close report an error (the session still counts as closed).
    pub fn set_fail_close(&self, fail: bool) {
        self.shared.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Queries issued across all sessions.
    pub fn queries_issued(&self) -> usize {
        self.shared.queries.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed.
    pub fn sessions_open(&self) -> usize {
        self.sessions_opened() - self.shared.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn connect(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession { shared: Arc::clone(&self.shared) }))
    }
}

struct MemorySession {
    shared: Arc<Shared>,
}

impl MemorySession {
    /// Count the query, honour the delay, then clone rows out of the snapshot.
    async fn rows<T: Clone>(
        &self,
        pick: impl FnOnce(&CatalogSnapshot) -> &Vec<T>,
    ) -> Result<Vec<T>, CatalogError> {
        self.shared.queries.fetch_add(1, Ordering::SeqCst);
        let delay = *read(&self.shared.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(pick(&read(&self.shared.snapshot)).clone())
    }
}

#[async_trait]
impl CatalogSession for MemorySession {
    async fn object(
        &self,
        object_type: ObjectType,
        name: &str,
    ) -> Result<Vec<SqlObject>, CatalogError> {
        let objects = self.rows(|s| &s.objects).await?;
        Ok(objects
            .into_iter()
            .filter(|o| o.object_type() == Some(object_type) && o.name.eq_ignore_ascii_case(name))
            .collect())
    }

    async fn objects(&self) -> Result<Vec<SqlObject>, CatalogError> {
        self.rows(|s| &s.objects).await
    }

    async fn permissions(&self) -> Result<Vec<SqlPermission>, CatalogError> {
        self.rows(|s| &s.permissions).await
    }

    async fn tables(&self) -> Result<Vec<SqlTable>, CatalogError> {
        self.rows(|s| &s.tables).await
    }

    async fn columns(&self) -> Result<Vec<SqlColumn>, CatalogError> {
        self.rows(|s| &s.columns).await
    }

    async fn primary_keys(&self) -> Result<Vec<SqlPrimaryKey>, CatalogError> {
        self.rows(|s| &s.primary_keys).await
    }

    async fn foreign_keys(&self) -> Result<Vec<SqlForeignKey>, CatalogError> {
        self.rows(|s| &s.foreign_keys).await
    }

    async fn indexes(&self) -> Result<Vec<SqlIndex>, CatalogError> {
        self.rows(|s| &s.indexes).await
    }

    async fn types(&self) -> Result<Vec<SqlType>, CatalogError> {
        self.rows(|s| &s.types).await
    }

    async fn jobs(&self) -> Result<Vec<SqlJob>, CatalogError> {
        self.rows(|s| &s.jobs).await
    }

    async fn job_steps(&self) -> Result<Vec<SqlJobStep>, CatalogError> {
        self.rows(|s| &s.job_steps).await
    }

    async fn job_schedules(&self) -> Result<Vec<SqlJobSchedule>, CatalogError> {
        self.rows(|s| &s.job_schedules).await
    }

    async fn data(&self, table: &SqlTable) -> Result<Option<SqlDataResult>, CatalogError> {
        let data = self.rows(|s| &s.data).await?;
        Ok(data
            .into_iter()
            .find(|d| d.schema == table.schema && d.name == table.name))
    }

    async fn close(self: Box<Self>) -> Result<(), CatalogError> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_close.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("session close failed".to_string()));
        }
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
