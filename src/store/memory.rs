//! In-process request store

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{ListScope, RequestStore, RequestTable, StoreError};
use crate::domain::Request;

/// Volatile store, one per constructed instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<RequestTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert(&self, request: Request) -> Result<Request, StoreError> {
        self.table.write().insert(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Request>, StoreError> {
        Ok(self.table.read().get(id))
    }

    async fn list(&self, scope: &ListScope) -> Result<Vec<Request>, StoreError> {
        Ok(self.table.read().list(scope))
    }

    async fn replace(
        &self,
        request: Request,
        expected_version: i64,
    ) -> Result<Request, StoreError> {
        self.table.write().replace(request, expected_version)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.table.write().delete(id))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
