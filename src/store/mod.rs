//! Request persistence
//!
//! Every backend implements [`RequestStore`]. Writes after creation go through
//! [`RequestStore::replace`], which only succeeds when the caller read the
//! version that is currently stored.

pub mod json;
pub mod memory;
pub mod postgres;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use postgres::PgRequestStore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Settings, StorageBackend};
use crate::db;
use crate::domain::Request;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request {0} not found")]
    NotFound(Uuid),

    #[error("request {0} already exists")]
    DuplicateId(Uuid),

    #[error("request {id} changed concurrently (expected version {expected}, found {actual})")]
    VersionConflict { id: Uuid, expected: i64, actual: i64 },

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("storage file error")]
    Io(#[from] std::io::Error),

    #[error("stored data could not be (de)serialized")]
    Serialization(#[from] serde_json::Error),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
}

/// Which records a list operation returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    All,
    User(Uuid),
    /// Requests where any item belongs to the vendor
    Vendor(String),
    /// The user's own requests, plus guest requests when `include_guests`
    Buyer { user_id: Uuid, include_guests: bool },
}

impl ListScope {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Self::All => true,
            Self::User(user_id) => request.user_id == Some(*user_id),
            Self::Vendor(vendor_id) => request.has_vendor(vendor_id),
            Self::Buyer {
                user_id,
                include_guests,
            } => match request.user_id {
                Some(owner) => owner == *user_id,
                None => *include_guests,
            },
        }
    }
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Persist a new record. Fails with `DuplicateId` if the id is taken.
    async fn insert(&self, request: Request) -> Result<Request, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Request>, StoreError>;

    /// Newest `created_at` first; equal timestamps keep insertion order.
    async fn list(&self, scope: &ListScope) -> Result<Vec<Request>, StoreError>;

    /// Overwrite the whole record if its stored version equals
    /// `expected_version`. The stored copy gets `expected_version + 1`.
    async fn replace(&self, request: Request, expected_version: i64)
        -> Result<Request, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Insertion-ordered table shared by the in-process backends.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestTable {
    rows: Vec<Request>,
}

impl RequestTable {
    pub(crate) fn from_rows(rows: Vec<Request>) -> Self {
        Self { rows }
    }

    pub(crate) fn rows(&self) -> &[Request] {
        &self.rows
    }

    pub(crate) fn insert(&mut self, request: Request) -> Result<Request, StoreError> {
        if self.rows.iter().any(|row| row.id == request.id) {
            return Err(StoreError::DuplicateId(request.id));
        }
        self.rows.push(request.clone());
        Ok(request)
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<Request> {
        self.rows.iter().find(|row| row.id == id).cloned()
    }

    pub(crate) fn list(&self, scope: &ListScope) -> Vec<Request> {
        let mut found: Vec<Request> = self
            .rows
            .iter()
            .filter(|row| scope.matches(row))
            .cloned()
            .collect();
        // stable sort keeps insertion order among equal timestamps
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    pub(crate) fn replace(
        &mut self,
        mut request: Request,
        expected_version: i64,
    ) -> Result<Request, StoreError> {
        let slot = self
            .rows
            .iter_mut()
            .find(|row| row.id == request.id)
            .ok_or(StoreError::NotFound(request.id))?;

        if slot.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: request.id,
                expected: expected_version,
                actual: slot.version,
            });
        }

        request.version = expected_version + 1;
        *slot = request.clone();
        Ok(request)
    }

    pub(crate) fn delete(&mut self, id: Uuid) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        self.rows.len() != before
    }
}

/// Build the store selected by `STORAGE_BACKEND`.
pub async fn connect(settings: &Settings) -> Result<Arc<dyn RequestStore>> {
    let store: Arc<dyn RequestStore> = match settings.storage_backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Json => Arc::new(JsonFileStore::new(settings.requests_file.clone())),
        StorageBackend::Postgres => {
            let pool = db::create_pool(settings).await?;
            db::run_migrations(&pool)
                .await
                .context("Failed to apply database migrations")?;
            Arc::new(PgRequestStore::new(pool))
        }
    };

    tracing::info!(backend = ?settings.storage_backend, "Request store ready");
    Ok(store)
}
