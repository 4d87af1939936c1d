//! JSON file request store
//!
//! The whole collection lives in one JSON array. It is loaded on first access
//! and rewritten in full after every mutation. A mutation is applied to a copy
//! of the table and only becomes visible once the file write succeeded, so a
//! failed flush leaves both the file and the in-memory table untouched.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ListScope, RequestStore, RequestTable, StoreError};
use crate::domain::Request;

pub struct JsonFileStore {
    path: PathBuf,
    // None until the file has been read
    table: Mutex<Option<RequestTable>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: Mutex::new(None),
        }
    }

    async fn load(path: &Path) -> Result<RequestTable, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(RequestTable::default()),
            Ok(bytes) => {
                let rows: Vec<Request> = serde_json::from_slice(&bytes)?;
                tracing::debug!(path = %path.display(), count = rows.len(), "Loaded requests file");
                Ok(RequestTable::from_rows(rows))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Requests file missing, starting empty");
                Ok(RequestTable::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn flush(&self, table: &RequestTable) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(table.rows())?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Run `op` against a copy of the table and commit it after a successful flush.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut RequestTable) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.table.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await?);
        }
        let current = guard.as_ref().ok_or_else(|| {
            StoreError::Corrupt("requests table missing after load".to_string())
        })?;

        let mut next = current.clone();
        let (value, changed) = op(&mut next)?;
        if changed {
            if let Err(e) = self.flush(&next).await {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to flush requests file");
                return Err(e);
            }
            *guard = Some(next);
        }
        Ok(value)
    }

    async fn read<T>(&self, op: impl FnOnce(&RequestTable) -> T) -> Result<T, StoreError> {
        let mut guard = self.table.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await?);
        }
        match guard.as_ref() {
            Some(table) => Ok(op(table)),
            None => Err(StoreError::Corrupt(
                "requests table missing after load".to_string(),
            )),
        }
    }
}

#[async_trait]
impl RequestStore for JsonFileStore {
    async fn insert(&self, request: Request) -> Result<Request, StoreError> {
        self.mutate(|table| table.insert(request).map(|r| (r, true)))
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Request>, StoreError> {
        self.read(|table| table.get(id)).await
    }

    async fn list(&self, scope: &ListScope) -> Result<Vec<Request>, StoreError> {
        self.read(|table| table.list(scope)).await
    }

    async fn replace(
        &self,
        request: Request,
        expected_version: i64,
    ) -> Result<Request, StoreError> {
        self.mutate(|table| table.replace(request, expected_version).map(|r| (r, true)))
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.mutate(|table| {
            let removed = table.delete(id);
            Ok((removed, removed))
        })
        .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.read(|_| ()).await
    }
}
