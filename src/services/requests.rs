//! Request lifecycle service
//!
//! Owns the store handle and applies every change as a versioned
//! read-modify-write: read a copy, apply the transition, write it back only if
//! nobody else wrote in between. Conflicts are retried from a fresh read with
//! exponential backoff, so concurrent vendor responses never overwrite each
//! other.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::domain::{NewRequest, Request, RequestStatus, TransitionError, VendorQuote};
use crate::store::{ListScope, RequestStore, StoreError};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request {0} not found")]
    NotFound(Uuid),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("request {0} is being modified concurrently, try again")]
    Conflict(Uuid),

    #[error("storage failure")]
    Storage(#[source] StoreError),
}

impl From<ValidationErrors> for RequestError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<StoreError> for RequestError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::VersionConflict { id, .. } => Self::Conflict(id),
            other => Self::Storage(other),
        }
    }
}

/// Whether guest (account-less) requests show up in every buyer's list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuestVisibility {
    #[default]
    OwnerOnly,
    AllBuyers,
}

impl GuestVisibility {
    pub fn from_flag(visible_to_buyers: bool) -> Self {
        if visible_to_buyers {
            Self::AllBuyers
        } else {
            Self::OwnerOnly
        }
    }
}

/// Retry budget for conflicting writes
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(5),
            max_elapsed: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn RequestStore>,
    guest_visibility: GuestVisibility,
    retry: RetryPolicy,
}

impl RequestService {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self {
            store,
            guest_visibility: GuestVisibility::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_guest_visibility(mut self, visibility: GuestVisibility) -> Self {
        self.guest_visibility = visibility;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn guest_visibility(&self) -> GuestVisibility {
        self.guest_visibility
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    // --- STORE OPERATIONS ---

    /// Validate and persist a new request with a freshly generated id.
    pub async fn create(&self, new: NewRequest) -> Result<Request, RequestError> {
        new.validate()?;
        if !matches!(new.status, RequestStatus::Draft | RequestStatus::Sent) {
            return Err(RequestError::Validation(format!(
                "a request cannot be created as '{}'",
                new.status
            )));
        }

        let request = self
            .store
            .insert(Request::from_new(new, Utc::now()))
            .await?;

        tracing::info!(
            request_id = %request.id,
            user_id = ?request.user_id,
            items = request.items.len(),
            status = %request.status,
            "Request created"
        );
        Ok(request)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Request>, RequestError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Request>, RequestError> {
        Ok(self.store.list(&ListScope::All).await?)
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Request>, RequestError> {
        Ok(self.store.list(&ListScope::User(user_id)).await?)
    }

    pub async fn list_by_vendor(&self, vendor_id: &str) -> Result<Vec<Request>, RequestError> {
        Ok(self
            .store
            .list(&ListScope::Vendor(vendor_id.to_string()))
            .await?)
    }

    /// Returns whether a record was removed; unknown ids are a no-op.
    pub async fn delete(&self, id: Uuid) -> Result<bool, RequestError> {
        let removed = self.store.delete(id).await?;
        if removed {
            tracing::info!(request_id = %id, "Request deleted");
        }
        Ok(removed)
    }

    // --- STATUS TRANSITIONS ---

    /// A vendor with items in the request opened it.
    pub async fn mark_viewed(&self, id: Uuid, vendor_id: &str) -> Result<Request, RequestError> {
        let now = Utc::now();
        let request = self
            .mutate(id, |request| {
                ensure_vendor_has_items(request, vendor_id)?;
                Ok(request.mark_viewed(now))
            })
            .await?;

        tracing::debug!(request_id = %id, vendor_id, status = %request.status, "Request opened by vendor");
        Ok(request)
    }

    /// Explicit buyer/admin transition (`sent`, `completed`, `cancelled`).
    pub async fn update_status(
        &self,
        id: Uuid,
        target: RequestStatus,
    ) -> Result<Request, RequestError> {
        let now = Utc::now();
        let request = self
            .mutate(id, |request| Ok(request.transition_to(target, now)?))
            .await?;

        tracing::info!(request_id = %id, status = %request.status, "Request status updated");
        Ok(request)
    }

    // --- VENDOR RESPONSES ---

    /// Insert or replace `quote.vendor_id`'s response and mark the request answered.
    pub async fn add_vendor_response(
        &self,
        id: Uuid,
        quote: VendorQuote,
    ) -> Result<Request, RequestError> {
        quote.validate()?;

        let request = self
            .mutate(id, |request| {
                ensure_vendor_has_items(request, &quote.vendor_id)?;
                let now = Utc::now();
                request.upsert_vendor_response(quote.clone().into_response(now), now)?;
                Ok(true)
            })
            .await?;

        tracing::info!(
            request_id = %id,
            vendor_id = %quote.vendor_id,
            unit_price = %quote.unit_price,
            delivery_days = quote.delivery_days,
            responses = request.vendor_responses.len(),
            "Vendor response recorded"
        );
        Ok(request)
    }

    /// Versioned read-modify-write. `apply` returns whether it changed the
    /// record; unchanged records are returned without a write.
    async fn mutate<F>(&self, id: Uuid, mut apply: F) -> Result<Request, RequestError>
    where
        F: FnMut(&mut Request) -> Result<bool, RequestError>,
    {
        let mut backoff = self.retry.backoff();

        loop {
            let mut request = self
                .store
                .get(id)
                .await?
                .ok_or(RequestError::NotFound(id))?;
            let expected_version = request.version;

            if !apply(&mut request)? {
                return Ok(request);
            }

            match self.store.replace(request, expected_version).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::VersionConflict { actual, .. }) => match backoff.next_backoff() {
                    Some(delay) => {
                        tracing::debug!(
                            request_id = %id,
                            expected_version,
                            actual,
                            delay_ms = delay.as_millis() as u64,
                            "Write conflict, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::warn!(request_id = %id, "Giving up after repeated write conflicts");
                        return Err(RequestError::Conflict(id));
                    }
                },
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn ensure_vendor_has_items(request: &Request, vendor_id: &str) -> Result<(), RequestError> {
    if request.has_vendor(vendor_id) {
        Ok(())
    } else {
        Err(RequestError::Forbidden(format!(
            "vendor {vendor_id} has no items in request {}",
            request.id
        )))
    }
}
