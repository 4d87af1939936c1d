//! PostgreSQL request store
//!
//! Snapshots (contact, delivery, items, responses) are JSONB columns; the
//! `version` column turns every update into a compare-and-swap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ListScope, RequestStore, StoreError};
use crate::db;
use crate::domain::{
    DeliveryInfo, GuestInfo, PriceRange, Request, RequestItem, RequestStatus, VendorResponse,
};

const SELECT_COLUMNS: &str = r#"
    id, user_id, guest_info, delivery_info, items, status,
    total_min, total_max, vendor_responses, notes, version, created_at, updated_at
"#;

/// Database row for request
#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    user_id: Option<Uuid>,
    guest_info: Json<GuestInfo>,
    delivery_info: Json<DeliveryInfo>,
    items: Json<Vec<RequestItem>>,
    status: String,
    total_min: Decimal,
    total_max: Decimal,
    vendor_responses: Json<Vec<VendorResponse>>,
    notes: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for Request {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<RequestStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            guest_info: row.guest_info.0,
            delivery_info: row.delivery_info.0,
            items: row.items.0,
            status,
            total_estimate: PriceRange::new(row.total_min, row.total_max),
            vendor_responses: row.vendor_responses.0,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

#[derive(Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        let version = sqlx::query_scalar("SELECT version FROM rfq_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn insert(&self, request: Request) -> Result<Request, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            INSERT INTO rfq_requests (id, user_id, guest_info, delivery_info, items, status,
                total_min, total_max, vendor_responses, notes, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO NOTHING
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(request.user_id)
        .bind(Json(&request.guest_info))
        .bind(Json(&request.delivery_info))
        .bind(Json(&request.items))
        .bind(request.status.as_str())
        .bind(request.total_estimate.min)
        .bind(request.total_estimate.max)
        .bind(Json(&request.vendor_responses))
        .bind(&request.notes)
        .bind(request.version)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::DuplicateId(request.id)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Request>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM rfq_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Request::try_from).transpose()
    }

    async fn list(&self, scope: &ListScope) -> Result<Vec<Request>, StoreError> {
        let (user_id, include_guests, vendor_filter) = match scope {
            ListScope::All => (None, false, None),
            ListScope::User(user_id) => (Some(*user_id), false, None),
            ListScope::Vendor(vendor_id) => (
                None,
                false,
                Some(serde_json::json!([{ "vendor_id": vendor_id }])),
            ),
            ListScope::Buyer {
                user_id,
                include_guests,
            } => (Some(*user_id), *include_guests, None),
        };

        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM rfq_requests
            WHERE ($1::uuid IS NULL OR user_id = $1 OR ($2 AND user_id IS NULL))
            AND ($3::jsonb IS NULL OR items @> $3)
            ORDER BY created_at DESC, seq ASC
            "#
        ))
        .bind(user_id)
        .bind(include_guests)
        .bind(vendor_filter)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Request::try_from).collect()
    }

    async fn replace(
        &self,
        request: Request,
        expected_version: i64,
    ) -> Result<Request, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            UPDATE rfq_requests
            SET status = $3, vendor_responses = $4, notes = $5, updated_at = $6,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(expected_version)
        .bind(request.status.as_str())
        .bind(Json(&request.vendor_responses))
        .bind(&request.notes)
        .bind(request.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return row.try_into();
        }

        match self.current_version(request.id).await? {
            Some(actual) => Err(StoreError::VersionConflict {
                id: request.id,
                expected: expected_version,
                actual,
            }),
            None => Err(StoreError::NotFound(request.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM rfq_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        db::health_check(&self.pool).await?;
        Ok(())
    }
}
