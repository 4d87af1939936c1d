//! Request (RFQ) routes
//!
//! Checkout submission for buyers and guests, the vendor quote flow, and the
//! role-scoped request lists for the buyer, vendor and admin panels.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{
    ApiJson, ApiQuery, Created, DataResponse, NoContent, Paginated, PaginationParams,
};
use crate::app::AppState;
use crate::auth::{AuthContext, MaybeAuth, RequireAuth, Role};
use crate::domain::{NewRequest, Request, RequestStatus, VendorQuote};
use crate::error::{ApiError, ApiResult};
use crate::services::{GuestVisibility, VendorRequestRow};

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ListRequestsQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub status: Option<RequestStatus>,
}

impl ListRequestsQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Quote body; the vendor id always comes from the token
#[derive(Debug, Deserialize)]
pub struct SubmitQuoteBody {
    pub vendor_name: String,
    pub unit_price: Decimal,
    pub delivery_days: u32,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: RequestStatus,
}

/// Detail payload differs per role
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestDetail {
    Full(Request),
    Vendor(VendorRequestRow),
}

// ============================================================================
// Helper Functions
// ============================================================================

fn vendor_id(auth: &AuthContext) -> ApiResult<&str> {
    match (auth.role, auth.vendor_id.as_deref()) {
        (Role::Vendor, Some(vendor_id)) => Ok(vendor_id),
        _ => Err(ApiError::forbidden("Only vendors can do this")),
    }
}

/// Buyers may read their own requests, and guest requests when those are
/// shared with all buyers. Admins may read any request.
fn ensure_read_access(
    auth: &AuthContext,
    request: &Request,
    visibility: GuestVisibility,
) -> ApiResult<()> {
    let allowed = match auth.role {
        Role::Admin => true,
        Role::Cafe => match request.user_id {
            Some(owner) => owner == auth.user_id,
            None => visibility == GuestVisibility::AllBuyers,
        },
        Role::Vendor => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden("You do not have access to this request"))
    }
}

/// Only the owning buyer or an admin may change a request. Guest requests
/// have no owner, so only admins can change them.
fn ensure_owner_access(auth: &AuthContext, request: &Request) -> ApiResult<()> {
    let allowed = match auth.role {
        Role::Admin => true,
        Role::Cafe => request.user_id == Some(auth.user_id),
        Role::Vendor => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the request owner can change it"))
    }
}

fn with_status<T>(
    items: Vec<T>,
    status: Option<RequestStatus>,
    of: impl Fn(&T) -> RequestStatus,
) -> Vec<T> {
    match status {
        Some(status) => items.into_iter().filter(|item| of(item) == status).collect(),
        None => items,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /requests
///
/// Submit a cart as a request. Guests may submit without a token; buyers get
/// the request attached to their account.
pub async fn create_request(
    MaybeAuth(auth): MaybeAuth,
    State(state): State<Arc<AppState>>,
    ApiJson(mut body): ApiJson<NewRequest>,
) -> ApiResult<Created<Request>> {
    body.user_id = match &auth {
        None => None,
        Some(ctx) if ctx.role == Role::Cafe => Some(ctx.user_id),
        Some(_) => return Err(ApiError::forbidden("Only buyers can submit requests")),
    };

    tracing::info!(
        user_id = ?body.user_id,
        items = body.items.len(),
        company = %body.guest_info.company_name,
        "Submitting request"
    );

    let request = state.requests.create(body).await?;
    Ok(Created(request))
}

/// GET /requests
///
/// Buyers see their own requests, vendors the requests containing their
/// products, admins everything.
pub async fn list_requests(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListRequestsQuery>,
) -> ApiResult<Response> {
    let pagination = query.pagination();

    tracing::debug!(
        user_id = %auth.user_id,
        role = ?auth.role,
        page = pagination.page(),
        per_page = pagination.per_page(),
        "Listing requests"
    );

    let response = match auth.role {
        Role::Cafe => {
            let requests = state.requests.buyer_requests(auth.user_id).await?;
            let requests = with_status(requests, query.status, |r| r.status);
            Paginated::from_vec(requests, &pagination).into_response()
        }
        Role::Vendor => {
            let rows = state.requests.vendor_requests(vendor_id(&auth)?).await?;
            let rows = with_status(rows, query.status, |row| row.request.status);
            Paginated::from_vec(rows, &pagination).into_response()
        }
        Role::Admin => {
            let requests = state.requests.admin_requests().await?;
            let requests = with_status(requests, query.status, |r| r.status);
            Paginated::from_vec(requests, &pagination).into_response()
        }
    };

    Ok(response)
}

/// GET /requests/:request_id
///
/// A vendor opening the request marks it viewed.
pub async fn get_request(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<DataResponse<RequestDetail>>> {
    let detail = if auth.role == Role::Vendor {
        let vendor_id = vendor_id(&auth)?;
        let request = state.requests.mark_viewed(request_id, vendor_id).await?;
        RequestDetail::Vendor(VendorRequestRow::new(request, vendor_id))
    } else {
        let request = state
            .requests
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Request not found"))?;
        ensure_read_access(&auth, &request, state.requests.guest_visibility())?;
        RequestDetail::Full(request)
    };

    Ok(Json(DataResponse::new(detail)))
}

/// GET /requests/:request_id/vendor-items
///
/// The calling vendor's items within a request, with sub-totals.
pub async fn get_vendor_items(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let vendor_id = vendor_id(&auth)?;
    let view = state.requests.vendor_items(request_id, vendor_id).await?;

    if view.items.is_empty() {
        return Err(ApiError::forbidden("You have no items in this request"));
    }

    Ok(Json(DataResponse::new(view)))
}

/// POST /requests/:request_id/responses
///
/// Submit or replace the calling vendor's quote.
pub async fn submit_response(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    ApiJson(body): ApiJson<SubmitQuoteBody>,
) -> ApiResult<impl IntoResponse> {
    let vendor_id = vendor_id(&auth)?;

    tracing::info!(
        user_id = %auth.user_id,
        request_id = %request_id,
        vendor_id,
        unit_price = %body.unit_price,
        "Submitting vendor response"
    );

    let quote = VendorQuote {
        vendor_id: vendor_id.to_string(),
        vendor_name: body.vendor_name,
        unit_price: body.unit_price,
        delivery_days: body.delivery_days,
        message: body.message,
        valid_until: body.valid_until,
    };

    let request = state.requests.add_vendor_response(request_id, quote).await?;
    Ok(Json(DataResponse::new(VendorRequestRow::new(
        request, vendor_id,
    ))))
}

/// PATCH /requests/:request_id/status
///
/// Buyer or admin moves a request to `sent`, `completed` or `cancelled`.
pub async fn update_status(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    ApiJson(body): ApiJson<UpdateStatusBody>,
) -> ApiResult<impl IntoResponse> {
    let request = state
        .requests
        .get_by_id(request_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Request not found"))?;
    ensure_owner_access(&auth, &request)?;

    tracing::info!(
        user_id = %auth.user_id,
        request_id = %request_id,
        from = %request.status,
        to = %body.status,
        "Updating request status"
    );

    let request = state.requests.update_status(request_id, body.status).await?;
    Ok(Json(DataResponse::new(request)))
}

/// DELETE /requests/:request_id
///
/// Administrative cleanup.
pub async fn delete_request(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    if !auth.is_admin() {
        return Err(ApiError::forbidden("Only admins can delete requests"));
    }

    if state.requests.delete(request_id).await? {
        Ok(NoContent)
    } else {
        Err(ApiError::not_found("Request not found"))
    }
}
