//! Request (RFQ) domain types
//!
//! A request is a buyer's submitted cart, fanned out to every vendor whose
//! products appear in it. Items, contact and delivery details are snapshots
//! taken at submission time and never follow later catalog edits.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Request status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Sent,
    Viewed,
    Answered,
    Completed,
    Cancelled,
}

impl Default for RequestStatus {
    fn default() -> Self {
        Self::Sent
    }
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Answered => "answered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled requests accept no further changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown request status '{0}'")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "viewed" => Ok(Self::Viewed),
            "answered" => Ok(Self::Answered),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Rejected status change
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot move request from {from} to {to}")]
pub struct TransitionError {
    pub from: RequestStatus,
    pub to: RequestStatus,
}

/// Buyer contact snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct GuestInfo {
    #[validate(length(min = 1, message = "company name is required"))]
    pub company_name: String,
    #[validate(length(min = 1, message = "contact name is required"))]
    pub contact_name: String,
    #[validate(email(message = "email is not valid"))]
    pub email: String,
    #[validate(length(min = 7, max = 32, message = "phone is not valid"))]
    pub phone: String,
    #[serde(default)]
    pub tax_id: Option<String>,
}

/// Delivery snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct DeliveryInfo {
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub preferred_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Inclusive price range
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Validate)]
#[validate(schema(function = "validate_price_range"))]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceRange {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }
}

fn validate_price_range(range: &PriceRange) -> Result<(), ValidationError> {
    check_bounds(range.min, range.max)
}

/// Prices are whole minor currency units
const MAX_PRICE_SCALE: u32 = 2;

fn check_price(value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative_price"));
    }
    if value.scale() > MAX_PRICE_SCALE {
        return Err(ValidationError::new("too_many_decimal_places"));
    }
    Ok(())
}

fn check_bounds(min: Decimal, max: Decimal) -> Result<(), ValidationError> {
    check_price(min)?;
    check_price(max)?;
    if min > max {
        return Err(ValidationError::new("price_min_above_max"));
    }
    Ok(())
}

fn valid_price(value: &Decimal) -> Result<(), ValidationError> {
    check_price(*value)
}

/// Snapshot of one product line at submission time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[validate(schema(function = "validate_item_prices"))]
pub struct RequestItem {
    /// Catalog reference, kept for display and reorder only
    pub product_id: String,
    #[validate(length(min = 1))]
    pub product_name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[validate(length(min = 1))]
    pub vendor_id: String,
    pub vendor_name: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[serde(default)]
    pub unit: Option<String>,
    pub price_min: Decimal,
    pub price_max: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

fn validate_item_prices(item: &RequestItem) -> Result<(), ValidationError> {
    check_bounds(item.price_min, item.price_max)
}

impl RequestItem {
    /// Price range for the whole line (unit range times quantity)
    pub fn line_total(&self) -> PriceRange {
        let quantity = Decimal::from(self.quantity);
        PriceRange::new(self.price_min * quantity, self.price_max * quantity)
    }
}

/// One vendor's quote against a request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VendorResponse {
    pub vendor_id: String,
    pub vendor_name: String,
    pub unit_price: Decimal,
    pub delivery_days: u32,
    pub message: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub responded_at: DateTime<Utc>,
}

/// Request entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_info: GuestInfo,
    pub delivery_info: DeliveryInfo,
    pub items: Vec<RequestItem>,
    pub status: RequestStatus,
    pub total_estimate: PriceRange,
    pub vendor_responses: Vec<VendorResponse>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every successful write; guards concurrent updates
    pub version: i64,
}

impl Request {
    /// Materialize a fresh record from submitted data.
    pub fn from_new(new: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            guest_info: new.guest_info,
            delivery_info: new.delivery_info,
            items: new.items,
            status: new.status,
            total_estimate: new.total_estimate,
            vendor_responses: Vec::new(),
            notes: new.notes,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn has_vendor(&self, vendor_id: &str) -> bool {
        self.items.iter().any(|item| item.vendor_id == vendor_id)
    }

    pub fn has_responded(&self, vendor_id: &str) -> bool {
        self.vendor_responses
            .iter()
            .any(|response| response.vendor_id == vendor_id)
    }

    pub fn vendor_items<'a>(&'a self, vendor_id: &'a str) -> impl Iterator<Item = &'a RequestItem> {
        self.items
            .iter()
            .filter(move |item| item.vendor_id == vendor_id)
    }

    /// Sum of line totals for one vendor's items, computed on every call.
    pub fn vendor_subtotal(&self, vendor_id: &str) -> PriceRange {
        self.vendor_items(vendor_id)
            .map(RequestItem::line_total)
            .fold(PriceRange::default(), |acc, line| {
                PriceRange::new(acc.min + line.min, acc.max + line.max)
            })
    }

    /// `sent -> viewed`. Any other state is left alone, so repeated opens
    /// never regress an answered request. Returns whether the status changed.
    pub fn mark_viewed(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != RequestStatus::Sent {
            return false;
        }
        self.status = RequestStatus::Viewed;
        self.updated_at = now;
        true
    }

    /// Explicit buyer/admin transition. `viewed` and `answered` are only
    /// reached as side effects and cannot be requested directly.
    /// Returns `Ok(false)` when the request is already in `target`.
    pub fn transition_to(
        &mut self,
        target: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, TransitionError> {
        if self.status == target {
            return Ok(false);
        }

        let allowed = match target {
            RequestStatus::Sent => self.status == RequestStatus::Draft,
            RequestStatus::Completed | RequestStatus::Cancelled => !self.status.is_terminal(),
            RequestStatus::Draft | RequestStatus::Viewed | RequestStatus::Answered => false,
        };

        if !allowed {
            return Err(TransitionError {
                from: self.status,
                to: target,
            });
        }

        self.status = target;
        self.updated_at = now;
        Ok(true)
    }

    /// Insert or replace the response keyed by `vendor_id`, then force the
    /// request to `answered`.
    pub fn upsert_vendor_response(
        &mut self,
        response: VendorResponse,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                from: self.status,
                to: RequestStatus::Answered,
            });
        }

        match self
            .vendor_responses
            .iter_mut()
            .find(|existing| existing.vendor_id == response.vendor_id)
        {
            Some(existing) => *existing = response,
            None => self.vendor_responses.push(response),
        }

        self.status = RequestStatus::Answered;
        self.updated_at = now;
        Ok(())
    }
}

fn default_initial_status() -> RequestStatus {
    RequestStatus::Sent
}

/// Data for creating a request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[validate(nested)]
    pub guest_info: GuestInfo,
    #[validate(nested)]
    pub delivery_info: DeliveryInfo,
    #[validate(length(min = 1, message = "a request needs at least one item"))]
    #[validate(nested)]
    pub items: Vec<RequestItem>,
    #[serde(default = "default_initial_status")]
    pub status: RequestStatus,
    #[validate(nested)]
    pub total_estimate: PriceRange,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A vendor's quote as submitted, before it is stamped
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VendorQuote {
    #[validate(length(min = 1))]
    pub vendor_id: String,
    #[validate(length(min = 1, message = "vendor name is required"))]
    pub vendor_name: String,
    #[validate(custom(function = "valid_price"))]
    pub unit_price: Decimal,
    #[validate(range(min = 1, message = "delivery takes at least one day"))]
    pub delivery_days: u32,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

impl VendorQuote {
    pub fn into_response(self, responded_at: DateTime<Utc>) -> VendorResponse {
        VendorResponse {
            vendor_id: self.vendor_id,
            vendor_name: self.vendor_name,
            unit_price: self.unit_price,
            delivery_days: self.delivery_days,
            message: self.message,
            valid_until: self.valid_until,
            responded_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn guest() -> GuestInfo {
        GuestInfo {
            company_name: "Kahve Durağı".to_string(),
            contact_name: "Deniz Kaya".to_string(),
            email: "deniz@kahveduragi.example".to_string(),
            phone: "+90 555 010 2030".to_string(),
            tax_id: None,
        }
    }

    pub fn delivery() -> DeliveryInfo {
        DeliveryInfo {
            address: "Moda Cd. 12".to_string(),
            city: "İstanbul".to_string(),
            district: Some("Kadıköy".to_string()),
            postal_code: None,
            preferred_date: None,
            notes: None,
        }
    }

    pub fn item(vendor_id: &str, quantity: u32, min: i64, max: i64) -> RequestItem {
        RequestItem {
            product_id: format!("{vendor_id}-product"),
            product_name: format!("Product from {vendor_id}"),
            brand: None,
            vendor_id: vendor_id.to_string(),
            vendor_name: format!("Vendor {vendor_id}"),
            quantity,
            unit: None,
            price_min: Decimal::from(min),
            price_max: Decimal::from(max),
            note: None,
        }
    }

    pub fn new_request(user_id: Option<Uuid>, items: Vec<RequestItem>) -> NewRequest {
        let total = items
            .iter()
            .map(RequestItem::line_total)
            .fold(PriceRange::default(), |acc, line| {
                PriceRange::new(acc.min + line.min, acc.max + line.max)
            });
        NewRequest {
            user_id,
            guest_info: guest(),
            delivery_info: delivery(),
            items,
            status: RequestStatus::Sent,
            total_estimate: total,
            notes: None,
        }
    }

    pub fn quote(vendor_id: &str, unit_price: i64, delivery_days: u32) -> VendorQuote {
        VendorQuote {
            vendor_id: vendor_id.to_string(),
            vendor_name: format!("Vendor {vendor_id}"),
            unit_price: Decimal::from(unit_price),
            delivery_days,
            message: None,
            valid_until: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn request(items: Vec<RequestItem>) -> Request {
        Request::from_new(new_request(None, items), Utc::now())
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            RequestStatus::Draft,
            RequestStatus::Sent,
            RequestStatus::Viewed,
            RequestStatus::Answered,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("archived".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn viewing_is_idempotent_and_never_regresses() {
        let mut req = request(vec![item("a", 1, 10, 12)]);
        let now = Utc::now();

        assert!(req.mark_viewed(now));
        assert!(!req.mark_viewed(now));
        assert_eq!(req.status, RequestStatus::Viewed);

        req.upsert_vendor_response(quote("a", 11, 2).into_response(now), now)
            .unwrap();
        assert!(!req.mark_viewed(now));
        assert_eq!(req.status, RequestStatus::Answered);
    }

    #[test]
    fn drafts_are_not_marked_viewed() {
        let mut req = request(vec![item("a", 1, 10, 12)]);
        req.status = RequestStatus::Draft;
        assert!(!req.mark_viewed(Utc::now()));
        assert_eq!(req.status, RequestStatus::Draft);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut req = request(vec![item("a", 1, 10, 12), item("b", 1, 5, 6)]);
        let now = Utc::now();

        req.upsert_vendor_response(quote("a", 11, 2).into_response(now), now)
            .unwrap();
        req.upsert_vendor_response(quote("b", 5, 1).into_response(now), now)
            .unwrap();
        req.upsert_vendor_response(quote("a", 9, 3).into_response(now), now)
            .unwrap();

        assert_eq!(req.vendor_responses.len(), 2);
        assert_eq!(req.vendor_responses[0].vendor_id, "a");
        assert_eq!(req.vendor_responses[0].unit_price, Decimal::from(9));
        assert_eq!(req.vendor_responses[0].delivery_days, 3);
    }

    #[test]
    fn terminal_requests_reject_changes() {
        let mut req = request(vec![item("a", 1, 10, 12)]);
        let now = Utc::now();

        assert_eq!(req.transition_to(RequestStatus::Cancelled, now), Ok(true));
        assert_eq!(req.transition_to(RequestStatus::Cancelled, now), Ok(false));
        assert_eq!(
            req.transition_to(RequestStatus::Completed, now),
            Err(TransitionError {
                from: RequestStatus::Cancelled,
                to: RequestStatus::Completed,
            })
        );
        assert!(req
            .upsert_vendor_response(quote("a", 11, 2).into_response(now), now)
            .is_err());
        assert!(req.vendor_responses.is_empty());
    }

    #[test]
    fn side_effect_states_cannot_be_requested() {
        let mut req = request(vec![item("a", 1, 10, 12)]);
        let now = Utc::now();
        assert!(req.transition_to(RequestStatus::Viewed, now).is_err());
        assert!(req.transition_to(RequestStatus::Answered, now).is_err());
        assert!(req.transition_to(RequestStatus::Draft, now).is_err());
    }

    #[test]
    fn drafts_can_be_submitted() {
        let mut req = request(vec![item("a", 1, 10, 12)]);
        req.status = RequestStatus::Draft;
        assert_eq!(req.transition_to(RequestStatus::Sent, Utc::now()), Ok(true));
        assert_eq!(req.status, RequestStatus::Sent);
    }

    #[test]
    fn vendor_subtotal_only_counts_own_items() {
        let req = request(vec![
            item("a", 3, 100, 120),
            item("b", 1, 500, 500),
            item("a", 2, 10, 15),
        ]);
        assert_eq!(
            req.vendor_subtotal("a"),
            PriceRange::new(Decimal::from(320), Decimal::from(390))
        );
        assert_eq!(req.vendor_items("b").count(), 1);
        assert_eq!(req.vendor_subtotal("c"), PriceRange::default());
    }

    #[test]
    fn validation_rejects_bad_input() {
        let mut new = new_request(None, vec![item("a", 1, 10, 12)]);
        assert!(new.validate().is_ok());

        new.items.clear();
        assert!(new.validate().is_err());

        let mut new = new_request(None, vec![item("a", 1, 12, 10)]);
        assert!(new.validate().is_err());
        new.items = vec![item("a", 0, 10, 12)];
        assert!(new.validate().is_err());

        let mut new = new_request(None, vec![item("a", 1, 10, 12)]);
        new.guest_info.email = "not-an-email".to_string();
        assert!(new.validate().is_err());

        let mut q = quote("a", 10, 0);
        assert!(q.validate().is_err());
        q.delivery_days = 1;
        q.unit_price = Decimal::from(-1);
        assert!(q.validate().is_err());
    }

    #[test]
    fn prices_are_limited_to_cents() {
        let cents = Decimal::new(12_345, 2); // 123.45
        let fraction_of_cent = Decimal::new(125, 3); // 0.125

        let mut line = item("a", 1, 0, 0);
        line.price_min = cents;
        line.price_max = cents;
        let mut new = new_request(None, vec![line.clone()]);
        assert!(new.validate().is_ok());

        new.total_estimate = PriceRange::new(fraction_of_cent, cents);
        assert!(new.validate().is_err());

        line.price_min = fraction_of_cent;
        assert!(new_request(None, vec![line]).validate().is_err());

        let mut q = quote("a", 10, 1);
        q.unit_price = cents;
        assert!(q.validate().is_ok());
        q.unit_price = fraction_of_cent;
        assert!(q.validate().is_err());
    }
}
