//! Role-scoped read models over the request store
//!
//! Nothing here is persisted; annotations and sub-totals are derived on every
//! read.

use serde::Serialize;
use uuid::Uuid;

use super::requests::{GuestVisibility, RequestError, RequestService};
use crate::domain::{PriceRange, Request, RequestItem};
use crate::store::ListScope;

/// One vendor's slice of a request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VendorItemsView {
    pub request_id: Uuid,
    pub vendor_id: String,
    pub items: Vec<RequestItem>,
    pub subtotal: PriceRange,
}

impl VendorItemsView {
    pub fn of(request: &Request, vendor_id: &str) -> Self {
        Self {
            request_id: request.id,
            vendor_id: vendor_id.to_string(),
            items: request.vendor_items(vendor_id).cloned().collect(),
            subtotal: request.vendor_subtotal(vendor_id),
        }
    }
}

/// Request as shown to a vendor. Quotes from competing vendors are removed.
#[derive(Debug, Clone, Serialize)]
pub struct VendorRequestRow {
    #[serde(flatten)]
    pub request: Request,
    pub has_responded: bool,
    pub vendor_subtotal: PriceRange,
}

impl VendorRequestRow {
    pub fn new(mut request: Request, vendor_id: &str) -> Self {
        request
            .vendor_responses
            .retain(|response| response.vendor_id == vendor_id);
        Self {
            has_responded: request.has_responded(vendor_id),
            vendor_subtotal: request.vendor_subtotal(vendor_id),
            request,
        }
    }
}

impl RequestService {
    /// The buyer's own requests, plus guest requests when configured.
    pub async fn buyer_requests(&self, user_id: Uuid) -> Result<Vec<Request>, RequestError> {
        let scope = ListScope::Buyer {
            user_id,
            include_guests: self.guest_visibility() == GuestVisibility::AllBuyers,
        };
        Ok(self.store().list(&scope).await?)
    }

    /// Requests with at least one of the vendor's items, annotated for the vendor panel.
    pub async fn vendor_requests(
        &self,
        vendor_id: &str,
    ) -> Result<Vec<VendorRequestRow>, RequestError> {
        let rows = self
            .list_by_vendor(vendor_id)
            .await?
            .into_iter()
            .map(|request| VendorRequestRow::new(request, vendor_id))
            .collect();
        Ok(rows)
    }

    pub async fn admin_requests(&self) -> Result<Vec<Request>, RequestError> {
        self.list_all().await
    }

    pub async fn vendor_items(
        &self,
        id: Uuid,
        vendor_id: &str,
    ) -> Result<VendorItemsView, RequestError> {
        let request = self
            .get_by_id(id)
            .await?
            .ok_or(RequestError::NotFound(id))?;
        Ok(VendorItemsView::of(&request, vendor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::requests::fixtures::{item, new_request, quote};
    use crate::domain::RequestStatus;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn service(visibility: GuestVisibility) -> RequestService {
        RequestService::new(Arc::new(MemoryStore::new())).with_guest_visibility(visibility)
    }

    #[tokio::test]
    async fn guest_requests_follow_visibility_setting() {
        for (visibility, expected) in [
            (GuestVisibility::OwnerOnly, 1),
            (GuestVisibility::AllBuyers, 2),
        ] {
            let service = service(visibility);
            let buyer = Uuid::new_v4();
            service
                .create(new_request(Some(buyer), vec![item("a", 1, 1, 2)]))
                .await
                .unwrap();
            service
                .create(new_request(None, vec![item("a", 1, 1, 2)]))
                .await
                .unwrap();
            service
                .create(new_request(Some(Uuid::new_v4()), vec![item("a", 1, 1, 2)]))
                .await
                .unwrap();

            assert_eq!(service.buyer_requests(buyer).await.unwrap().len(), expected);
            assert_eq!(service.admin_requests().await.unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn vendor_rows_track_own_response() {
        let service = service(GuestVisibility::OwnerOnly);
        let created = service
            .create(new_request(
                None,
                vec![item("a", 2, 10, 12), item("b", 1, 7, 9)],
            ))
            .await
            .unwrap();
        service
            .add_vendor_response(created.id, quote("a", 11, 2))
            .await
            .unwrap();

        let for_a = service.vendor_requests("a").await.unwrap();
        let for_b = service.vendor_requests("b").await.unwrap();
        assert!(for_a[0].has_responded);
        assert!(!for_b[0].has_responded);
        // b never sees a's quote
        assert!(for_b[0].request.vendor_responses.is_empty());
        assert_eq!(for_a[0].request.vendor_responses.len(), 1);
        assert_eq!(
            for_b[0].vendor_subtotal,
            PriceRange::new(Decimal::from(7), Decimal::from(9))
        );
        assert!(service.vendor_requests("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn two_vendor_checkout_scenario() {
        let service = service(GuestVisibility::OwnerOnly);
        let new = new_request(
            Some(Uuid::new_v4()),
            vec![item("A", 3, 100, 120), item("B", 1, 500, 500)],
        );
        let created = service.create(new).await.unwrap();
        assert_eq!(
            created.total_estimate,
            PriceRange::new(Decimal::from(800), Decimal::from(860))
        );

        let for_a = service.list_by_vendor("A").await.unwrap();
        assert_eq!(for_a.len(), 1);
        let view = service.vendor_items(created.id, "A").await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].vendor_id, "A");
        assert_eq!(
            view.subtotal,
            PriceRange::new(Decimal::from(300), Decimal::from(360))
        );

        let after_a = service
            .add_vendor_response(created.id, quote("A", 110, 5))
            .await
            .unwrap();
        assert_eq!(after_a.status, RequestStatus::Answered);
        assert_eq!(after_a.vendor_responses.len(), 1);

        let after_b = service
            .add_vendor_response(created.id, quote("B", 480, 2))
            .await
            .unwrap();
        assert_eq!(after_b.status, RequestStatus::Answered);
        assert_eq!(after_b.vendor_responses.len(), 2);
        // stored estimate is never recomputed
        assert_eq!(after_b.total_estimate, created.total_estimate);
    }

    #[tokio::test]
    async fn store_does_not_recompute_estimate() {
        let service = service(GuestVisibility::OwnerOnly);
        let mut new = new_request(None, vec![item("A", 3, 100, 120)]);
        new.total_estimate = PriceRange::new(Decimal::from(1), Decimal::from(2));
        let created = service.create(new).await.unwrap();
        assert_eq!(
            created.total_estimate,
            PriceRange::new(Decimal::from(1), Decimal::from(2))
        );
    }

    #[tokio::test]
    async fn vendor_items_for_missing_request_is_not_found() {
        let service = service(GuestVisibility::OwnerOnly);
        assert!(matches!(
            service.vendor_items(Uuid::new_v4(), "A").await,
            Err(RequestError::NotFound(_))
        ));
    }
}
