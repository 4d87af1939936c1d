//! Service layer
//!
//! Request lifecycle operations and the role-scoped views built on them.

pub mod requests;
pub mod views;

pub use requests::{GuestVisibility, RequestError, RequestService, RetryPolicy};
pub use views::{VendorItemsView, VendorRequestRow};
