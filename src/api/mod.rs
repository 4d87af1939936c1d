//! API response types and pagination utilities

pub mod extract;
pub mod pagination;
pub mod response;

pub use extract::{ApiJson, ApiQuery};
pub use pagination::{Paginated, PaginationMeta, PaginationParams};
pub use response::{Created, DataResponse, NoContent};
