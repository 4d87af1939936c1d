//! Domain types and DTOs
//!
//! Types for buyer requests (RFQs) and the vendor quotes collected against them.

pub mod requests;

pub use requests::*;
