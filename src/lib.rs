//! RFQ backend: carts submitted as requests for quotation, routed to the
//! vendors whose products they contain.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;
