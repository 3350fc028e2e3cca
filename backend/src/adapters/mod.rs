//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `dlocal` - dLocal Go payment gateway (plus an in-process mock)
//! - `http` - Axum REST surface
//! - `memory` - In-memory billing repository
//! - `postgres` - PostgreSQL billing repository

pub mod dlocal;
pub mod http;
pub mod memory;
pub mod postgres;

pub use dlocal::{DLocalConfig, DLocalGateway, MockPaymentGateway};
pub use memory::InMemoryBillingRepository;
pub use postgres::PostgresBillingRepository;
