//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresBillingRepository` - Users, plans, and payment rows

mod billing_repository;

pub use billing_repository::PostgresBillingRepository;
