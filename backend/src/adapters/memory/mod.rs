//! In-process adapters for tests and local runs.

mod billing_repository;

pub use billing_repository::InMemoryBillingRepository;
