//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, state machine, errors)
//! - `billing` - Payments, plans, subscription lifecycle and webhook classification

pub mod billing;
pub mod foundation;
