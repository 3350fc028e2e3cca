//! Subscription Gateway - dLocal Go payments and subscriptions
//!
//! This crate creates hosted-checkout subscriptions and one-off payments on
//! dLocal Go, keeps a local ledger of payment rows, and reconciles gateway
//! notifications and checkout redirects against it.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
