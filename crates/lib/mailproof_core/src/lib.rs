//! # mailproof_core
//!
//! Core domain logic for Mailproof: validation token grammar, profile and
//! token stores, and the email validation flow.

pub mod clock;
pub mod migrate;
pub mod models;
pub mod store;
pub mod token;
pub mod validation;

pub use validation::{EmailValidator, ValidationContext, ValidationFailure, ValidationOutcome};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
