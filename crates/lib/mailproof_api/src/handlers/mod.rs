//! Request handlers.

pub mod info;
pub mod validate_email;
