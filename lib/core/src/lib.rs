//! Core domain types shared across the integration hub.
//!
//! This crate provides the identifiers and the error-handling foundation used
//! by the credential vault, the access policy engine and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{IntegrationId, ParseIdError, UserId};
