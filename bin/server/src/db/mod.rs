//! Database repositories for integration hub resources.

pub mod integration;

pub use integration::{IntegrationRecord, IntegrationRepository, IntegrationStatus};
