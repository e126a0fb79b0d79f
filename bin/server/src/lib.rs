//! Integration hub HTTP server.
//!
//! Exposes the integration API behind the access guard, persists users,
//! sessions and integrations in PostgreSQL, and seals connector credentials
//! with the credential vault.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
