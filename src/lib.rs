//! mailcal: Gmail and Google Calendar exposed as MCP tools.
//!
//! This library crate re-exports modules so integration tests
//! (under `tests/`) can access them.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod credentials;
pub mod drive;
pub mod gateway;
pub mod google;
pub mod mail;
pub mod mcp;
pub mod secrets;
pub mod tools;

/// Service name reported by `/health` and the MCP handshake.
pub const SERVICE_NAME: &str = "mailcal-mcp";
