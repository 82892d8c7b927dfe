//! # Domain Layer
//!
//! Framework-agnostic entities and events for the authorization kernel:
//! users, OAuth2 clients/codes/tokens, API keys, the role graph, the
//! organization/project tenancy tree, invites, and console sessions.
//!
//! | Module     | Purpose                                        |
//! |------------|-------------------------------------------------|
//! | `entities` | Rows mapped 1:1 to `db/migrations/postgresql/`   |
//! | `events`   | Audit-log-shaped records of state transitions    |
//!
//! Entities carry every persisted column, including ones that must never
//! reach an API response (`hashed_password`, `salt`, `hashed_key`); the API
//! layer's `dto` module defines the response-safe projections.

pub mod entities;
pub mod events;

pub use entities::*;
