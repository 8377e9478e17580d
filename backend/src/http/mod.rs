//! HTTP server module for the configuration database.
//!
//! This module exposes the hardware catalog as a REST API over axum. Every
//! collection shares one set of generic handlers parameterized by
//! [`Resource`](crate::api::Resource).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - Authentication, request parsing                        │
//! │  - JSON serialization, error mapping                      │
//! │  - CORS, compression, tracing                             │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Serialization Layer (api/)                               │
//! │  - Nested views, filters, pagination, payload decoding    │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Repository Layer (db/)                                   │
//! │  - LocalRepository / PostgresRepository                   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
