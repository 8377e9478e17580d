//! # ConfigDB
//!
//! Configuration database for observatory hardware.
//!
//! Sites, enclosures, telescopes, instruments, cameras and their optical and
//! mode configurations are stored relationally and served as a REST API.
//!
//! ## Architecture
//!
//! - [`models`]: hardware entities, write payloads and field validation
//! - [`db`]: repository traits with in-memory and PostgreSQL backends
//! - [`api`]: read shapes, filters, pagination and payload decoding
//! - [`config`]: start-up configuration from TOML or the environment
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;
pub mod config;
pub mod db;
pub mod models;

#[cfg(feature = "http-server")]
pub mod http;
