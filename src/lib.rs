// ABOUTME: Main library entry point for the hookrelay webhook streaming service
// ABOUTME: Provides the SSE relay, upstream client, and HTTP route modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

#![deny(unsafe_code)]

//! # Hookrelay
//!
//! A real-time relay that streams captured webhook requests to clients over
//! a single long-lived Server-Sent Events connection.
//!
//! ## Features
//!
//! - **Authenticated streaming**: bearer credentials are validated once at
//!   connection setup, before any stream bytes are written
//! - **Two event source variants**: a push-style long-poll subscription and a
//!   pull-style polling loop, unified behind one [`relay::source::EventSource`]
//!   abstraction
//! - **Windowed exactly-once delivery**: a cursor/dedup tracker suppresses
//!   re-delivery of overlapping upstream result sets
//! - **Bounded connections**: periodic keepalive frames and a hard maximum
//!   connection duration, with deterministic cleanup on every exit path
//!
//! ## Quick Start
//!
//! 1. Point `UPSTREAM_BASE_URL` at the control-plane API
//! 2. Start the relay with `hookrelay-server`
//! 3. Connect with `GET /api/stream/{slug}` and an `Authorization: Bearer` header
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hookrelay::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("relay configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Environment-based configuration management
pub mod config;

/// Unified error types and HTTP error responses
pub mod errors;

/// Structured logging configuration
pub mod logging;

/// Core domain types shared across modules
pub mod models;

/// The event relay core: sources, dedup tracking, sessions, wire frames
pub mod relay;

/// HTTP route handlers
pub mod routes;

/// Router assembly and server run loop
pub mod server;

/// Upstream collaborator interfaces and the HTTP client implementing them
pub mod upstream;
