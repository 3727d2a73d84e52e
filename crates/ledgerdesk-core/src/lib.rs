//! Ledgerdesk Core - shared types for the Ledgerdesk API client
//!
//! This crate holds everything the HTTP client and its consumers agree on
//! without depending on a transport:
//! - **Configuration** - typed YAML configuration with defaults and validation
//! - **Domain types** - `NormalizedError`, `ErrorKind`, `Session`, `UserProfile`
//! - **Port definitions** - `TokenStore`, `Notifier`, `Navigator`
//!
//! # Architecture
//!
//! Ports are the seams the client is wired through. The client crate ships
//! adapters for them (keyring and in-memory token stores, a tracing-backed
//! notifier, an in-process navigator); front ends may provide their own.

pub mod config;
pub mod domain;
pub mod ports;
