//! CLI subcommands

pub mod auth;
pub mod config;
pub mod context;
pub mod request;
pub mod transfer;
