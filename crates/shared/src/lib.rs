//! Shared types and configuration for Corebook.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Numeric scale policy for monetary amounts
//! - Keyset pagination for chunked scans
//! - Configuration management

pub mod config;
pub mod types;

pub use config::AppConfig;
