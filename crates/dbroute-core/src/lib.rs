//! dbroute Core - Shared configuration for the sharding router
//!
//! This crate provides the typed configuration consumed by
//! `dbroute-router-core` and the `dbroute-inspect` tool.

pub mod config;
pub mod datasource;
pub mod error;
pub mod shard;

pub use config::{HashFunction, RouterConfig, RouterSettings, ENV_PREFIX};
pub use datasource::DataSourceDescriptor;
pub use error::ConfigError;
