//! Shared benchmark-function domain primitives.
//!
//! This crate owns the invocation contract, the size policy tables, blob and
//! scratch naming, and process configuration. It intentionally excludes the
//! storage SDK, the compute engines and Lambda runtime concerns.

pub mod config;
pub mod contract;
pub mod policy;
pub mod storage_keys;
