//! Storage, compute and Lambda integration for the benchmark functions.
//!
//! This crate owns runtime integration details (Lambda binaries, the object
//! storage gateway and the delegated compute engines) and exposes a single
//! runtime module boundary for contract, policy, configuration and storage key
//! primitives.

pub mod adapters;
pub mod handlers;
pub mod runtime;
