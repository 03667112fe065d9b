//! # ringkv Client
//!
//! Provide a lightweight async client for issuing requests to a ringkv
//! router over its HTTP wire contract (spec.md §6).

mod client;

pub use client::{ClientConfig, ClientError, ClientResult, KVClient};
