//! DTOs for the client <-> router <-> shard wire contract (spec.md §6).
//!
//! Bodies are deliberately terse JSON objects matching the literal strings
//! the contract specifies, not a generic envelope — clients depend on the
//! exact shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Query params for `PUT /put`.
#[derive(Debug, Deserialize)]
pub struct PutQuery {
    pub key: String,
    pub value: String,
}

/// Query params for `GET /get`.
#[derive(Debug, Deserialize)]
pub struct GetQuery {
    pub key: String,
}

/// Query params for the custom-verb `DEL /del`.
#[derive(Debug, Deserialize)]
pub struct DelQuery {
    pub key: String,
}

/// Query params for `POST /remove_server`.
#[derive(Debug, Deserialize)]
pub struct RemoveServerQuery {
    pub port: String,
}

/// `{"message": "..."}` body shared by several success/failure responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse { message: message.into() }
    }
}

/// `{"value": "..."}` body for a successful `GET`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValueResponse {
    pub value: String,
}

/// `{"error": "..."}` body for a not-found or bad-request response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body for the shard-to-shard bulk-import RPC used during migration. Not
/// part of the client-facing contract; internal to the membership
/// controller (spec.md §4.4).
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct BulkImportRequest {
    pub entries: HashMap<String, String>,
}
