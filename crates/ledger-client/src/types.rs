//! Ledger gateway wire types.

use serde::{Deserialize, Serialize};

/// Readiness check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub available: bool,
}

/// Store instance identity.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressResponse {
    pub address: String,
}

/// Value lookup response.
#[derive(Debug, Clone, Deserialize)]
pub struct GetDataResponse {
    /// Base64-encoded value; absent keys come back as null
    #[serde(default)]
    pub value: Option<String>,
}

/// Unconditional write request.
#[derive(Debug, Clone, Serialize)]
pub struct SetDataRequest {
    /// Base64-encoded value
    pub value: String,
}

/// Conditional write request.
#[derive(Debug, Clone, Serialize)]
pub struct CompareAndSetRequest {
    /// Base64-encoded bytes the caller last observed (empty = key absent)
    pub expected: String,

    /// Base64-encoded replacement value
    pub value: String,
}

/// Conditional write response.
#[derive(Debug, Clone, Deserialize)]
pub struct CompareAndSetResponse {
    pub swapped: bool,
}
