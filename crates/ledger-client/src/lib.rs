//! Key-value ledger client.
//!
//! The ledger is an external store that persists opaque byte blobs by
//! string key. This crate defines the capability surface the registry
//! consumes and ships two backends: a process-local store and a client
//! for the REST key-value gateway.

mod error;
mod http;
mod memory;
mod types;

pub use error::LedgerError;
pub use http::HttpLedger;
pub use memory::{MemoryLedger, WriteFault};
pub use types::*;

use async_trait::async_trait;

/// Capability surface of the external ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Readiness check. `false` means "skip this operation", not an error.
    async fn is_available(&self) -> bool;

    /// Read a value. Absent keys return empty bytes.
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError>;

    /// Durable unconditional write.
    async fn set_data(&self, key: &str, value: &[u8]) -> Result<(), LedgerError>;

    /// Atomically replace the value at `key` if it currently equals
    /// `expected` (empty `expected` matches an absent key).
    ///
    /// Returns `false` without writing when another writer got there first.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: &[u8],
        value: &[u8],
    ) -> Result<bool, LedgerError>;

    /// Identity of the store instance.
    async fn get_own_address(&self) -> Result<String, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_http_ledger(mock_server: &MockServer) -> HttpLedger {
        HttpLedger::new(mock_server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_memory_absent_key_is_empty() {
        let ledger = MemoryLedger::default();
        let value = ledger.get_data("missing").await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_memory_set_and_get() {
        let ledger = MemoryLedger::default();
        ledger.set_data("profile_a", b"{}").await.unwrap();

        assert_eq!(ledger.get_data("profile_a").await.unwrap(), b"{}");
        assert_eq!(ledger.keys().await, vec!["profile_a".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_compare_and_set() {
        let ledger = MemoryLedger::default();

        // Empty expectation matches an absent key
        assert!(ledger.compare_and_set("k", b"", b"one").await.unwrap());

        // Stale expectation loses and leaves the value alone
        assert!(!ledger.compare_and_set("k", b"", b"two").await.unwrap());
        assert_eq!(ledger.get_data("k").await.unwrap(), b"one");

        assert!(ledger.compare_and_set("k", b"one", b"two").await.unwrap());
        assert_eq!(ledger.get_data("k").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_memory_availability_toggle() {
        let ledger = MemoryLedger::default();
        assert!(ledger.is_available().await);

        ledger.set_available(false);
        assert!(!ledger.is_available().await);
    }

    #[tokio::test]
    async fn test_memory_write_faults() {
        let ledger = MemoryLedger::default();
        ledger.fail_writes("profile_keys", WriteFault::Declined).await;

        let result = ledger.set_data("profile_keys", b"[]").await;
        assert!(matches!(result, Err(LedgerError::Declined)));

        let result = ledger.compare_and_set("profile_keys", b"", b"[]").await;
        assert!(matches!(result, Err(LedgerError::Declined)));

        // Other keys are unaffected
        ledger.set_data("profile_x", b"{}").await.unwrap();

        ledger.clear_faults().await;
        ledger.set_data("profile_keys", b"[]").await.unwrap();
    }

    #[test]
    fn test_declined_classification() {
        assert!(LedgerError::Declined.is_declined());
        assert!(!LedgerError::Unavailable("down".into()).is_declined());
        assert!(!LedgerError::Unauthorized("k".into()).is_declined());
    }

    #[test]
    fn test_memory_address() {
        let ledger = MemoryLedger::new("0xabc");
        let address = tokio_test::block_on(ledger.get_own_address()).unwrap();
        assert_eq!(address, "0xabc");
    }

    #[tokio::test]
    async fn test_http_get_data() {
        let mock_server = MockServer::start().await;

        // "W10=" is base64 for "[]"
        Mock::given(method("GET"))
            .and(path("/v1/data/profile_keys"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": "W10=" })),
            )
            .mount(&mock_server)
            .await;

        let ledger = test_http_ledger(&mock_server);
        let value = ledger.get_data("profile_keys").await.unwrap();
        assert_eq!(value, b"[]");
    }

    #[tokio::test]
    async fn test_http_get_absent_key() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/data/profile_a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": null })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/data/profile_b"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let ledger = test_http_ledger(&mock_server);
        assert!(ledger.get_data("profile_a").await.unwrap().is_empty());
        assert!(ledger.get_data("profile_b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_set_data() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/v1/data/profile_a"))
            .and(body_json(serde_json::json!({ "value": "e30=" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let ledger = test_http_ledger(&mock_server);
        ledger.set_data("profile_a", b"{}").await.unwrap();
    }

    #[tokio::test]
    async fn test_http_set_data_declined() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/v1/data/profile_a"))
            .respond_with(ResponseTemplate::new(401).set_body_string("user rejected transaction"))
            .mount(&mock_server)
            .await;

        let ledger = test_http_ledger(&mock_server);
        let result = ledger.set_data("profile_a", b"{}").await;
        assert!(matches!(result, Err(LedgerError::Declined)));
    }

    #[tokio::test]
    async fn test_http_set_data_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/v1/data/profile_a"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let ledger = test_http_ledger(&mock_server);
        let result = ledger.set_data("profile_a", b"{}").await;
        assert!(matches!(result, Err(LedgerError::Rejected { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_http_compare_and_set() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/data/profile_keys/cas"))
            .and(body_json(serde_json::json!({ "expected": "", "value": "W10=" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "swapped": true })))
            .mount(&mock_server)
            .await;

        let ledger = test_http_ledger(&mock_server);
        assert!(ledger.compare_and_set("profile_keys", b"", b"[]").await.unwrap());
    }

    #[tokio::test]
    async fn test_http_health_and_address() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "available": true })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/address"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "address": "0xfeed" })),
            )
            .mount(&mock_server)
            .await;

        let ledger = test_http_ledger(&mock_server);
        assert!(ledger.is_available().await);
        assert_eq!(ledger.get_own_address().await.unwrap(), "0xfeed");
    }

    #[tokio::test]
    async fn test_http_unreachable_is_unavailable() {
        let ledger = HttpLedger::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();
        assert!(!ledger.is_available().await);
    }
}
