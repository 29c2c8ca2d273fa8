//! In-memory ledger for tests and local runs.

use crate::error::LedgerError;
use crate::Ledger;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Failure injected into writes whose key matches a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    /// Behave as if the signer refused the write
    Declined,
    /// Behave as if the ledger dropped the connection
    Unavailable,
}

impl WriteFault {
    fn to_error(self, key: &str) -> LedgerError {
        match self {
            WriteFault::Declined => LedgerError::Declined,
            WriteFault::Unavailable => {
                LedgerError::Unavailable(format!("injected fault writing {}", key))
            }
        }
    }
}

/// Process-local ledger.
///
/// Every call yields to the scheduler before touching state, so concurrent
/// tasks interleave the way they would against a remote store.
#[derive(Clone)]
pub struct MemoryLedger {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    faults: Arc<RwLock<Vec<(String, WriteFault)>>>,
    available: Arc<AtomicBool>,
    address: String,
}

impl MemoryLedger {
    /// Create an empty ledger identified by `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            faults: Arc::new(RwLock::new(Vec::new())),
            available: Arc::new(AtomicBool::new(true)),
            address: address.into(),
        }
    }

    /// Toggle the readiness check.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make writes to keys starting with `prefix` fail with `fault`.
    pub async fn fail_writes(&self, prefix: impl Into<String>, fault: WriteFault) {
        self.faults.write().await.push((prefix.into(), fault));
    }

    /// Remove all injected faults.
    pub async fn clear_faults(&self) {
        self.faults.write().await.clear();
    }

    /// Insert raw bytes without going through fault injection.
    pub async fn seed(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.write().await.insert(key.into(), value.into());
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn check_fault(&self, key: &str) -> Result<(), LedgerError> {
        let faults = self.faults.read().await;
        match faults.iter().find(|(prefix, _)| key.starts_with(prefix.as_str())) {
            Some((_, fault)) => Err(fault.to_error(key)),
            None => Ok(()),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new("0x0000000000000000000000000000000000000000")
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn is_available(&self) -> bool {
        tokio::task::yield_now().await;
        self.available.load(Ordering::SeqCst)
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        tokio::task::yield_now().await;
        Ok(self.entries.read().await.get(key).cloned().unwrap_or_default())
    }

    async fn set_data(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        tokio::task::yield_now().await;
        self.check_fault(key).await?;

        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        debug!("Memory ledger: wrote {} bytes to {}", value.len(), key);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: &[u8],
        value: &[u8],
    ) -> Result<bool, LedgerError> {
        tokio::task::yield_now().await;
        self.check_fault(key).await?;

        let mut entries = self.entries.write().await;
        let current = entries.get(key).map(Vec::as_slice).unwrap_or_default();
        if current != expected {
            debug!("Memory ledger: compare-and-set lost on {}", key);
            return Ok(false);
        }

        entries.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    async fn get_own_address(&self) -> Result<String, LedgerError> {
        Ok(self.address.clone())
    }
}
