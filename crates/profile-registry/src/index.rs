//! Index of known profile ids.
//!
//! The index is one JSON array under `profile_keys`, shared by every
//! writer. Appends use an optimistic-concurrency loop: read the blob, add
//! the id, and write back with compare-and-set against the exact bytes
//! that were read. A lost swap means another writer got in between; the
//! loop re-reads and tries again, so no append is ever silently dropped.

use crate::error::RegistryError;
use crate::types::INDEX_KEY;
use ledger_client::Ledger;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Default number of compare-and-set attempts per append.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base backoff between attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Result of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The id was added; `attempts` counts compare-and-set calls issued
    Appended { attempts: u32 },
    /// The id was already indexed, nothing written
    AlreadyPresent,
}

/// Parse an index blob. Absent or unreadable blobs read as empty.
fn parse_index(bytes: &[u8]) -> Vec<String> {
    if bytes.is_empty() {
        return Vec::new();
    }

    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            warn!("Index blob is not UTF-8, treating as empty: {}", e);
            return Vec::new();
        }
    };

    if text.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str(text) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Error parsing profile keys, treating as empty: {}", e);
            Vec::new()
        }
    }
}

/// Maintains the list of profile ids.
#[derive(Clone)]
pub struct IndexManager {
    ledger: Arc<dyn Ledger>,
    max_attempts: u32,
    backoff: Duration,
}

impl IndexManager {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Set the compare-and-set attempt budget (at least one).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the base backoff between attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    async fn read(&self) -> Result<(Vec<u8>, Vec<String>), RegistryError> {
        let raw = self.ledger.get_data(INDEX_KEY).await?;
        let ids = parse_index(&raw);
        Ok((raw, ids))
    }

    /// Current known ids, in append order.
    #[instrument(skip(self))]
    pub async fn list_ids(&self) -> Result<Vec<String>, RegistryError> {
        let (_, ids) = self.read().await?;
        debug!("Index holds {} ids", ids.len());
        Ok(ids)
    }

    /// Append `id` to the index. Idempotent.
    ///
    /// Fails with `IndexContention` after `max_attempts` lost races; the
    /// caller may simply call again.
    #[instrument(skip(self))]
    pub async fn append_id(&self, id: &str) -> Result<AppendOutcome, RegistryError> {
        for attempt in 1..=self.max_attempts {
            let (raw, mut ids) = self.read().await?;

            if ids.iter().any(|existing| existing == id) {
                debug!("Id already indexed");
                return Ok(AppendOutcome::AlreadyPresent);
            }

            ids.push(id.to_string());
            let updated = serde_json::to_vec(&ids).map_err(RegistryError::Serialization)?;

            if self.ledger.compare_and_set(INDEX_KEY, &raw, &updated).await? {
                info!(attempt, total = ids.len(), "Indexed profile");
                return Ok(AppendOutcome::Appended { attempts: attempt });
            }

            warn!(attempt, "Index changed underneath append, retrying");

            if attempt < self.max_attempts {
                sleep(self.retry_delay(attempt)).await;
            }
        }

        Err(RegistryError::IndexContention {
            id: id.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Linear backoff with jitter so racing writers fall out of lockstep.
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let jitter = rand::thread_rng().gen_range(0..=base);
        Duration::from_millis(base * u64::from(attempt) + jitter)
    }
}
