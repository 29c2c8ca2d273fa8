//! Profile records over the ledger.

use crate::codec::Codec;
use crate::error::RegistryError;
use crate::index::{AppendOutcome, IndexManager};
use crate::status::Status;
use crate::types::{generate_profile_id, record_key, NewProfile, Profile, ProfileRecord};
use futures::stream::{self, StreamExt};
use ledger_client::Ledger;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default number of record reads in flight while listing.
pub const DEFAULT_LIST_CONCURRENCY: usize = 8;

/// Creates, lists and updates profile records.
#[derive(Clone)]
pub struct ProfileStore {
    ledger: Arc<dyn Ledger>,
    index: IndexManager,
    codec: Arc<dyn Codec>,
    list_concurrency: usize,
}

impl ProfileStore {
    pub fn new(ledger: Arc<dyn Ledger>, codec: Arc<dyn Codec>) -> Self {
        Self {
            index: IndexManager::new(ledger.clone()),
            ledger,
            codec,
            list_concurrency: DEFAULT_LIST_CONCURRENCY,
        }
    }

    /// Replace the index manager (e.g. to tune its retry budget).
    pub fn with_index(mut self, index: IndexManager) -> Self {
        self.index = index;
        self
    }

    pub fn with_list_concurrency(mut self, concurrency: usize) -> Self {
        self.list_concurrency = concurrency.max(1);
        self
    }

    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Read and parse one record. `Ok(None)` when the key is absent.
    async fn fetch_record(&self, id: &str) -> Result<Option<ProfileRecord>, RegistryError> {
        let key = record_key(id);
        let bytes = self.ledger.get_data(&key).await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        ProfileRecord::from_slice(&key, &bytes).map(Some)
    }

    /// All indexed profiles, newest first.
    ///
    /// Index entries without a record, corrupt records and records that
    /// fail to load are skipped and logged. Equal timestamps keep index
    /// order. Returns an empty list while the ledger reports unavailable.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Profile>, RegistryError> {
        if !self.ledger.is_available().await {
            warn!("Ledger unavailable, skipping profile listing");
            return Ok(Vec::new());
        }

        let ids = self.index.list_ids().await?;

        let mut seen = HashSet::new();
        let unique: Vec<String> = ids
            .into_iter()
            .filter(|id| {
                let fresh = seen.insert(id.clone());
                if !fresh {
                    debug!(id = %id, "Skipping duplicate index entry");
                }
                fresh
            })
            .collect();

        let fetched: Vec<(String, Result<Option<ProfileRecord>, RegistryError>)> =
            stream::iter(unique)
                .map(|id| async move {
                    let result = self.fetch_record(&id).await;
                    (id, result)
                })
                .buffered(self.list_concurrency)
                .collect()
                .await;

        let mut profiles = Vec::with_capacity(fetched.len());
        for (id, result) in fetched {
            match result {
                Ok(Some(record)) => profiles.push(Profile::from_record(id, &record)),
                Ok(None) => warn!(id = %id, "Indexed profile has no record, skipping"),
                Err(e) => warn!(id = %id, error = %e, "Error loading profile, skipping"),
            }
        }

        // Stable: equal timestamps keep index order
        profiles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        debug!("Listed {} profiles", profiles.len());
        Ok(profiles)
    }

    /// Load a single profile.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Profile, RegistryError> {
        match self.fetch_record(id).await? {
            Some(record) => Ok(Profile::from_record(id, &record)),
            None => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    /// Create a pending profile.
    ///
    /// The record is written and awaited before the id is appended to the
    /// index. If only the append fails the record is already durable:
    /// the error is `IndexAppendFailed` and the caller should use
    /// [`ProfileStore::retry_index`] rather than creating again.
    #[instrument(skip(self, new), fields(category = %new.category))]
    pub async fn create(&self, new: NewProfile) -> Result<Profile, RegistryError> {
        new.validate()?;

        let revenue = self.codec.encode(new.revenue)?;
        let rating = self.codec.encode(new.rating)?;

        let id = generate_profile_id();
        let record = ProfileRecord::new_pending(revenue, rating, new.owner, new.category);

        self.ledger
            .set_data(&record_key(&id), &record.to_vec()?)
            .await?;
        info!(id = %id, codec = self.codec.name(), "Stored profile record");

        if let Err(e) = self.index.append_id(&id).await {
            warn!(id = %id, error = %e, "Profile stored but index append failed");
            return Err(RegistryError::IndexAppendFailed {
                id,
                source: Box::new(e),
            });
        }

        Ok(Profile::from_record(id, &record))
    }

    /// Re-run only the index append for an already stored profile.
    #[instrument(skip(self))]
    pub async fn retry_index(&self, id: &str) -> Result<AppendOutcome, RegistryError> {
        if self.fetch_record(id).await?.is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        self.index.append_id(id).await
    }

    /// Move a profile to `next` on behalf of `caller`.
    ///
    /// Only the profile owner may change its status, and only along the
    /// legal lifecycle edges. Everything but `status` is written back
    /// unchanged.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: &str,
        next: Status,
        caller: &str,
    ) -> Result<Profile, RegistryError> {
        let mut record = self
            .fetch_record(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if !Profile::from_record(id, &record).is_owned_by(caller) {
            warn!(id = %id, caller = %caller, "Status change refused for non-owner");
            return Err(RegistryError::Unauthorized {
                id: id.to_string(),
                caller: caller.to_string(),
            });
        }

        record.status = record.status.transition(next)?;

        self.ledger
            .set_data(&record_key(id), &record.to_vec()?)
            .await?;
        info!(id = %id, status = %record.status, "Profile status updated");

        Ok(Profile::from_record(id, &record))
    }
}
