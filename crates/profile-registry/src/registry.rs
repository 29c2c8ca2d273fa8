//! Registry facade: the store, the decryption gate and progress reporting
//! behind one handle.

use crate::auth::{DecryptOutcome, DecryptionGate, DecryptionSession, Signer};
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::index::{AppendOutcome, IndexManager};
use crate::progress::{FailureKind, Operation, OperationStatus, ProgressTracker};
use crate::status::Status;
use crate::store::ProfileStore;
use crate::types::{NewProfile, Profile, RegistryStats};
use ledger_client::Ledger;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, instrument};

#[derive(Clone)]
pub struct Registry {
    store: ProfileStore,
    gate: Arc<RwLock<DecryptionGate>>,
    progress: ProgressTracker,
}

impl Registry {
    pub fn new(store: ProfileStore, gate: DecryptionGate) -> Self {
        Self {
            store,
            gate: Arc::new(RwLock::new(gate)),
            progress: ProgressTracker::new(),
        }
    }

    /// Wire a registry over `ledger` and start a decryption session.
    #[instrument(skip(ledger, config))]
    pub async fn connect(
        ledger: Arc<dyn Ledger>,
        config: &RegistryConfig,
    ) -> Result<Self, RegistryError> {
        let codec = config.build_codec()?;

        let index = IndexManager::new(ledger.clone())
            .with_max_attempts(config.index_max_attempts)
            .with_backoff(config.index_retry_backoff);

        let store = ProfileStore::new(ledger.clone(), codec.clone())
            .with_index(index)
            .with_list_concurrency(config.list_concurrency);

        let session =
            DecryptionSession::start(ledger.as_ref(), config.chain_id, config.duration_days)
                .await?;
        let gate = DecryptionGate::new(session, codec)
            .with_ciphertext_binding(config.bind_ciphertexts);

        info!(
            codec = store.codec().name(),
            chain_id = config.chain_id,
            "Registry connected"
        );
        Ok(Self::new(store, gate))
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Snapshot of the current decryption gate.
    pub async fn gate(&self) -> DecryptionGate {
        self.gate.read().await.clone()
    }

    /// Replace the decryption session with a fresh one, keeping the chain
    /// id, duration, codec and binding of the current gate.
    ///
    /// Clones of this registry share the new session.
    #[instrument(skip(self))]
    pub async fn restart_session(&self) -> Result<DecryptionSession, RegistryError> {
        let current = self.gate().await;
        let session = DecryptionSession::start(
            self.store.ledger().as_ref(),
            current.session().chain_id,
            current.session().duration_days,
        )
        .await?;

        *self.gate.write().await = current.with_session(session.clone());
        Ok(session)
    }

    /// Watch operation progress.
    pub fn subscribe(&self) -> watch::Receiver<OperationStatus> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> OperationStatus {
        self.progress.current()
    }

    pub async fn list(&self) -> Result<Vec<Profile>, RegistryError> {
        self.store.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Profile, RegistryError> {
        self.store.get(id).await
    }

    pub async fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let profiles = self.store.list().await?;
        Ok(RegistryStats::from_profiles(&profiles))
    }

    /// Create a profile, reporting progress.
    pub async fn submit(&self, new: NewProfile) -> Result<Profile, RegistryError> {
        self.progress.started(Operation::Create);
        let result = self.store.create(new).await;
        self.progress.finish(Operation::Create, result)
    }

    pub async fn retry_index(&self, id: &str) -> Result<AppendOutcome, RegistryError> {
        self.store.retry_index(id).await
    }

    pub async fn verify(&self, id: &str, caller: &str) -> Result<Profile, RegistryError> {
        self.change_status(Operation::Verify, id, Status::Verified, caller)
            .await
    }

    pub async fn reject(&self, id: &str, caller: &str) -> Result<Profile, RegistryError> {
        self.change_status(Operation::Reject, id, Status::Rejected, caller)
            .await
    }

    async fn change_status(
        &self,
        operation: Operation,
        id: &str,
        next: Status,
        caller: &str,
    ) -> Result<Profile, RegistryError> {
        self.progress.started(operation);
        let result = self.store.set_status(id, next, caller).await;
        self.progress.finish(operation, result)
    }

    /// Fetch a profile and decrypt its values.
    pub async fn decrypt(
        &self,
        id: &str,
        signer: &dyn Signer,
    ) -> Result<DecryptOutcome, RegistryError> {
        self.progress.started(Operation::Decrypt);
        let profile = match self.store.get(id).await {
            Ok(profile) => profile,
            Err(e) => return self.progress.finish(Operation::Decrypt, Err(e)),
        };
        self.decrypt_snapshot(&profile, signer).await
    }

    /// Decrypt the values of an already fetched profile.
    pub async fn decrypt_profile(
        &self,
        profile: &Profile,
        signer: &dyn Signer,
    ) -> Result<DecryptOutcome, RegistryError> {
        self.progress.started(Operation::Decrypt);
        self.decrypt_snapshot(profile, signer).await
    }

    async fn decrypt_snapshot(
        &self,
        profile: &Profile,
        signer: &dyn Signer,
    ) -> Result<DecryptOutcome, RegistryError> {
        let gate = self.gate().await;
        let result = gate.decrypt_with_signature(profile, signer).await;

        if let Ok(DecryptOutcome::Withheld { reason }) = &result {
            let kind = if reason.is_declined() {
                FailureKind::Declined
            } else {
                FailureKind::System
            };
            self.progress
                .failed(Operation::Decrypt, reason.to_string(), kind);
            return result;
        }

        self.progress.finish(Operation::Decrypt, result)
    }
}
