//! Signature-gated decryption.
//!
//! A `DecryptionSession` fixes the challenge fields once, when the session
//! starts. Revealing a profile's values requires a signature over the
//! session challenge; only after the signer answers are the tokens decoded.

use crate::codec::Codec;
use crate::error::RegistryError;
use crate::types::Profile;
use async_trait::async_trait;
use chrono::Utc;
use ledger_client::Ledger;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Default session validity.
pub const DEFAULT_DURATION_DAYS: u32 = 30;

/// Bytes of random public-key material (rendered as 2000 hex chars).
const PUBLIC_KEY_BYTES: usize = 1000;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Opaque signature returned by a signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(pub String);

/// Why a signature was not produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("Signature request declined")]
    Declined,

    #[error("Signing failed: {0}")]
    Failed(String),
}

impl SignError {
    pub fn is_declined(&self) -> bool {
        matches!(self, SignError::Declined)
    }
}

/// External signing capability (a wallet, or a local key).
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, message: &str) -> Result<Signature, SignError>;
}

/// SHA-256 over the two tokens being revealed, hex encoded.
pub fn ciphertext_digest(revenue_token: &str, rating_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(revenue_token.as_bytes());
    hasher.update(b"\n");
    hasher.update(rating_token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Challenge parameters, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionSession {
    pub public_key: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub start_timestamp: i64,
    pub duration_days: u32,
}

impl DecryptionSession {
    /// Rebuild a session from known values, e.g. to reproduce a challenge
    /// when checking a signature.
    pub fn new(
        public_key: impl Into<String>,
        contract_address: impl Into<String>,
        chain_id: u64,
        start_timestamp: i64,
        duration_days: u32,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            contract_address: contract_address.into(),
            chain_id,
            start_timestamp,
            duration_days,
        }
    }

    /// Start a session now with fresh public-key material.
    #[instrument(skip(ledger))]
    pub async fn start(
        ledger: &dyn Ledger,
        chain_id: u64,
        duration_days: u32,
    ) -> Result<Self, RegistryError> {
        let contract_address = ledger.get_own_address().await?;
        let session = Self::new(
            Self::generate_public_key(),
            contract_address,
            chain_id,
            Utc::now().timestamp(),
            duration_days,
        );
        info!(
            address = %session.contract_address,
            expires_at = session.expires_at(),
            "Decryption session started"
        );
        Ok(session)
    }

    /// `0x` followed by 2000 random hex characters.
    pub fn generate_public_key() -> String {
        let mut bytes = vec![0u8; PUBLIC_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }

    pub fn expires_at(&self) -> i64 {
        self.start_timestamp + i64::from(self.duration_days) * SECONDS_PER_DAY
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at()
    }

    /// The five-line session challenge.
    pub fn challenge(&self) -> String {
        format!(
            "publickey:{}\ncontractAddresses:{}\ncontractsChainId:{}\nstartTimestamp:{}\ndurationDays:{}",
            self.public_key,
            self.contract_address,
            self.chain_id,
            self.start_timestamp,
            self.duration_days
        )
    }

    /// Session challenge bound to a specific pair of tokens.
    pub fn challenge_for(&self, revenue_token: &str, rating_token: &str) -> String {
        format!(
            "{}\nciphertextDigest:{}",
            self.challenge(),
            ciphertext_digest(revenue_token, rating_token)
        )
    }
}

/// Plaintext values; a field that failed to decode is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecryptedValues {
    pub revenue: Option<f64>,
    pub rating: Option<f64>,
}

/// Result of a decryption request.
#[derive(Debug, Clone, PartialEq)]
pub enum DecryptOutcome {
    /// No signature, nothing decoded
    Withheld { reason: SignError },
    /// Signature obtained, tokens decoded
    Revealed(DecryptedValues),
}

impl DecryptOutcome {
    pub fn is_revealed(&self) -> bool {
        matches!(self, DecryptOutcome::Revealed(_))
    }

    pub fn values(&self) -> Option<&DecryptedValues> {
        match self {
            DecryptOutcome::Revealed(values) => Some(values),
            DecryptOutcome::Withheld { .. } => None,
        }
    }
}

/// Releases decoded values only after a successful signature.
#[derive(Clone)]
pub struct DecryptionGate {
    session: DecryptionSession,
    codec: Arc<dyn Codec>,
    bind_ciphertexts: bool,
}

impl DecryptionGate {
    pub fn new(session: DecryptionSession, codec: Arc<dyn Codec>) -> Self {
        Self {
            session,
            codec,
            bind_ciphertexts: true,
        }
    }

    /// Whether challenges include the digest of the tokens being revealed.
    pub fn with_ciphertext_binding(mut self, bind: bool) -> Self {
        self.bind_ciphertexts = bind;
        self
    }

    pub fn session(&self) -> &DecryptionSession {
        &self.session
    }

    /// Same codec and binding over a different session.
    pub fn with_session(&self, session: DecryptionSession) -> Self {
        Self {
            session,
            codec: self.codec.clone(),
            bind_ciphertexts: self.bind_ciphertexts,
        }
    }

    /// Exact text the signer is asked to sign for `profile`.
    pub fn challenge_for(&self, profile: &Profile) -> String {
        if self.bind_ciphertexts {
            self.session
                .challenge_for(&profile.encrypted_revenue, &profile.encrypted_rating)
        } else {
            self.session.challenge()
        }
    }

    fn decode_field(&self, id: &str, field: &str, token: &str) -> Option<f64> {
        match self.codec.decode(token) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(id = %id, field, error = %e, "Failed to decode field");
                None
            }
        }
    }

    /// Ask `signer` to sign the challenge, then decode the snapshot's tokens.
    ///
    /// Works on the tokens of `profile` as passed in; a concurrent rewrite
    /// of the stored record does not change what is revealed.
    #[instrument(skip(self, profile, signer), fields(id = %profile.id))]
    pub async fn decrypt_with_signature(
        &self,
        profile: &Profile,
        signer: &dyn Signer,
    ) -> Result<DecryptOutcome, RegistryError> {
        let now = Utc::now().timestamp();
        if self.session.is_expired_at(now) {
            return Err(RegistryError::SessionExpired {
                expired_at: self.session.expires_at(),
            });
        }

        let challenge = self.challenge_for(profile);

        if let Err(reason) = signer.sign(&challenge).await {
            warn!(error = %reason, "Decryption withheld");
            return Ok(DecryptOutcome::Withheld { reason });
        }

        let values = DecryptedValues {
            revenue: self.decode_field(&profile.id, "revenue", &profile.encrypted_revenue),
            rating: self.decode_field(&profile.id, "rating", &profile.encrypted_rating),
        };

        info!("Profile values revealed");
        Ok(DecryptOutcome::Revealed(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PlaceholderCodec;
    use crate::status::Status;
    use ledger_client::MemoryLedger;
    use std::sync::Mutex;

    /// Records every message it is asked to sign.
    struct RecordingSigner {
        response: Result<Signature, SignError>,
        seen: Mutex<Vec<String>>,
    }

    impl RecordingSigner {
        fn new(response: Result<Signature, SignError>) -> Self {
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Signer for RecordingSigner {
        async fn sign(&self, message: &str) -> Result<Signature, SignError> {
            self.seen.lock().unwrap().push(message.to_string());
            self.response.clone()
        }
    }

    fn session() -> DecryptionSession {
        DecryptionSession::new("0xkey", "0xcontract", 11155111, Utc::now().timestamp(), 30)
    }

    fn profile(revenue: &str, rating: &str) -> Profile {
        Profile {
            id: "p1".into(),
            encrypted_revenue: revenue.into(),
            encrypted_rating: rating.into(),
            timestamp: 1,
            owner: "0xabc".into(),
            category: "Artist".into(),
            status: Status::Pending,
        }
    }

    fn gate() -> DecryptionGate {
        DecryptionGate::new(session(), Arc::new(PlaceholderCodec))
    }

    #[test]
    fn test_challenge_layout() {
        let session = DecryptionSession::new("0xkey", "0xcontract", 1, 1700000000, 30);
        assert_eq!(
            session.challenge(),
            "publickey:0xkey\ncontractAddresses:0xcontract\ncontractsChainId:1\nstartTimestamp:1700000000\ndurationDays:30"
        );
    }

    #[test]
    fn test_challenge_is_reproducible() {
        let a = DecryptionSession::new("0xkey", "0xc", 5, 42, 30);
        let b = DecryptionSession::new("0xkey", "0xc", 5, 42, 30);
        assert_eq!(a.challenge_for("x", "y"), b.challenge_for("x", "y"));
    }

    #[test]
    fn test_bound_challenge_differs_per_ciphertext() {
        let session = session();
        let a = session.challenge_for("FHE-MQ==", "FHE-Mg==");
        let b = session.challenge_for("FHE-Mw==", "FHE-Mg==");

        assert!(a.starts_with(&session.challenge()));
        assert!(a.contains("\nciphertextDigest:"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_public_key_shape() {
        let key = DecryptionSession::generate_public_key();
        assert!(key.starts_with("0x"));
        assert_eq!(key.len(), 2 + 2000);
        assert!(key[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, DecryptionSession::generate_public_key());
    }

    #[test]
    fn test_expiry() {
        let session = DecryptionSession::new("k", "a", 1, 1000, 1);
        assert_eq!(session.expires_at(), 1000 + 86400);
        assert!(!session.is_expired_at(1000 + 86399));
        assert!(session.is_expired_at(1000 + 86400));
    }

    #[tokio::test]
    async fn test_start_reads_ledger_address() {
        let ledger = MemoryLedger::new("0xfeed");
        let session = DecryptionSession::start(&ledger, 31337, DEFAULT_DURATION_DAYS)
            .await
            .unwrap();

        assert_eq!(session.contract_address, "0xfeed");
        assert_eq!(session.chain_id, 31337);
        assert_eq!(session.duration_days, 30);
        assert!(!session.is_expired_at(Utc::now().timestamp()));
    }

    #[tokio::test]
    async fn test_declined_signature_withholds_values() {
        let signer = RecordingSigner::new(Err(SignError::Declined));
        let outcome = gate()
            .decrypt_with_signature(&profile("FHE-MQ==", "FHE-Mg=="), &signer)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DecryptOutcome::Withheld {
                reason: SignError::Declined
            }
        );
        assert!(outcome.values().is_none());
    }

    #[tokio::test]
    async fn test_signed_challenge_reveals_values() {
        let gate = gate();
        let p = profile("FHE-MTIwMC41", "FHE-NC41");
        let signer = RecordingSigner::new(Ok(Signature("0xsig".into())));

        let outcome = gate.decrypt_with_signature(&p, &signer).await.unwrap();

        assert_eq!(
            outcome.values(),
            Some(&DecryptedValues {
                revenue: Some(1200.5),
                rating: Some(4.5)
            })
        );
        assert_eq!(signer.seen.lock().unwrap().as_slice(), &[gate.challenge_for(&p)]);
    }

    #[tokio::test]
    async fn test_unbound_challenge_is_session_challenge() {
        let gate = gate().with_ciphertext_binding(false);
        let p = profile("FHE-MQ==", "FHE-Mg==");
        let signer = RecordingSigner::new(Ok(Signature("sig".into())));

        gate.decrypt_with_signature(&p, &signer).await.unwrap();
        assert_eq!(
            signer.seen.lock().unwrap()[0],
            gate.session().challenge()
        );
    }

    #[tokio::test]
    async fn test_one_bad_field_does_not_hide_the_other() {
        let signer = RecordingSigner::new(Ok(Signature("sig".into())));
        let outcome = gate()
            .decrypt_with_signature(&profile("FHE-!!", "FHE-NC41"), &signer)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DecryptOutcome::Revealed(DecryptedValues {
                revenue: None,
                rating: Some(4.5)
            })
        );
    }

    #[tokio::test]
    async fn test_expired_session_is_an_error() {
        let expired = DecryptionSession::new("k", "a", 1, 0, 1);
        let gate = DecryptionGate::new(expired, Arc::new(PlaceholderCodec));
        let signer = RecordingSigner::new(Ok(Signature("sig".into())));

        let result = gate
            .decrypt_with_signature(&profile("1", "2"), &signer)
            .await;
        assert!(matches!(
            result,
            Err(RegistryError::SessionExpired { expired_at: 86400 })
        ));
        assert!(signer.seen.lock().unwrap().is_empty());
    }
}
