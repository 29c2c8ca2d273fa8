//! Creator profile registry over an external key-value ledger.
//!
//! Profiles are stored as JSON records under `profile_<id>`, with numeric
//! fields held as opaque codec tokens. A shared `profile_keys` index lists
//! every id; appends to it go through a compare-and-set retry loop so
//! concurrent creators never drop each other's entries. Reading a profile's
//! values back requires a signature over a session challenge.

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod progress;
pub mod registry;
pub mod signer;
pub mod status;
pub mod store;
pub mod types;

pub use auth::{
    DecryptOutcome, DecryptedValues, DecryptionGate, DecryptionSession, SignError, Signature,
    Signer,
};
pub use codec::{Codec, CodecError, PlaceholderCodec, SealedCodec};
pub use config::{CodecKind, RegistryConfig};
pub use error::{RegistryError, RegistryResult};
pub use index::{AppendOutcome, IndexManager};
pub use progress::{FailureKind, Operation, OperationStatus, ProgressTracker};
pub use registry::Registry;
pub use signer::{verify_challenge, Ed25519Signer};
pub use status::Status;
pub use store::ProfileStore;
pub use types::{filter_by_status, NewProfile, Profile, ProfileRecord, RegistryStats};
