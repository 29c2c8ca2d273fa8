//! Profile records and their ledger layout.

use crate::error::RegistryError;
use crate::status::Status;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

/// Ledger key holding the JSON array of profile ids.
pub const INDEX_KEY: &str = "profile_keys";

/// Prefix of per-profile record keys.
pub const RECORD_PREFIX: &str = "profile_";

/// Current record schema version.
pub const RECORD_VERSION: u32 = 1;

/// Upper bound accepted for ratings.
pub const MAX_RATING: f64 = 5.0;

const ID_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Ledger key for a profile record.
pub fn record_key(id: &str) -> String {
    format!("{}{}", RECORD_PREFIX, id)
}

/// Fresh profile id: creation time in millis plus a random base36 suffix.
pub fn generate_profile_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

fn default_version() -> u32 {
    RECORD_VERSION
}

/// `null`, `""` and a missing key all read as `Pending`.
fn loose_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Status, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Status::Pending),
        Some(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

/// `null` reads as an empty category.
fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Stored shape of a profile, as written under `profile_<id>`.
///
/// Older records carry no `version` and may lack `status` or hold it as
/// `null` or `""`; all of these are defaulted here and nowhere else. Fields this version does not know
/// about are kept in `extra` so rewrites preserve them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Encoded revenue token
    pub revenue: String,

    /// Encoded rating token
    pub rating: String,

    /// Creation time, seconds since epoch
    pub timestamp: i64,

    pub owner: String,

    #[serde(default, deserialize_with = "loose_string")]
    pub category: String,

    #[serde(default, deserialize_with = "loose_status")]
    pub status: Status,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProfileRecord {
    /// Create a new pending record stamped with the current time.
    pub fn new_pending(
        revenue: String,
        rating: String,
        owner: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            version: RECORD_VERSION,
            revenue,
            rating,
            timestamp: Utc::now().timestamp(),
            owner: owner.into(),
            category: category.into(),
            status: Status::Pending,
            extra: serde_json::Map::new(),
        }
    }

    /// Parse a stored record, applying schema defaults.
    pub fn from_slice(key: &str, bytes: &[u8]) -> Result<Self, RegistryError> {
        let record: ProfileRecord =
            serde_json::from_slice(bytes).map_err(|source| RegistryError::ParseFailure {
                key: key.to_string(),
                source,
            })?;

        if record.version > RECORD_VERSION {
            return Err(RegistryError::ParseFailure {
                key: key.to_string(),
                source: <serde_json::Error as serde::de::Error>::custom(format!(
                    "unsupported record version {}",
                    record.version
                )),
            });
        }

        Ok(record)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, RegistryError> {
        serde_json::to_vec(self).map_err(RegistryError::Serialization)
    }
}

/// A creator profile as seen by callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub encrypted_revenue: String,
    pub encrypted_rating: String,
    pub timestamp: i64,
    pub owner: String,
    pub category: String,
    pub status: Status,
}

impl Profile {
    pub fn from_record(id: impl Into<String>, record: &ProfileRecord) -> Self {
        Self {
            id: id.into(),
            encrypted_revenue: record.revenue.clone(),
            encrypted_rating: record.rating.clone(),
            timestamp: record.timestamp,
            owner: record.owner.clone(),
            category: record.category.clone(),
            status: record.status,
        }
    }

    /// Owner comparison ignores case (hex addresses vary in case) and
    /// surrounding whitespace.
    pub fn is_owned_by(&self, caller: &str) -> bool {
        self.owner.trim().eq_ignore_ascii_case(caller.trim())
    }
}

/// Input for creating a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub category: String,
    pub revenue: f64,
    pub rating: f64,
    pub owner: String,
}

impl NewProfile {
    pub fn new(
        category: impl Into<String>,
        revenue: f64,
        rating: f64,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            revenue,
            rating,
            owner: owner.into(),
        }
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.category.trim().is_empty() {
            return Err(RegistryError::InvalidInput("category is required".into()));
        }
        if self.owner.trim().is_empty() {
            return Err(RegistryError::InvalidInput("owner is required".into()));
        }
        if !self.revenue.is_finite() {
            return Err(RegistryError::InvalidInput(
                "revenue must be a finite number".into(),
            ));
        }
        if !self.rating.is_finite() || !(0.0..=MAX_RATING).contains(&self.rating) {
            return Err(RegistryError::InvalidInput(format!(
                "rating must be between 0 and {}",
                MAX_RATING
            )));
        }
        Ok(())
    }
}

/// Profile counts per status.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RegistryStats {
    pub total: usize,
    pub pending: usize,
    pub verified: usize,
    pub rejected: usize,
}

impl RegistryStats {
    pub fn from_profiles(profiles: &[Profile]) -> Self {
        profiles.iter().fold(Self::default(), |mut stats, p| {
            stats.total += 1;
            match p.status {
                Status::Pending => stats.pending += 1,
                Status::Verified => stats.verified += 1,
                Status::Rejected => stats.rejected += 1,
            }
            stats
        })
    }
}

/// Keep profiles with the given status; `None` keeps everything.
pub fn filter_by_status(profiles: &[Profile], status: Option<Status>) -> Vec<Profile> {
    profiles
        .iter()
        .filter(|p| status.map_or(true, |s| p.status == s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, status: Status) -> Profile {
        Profile {
            id: id.into(),
            encrypted_revenue: "FHE-MQ==".into(),
            encrypted_rating: "FHE-MQ==".into(),
            timestamp: 1_700_000_000,
            owner: "0xAbC".into(),
            category: "Artist".into(),
            status,
        }
    }

    #[test]
    fn test_record_key() {
        assert_eq!(record_key("abc"), "profile_abc");
    }

    #[test]
    fn test_generate_profile_id_shape() {
        let id = generate_profile_id();
        let (millis, suffix) = id.split_once('-').unwrap();

        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
        assert_ne!(generate_profile_id(), id);
    }

    #[test]
    fn test_record_defaults_at_boundary() {
        let json = r#"{
            "revenue": "FHE-MTIwMC41",
            "rating": "FHE-NC41",
            "timestamp": 1700000000,
            "owner": "0xabc",
            "category": "Artist"
        }"#;

        let record = ProfileRecord::from_slice("profile_x", json.as_bytes()).unwrap();
        assert_eq!(record.version, RECORD_VERSION);
        assert_eq!(record.status, Status::Pending);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_record_preserves_unknown_fields() {
        let json = r#"{
            "revenue": "1", "rating": "2", "timestamp": 1, "owner": "o",
            "category": "c", "status": "pending", "note": "keep me"
        }"#;

        let record = ProfileRecord::from_slice("profile_x", json.as_bytes()).unwrap();
        assert_eq!(record.extra["note"], "keep me");

        let written: serde_json::Value = serde_json::from_slice(&record.to_vec().unwrap()).unwrap();
        assert_eq!(written["note"], "keep me");
        assert_eq!(written["version"], 1);
    }

    #[test]
    fn test_record_null_and_empty_fields_default() {
        let null_status = r#"{"revenue":"1","rating":"2","timestamp":1,"owner":"o","category":null,"status":null}"#;
        let record = ProfileRecord::from_slice("profile_x", null_status.as_bytes()).unwrap();
        assert_eq!(record.status, Status::Pending);
        assert_eq!(record.category, "");
        assert!(record.extra.is_empty());

        let empty_status = r#"{"revenue":"1","rating":"2","timestamp":1,"owner":"o","category":"Artist","status":""}"#;
        let record = ProfileRecord::from_slice("profile_x", empty_status.as_bytes()).unwrap();
        assert_eq!(record.status, Status::Pending);
        assert_eq!(record.category, "Artist");

        let written: serde_json::Value = serde_json::from_slice(&record.to_vec().unwrap()).unwrap();
        assert_eq!(written["status"], "pending");
    }

    #[test]
    fn test_record_rejects_unknown_status() {
        let json = r#"{"revenue":"1","rating":"2","timestamp":1,"owner":"o","status":"approved"}"#;
        let result = ProfileRecord::from_slice("profile_x", json.as_bytes());
        assert!(matches!(result, Err(RegistryError::ParseFailure { key, .. }) if key == "profile_x"));
    }

    #[test]
    fn test_record_rejects_future_version() {
        let json = r#"{"version":9,"revenue":"1","rating":"2","timestamp":1,"owner":"o"}"#;
        let result = ProfileRecord::from_slice("profile_x", json.as_bytes());
        assert!(matches!(result, Err(RegistryError::ParseFailure { .. })));
    }

    #[test]
    fn test_profile_wire_names() {
        let json = serde_json::to_value(profile("a", Status::Verified)).unwrap();
        assert_eq!(json["encryptedRevenue"], "FHE-MQ==");
        assert_eq!(json["status"], "verified");
    }

    #[test]
    fn test_owner_check_is_case_insensitive() {
        let p = profile("a", Status::Pending);
        assert!(p.is_owned_by("0xabc"));
        assert!(p.is_owned_by("0XABC"));
        assert!(!p.is_owned_by("0xabd"));

        let padded = Profile {
            owner: " 0xAbC ".into(),
            ..profile("b", Status::Pending)
        };
        assert!(padded.is_owned_by("0xabc"));
        assert!(padded.is_owned_by("  0XABC"));
    }

    #[test]
    fn test_new_profile_validation() {
        assert!(NewProfile::new("Artist", 1200.5, 4.5, "0xabc").validate().is_ok());
        assert!(NewProfile::new(" ", 1.0, 1.0, "0xabc").validate().is_err());
        assert!(NewProfile::new("Artist", 1.0, 1.0, "").validate().is_err());
        assert!(NewProfile::new("Artist", f64::NAN, 1.0, "0xabc").validate().is_err());
        assert!(NewProfile::new("Artist", 1.0, 5.5, "0xabc").validate().is_err());
        assert!(NewProfile::new("Artist", 1.0, -1.0, "0xabc").validate().is_err());
    }

    #[test]
    fn test_stats_and_filter() {
        let profiles = vec![
            profile("a", Status::Pending),
            profile("b", Status::Verified),
            profile("c", Status::Pending),
            profile("d", Status::Rejected),
        ];

        let stats = RegistryStats::from_profiles(&profiles);
        assert_eq!(
            stats,
            RegistryStats {
                total: 4,
                pending: 2,
                verified: 1,
                rejected: 1
            }
        );

        let pending = filter_by_status(&profiles, Some(Status::Pending));
        assert_eq!(
            pending.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "c"]
        );
        assert_eq!(filter_by_status(&profiles, None).len(), 4);
    }
}
