use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::identity::Identity;

/// Upper bound of an analysis score.
pub const MAX_SCORE: u8 = 100;

/// Lifecycle of a lazily computed record.
///
/// A record is created `Pending` by the caller that owns the computation and
/// moves to `Ready` or `Failed` exactly once per computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Ready,
    Failed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Contract analysis
// ---------------------------------------------------------------------------

/// Validated analyzer output for one contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub title: String,
    pub description: String,
    /// Safety score in `[0, 100]`.
    pub score: u8,
    /// Markdown list of risks and points of attention.
    pub body: String,
}

impl Analysis {
    /// Build an analysis, clamping `raw_score` into `[0, 100]`.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        raw_score: f64,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            score: clamp_score(raw_score),
            body: body.into(),
        }
    }
}

/// Round and clamp a raw score. NaN maps to 0.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, f64::from(MAX_SCORE)) as u8
}

/// Cached analysis of the contract stored under `hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub hash: ContentHash,
    pub status: RecordStatus,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub score: u8,
    #[serde(default)]
    pub body: String,
    /// Why the last computation failed. Only set when `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn pending(hash: ContentHash) -> Self {
        Self {
            hash,
            status: RecordStatus::Pending,
            title: String::new(),
            description: String::new(),
            score: 0,
            body: String::new(),
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn ready(hash: ContentHash, analysis: Analysis) -> Self {
        Self {
            hash,
            status: RecordStatus::Ready,
            title: analysis.title,
            description: analysis.description,
            score: analysis.score.min(MAX_SCORE),
            body: analysis.body,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn failed(hash: ContentHash, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            status: RecordStatus::Failed,
            ..Self::pending(hash)
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == RecordStatus::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.status == RecordStatus::Failed
    }
}

// ---------------------------------------------------------------------------
// Identity verification
// ---------------------------------------------------------------------------

/// How sure the verifier is about the extracted fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Fields read off an identity document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Validated verifier output for one identity document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub is_valid: bool,
    pub extracted: ExtractedFields,
}

/// Cached KYC verification of a wallet identity.
///
/// `is_valid = false` with `status = Ready` means the document was examined
/// and rejected; `Failed` means the verifier itself errored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub identity: Identity,
    pub status: RecordStatus,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractedFields>,
    /// Evidence blob the last computation examined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<ContentHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    pub fn pending(identity: Identity, evidence: ContentHash) -> Self {
        Self {
            identity,
            status: RecordStatus::Pending,
            is_valid: false,
            extracted: None,
            evidence: Some(evidence),
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn ready(identity: Identity, evidence: ContentHash, verification: Verification) -> Self {
        Self {
            status: RecordStatus::Ready,
            is_valid: verification.is_valid,
            extracted: Some(verification.extracted),
            ..Self::pending(identity, evidence)
        }
    }

    pub fn failed(identity: Identity, evidence: ContentHash, reason: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Failed,
            error: Some(reason.into()),
            ..Self::pending(identity, evidence)
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == RecordStatus::Ready
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Identities that have signed the contract stored under `hash`.
///
/// Grows monotonically. Kept ordered so serialized output is stable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSet {
    pub hash: ContentHash,
    pub signers: BTreeSet<Identity>,
}

impl SignerSet {
    pub fn empty(hash: ContentHash) -> Self {
        Self {
            hash,
            signers: BTreeSet::new(),
        }
    }

    /// Add a signer. Returns `false` if it was already present.
    pub fn insert(&mut self, identity: Identity) -> bool {
        self.signers.insert(identity)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.signers.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}
