//! The fundamental unit of memory: [`MemoryEntry`], plus its small
//! companion enums [`Category`] and [`DecayClass`].

use serde::{Deserialize, Serialize};

// ============================================================================
// CATEGORY
// ============================================================================

/// Coarse classification of a memory's content.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Preference,
    Decision,
    Entity,
    #[default]
    Fact,
    Other,
}

impl Category {
    /// String form used in storage and JSON payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Preference => "preference",
            Category::Decision => "decision",
            Category::Entity => "entity",
            Category::Fact => "fact",
            Category::Other => "other",
        }
    }

    /// Parse from a stored/JSON string, defaulting to `Other` on mismatch.
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "preference" => Category::Preference,
            "decision" => Category::Decision,
            "entity" => Category::Entity,
            "fact" => Category::Fact,
            _ => Category::Other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// DECAY CLASS
// ============================================================================

/// Lifecycle bucket controlling TTL and access-refresh policy.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayClass {
    Permanent,
    Stable,
    Active,
    Session,
    Checkpoint,
}

impl DecayClass {
    /// Default TTL in seconds, or `None` for permanent (never expires).
    pub fn ttl_seconds(&self) -> Option<i64> {
        match self {
            DecayClass::Permanent => None,
            DecayClass::Stable => Some(90 * 86_400),
            DecayClass::Active => Some(14 * 86_400),
            DecayClass::Session => Some(24 * 3_600),
            DecayClass::Checkpoint => Some(4 * 3_600),
        }
    }

    /// Whether access refresh (§4.5) extends `expiresAt` for this class.
    pub fn is_refreshable(&self) -> bool {
        matches!(self, DecayClass::Stable | DecayClass::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecayClass::Permanent => "permanent",
            DecayClass::Stable => "stable",
            DecayClass::Active => "active",
            DecayClass::Session => "session",
            DecayClass::Checkpoint => "checkpoint",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "permanent" => Some(DecayClass::Permanent),
            "stable" => Some(DecayClass::Stable),
            "active" => Some(DecayClass::Active),
            "session" => Some(DecayClass::Session),
            "checkpoint" => Some(DecayClass::Checkpoint),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecayClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Absolute expiry timestamp, or the permanent sentinel ("never").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expiry {
    Never,
    At(i64),
}

impl Expiry {
    pub fn is_never(&self) -> bool {
        matches!(self, Expiry::Never)
    }

    /// Seconds-since-epoch form, or `None` for `Never`. Used for the
    /// nullable `expires_at` database column.
    pub fn as_seconds(&self) -> Option<i64> {
        match self {
            Expiry::Never => None,
            Expiry::At(s) => Some(*s),
        }
    }

    pub fn from_seconds(seconds: Option<i64>) -> Self {
        match seconds {
            Some(s) => Expiry::At(s),
            None => Expiry::Never,
        }
    }

    /// `true` iff `expires_at <= now` (hard-prune eligibility).
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(s) => *s <= now,
        }
    }
}

// ============================================================================
// MEMORY ENTRY
// ============================================================================

/// A single lexical memory record.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: String,
    pub text: String,
    pub category: Category,
    pub importance: f64,
    pub entity: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub source: Option<String>,
    pub created_at: i64,
    pub decay_class: DecayClass,
    pub expires_at: Expiry,
    pub last_confirmed_at: i64,
    pub confidence: f64,
    pub search_tags: String,
}

impl MemoryEntry {
    /// Validate the universal invariants from §3/§8. Used by tests and
    /// by the row decoder to reject malformed rows rather than
    /// propagating raw column bags outward.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.decay_class {
            DecayClass::Permanent => {
                if !self.expires_at.is_never() {
                    return Err("permanent entry must have expires_at = never".into());
                }
            }
            _ => {
                let Expiry::At(expires_at) = self.expires_at else {
                    return Err("non-permanent entry must have a concrete expires_at".into());
                };
                if expires_at <= self.created_at {
                    return Err("expires_at must be after created_at".into());
                }
                if expires_at < self.last_confirmed_at {
                    return Err("expires_at must be >= last_confirmed_at".into());
                }
            }
        }
        if !(0.05..=1.0).contains(&self.confidence) {
            return Err(format!("confidence out of range: {}", self.confidence));
        }
        Ok(())
    }
}

/// Caller-supplied fields for a `store` call; everything else is derived.
#[derive(Debug, Clone, Default)]
pub struct StoreCandidate {
    pub text: String,
    pub category: Option<Category>,
    pub importance: Option<f64>,
    pub entity: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub source: Option<String>,
    pub decay_class: Option<DecayClass>,
    pub expires_at: Option<Expiry>,
    pub search_tags: Option<String>,
}

/// A projected vector-store hit: `entity/key/value` are always `None`
/// and `decay_class` is always `Stable` (§4.6, §9 open question).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub importance: f64,
    pub category: Category,
    pub created_at: i64,
}
