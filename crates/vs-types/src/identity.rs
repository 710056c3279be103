use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TypeError;

/// A caller-supplied principal: normally a wallet address.
///
/// Identities are trimmed and lower-cased on construction, so `0xAbC` and
/// `0xabc` name the same wallet. Empty strings, whitespace and control
/// characters are rejected.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Normalize and validate a raw identity string.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyIdentity);
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| c.is_whitespace() || c.is_control())
        {
            return Err(TypeError::InvalidIdentity(bad));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// The normalized identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for logs (`0x1234…abcd`).
    pub fn short_id(&self) -> String {
        let s = &self.0;
        if s.chars().count() <= 12 {
            return s.clone();
        }
        let head: String = s.chars().take(6).collect();
        let tail: String = s.chars().skip(s.chars().count() - 4).collect();
        format!("{head}…{tail}")
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Deserialization re-applies normalization so stored and wire values agree.
impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
