//! Common utility types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Unique identifier type.
pub type Id = String;

/// Metadata map type.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Semantic version.
///
/// Serialized as its display form (`"1.2.3"` or `"1.2.3-beta.1"`) so that
/// manifests can carry it as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub prerelease: Option<String>,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 1, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

/// Error returned when a version string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid version '{input}': {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: String,
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        let (core, prerelease) = match trimmed.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => {
                return Err(VersionParseError {
                    input: s.to_string(),
                    reason: "empty prerelease".to_string(),
                });
            }
            None => (trimmed, None),
        };

        let mut parts = core.split('.');
        let mut next = |name: &str| -> Result<u32, VersionParseError> {
            match parts.next() {
                // Missing minor/patch components default to zero ("1" == "1.0.0").
                None if name != "major" => Ok(0),
                None => Err(VersionParseError {
                    input: s.to_string(),
                    reason: "missing major component".to_string(),
                }),
                Some(part) => part.parse().map_err(|_| VersionParseError {
                    input: s.to_string(),
                    reason: format!("{} component '{}' is not a number", name, part),
                }),
            }
        };

        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;

        if parts.next().is_some() {
            return Err(VersionParseError {
                input: s.to_string(),
                reason: "too many components".to_string(),
            });
        }

        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
#[path = "common_tests.rs"]
mod tests;
