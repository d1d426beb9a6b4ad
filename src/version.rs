//! Schema revision identifiers.
//!
//! A [`Version`] is a `major.minor.patch` triple ordered lexicographically.
//! Versions are plain `Copy` values; bumping returns a new value.

use std::{fmt, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::VersionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VersionPart {
    Major,
    Minor,
    Patch,
}

impl Version {
    pub const MIN: Version = Version::new(0, 0, 0);
    pub const MAX: Version = Version::new(u64::MAX, u64::MAX, u64::MAX);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(text: &str) -> Result<Self, VersionError> {
        text.parse()
    }

    pub fn bump(self, part: VersionPart) -> Result<Self, VersionError> {
        let overflow = |name: &'static str| VersionError::Overflow {
            version: self,
            part: name,
        };
        match part {
            VersionPart::Major => self
                .major
                .checked_add(1)
                .map(|major| Self::new(major, 0, 0))
                .ok_or_else(|| overflow("major")),
            VersionPart::Minor => self
                .minor
                .checked_add(1)
                .map(|minor| Self::new(self.major, minor, 0))
                .ok_or_else(|| overflow("minor")),
            VersionPart::Patch => self
                .patch
                .checked_add(1)
                .map(|patch| Self::new(self.major, self.minor, patch))
                .ok_or_else(|| overflow("patch")),
        }
    }

    /// Same major line and not older than `previous`.
    pub fn is_backward_compatible_with(&self, previous: &Version) -> bool {
        self.major == previous.major && self >= previous
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionError::Invalid {
            text: text.to_string(),
        };
        let parts = text.split('.').collect::<Vec<_>>();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            // u64::from_str accepts a leading '+', so digits are checked explicitly
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            // "0" is the only part allowed to start with zero, so text round-trips
            if part.len() > 1 && part.starts_with('0') {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Version::from_str(&token).map_err(de::Error::custom)
    }
}
