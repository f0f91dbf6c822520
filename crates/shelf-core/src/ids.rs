//! Typed photo identifier.
//!
//! Photo ids are assigned by the metadata store and never reused, so the
//! wrapper is a plain positive `i64` rather than a generated UUID.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Store-assigned identifier of a catalog photo. Always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(i64);

impl PhotoId {
    /// Wrap a raw id, rejecting zero and negative values.
    pub fn new(raw: i64) -> Result<Self, Error> {
        if raw <= 0 {
            return Err(Error::InvalidId(raw.to_string()));
        }
        Ok(Self(raw))
    }

    /// Return the raw integer value.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PhotoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidId(s.to_string()))?;
        Self::new(raw)
    }
}

impl From<PhotoId> for i64 {
    fn from(id: PhotoId) -> Self {
        id.0
    }
}
