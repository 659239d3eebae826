use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::StorageError;

/// A bucket-qualified object key, written as `bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageLink {
    pub bucket: String,
    pub key: String,
}

impl StorageLink {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        StorageLink {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl FromStr for StorageLink {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(StorageLink::new(bucket, key))
            }
            _ => Err(StorageError::InvalidLink(s.to_string())),
        }
    }
}

impl fmt::Display for StorageLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

impl Serialize for StorageLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StorageLink {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
