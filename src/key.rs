//! Document keys
//!
//! A key is an optional bucket label plus a 64-character lowercase hex
//! reference. Both parts are validated on construction, so a `DocumentKey`
//! is always safe to turn into a filesystem path.

use std::fmt;

use crate::error::{Result, SyncError};

/// Length of a reference string in characters
pub const REFERENCE_LEN: usize = 64;

/// Max length of a bucket label
pub const MAX_BUCKET_LEN: usize = 64;

/// A 64-character lowercase hexadecimal document reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference(String);

impl Reference {
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != REFERENCE_LEN {
            return Err(SyncError::InvalidReference(format!(
                "expected {} characters, got {}",
                REFERENCE_LEN,
                s.len()
            )));
        }

        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(SyncError::InvalidReference(
                "expected lowercase hexadecimal characters".to_string(),
            ));
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First two characters, used as the shard directory name
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tenant label that namespaces documents on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket(String);

impl Bucket {
    /// Accepts `[A-Za-z0-9_-]{1,64}`; anything else could escape the storage root.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > MAX_BUCKET_LEN {
            return Err(SyncError::InvalidBucket(format!(
                "length must be 1..={}, got {}",
                MAX_BUCKET_LEN,
                s.len()
            )));
        }

        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(SyncError::InvalidBucket(format!(
                "'{}' contains characters other than letters, digits, '_' and '-'",
                s
            )));
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The (bucket, reference) pair identifying a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    bucket: Option<Bucket>,
    reference: Reference,
}

impl DocumentKey {
    pub fn new(bucket: Option<Bucket>, reference: Reference) -> Self {
        Self { bucket, reference }
    }

    /// Parse a reference string and attach an optional bucket
    pub fn parse(bucket: Option<Bucket>, reference: &str) -> Result<Self> {
        Ok(Self::new(bucket, Reference::parse(reference)?))
    }

    pub fn bucket(&self) -> Option<&Bucket> {
        self.bucket.as_ref()
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bucket {
            Some(bucket) => write!(f, "{}/{}", bucket, self.reference),
            None => write!(f, "{}", self.reference),
        }
    }
}
