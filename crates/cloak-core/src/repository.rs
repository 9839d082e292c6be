use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The public identifier of the record.
    pub code: ShortCode,
    /// The destination URL, encrypted and hex encoded with its IV prepended.
    pub encrypted_url: String,
    /// When the record was created.
    pub created_at: Timestamp,
    /// How many redirects have been resolved through this record.
    pub access_count: u64,
}

impl UrlRecord {
    /// Creates a fresh record with a zero access count.
    pub fn new(code: ShortCode, encrypted_url: String, created_at: Timestamp) -> Self {
        Self {
            code,
            encrypted_url,
            created_at,
            access_count: 0,
        }
    }
}

/// The current time truncated to microseconds.
///
/// Every backend can store microseconds losslessly, so a record reads back
/// with exactly the timestamp it was created with.
pub fn creation_timestamp() -> Timestamp {
    let now = Timestamp::now();
    Timestamp::from_microsecond(now.as_microsecond()).unwrap_or(now)
}

/// A read-only view of a repository.
///
/// This trait provides only the read operations from [`Repository`],
/// allowing the code generator to check for collisions without write access.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the URL record for a given short code.
    /// Returns `None` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Checks whether a short code already exists in the repository.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;

    /// Total number of stored records.
    async fn count(&self) -> Result<u64>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new URL record. Returns `Err(Conflict)` if the code already exists.
    async fn insert(&self, record: UrlRecord) -> Result<()>;

    /// Atomically adds one to the access count of a record.
    /// Returns `false` if no record with that code exists.
    async fn increment_access(&self, code: &ShortCode) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_unvisited() {
        let record = UrlRecord::new(
            ShortCode::new_unchecked("abc123"),
            "00ff".to_string(),
            creation_timestamp(),
        );
        assert_eq!(record.access_count, 0);
    }

    #[test]
    fn creation_timestamp_has_microsecond_precision() {
        let ts = creation_timestamp();
        assert_eq!(ts.subsec_nanosecond() % 1_000, 0);
    }
}
