use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;

type Result<T> = std::result::Result<T, crate::error::ResolveError>;

/// The outcome of shortening a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortened {
    /// The newly assigned short code.
    pub code: ShortCode,
    /// The URL that was shortened.
    pub original_url: String,
    /// When the record was created.
    pub created_at: Timestamp,
}

/// Full metadata of a stored record, with its destination decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlStats {
    pub code: ShortCode,
    pub destination_url: String,
    pub created_at: Timestamp,
    pub access_count: u64,
}

/// Health of the underlying store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub record_count: u64,
    pub checked_at: Timestamp,
}

#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Encrypts and stores a URL under a freshly generated short code.
    async fn shorten(&self, raw_url: &str) -> Result<Shortened>;

    /// Resolves a short code to its destination, counting the visit.
    async fn redirect(&self, code: &str) -> Result<String>;

    /// Returns the record behind a short code without counting a visit.
    async fn stats(&self, code: &str) -> Result<UrlStats>;

    /// Reports how many records the store holds.
    async fn health(&self) -> Result<HealthReport>;
}
