use async_trait::async_trait;
use cloak_cipher::Cipher;
use cloak_core::{
    creation_timestamp, HealthReport, Repository, ResolveError, Resolver, ShortCode, Shortened,
    UrlRecord, UrlStats,
};
use cloak_generator::{Generator, UniqueCodes};
use jiff::Timestamp;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A concrete implementation of the `Resolver` trait.
///
/// This service wraps a `Repository`, a code generator and a `Cipher` to
/// handle:
/// - URL validation
/// - Encryption of destinations before they are stored
/// - Unique short code allocation
/// - Best-effort access counting on redirect
#[derive(Debug)]
pub struct ResolutionService<R, G> {
    repository: Arc<R>,
    codes: UniqueCodes<G>,
    cipher: Arc<Cipher>,
}

impl<R, G> Clone for ResolutionService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            codes: self.codes.clone(),
            cipher: Arc::clone(&self.cipher),
        }
    }
}

impl<R: Repository, G: Generator> ResolutionService<R, G> {
    /// Creates a new `ResolutionService` that retries code collisions without limit.
    pub fn new(repository: R, generator: G, cipher: Cipher) -> Self {
        Self::with_codes(
            Arc::new(repository),
            UniqueCodes::new(generator),
            Arc::new(cipher),
        )
    }

    /// Creates a service from shared parts, e.g. to keep a handle on the repository.
    pub fn with_codes(repository: Arc<R>, codes: UniqueCodes<G>, cipher: Arc<Cipher>) -> Self {
        Self {
            repository,
            codes,
            cipher,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Only absolute `http://` and `https://` URLs may be shortened.
    fn validate_url(url: &str) -> Result<(), ResolveError> {
        if url.is_empty() {
            return Err(ResolveError::InvalidUrl(
                "URL parameter is missing".to_string(),
            ));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ResolveError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(())
    }

    /// Looks up a record, treating malformed codes as unknown ones.
    async fn find(&self, code: &str) -> Result<UrlRecord, ResolveError> {
        let Ok(short_code) = ShortCode::parse(code) else {
            return Err(ResolveError::NotFound(code.to_string()));
        };

        self.repository
            .get(&short_code)
            .await?
            .ok_or_else(|| ResolveError::NotFound(code.to_string()))
    }

    /// Decrypts a stored destination, logging why it could not be recovered.
    fn reveal(&self, record: &UrlRecord) -> Result<String, ResolveError> {
        self.cipher.decrypt(&record.encrypted_url).map_err(|err| {
            warn!(code = %record.code, error = %err, "failed to decrypt stored url");
            ResolveError::from(err)
        })
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Resolver for ResolutionService<R, G> {
    async fn shorten(&self, raw_url: &str) -> Result<Shortened, ResolveError> {
        Self::validate_url(raw_url)?;

        let encrypted_url = self.cipher.encrypt(raw_url)?;
        let record = self
            .codes
            .insert_unique(self.repository.as_ref(), encrypted_url, creation_timestamp())
            .await?;

        info!(code = %record.code, "shortened url");
        debug!(code = %record.code, url = raw_url, "shortened url destination");

        Ok(Shortened {
            code: record.code,
            original_url: raw_url.to_string(),
            created_at: record.created_at,
        })
    }

    async fn redirect(&self, code: &str) -> Result<String, ResolveError> {
        let record = self.find(code).await?;

        // The redirect must succeed even if the visit cannot be counted.
        match self.repository.increment_access(&record.code).await {
            Ok(true) => {}
            Ok(false) => warn!(code = %record.code, "record vanished before access was counted"),
            Err(err) => warn!(code = %record.code, error = %err, "failed to count access"),
        }

        let destination = self.reveal(&record)?;
        debug!(code = %record.code, url = %destination, "resolved redirect");
        Ok(destination)
    }

    async fn stats(&self, code: &str) -> Result<UrlStats, ResolveError> {
        let record = self.find(code).await?;
        let destination_url = self.reveal(&record)?;

        Ok(UrlStats {
            code: record.code,
            destination_url,
            created_at: record.created_at,
            access_count: record.access_count,
        })
    }

    async fn health(&self) -> Result<HealthReport, ResolveError> {
        let record_count = self.repository.count().await.map_err(|err| {
            warn!(error = %err, "health check could not reach storage");
            ResolveError::StorageUnavailable(err.to_string())
        })?;

        Ok(HealthReport {
            status: "healthy",
            record_count,
            checked_at: Timestamp::now(),
        })
    }
}
