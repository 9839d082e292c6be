use crate::Generator;
use cloak_core::repository::Result;
use cloak_core::{ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use jiff::Timestamp;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns candidate codes into codes that are free in a repository.
///
/// Candidates that already exist are discarded and redrawn. By default this
/// retries without limit: with 62^6 possible codes, long collision runs only
/// happen when the store is close to saturation. [`UniqueCodes::with_max_attempts`]
/// turns that situation into an error instead.
#[derive(Debug)]
pub struct UniqueCodes<G> {
    generator: Arc<G>,
    max_attempts: Option<usize>,
}

impl<G> Clone for UniqueCodes<G> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            max_attempts: self.max_attempts,
        }
    }
}

impl<G: Generator> UniqueCodes<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator: Arc::new(generator),
            max_attempts: None,
        }
    }

    /// Gives up with [`StorageError::Exhausted`] after `max_attempts` draws.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Draws candidates until one is not present in `repository`.
    ///
    /// The returned code may still be claimed by a concurrent writer before
    /// it is inserted; use [`UniqueCodes::insert_unique`] to store a record.
    pub async fn next_code<R>(&self, repository: &R) -> Result<ShortCode>
    where
        R: ReadRepository + ?Sized,
    {
        let mut attempts = 0;
        self.draw_free(repository, &mut attempts).await
    }

    /// Stores a new record under a fresh code, redrawing whenever the insert
    /// loses a race for the same code.
    pub async fn insert_unique<R>(
        &self,
        repository: &R,
        encrypted_url: String,
        created_at: Timestamp,
    ) -> Result<UrlRecord>
    where
        R: Repository + ?Sized,
    {
        let mut attempts = 0;
        loop {
            let code = self.draw_free(repository, &mut attempts).await?;
            let record = UrlRecord::new(code, encrypted_url.clone(), created_at);

            match repository.insert(record.clone()).await {
                Ok(()) => return Ok(record),
                Err(StorageError::Conflict(code)) => {
                    warn!(code = %code, "short code claimed concurrently, redrawing");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn draw_free<R>(&self, repository: &R, attempts: &mut usize) -> Result<ShortCode>
    where
        R: ReadRepository + ?Sized,
    {
        loop {
            if let Some(max) = self.max_attempts {
                if *attempts >= max {
                    return Err(StorageError::Exhausted(*attempts));
                }
            }
            *attempts += 1;

            let code: ShortCode = self.generator.generate()?.into();
            if !repository.exists(&code).await? {
                return Ok(code);
            }
            debug!(code = %code, attempt = *attempts, "short code collision");
        }
    }
}
