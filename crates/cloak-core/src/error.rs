use thiserror::Error;

/// Errors related to the core types of the link vault.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// The secure random source could not produce bytes.
#[derive(Debug, Clone, Error)]
#[error("secure random source failed: {0}")]
pub struct EntropyError(pub String);

#[derive(Debug, Clone, Error)]
pub enum CipherError {
    #[error("invalid key length {0}; expected 16, 24 or 32 bytes")]
    InvalidKey(usize),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("decryption failed: {0}")]
    Decryption(String),
}

impl From<EntropyError> for CipherError {
    fn from(value: EntropyError) -> Self {
        Self::Encryption(value.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("no free short code after {0} attempts")]
    Exhausted(usize),
    #[error("random source failed: {0}")]
    Entropy(#[from] EntropyError),
}

impl StorageError {
    /// Whether the backend itself could not be reached, as opposed to a
    /// query that reached it and failed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("failed to encrypt url: {0}")]
    Encryption(String),
    #[error("failed to decrypt url: {0}")]
    Decryption(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<CipherError> for ResolveError {
    fn from(value: CipherError) -> Self {
        match value {
            CipherError::Decryption(message) => Self::Decryption(message),
            other => Self::Encryption(other.to_string()),
        }
    }
}

impl From<StorageError> for ResolveError {
    fn from(value: StorageError) -> Self {
        if value.is_unavailable() {
            Self::StorageUnavailable(value.to_string())
        } else {
            Self::Storage(value.to_string())
        }
    }
}
