//! Core types and traits for the Cloak link vault.
//!
//! This crate provides the shared types and traits used by the cipher,
//! the code generator, the storage backends and the resolution service.

pub mod entropy;
pub mod error;
pub mod repository;
pub mod resolver;
pub mod shortcode;

pub use entropy::{EntropySource, OsEntropy, SeededEntropy};
pub use error::{CipherError, CoreError, EntropyError, ResolveError, StorageError};
pub use repository::{creation_timestamp, ReadRepository, Repository, UrlRecord};
pub use resolver::{HealthReport, Resolver, Shortened, UrlStats};
pub use shortcode::{ShortCode, ALPHABET, CODE_LENGTH};
