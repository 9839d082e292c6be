//! Short-link resolution service.
//!
//! This crate ties the cipher, the code generator and a storage backend
//! together behind the [`Resolver`] trait. Core types are re-exported from
//! `cloak_core`.

pub mod service;

pub use cloak_core::{HealthReport, ResolveError, Resolver, Shortened, UrlStats};
pub use service::ResolutionService;
