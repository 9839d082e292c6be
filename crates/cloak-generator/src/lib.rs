pub mod random;
pub mod unique;

pub use random::RandomCodeGenerator;
pub use unique::UniqueCodes;

use cloak_core::{EntropyError, ShortCode};

/// Trait for generating candidate short codes.
///
/// Implementations are pure generators that don't interact with storage;
/// uniqueness against the store is enforced by [`UniqueCodes`].
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;

    /// Draws one candidate short code.
    fn generate(&self) -> Result<Self::Output, EntropyError>;
}
