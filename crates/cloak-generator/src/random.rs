use crate::Generator;
use cloak_core::{EntropyError, EntropySource, OsEntropy, ShortCode, ALPHABET, CODE_LENGTH};
use std::sync::Arc;

/// Largest multiple of the alphabet size that fits in a byte. Bytes at or
/// above it are discarded so every symbol is equally likely.
const ACCEPT_BELOW: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Draws codes uniformly from the 62-symbol alphabet using a secure
/// random source.
#[derive(Clone)]
pub struct RandomCodeGenerator {
    entropy: Arc<dyn EntropySource>,
}

impl RandomCodeGenerator {
    /// Creates a generator backed by the operating system's CSPRNG.
    pub fn new() -> Self {
        Self::with_entropy(Arc::new(OsEntropy))
    }

    pub fn with_entropy(entropy: Arc<dyn EntropySource>) -> Self {
        Self { entropy }
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RandomCodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomCodeGenerator").finish_non_exhaustive()
    }
}

impl Generator for RandomCodeGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Result<ShortCode, EntropyError> {
        let mut code = String::with_capacity(CODE_LENGTH);
        let mut buf = [0u8; 2 * CODE_LENGTH];

        while code.len() < CODE_LENGTH {
            self.entropy.fill(&mut buf)?;
            for byte in buf {
                if byte >= ACCEPT_BELOW {
                    continue;
                }
                code.push(ALPHABET[(byte % ALPHABET.len() as u8) as usize] as char);
                if code.len() == CODE_LENGTH {
                    break;
                }
            }
        }

        Ok(ShortCode::new_unchecked(code))
    }
}
