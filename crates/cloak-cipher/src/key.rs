use cloak_core::CipherError;

/// A fixed-length AES key. Its length selects the cipher strength.
#[derive(Clone, PartialEq, Eq)]
pub enum CipherKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl CipherKey {
    /// Builds a key from raw bytes of length 16, 24 or 32.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        let invalid = || CipherError::InvalidKey(bytes.len());
        match bytes.len() {
            16 => Ok(Self::Aes128(bytes.try_into().map_err(|_| invalid())?)),
            24 => Ok(Self::Aes192(bytes.try_into().map_err(|_| invalid())?)),
            32 => Ok(Self::Aes256(bytes.try_into().map_err(|_| invalid())?)),
            _ => Err(invalid()),
        }
    }

    /// Parses a key as it appears in configuration.
    ///
    /// A `hex:` prefix means the remainder is hex encoded; anything else is
    /// taken as the literal bytes of the string.
    pub fn parse(value: &str) -> Result<Self, CipherError> {
        match value.strip_prefix("hex:") {
            Some(encoded) => {
                let bytes = hex::decode(encoded)
                    .map_err(|_| CipherError::InvalidKey(encoded.len() / 2))?;
                Self::from_bytes(&bytes)
            }
            None => Self::from_bytes(value.as_bytes()),
        }
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Aes128(_) => 16,
            Self::Aes192(_) => 24,
            Self::Aes256(_) => 32,
        }
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CipherKey(aes-{})", self.len() * 8)
    }
}
