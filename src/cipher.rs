//! Position-indexed XOR cipher
//!
//! Byte `i` of the buffer is XORed with byte `i % key.len()` of the key.
//! There is no header or framing: ciphertext and plaintext have the same
//! length, and applying the cipher twice with the same key is the identity.

use log::{debug, trace};

use crate::error::{LoadError, Result};

/// A validated, non-empty XOR key
#[derive(Clone, PartialEq, Eq)]
pub struct XorKey(Vec<u8>);

impl XorKey {
    /// Build a key from its textual form.
    ///
    /// Each character contributes one byte: the low byte of its UTF-16 code
    /// unit. For ASCII keys this is the key's own bytes.
    pub fn new(key: &str) -> Result<Self> {
        Self::from_bytes(key.encode_utf16().map(|unit| unit as u8).collect())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(LoadError::invalid("decryption key must not be empty"));
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for XorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XorKey")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// XOR `data` in place with the repeating key.
pub fn xor_in_place(data: &mut [u8], key: &XorKey) {
    trace!("XOR over {} bytes with a {}-byte key", data.len(), key.len());

    for (byte, k) in data.iter_mut().zip(key.0.iter().cycle()) {
        *byte ^= k;
    }
}

/// Validate `key` and apply the cipher to `data`.
///
/// An empty key is rejected before any byte is touched.
pub fn apply(data: &mut [u8], key: &str) -> Result<()> {
    let key = XorKey::new(key)?;
    debug!("decrypting {} bytes", data.len());
    xor_in_place(data, &key);
    Ok(())
}

/// Owned variant of [`apply`]: consumes the buffer and returns it transformed.
pub fn transform(mut data: Vec<u8>, key: &XorKey) -> Vec<u8> {
    xor_in_place(&mut data, key);
    data
}
