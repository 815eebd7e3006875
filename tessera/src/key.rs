/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
use std::fmt;

use arrayvec::ArrayVec;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::crypto::secure_eq;
use crate::result::KeyError;

/// The largest key size accepted by the cipher, in bytes.
pub const MAX_KEY_SIZE: usize = 32;

/// The key sizes the cipher accepts.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum KeySize {
    /// 128-bit key.
    Aes128,
    /// 192-bit key.
    Aes192,
    /// 256-bit key.
    Aes256,
}

impl KeySize {
    /// Every key size, smallest first.
    pub const ALL: &'static [KeySize] = &[KeySize::Aes128, KeySize::Aes192, KeySize::Aes256];

    /// Returns the size of this key in bytes.
    pub const fn len(self) -> usize {
        match self {
            KeySize::Aes128 => 16,
            KeySize::Aes192 => 24,
            KeySize::Aes256 => 32,
        }
    }

    /// Returns the key size corresponding to `len` bytes, if there is one.
    pub const fn from_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(KeySize::Aes128),
            24 => Some(KeySize::Aes192),
            32 => Some(KeySize::Aes256),
            _ => None,
        }
    }
}

/// A symmetric key of one of the sizes the cipher accepts.
///
/// Used both for long-term principal keys and for session keys. The contents are cleared on
/// drop, never printed by `Debug`, and compared in constant time.
///
/// A `Key` can only be constructed with a valid length. There is no way to coerce
/// a key of the wrong length into a usable one.
#[derive(Clone)]
pub struct Key(Zeroizing<ArrayVec<u8, MAX_KEY_SIZE>>);

impl Key {
    /// Copy `bytes` into a new key, failing with `KeyError::InvalidKeyLength` unless its length
    /// is exactly one of the accepted AES key sizes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if KeySize::from_len(bytes.len()).is_none() {
            return Err(KeyError::InvalidKeyLength(bytes.len()));
        }
        let mut key = ArrayVec::new();
        // Cannot fail, the length was checked against MAX_KEY_SIZE above.
        key.try_extend_from_slice(bytes).map_err(|_| KeyError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(Zeroizing::new(key)))
    }

    /// Generate a fresh random key of the given size.
    ///
    /// Entropy failure is reported as `KeyError::KeyGenerationFailed` instead of aborting, so
    /// that servers can surface it as an ordinary error.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R, size: KeySize) -> Result<Self, KeyError> {
        let mut key = Zeroizing::new(ArrayVec::from([0u8; MAX_KEY_SIZE]));
        key.truncate(size.len());
        rng.try_fill_bytes(key.as_mut_slice())
            .map_err(|_| KeyError::KeyGenerationFailed)?;
        Ok(Self(key))
    }

    /// The size of this key.
    pub fn size(&self) -> KeySize {
        match self.0.len() {
            16 => KeySize::Aes128,
            24 => KeySize::Aes192,
            _ => KeySize::Aes256,
        }
    }

    /// The raw key bytes.
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        secure_eq(self.as_bytes(), other.as_bytes())
    }
}
impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?}, <redacted>)", self.size())
    }
}
