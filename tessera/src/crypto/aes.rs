use crate::key::Key;
use crate::result::CipherError;

/// The specified size of an AES-GCM authentication tag.
pub const AES_GCM_TAG_SIZE: usize = 16;
/// The specified size of an AES-GCM nonce.
pub const AES_GCM_NONCE_SIZE: usize = 12;

/// A trait for implementing AES-GCM for the sealing of credentials.
///
/// Implementations must accept every key size representable by `Key` (AES-128, AES-192 and
/// AES-256) and must select the AES variant from the size of the key they are given. They must
/// never substitute a different key when handed one they cannot use; failing is the only
/// acceptable outcome.
///
/// Credential sealing is low throughput, a handful of calls per protocol exchange, so these are
/// pure functions with no per-key state.
pub trait AesGcm {
    /// A pure function (no side effects) that implements AES-GCM AEAD encryption.
    ///
    /// Encryption must be performed on `data` in-place.
    /// The initial plaintext of `data` must be overwritten with its ciphertext.
    ///
    /// The resulting GCM authentication tag must be returned.
    fn encrypt_in_place(
        key: &Key,
        nonce: &[u8; AES_GCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
    ) -> Result<[u8; AES_GCM_TAG_SIZE], CipherError>;

    /// A pure function (no side effects) that implements AES-GCM AEAD decryption.
    ///
    /// Decryption must be performed on `data` in-place.
    /// The initial ciphertext of `data` must be overwritten with its plaintext.
    ///
    /// This function must check that the expected authentication tag matches `tag`,
    /// and only return `true` if they match. This must be done in constant-time.
    #[must_use]
    fn decrypt_in_place(
        key: &Key,
        nonce: &[u8; AES_GCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8; AES_GCM_TAG_SIZE],
    ) -> bool;
}
