use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};

use crate::crypto::*;
use crate::key::{Key, KeySize};
use crate::result::CipherError;

type Aes192Gcm = aes_gcm::AesGcm<aes_gcm::aes::Aes192, U12>;

/// An empty struct which implements `AesGcm` using the RustCrypto `aes-gcm` crate.
///
/// The AES variant is picked from the size of each key.
pub struct CrateAesGcm;

fn encrypt<A>(
    key: &[u8],
    nonce: &[u8; AES_GCM_NONCE_SIZE],
    aad: &[u8],
    data: &mut [u8],
) -> Result<[u8; AES_GCM_TAG_SIZE], CipherError>
where
    A: KeyInit + AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    let cipher = A::new_from_slice(key).map_err(|_| CipherError::InvalidKey)?;
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, data)
        .map_err(|_| CipherError::EncryptionFailed)?;
    let mut out = [0u8; AES_GCM_TAG_SIZE];
    out.copy_from_slice(&tag);
    Ok(out)
}

fn decrypt<A>(
    key: &[u8],
    nonce: &[u8; AES_GCM_NONCE_SIZE],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8; AES_GCM_TAG_SIZE],
) -> bool
where
    A: KeyInit + AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    match A::new_from_slice(key) {
        Ok(cipher) => cipher
            .decrypt_in_place_detached(GenericArray::from_slice(nonce), aad, data, GenericArray::from_slice(tag))
            .is_ok(),
        Err(_) => false,
    }
}

impl AesGcm for CrateAesGcm {
    fn encrypt_in_place(
        key: &Key,
        nonce: &[u8; AES_GCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
    ) -> Result<[u8; AES_GCM_TAG_SIZE], CipherError> {
        match key.size() {
            KeySize::Aes128 => encrypt::<Aes128Gcm>(key.as_bytes(), nonce, aad, data),
            KeySize::Aes192 => encrypt::<Aes192Gcm>(key.as_bytes(), nonce, aad, data),
            KeySize::Aes256 => encrypt::<Aes256Gcm>(key.as_bytes(), nonce, aad, data),
        }
    }

    fn decrypt_in_place(
        key: &Key,
        nonce: &[u8; AES_GCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8; AES_GCM_TAG_SIZE],
    ) -> bool {
        match key.size() {
            KeySize::Aes128 => decrypt::<Aes128Gcm>(key.as_bytes(), nonce, aad, data, tag),
            KeySize::Aes192 => decrypt::<Aes192Gcm>(key.as_bytes(), nonce, aad, data, tag),
            KeySize::Aes256 => decrypt::<Aes256Gcm>(key.as_bytes(), nonce, aad, data, tag),
        }
    }
}
