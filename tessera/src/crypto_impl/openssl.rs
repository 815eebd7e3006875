use std::os::raw::c_int;
use std::ptr::{self, NonNull};

use openssl_sys::*;

use crate::crypto::*;
use crate::key::{Key, KeySize};
use crate::result::CipherError;

/// A wrapper for a `EVP_CIPHER_CTX` that will free itself on drop.
/// Users are encouraged to not use one of these directly.
pub struct OpenSSLCtx(NonNull<EVP_CIPHER_CTX>);
impl Drop for OpenSSLCtx {
    fn drop(&mut self) {
        unsafe {
            EVP_CIPHER_CTX_free(self.0.as_ptr());
        }
    }
}
impl OpenSSLCtx {
    /// Creates a new context.
    pub fn new() -> Option<Self> {
        unsafe { Some(OpenSSLCtx(NonNull::new(EVP_CIPHER_CTX_new())?)) }
    }

    /// Initialize a cipher context for encryption or decryption using the specified `key` and `iv`.
    /// `key` must be exactly as long as the key size of `t`.
    pub unsafe fn cipher_init<const ENCRYPT: bool>(&self, t: *const EVP_CIPHER, key: *const u8, iv: *const u8) -> bool {
        let evp_f = if ENCRYPT {
            EVP_EncryptInit_ex
        } else {
            EVP_DecryptInit_ex
        };
        evp_f(self.0.as_ptr(), t, ptr::null_mut(), key, iv) > 0
    }

    /// Stream a portion of text to be encrypted or decrypted.
    ///
    /// If `output == input.as_ptr()`, then the operation will be performed "in-place".
    /// If `output` is null, then `input` will be treated as AAD rather than plaintext or ciphertext.
    pub unsafe fn update<const ENCRYPT: bool>(&self, input: &[u8], output: *mut u8) -> bool {
        let evp_f = if ENCRYPT {
            EVP_EncryptUpdate
        } else {
            EVP_DecryptUpdate
        };
        let mut outlen = 0;
        evp_f(self.0.as_ptr(), output, &mut outlen, input.as_ptr(), input.len() as c_int) > 0
    }

    /// Finish encryption or decryption.
    /// If performing decryption this will return whether the set tag is correct.
    pub unsafe fn finalize<const ENCRYPT: bool>(&self) -> bool {
        let evp_f = if ENCRYPT {
            EVP_EncryptFinal_ex
        } else {
            EVP_DecryptFinal_ex
        };
        let mut outl = 0;
        evp_f(self.0.as_ptr(), ptr::null_mut(), &mut outl) > 0
    }

    /// Retreive the authentication tag from this context.
    /// This must be called after `finalize` is called.
    pub unsafe fn get_tag(&self, tag: &mut [u8]) -> bool {
        EVP_CIPHER_CTX_ctrl(
            self.0.as_ptr(),
            EVP_CTRL_GCM_GET_TAG,
            tag.len() as c_int,
            tag.as_mut_ptr() as *mut _,
        ) > 0
    }

    /// Set the authentication tag that was assigned to the input ciphertext.
    /// Once set, OpenSSL will check whether it matches the expected authentication tag
    /// produced by decryption.
    pub unsafe fn set_tag(&self, tag: &[u8]) -> bool {
        EVP_CIPHER_CTX_ctrl(
            self.0.as_ptr(),
            EVP_CTRL_GCM_SET_TAG,
            tag.len() as c_int,
            tag.as_ptr() as *mut _,
        ) > 0
    }
}

fn gcm_cipher(size: KeySize) -> *const EVP_CIPHER {
    unsafe {
        match size {
            KeySize::Aes128 => EVP_aes_128_gcm(),
            KeySize::Aes192 => EVP_aes_192_gcm(),
            KeySize::Aes256 => EVP_aes_256_gcm(),
        }
    }
}

/// An empty struct which implements `AesGcm` using OpenSSL.
///
/// It is just a namespace and wrapper for OpenSSL.
pub struct OpenSSLAesGcm;
impl AesGcm for OpenSSLAesGcm {
    fn encrypt_in_place(
        key: &Key,
        nonce: &[u8; AES_GCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
    ) -> Result<[u8; AES_GCM_TAG_SIZE], CipherError> {
        let mut output = [0u8; AES_GCM_TAG_SIZE];
        let ctx = OpenSSLCtx::new().ok_or(CipherError::EncryptionFailed)?;
        unsafe {
            if !ctx.cipher_init::<true>(gcm_cipher(key.size()), key.as_bytes().as_ptr(), nonce.as_ptr()) {
                return Err(CipherError::InvalidKey);
            }
            let p = data.as_mut_ptr();
            let ok = ctx.update::<true>(aad, ptr::null_mut())
                && ctx.update::<true>(data, p)
                && ctx.finalize::<true>()
                && ctx.get_tag(&mut output);
            if !ok {
                return Err(CipherError::EncryptionFailed);
            }
        }
        Ok(output)
    }

    fn decrypt_in_place(
        key: &Key,
        nonce: &[u8; AES_GCM_NONCE_SIZE],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8; AES_GCM_TAG_SIZE],
    ) -> bool {
        let Some(ctx) = OpenSSLCtx::new() else {
            return false;
        };
        unsafe {
            let p = data.as_mut_ptr();
            ctx.cipher_init::<false>(gcm_cipher(key.size()), key.as_bytes().as_ptr(), nonce.as_ptr())
                && ctx.update::<false>(aad, ptr::null_mut())
                && ctx.update::<false>(data, p)
                && ctx.set_tag(tag)
                && ctx.finalize::<false>()
        }
    }
}
