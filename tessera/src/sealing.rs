/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use rand_core::RngCore;
use zeroize::Zeroizing;

use crate::application::CryptoLayer;
use crate::codec::{ApReply, Authenticator, Codec, Envelope, Ticket};
use crate::crypto::*;
use crate::key::Key;
use crate::proto::*;
use crate::result::{ExchangeError, RejectReason};

/// An encrypted credential of type `T`, as it travels between parties.
///
/// The contents are opaque to anyone not holding the key it was sealed under. The type
/// parameter only records what the plaintext is supposed to be, it is not authenticated by
/// itself; the key usage label bound into the AEAD is.
pub struct Sealed<T> {
    bytes: Vec<u8>,
    _credential: PhantomData<fn() -> T>,
}

/// A ticket sealed under the long-term key of the server it was minted for.
pub type SealedTicket = Sealed<Ticket>;
/// An authenticator sealed under a session key.
pub type SealedAuthenticator = Sealed<Authenticator>;
/// An AS or TGS reply sealed under a key the client already holds.
pub type SealedEnvelope = Sealed<Envelope>;
/// A service's mutual authentication reply sealed under the service session key.
pub type SealedApReply = Sealed<ApReply>;

impl<T> Sealed<T> {
    /// Wrap bytes received from a transport.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes, _credential: PhantomData }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl<T> Clone for Sealed<T> {
    fn clone(&self) -> Self {
        Self::from_bytes(self.bytes.clone())
    }
}
impl<T> PartialEq for Sealed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}
impl<T> Eq for Sealed<T> {}
impl<T> Hash for Sealed<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state)
    }
}
impl<T> fmt::Debug for Sealed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sealed({} bytes)", self.bytes.len())
    }
}

/// Encode `credential` and encrypt it under `key`, bound to the key usage `label`.
///
/// Output layout is `nonce || ciphertext || tag` with a fresh random nonce per call.
pub(crate) fn seal<C: CryptoLayer, T: Codec>(
    rng: &mut C::Rng,
    key: &Key,
    label: &[u8],
    credential: &T,
) -> Result<Sealed<T>, ExchangeError> {
    let plaintext = credential.encode()?;
    let mut nonce = [0u8; AES_GCM_NONCE_SIZE];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|_| ExchangeError::KeyGenerationFailed)?;

    let mut out = Vec::with_capacity(plaintext.len() + SEALED_OVERHEAD);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&plaintext);
    let tag = C::Aead::encrypt_in_place(key, &nonce, label, &mut out[AES_GCM_NONCE_SIZE..])?;
    out.extend_from_slice(&tag);
    Ok(Sealed::from_bytes(out))
}

/// Decrypt and decode a sealed credential.
///
/// The error distinguishes a failed decryption from a failed decode for the local event log
/// only. Callers must collapse both into a single error kind before anything leaves the
/// process.
pub(crate) fn open<C: CryptoLayer, T: Codec>(
    key: &Key,
    label: &[u8],
    sealed: &Sealed<T>,
) -> Result<T, RejectReason> {
    let bytes = sealed.as_bytes();
    if bytes.len() < SEALED_OVERHEAD {
        return Err(RejectReason::Undecryptable);
    }
    let (nonce, rest) = bytes.split_at(AES_GCM_NONCE_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - AES_GCM_TAG_SIZE);
    let mut nonce_arr = [0u8; AES_GCM_NONCE_SIZE];
    nonce_arr.copy_from_slice(nonce);
    let mut tag_arr = [0u8; AES_GCM_TAG_SIZE];
    tag_arr.copy_from_slice(tag);

    let mut plaintext = Zeroizing::new(ciphertext.to_vec());
    if !C::Aead::decrypt_in_place(key, &nonce_arr, label, &mut plaintext, &tag_arr) {
        return Err(RejectReason::Undecryptable);
    }
    T::decode(&plaintext).map_err(RejectReason::Malformed)
}
