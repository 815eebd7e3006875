/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
use std::sync::{Mutex, PoisonError};

use crate::application::{ApplicationLayer, CryptoLayer};
use crate::codec::{Envelope, Ticket};
use crate::key::Key;
use crate::keystore::{accepted, KeyStore};
use crate::log_event::log;
use crate::proto::*;
use crate::result::{ExchangeError, KeyError};
use crate::sealing::{seal, SealedEnvelope, SealedTicket};
#[cfg(feature = "logging")]
use crate::LogEvent::*;

/// What the AS hands back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsReply {
    /// The TGS session key and the TGT, sealed under the client's long-term key.
    pub envelope: SealedEnvelope,
    /// The TGT, sealed under the TGS long-term key. Opaque to the client.
    pub tgt: SealedTicket,
}

/// The Authentication Server: issues ticket-granting tickets to known clients.
///
/// Holds no per-client state. Every call mints a fresh TGS session key.
pub struct AuthenticationServer<Crypto: CryptoLayer, Store: KeyStore> {
    /// The `CryptoRng` instance that was passed to the AS when it was created.
    pub rng: Mutex<Crypto::Rng>,
    store: Store,
    tgs_key: Key,
}

impl<Crypto: CryptoLayer, Store: KeyStore> AuthenticationServer<Crypto, Store> {
    /// Create an AS reading long-term keys from `store`.
    ///
    /// The TGS key is resolved once here, so a store without one is a configuration error.
    pub fn new(store: Store, rng: Crypto::Rng) -> Result<Self, KeyError> {
        let settings = &Crypto::SETTINGS;
        let tgs_key = store.lookup(settings.tgs_principal).ok_or(KeyError::MissingPrincipal)?;
        if !settings.accepts_key_size(tgs_key.size()) {
            return Err(KeyError::InvalidKeyLength(tgs_key.size().len()));
        }
        Ok(Self { rng: Mutex::new(rng), store, tgs_key })
    }

    /// Issue a TGT to `client_id`.
    ///
    /// Fails with `UnknownPrincipal` before any key is generated or anything is sealed if the
    /// client is not in the key store. The TGS is never a client.
    pub fn request_tgt<App: ApplicationLayer>(&self, app: App, client_id: &str) -> Result<AsReply, ExchangeError> {
        let settings = &Crypto::SETTINGS;
        let client_key = if client_id == settings.tgs_principal {
            None
        } else {
            accepted(settings, self.store.lookup(client_id))?
        };
        let Some(client_key) = client_key else {
            log!(app, AsUnknownClient(client_id));
            return Err(ExchangeError::UnknownPrincipal);
        };
        let now = app.time();

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let session_key =
            Key::generate(&mut *rng, settings.session_key_size).map_err(|_| ExchangeError::KeyGenerationFailed)?;
        let ticket = Ticket {
            client_id: client_id.to_string(),
            server_id: settings.tgs_principal.to_string(),
            issued_at: now,
            lifetime: settings.tgt_lifetime,
            session_key: session_key.clone(),
        };
        let expires_at = ticket.expires_at();
        let tgt = seal::<Crypto, _>(&mut *rng, &self.tgs_key, LABEL_TICKET, &ticket)?;

        let envelope = Envelope {
            session_key,
            ticket: tgt.clone(),
            server_id: settings.tgs_principal.to_string(),
            expires_at,
        };
        let envelope = seal::<Crypto, _>(&mut *rng, &client_key, LABEL_AS_ENVELOPE, &envelope)?;
        drop(rng);

        log!(app, AsIssuedTgt { client: client_id, expires_at });
        Ok(AsReply { envelope, tgt })
    }
}

#[cfg(all(test, feature = "default-crypto"))]
mod test {
    use std::num::NonZeroU32;

    use rand_core::{CryptoRng, RngCore};

    use super::*;
    use crate::application::SystemClock;
    use crate::crypto_impl::{CrateAesGcm, CrateSha512};
    use crate::keystore::MemoryKeyStore;

    struct BrokenRng;
    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, _: &mut [u8]) {}
        fn try_fill_bytes(&mut self, _: &mut [u8]) -> Result<(), rand_core::Error> {
            Err(NonZeroU32::new(rand_core::Error::CUSTOM_START).unwrap().into())
        }
    }
    impl CryptoRng for BrokenRng {}

    struct BrokenCrypto;
    impl CryptoLayer for BrokenCrypto {
        type Rng = BrokenRng;
        type Aead = CrateAesGcm;
        type Hash = CrateSha512;
    }

    fn store() -> MemoryKeyStore {
        let mut store = MemoryKeyStore::new(&BrokenCrypto::SETTINGS);
        store.provision("alice", &[1u8; 32]).unwrap();
        store.provision("tgs", &[2u8; 32]).unwrap();
        store
    }

    #[test]
    fn entropy_failure_is_reported_as_key_generation_failure() {
        let store = store();
        let as_server = AuthenticationServer::<BrokenCrypto, _>::new(&store, BrokenRng).unwrap();
        assert_eq!(
            as_server.request_tgt(SystemClock::new(), "alice"),
            Err(ExchangeError::KeyGenerationFailed)
        );
    }

    #[test]
    fn tgs_is_never_a_client() {
        let store = store();
        let as_server = AuthenticationServer::<BrokenCrypto, _>::new(&store, BrokenRng).unwrap();
        assert_eq!(as_server.request_tgt(SystemClock::new(), "tgs"), Err(ExchangeError::UnknownPrincipal));
    }
}
