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
use crate::sealing::{seal, SealedAuthenticator, SealedEnvelope, SealedTicket};
use crate::verify::{Refusal, Verifier};
#[cfg(feature = "logging")]
use crate::LogEvent::*;

/// The Ticket-Granting Server: exchanges a TGT plus a fresh authenticator for a service ticket.
pub struct TicketGrantingServer<Crypto: CryptoLayer, Store: KeyStore> {
    /// The `CryptoRng` instance that was passed to the TGS when it was created.
    pub rng: Mutex<Crypto::Rng>,
    store: Store,
    verifier: Verifier,
}

impl<Crypto: CryptoLayer, Store: KeyStore> TicketGrantingServer<Crypto, Store> {
    /// Create a TGS reading its own key and the service keys from `store`.
    pub fn new(store: Store, rng: Crypto::Rng) -> Result<Self, KeyError> {
        let settings = &Crypto::SETTINGS;
        let tgs_key = store.lookup(settings.tgs_principal).ok_or(KeyError::MissingPrincipal)?;
        if !settings.accepts_key_size(tgs_key.size()) {
            return Err(KeyError::InvalidKeyLength(tgs_key.size().len()));
        }
        let verifier = Verifier::new(settings.tgs_principal.to_string(), tgs_key, settings);
        Ok(Self { rng: Mutex::new(rng), store, verifier })
    }

    /// Issue a ticket for `service_id` to the holder of `tgt`.
    ///
    /// `authenticator` must be sealed under the TGS session key inside `tgt` and be fresh.
    /// Checks run in order and the first failure is returned: the TGT, then the authenticator,
    /// then the requested service. The reply is sealed under the TGS session key.
    ///
    /// Only principals the store lists as services can be requested. The TGS itself is never
    /// one, so a TGT can only be renewed by going back to the AS.
    pub fn request_service_ticket<App: ApplicationLayer>(
        &self,
        app: App,
        tgt: &SealedTicket,
        authenticator: &SealedAuthenticator,
        service_id: &str,
    ) -> Result<SealedEnvelope, ExchangeError> {
        let settings = &Crypto::SETTINGS;
        let now = app.time();

        let (tgt, _) = match self.verifier.verify::<Crypto>(tgt, authenticator, LABEL_TGS_AUTHENTICATOR, now) {
            Ok(verified) => verified,
            Err(refusal) => {
                let error = refusal.error();
                self.log_refusal(&app, refusal);
                return Err(error);
            }
        };

        let service_key = if service_id == settings.tgs_principal {
            None
        } else {
            accepted(settings, self.store.lookup_service(service_id))?
        };
        let Some(service_key) = service_key else {
            log!(app, TgsUnknownService { client: &tgt.client_id, service: service_id });
            return Err(ExchangeError::UnknownService);
        };

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let session_key =
            Key::generate(&mut *rng, settings.session_key_size).map_err(|_| ExchangeError::KeyGenerationFailed)?;
        let ticket = Ticket {
            client_id: tgt.client_id.clone(),
            server_id: service_id.to_string(),
            issued_at: now,
            lifetime: settings.service_ticket_lifetime,
            session_key: session_key.clone(),
        };
        let expires_at = ticket.expires_at();
        let service_ticket = seal::<Crypto, _>(&mut *rng, &service_key, LABEL_TICKET, &ticket)?;

        let envelope = Envelope {
            session_key,
            ticket: service_ticket,
            server_id: service_id.to_string(),
            expires_at,
        };
        let envelope = seal::<Crypto, _>(&mut *rng, &tgt.session_key, LABEL_TGS_ENVELOPE, &envelope)?;
        drop(rng);

        log!(app, TgsIssuedTicket { client: &tgt.client_id, service: service_id, expires_at });
        Ok(envelope)
    }

    #[allow(unused)]
    fn log_refusal<App: ApplicationLayer>(&self, app: &App, refusal: Refusal) {
        #[cfg(feature = "logging")]
        match refusal {
            Refusal::Ticket(reason) => app.event_log(TgsRejectedTicket(reason)),
            Refusal::TicketExpired { client, expired_at } => {
                app.event_log(TgsTicketExpired { client: &client, expired_at })
            }
            Refusal::Authenticator { client, reason } => {
                app.event_log(TgsRejectedAuthenticator { client: &client, reason })
            }
            Refusal::Stale { client, skew } => {
                app.event_log(AuthenticatorExpired { verifier: &self.verifier.id, client: &client, skew })
            }
            Refusal::Replayed { client } => {
                app.event_log(AuthenticatorReplayed { verifier: &self.verifier.id, client: &client })
            }
            Refusal::ReplayCacheFull => app.event_log(ReplayCacheFull { verifier: &self.verifier.id }),
        };
    }
}
