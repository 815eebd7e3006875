/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
use std::sync::{Mutex, PoisonError};

use crate::application::{ApplicationLayer, CryptoLayer};
use crate::codec::ApReply;
use crate::key::Key;
use crate::keystore::KeyStore;
use crate::log_event::log;
use crate::proto::*;
use crate::result::{ExchangeError, KeyError};
use crate::sealing::{seal, SealedApReply, SealedAuthenticator, SealedTicket};
use crate::verify::{Refusal, Verifier};
#[cfg(feature = "logging")]
use crate::LogEvent::*;

/// The outcome of a successful authentication at a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    /// The client the ticket was issued to.
    pub client_id: String,
    /// The key shared with the client for the rest of the conversation.
    pub session_key: Key,
    /// When the client's ticket stops being accepted.
    pub ticket_expires_at: i64,
    /// Mutual authentication reply to send back to the client.
    pub reply: SealedApReply,
}

/// An end service. Verifies service tickets locally using only its own long-term key.
pub struct Service<Crypto: CryptoLayer> {
    /// The `CryptoRng` instance that was passed to the service when it was created.
    pub rng: Mutex<Crypto::Rng>,
    verifier: Verifier,
}

impl<Crypto: CryptoLayer> Service<Crypto> {
    /// Create the service `service_id` holding the long-term key `key`.
    pub fn new(service_id: &str, key: Key, rng: Crypto::Rng) -> Result<Self, KeyError> {
        let settings = &Crypto::SETTINGS;
        if !settings.accepts_key_size(key.size()) {
            return Err(KeyError::InvalidKeyLength(key.size().len()));
        }
        Ok(Self {
            rng: Mutex::new(rng),
            verifier: Verifier::new(service_id.to_string(), key, settings),
        })
    }

    /// Create the service `service_id`, taking its long-term key from `store`.
    /// The principal must be registered in `store` as a service.
    pub fn from_store<Store: KeyStore + ?Sized>(
        store: &Store,
        service_id: &str,
        rng: Crypto::Rng,
    ) -> Result<Self, KeyError> {
        let key = store.lookup_service(service_id).ok_or(KeyError::MissingPrincipal)?;
        Self::new(service_id, key, rng)
    }

    pub fn id(&self) -> &str {
        &self.verifier.id
    }

    /// Verify a service ticket and the authenticator presented with it.
    ///
    /// Checks run in order and the first failure is returned: the ticket must open under this
    /// service's key, name this service and be unexpired; the authenticator must open under
    /// the ticket's session key, name the ticket's client and lie within the freshness window.
    /// An authenticator exactly at the edge of the window is still accepted.
    ///
    /// Unless the replay cache is enabled, an authenticator captured in transit is accepted
    /// again for as long as it stays inside the freshness window.
    pub fn authenticate<App: ApplicationLayer>(
        &self,
        app: App,
        ticket: &SealedTicket,
        authenticator: &SealedAuthenticator,
    ) -> Result<Authenticated, ExchangeError> {
        let now = app.time();
        let (ticket, authenticator) =
            match self.verifier.verify::<Crypto>(ticket, authenticator, LABEL_AP_AUTHENTICATOR, now) {
                Ok(verified) => verified,
                Err(refusal) => {
                    let error = refusal.error();
                    self.log_refusal(&app, refusal);
                    return Err(error);
                }
            };

        let reply = ApReply { server_id: self.verifier.id.clone(), timestamp: authenticator.timestamp };
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let reply = seal::<Crypto, _>(&mut *rng, &ticket.session_key, LABEL_AP_REPLY, &reply)?;
        drop(rng);

        log!(app, ServiceAuthenticated { service: &self.verifier.id, client: &ticket.client_id });
        Ok(Authenticated {
            ticket_expires_at: ticket.expires_at(),
            client_id: ticket.client_id,
            session_key: ticket.session_key,
            reply,
        })
    }

    #[allow(unused)]
    fn log_refusal<App: ApplicationLayer>(&self, app: &App, refusal: Refusal) {
        let service = self.verifier.id.as_str();
        #[cfg(feature = "logging")]
        match refusal {
            Refusal::Ticket(reason) => app.event_log(ServiceRejectedTicket { service, reason }),
            Refusal::TicketExpired { client, expired_at } => {
                app.event_log(ServiceTicketExpired { service, client: &client, expired_at })
            }
            Refusal::Authenticator { client, reason } => {
                app.event_log(ServiceRejectedAuthenticator { service, client: &client, reason })
            }
            Refusal::Stale { client, skew } => {
                app.event_log(AuthenticatorExpired { verifier: service, client: &client, skew })
            }
            Refusal::Replayed { client } => app.event_log(AuthenticatorReplayed { verifier: service, client: &client }),
            Refusal::ReplayCacheFull => app.event_log(ReplayCacheFull { verifier: service }),
        };
    }
}
