/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::application::{ApplicationLayer, CryptoLayer};
use crate::as_server::{AsReply, AuthenticationServer};
use crate::codec::{ApReply, Authenticator, Envelope};
use crate::key::Key;
use crate::keystore::KeyStore;
use crate::log_event::log;
use crate::proto::*;
use crate::result::{ExchangeError, RejectReason};
use crate::sealing::{open, seal, SealedApReply, SealedAuthenticator, SealedEnvelope, SealedTicket};
use crate::service::Service;
use crate::tgs::TicketGrantingServer;
#[cfg(feature = "logging")]
use crate::LogEvent::*;

/// A ticket the client holds together with the session key that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The server `ticket` is for.
    pub server_id: String,
    pub session_key: Key,
    pub ticket: SealedTicket,
    /// When the issuing server says `ticket` stops being accepted.
    pub expires_at: i64,
}

impl Credential {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// A request for a service ticket, to be carried to the TGS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TgsRequest {
    pub tgt: SealedTicket,
    pub authenticator: SealedAuthenticator,
    pub service_id: String,
}

/// A service ticket presentation, to be carried to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApRequest {
    pub ticket: SealedTicket,
    pub authenticator: SealedAuthenticator,
    /// Timestamp of `authenticator`, which the service must echo in its reply.
    pub timestamp: i64,
}

/// The client side of the protocol.
///
/// The request and reply steps are independent of any transport. `authenticate` runs all of
/// them against in-process servers.
///
/// Tickets are cached per server until they expire. Authenticators are never cached: each
/// presentation gets a new one with the current time.
pub struct Client<Crypto: CryptoLayer> {
    /// The `CryptoRng` instance that was passed to the client when it was created.
    pub rng: Mutex<Crypto::Rng>,
    id: String,
    key: Key,
    credentials: Mutex<HashMap<String, Credential>>,
}

impl<Crypto: CryptoLayer> Client<Crypto> {
    /// Create the client `client_id` holding the long-term key `key`.
    pub fn new(client_id: &str, key: Key, rng: Crypto::Rng) -> Self {
        Self {
            rng: Mutex::new(rng),
            id: client_id.to_string(),
            key,
            credentials: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Open the AS reply with the client's long-term key and cache the TGT it carries.
    pub fn read_as_reply<App: ApplicationLayer>(&self, app: App, reply: &AsReply) -> Result<Credential, ExchangeError> {
        let tgs_id = Crypto::SETTINGS.tgs_principal;
        let credential = self.read_envelope(&app, &self.key, LABEL_AS_ENVELOPE, tgs_id, &reply.envelope)?;
        if credential.ticket != reply.tgt {
            log!(app, ClientRejectedReply { client: &self.id, server: tgs_id });
            return Err(ExchangeError::InvalidEnvelope);
        }
        self.store(credential.clone());
        Ok(credential)
    }

    /// Build a request for a ticket to `service_id` using the TGT credential `tgt`.
    pub fn build_tgs_request<App: ApplicationLayer>(
        &self,
        app: App,
        tgt: &Credential,
        service_id: &str,
    ) -> Result<TgsRequest, ExchangeError> {
        let (authenticator, _) = self.authenticator(&app, &tgt.session_key, LABEL_TGS_AUTHENTICATOR)?;
        Ok(TgsRequest { tgt: tgt.ticket.clone(), authenticator, service_id: service_id.to_string() })
    }

    /// Open the TGS reply with the TGS session key and cache the service ticket it carries.
    pub fn read_tgs_reply<App: ApplicationLayer>(
        &self,
        app: App,
        tgt: &Credential,
        service_id: &str,
        reply: &SealedEnvelope,
    ) -> Result<Credential, ExchangeError> {
        let credential = self.read_envelope(&app, &tgt.session_key, LABEL_TGS_ENVELOPE, service_id, reply)?;
        self.store(credential.clone());
        Ok(credential)
    }

    /// Build a presentation of the service ticket in `credential`.
    pub fn build_ap_request<App: ApplicationLayer>(
        &self,
        app: App,
        credential: &Credential,
    ) -> Result<ApRequest, ExchangeError> {
        let (authenticator, timestamp) = self.authenticator(&app, &credential.session_key, LABEL_AP_AUTHENTICATOR)?;
        Ok(ApRequest { ticket: credential.ticket.clone(), authenticator, timestamp })
    }

    /// Check that the service's reply to `request` proves it could open the service ticket.
    pub fn verify_ap_reply<App: ApplicationLayer>(
        &self,
        app: App,
        credential: &Credential,
        request: &ApRequest,
        reply: &SealedApReply,
    ) -> Result<(), ExchangeError> {
        match open::<Crypto, ApReply>(&credential.session_key, LABEL_AP_REPLY, reply) {
            Ok(r) if r.server_id == credential.server_id && r.timestamp == request.timestamp => Ok(()),
            _ => {
                log!(app, ClientRejectedReply { client: &self.id, server: &credential.server_id });
                Err(ExchangeError::InvalidReply)
            }
        }
    }

    /// Return the unexpired cached credential for `server_id`, if any.
    /// Expired credentials are dropped from the cache.
    pub fn cached<App: ApplicationLayer>(&self, app: App, server_id: &str) -> Option<Credential> {
        let now = app.time();
        let mut credentials = self.credentials.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<String> = credentials
            .iter()
            .filter(|(_, credential)| credential.is_expired(now))
            .map(|(server, _)| server.clone())
            .collect();
        for server in &expired {
            credentials.remove(server);
        }
        let credential = credentials.get(server_id).cloned();
        drop(credentials);

        // Events are delivered with the cache unlocked, so the sink may call back into the client.
        for _server in &expired {
            log!(app, ClientCacheExpired { client: &self.id, server: _server });
        }
        if credential.is_some() {
            log!(app, ClientCacheHit { client: &self.id, server: server_id });
        }
        credential
    }

    /// Drop any cached credential for `server_id`.
    pub fn forget(&self, server_id: &str) {
        self.credentials.lock().unwrap_or_else(PoisonError::into_inner).remove(server_id);
    }

    /// Authenticate to `service`, running whichever of the AS, TGS and service exchanges are
    /// needed given the credentials already cached.
    ///
    /// If a server rejects a cached ticket, that ticket is dropped so the next attempt asks
    /// for a new one.
    pub fn authenticate<App: ApplicationLayer, AsStore: KeyStore, TgsStore: KeyStore>(
        &self,
        app: App,
        as_server: &AuthenticationServer<Crypto, AsStore>,
        tgs: &TicketGrantingServer<Crypto, TgsStore>,
        service: &Service<Crypto>,
    ) -> Result<Credential, ExchangeError> {
        let service_id = service.id();
        let credential = match self.cached(&app, service_id) {
            Some(credential) => credential,
            None => {
                let tgs_id = Crypto::SETTINGS.tgs_principal;
                let tgt = match self.cached(&app, tgs_id) {
                    Some(tgt) => tgt,
                    None => {
                        let reply = as_server.request_tgt(&app, &self.id)?;
                        self.read_as_reply(&app, &reply)?
                    }
                };
                let request = self.build_tgs_request(&app, &tgt, service_id)?;
                let reply = tgs
                    .request_service_ticket(&app, &request.tgt, &request.authenticator, &request.service_id)
                    .map_err(|e| self.forget_on_ticket_error(tgs_id, e))?;
                self.read_tgs_reply(&app, &tgt, service_id, &reply)?
            }
        };

        let request = self.build_ap_request(&app, &credential)?;
        let authenticated = service
            .authenticate(&app, &request.ticket, &request.authenticator)
            .map_err(|e| self.forget_on_ticket_error(service_id, e))?;
        self.verify_ap_reply(&app, &credential, &request, &authenticated.reply)?;
        Ok(credential)
    }

    fn forget_on_ticket_error(&self, server_id: &str, error: ExchangeError) -> ExchangeError {
        if matches!(error, ExchangeError::InvalidTicket | ExchangeError::TicketExpired) {
            self.forget(server_id);
        }
        error
    }

    fn store(&self, credential: Credential) {
        let mut credentials = self.credentials.lock().unwrap_or_else(PoisonError::into_inner);
        credentials.insert(credential.server_id.clone(), credential);
    }

    fn authenticator<App: ApplicationLayer>(
        &self,
        app: &App,
        session_key: &Key,
        label: &[u8],
    ) -> Result<(SealedAuthenticator, i64), ExchangeError> {
        let timestamp = app.time();
        let authenticator = Authenticator { client_id: self.id.clone(), timestamp };
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let sealed = seal::<Crypto, _>(&mut *rng, session_key, label, &authenticator)?;
        Ok((sealed, timestamp))
    }

    fn read_envelope<App: ApplicationLayer>(
        &self,
        app: &App,
        key: &Key,
        label: &[u8],
        expected_server: &str,
        sealed: &SealedEnvelope,
    ) -> Result<Credential, ExchangeError> {
        let envelope = open::<Crypto, Envelope>(key, label, sealed).and_then(|envelope| {
            if envelope.server_id == expected_server {
                Ok(envelope)
            } else {
                Err(RejectReason::ServerMismatch)
            }
        });
        match envelope {
            Ok(envelope) => Ok(Credential {
                server_id: envelope.server_id,
                session_key: envelope.session_key,
                ticket: envelope.ticket,
                expires_at: envelope.expires_at,
            }),
            Err(_) => {
                log!(app, ClientRejectedReply { client: &self.id, server: expected_server });
                Err(ExchangeError::InvalidEnvelope)
            }
        }
    }
}
