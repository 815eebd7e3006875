use crate::application::{CryptoLayer, Settings};
use crate::codec::{Authenticator, Ticket};
use crate::key::Key;
use crate::replay::{fingerprint, ReplayCache, ReplayError};
use crate::proto::LABEL_TICKET;
use crate::result::{ExchangeError, RejectReason};
use crate::sealing::{open, SealedAuthenticator, SealedTicket};

/// Why a ticket and authenticator pair was refused by a verifier.
///
/// Each server turns this into its own log event and its caller-visible `ExchangeError`.
pub(crate) enum Refusal {
    Ticket(RejectReason),
    TicketExpired { client: String, expired_at: i64 },
    Authenticator { client: String, reason: RejectReason },
    Stale { client: String, skew: i64 },
    Replayed { client: String },
    ReplayCacheFull,
}

impl Refusal {
    pub(crate) fn error(&self) -> ExchangeError {
        match self {
            Self::Ticket(_) => ExchangeError::InvalidTicket,
            Self::TicketExpired { .. } => ExchangeError::TicketExpired,
            Self::Authenticator { .. } => ExchangeError::InvalidAuthenticator,
            Self::Stale { .. } => ExchangeError::AuthenticatorExpired,
            Self::Replayed { .. } => ExchangeError::AuthenticatorReplayed,
            Self::ReplayCacheFull => ExchangeError::ReplayCacheFull,
        }
    }
}

/// The state a verifier keeps between presentations: its identity, its long-term key and the
/// optional replay cache. Shared by the TGS and every service.
pub(crate) struct Verifier {
    pub(crate) id: String,
    pub(crate) key: Key,
    replay: Option<ReplayCache>,
}

impl Verifier {
    pub(crate) fn new(id: String, key: Key, settings: &Settings) -> Self {
        let replay = settings.replay_cache.then(|| ReplayCache::new(settings.replay_cache_capacity));
        Self { id, key, replay }
    }

    /// Accept a presentation of `sealed_ticket` with `sealed_authenticator` at time `now`.
    ///
    /// Checks, in order: the ticket opens under this verifier's key and names it, the ticket
    /// has not expired, the authenticator opens under the ticket's session key and names the
    /// ticket's client, the authenticator is inside the freshness window and, if the replay
    /// cache is on, it has not been presented before.
    pub(crate) fn verify<Crypto: CryptoLayer>(
        &self,
        sealed_ticket: &SealedTicket,
        sealed_authenticator: &SealedAuthenticator,
        authenticator_label: &[u8],
        now: i64,
    ) -> Result<(Ticket, Authenticator), Refusal> {
        let settings = &Crypto::SETTINGS;
        let ticket = open::<Crypto, Ticket>(&self.key, LABEL_TICKET, sealed_ticket).map_err(Refusal::Ticket)?;
        if ticket.server_id != self.id {
            return Err(Refusal::Ticket(RejectReason::ServerMismatch));
        }
        if ticket.is_expired(now) {
            let expired_at = ticket.expires_at();
            return Err(Refusal::TicketExpired { client: ticket.client_id, expired_at });
        }

        let authenticator = open::<Crypto, Authenticator>(&ticket.session_key, authenticator_label, sealed_authenticator)
            .map_err(|reason| Refusal::Authenticator { client: ticket.client_id.clone(), reason })?;
        if authenticator.client_id != ticket.client_id {
            return Err(Refusal::Authenticator {
                client: ticket.client_id,
                reason: RejectReason::ClientMismatch,
            });
        }

        let skew = now.saturating_sub(authenticator.timestamp);
        if skew.unsigned_abs() > settings.authenticator_window {
            return Err(Refusal::Stale { client: ticket.client_id, skew });
        }

        if let Some(replay) = &self.replay {
            let window = i64::try_from(settings.authenticator_window).unwrap_or(i64::MAX);
            let fp = fingerprint::<Crypto>(&authenticator.client_id, sealed_ticket.as_bytes(), authenticator.timestamp);
            match replay.check_and_insert(fp, authenticator.timestamp.saturating_add(window), now) {
                Ok(()) => {}
                Err(ReplayError::Full) => return Err(Refusal::ReplayCacheFull),
                Err(ReplayError::Replayed) => return Err(Refusal::Replayed { client: ticket.client_id }),
            }
        }
        Ok((ticket, authenticator))
    }
}
