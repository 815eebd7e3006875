use crate::result::RejectReason;

/// Protocol events that might be interesting to log or aggregate into metrics.
///
/// Events name principals and carry timestamps and reject reasons. They never carry keys or
/// any other decrypted credential contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent<'a> {
    /// The AS was asked for a TGT by a client missing from its key store.
    AsUnknownClient(&'a str),
    /// The AS issued a TGT.
    AsIssuedTgt { client: &'a str, expires_at: i64 },
    /// The TGS could not accept a TGT.
    TgsRejectedTicket(RejectReason),
    /// The TGS accepted a TGT whose lifetime had elapsed, and refused it.
    TgsTicketExpired { client: &'a str, expired_at: i64 },
    /// The TGS could not accept an authenticator.
    TgsRejectedAuthenticator { client: &'a str, reason: RejectReason },
    /// The TGS was asked for a ticket to a principal its key store does not list as a service.
    TgsUnknownService { client: &'a str, service: &'a str },
    /// The TGS issued a service ticket.
    TgsIssuedTicket { client: &'a str, service: &'a str, expires_at: i64 },
    /// A service could not accept a service ticket.
    ServiceRejectedTicket { service: &'a str, reason: RejectReason },
    /// A service accepted a service ticket whose lifetime had elapsed, and refused it.
    ServiceTicketExpired { service: &'a str, client: &'a str, expired_at: i64 },
    /// A service could not accept an authenticator.
    ServiceRejectedAuthenticator { service: &'a str, client: &'a str, reason: RejectReason },
    /// An authenticator's timestamp was `skew` milliseconds away from the verifier's clock,
    /// outside of the freshness window. Negative values lie in the future.
    AuthenticatorExpired { verifier: &'a str, client: &'a str, skew: i64 },
    /// An authenticator was presented a second time and the replay cache refused it.
    AuthenticatorReplayed { verifier: &'a str, client: &'a str },
    /// The replay cache had no room for a new authenticator.
    ReplayCacheFull { verifier: &'a str },
    /// A service authenticated a client.
    ServiceAuthenticated { service: &'a str, client: &'a str },
    /// A client used a credential from its cache rather than asking a server again.
    ClientCacheHit { client: &'a str, server: &'a str },
    /// A client dropped an expired credential from its cache.
    ClientCacheExpired { client: &'a str, server: &'a str },
    /// A client could not read a reply from a server.
    ClientRejectedReply { client: &'a str, server: &'a str },
}

/// Macro to turn off logging at compile time.
macro_rules! log {
    ($app:expr, $event:expr) => {
        #[cfg(feature = "logging")]
        $app.event_log($event);
    };
}
pub(crate) use log;
