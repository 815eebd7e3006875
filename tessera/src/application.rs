use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand_core::{CryptoRng, RngCore};

use crate::crypto::*;
use crate::key::KeySize;
use crate::proto::*;

/// A container for all of the dynamic settings within Tessera, including all time-based
/// settings. All times are in milliseconds, matching `ApplicationLayer::time`.
///
/// The AS, TGS and services of one deployment must agree on these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Principal identifier of the Ticket-Granting Server. The AS mints TGTs for this server
    /// and the TGS only accepts tickets naming it.
    pub tgs_principal: &'static str,
    /// Lifetime of a ticket-granting ticket.
    pub tgt_lifetime: u64,
    /// Lifetime of a service ticket.
    pub service_ticket_lifetime: u64,
    /// How far an authenticator's timestamp may lie from the verifier's clock, in either
    /// direction, before it is rejected as expired. This bounds how long a captured
    /// authenticator can be replayed.
    pub authenticator_window: u64,
    /// Size of freshly generated session keys.
    pub session_key_size: KeySize,
    /// Key sizes accepted for long-term keys. Anything else is a configuration error.
    pub accepted_key_sizes: &'static [KeySize],
    /// Whether verifiers remember accepted authenticators for the length of the freshness
    /// window and reject a second presentation.
    ///
    /// When this is false, an authenticator captured in transit can be replayed for as long
    /// as it stays inside `authenticator_window`.
    pub replay_cache: bool,
    /// Maximum number of authenticators each verifier remembers. When the cache is full of
    /// unexpired entries new authenticators are refused rather than evicting old ones.
    pub replay_cache_capacity: usize,
}
impl Settings {
    /// Default value for the `tgt_lifetime`.
    /// The default value is 8 hours in ms.
    pub const TGT_LIFETIME_MS: u64 = 8 * HOUR_MS;
    /// Default value for the `service_ticket_lifetime`.
    /// The default value is 2 hours in ms.
    pub const SERVICE_TICKET_LIFETIME_MS: u64 = 2 * HOUR_MS;
    /// Default value for the `authenticator_window`.
    /// The default value is 5 minutes in ms.
    pub const AUTHENTICATOR_WINDOW_MS: u64 = 5 * MINUTE_MS;
    /// Default value for the `replay_cache_capacity`.
    pub const REPLAY_CACHE_CAPACITY: usize = 4096;

    /// Create an instance of Settings with all default values.
    /// These defaults are in units of milliseconds, so if these defaults are used,
    /// `ApplicationLayer::time` must return timestamps in units of milliseconds as well.
    ///
    /// The replay cache is off, so authenticators are only bounded by the freshness window.
    pub const fn new_ms() -> Self {
        Self {
            tgs_principal: TGS_PRINCIPAL,
            tgt_lifetime: Self::TGT_LIFETIME_MS,
            service_ticket_lifetime: Self::SERVICE_TICKET_LIFETIME_MS,
            authenticator_window: Self::AUTHENTICATOR_WINDOW_MS,
            session_key_size: KeySize::Aes256,
            accepted_key_sizes: KeySize::ALL,
            replay_cache: false,
            replay_cache_capacity: Self::REPLAY_CACHE_CAPACITY,
        }
    }

    /// Like `new_ms`, but with the replay cache enabled and only 256-bit long-term keys
    /// accepted.
    pub const fn hardened_ms() -> Self {
        Self {
            accepted_key_sizes: &[KeySize::Aes256],
            replay_cache: true,
            ..Self::new_ms()
        }
    }

    /// Returns true if long-term keys of `size` are accepted by this deployment.
    pub fn accepts_key_size(&self, size: KeySize) -> bool {
        self.accepted_key_sizes.contains(&size)
    }
}
impl Default for Settings {
    fn default() -> Self {
        Self::new_ms()
    }
}

/// Trait to implement to choose the cryptographic providers Tessera uses.
///
/// Templating the protocol on this trait keeps the code here independent of any particular
/// cryptography library. See `crypto_impl::DefaultCrypto` for an implementation in terms of
/// popular Rust crates.
pub trait CryptoLayer: Sized {
    /// The settings of this deployment. Every party of one deployment must use the same.
    const SETTINGS: Settings = Settings::new_ms();

    /// The random number generator that session keys and nonces are drawn from.
    /// It must be cryptographically secure.
    type Rng: CryptoRng + RngCore;

    /// The implementation of AES-GCM credentials are sealed with.
    type Aead: AesGcm;

    /// The implementation of SHA-512 the replay cache fingerprints authenticators with.
    type Hash: Sha512Hash;
}

/// Trait to implement to integrate Tessera into an application.
///
/// Supplies the notion of time shared by all three servers, and optionally receives a stream
/// of protocol events for logging.
pub trait ApplicationLayer {
    /// Should return the current time in milliseconds since the Unix epoch.
    ///
    /// Must not decrease within a process. The AS, TGS and services must be on roughly the same
    /// clock, since tickets and authenticators carry absolute timestamps; skew beyond the
    /// authenticator window causes spurious expiry.
    fn time(&self) -> i64;

    /// Receives a stream of events that occur during an execution of the protocol.
    /// These are provided for debugging, logging or metrics purposes, and must be used for
    /// nothing else. Do not base protocol-level decisions upon the events passed to this function.
    #[cfg(feature = "logging")]
    #[allow(unused)]
    fn event_log(&self, event: crate::LogEvent<'_>) {}
}

impl<A: ApplicationLayer + ?Sized> ApplicationLayer for &A {
    fn time(&self) -> i64 {
        (**self).time()
    }

    #[cfg(feature = "logging")]
    fn event_log(&self, event: crate::LogEvent<'_>) {
        (**self).event_log(event)
    }
}

/// An `ApplicationLayer` backed by the system wall clock, clamped so that it never runs
/// backwards within this process. Discards all events.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationLayer for SystemClock {
    fn time(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        let prev = self.last.fetch_max(now, Ordering::Relaxed);
        prev.max(now)
    }
}
