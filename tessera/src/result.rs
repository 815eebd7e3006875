/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
use std::fmt;

/// An error that can occur while running one of the three protocol exchanges.
///
/// None of these carry key material or the contents of decrypted credentials. Failures to
/// decrypt and failures to parse a credential are reported as the same kind, so
/// a remote party cannot use the distinction as an oracle. The precise reason is only reported
/// to the local event log, see `RejectReason`.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum ExchangeError {
    /// The requesting client is not present in the key store.
    UnknownPrincipal,

    /// The requested service is not present in the key store.
    UnknownService,

    /// A credential did not match its expected encoding.
    Format(FormatError),

    /// The presented ticket could not be decrypted, could not be parsed, or was minted for a
    /// different server.
    /// The client must go back to the server that issued the ticket.
    InvalidTicket,

    /// The ticket was valid but its lifetime has elapsed.
    /// The client must go back to the server that issued the ticket.
    TicketExpired,

    /// The authenticator could not be decrypted under the ticket's session key, could not be
    /// parsed, or names a different client than the ticket.
    InvalidAuthenticator,

    /// The authenticator's timestamp is outside of the freshness window.
    /// The ticket itself may still be fine, the client should resubmit with a fresh authenticator.
    AuthenticatorExpired,

    /// The authenticator was already accepted once within its freshness window.
    /// Only reported when the replay cache is enabled.
    AuthenticatorReplayed,

    /// The replay cache is full of unexpired entries, so the authenticator cannot be remembered
    /// and is refused.
    ReplayCacheFull,

    /// A reply envelope could not be decrypted or parsed by the client, or names a different
    /// server than the one that was asked.
    InvalidEnvelope,

    /// The service's mutual authentication reply did not prove possession of the session key.
    InvalidReply,

    /// The secure random source failed to produce a session key or nonce.
    KeyGenerationFailed,

    /// A key retrieved from the key store has a size the deployment does not accept.
    InvalidKeyLength,

    /// The cipher failed to seal a credential.
    EncryptionFailed,
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPrincipal => write!(f, "unknown principal"),
            Self::UnknownService => write!(f, "unknown service"),
            Self::Format(e) => write!(f, "malformed credential: {}", e),
            Self::InvalidTicket => write!(f, "invalid ticket"),
            Self::TicketExpired => write!(f, "ticket expired"),
            Self::InvalidAuthenticator => write!(f, "invalid authenticator"),
            Self::AuthenticatorExpired => write!(f, "authenticator expired"),
            Self::AuthenticatorReplayed => write!(f, "authenticator replayed"),
            Self::ReplayCacheFull => write!(f, "replay cache full"),
            Self::InvalidEnvelope => write!(f, "invalid envelope"),
            Self::InvalidReply => write!(f, "invalid service reply"),
            Self::KeyGenerationFailed => write!(f, "session key generation failed"),
            Self::InvalidKeyLength => write!(f, "key length not accepted by this deployment"),
            Self::EncryptionFailed => write!(f, "encryption failed"),
        }
    }
}

impl std::error::Error for ExchangeError {}

impl From<FormatError> for ExchangeError {
    fn from(error: FormatError) -> Self {
        Self::Format(error)
    }
}

impl From<CipherError> for ExchangeError {
    fn from(_: CipherError) -> Self {
        Self::EncryptionFailed
    }
}

/// A credential failed to decode. Decoding never returns a partial result.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum FormatError {
    /// The input ended in the middle of the header, a length prefix or a field.
    Truncated,
    /// The kind byte does not name the credential being decoded.
    WrongKind,
    /// The header announces a different number of fields than the credential has.
    FieldCount {
        /// The number of fields the credential has.
        expected: u8,
        /// The number of fields announced by the input.
        found: u8,
    },
    /// A length prefix exceeds the maximum field size.
    FieldTooLarge,
    /// Bytes remain after the last field.
    TrailingBytes,
    /// An identifier is empty or not valid UTF-8.
    InvalidIdentifier,
    /// A timestamp or lifetime field has the wrong size or an out of range value.
    InvalidTime,
    /// An embedded key has a length the cipher does not accept.
    InvalidKey,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated"),
            Self::WrongKind => write!(f, "wrong credential kind"),
            Self::FieldCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            Self::FieldTooLarge => write!(f, "field too large"),
            Self::TrailingBytes => write!(f, "trailing bytes"),
            Self::InvalidIdentifier => write!(f, "invalid identifier"),
            Self::InvalidTime => write!(f, "invalid time field"),
            Self::InvalidKey => write!(f, "invalid embedded key"),
        }
    }
}

impl std::error::Error for FormatError {}

/// An error related to key material, raised at provisioning time or while generating keys.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum KeyError {
    /// The key has this many bytes, which is not a key size the cipher or deployment accepts.
    InvalidKeyLength(usize),
    /// The secure random source failed.
    KeyGenerationFailed,
    /// The principal already has a key.
    DuplicatePrincipal,
    /// Another principal already holds the same key.
    SharedKey,
    /// A principal the component needs is missing from the key store.
    MissingPrincipal,
    /// The principal identifier is empty, or names the TGS where a service is required.
    InvalidPrincipal,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength(len) => write!(f, "invalid key length {}", len),
            Self::KeyGenerationFailed => write!(f, "key generation failed"),
            Self::DuplicatePrincipal => write!(f, "principal already provisioned"),
            Self::SharedKey => write!(f, "key already held by another principal"),
            Self::MissingPrincipal => write!(f, "principal missing from key store"),
            Self::InvalidPrincipal => write!(f, "invalid principal identifier"),
        }
    }
}

impl std::error::Error for KeyError {}

/// An error reported by a cipher backend.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum CipherError {
    /// The backend could not be initialized with the given key.
    InvalidKey,
    /// The backend failed while encrypting.
    EncryptionFailed,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "cipher rejected key"),
            Self::EncryptionFailed => write!(f, "cipher failed to encrypt"),
        }
    }
}

impl std::error::Error for CipherError {}

/// Why a ticket, authenticator or envelope was rejected.
///
/// Only reported to the local event log. An attacker may control which of these occurs, so
/// treat it as raw input.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum RejectReason {
    /// Too short to contain a nonce and tag, or the authentication tag did not match.
    Undecryptable,
    /// Decrypted correctly but did not decode.
    Malformed(FormatError),
    /// The ticket names a different server than the one it was presented to.
    ServerMismatch,
    /// The authenticator names a different client than its ticket.
    ClientMismatch,
}
