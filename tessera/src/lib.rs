/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
//! Tessera
//! ======
//!
//! Tessera is a three-party, ticket-based authentication protocol in the style of Kerberos.
//! A client obtains a long-lived ticket-granting ticket (TGT) from an Authentication Server,
//! exchanges it at a Ticket-Granting Server for short-lived service tickets, and presents
//! those tickets to services which verify them locally, without contacting any central server
//! at request time.
//!
//! ## Keyspaces
//!
//! Three independent kinds of long-term key are involved: the client's, the TGS's and one per
//! service. Tickets are always sealed under the long-term key of the server that will consume
//! them. Two layers of session keys (client/TGS and client/service) are carried down to the
//! client inside envelopes sealed under a key the client already holds, and every
//! authenticator is sealed under the session key named by the ticket it accompanies.
//!
//! ## Collaborators
//!
//! The protocol core is generic over a `CryptoLayer` (cipher, hash and RNG) and an
//! `ApplicationLayer` (clock and event log). Default implementations in terms of popular Rust
//! crates live in `crypto_impl` and can be disabled via feature selection.
//!
//! ## Cryptographic Primitives Used in Tessera
//!
//!  - **AES-GCM** (128, 192 or 256-bit keys): authenticated encryption of every credential
//!  - **SHA-512**: authenticator fingerprints for the optional replay cache
#![warn(rust_2018_idioms)]

mod log_event;
mod replay;
mod sealing;
mod verify;

/// Traits for the clock, event log and cryptographic providers the protocol is generic over,
/// together with all time-based settings.
pub mod application;
/// The Authentication Server, which issues ticket-granting tickets.
pub mod as_server;
/// Client side protocol driver and credential cache.
pub mod client;
/// Canonical length-prefixed encoding of tickets, authenticators and envelopes.
pub mod codec;
/// Implementation-independent traits for the cryptographic algorithms Tessera depends on.
pub mod crypto;
/// Optional implementations of the `crypto` traits in terms of popular Rust crates.
pub mod crypto_impl;
/// Fixed-length symmetric keys.
pub mod key;
/// Principal to long-term key lookup.
pub mod keystore;
/// Protocol constants.
pub mod proto;
/// The collection of error types of this library.
pub mod result;
/// End services verifying service tickets.
pub mod service;
/// The Ticket-Granting Server, which exchanges TGTs for service tickets.
pub mod tgs;

pub use application::{ApplicationLayer, CryptoLayer, Settings, SystemClock};
pub use as_server::{AsReply, AuthenticationServer};
pub use client::{ApRequest, Client, Credential, TgsRequest};
pub use codec::{ApReply, Authenticator, Envelope, Ticket};
pub use key::{Key, KeySize};
pub use keystore::{KeyStore, MemoryKeyStore};
#[cfg(feature = "logging")]
pub use log_event::LogEvent;
pub use sealing::{Sealed, SealedApReply, SealedAuthenticator, SealedEnvelope, SealedTicket};
pub use result::{ExchangeError, KeyError, RejectReason};
pub use service::{Authenticated, Service};
pub use tgs::TicketGrantingServer;
