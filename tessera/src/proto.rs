/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
use crate::crypto::*;

/* Principal constants */

/// Default principal identifier of the Ticket-Granting Server.
pub const TGS_PRINCIPAL: &str = "tgs";

/* Time constants, all in milliseconds */

pub const SECOND_MS: u64 = 1000;
pub const MINUTE_MS: u64 = 60 * SECOND_MS;
pub const HOUR_MS: u64 = 60 * MINUTE_MS;

/* Sealed credential layout */
/*
Sealed:
    [0..12]      AES-GCM nonce
    [12..N-16]   ciphertext of the encoded credential
    [N-16..N]    AES-GCM tag
*/
pub(crate) const SEALED_OVERHEAD: usize = AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE;

/* Codec layout */
/*
Credential:
    [0]          kind
    [1]          field count
    repeated:
        [0..4]   field length, big endian u32
        [4..]    field bytes
*/
pub(crate) const CODEC_HEADER_SIZE: usize = 2;
pub(crate) const FIELD_LEN_SIZE: usize = 4;
pub(crate) const TIME_FIELD_SIZE: usize = 8;
/// Upper bound on the size of any single encoded field. Legitimate credentials are orders of
/// magnitude smaller, this only bounds allocation when decoding hostile input.
pub(crate) const MAX_FIELD_SIZE: usize = 1 << 16;

pub(crate) const KIND_TICKET: u8 = 1;
pub(crate) const KIND_AUTHENTICATOR: u8 = 2;
pub(crate) const KIND_ENVELOPE: u8 = 3;
pub(crate) const KIND_AP_REPLY: u8 = 4;

pub(crate) const TICKET_FIELDS: u8 = 5;
pub(crate) const AUTHENTICATOR_FIELDS: u8 = 2;
pub(crate) const ENVELOPE_FIELDS: u8 = 4;
pub(crate) const AP_REPLY_FIELDS: u8 = 2;

/* Key usage labels */
/*
Every seal is bound to the usage it was produced for through the AEAD associated data, so a
ciphertext produced for one hop can never be opened as a credential of another hop, even
under the same key.
*/
pub(crate) const LABEL_TICKET: &[u8; 11] = b"TESSERA_TKT";
pub(crate) const LABEL_AS_ENVELOPE: &[u8; 11] = b"TESSERA_ASR";
pub(crate) const LABEL_TGS_ENVELOPE: &[u8; 11] = b"TESSERA_TGR";
pub(crate) const LABEL_TGS_AUTHENTICATOR: &[u8; 11] = b"TESSERA_TGA";
pub(crate) const LABEL_AP_AUTHENTICATOR: &[u8; 11] = b"TESSERA_APA";
pub(crate) const LABEL_AP_REPLY: &[u8; 11] = b"TESSERA_APR";

/* Replay cache constants */

/// Size of the authenticator fingerprint kept by the replay cache.
pub(crate) const FINGERPRINT_SIZE: usize = 32;
