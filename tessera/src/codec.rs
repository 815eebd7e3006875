/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
//! Every credential is encoded as a kind byte, a field count, and then each field prefixed by
//! its length as a big endian `u32`. Fields are never delimited by a reserved value, so any
//! identifier round-trips regardless of its contents. Decoding is all or nothing: any deviation
//! from the expected shape is a `FormatError`.
use zeroize::Zeroizing;

use crate::key::Key;
use crate::proto::*;
use crate::result::FormatError;
use crate::sealing::SealedTicket;

/// A credential with a canonical byte encoding.
pub trait Codec: Sized {
    /// Kind byte identifying this credential on the wire.
    const KIND: u8;
    /// Exact number of fields this credential has.
    const FIELDS: u8;

    /// Encode this credential.
    ///
    /// The output may contain key material so it is cleared when dropped.
    /// Fails on anything `decode` would refuse, so every encoding decodes again.
    fn encode(&self) -> Result<Zeroizing<Vec<u8>>, FormatError>;

    /// Decode a credential, failing closed on any deviation from the canonical encoding.
    fn decode(bytes: &[u8]) -> Result<Self, FormatError>;
}

/// "Principal `client_id` may use `session_key` to talk to `server_id` until
/// `issued_at + lifetime`."
///
/// A ticket only ever leaves its issuer sealed under the long-term key of `server_id`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Ticket {
    pub client_id: String,
    pub server_id: String,
    /// Milliseconds since the Unix epoch.
    pub issued_at: i64,
    /// Milliseconds.
    pub lifetime: u64,
    pub session_key: Key,
}

impl Ticket {
    /// Time in milliseconds since the Unix epoch at which this ticket stops being accepted.
    pub fn expires_at(&self) -> i64 {
        self.issued_at.saturating_add(i64::try_from(self.lifetime).unwrap_or(i64::MAX))
    }

    /// Returns true if the ticket is no longer valid at time `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at()
    }
}

/// Proof that the presenter of a ticket currently holds its session key.
/// Sealed under that session key and built fresh for every presentation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Authenticator {
    pub client_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// The reply of the AS or TGS: the session key for the next hop and the ticket to carry there.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Envelope {
    pub session_key: Key,
    pub ticket: SealedTicket,
    /// The server `ticket` was minted for.
    pub server_id: String,
    /// Copy of the ticket's expiry, since the client cannot read the ticket itself.
    pub expires_at: i64,
}

/// A service's answer to a successful authentication, proving to the client that the service
/// could read the ticket.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ApReply {
    pub server_id: String,
    /// Echo of the timestamp of the authenticator that was accepted.
    pub timestamp: i64,
}

impl Codec for Ticket {
    const KIND: u8 = KIND_TICKET;
    const FIELDS: u8 = TICKET_FIELDS;

    fn encode(&self) -> Result<Zeroizing<Vec<u8>>, FormatError> {
        let mut w = FieldWriter::new::<Self>();
        w.identifier(&self.client_id)?;
        w.identifier(&self.server_id)?;
        w.timestamp(self.issued_at)?;
        w.lifetime(self.lifetime)?;
        w.field(self.session_key.as_bytes())?;
        expiry(self.issued_at, self.lifetime)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut r = FieldReader::open::<Self>(bytes)?;
        let client_id = r.identifier()?;
        let server_id = r.identifier()?;
        let issued_at = r.timestamp()?;
        let lifetime = r.lifetime()?;
        let session_key = r.key()?;
        r.finish()?;
        expiry(issued_at, lifetime)?;
        Ok(Self { client_id, server_id, issued_at, lifetime, session_key })
    }
}

impl Codec for Authenticator {
    const KIND: u8 = KIND_AUTHENTICATOR;
    const FIELDS: u8 = AUTHENTICATOR_FIELDS;

    fn encode(&self) -> Result<Zeroizing<Vec<u8>>, FormatError> {
        let mut w = FieldWriter::new::<Self>();
        w.identifier(&self.client_id)?;
        w.timestamp(self.timestamp)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut r = FieldReader::open::<Self>(bytes)?;
        let client_id = r.identifier()?;
        let timestamp = r.timestamp()?;
        r.finish()?;
        Ok(Self { client_id, timestamp })
    }
}

impl Codec for Envelope {
    const KIND: u8 = KIND_ENVELOPE;
    const FIELDS: u8 = ENVELOPE_FIELDS;

    fn encode(&self) -> Result<Zeroizing<Vec<u8>>, FormatError> {
        let mut w = FieldWriter::new::<Self>();
        w.field(self.session_key.as_bytes())?;
        w.field(self.ticket.as_bytes())?;
        w.identifier(&self.server_id)?;
        w.timestamp(self.expires_at)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut r = FieldReader::open::<Self>(bytes)?;
        let session_key = r.key()?;
        let ticket = SealedTicket::from_bytes(r.field()?.to_vec());
        let server_id = r.identifier()?;
        let expires_at = r.timestamp()?;
        r.finish()?;
        Ok(Self { session_key, ticket, server_id, expires_at })
    }
}

impl Codec for ApReply {
    const KIND: u8 = KIND_AP_REPLY;
    const FIELDS: u8 = AP_REPLY_FIELDS;

    fn encode(&self) -> Result<Zeroizing<Vec<u8>>, FormatError> {
        let mut w = FieldWriter::new::<Self>();
        w.identifier(&self.server_id)?;
        w.timestamp(self.timestamp)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut r = FieldReader::open::<Self>(bytes)?;
        let server_id = r.identifier()?;
        let timestamp = r.timestamp()?;
        r.finish()?;
        Ok(Self { server_id, timestamp })
    }
}

/// A ticket must expire at a representable time.
fn expiry(issued_at: i64, lifetime: u64) -> Result<i64, FormatError> {
    i64::try_from(lifetime)
        .ok()
        .and_then(|lifetime| issued_at.checked_add(lifetime))
        .ok_or(FormatError::InvalidTime)
}

struct FieldWriter {
    buf: Zeroizing<Vec<u8>>,
}

impl FieldWriter {
    fn new<C: Codec>() -> Self {
        let mut buf = Zeroizing::new(Vec::with_capacity(128));
        buf.push(C::KIND);
        buf.push(C::FIELDS);
        Self { buf }
    }

    fn field(&mut self, data: &[u8]) -> Result<(), FormatError> {
        if data.len() > MAX_FIELD_SIZE {
            return Err(FormatError::FieldTooLarge);
        }
        self.buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn identifier(&mut self, id: &str) -> Result<(), FormatError> {
        if id.is_empty() {
            return Err(FormatError::InvalidIdentifier);
        }
        self.field(id.as_bytes())
    }

    fn timestamp(&mut self, t: i64) -> Result<(), FormatError> {
        if t < 0 {
            return Err(FormatError::InvalidTime);
        }
        self.field(&t.to_be_bytes())
    }

    fn lifetime(&mut self, d: u64) -> Result<(), FormatError> {
        if d == 0 {
            return Err(FormatError::InvalidTime);
        }
        self.field(&d.to_be_bytes())
    }

    fn finish(self) -> Zeroizing<Vec<u8>> {
        self.buf
    }
}

struct FieldReader<'a> {
    remaining: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn open<C: Codec>(bytes: &'a [u8]) -> Result<Self, FormatError> {
        if bytes.len() < CODEC_HEADER_SIZE {
            return Err(FormatError::Truncated);
        }
        if bytes[0] != C::KIND {
            return Err(FormatError::WrongKind);
        }
        if bytes[1] != C::FIELDS {
            return Err(FormatError::FieldCount { expected: C::FIELDS, found: bytes[1] });
        }
        Ok(Self { remaining: &bytes[CODEC_HEADER_SIZE..] })
    }

    fn field(&mut self) -> Result<&'a [u8], FormatError> {
        if self.remaining.len() < FIELD_LEN_SIZE {
            return Err(FormatError::Truncated);
        }
        let (len, rest) = self.remaining.split_at(FIELD_LEN_SIZE);
        let mut len_bytes = [0u8; FIELD_LEN_SIZE];
        len_bytes.copy_from_slice(len);
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len > MAX_FIELD_SIZE {
            return Err(FormatError::FieldTooLarge);
        }
        if rest.len() < len {
            return Err(FormatError::Truncated);
        }
        let (field, rest) = rest.split_at(len);
        self.remaining = rest;
        Ok(field)
    }

    fn identifier(&mut self) -> Result<String, FormatError> {
        let field = self.field()?;
        match std::str::from_utf8(field) {
            Ok(id) if !id.is_empty() => Ok(id.to_owned()),
            _ => Err(FormatError::InvalidIdentifier),
        }
    }

    fn time_field(&mut self) -> Result<[u8; TIME_FIELD_SIZE], FormatError> {
        let field = self.field()?;
        if field.len() != TIME_FIELD_SIZE {
            return Err(FormatError::InvalidTime);
        }
        let mut out = [0u8; TIME_FIELD_SIZE];
        out.copy_from_slice(field);
        Ok(out)
    }

    fn timestamp(&mut self) -> Result<i64, FormatError> {
        let t = i64::from_be_bytes(self.time_field()?);
        if t < 0 {
            return Err(FormatError::InvalidTime);
        }
        Ok(t)
    }

    fn lifetime(&mut self) -> Result<u64, FormatError> {
        let d = u64::from_be_bytes(self.time_field()?);
        if d == 0 {
            return Err(FormatError::InvalidTime);
        }
        Ok(d)
    }

    fn key(&mut self) -> Result<Key, FormatError> {
        Key::from_slice(self.field()?).map_err(|_| FormatError::InvalidKey)
    }

    fn finish(self) -> Result<(), FormatError> {
        if self.remaining.is_empty() {
            Ok(())
        } else {
            Err(FormatError::TrailingBytes)
        }
    }
}
