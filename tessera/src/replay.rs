use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::application::CryptoLayer;
use crate::crypto::Sha512Hash;
use crate::proto::FINGERPRINT_SIZE;

/// Remembers accepted authenticators until they would have expired anyway, so that each one
/// can only be accepted once.
///
/// Memory is bounded by `capacity`. Entries are only dropped once they expire; when the cache
/// is full of live entries new authenticators are refused, since evicting a live entry would
/// reopen it to replay.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplayError {
    Replayed,
    Full,
}

pub(crate) struct ReplayCache {
    seen: Mutex<HashMap<[u8; FINGERPRINT_SIZE], i64>>,
    capacity: usize,
}

impl ReplayCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { seen: Mutex::new(HashMap::new()), capacity }
    }

    /// Record the authenticator identified by `fingerprint`, which stays replayable until
    /// `expires_at`. Fails if it is already recorded and not yet expired.
    pub(crate) fn check_and_insert(
        &self,
        fingerprint: [u8; FINGERPRINT_SIZE],
        expires_at: i64,
        now: i64,
    ) -> Result<(), ReplayError> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev_expiry) = seen.get(&fingerprint) {
            if *prev_expiry >= now {
                return Err(ReplayError::Replayed);
            }
        }
        if seen.len() >= self.capacity {
            seen.retain(|_, expiry| *expiry >= now);
        }
        if seen.len() >= self.capacity && !seen.contains_key(&fingerprint) {
            return Err(ReplayError::Full);
        }
        seen.insert(fingerprint, expires_at);
        Ok(())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Identifies one presentation of an authenticator: the client, the exact sealed ticket it
/// accompanied and its timestamp.
pub(crate) fn fingerprint<C: CryptoLayer>(
    client_id: &str,
    sealed_ticket: &[u8],
    timestamp: i64,
) -> [u8; FINGERPRINT_SIZE] {
    let mut hash = <C::Hash as Sha512Hash>::new();
    hash.update(&(client_id.len() as u64).to_be_bytes());
    hash.update(client_id.as_bytes());
    hash.update(&(sealed_ticket.len() as u64).to_be_bytes());
    hash.update(sealed_ticket);
    hash.update(&timestamp.to_be_bytes());
    let full = hash.finish();
    let mut out = [0u8; FINGERPRINT_SIZE];
    out.copy_from_slice(&full[..FINGERPRINT_SIZE]);
    out
}
