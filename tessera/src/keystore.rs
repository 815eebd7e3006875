/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::application::Settings;
use crate::key::{Key, KeySize};
use crate::result::{ExchangeError, KeyError};

/// Maps principal identifiers (clients, services and the TGS itself) to their long-term keys.
///
/// Servers only ever read from a key store while running the protocol, so implementations
/// must support concurrent lookups. How keys get into the store is up to the implementation.
///
/// No two principals may share a key. Key sharing collapses the trust boundaries between them,
/// so deployments must guarantee it even if the store cannot check it.
pub trait KeyStore: Send + Sync {
    /// Look up the long-term key of `principal`, or `None` if it is unknown.
    fn lookup(&self, principal: &str) -> Option<Key>;

    /// Look up the long-term key of the service `service`, or `None` if no such service exists.
    ///
    /// The TGS only mints tickets for principals found here, so client keys and the TGS key
    /// must never be returned.
    fn lookup_service(&self, service: &str) -> Option<Key>;
}

impl<K: KeyStore + ?Sized> KeyStore for Arc<K> {
    fn lookup(&self, principal: &str) -> Option<Key> {
        (**self).lookup(principal)
    }

    fn lookup_service(&self, service: &str) -> Option<Key> {
        (**self).lookup_service(service)
    }
}

impl<K: KeyStore + ?Sized> KeyStore for &K {
    fn lookup(&self, principal: &str) -> Option<Key> {
        (**self).lookup(principal)
    }

    fn lookup_service(&self, service: &str) -> Option<Key> {
        (**self).lookup_service(service)
    }
}

/// A key store preloaded in memory.
///
/// Validates keys as they are provisioned: only key sizes the deployment accepts are stored,
/// each principal gets exactly one key, and no key is stored twice.
///
/// Clients and the TGS are provisioned with `provision`. Services are provisioned with
/// `provision_service` and are the only principals the TGS will issue tickets for.
#[derive(Debug, Clone)]
pub struct MemoryKeyStore {
    keys: HashMap<String, Key>,
    services: HashSet<String>,
    accepted_key_sizes: &'static [KeySize],
    tgs_principal: &'static str,
}

impl MemoryKeyStore {
    /// Create an empty store accepting the long-term key sizes of `settings`.
    pub fn new(settings: &Settings) -> Self {
        Self {
            keys: HashMap::new(),
            services: HashSet::new(),
            accepted_key_sizes: settings.accepted_key_sizes,
            tgs_principal: settings.tgs_principal,
        }
    }

    /// Add the long-term key of the client or TGS `principal`.
    pub fn provision(&mut self, principal: &str, key: &[u8]) -> Result<(), KeyError> {
        let key = Key::from_slice(key)?;
        self.provision_key(principal, key)
    }

    /// Add an already constructed long-term key for the client or TGS `principal`.
    pub fn provision_key(&mut self, principal: &str, key: Key) -> Result<(), KeyError> {
        self.insert(principal, key)
    }

    /// Add the long-term key of the service `service`.
    pub fn provision_service(&mut self, service: &str, key: &[u8]) -> Result<(), KeyError> {
        let key = Key::from_slice(key)?;
        self.provision_service_key(service, key)
    }

    /// Add an already constructed long-term key for the service `service`.
    ///
    /// The TGS cannot be provisioned as a service.
    pub fn provision_service_key(&mut self, service: &str, key: Key) -> Result<(), KeyError> {
        if service == self.tgs_principal {
            return Err(KeyError::InvalidPrincipal);
        }
        self.insert(service, key)?;
        self.services.insert(service.to_string());
        Ok(())
    }

    fn insert(&mut self, principal: &str, key: Key) -> Result<(), KeyError> {
        if principal.is_empty() {
            return Err(KeyError::InvalidPrincipal);
        }
        if !self.accepted_key_sizes.contains(&key.size()) {
            return Err(KeyError::InvalidKeyLength(key.size().len()));
        }
        if self.keys.contains_key(principal) {
            return Err(KeyError::DuplicatePrincipal);
        }
        if self.keys.values().any(|k| *k == key) {
            return Err(KeyError::SharedKey);
        }
        self.keys.insert(principal.to_string(), key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyStore for MemoryKeyStore {
    fn lookup(&self, principal: &str) -> Option<Key> {
        self.keys.get(principal).cloned()
    }

    fn lookup_service(&self, service: &str) -> Option<Key> {
        if self.services.contains(service) {
            self.lookup(service)
        } else {
            None
        }
    }
}

/// Refuse a key found in a store if its size is not one `settings` accepts.
/// Passes `None` through for an unknown principal.
pub(crate) fn accepted(settings: &Settings, found: Option<Key>) -> Result<Option<Key>, ExchangeError> {
    match found {
        Some(key) if !settings.accepts_key_size(key.size()) => Err(ExchangeError::InvalidKeyLength),
        found => Ok(found),
    }
}
