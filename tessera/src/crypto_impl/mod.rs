/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
#[cfg(feature = "aes-gcm")]
mod aes_impl;
#[cfg(feature = "aes-gcm")]
pub use aes_gcm;
#[cfg(feature = "aes-gcm")]
pub use aes_impl::*;

#[cfg(feature = "sha2")]
mod sha512;
#[cfg(feature = "sha2")]
pub use sha2;
#[cfg(feature = "sha2")]
pub use sha512::*;

#[cfg(feature = "openssl-sys")]
mod openssl;
#[cfg(feature = "openssl-sys")]
pub use openssl::*;
#[cfg(feature = "openssl-sys")]
pub use openssl_sys;

#[cfg(feature = "default-crypto")]
use crate::application::{CryptoLayer, Settings};

/// Implement this trait to get a `CryptoLayer` built from the RustCrypto crates and the
/// operating system's random number generator.
///
/// Override `SETTINGS` to run a deployment with non-default settings.
#[cfg(feature = "default-crypto")]
pub trait DefaultCrypto {
    const SETTINGS: Settings = Settings::new_ms();
}
#[cfg(feature = "default-crypto")]
impl<C: DefaultCrypto> CryptoLayer for C {
    const SETTINGS: Settings = <C as DefaultCrypto>::SETTINGS;

    type Rng = rand_core::OsRng;
    type Aead = CrateAesGcm;
    type Hash = CrateSha512;
}
