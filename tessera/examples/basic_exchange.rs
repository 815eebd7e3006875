/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use std::sync::Arc;

use rand_core::OsRng;

use tessera::crypto_impl::DefaultCrypto;
use tessera::*;

struct DemoCrypto;
impl DefaultCrypto for DemoCrypto {}

struct DemoApplication {
    clock: SystemClock,
}

impl ApplicationLayer for DemoApplication {
    fn time(&self) -> i64 {
        self.clock.time()
    }

    #[cfg(feature = "logging")]
    fn event_log(&self, event: LogEvent<'_>) {
        println!("  [event] {:?}", event);
    }
}

fn outcome<T>(what: &str, result: &Result<T, ExchangeError>) {
    match result {
        Ok(_) => println!("{}: ok", what),
        Err(e) => println!("{}: {}", what, e),
    }
}

fn main() {
    let app = DemoApplication { clock: SystemClock::new() };

    let mut store = MemoryKeyStore::new(&<DemoCrypto as CryptoLayer>::SETTINGS);
    let alice_key = Key::generate(&mut OsRng, KeySize::Aes256).expect("random source");
    store.provision_key("alice", alice_key.clone()).expect("provision alice");
    let tgs_key = Key::generate(&mut OsRng, KeySize::Aes256).expect("random source");
    store.provision_key("tgs", tgs_key).expect("provision tgs");
    for service in ["service1", "service2"] {
        let key = Key::generate(&mut OsRng, KeySize::Aes256).expect("random source");
        store.provision_service_key(service, key).expect("provision service");
    }
    let store = Arc::new(store);

    let as_server = AuthenticationServer::<DemoCrypto, _>::new(store.clone(), OsRng).expect("AS needs the TGS key");
    let tgs = TicketGrantingServer::<DemoCrypto, _>::new(store.clone(), OsRng).expect("TGS needs its key");
    let service1 = Service::<DemoCrypto>::from_store(&*store, "service1", OsRng).expect("service1 key");
    let service2 = Service::<DemoCrypto>::from_store(&*store, "service2", OsRng).expect("service2 key");
    let alice = Client::<DemoCrypto>::new("alice", alice_key, OsRng);

    println!("alice -> service1");
    let result = alice.authenticate(&app, &as_server, &tgs, &service1);
    outcome("alice authenticated to service1", &result);

    println!("alice -> service1 again, from the credential cache");
    let result = alice.authenticate(&app, &as_server, &tgs, &service1);
    outcome("alice authenticated to service1", &result);

    println!("alice -> service2, reusing the TGT");
    let result = alice.authenticate(&app, &as_server, &tgs, &service2);
    outcome("alice authenticated to service2", &result);

    println!("mallory asks the AS for a TGT");
    let result = as_server.request_tgt(&app, "mallory");
    outcome("mallory's TGT request", &result);

    println!("alice presents her service1 ticket to service2");
    if let Some(credential) = alice.cached(&app, "service1") {
        let request = alice.build_ap_request(&app, &credential).expect("seal authenticator");
        let result = service2.authenticate(&app, &request.ticket, &request.authenticator);
        outcome("service2 accepting a service1 ticket", &result);
    }
}
