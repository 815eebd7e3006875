/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
#![cfg(feature = "default-crypto")]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use rand_core::OsRng;

use tessera::crypto_impl::DefaultCrypto;
use tessera::proto::{HOUR_MS, MINUTE_MS, SECOND_MS};
use tessera::*;

const START: i64 = 1_700_000_000_000;

struct TestCrypto;
impl DefaultCrypto for TestCrypto {}

struct HardenedCrypto;
impl DefaultCrypto for HardenedCrypto {
    const SETTINGS: Settings = Settings::hardened_ms();
}

/// A clock the test moves by hand, plus a record of every event.
struct TestApp {
    now: AtomicI64,
    events: Mutex<Vec<String>>,
}

impl TestApp {
    fn new() -> Self {
        Self { now: AtomicI64::new(START), events: Mutex::new(Vec::new()) }
    }

    fn set_time(&self, time: i64) {
        self.now.store(time, Ordering::Relaxed);
    }

    fn advance(&self, ms: u64) {
        self.now.fetch_add(ms as i64, Ordering::Relaxed);
    }

    fn count(&self, prefix: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl ApplicationLayer for TestApp {
    fn time(&self) -> i64 {
        self.now.load(Ordering::Relaxed)
    }

    #[cfg(feature = "logging")]
    fn event_log(&self, event: LogEvent<'_>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

struct Deployment<C: CryptoLayer> {
    store: Arc<MemoryKeyStore>,
    as_server: AuthenticationServer<C, Arc<MemoryKeyStore>>,
    tgs: TicketGrantingServer<C, Arc<MemoryKeyStore>>,
    service1: Service<C>,
    service2: Service<C>,
    alice: Client<C>,
}

fn deployment<C: CryptoLayer<Rng = OsRng>>() -> Deployment<C> {
    let mut store = MemoryKeyStore::new(&C::SETTINGS);
    let alice_key = Key::generate(&mut OsRng, KeySize::Aes256).unwrap();
    store.provision_key("alice", alice_key.clone()).unwrap();
    store.provision_key("bob", Key::generate(&mut OsRng, KeySize::Aes256).unwrap()).unwrap();
    store.provision_key("tgs", Key::generate(&mut OsRng, KeySize::Aes256).unwrap()).unwrap();
    for service in ["service1", "service2"] {
        store.provision_service_key(service, Key::generate(&mut OsRng, KeySize::Aes256).unwrap()).unwrap();
    }
    let store = Arc::new(store);
    Deployment {
        as_server: AuthenticationServer::new(store.clone(), OsRng).unwrap(),
        tgs: TicketGrantingServer::new(store.clone(), OsRng).unwrap(),
        service1: Service::from_store(&*store, "service1", OsRng).unwrap(),
        service2: Service::from_store(&*store, "service2", OsRng).unwrap(),
        alice: Client::new("alice", alice_key, OsRng),
        store,
    }
}

/// Runs the AS and TGS exchanges step by step and returns alice's credential for `service_id`.
fn service_credential<C: CryptoLayer>(d: &Deployment<C>, app: &TestApp, service_id: &str) -> Credential {
    let reply = d.as_server.request_tgt(app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(app, &reply).unwrap();
    let request = d.alice.build_tgs_request(app, &tgt, service_id).unwrap();
    let envelope = d
        .tgs
        .request_service_ticket(app, &request.tgt, &request.authenticator, &request.service_id)
        .unwrap();
    d.alice.read_tgs_reply(app, &tgt, service_id, &envelope).unwrap()
}

fn flip_byte<T>(sealed: &Sealed<T>, idx: usize) -> Sealed<T> {
    let mut bytes = sealed.clone().into_bytes();
    bytes[idx] ^= 0x80;
    Sealed::from_bytes(bytes)
}

#[test]
fn step_by_step_exchange() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();

    let credential = service_credential(&d, &app, "service1");
    assert_eq!(credential.server_id, "service1");
    assert_eq!(credential.expires_at, START + (2 * HOUR_MS) as i64);

    let request = d.alice.build_ap_request(&app, &credential).unwrap();
    let authenticated = d.service1.authenticate(&app, &request.ticket, &request.authenticator).unwrap();
    assert_eq!(authenticated.client_id, "alice");
    assert_eq!(authenticated.session_key, credential.session_key);
    assert_eq!(authenticated.ticket_expires_at, credential.expires_at);
    d.alice.verify_ap_reply(&app, &credential, &request, &authenticated.reply).unwrap();

    #[cfg(feature = "logging")]
    {
        assert_eq!(app.count("AsIssuedTgt"), 1);
        assert_eq!(app.count("TgsIssuedTicket"), 1);
        assert_eq!(app.count("ServiceAuthenticated"), 1);
    }
}

#[test]
fn end_to_end_driver() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let credential = d.alice.authenticate(&app, &d.as_server, &d.tgs, &d.service1).unwrap();
    assert_eq!(credential.server_id, "service1");
    assert_eq!(d.alice.id(), "alice");
}

#[test]
fn unknown_client_is_refused_without_sealing() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    assert_eq!(d.as_server.request_tgt(&app, "mallory"), Err(ExchangeError::UnknownPrincipal));
    assert_eq!(d.as_server.request_tgt(&app, ""), Err(ExchangeError::UnknownPrincipal));
    #[cfg(feature = "logging")]
    {
        assert_eq!(app.count("AsUnknownClient"), 2);
        assert_eq!(app.count("AsIssuedTgt"), 0);
    }
}

#[test]
fn unknown_service_is_refused() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(&app, &reply).unwrap();
    let request = d.alice.build_tgs_request(&app, &tgt, "service3").unwrap();
    assert_eq!(
        d.tgs.request_service_ticket(&app, &request.tgt, &request.authenticator, "service3"),
        Err(ExchangeError::UnknownService)
    );
}

#[test]
fn tgs_only_issues_tickets_for_services() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(&app, &reply).unwrap();
    for principal in ["tgs", "bob", "alice"] {
        let request = d.alice.build_tgs_request(&app, &tgt, principal).unwrap();
        assert_eq!(
            d.tgs.request_service_ticket(&app, &request.tgt, &request.authenticator, principal),
            Err(ExchangeError::UnknownService),
            "ticket issued for {}",
            principal
        );
    }
    #[cfg(feature = "logging")]
    assert_eq!(app.count("TgsIssuedTicket"), 0);

    // Services are not found by the name of a client either.
    assert!(matches!(
        Service::<TestCrypto>::from_store(&*d.store, "bob", OsRng),
        Err(KeyError::MissingPrincipal)
    ));
}

#[test]
fn tgt_cannot_outlive_its_lifetime_through_the_tgs() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(&app, &reply).unwrap();

    app.advance(7 * HOUR_MS);
    let request = d.alice.build_tgs_request(&app, &tgt, "tgs").unwrap();
    assert_eq!(
        d.tgs.request_service_ticket(&app, &request.tgt, &request.authenticator, "tgs"),
        Err(ExchangeError::UnknownService)
    );

    app.advance(HOUR_MS + 1);
    let request = d.alice.build_tgs_request(&app, &tgt, "service1").unwrap();
    assert_eq!(
        d.tgs.request_service_ticket(&app, &request.tgt, &request.authenticator, "service1"),
        Err(ExchangeError::TicketExpired)
    );
}

#[test]
fn tgs_refuses_itself_even_when_listed_as_a_service() {
    struct ListsEverything(MemoryKeyStore);
    impl KeyStore for ListsEverything {
        fn lookup(&self, principal: &str) -> Option<Key> {
            self.0.lookup(principal)
        }
        fn lookup_service(&self, service: &str) -> Option<Key> {
            self.0.lookup(service)
        }
    }

    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let tgs = TicketGrantingServer::<TestCrypto, _>::new(ListsEverything((*d.store).clone()), OsRng).unwrap();
    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(&app, &reply).unwrap();
    let request = d.alice.build_tgs_request(&app, &tgt, "tgs").unwrap();
    assert_eq!(
        tgs.request_service_ticket(&app, &request.tgt, &request.authenticator, "tgs"),
        Err(ExchangeError::UnknownService)
    );
}

#[test]
fn empty_principal_never_gets_a_credential() {
    let mut store = MemoryKeyStore::new(&Settings::new_ms());
    let key = Key::generate(&mut OsRng, KeySize::Aes256).unwrap();
    assert_eq!(store.provision_key("", key), Err(KeyError::InvalidPrincipal));
    store.provision_key("tgs", Key::generate(&mut OsRng, KeySize::Aes256).unwrap()).unwrap();
    let as_server = AuthenticationServer::<TestCrypto, _>::new(&store, OsRng).unwrap();
    let app = TestApp::new();
    assert_eq!(as_server.request_tgt(&app, ""), Err(ExchangeError::UnknownPrincipal));
}

#[test]
fn as_reply_only_opens_for_its_client() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let mallory = Client::<TestCrypto>::new("alice", Key::generate(&mut OsRng, KeySize::Aes256).unwrap(), OsRng);
    assert_eq!(mallory.read_as_reply(&app, &reply), Err(ExchangeError::InvalidEnvelope));

    let swapped = AsReply { envelope: reply.envelope.clone(), tgt: d.as_server.request_tgt(&app, "alice").unwrap().tgt };
    assert_eq!(d.alice.read_as_reply(&app, &swapped), Err(ExchangeError::InvalidEnvelope));
}

#[test]
fn authenticator_is_bound_to_its_ticket() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let cred1 = service_credential(&d, &app, "service1");
    let cred2 = service_credential(&d, &app, "service2");

    let request1 = d.alice.build_ap_request(&app, &cred1).unwrap();
    assert_eq!(
        d.service2.authenticate(&app, &cred2.ticket, &request1.authenticator),
        Err(ExchangeError::InvalidAuthenticator)
    );

    // A TGS authenticator is not accepted by a service even under the right session key.
    let tgs_style = d.alice.build_tgs_request(&app, &cred1, "service1").unwrap();
    assert_eq!(
        d.service1.authenticate(&app, &cred1.ticket, &tgs_style.authenticator),
        Err(ExchangeError::InvalidAuthenticator)
    );
}

#[test]
fn ticket_for_another_service_is_invalid() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let cred1 = service_credential(&d, &app, "service1");
    let request = d.alice.build_ap_request(&app, &cred1).unwrap();
    assert_eq!(
        d.service2.authenticate(&app, &request.ticket, &request.authenticator),
        Err(ExchangeError::InvalidTicket)
    );

    // Same name, wrong key.
    let impostor = Service::<TestCrypto>::new("service1", d.store.lookup("service2").unwrap(), OsRng).unwrap();
    assert_eq!(
        impostor.authenticate(&app, &request.ticket, &request.authenticator),
        Err(ExchangeError::InvalidTicket)
    );

    // Right key, wrong name.
    let renamed = Service::<TestCrypto>::new("service2", d.store.lookup("service1").unwrap(), OsRng).unwrap();
    assert_eq!(
        renamed.authenticate(&app, &request.ticket, &request.authenticator),
        Err(ExchangeError::InvalidTicket)
    );
}

#[test]
fn service_ticket_is_not_a_tgt() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let cred1 = service_credential(&d, &app, "service1");
    let request = d.alice.build_tgs_request(&app, &cred1, "service2").unwrap();
    assert_eq!(
        d.tgs.request_service_ticket(&app, &request.tgt, &request.authenticator, "service2"),
        Err(ExchangeError::InvalidTicket)
    );
}

#[test]
fn freshness_window_boundaries() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let credential = service_credential(&d, &app, "service1");

    let cases = [
        (5 * MINUTE_MS as i64 + SECOND_MS as i64, Err(ExchangeError::AuthenticatorExpired)),
        (5 * MINUTE_MS as i64, Ok(())),
        (4 * MINUTE_MS as i64 + 59 * SECOND_MS as i64, Ok(())),
        (0, Ok(())),
        (-(5 * MINUTE_MS as i64), Ok(())),
        (-(5 * MINUTE_MS as i64) - 1, Err(ExchangeError::AuthenticatorExpired)),
    ];
    for (offset, expected) in cases {
        app.set_time(START);
        let request = d.alice.build_ap_request(&app, &credential).unwrap();
        app.set_time(START + offset);
        let result = d.service1.authenticate(&app, &request.ticket, &request.authenticator).map(|_| ());
        assert_eq!(result, expected, "offset {}", offset);
    }
}

#[test]
fn tgs_checks_freshness() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(&app, &reply).unwrap();
    let request = d.alice.build_tgs_request(&app, &tgt, "service1").unwrap();
    app.advance(6 * MINUTE_MS);
    assert_eq!(
        d.tgs.request_service_ticket(&app, &request.tgt, &request.authenticator, "service1"),
        Err(ExchangeError::AuthenticatorExpired)
    );
}

#[test]
fn expired_tickets_are_refused() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(&app, &reply).unwrap();
    assert_eq!(tgt.expires_at, START + (8 * HOUR_MS) as i64);
    let credential = service_credential(&d, &app, "service1");

    app.set_time(credential.expires_at);
    let request = d.alice.build_ap_request(&app, &credential).unwrap();
    assert!(d.service1.authenticate(&app, &request.ticket, &request.authenticator).is_ok());

    app.set_time(credential.expires_at + 1);
    let request = d.alice.build_ap_request(&app, &credential).unwrap();
    assert_eq!(
        d.service1.authenticate(&app, &request.ticket, &request.authenticator),
        Err(ExchangeError::TicketExpired)
    );

    app.set_time(tgt.expires_at + 1);
    let request = d.alice.build_tgs_request(&app, &tgt, "service1").unwrap();
    assert_eq!(
        d.tgs.request_service_ticket(&app, &request.tgt, &request.authenticator, "service1"),
        Err(ExchangeError::TicketExpired)
    );
}

#[test]
fn tampering_is_detected() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let credential = service_credential(&d, &app, "service1");
    let request = d.alice.build_ap_request(&app, &credential).unwrap();

    for idx in [0, 12, request.ticket.as_bytes().len() - 1] {
        assert_eq!(
            d.service1.authenticate(&app, &flip_byte(&request.ticket, idx), &request.authenticator),
            Err(ExchangeError::InvalidTicket)
        );
    }
    for idx in [0, 12, request.authenticator.as_bytes().len() - 1] {
        assert_eq!(
            d.service1.authenticate(&app, &request.ticket, &flip_byte(&request.authenticator, idx)),
            Err(ExchangeError::InvalidAuthenticator)
        );
    }

    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(&app, &reply).unwrap();
    let tgs_request = d.alice.build_tgs_request(&app, &tgt, "service1").unwrap();
    let envelope = d
        .tgs
        .request_service_ticket(&app, &tgs_request.tgt, &tgs_request.authenticator, "service1")
        .unwrap();
    assert_eq!(
        d.alice.read_tgs_reply(&app, &tgt, "service1", &flip_byte(&envelope, 20)),
        Err(ExchangeError::InvalidEnvelope)
    );
}

#[test]
fn replay_is_accepted_by_default() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    let credential = service_credential(&d, &app, "service1");
    let request = d.alice.build_ap_request(&app, &credential).unwrap();
    assert!(d.service1.authenticate(&app, &request.ticket, &request.authenticator).is_ok());
    app.advance(MINUTE_MS);
    assert!(d.service1.authenticate(&app, &request.ticket, &request.authenticator).is_ok());
}

#[test]
fn replay_cache_rejects_second_presentation() {
    let d = deployment::<HardenedCrypto>();
    let app = TestApp::new();
    let credential = service_credential(&d, &app, "service1");
    let request = d.alice.build_ap_request(&app, &credential).unwrap();
    assert!(d.service1.authenticate(&app, &request.ticket, &request.authenticator).is_ok());
    app.advance(MINUTE_MS);
    assert_eq!(
        d.service1.authenticate(&app, &request.ticket, &request.authenticator),
        Err(ExchangeError::AuthenticatorReplayed)
    );

    // A fresh authenticator for the same ticket is fine.
    let request = d.alice.build_ap_request(&app, &credential).unwrap();
    assert!(d.service1.authenticate(&app, &request.ticket, &request.authenticator).is_ok());

    let reply = d.as_server.request_tgt(&app, "alice").unwrap();
    let tgt = d.alice.read_as_reply(&app, &reply).unwrap();
    let tgs_request = d.alice.build_tgs_request(&app, &tgt, "service1").unwrap();
    assert!(d
        .tgs
        .request_service_ticket(&app, &tgs_request.tgt, &tgs_request.authenticator, "service1")
        .is_ok());
    assert_eq!(
        d.tgs.request_service_ticket(&app, &tgs_request.tgt, &tgs_request.authenticator, "service2"),
        Err(ExchangeError::AuthenticatorReplayed)
    );
}

#[test]
fn hardened_settings_refuse_short_keys() {
    let mut store = MemoryKeyStore::new(&Settings::new_ms());
    store.provision("tgs", &[7u8; 16]).unwrap();
    assert_eq!(
        AuthenticationServer::<HardenedCrypto, _>::new(&store, OsRng).err(),
        Some(KeyError::InvalidKeyLength(16))
    );
    assert_eq!(
        Service::<HardenedCrypto>::new("service1", Key::from_slice(&[8u8; 24]).unwrap(), OsRng).err(),
        Some(KeyError::InvalidKeyLength(24))
    );
}

#[test]
fn servers_need_the_tgs_key() {
    let mut store = MemoryKeyStore::new(&Settings::new_ms());
    store.provision("alice", &[1u8; 32]).unwrap();
    assert!(matches!(
        AuthenticationServer::<TestCrypto, _>::new(&store, OsRng),
        Err(KeyError::MissingPrincipal)
    ));
    assert!(matches!(
        TicketGrantingServer::<TestCrypto, _>::new(&store, OsRng),
        Err(KeyError::MissingPrincipal)
    ));
}

#[test]
fn client_reuses_cached_tickets() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();

    d.alice.authenticate(&app, &d.as_server, &d.tgs, &d.service1).unwrap();
    app.advance(MINUTE_MS);
    d.alice.authenticate(&app, &d.as_server, &d.tgs, &d.service1).unwrap();
    app.advance(MINUTE_MS);
    d.alice.authenticate(&app, &d.as_server, &d.tgs, &d.service2).unwrap();
    assert!(d.alice.cached(&app, "tgs").is_some());
    assert!(d.alice.cached(&app, "service1").is_some());

    // Past both service ticket lifetimes but inside the TGT lifetime.
    app.advance(2 * HOUR_MS + MINUTE_MS);
    assert!(d.alice.cached(&app, "service1").is_none());
    d.alice.authenticate(&app, &d.as_server, &d.tgs, &d.service1).unwrap();

    #[cfg(feature = "logging")]
    {
        assert_eq!(app.count("AsIssuedTgt"), 1);
        assert_eq!(app.count("TgsIssuedTicket"), 3);
        assert_eq!(app.count("ServiceAuthenticated"), 4);
        assert_eq!(app.count("ClientCacheExpired"), 2);
    }
}

#[test]
fn client_drops_rejected_tickets() {
    let d = deployment::<TestCrypto>();
    let app = TestApp::new();
    d.alice.authenticate(&app, &d.as_server, &d.tgs, &d.service1).unwrap();

    // service1 rotated its key, so the cached ticket no longer opens.
    let mut rotated = MemoryKeyStore::new(&Settings::new_ms());
    rotated.provision_service_key("service1", Key::generate(&mut OsRng, KeySize::Aes256).unwrap()).unwrap();
    let service1 = Service::<TestCrypto>::from_store(&rotated, "service1", OsRng).unwrap();
    assert_eq!(
        d.alice.authenticate(&app, &d.as_server, &d.tgs, &service1),
        Err(ExchangeError::InvalidTicket)
    );
    assert!(d.alice.cached(&app, "service1").is_none());
    assert!(d.alice.cached(&app, "tgs").is_some());
}
