//! Abbreviated handshakes resuming a cached session.

use dtls_engine::types::AlertDescription;
use dtls_engine::{Config, DtlsClient, DtlsServer, TlsSession};

use crate::common::*;

/// One handshake between fresh endpoints; the client offers `resume`.
fn run(
    server_config: &Config,
    client_config: &Config,
    server_peer: TestServer,
    resume: Option<TlsSession>,
    tamper_client: bool,
) -> (
    Result<(), dtls_engine::Error>,
    TestServer,
    Result<(), dtls_engine::Error>,
    TestClient,
    Sniffer,
) {
    let (server_end, client_end) = pipe();
    let server_log = server_end.sniffer();
    let client_end = if tamper_client {
        client_end.tamper(flip_finished)
    } else {
        client_end
    };
    let client_peer = TestClient {
        resume,
        ..Default::default()
    };

    let ((server_result, server_peer), (client_result, client_peer)) = handshake(
        DtlsServer::new(server_config.clone()).expect("server"),
        server_peer,
        server_end,
        DtlsClient::new(client_config.clone()),
        client_peer,
        client_end,
    );
    (
        server_result.map(|_| ()),
        server_peer,
        client_result.map(|_| ()),
        client_peer,
        server_log,
    )
}

fn sent_types(log: &Sniffer) -> Vec<u8> {
    log.lock()
        .unwrap()
        .iter()
        .flat_map(|d| handshake_types(d))
        .collect()
}

#[test]
#[cfg(feature = "rcgen")]
fn cached_session_is_resumed() {
    tracing_init();

    let server_config = config().build().expect("config");
    let client_config = config().build().expect("config");
    let cache = SessionCache::default();
    let server_credentials = credentials("server");

    let (server_result, _, client_result, first_client, first_log) = run(
        &server_config,
        &client_config,
        TestServer {
            credentials: Some(server_credentials.clone()),
            cache: cache.clone(),
            ..Default::default()
        },
        None,
        false,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");
    assert!(sent_types(&first_log).contains(&CERTIFICATE));
    let session = first_client.session.expect("client session");
    assert!(session.is_resumable());
    assert_eq!(cache.lock().unwrap().len(), 1);

    let (server_result, second_server, client_result, second_client, second_log) = run(
        &server_config,
        &client_config,
        TestServer {
            credentials: Some(server_credentials),
            cache: cache.clone(),
            ..Default::default()
        },
        Some(session.clone()),
        false,
    );
    server_result.expect("server resumption");
    client_result.expect("client resumption");

    // Abbreviated: no certificate, no key exchange, just the hello.
    let types = sent_types(&second_log);
    assert!(!types.contains(&CERTIFICATE), "{:?}", types);
    assert!(!types.contains(&SERVER_HELLO_DONE), "{:?}", types);
    assert!(types.contains(&SERVER_HELLO));
    // The client was not asked to verify a certificate again.
    assert!(second_client.server_chain.is_none());

    let resumed = second_client.session.expect("client session");
    assert_eq!(resumed.session_id(), session.session_id());
    let server_session = second_server.session.expect("server session");
    assert_eq!(server_session.session_id(), session.session_id());

    let before = session.export_parameters().expect("parameters");
    let after = resumed.export_parameters().expect("parameters");
    assert_eq!(before.master_secret(), after.master_secret());
    assert_eq!(before.cipher_suite(), after.cipher_suite());
}

#[test]
fn unknown_session_falls_back_to_full_handshake() {
    tracing_init();

    let provider = plain_provider();
    let server_config = config().crypto_provider(provider.clone()).build().expect("config");
    let client_config = config().crypto_provider(provider).build().expect("config");

    let (server_result, _, client_result, first_client, _) = run(
        &server_config,
        &client_config,
        TestServer::default(),
        None,
        false,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");
    let session = first_client.session.expect("client session");

    // A server with an empty cache.
    let (server_result, server_peer, client_result, client_peer, _) = run(
        &server_config,
        &client_config,
        TestServer::default(),
        Some(session.clone()),
        false,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    let fresh = client_peer.session.expect("client session");
    assert_ne!(fresh.session_id(), session.session_id());
    assert_eq!(
        server_peer.session.expect("server session").session_id(),
        fresh.session_id()
    );
    let before = session.export_parameters().expect("parameters");
    let after = fresh.export_parameters().expect("parameters");
    assert_ne!(before.master_secret(), after.master_secret());
}

#[test]
fn failed_resumption_invalidates_the_session() {
    tracing_init();

    let provider = plain_provider();
    let server_config = config().crypto_provider(provider.clone()).build().expect("config");
    let client_config = config().crypto_provider(provider).build().expect("config");
    let cache = SessionCache::default();

    let (server_result, _, client_result, first_client, _) = run(
        &server_config,
        &client_config,
        TestServer {
            cache: cache.clone(),
            ..Default::default()
        },
        None,
        false,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");
    let session = first_client.session.expect("client session");
    let id = session.session_id().to_vec();

    let (server_result, server_peer, _, _, _) = run(
        &server_config,
        &client_config,
        TestServer {
            cache: cache.clone(),
            ..Default::default()
        },
        Some(session),
        true,
    );
    let err = server_result.expect_err("server must fail");
    assert_eq!(local_alert(&err), Some(AlertDescription::DecryptError));
    assert!(server_peer.session.is_none());

    let cached = cache.lock().unwrap().get(&id).cloned().expect("still cached");
    assert!(!cached.is_resumable());
    assert!(cached.export_parameters().is_none());
}
