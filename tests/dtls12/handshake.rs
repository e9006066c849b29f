//! DTLS 1.2 full handshakes: cookie exchange, client authentication,
//! suite negotiation and the failures each can end in.

use std::time::Duration;

use dtls_engine::message::{CertificateStatus, NewSessionTicket};
use dtls_engine::types::{AlertDescription, CipherSuite, ProtocolVersion};
use dtls_engine::{ClientAuth, DtlsClient, DtlsServer, Error, MaxFragmentLength};

use crate::common::*;

#[test]
#[cfg(feature = "rcgen")]
fn ecdhe_handshake_with_cookie_exchange() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_log = server_end.sniffer();
    let client_log = client_end.sniffer();

    let server = DtlsServer::new(config().build().expect("config")).expect("server");
    let client = DtlsClient::new(config().build().expect("config"));
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ..Default::default()
    };

    let ((server_result, server_peer), (client_result, client_peer)) = handshake(
        server,
        server_peer,
        server_end,
        client,
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    // The server's first answer is a HelloVerifyRequest.
    let server_sent = server_log.lock().unwrap().clone();
    assert_eq!(handshake_types(&server_sent[0]), vec![HELLO_VERIFY_REQUEST]);

    // The client sent ClientHello twice, the second with the next message_seq.
    // Retransmissions repeat the same message_seq.
    let mut hello_seqs: Vec<_> = collect_headers(&client_log.lock().unwrap())
        .into_iter()
        .filter(|r| r.first == Some(CLIENT_HELLO) && r.ctype == HANDSHAKE && r.epoch == 0)
        .filter_map(|r| r.message_seq)
        .collect();
    hello_seqs.dedup();
    assert_eq!(hello_seqs, vec![0, 1]);

    let server_session = server_peer.session.expect("server session");
    let client_session = client_peer.session.expect("client session");
    assert_eq!(server_session.session_id(), client_session.session_id());
    assert!(client_session.is_resumable());
    assert!(client_peer.server_chain.is_some());

    let parameters = client_session.export_parameters().expect("parameters");
    assert!(parameters.extended_master_secret());
    assert_eq!(parameters.version(), ProtocolVersion::DTLS1_2);
    assert_eq!(
        parameters.cipher_suite(),
        CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256
    );
}

#[test]
#[cfg(feature = "rcgen")]
fn handshake_without_cookie_exchange() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_log = server_end.sniffer();

    let server_config = config().hello_verify_requests(false).build().expect("config");
    let server = DtlsServer::new(server_config).expect("server");
    let client = DtlsClient::new(config().build().expect("config"));
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ..Default::default()
    };

    let ((server_result, _), (client_result, _)) = handshake(
        server,
        server_peer,
        server_end,
        client,
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    let types: Vec<u8> = server_log
        .lock()
        .unwrap()
        .iter()
        .flat_map(|d| handshake_types(d))
        .collect();
    assert!(!types.contains(&HELLO_VERIFY_REQUEST));
    assert_eq!(types.first(), Some(&SERVER_HELLO));
    assert!(types.contains(&CERTIFICATE));
    assert!(types.contains(&SERVER_HELLO_DONE));
}

#[test]
#[cfg(feature = "rcgen")]
fn required_client_certificate_is_delivered() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_config = config()
        .client_auth(ClientAuth::Required)
        .build()
        .expect("config");
    let server = DtlsServer::new(server_config).expect("server");
    let client = DtlsClient::new(config().build().expect("config"));

    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ..Default::default()
    };
    let client_credentials = credentials("client");
    let client_peer = TestClient {
        credentials: Some(client_credentials.clone()),
        ..Default::default()
    };

    let ((server_result, server_peer), (client_result, _)) =
        handshake(server, server_peer, server_end, client, client_peer, client_end);
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    let chain = server_peer.client_chain.expect("client chain");
    assert_eq!(chain.leaf(), client_credentials.chain().leaf());

    let session = server_peer.session.expect("session");
    let parameters = session.export_parameters().expect("parameters");
    assert_eq!(parameters.peer_certificate(), client_credentials.chain());
}

#[test]
#[cfg(feature = "rcgen")]
fn required_client_certificate_missing_fails() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_config = config()
        .client_auth(ClientAuth::Required)
        .build()
        .expect("config");
    let server = DtlsServer::new(server_config).expect("server");
    let client = DtlsClient::new(config().build().expect("config"));
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ..Default::default()
    };

    let ((server_result, server_peer), (client_result, _)) = handshake(
        server,
        server_peer,
        server_end,
        client,
        TestClient::default(),
        client_end,
    );

    let server_err = server_result.expect_err("server must fail");
    assert_eq!(local_alert(&server_err), Some(AlertDescription::HandshakeFailure));
    assert!(server_peer.session.is_none());

    let client_err = client_result.expect_err("client must fail");
    assert_eq!(peer_alert(&client_err), Some(AlertDescription::HandshakeFailure));
}

#[test]
#[cfg(feature = "rcgen")]
fn requested_client_certificate_may_be_empty() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_config = config()
        .client_auth(ClientAuth::Requested)
        .build()
        .expect("config");
    let server = DtlsServer::new(server_config).expect("server");
    let client = DtlsClient::new(config().build().expect("config"));
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ..Default::default()
    };

    let ((server_result, server_peer), (client_result, _)) = handshake(
        server,
        server_peer,
        server_end,
        client,
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    let chain = server_peer.client_chain.expect("notified");
    assert!(chain.is_empty());
}

#[test]
fn server_without_credentials_needs_a_suite_without_them() {
    let (server_end, _client_end) = pipe();
    let log = server_end.sniffer();

    let server = DtlsServer::new(config().build().expect("config")).expect("server");
    let mut peer = TestServer::default();
    let err = server.accept(&mut peer, server_end).expect_err("must fail");

    assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", err);
    assert!(log.lock().unwrap().is_empty(), "nothing may be sent");
}

#[test]
fn provided_key_exchange_suite() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_log = server_end.sniffer();
    let client_log = client_end.sniffer();
    let provider = plain_provider();
    let server_config = config().crypto_provider(provider.clone()).build().expect("config");
    let client_config = config().crypto_provider(provider).build().expect("config");

    let ((server_result, server_peer), (client_result, client_peer)) = handshake(
        DtlsServer::new(server_config).expect("server"),
        TestServer::default(),
        server_end,
        DtlsClient::new(client_config),
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    // No certificate anywhere.
    assert!(client_peer.server_chain.is_none());
    let session = server_peer.session.expect("session");
    let parameters = session.export_parameters().expect("parameters");
    assert_eq!(
        parameters.cipher_suite(),
        CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA
    );
    assert!(parameters.peer_certificate().is_empty());

    let sent = |log: &Sniffer| -> Vec<u8> {
        log.lock().unwrap().iter().flat_map(|d| handshake_types(d)).collect()
    };
    assert!(!sent(&server_log).contains(&CERTIFICATE_REQUEST));
    assert!(!sent(&client_log).contains(&CERTIFICATE_VERIFY));
    assert!(!sent(&client_log).contains(&CERTIFICATE));
}

#[test]
fn server_preference_decides_the_suite() {
    tracing_init();

    // The client offers both plain suites, the server only knows one.
    let (server_end, client_end) = pipe();
    let server_config = config()
        .crypto_provider(plain_provider_256())
        .build()
        .expect("config");
    let client_config = config().crypto_provider(plain_provider()).build().expect("config");

    let ((server_result, _), (client_result, client_peer)) = handshake(
        DtlsServer::new(server_config).expect("server"),
        TestServer::default(),
        server_end,
        DtlsClient::new(client_config),
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    let session = client_peer.session.expect("session");
    assert_eq!(
        session.export_parameters().expect("parameters").cipher_suite(),
        CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA
    );
}

#[test]
#[cfg(feature = "rcgen")]
fn selecting_an_unoffered_suite_is_internal_error() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server = DtlsServer::new(config().build().expect("config")).expect("server");
    let client = DtlsClient::new(config().build().expect("config"));
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        forced_suite: Some(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA),
        ..Default::default()
    };

    let ((server_result, _), (client_result, _)) = handshake(
        server,
        server_peer,
        server_end,
        client,
        TestClient::default(),
        client_end,
    );

    let server_err = server_result.expect_err("server must fail");
    assert_eq!(local_alert(&server_err), Some(AlertDescription::InternalError));
    let client_err = client_result.expect_err("client must fail");
    assert_eq!(peer_alert(&client_err), Some(AlertDescription::InternalError));
}

#[test]
#[cfg(feature = "rcgen")]
fn downgrade_sentinel_is_detected() {
    tracing_init();

    // A server that could do DTLS 1.3 marks its DTLS 1.2 random.
    let server_config = config()
        .max_version(ProtocolVersion::DTLS1_3)
        .build()
        .expect("config");

    // A client that could do better must refuse.
    let (server_end, client_end) = pipe();
    let client_config = config()
        .max_version(ProtocolVersion::DTLS1_3)
        .build()
        .expect("config");
    let ((server_result, _), (client_result, _)) = handshake(
        DtlsServer::new(server_config.clone()).expect("server"),
        TestServer {
            credentials: Some(credentials("server")),
            ..Default::default()
        },
        server_end,
        DtlsClient::new(client_config),
        TestClient::default(),
        client_end,
    );
    let client_err = client_result.expect_err("client must refuse");
    assert_eq!(local_alert(&client_err), Some(AlertDescription::IllegalParameter));
    let server_err = server_result.expect_err("server sees the alert");
    assert_eq!(peer_alert(&server_err), Some(AlertDescription::IllegalParameter));

    // A DTLS 1.2 only client has nothing better to offer.
    let (server_end, client_end) = pipe();
    let ((server_result, _), (client_result, _)) = handshake(
        DtlsServer::new(server_config).expect("server"),
        TestServer {
            credentials: Some(credentials("server")),
            ..Default::default()
        },
        server_end,
        DtlsClient::new(config().build().expect("config")),
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");
}

#[test]
#[cfg(feature = "rcgen")]
fn session_ticket_is_delivered() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_log = server_end.sniffer();
    let server_config = config().session_tickets(true).build().expect("config");
    let client_config = config().session_tickets(true).build().expect("config");
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ticket: Some(NewSessionTicket::new(300, b"opaque ticket")),
        ..Default::default()
    };

    let ((server_result, _), (client_result, client_peer)) = handshake(
        DtlsServer::new(server_config).expect("server"),
        server_peer,
        server_end,
        DtlsClient::new(client_config),
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    assert_eq!(client_peer.tickets.len(), 1);
    assert_eq!(client_peer.tickets[0].lifetime_hint, 300);
    assert_eq!(client_peer.tickets[0].ticket, b"opaque ticket".to_vec());

    let types: Vec<u8> = server_log
        .lock()
        .unwrap()
        .iter()
        .flat_map(|d| handshake_types(d))
        .collect();
    assert!(types.contains(&NEW_SESSION_TICKET));
}

#[test]
#[cfg(feature = "rcgen")]
fn ocsp_response_is_stapled_after_certificate() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_log = server_end.sniffer();
    let response = [0x30, 0x03, 0x0A, 0x01, 0x00];
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        status: Some(CertificateStatus::ocsp(&response)),
        ..Default::default()
    };
    let client_peer = TestClient {
        request_status: true,
        ..Default::default()
    };

    let ((server_result, _), (client_result, client_peer)) = handshake(
        DtlsServer::new(config().build().expect("config")).expect("server"),
        server_peer,
        server_end,
        DtlsClient::new(config().build().expect("config")),
        client_peer,
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    let status = client_peer.status.expect("certificate status");
    assert_eq!(status.ocsp_response, response.to_vec());

    let types: Vec<u8> = server_log
        .lock()
        .unwrap()
        .iter()
        .flat_map(|d| handshake_types(d))
        .collect();
    assert!(types
        .windows(2)
        .any(|w| w == [CERTIFICATE, CERTIFICATE_STATUS]));
}

#[test]
#[cfg(feature = "rcgen")]
fn no_status_without_status_request() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_log = server_end.sniffer();
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        status: Some(CertificateStatus::ocsp(&[0x30, 0x00])),
        ..Default::default()
    };

    let ((server_result, _), (client_result, client_peer)) = handshake(
        DtlsServer::new(config().build().expect("config")).expect("server"),
        server_peer,
        server_end,
        DtlsClient::new(config().build().expect("config")),
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    assert!(client_peer.status.is_none());
    let types: Vec<u8> = server_log
        .lock()
        .unwrap()
        .iter()
        .flat_map(|d| handshake_types(d))
        .collect();
    assert!(!types.contains(&CERTIFICATE_STATUS));
}

#[test]
#[cfg(feature = "rcgen")]
fn max_fragment_length_limits_records() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let client_config = config()
        .max_fragment_length(Some(MaxFragmentLength::L512))
        .build()
        .expect("config");
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ..Default::default()
    };

    let ((server_result, _), (client_result, _)) = handshake(
        DtlsServer::new(config().build().expect("config")).expect("server"),
        server_peer,
        server_end,
        DtlsClient::new(client_config),
        TestClient::default(),
        client_end,
    );
    let server_transport = server_result.expect("server handshake");
    let client_transport = client_result.expect("client handshake");

    assert!(client_transport.send_limit() <= 512);
    assert!(server_transport.send_limit() <= 512);
}

#[test]
fn tampered_client_finished_is_decrypt_error() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let client_end = client_end.tamper(flip_finished);
    let provider = plain_provider();

    let ((server_result, server_peer), _) = handshake(
        DtlsServer::new(config().crypto_provider(provider.clone()).build().expect("config"))
            .expect("server"),
        TestServer::default(),
        server_end,
        DtlsClient::new(
            config()
                .crypto_provider(provider)
                .handshake_timeout(Duration::from_secs(3))
                .build()
                .expect("config"),
        ),
        TestClient::default(),
        client_end,
    );

    let err = server_result.expect_err("server must fail");
    assert_eq!(local_alert(&err), Some(AlertDescription::DecryptError));
    assert!(server_peer.session.is_none());
}
