//! Server checks on hand-made ClientHellos.

use std::time::Duration;

use dtls_engine::message::{ClientHello, Extensions};
use dtls_engine::types::{AlertDescription, CipherSuite, CompressionMethod, ProtocolVersion};
use dtls_engine::{ConfigBuilder, DatagramTransport, DtlsServer};

use crate::common::*;

const PLAIN: CipherSuite = CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA;

/// Send `hello` to a fresh server and return the alert it answers with
/// along with the alert the server raised locally.
fn rejected(builder: ConfigBuilder, hello: &ClientHello) -> (u8, Option<AlertDescription>) {
    tracing_init();

    let (server_end, mut raw) = pipe();
    let server_config = builder.crypto_provider(plain_provider()).build().expect("config");
    let handle = spawn_server(
        DtlsServer::new(server_config).expect("server"),
        TestServer::default(),
        server_end,
    );

    raw.send(&client_hello_datagram(hello, 0, 0)).expect("send");

    let mut sent = Vec::new();
    let mut alert = None;
    while let Some(datagram) = next_datagram(&mut raw, Duration::from_secs(2)) {
        let found = alert_in(&datagram);
        sent.push(datagram);
        if let Some((level, description)) = found {
            assert_eq!(level, 2, "fatal");
            alert = Some(description);
            break;
        }
    }

    let (result, _) = handle.join().expect("server thread");
    let err = result.expect_err("server must fail");
    while let Some(datagram) = next_datagram(&mut raw, Duration::from_millis(100)) {
        sent.push(datagram);
    }

    // Refused before negotiating anything.
    for datagram in &sent {
        assert!(
            !handshake_types(datagram).contains(&SERVER_HELLO),
            "ServerHello sent before the alert"
        );
    }
    (alert.expect("an alert"), local_alert(&err))
}

fn without_cookies() -> ConfigBuilder {
    config().hello_verify_requests(false)
}

#[test]
fn null_compression_is_required() {
    let mut hello = client_hello(&[PLAIN]);
    hello.compression_methods = vec![CompressionMethod::Deflate];

    let (alert, local) = rejected(without_cookies(), &hello);
    assert_eq!(alert, 40);
    assert_eq!(local, Some(AlertDescription::HandshakeFailure));
}

#[test]
fn long_session_id_is_refused_before_the_cookie() {
    let mut hello = client_hello(&[PLAIN]);
    hello.session_id = vec![9; 33];

    let (alert, local) = rejected(config(), &hello);
    assert_eq!(alert, 47);
    assert_eq!(local, Some(AlertDescription::IllegalParameter));
}

#[test]
fn tls_version_is_refused() {
    let mut hello = client_hello(&[PLAIN]);
    hello.client_version = ProtocolVersion::Unknown(0x0303);

    let (alert, _) = rejected(config(), &hello);
    assert_eq!(alert, 47);
}

#[test]
fn renegotiation_info_must_be_empty() {
    let mut hello = client_hello(&[PLAIN]);
    let mut extensions = Extensions::new();
    extensions.add_renegotiation_info(&[1, 2, 3]);
    extensions.add_extended_master_secret();
    hello.extensions = extensions;

    let (alert, local) = rejected(without_cookies(), &hello);
    assert_eq!(alert, 40);
    assert_eq!(local, Some(AlertDescription::HandshakeFailure));
}

#[test]
fn extended_master_secret_is_required() {
    let mut hello = client_hello(&[PLAIN]);
    let mut extensions = Extensions::new();
    extensions.add_renegotiation_info(&[]);
    hello.extensions = extensions;

    let (alert, _) = rejected(without_cookies(), &hello);
    assert_eq!(alert, 40);
}

#[test]
fn no_cipher_suite_in_common() {
    // Only suites that need server credentials, and the server has none.
    let hello = client_hello(&[CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256]);

    let (alert, local) = rejected(without_cookies(), &hello);
    assert_eq!(alert, 40);
    assert_eq!(local, Some(AlertDescription::HandshakeFailure));
}

#[test]
fn fallback_below_our_best_version_is_refused() {
    let hello = client_hello(&[PLAIN, CipherSuite::TLS_FALLBACK_SCSV]);
    let builder = without_cookies().max_version(ProtocolVersion::DTLS1_3);

    let (alert, local) = rejected(builder, &hello);
    assert_eq!(alert, 86);
    assert_eq!(local, Some(AlertDescription::InappropriateFallback));
}

#[test]
fn hello_verify_request_echoes_the_record_sequence() {
    tracing_init();

    let (server_end, mut raw) = pipe();
    let server_config = config()
        .crypto_provider(plain_provider())
        .handshake_timeout(Duration::from_millis(500))
        .build()
        .expect("config");
    let handle = spawn_server(
        DtlsServer::new(server_config).expect("server"),
        TestServer::default(),
        server_end,
    );

    let hello = client_hello(&[PLAIN]);
    raw.send(&client_hello_datagram(&hello, 0, 5)).expect("send");

    let datagram = next_datagram(&mut raw, Duration::from_secs(2)).expect("HelloVerifyRequest");
    let records = parse_records(&datagram);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ctype, HANDSHAKE);
    assert_eq!(records[0].epoch, 0);
    assert_eq!(records[0].seq, 5);
    assert_eq!(records[0].first, Some(HELLO_VERIFY_REQUEST));
    assert_eq!(records[0].message_seq, Some(0));
    // Record version DTLS 1.0
    assert_eq!(&datagram[1..3], &[0xFE, 0xFF]);

    // A second cookieless hello gets another request, nothing more.
    raw.send(&client_hello_datagram(&hello, 0, 6)).expect("send");
    let datagram = next_datagram(&mut raw, Duration::from_secs(2)).expect("HelloVerifyRequest");
    assert_eq!(handshake_types(&datagram), vec![HELLO_VERIFY_REQUEST]);
    assert_eq!(parse_records(&datagram)[0].seq, 6);

    let (result, _) = handle.join().expect("server thread");
    assert!(matches!(result, Err(dtls_engine::Error::Timeout(_))));
}
