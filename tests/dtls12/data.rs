//! Application data over an established connection.

use std::thread;
use std::time::Duration;

use dtls_engine::{DtlsClient, DtlsServer, Error};

use crate::common::*;

fn connected() -> (
    dtls_engine::DtlsTransport<PipeEnd>,
    dtls_engine::DtlsTransport<PipeEnd>,
) {
    let (server_end, client_end) = pipe();
    let provider = plain_provider();
    let ((server_result, _), (client_result, _)) = handshake(
        DtlsServer::new(config().crypto_provider(provider.clone()).build().expect("config"))
            .expect("server"),
        TestServer::default(),
        server_end,
        DtlsClient::new(config().crypto_provider(provider).build().expect("config")),
        TestClient::default(),
        client_end,
    );
    (
        server_result.expect("server handshake"),
        client_result.expect("client handshake"),
    )
}

#[test]
fn echo() {
    tracing_init();

    let (mut server, mut client) = connected();

    let echo = thread::spawn(move || {
        let mut buf = vec![0u8; 2048];
        for _ in 0..3 {
            let n = server
                .receive(&mut buf, Duration::from_secs(5))
                .expect("server receive")
                .expect("data before timeout");
            server.send(&buf[..n]).expect("server send");
        }
        server
    });

    let mut buf = vec![0u8; 2048];
    for message in [&b"hello"[..], &b"second message"[..], &[0xAB; 1000][..]] {
        client.send(message).expect("client send");
        let n = client
            .receive(&mut buf, Duration::from_secs(5))
            .expect("client receive")
            .expect("echo before timeout");
        assert_eq!(&buf[..n], message);
    }

    echo.join().expect("echo thread");
}

#[test]
#[cfg(feature = "rcgen")]
fn echo_over_aead() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let server_log = server_end.sniffer();
    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ..Default::default()
    };
    let ((server_result, _), (client_result, _)) = handshake(
        DtlsServer::new(config().build().expect("config")).expect("server"),
        server_peer,
        server_end,
        DtlsClient::new(config().build().expect("config")),
        TestClient::default(),
        client_end,
    );
    let mut server = server_result.expect("server handshake");
    let mut client = client_result.expect("client handshake");

    client.send(b"ping").expect("send");
    let mut buf = [0u8; 64];
    let n = server
        .receive(&mut buf, Duration::from_secs(5))
        .expect("receive")
        .expect("data");
    assert_eq!(&buf[..n], b"ping");

    server.send(b"secret pong").expect("send");
    let n = client
        .receive(&mut buf, Duration::from_secs(5))
        .expect("receive")
        .expect("data");
    assert_eq!(&buf[..n], b"secret pong");

    // The plaintext never appears on the wire.
    let sent = server_log.lock().unwrap().clone();
    let last = sent.last().expect("application data datagram");
    assert_eq!(parse_records(last)[0].ctype, APPLICATION_DATA);
    assert!(!last.windows(11).any(|w| w == b"secret pong"));
}

#[test]
fn receive_times_out_without_data() {
    tracing_init();

    let (mut server, _client) = connected();
    let mut buf = [0u8; 16];
    let received = server
        .receive(&mut buf, Duration::from_millis(50))
        .expect("receive");
    assert_eq!(received, None);
}

#[test]
fn send_above_limit_is_rejected() {
    tracing_init();

    let (_server, mut client) = connected();
    let too_big = vec![0u8; client.send_limit() + 1];
    let err = client.send(&too_big).expect_err("must be rejected");
    assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", err);

    // The connection stays usable.
    client.send(b"fine").expect("send");
}

#[test]
fn send_after_close_fails() {
    tracing_init();

    let (_server, mut client) = connected();
    client.close().expect("close");
    assert!(client.is_closed());
    assert!(matches!(client.send(b"late"), Err(Error::ConnectionClosed)));

    // Closing twice is fine.
    client.close().expect("close again");
}

#[test]
fn close_notify_reaches_the_peer() {
    tracing_init();

    let (mut server, mut client) = connected();
    client.close().expect("close");

    let mut buf = [0u8; 16];
    let err = server
        .receive(&mut buf, Duration::from_secs(2))
        .expect_err("peer closed");
    assert!(matches!(err, Error::ConnectionClosed), "{:?}", err);
    assert!(server.is_closed());
}
