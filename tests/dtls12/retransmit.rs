//! Flight retransmission over a lossy, reordering link.

use std::thread;
use std::time::{Duration, Instant};

use dtls_engine::message::NewSessionTicket;
use dtls_engine::{DtlsClient, DtlsServer, Error};

use crate::common::*;

#[test]
fn lost_client_hello_is_resent() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let client_end = client_end.drop_first(1);
    let client_log = client_end.sniffer();
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
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    let sent = client_log.lock().unwrap().clone();
    let first = parse_records(&sent[0]);
    let resent = parse_records(&sent[1]);
    assert_eq!(first[0].first, Some(CLIENT_HELLO));
    assert_eq!(resent[0].first, Some(CLIENT_HELLO));

    // Same message, new record.
    assert_eq!(first[0].message_seq, Some(0));
    assert_eq!(resent[0].message_seq, Some(0));
    assert_eq!(resent[0].epoch, first[0].epoch);
    assert!(resent[0].seq > first[0].seq);
}

#[test]
fn silent_peer_exhausts_retransmissions() {
    tracing_init();

    let (_server_end, client_end) = pipe();
    let client_end = client_end.black_hole();
    let client_log = client_end.sniffer();

    let client_config = config()
        .crypto_provider(plain_provider())
        .flight_start_rto(Duration::from_millis(20))
        .flight_max_rto(Duration::from_millis(80))
        .flight_retries(2)
        .build()
        .expect("config");
    let client = DtlsClient::new(client_config);

    let mut peer = TestClient::default();
    let err = client.connect(&mut peer, client_end).expect_err("must time out");
    assert!(matches!(err, Error::Timeout(_)), "{:?}", err);
    assert!(peer.session.is_none());

    // The first transmission and two retries.
    let sent = client_log.lock().unwrap().clone();
    assert_eq!(sent.len(), 3, "{} datagrams", sent.len());
    for datagram in &sent {
        assert_eq!(handshake_types(datagram), vec![CLIENT_HELLO]);
    }
}

#[test]
#[cfg(feature = "rcgen")]
fn reordered_flights_are_reassembled() {
    tracing_init();

    // A small MTU spreads the server's flight over several datagrams.
    let mtu = 400;
    let (server_end, client_end) = pipe();
    let server_end = server_end.reorder();
    let client_end = client_end.reorder();
    let server_log = server_end.sniffer();

    let server_peer = TestServer {
        credentials: Some(credentials("server")),
        ..Default::default()
    };
    let ((server_result, _), (client_result, client_peer)) = handshake(
        DtlsServer::new(config().mtu(mtu).build().expect("config")).expect("server"),
        server_peer,
        server_end,
        DtlsClient::new(config().mtu(mtu).build().expect("config")),
        TestClient::default(),
        client_end,
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");
    assert!(client_peer.server_chain.is_some());

    let sent = server_log.lock().unwrap().clone();
    assert!(sent.len() > 2, "{} datagrams", sent.len());
    assert!(sent.iter().all(|d| d.len() <= mtu));
}

#[test]
fn lost_final_flight_is_resent_from_the_retained_copy() {
    tracing_init();

    let (server_end, client_end) = pipe();
    let mut dropped = false;
    let server_end = server_end.tamper(move |datagram| {
        let protected = parse_records(datagram).iter().any(|r| r.epoch == 1);
        if protected && !dropped {
            dropped = true;
            datagram.clear();
        }
    });
    let server_log = server_end.sniffer();
    let provider = plain_provider();

    let server = DtlsServer::new(config().crypto_provider(provider.clone()).build().expect("config"))
        .expect("server");
    let server_thread = thread::spawn(move || {
        let mut peer = TestServer::default();
        let mut transport = server.accept(&mut peer, server_end).expect("server handshake");
        // Keep reading so the peer's repeated flight is answered.
        let mut buf = [0u8; 64];
        let n = transport
            .receive(&mut buf, Duration::from_secs(5))
            .expect("receive")
            .expect("data before timeout");
        buf[..n].to_vec()
    });

    let client = DtlsClient::new(config().crypto_provider(provider).build().expect("config"));
    let mut peer = TestClient::default();
    let mut transport = client.connect(&mut peer, client_end).expect("client handshake");
    transport.send(b"done").expect("send");

    assert_eq!(server_thread.join().expect("server thread"), b"done".to_vec());

    let sent = server_log.lock().unwrap().clone();
    let cleared = sent.iter().position(|d| d.is_empty()).expect("a dropped datagram");
    let resent = sent[cleared + 1..]
        .iter()
        .any(|d| parse_records(d).iter().any(|r| r.epoch == 1 && r.ctype == HANDSHAKE));
    assert!(resent, "final flight was not resent");
}

#[test]
fn lost_finished_after_ticket_is_recovered() {
    tracing_init();

    let (server_end, client_end) = pipe();
    // NewSessionTicket and ChangeCipherSpec arrive, Finished does not.
    let mut cut = false;
    let server_end = server_end.tamper(move |datagram| {
        if !cut {
            cut = truncate_at_epoch(datagram, 1);
        }
    });
    let server_log = server_end.sniffer();
    let provider = plain_provider();

    let server_config = config()
        .crypto_provider(provider.clone())
        .session_tickets(true)
        .build()
        .expect("config");
    let server = DtlsServer::new(server_config).expect("server");
    let server_thread = thread::spawn(move || {
        let mut peer = TestServer {
            ticket: Some(NewSessionTicket::new(600, b"ticket")),
            ..Default::default()
        };
        let mut transport = server.accept(&mut peer, server_end).expect("server handshake");
        let mut buf = [0u8; 64];
        let n = transport
            .receive(&mut buf, Duration::from_secs(5))
            .expect("receive")
            .expect("data before timeout");
        buf[..n].to_vec()
    });

    let client_config = config()
        .crypto_provider(provider)
        .session_tickets(true)
        .build()
        .expect("config");
    let client = DtlsClient::new(client_config);
    let mut peer = TestClient::default();
    let started = Instant::now();
    let mut transport = client.connect(&mut peer, client_end).expect("client handshake");
    // Recovered by retransmission, long before the handshake deadline.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(peer.tickets.len(), 1);
    transport.send(b"done").expect("send");

    assert_eq!(server_thread.join().expect("server thread"), b"done".to_vec());

    let sent = server_log.lock().unwrap().clone();
    let resent = sent
        .iter()
        .any(|d| parse_records(d).iter().any(|r| r.epoch == 1 && r.ctype == HANDSHAKE));
    assert!(resent, "Finished was never resent");
}
