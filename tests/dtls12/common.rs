//! Shared helpers for DTLS 1.2 integration tests.

#![allow(unused)]

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dtls_engine::crypto::rust_crypto::default_provider;
use dtls_engine::crypto::{Aad, Cipher, CryptoProvider, KeyExchangeAlgorithm, Nonce};
use dtls_engine::crypto::{HashAlgorithm, SupportedCipherSuite};
use dtls_engine::message::{CertificateStatus, ClientHello, Extensions, NewSessionTicket, Random};
use dtls_engine::types::{CipherSuite, CompressionMethod, ProtocolVersion};
use dtls_engine::{Buf, CertificateChain, ClientPeer, Config, ConfigBuilder, Credentials};
use dtls_engine::{DatagramTransport, DtlsClient, DtlsServer, DtlsTransport, Error};
use dtls_engine::{KeyExchange, KeyExchangeContext, ServerPeer, TlsSession};
use zeroize::Zeroizing;

pub const MTU: usize = 1200;

/// Record content types.
pub const CHANGE_CIPHER_SPEC: u8 = 20;
pub const ALERT: u8 = 21;
pub const HANDSHAKE: u8 = 22;
pub const APPLICATION_DATA: u8 = 23;

/// Handshake message types (RFC 5246 / 6347).
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const HELLO_VERIFY_REQUEST: u8 = 3;
pub const NEW_SESSION_TICKET: u8 = 4;
pub const CERTIFICATE: u8 = 11;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const CERTIFICATE_VERIFY: u8 = 15;
pub const FINISHED: u8 = 20;
pub const CERTIFICATE_STATUS: u8 = 22;

static INIT: Once = Once::new();

/// Route `log` output to the test harness. `RUST_LOG=trace` to see it.
pub fn tracing_init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Parsed DTLS 1.2 record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecHdr {
    pub ctype: u8,
    pub epoch: u16,
    pub seq: u64,
    pub len: usize,
    /// First byte of the fragment, the handshake type for plaintext
    /// handshake records.
    pub first: Option<u8>,
    /// message_seq of a plaintext handshake record.
    pub message_seq: Option<u16>,
}

/// Parse DTLS 1.2 record headers from a datagram.
pub fn parse_records(datagram: &[u8]) -> Vec<RecHdr> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let seq_bytes = [
            0u8,
            0u8,
            datagram[i + 5],
            datagram[i + 6],
            datagram[i + 7],
            datagram[i + 8],
            datagram[i + 9],
            datagram[i + 10],
        ];
        let seq = u64::from_be_bytes(seq_bytes);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        let body = &datagram[i + 13..(i + 13 + len).min(datagram.len())];
        let message_seq = (ctype == HANDSHAKE && epoch == 0 && body.len() >= 6)
            .then(|| u16::from_be_bytes([body[4], body[5]]));
        out.push(RecHdr {
            ctype,
            epoch,
            seq,
            len,
            first: body.first().copied(),
            message_seq,
        });
        i += 13 + len;
    }
    out
}

/// Collect record headers from a slice of datagrams.
pub fn collect_headers(datagrams: &[Vec<u8>]) -> Vec<RecHdr> {
    datagrams.iter().flat_map(|d| parse_records(d)).collect()
}

/// Handshake types of the plaintext handshake records in a datagram.
pub fn handshake_types(datagram: &[u8]) -> Vec<u8> {
    parse_records(datagram)
        .iter()
        .filter(|r| r.ctype == HANDSHAKE && r.epoch == 0)
        .filter_map(|r| r.first)
        .collect()
}

/// The alert description of the first alert record in a datagram.
pub fn alert_in(datagram: &[u8]) -> Option<(u8, u8)> {
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        if datagram[i] == ALERT && len == 2 && i + 15 <= datagram.len() {
            return Some((datagram[i + 13], datagram[i + 14]));
        }
        i += 13 + len;
    }
    None
}

/// Log of every datagram an endpoint handed to its transport.
pub type Sniffer = Arc<Mutex<Vec<Vec<u8>>>>;

type Tamper = Box<dyn FnMut(&mut Vec<u8>) + Send>;

/// One end of an in-memory datagram link between two threads.
///
/// Outgoing datagrams can be dropped, swapped pairwise or tampered with
/// before they reach the peer. Everything sent is logged, dropped
/// datagrams included.
pub struct PipeEnd {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    mtu: usize,
    sniffer: Sniffer,
    drop_first: usize,
    black_hole: bool,
    reorder: bool,
    held: Option<Vec<u8>>,
    tamper: Option<Tamper>,
}

/// A connected pair of pipe ends.
pub fn pipe() -> (PipeEnd, PipeEnd) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (PipeEnd::new(a_tx, a_rx), PipeEnd::new(b_tx, b_rx))
}

impl PipeEnd {
    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        PipeEnd {
            tx,
            rx,
            mtu: MTU,
            sniffer: Sniffer::default(),
            drop_first: 0,
            black_hole: false,
            reorder: false,
            held: None,
            tamper: None,
        }
    }

    /// Lose the first `n` datagrams sent.
    pub fn drop_first(mut self, n: usize) -> Self {
        self.drop_first = n;
        self
    }

    /// Lose everything sent.
    pub fn black_hole(mut self) -> Self {
        self.black_hole = true;
        self
    }

    /// Deliver datagrams of a flight pairwise swapped.
    pub fn reorder(mut self) -> Self {
        self.reorder = true;
        self
    }

    /// Rewrite datagrams on their way out.
    pub fn tamper(mut self, f: impl FnMut(&mut Vec<u8>) + Send + 'static) -> Self {
        self.tamper = Some(Box::new(f));
        self
    }

    pub fn sniffer(&self) -> Sniffer {
        self.sniffer.clone()
    }

    fn deliver(&mut self, datagram: Vec<u8>) {
        // The peer may be gone, just like on a real network.
        let _ = self.tx.send(datagram);
    }
}

impl DatagramTransport for PipeEnd {
    fn receive_limit(&self) -> usize {
        self.mtu
    }

    fn send_limit(&self) -> usize {
        self.mtu
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        if let Some(held) = self.held.take() {
            self.deliver(held);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(datagram) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(Some(n))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout.min(Duration::from_millis(10)));
                Ok(None)
            }
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut datagram = buf.to_vec();
        if let Some(tamper) = &mut self.tamper {
            tamper(&mut datagram);
        }
        self.sniffer.lock().unwrap().push(datagram.clone());

        if self.black_hole {
            return Ok(());
        }
        if self.drop_first > 0 {
            self.drop_first -= 1;
            return Ok(());
        }
        if self.reorder {
            match self.held.take() {
                Some(held) => {
                    self.deliver(datagram);
                    self.deliver(held);
                }
                None => self.held = Some(datagram),
            }
            return Ok(());
        }
        self.deliver(datagram);
        Ok(())
    }
}

/// A config with short timers, so failing tests fail fast.
pub fn config() -> ConfigBuilder {
    Config::builder()
        .mtu(MTU)
        .flight_start_rto(Duration::from_millis(50))
        .flight_max_rto(Duration::from_millis(400))
        .handshake_timeout(Duration::from_secs(10))
        .final_flight_expiry(Duration::from_secs(2))
}

#[cfg(feature = "rcgen")]
pub fn credentials(name: &str) -> Credentials {
    dtls_engine::generate_self_signed_certificate(name)
        .expect("generate certificate")
        .credentials(&default_provider())
        .expect("load credentials")
}

/// Shared server-side session cache.
pub type SessionCache = Arc<Mutex<HashMap<Vec<u8>, TlsSession>>>;

#[derive(Default)]
pub struct TestServer {
    pub credentials: Option<Credentials>,
    pub cache: SessionCache,
    /// Overrides suite selection.
    pub forced_suite: Option<CipherSuite>,
    pub client_chain: Option<CertificateChain>,
    pub session: Option<TlsSession>,
    pub ticket: Option<NewSessionTicket>,
    /// Stapled when the client asks.
    pub status: Option<CertificateStatus>,
}

impl ServerPeer for TestServer {
    fn credentials(&mut self) -> Option<Credentials> {
        self.credentials.clone()
    }

    fn select_cipher_suite(
        &mut self,
        offered: &[CipherSuite],
        provider: &CryptoProvider,
        _version: ProtocolVersion,
        has_credentials: bool,
    ) -> Option<CipherSuite> {
        if let Some(forced) = self.forced_suite {
            return Some(forced);
        }
        provider
            .cipher_suites
            .iter()
            .map(|s| (s.suite(), s.key_exchange_algorithm()))
            .filter(|(s, _)| offered.contains(s))
            .find(|(_, kx)| has_credentials || *kx != KeyExchangeAlgorithm::EcdheEcdsa)
            .map(|(s, _)| s)
    }

    fn notify_client_certificate(&mut self, chain: &CertificateChain) -> Result<(), Error> {
        self.client_chain = Some(chain.clone());
        Ok(())
    }

    fn certificate_status(&mut self) -> Option<CertificateStatus> {
        self.status.clone()
    }

    fn new_session_ticket(&mut self) -> Option<NewSessionTicket> {
        self.ticket.clone()
    }

    fn resumable_session(&mut self, session_id: &dtls_engine::message::SessionId) -> Option<TlsSession> {
        self.cache.lock().unwrap().get(&session_id.to_vec()).cloned()
    }

    fn handshake_complete(&mut self, session: &TlsSession) {
        self.cache
            .lock()
            .unwrap()
            .insert(session.session_id().to_vec(), session.clone());
        self.session = Some(session.clone());
    }
}

#[derive(Default)]
pub struct TestClient {
    pub credentials: Option<Credentials>,
    pub resume: Option<TlsSession>,
    pub server_chain: Option<CertificateChain>,
    pub session: Option<TlsSession>,
    pub tickets: Vec<NewSessionTicket>,
    /// Offer status_request.
    pub request_status: bool,
    pub status: Option<CertificateStatus>,
}

impl ClientPeer for TestClient {
    fn verify_server_certificate(&mut self, chain: &CertificateChain) -> Result<(), Error> {
        self.server_chain = Some(chain.clone());
        Ok(())
    }

    fn credentials(&mut self, _request: &dtls_engine::message::CertificateRequest) -> Option<Credentials> {
        self.credentials.clone()
    }

    fn session_to_resume(&mut self) -> Option<TlsSession> {
        self.resume.clone()
    }

    fn client_extensions(&mut self) -> Extensions {
        let mut extensions = Extensions::new();
        if self.request_status {
            extensions.add_status_request();
        }
        extensions
    }

    fn notify_certificate_status(&mut self, status: &CertificateStatus) -> Result<(), Error> {
        self.status = Some(status.clone());
        Ok(())
    }

    fn notify_session_ticket(&mut self, ticket: &NewSessionTicket) {
        self.tickets.push(ticket.clone());
    }

    fn handshake_complete(&mut self, session: &TlsSession) {
        self.session = Some(session.clone());
    }
}

pub type ServerResult<S> = (Result<DtlsTransport<PipeEnd>, Error>, S);

/// Run `accept` on its own thread.
pub fn spawn_server<S>(server: DtlsServer, mut peer: S, end: PipeEnd) -> JoinHandle<ServerResult<S>>
where
    S: ServerPeer + Send + 'static,
{
    thread::spawn(move || {
        let result = server.accept(&mut peer, end);
        (result, peer)
    })
}

/// Run a server and a client against each other and return both outcomes.
pub fn handshake<S, C>(
    server: DtlsServer,
    server_peer: S,
    server_end: PipeEnd,
    client: DtlsClient,
    mut client_peer: C,
    client_end: PipeEnd,
) -> (ServerResult<S>, (Result<DtlsTransport<PipeEnd>, Error>, C))
where
    S: ServerPeer + Send + 'static,
    C: ClientPeer,
{
    let handle = spawn_server(server, server_peer, server_end);
    let client_result = client.connect(&mut client_peer, client_end);
    let server_result = handle.join().expect("server thread");
    (server_result, (client_result, client_peer))
}

/// Fatal alert description raised locally.
pub fn local_alert(error: &Error) -> Option<dtls_engine::types::AlertDescription> {
    match error {
        Error::FatalAlert { description, .. } => Some(*description),
        _ => None,
    }
}

/// Fatal alert description received from the peer.
pub fn peer_alert(error: &Error) -> Option<dtls_engine::types::AlertDescription> {
    match error {
        Error::PeerAlert { description, .. } => Some(*description),
        _ => None,
    }
}

// A provider whose suites bring their own key exchange and a cipher without
// confidentiality. Handshakes over it are fully deterministic on the wire,
// which lets tests tamper with protected records on purpose.

#[derive(Debug)]
struct PlainSuite(CipherSuite);

#[derive(Debug)]
struct PlainCipher;

impl Cipher for PlainCipher {
    fn encrypt(&mut self, _plaintext: &mut Buf, _aad: Aad, _nonce: Nonce) -> Result<(), String> {
        Ok(())
    }

    fn decrypt(&mut self, _ciphertext: &mut Buf, _aad: Aad, _nonce: Nonce) -> Result<(), String> {
        Ok(())
    }

    fn tag_len(&self) -> usize {
        0
    }
}

impl SupportedCipherSuite for PlainSuite {
    fn suite(&self) -> CipherSuite {
        self.0
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::SHA256
    }

    fn key_lengths(&self) -> (usize, usize, usize) {
        (0, 16, 4)
    }

    fn key_exchange_algorithm(&self) -> KeyExchangeAlgorithm {
        KeyExchangeAlgorithm::Provided
    }

    fn create_cipher(&self, _key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(PlainCipher))
    }

    fn create_key_exchange(&self) -> Option<Box<dyn KeyExchange>> {
        Some(Box::new(ClearKeyExchange::default()))
    }
}

/// The client picks the pre-master secret and sends it in the clear.
#[derive(Debug, Default)]
struct ClearKeyExchange {
    pre_master_secret: Option<Vec<u8>>,
}

impl KeyExchange for ClearKeyExchange {
    fn skip_server_credentials(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn process_server_credentials(&mut self, _credentials: &Credentials) -> Result<(), Error> {
        Ok(())
    }

    fn process_server_certificate(&mut self, _chain: &CertificateChain) -> Result<(), Error> {
        Ok(())
    }

    fn requires_server_key_exchange(&self) -> bool {
        false
    }

    fn generate_server_key_exchange(
        &mut self,
        _context: &KeyExchangeContext<'_>,
    ) -> Result<Option<Buf>, Error> {
        Ok(None)
    }

    fn process_server_key_exchange(
        &mut self,
        _context: &KeyExchangeContext<'_>,
        _body: &[u8],
    ) -> Result<(), Error> {
        Ok(())
    }

    fn generate_client_key_exchange(
        &mut self,
        context: &KeyExchangeContext<'_>,
    ) -> Result<Buf, Error> {
        let mut secret = context.client_random.0.to_vec();
        secret.extend_from_slice(&context.server_random.0[..16]);
        let body = Buf::from_slice(&secret);
        self.pre_master_secret = Some(secret);
        Ok(body)
    }

    fn process_client_key_exchange(
        &mut self,
        _context: &KeyExchangeContext<'_>,
        body: &[u8],
    ) -> Result<(), Error> {
        self.pre_master_secret = Some(body.to_vec());
        Ok(())
    }

    fn requires_certificate_verify(&self) -> bool {
        false
    }

    fn generate_pre_master_secret(&mut self) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.pre_master_secret
            .take()
            .map(Zeroizing::new)
            .ok_or_else(|| Error::InvalidArgument("no pre-master secret".into()))
    }
}

static PLAIN_128: PlainSuite = PlainSuite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
static PLAIN_256: PlainSuite = PlainSuite(CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA);
static PLAIN_SUITES: &[&dyn SupportedCipherSuite] = &[&PLAIN_128, &PLAIN_256];
static PLAIN_256_ONLY: &[&dyn SupportedCipherSuite] = &[&PLAIN_256];

/// The default provider with only the plain suites.
pub fn plain_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: PLAIN_SUITES,
        ..default_provider()
    }
}

/// The plain provider offering only `TLS_RSA_WITH_AES_256_CBC_SHA`.
pub fn plain_provider_256() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: PLAIN_256_ONLY,
        ..default_provider()
    }
}

/// A well formed ClientHello as the engine's client would send it.
pub fn client_hello(suites: &[CipherSuite]) -> ClientHello {
    let mut extensions = Extensions::new();
    extensions.add_renegotiation_info(&[]);
    extensions.add_extended_master_secret();
    ClientHello {
        client_version: ProtocolVersion::DTLS1_2,
        random: Random([7; 32]),
        session_id: Vec::new(),
        cookie: Vec::new(),
        cipher_suites: suites.to_vec(),
        compression_methods: vec![CompressionMethod::Null],
        extensions,
    }
}

/// One datagram holding `hello` in an epoch 0 record.
pub fn client_hello_datagram(hello: &ClientHello, message_seq: u16, record_seq: u64) -> Vec<u8> {
    let mut body = Buf::new();
    hello.serialize(&mut body);

    let len = body.len() as u32;
    let mut handshake = vec![CLIENT_HELLO];
    handshake.extend_from_slice(&len.to_be_bytes()[1..]);
    handshake.extend_from_slice(&message_seq.to_be_bytes());
    handshake.extend_from_slice(&[0, 0, 0]);
    handshake.extend_from_slice(&len.to_be_bytes()[1..]);
    handshake.extend_from_slice(&body);

    let mut datagram = vec![HANDSHAKE, 0xFE, 0xFF, 0, 0];
    datagram.extend_from_slice(&record_seq.to_be_bytes()[2..]);
    datagram.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    datagram.extend_from_slice(&handshake);
    datagram
}

/// Wait for one datagram on a raw pipe end.
pub fn next_datagram(end: &mut PipeEnd, timeout: Duration) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; MTU];
    let n = end.receive(&mut buf, timeout).expect("pipe receive")?;
    buf.truncate(n);
    Some(buf)
}

/// Flip the last byte of a datagram ending in an epoch 1 handshake record.
///
/// Over the plain suites that is the last byte of Finished.verify_data.
pub fn flip_finished(datagram: &mut Vec<u8>) {
    let ends_in_finished = parse_records(datagram)
        .last()
        .map(|r| r.ctype == HANDSHAKE && r.epoch == 1)
        .unwrap_or(false);
    if ends_in_finished {
        if let Some(last) = datagram.last_mut() {
            *last ^= 0xFF;
        }
    }
}

/// Cut a datagram just before its first record in `epoch`. Returns whether
/// anything was cut.
pub fn truncate_at_epoch(datagram: &mut Vec<u8>, epoch: u16) -> bool {
    let mut offset = 0;
    for record in parse_records(datagram) {
        if record.epoch == epoch {
            datagram.truncate(offset);
            return true;
        }
        offset += 13 + record.len;
    }
    false
}
