// DTLS 1.2 client handshake:
//
// 1. ClientHello, resent once with the cookie of a HelloVerifyRequest
// 2. ServerHello, then for a full handshake SupplementalData, Certificate,
//    CertificateStatus, ServerKeyExchange, CertificateRequest, ServerHelloDone
// 3. SupplementalData, Certificate, ClientKeyExchange, CertificateVerify,
//    ChangeCipherSpec, Finished
// 4. NewSessionTicket, ChangeCipherSpec, Finished from the server
//
// When the server echoes the offered session id the handshake is
// abbreviated: the server's ChangeCipherSpec and Finished follow its hello
// and the client's Finished ends the handshake.

use nom::combinator::all_consuming;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::key_exchange::{EcdheKeyExchange, KeyExchange, KeyExchangeContext};
use super::record::RecordLayer;
use super::reliable::ReliableHandshake;
use super::secrets;
use super::session::{SecurityParameters, SessionParameters, TlsSession};
use super::transport::DtlsTransport;
use crate::buffer::Buf;
use crate::certificate::{CertificateChain, Credentials};
use crate::config::Config;
use crate::crypto::{KeyExchangeAlgorithm, SupportedCipherSuite};
use crate::message::{parse_supplemental_data, serialize_supplemental_data};
use crate::message::{Certificate, CertificateRequest, CertificateStatus, ClientHello};
use crate::message::DigitallySigned;
use crate::message::{ExtensionType, Extensions, HelloVerifyRequest, NewSessionTicket};
use crate::message::{Random, ServerHello, EC_POINT_FORMAT_UNCOMPRESSED};
use crate::peer::ClientPeer;
use crate::transport::DatagramTransport;
use crate::types::{AlertDescription, AlertLevel, CipherSuite, CompressionMethod};
use crate::types::{ConnectionEnd, HandshakeType, ProtocolVersion};
use crate::Error;

/// Where a client handshake is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Start,
    AwaitingServerHello,
    AwaitingServerHelloDone,
    AwaitingNewSessionTicket,
    AwaitingFinished,
    Established,
    Aborted,
}

/// Connects to DTLS 1.2 servers.
#[derive(Debug, Clone)]
pub struct DtlsClient {
    config: Config,
}

impl DtlsClient {
    pub fn new(config: Config) -> Self {
        DtlsClient { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a client handshake over `transport`.
    pub fn connect<T, P>(&self, peer: &mut P, transport: T) -> Result<DtlsTransport<T>, Error>
    where
        T: DatagramTransport,
        P: ClientPeer,
    {
        let mut record = RecordLayer::new(transport, &self.config)?;
        let mut handshake = ClientHandshake::new(&self.config, peer);

        match handshake.run(&mut record) {
            Ok(()) => Ok(DtlsTransport::new(record)),
            Err(e) => Err(handshake.abort(&mut record, e)),
        }
    }
}

struct ClientHandshake<'c, P> {
    config: &'c Config,
    peer: &'c mut P,
    state: ClientState,
    params: SecurityParameters,
    suite: Option<&'static dyn SupportedCipherSuite>,
    client_extensions: Extensions,
    server_extensions: Extensions,
    offered_session: Option<(TlsSession, SessionParameters)>,
    resuming: bool,
    session_ticket: bool,
    status_request: bool,
}

impl<'c, P: ClientPeer> ClientHandshake<'c, P> {
    fn new(config: &'c Config, peer: &'c mut P) -> Self {
        ClientHandshake {
            config,
            peer,
            state: ClientState::Start,
            params: SecurityParameters::new(ConnectionEnd::Client),
            suite: None,
            client_extensions: Extensions::new(),
            server_extensions: Extensions::new(),
            offered_session: None,
            resuming: false,
            session_ticket: false,
            status_request: false,
        }
    }

    fn set_state(&mut self, state: ClientState) {
        debug!("Client {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn abort<T: DatagramTransport>(&mut self, record: &mut RecordLayer<T>, error: Error) -> Error {
        self.set_state(ClientState::Aborted);
        self.params.clear();
        if self.resuming {
            if let Some((session, _)) = self.offered_session.take() {
                session.invalidate();
            }
        }
        if let Some(description) = error.alert_to_send() {
            warn!("Client handshake failed: {}", error);
            if let Err(e) = record.send_alert(AlertLevel::Fatal, description) {
                debug!("Failed to send alert: {}", e);
            }
        } else {
            debug!("Client handshake failed: {}", error);
        }
        if let Err(e) = record.close() {
            debug!("Failed to close transport: {}", e);
        }
        error
    }

    fn run<T: DatagramTransport>(&mut self, record: &mut RecordLayer<T>) -> Result<(), Error> {
        let mut hs = ReliableHandshake::new(record, self.config);

        let mut hello = self.client_hello()?;
        self.send_client_hello(&mut hs, &hello)?;

        self.set_state(ClientState::AwaitingServerHello);
        let mut verified = false;
        let server_hello = loop {
            let message = hs.receive_message()?;
            match message.msg_type {
                HandshakeType::HelloVerifyRequest if !verified => {
                    let (_, request) = all_consuming(HelloVerifyRequest::parse)(&message.body[..])?;
                    debug!("HelloVerifyRequest with {} byte cookie", request.cookie.len());
                    verified = true;
                    hello.cookie = request.cookie.to_vec();
                    hs.reset_transcript();
                    self.send_client_hello(&mut hs, &hello)?;
                }
                HandshakeType::ServerHello => {
                    let (_, server_hello) = all_consuming(ServerHello::parse)(&message.body[..])?;
                    break server_hello;
                }
                other => {
                    return Err(Error::unexpected_message(format!(
                        "expected ServerHello, got {:?}",
                        other
                    )));
                }
            }
        };

        self.process_server_hello(&mut hs, &hello, &server_hello)?;

        let session = if self.resuming {
            self.resume(&mut hs)?
        } else {
            self.full_handshake(&mut hs)?
        };
        hs.finish()?;

        self.set_state(ClientState::Established);
        info!(
            "Client handshake complete: {:?}, resumed: {}",
            self.params.cipher_suite, self.resuming
        );
        self.peer.handshake_complete(&session);
        Ok(())
    }

    fn client_hello(&mut self) -> Result<ClientHello, Error> {
        let provider = self.config.crypto_provider();
        let version = ProtocolVersion::DTLS1_2;

        let cipher_suites: Vec<CipherSuite> = provider
            .cipher_suites
            .iter()
            .map(|s| s.suite())
            .filter(|s| s.is_valid_for_version(version))
            .collect();
        if cipher_suites.is_empty() {
            return Err(Error::ConfigError("no cipher suite for DTLS 1.2".into()));
        }

        let mut session_id = Vec::new();
        if let Some(session) = self.peer.session_to_resume() {
            match session.export_parameters() {
                Some(parameters)
                    if session.is_resumable() && cipher_suites.contains(&parameters.cipher_suite()) =>
                {
                    debug!("Offering session {:?}", session.session_id());
                    session_id = session.session_id().to_vec();
                    self.offered_session = Some((session, parameters));
                }
                _ => debug!("Session {:?} cannot be resumed", session.session_id()),
            }
        }

        let mut extensions = Extensions::new();
        extensions.add_renegotiation_info(&[]);
        extensions.add_extended_master_secret();
        if cipher_suites.iter().any(|s| s.uses_ecc()) {
            let groups: Vec<_> = provider.kx_groups.iter().map(|g| g.name()).collect();
            extensions.add_supported_groups(&groups);
            extensions.add_ec_point_formats(&[EC_POINT_FORMAT_UNCOMPRESSED]);
        }
        extensions.add_signature_algorithms(provider.signature_verification.supported_algorithms());
        if let Some(mfl) = self.config.max_fragment_length() {
            extensions.add_max_fragment_length(mfl.as_u8());
        }
        if self.config.session_tickets() {
            extensions.add_session_ticket(&[]);
        }
        for extension in self.peer.client_extensions().iter() {
            extensions.set(extension.extension_type, &extension.extension_data);
        }

        let random_bytes = provider.random_bytes(32)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&random_bytes);
        let random = Random::new(bytes);

        self.params.client_random = random;
        self.client_extensions = extensions.clone();

        Ok(ClientHello {
            client_version: version,
            random,
            session_id,
            cookie: Vec::new(),
            cipher_suites,
            compression_methods: vec![CompressionMethod::Null],
            extensions,
        })
    }

    fn send_client_hello<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
        hello: &ClientHello,
    ) -> Result<(), Error> {
        let mut body = Buf::new();
        hello.serialize(&mut body);
        hs.send_message(HandshakeType::ClientHello, &body)
    }

    fn process_server_hello<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
        hello: &ClientHello,
        server_hello: &ServerHello,
    ) -> Result<(), Error> {
        let version = server_hello.server_version;
        if !version.is_dtls() || version.is_later_than(hello.client_version) {
            return Err(Error::illegal_parameter(format!("server version {}", version)));
        }
        if ProtocolVersion::DTLS1_2.is_later_than(version) {
            return Err(Error::fatal(
                AlertDescription::ProtocolVersion,
                format!("server version {}", version),
            ));
        }
        if self.config.max_version().is_later_than(version)
            && server_hello.random.downgrade_sentinel().is_some()
        {
            return Err(Error::illegal_parameter("downgrade sentinel in server random"));
        }

        let suite = server_hello.cipher_suite;
        if !hello.offers_suite(suite) || suite.is_signaling() || suite.is_null() {
            return Err(Error::illegal_parameter(format!("server chose {:?}", suite)));
        }
        if server_hello.compression_method != CompressionMethod::Null {
            return Err(Error::illegal_parameter(format!(
                "server chose {:?}",
                server_hello.compression_method
            )));
        }
        let supported = self
            .config
            .crypto_provider()
            .find_cipher_suite(suite)
            .ok_or_else(|| Error::illegal_parameter(format!("{:?} is not supported", suite)))?;

        let extensions = &server_hello.extensions;
        for t in extensions.types() {
            if !self.client_extensions.contains(t) {
                return Err(Error::fatal(
                    AlertDescription::UnsupportedExtension,
                    format!("server sent {:?} unasked", t),
                ));
            }
        }

        self.resuming = match &self.offered_session {
            Some((session, _)) => {
                !server_hello.session_id.is_empty()
                    && server_hello.session_id[..] == session.session_id()[..]
            }
            None => false,
        };

        match extensions.renegotiation_info()? {
            Some(renegotiated) if renegotiated.is_empty() => {
                self.params.secure_renegotiation = true;
            }
            Some(_) => {
                return Err(Error::handshake_failure("renegotiation_info is not empty"));
            }
            None => {}
        }

        if self.resuming {
            let parameters = self
                .offered_session
                .as_ref()
                .map(|(_, p)| p.clone())
                .ok_or_else(|| Error::internal_error("resuming without a session"))?;
            if parameters.cipher_suite() != suite
                || parameters.compression() != server_hello.compression_method
            {
                return Err(Error::illegal_parameter("resumed session parameters differ"));
            }
            if !parameters.extended_master_secret() && self.config.require_extended_master_secret()
            {
                return Err(Error::handshake_failure(
                    "resumed session lacks extended_master_secret",
                ));
            }
            self.params.extended_master_secret = parameters.extended_master_secret();
            self.params.master_secret =
                Some(Zeroizing::new(parameters.master_secret().to_vec()));
            self.params.peer_certificate = parameters.peer_certificate().clone();
            self.params.local_certificate = parameters.local_certificate().clone();
            self.server_extensions = parameters.server_extensions().clone();
        } else {
            let ems = extensions.extended_master_secret()?;
            if !ems && self.config.require_extended_master_secret() {
                return Err(Error::handshake_failure("server did not negotiate extended_master_secret"));
            }
            self.params.extended_master_secret = ems;

            if let Some(code) = extensions.max_fragment_length()? {
                match self.config.max_fragment_length() {
                    Some(mfl) if mfl.as_u8() == code => {
                        self.params.max_fragment_length = Some(mfl);
                    }
                    _ => {
                        return Err(Error::illegal_parameter(format!(
                            "max_fragment_length code {}",
                            code
                        )));
                    }
                }
            }

            self.session_ticket = extensions.contains(ExtensionType::SessionTicket);
            self.status_request = match extensions.get(ExtensionType::StatusRequest) {
                Some([]) => true,
                Some(_) => return Err(Error::illegal_parameter("status_request is not empty")),
                None => false,
            };
            self.peer.process_server_extensions(extensions)?;
            self.server_extensions = extensions.clone();
        }

        self.params.version = Some(version);
        self.params.server_random = server_hello.random;
        self.params.session_id = server_hello.session_id;
        self.params.cipher_suite = Some(suite);
        self.params.prf_hash = Some(supported.hash_algorithm());
        self.suite = Some(supported);

        debug!("Server chose {:?}, resuming: {}", suite, self.resuming);
        hs.record().set_write_version(version);
        hs.notify_hello_complete(
            self.config.crypto_provider().hash_provider,
            supported.hash_algorithm(),
        )?;
        if let Some(mfl) = self.params.max_fragment_length {
            hs.record().set_plaintext_limit(mfl.plaintext_limit());
        }
        Ok(())
    }

    fn install_keys<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
    ) -> Result<(), Error> {
        let suite = self
            .suite
            .ok_or_else(|| Error::internal_error("no suite"))?;
        let master_secret = self
            .params
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::internal_error("no master secret"))?;
        let cipher = secrets::record_cipher(
            self.config.crypto_provider(),
            suite,
            master_secret,
            &self.params.client_random,
            &self.params.server_random,
            ConnectionEnd::Client,
        )?;
        hs.record().install_pending_epoch(Box::new(cipher))?;
        Ok(())
    }

    fn verify_data(&self, sender: ConnectionEnd, handshake_hash: &[u8]) -> Result<Vec<u8>, Error> {
        let master_secret = self
            .params
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::internal_error("no master secret"))?;
        let hash = self
            .params
            .prf_hash
            .ok_or_else(|| Error::internal_error("no prf hash"))?;
        secrets::verify_data(
            self.config.crypto_provider(),
            master_secret,
            sender,
            handshake_hash,
            hash,
        )
    }

    fn receive_server_finished<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
    ) -> Result<Vec<u8>, Error> {
        self.set_state(ClientState::AwaitingFinished);
        let expected = self.verify_data(ConnectionEnd::Server, &hs.current_hash()?)?;
        let received = hs.receive_message_body(HandshakeType::Finished)?;
        let verified: bool = expected.as_slice().ct_eq(&received[..]).into();
        if !verified {
            return Err(Error::decrypt_error("server Finished does not verify"));
        }
        Ok(expected)
    }

    fn send_finished<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
    ) -> Result<Vec<u8>, Error> {
        let local = self.verify_data(ConnectionEnd::Client, &hs.current_hash()?)?;
        hs.send_message(HandshakeType::Finished, &local)?;
        Ok(local)
    }

    fn resume<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
    ) -> Result<TlsSession, Error> {
        self.install_keys(hs)?;
        let peer = self.receive_server_finished(hs)?;
        let local = self.send_finished(hs)?;
        self.params.set_verify_data(&local, &peer, false);

        self.offered_session
            .as_ref()
            .map(|(session, _)| session.clone())
            .ok_or_else(|| Error::internal_error("resuming without a session"))
    }

    fn full_handshake<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
    ) -> Result<TlsSession, Error> {
        let provider = self.config.crypto_provider();
        let version = ProtocolVersion::DTLS1_2;
        let suite = self
            .suite
            .ok_or_else(|| Error::internal_error("no suite"))?;

        let mut key_exchange: Box<dyn KeyExchange> = match suite.key_exchange_algorithm() {
            KeyExchangeAlgorithm::EcdheEcdsa => Box::new(EcdheKeyExchange::new()),
            KeyExchangeAlgorithm::Provided => suite
                .create_key_exchange()
                .ok_or_else(|| Error::internal_error("suite provides no key exchange"))?,
        };
        let context = KeyExchangeContext {
            provider,
            version,
            client_random: self.params.client_random,
            server_random: self.params.server_random,
            offered_groups: self.client_extensions.supported_groups()?,
            offered_signature_algorithms: self.client_extensions.signature_algorithms()?,
        };

        self.set_state(ClientState::AwaitingServerHelloDone);
        let mut message = hs.receive_message()?;
        if message.msg_type == HandshakeType::SupplementalData {
            let (_, entries) = all_consuming(parse_supplemental_data)(&message.body[..])?;
            self.peer.process_server_supplemental_data(&entries)?;
            message = hs.receive_message()?;
        }

        let mut server_chain = CertificateChain::empty();
        if message.msg_type == HandshakeType::Certificate {
            let (_, certificate) = all_consuming(Certificate::parse)(&message.body[..])?;
            server_chain = certificate.chain;
            if server_chain.is_empty() {
                return Err(Error::fatal(
                    AlertDescription::BadCertificate,
                    "server sent an empty Certificate",
                ));
            }
            self.peer.verify_server_certificate(&server_chain)?;
            message = hs.receive_message()?;

            // The server may still decline to staple.
            if self.status_request && message.msg_type == HandshakeType::CertificateStatus {
                let (_, status) = all_consuming(CertificateStatus::parse)(&message.body[..])?;
                self.peer.notify_certificate_status(&status)?;
                message = hs.receive_message()?;
            }
        } else if suite.key_exchange_algorithm() == KeyExchangeAlgorithm::EcdheEcdsa {
            return Err(Error::unexpected_message(format!(
                "expected Certificate, got {:?}",
                message.msg_type
            )));
        }
        key_exchange.process_server_certificate(&server_chain)?;
        self.params.peer_certificate = server_chain.clone();

        if message.msg_type == HandshakeType::ServerKeyExchange {
            key_exchange.process_server_key_exchange(&context, &message.body)?;
            message = hs.receive_message()?;
        } else if key_exchange.requires_server_key_exchange() {
            return Err(Error::unexpected_message(format!(
                "expected ServerKeyExchange, got {:?}",
                message.msg_type
            )));
        }

        let mut certificate_request = None;
        if message.msg_type == HandshakeType::CertificateRequest {
            if server_chain.is_empty() {
                return Err(Error::handshake_failure(
                    "CertificateRequest from an anonymous server",
                ));
            }
            let (rest, request) =
                CertificateRequest::parse(&message.body, version.has_signature_algorithms())?;
            if !rest.is_empty() {
                return Err(Error::decode_error("trailing bytes after CertificateRequest"));
            }
            certificate_request = Some(request);
            message = hs.receive_message()?;
        }

        if message.msg_type != HandshakeType::ServerHelloDone {
            return Err(Error::unexpected_message(format!(
                "expected ServerHelloDone, got {:?}",
                message.msg_type
            )));
        }
        if !message.body.is_empty() {
            return Err(Error::decode_error("ServerHelloDone has a body"));
        }

        // Our flight
        if let Some(entries) = self.peer.supplemental_data() {
            let mut body = Buf::new();
            serialize_supplemental_data(&entries, &mut body);
            hs.send_message(HandshakeType::SupplementalData, &body)?;
        }

        let mut credentials: Option<Credentials> = None;
        if let Some(request) = &certificate_request {
            credentials = self.peer.credentials(request);
            let chain = credentials
                .as_ref()
                .map(|c| c.chain().clone())
                .unwrap_or_else(CertificateChain::empty);
            let mut body = Buf::new();
            Certificate::new(chain.clone()).serialize(&mut body);
            hs.send_message(HandshakeType::Certificate, &body)?;
            self.params.local_certificate = chain;
        }

        let body = key_exchange.generate_client_key_exchange(&context)?;
        hs.send_message(HandshakeType::ClientKeyExchange, &body)?;

        let snapshot = hs.prepare_to_finish()?;
        let session_hash = snapshot.hash();
        let pre_master_secret = key_exchange.generate_pre_master_secret()?;
        let master_secret = secrets::master_secret(
            provider,
            &pre_master_secret,
            suite.hash_algorithm(),
            self.params
                .extended_master_secret
                .then_some(&session_hash[..]),
            &self.params.client_random,
            &self.params.server_random,
        )?;
        self.params.session_hash = session_hash.to_vec();
        self.params.master_secret = Some(master_secret);
        self.install_keys(hs)?;

        let signer = credentials
            .as_ref()
            .filter(|c| !c.chain().is_empty())
            .map(|c| c.signer());
        if let Some(signer) = signer.filter(|_| key_exchange.requires_certificate_verify()) {
            let algorithm = signer.signature_and_hash();
            let acceptable = certificate_request
                .as_ref()
                .and_then(|r| r.supported_signature_algorithms.as_ref())
                .map(|algs| algs.contains(&algorithm))
                .unwrap_or(true);
            if !acceptable {
                return Err(Error::handshake_failure(format!(
                    "server does not accept {:?}",
                    algorithm
                )));
            }
            let mut signature = Buf::new();
            signer
                .sign(snapshot.messages(), &mut signature)
                .map_err(|e| Error::internal_error(format!("CertificateVerify: {}", e)))?;
            let mut body = Buf::new();
            DigitallySigned::new(algorithm, &signature).serialize(&mut body);
            hs.send_message(HandshakeType::CertificateVerify, &body)?;
        }

        let local = self.send_finished(hs)?;

        if self.session_ticket {
            self.set_state(ClientState::AwaitingNewSessionTicket);
            let body = hs.receive_message_body(HandshakeType::NewSessionTicket)?;
            let (_, ticket) = all_consuming(NewSessionTicket::parse)(&body[..])?;
            debug!("NewSessionTicket of {} bytes", ticket.ticket.len());
            self.peer.notify_session_ticket(&ticket);
        }

        let peer = self.receive_server_finished(hs)?;
        self.params.set_verify_data(&local, &peer, true);

        let parameters =
            SessionParameters::from_security_parameters(&self.params, self.server_extensions.clone())
                .ok_or_else(|| Error::internal_error("incomplete session parameters"))?;
        Ok(TlsSession::new(self.params.session_id, parameters))
    }
}
