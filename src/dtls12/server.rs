// DTLS 1.2 server handshake:
//
// 1. ClientHello, answered statelessly with HelloVerifyRequest until it
//    carries a valid cookie (optional)
// 2. ServerHello, then for a full handshake SupplementalData, Certificate,
//    CertificateStatus, ServerKeyExchange, CertificateRequest, ServerHelloDone
// 3. Client flight: SupplementalData, Certificate, ClientKeyExchange,
//    CertificateVerify, ChangeCipherSpec, Finished
// 4. NewSessionTicket, ChangeCipherSpec, Finished
//
// A resumed session skips 2b and 3a: ServerHello, ChangeCipherSpec and
// Finished go out together and the client answers with its Finished.

use std::time::Instant;

use nom::combinator::all_consuming;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::key_exchange::{EcdheKeyExchange, KeyExchange, KeyExchangeContext};
use super::reassembly::handshake_fragments;
use super::record::RecordLayer;
use super::reliable::{HandshakeMessage, ReliableHandshake};
use super::secrets;
use super::session::{SecurityParameters, SessionParameters, TlsSession};
use super::transport::DtlsTransport;
use super::verifier::HelloVerifier;
use crate::buffer::Buf;
use crate::certificate::{CertificateChain, Credentials};
use crate::config::{ClientAuth, Config, MaxFragmentLength};
use crate::crypto::{KeyExchangeAlgorithm, SupportedCipherSuite};
use crate::message::{parse_supplemental_data, serialize_supplemental_data};
use crate::message::{Certificate, CertificateRequest, CertificateStatus, ClientHello};
use crate::message::DigitallySigned;
use crate::message::{ExtensionType, Extensions, Header, HelloVerifyRequest, NewSessionTicket};
use crate::message::{Random, ServerHello, SessionId, DOWNGRADE_TLS11, DOWNGRADE_TLS12};
use crate::message::{EC_POINT_FORMAT_UNCOMPRESSED, HANDSHAKE_HEADER_LEN};
use crate::peer::ServerPeer;
use crate::transport::DatagramTransport;
use crate::types::{AlertDescription, AlertLevel, CipherSuite, CompressionMethod};
use crate::types::{ConnectionEnd, ContentType, HandshakeType, ProtocolVersion};
use crate::Error;

/// Where a server handshake is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    AwaitingClientHello,
    NegotiatingHello,
    AwaitingClientAuth,
    AwaitingKeyExchange,
    AwaitingFinished,
    Established,
    Aborted,
}

/// Accepts DTLS 1.2 connections.
///
/// One `DtlsServer` can accept any number of connections, one transport
/// each. The cookie secret is shared between them.
#[derive(Debug)]
pub struct DtlsServer {
    config: Config,
    verifier: HelloVerifier,
}

impl DtlsServer {
    pub fn new(config: Config) -> Result<Self, Error> {
        let verifier = HelloVerifier::new(config.crypto_provider())?;
        Ok(DtlsServer { config, verifier })
    }

    /// With an explicit cookie verifier, e.g. one secret across processes.
    pub fn with_verifier(config: Config, verifier: HelloVerifier) -> Self {
        DtlsServer { config, verifier }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a server handshake over `transport`.
    ///
    /// On failure the fatal alert (if any) has been sent, and a session
    /// being resumed has been invalidated.
    pub fn accept<T, P>(&self, peer: &mut P, transport: T) -> Result<DtlsTransport<T>, Error>
    where
        T: DatagramTransport,
        P: ServerPeer,
    {
        let credentials = peer.credentials();
        let provider = self.config.crypto_provider();
        let needs_credentials = provider
            .cipher_suites
            .iter()
            .all(|s| s.key_exchange_algorithm() == KeyExchangeAlgorithm::EcdheEcdsa);
        if credentials.is_none() && needs_credentials {
            return Err(Error::InvalidArgument(
                "every cipher suite needs server credentials".into(),
            ));
        }

        let mut record = RecordLayer::new(transport, &self.config)?;
        let mut handshake = ServerHandshake::new(&self.config, peer, credentials);

        match handshake.run(&mut record, &self.verifier) {
            Ok(()) => Ok(DtlsTransport::new(record)),
            Err(e) => Err(handshake.abort(&mut record, e)),
        }
    }
}

struct ServerHandshake<'c, P> {
    config: &'c Config,
    peer: &'c mut P,
    state: ServerState,
    params: SecurityParameters,
    credentials: Option<Credentials>,
    suite: Option<&'static dyn SupportedCipherSuite>,
    client_extensions: Extensions,
    server_extensions: Extensions,
    resumed: Option<TlsSession>,
    certificate_request: Option<CertificateRequest>,
    certificate_status: Option<CertificateStatus>,
    session_ticket: bool,
}

impl<'c, P: ServerPeer> ServerHandshake<'c, P> {
    fn new(config: &'c Config, peer: &'c mut P, credentials: Option<Credentials>) -> Self {
        ServerHandshake {
            config,
            peer,
            state: ServerState::AwaitingClientHello,
            params: SecurityParameters::new(ConnectionEnd::Server),
            credentials,
            suite: None,
            client_extensions: Extensions::new(),
            server_extensions: Extensions::new(),
            resumed: None,
            certificate_request: None,
            certificate_status: None,
            session_ticket: false,
        }
    }

    fn set_state(&mut self, state: ServerState) {
        debug!("Server {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn abort<T: DatagramTransport>(&mut self, record: &mut RecordLayer<T>, error: Error) -> Error {
        self.set_state(ServerState::Aborted);
        self.params.clear();
        if let Some(session) = self.resumed.take() {
            session.invalidate();
        }
        if let Some(description) = error.alert_to_send() {
            warn!("Server handshake failed: {}", error);
            if let Err(e) = record.send_alert(AlertLevel::Fatal, description) {
                debug!("Failed to send alert: {}", e);
            }
        } else {
            debug!("Server handshake failed: {}", error);
        }
        if let Err(e) = record.close() {
            debug!("Failed to close transport: {}", e);
        }
        error
    }

    fn run<T: DatagramTransport>(
        &mut self,
        record: &mut RecordLayer<T>,
        verifier: &HelloVerifier,
    ) -> Result<(), Error> {
        let first = if self.config.hello_verify_requests() {
            Some(self.await_verified_hello(record, verifier)?)
        } else {
            None
        };

        let mut hs = ReliableHandshake::new(record, self.config);
        let body = match first {
            Some(message) => {
                hs.start_with(&message)?;
                message.body
            }
            None => hs.receive_message_body(HandshakeType::ClientHello)?,
        };

        self.set_state(ServerState::NegotiatingHello);
        let (_, client_hello) = all_consuming(ClientHello::parse)(&body[..])?;
        let resumable = self.process_client_hello(&client_hello)?;
        self.send_server_hello(&mut hs, resumable.as_ref())?;

        let session = match resumable {
            Some((session, parameters)) => {
                self.resume(&mut hs, &parameters)?;
                session
            }
            None => self.full_handshake(&mut hs)?,
        };
        hs.finish()?;

        self.set_state(ServerState::Established);
        info!(
            "Server handshake complete: {:?}",
            self.params.cipher_suite
        );
        self.peer.handshake_complete(&session);
        Ok(())
    }

    /// Cookie exchange. Nothing is kept between the two ClientHellos.
    fn await_verified_hello<T: DatagramTransport>(
        &mut self,
        record: &mut RecordLayer<T>,
        verifier: &HelloVerifier,
    ) -> Result<HandshakeMessage, Error> {
        let deadline = Instant::now() + self.config.handshake_timeout();
        loop {
            let Some(received) = record.receive_record(deadline)? else {
                return Err(Error::Timeout("no ClientHello"));
            };
            if received.content_type != ContentType::Handshake || received.epoch != 0 {
                continue;
            }
            let fragments = handshake_fragments(&received.payload);
            let Some((header, body)) = fragments.first() else {
                continue;
            };
            if header.msg_type != HandshakeType::ClientHello || header.is_fragment() {
                trace!("Expected an unfragmented ClientHello, got {:?}", header);
                continue;
            }

            let (_, hello) = all_consuming(ClientHello::parse)(*body)?;
            check_hello_basics(&hello)?;

            if verifier.verify_cookie(&hello)? {
                debug!("ClientHello cookie verified");
                record.reset_after_hello_verify(received.sequence_number);
                return Ok(HandshakeMessage {
                    msg_type: HandshakeType::ClientHello,
                    message_seq: header.message_seq,
                    body: Buf::from_slice(body),
                });
            }

            let request = HelloVerifyRequest::new(verifier.generate_cookie(&hello)?);
            let mut message = Buf::new();
            request.serialize(&mut message);
            let mut payload = Buf::with_capacity(HANDSHAKE_HEADER_LEN + message.len());
            Header::whole(HandshakeType::HelloVerifyRequest, header.message_seq, message.len() as u32)
                .serialize(&mut payload);
            payload.extend_from_slice(&message);

            debug!("Sending HelloVerifyRequest");
            record.send_stateless_record(
                ContentType::Handshake,
                ProtocolVersion::DTLS1_0,
                received.sequence_number,
                &payload,
            )?;
        }
    }

    /// Validate the hello and decide between resumption and a full
    /// handshake. Nothing is sent yet.
    fn process_client_hello(
        &mut self,
        hello: &ClientHello,
    ) -> Result<Option<(TlsSession, SessionParameters)>, Error> {
        check_hello_basics(hello)?;

        if ProtocolVersion::DTLS1_2.is_later_than(hello.client_version) {
            return Err(Error::fatal(
                AlertDescription::ProtocolVersion,
                format!("client offers {}", hello.client_version),
            ));
        }
        let version = ProtocolVersion::DTLS1_2;

        if !hello.compression_methods.contains(&CompressionMethod::Null) {
            return Err(Error::handshake_failure("null compression not offered"));
        }

        if hello.offers_suite(CipherSuite::TLS_FALLBACK_SCSV)
            && self.config.max_version().is_later_than(hello.client_version)
        {
            return Err(Error::fatal(
                AlertDescription::InappropriateFallback,
                "fallback SCSV below our highest version",
            ));
        }

        let extensions = &hello.extensions;
        self.peer.process_client_extensions(extensions)?;

        self.params.secure_renegotiation = match extensions.renegotiation_info()? {
            Some(renegotiated) if renegotiated.is_empty() => true,
            Some(_) => {
                return Err(Error::handshake_failure("renegotiation_info is not empty"));
            }
            None => hello.offers_suite(CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV),
        };

        let ems = extensions.extended_master_secret()?;
        if !ems && self.config.require_extended_master_secret() {
            return Err(Error::handshake_failure("extended_master_secret required"));
        }

        if let Some(code) = extensions.max_fragment_length()? {
            let mfl = MaxFragmentLength::from_u8(code).ok_or_else(|| {
                Error::illegal_parameter(format!("max_fragment_length code {}", code))
            })?;
            self.params.max_fragment_length = Some(mfl);
        }

        self.params.version = Some(version);
        self.params.client_random = hello.random;
        self.params.extended_master_secret = ems;
        self.client_extensions = extensions.clone();

        let resumable = self.find_resumable(hello, ems)?;
        let suite = match &resumable {
            Some((_, parameters)) => parameters.cipher_suite(),
            None => self
                .peer
                .select_cipher_suite(
                    &hello.cipher_suites,
                    self.config.crypto_provider(),
                    version,
                    self.credentials.is_some(),
                )
                .ok_or_else(|| Error::handshake_failure("no cipher suite in common"))?,
        };

        if !hello.offers_suite(suite)
            || suite.is_null()
            || suite.is_signaling()
            || !suite.is_valid_for_version(version)
        {
            return Err(Error::internal_error(format!("selected {:?}", suite)));
        }
        let supported = self
            .config
            .crypto_provider()
            .find_cipher_suite(suite)
            .ok_or_else(|| Error::internal_error(format!("{:?} has no implementation", suite)))?;

        debug!("Selected {:?}, resuming: {}", suite, resumable.is_some());
        self.suite = Some(supported);
        self.params.cipher_suite = Some(suite);
        self.params.prf_hash = Some(supported.hash_algorithm());
        Ok(resumable)
    }

    fn find_resumable(
        &mut self,
        hello: &ClientHello,
        ems: bool,
    ) -> Result<Option<(TlsSession, SessionParameters)>, Error> {
        if hello.session_id.is_empty() {
            return Ok(None);
        }
        let Ok(id) = SessionId::try_new(&hello.session_id) else {
            return Ok(None);
        };
        let Some(session) = self.peer.resumable_session(&id) else {
            return Ok(None);
        };
        let Some(parameters) = session.export_parameters() else {
            return Ok(None);
        };

        if !hello.offers_suite(parameters.cipher_suite())
            || !hello.compression_methods.contains(&parameters.compression())
            || parameters.version() != ProtocolVersion::DTLS1_2
        {
            debug!("Cached session does not fit the ClientHello");
            return Ok(None);
        }
        if parameters.extended_master_secret() && !ems {
            // RFC 7627 5.3
            return Err(Error::handshake_failure(
                "session used extended_master_secret, resumption does not",
            ));
        }
        if !parameters.extended_master_secret() && ems {
            debug!("Cached session lacks extended_master_secret, full handshake");
            return Ok(None);
        }
        Ok(Some((session, parameters)))
    }

    fn send_server_hello<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
        resumable: Option<&(TlsSession, SessionParameters)>,
    ) -> Result<(), Error> {
        let provider = self.config.crypto_provider();
        let version = ProtocolVersion::DTLS1_2;
        let suite = self
            .suite
            .ok_or_else(|| Error::internal_error("no suite before ServerHello"))?;

        let random_bytes = provider.random_bytes(32)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&random_bytes);
        let mut random = Random::new(bytes);
        if self.config.max_version().is_later_than(version) {
            let sentinel = if version == ProtocolVersion::DTLS1_2 {
                &DOWNGRADE_TLS12
            } else {
                &DOWNGRADE_TLS11
            };
            random.set_downgrade_sentinel(sentinel);
        }
        self.params.server_random = random;

        let session_id = match resumable {
            Some((session, _)) => *session.session_id(),
            None => {
                let seed = provider.random_bytes(32)?;
                self.peer.new_session_id(&seed)
            }
        };
        self.params.session_id = session_id;

        let mut extensions = Extensions::new();
        if resumable.is_none() {
            if self.params.secure_renegotiation {
                extensions.add_renegotiation_info(&[]);
            }
            if self.params.extended_master_secret {
                extensions.add_extended_master_secret();
            }
            if suite.suite().uses_ecc()
                && self.client_extensions.contains(ExtensionType::EcPointFormats)
            {
                extensions.add_ec_point_formats(&[EC_POINT_FORMAT_UNCOMPRESSED]);
            }
            if let Some(mfl) = self.params.max_fragment_length {
                extensions.add_max_fragment_length(mfl.as_u8());
            }
            if self.config.session_tickets()
                && self.client_extensions.contains(ExtensionType::SessionTicket)
            {
                extensions.add_session_ticket(&[]);
                self.session_ticket = true;
            }
            let has_chain = self
                .credentials
                .as_ref()
                .map_or(false, |c| !c.chain().is_empty());
            if has_chain && self.client_extensions.status_request_ocsp() {
                if let Some(status) = self.peer.certificate_status() {
                    // RFC 6066 8: the echo is empty.
                    extensions.set(ExtensionType::StatusRequest, &[]);
                    self.certificate_status = Some(status);
                }
            }
            for extension in self.peer.server_extensions().iter() {
                extensions.set(extension.extension_type, &extension.extension_data);
            }

            for t in extensions.types() {
                // Secure renegotiation may have been signalled with the SCSV.
                let scsv = t == ExtensionType::RenegotiationInfo;
                if !self.client_extensions.contains(t) && !scsv {
                    return Err(Error::internal_error(format!(
                        "server extension {:?} was not offered",
                        t
                    )));
                }
            }
        }

        let server_hello = ServerHello {
            server_version: version,
            random,
            session_id,
            cipher_suite: suite.suite(),
            compression_method: CompressionMethod::Null,
            extensions: extensions.clone(),
        };
        let mut body = Buf::new();
        server_hello.serialize(&mut body);

        hs.record().set_write_version(version);
        hs.send_message(HandshakeType::ServerHello, &body)?;
        hs.notify_hello_complete(provider.hash_provider, suite.hash_algorithm())?;

        if let Some(mfl) = self.params.max_fragment_length {
            hs.record().set_plaintext_limit(mfl.plaintext_limit());
        }
        self.server_extensions = extensions;
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
            ConnectionEnd::Server,
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

    fn receive_client_finished<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
    ) -> Result<Vec<u8>, Error> {
        self.set_state(ServerState::AwaitingFinished);
        let expected = self.verify_data(ConnectionEnd::Client, &hs.current_hash()?)?;
        let received = hs.receive_message_body(HandshakeType::Finished)?;
        let verified: bool = expected.as_slice().ct_eq(&received[..]).into();
        if !verified {
            return Err(Error::decrypt_error("client Finished does not verify"));
        }
        Ok(expected)
    }

    fn send_finished<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
    ) -> Result<Vec<u8>, Error> {
        let local = self.verify_data(ConnectionEnd::Server, &hs.current_hash()?)?;
        hs.send_message(HandshakeType::Finished, &local)?;
        Ok(local)
    }

    fn resume<T: DatagramTransport>(
        &mut self,
        hs: &mut ReliableHandshake<'_, T>,
        parameters: &SessionParameters,
    ) -> Result<(), Error> {
        self.params.master_secret = Some(Zeroizing::new(parameters.master_secret().to_vec()));
        self.params.extended_master_secret = parameters.extended_master_secret();
        self.params.peer_certificate = parameters.peer_certificate().clone();
        self.params.local_certificate = parameters.local_certificate().clone();
        self.install_keys(hs)?;

        let local = self.send_finished(hs)?;
        let peer = self.receive_client_finished(hs)?;
        self.params.set_verify_data(&local, &peer, true);
        Ok(())
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

        if let Some(entries) = self.peer.supplemental_data() {
            let mut body = Buf::new();
            serialize_supplemental_data(&entries, &mut body);
            hs.send_message(HandshakeType::SupplementalData, &body)?;
        }

        match self.credentials.clone() {
            Some(credentials) => {
                let mut body = Buf::new();
                Certificate::new(credentials.chain().clone()).serialize(&mut body);
                hs.send_message(HandshakeType::Certificate, &body)?;
                if let Some(status) = self.certificate_status.take() {
                    let mut body = Buf::new();
                    status.serialize(&mut body);
                    hs.send_message(HandshakeType::CertificateStatus, &body)?;
                }
                key_exchange.process_server_credentials(&credentials)?;
                self.params.local_certificate = credentials.chain().clone();
            }
            None => key_exchange.skip_server_credentials()?,
        }

        if let Some(body) = key_exchange.generate_server_key_exchange(&context)? {
            hs.send_message(HandshakeType::ServerKeyExchange, &body)?;
        } else if key_exchange.requires_server_key_exchange() {
            return Err(Error::internal_error("key exchange produced no ServerKeyExchange"));
        }

        if self.credentials.is_some() {
            let request = self
                .peer
                .certificate_request(self.config.client_auth(), version, provider);
            if let Some(request) = request {
                if request.supported_signature_algorithms.is_some()
                    != version.has_signature_algorithms()
                {
                    return Err(Error::internal_error(
                        "CertificateRequest signature algorithms do not fit the version",
                    ));
                }
                let mut body = Buf::new();
                request.serialize(&mut body);
                hs.send_message(HandshakeType::CertificateRequest, &body)?;
                self.certificate_request = Some(request);
            }
        }

        hs.send_message(HandshakeType::ServerHelloDone, &[])?;

        // Client flight
        self.set_state(ServerState::AwaitingClientAuth);
        let mut message = hs.receive_message()?;
        if message.msg_type == HandshakeType::SupplementalData {
            let (_, entries) = all_consuming(parse_supplemental_data)(&message.body[..])?;
            self.peer.process_client_supplemental_data(&entries)?;
            message = hs.receive_message()?;
        }

        let mut client_chain = CertificateChain::empty();
        if self.certificate_request.is_some() {
            if message.msg_type == HandshakeType::Certificate {
                let (_, certificate) = all_consuming(Certificate::parse)(&message.body[..])?;
                client_chain = certificate.chain;
                message = hs.receive_message()?;
            } else if version.has_signature_algorithms() {
                return Err(Error::unexpected_message(format!(
                    "expected Certificate, got {:?}",
                    message.msg_type
                )));
            }
            if client_chain.is_empty() && self.config.client_auth() == ClientAuth::Required {
                return Err(Error::handshake_failure("client certificate required"));
            }
            self.peer.notify_client_certificate(&client_chain)?;
            self.params.peer_certificate = client_chain.clone();
        }

        self.set_state(ServerState::AwaitingKeyExchange);
        if message.msg_type != HandshakeType::ClientKeyExchange {
            return Err(Error::unexpected_message(format!(
                "expected ClientKeyExchange, got {:?}",
                message.msg_type
            )));
        }
        key_exchange.process_client_key_exchange(&context, &message.body)?;

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

        if !client_chain.is_empty() && key_exchange.requires_certificate_verify() {
            let body = hs.receive_message_body(HandshakeType::CertificateVerify)?;
            let (_, signed) = all_consuming(DigitallySigned::parse)(&body[..])?;
            let offered = self
                .certificate_request
                .as_ref()
                .and_then(|r| r.supported_signature_algorithms.as_ref())
                .map(|algs| algs.contains(&signed.algorithm))
                .unwrap_or(true);
            if !offered {
                return Err(Error::illegal_parameter(format!(
                    "CertificateVerify with {:?}",
                    signed.algorithm
                )));
            }
            let leaf = client_chain
                .leaf()
                .ok_or_else(|| Error::internal_error("empty client chain"))?;
            provider
                .signature_verification
                .verify_signature(
                    leaf,
                    snapshot.messages(),
                    &signed.signature,
                    signed.algorithm.hash,
                    signed.algorithm.signature,
                )
                .map_err(|e| Error::decrypt_error(format!("CertificateVerify: {}", e)))?;
        }

        let peer = self.receive_client_finished(hs)?;

        if self.session_ticket {
            let ticket = self
                .peer
                .new_session_ticket()
                .unwrap_or_else(|| NewSessionTicket::new(0, &[]));
            let mut body = Buf::new();
            ticket.serialize(&mut body);
            hs.send_message(HandshakeType::NewSessionTicket, &body)?;
        }

        let local = self.send_finished(hs)?;
        self.params.set_verify_data(&local, &peer, false);

        let parameters =
            SessionParameters::from_security_parameters(&self.params, self.server_extensions.clone())
                .ok_or_else(|| Error::internal_error("incomplete session parameters"))?;
        Ok(TlsSession::new(self.params.session_id, parameters))
    }
}

/// Checks made before any cryptography, including on a hello that is only
/// answered with a HelloVerifyRequest.
fn check_hello_basics(hello: &ClientHello) -> Result<(), Error> {
    if !hello.client_version.is_dtls() {
        return Err(Error::illegal_parameter(format!(
            "ClientHello version {}",
            hello.client_version
        )));
    }
    if hello.session_id.len() > SessionId::MAX_LEN {
        return Err(Error::illegal_parameter(format!(
            "session_id of {} bytes",
            hello.session_id.len()
        )));
    }
    Ok(())
}
