//! Application policy hooks consulted during the handshake.
//!
//! The engine handles the protocol; these traits decide what to offer and
//! what to accept. Every method but
//! [`ClientPeer::verify_server_certificate`] has a default.

use crate::certificate::{CertificateChain, Credentials};
use crate::config::ClientAuth;
use crate::crypto::{CryptoProvider, KeyExchangeAlgorithm};
use crate::dtls12::TlsSession;
use crate::message::{
    CertificateRequest, CertificateStatus, Extensions, NewSessionTicket, SessionId,
};
use crate::message::SupplementalDataEntry;
use crate::types::{CipherSuite, ClientCertificateType, ProtocolVersion};
use crate::Error;

/// Server side policy.
pub trait ServerPeer {
    /// Certificate chain and key presented to clients.
    fn credentials(&mut self) -> Option<Credentials> {
        None
    }

    /// Pick a suite from the client's list.
    ///
    /// The default takes the provider's order of preference and skips
    /// suites that need credentials when there are none.
    fn select_cipher_suite(
        &mut self,
        offered: &[CipherSuite],
        provider: &CryptoProvider,
        version: ProtocolVersion,
        has_credentials: bool,
    ) -> Option<CipherSuite> {
        provider
            .cipher_suites
            .iter()
            .filter(|s| offered.contains(&s.suite()))
            .filter(|s| s.suite().is_valid_for_version(version))
            .find(|s| {
                has_credentials || s.key_exchange_algorithm() != KeyExchangeAlgorithm::EcdheEcdsa
            })
            .map(|s| s.suite())
    }

    /// The CertificateRequest to send, if any. Only asked when the server
    /// has credentials.
    fn certificate_request(
        &mut self,
        client_auth: ClientAuth,
        version: ProtocolVersion,
        provider: &CryptoProvider,
    ) -> Option<CertificateRequest> {
        if client_auth == ClientAuth::Disabled {
            return None;
        }
        let algorithms = version
            .has_signature_algorithms()
            .then(|| provider.signature_verification.supported_algorithms().to_vec());
        Some(CertificateRequest {
            certificate_types: [ClientCertificateType::ECDSA_SIGN].into_iter().collect(),
            supported_signature_algorithms: algorithms,
            certificate_authorities: Vec::new(),
        })
    }

    /// The client's chain, possibly empty. Returning an error aborts.
    fn notify_client_certificate(&mut self, _chain: &CertificateChain) -> Result<(), Error> {
        Ok(())
    }

    /// SupplementalData sent before the server Certificate (RFC 4680).
    fn supplemental_data(&mut self) -> Option<Vec<SupplementalDataEntry>> {
        None
    }

    /// OCSP response stapled after the server Certificate. Only asked on a
    /// full handshake with server credentials when the client sent
    /// status_request.
    fn certificate_status(&mut self) -> Option<CertificateStatus> {
        None
    }

    fn process_client_supplemental_data(
        &mut self,
        _entries: &[SupplementalDataEntry],
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Inspect the ClientHello extensions before negotiation.
    fn process_client_extensions(&mut self, _extensions: &Extensions) -> Result<(), Error> {
        Ok(())
    }

    /// Extra ServerHello extensions. Each must answer one the client sent.
    fn server_extensions(&mut self) -> Extensions {
        Extensions::new()
    }

    /// Ticket to issue when session_ticket was negotiated.
    fn new_session_ticket(&mut self) -> Option<NewSessionTicket> {
        None
    }

    /// Session id of a new session. An empty id makes it non-resumable.
    fn new_session_id(&mut self, random: &[u8]) -> SessionId {
        SessionId::try_new(random).unwrap_or_default()
    }

    /// A cached session the client asked to resume.
    fn resumable_session(&mut self, _session_id: &SessionId) -> Option<TlsSession> {
        None
    }

    fn handshake_complete(&mut self, _session: &TlsSession) {}
}

/// Client side policy.
pub trait ClientPeer {
    /// Accept or reject the server's chain (leaf first, never empty).
    fn verify_server_certificate(&mut self, chain: &CertificateChain) -> Result<(), Error>;

    /// Credentials to answer a CertificateRequest with. `None` sends an
    /// empty Certificate.
    fn credentials(&mut self, _request: &CertificateRequest) -> Option<Credentials> {
        None
    }

    /// A session to offer for resumption.
    fn session_to_resume(&mut self) -> Option<TlsSession> {
        None
    }

    /// Extra ClientHello extensions.
    fn client_extensions(&mut self) -> Extensions {
        Extensions::new()
    }

    fn process_server_extensions(&mut self, _extensions: &Extensions) -> Result<(), Error> {
        Ok(())
    }

    /// The stapled OCSP response, when the server sent one.
    fn notify_certificate_status(&mut self, _status: &CertificateStatus) -> Result<(), Error> {
        Ok(())
    }

    /// SupplementalData sent before the client Certificate (RFC 4680).
    fn supplemental_data(&mut self) -> Option<Vec<SupplementalDataEntry>> {
        None
    }

    fn process_server_supplemental_data(
        &mut self,
        _entries: &[SupplementalDataEntry],
    ) -> Result<(), Error> {
        Ok(())
    }

    fn notify_session_ticket(&mut self, _ticket: &NewSessionTicket) {}

    fn handshake_complete(&mut self, _session: &TlsSession) {}
}
