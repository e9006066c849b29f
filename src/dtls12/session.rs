//! Negotiated handshake state and resumable sessions.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use zeroize::{Zeroize, Zeroizing};

use crate::certificate::CertificateChain;
use crate::config::MaxFragmentLength;
use crate::message::{Extensions, Random, SessionId};
use crate::types::{CipherSuite, CompressionMethod, ConnectionEnd, HashAlgorithm};
use crate::types::ProtocolVersion;

/// Everything negotiated or derived by one handshake.
///
/// Owned by the running handshake. Cleared (secrets zeroized) when the
/// handshake aborts.
pub(crate) struct SecurityParameters {
    pub entity: ConnectionEnd,
    pub version: Option<ProtocolVersion>,
    pub cipher_suite: Option<CipherSuite>,
    pub compression: CompressionMethod,
    pub client_random: Random,
    pub server_random: Random,
    pub extended_master_secret: bool,
    pub secure_renegotiation: bool,
    pub master_secret: Option<Zeroizing<Vec<u8>>>,
    pub local_verify_data: Vec<u8>,
    pub peer_verify_data: Vec<u8>,
    pub session_hash: Vec<u8>,
    pub prf_hash: Option<HashAlgorithm>,
    pub max_fragment_length: Option<MaxFragmentLength>,
    pub tls_unique: Vec<u8>,
    pub session_id: SessionId,
    pub local_certificate: CertificateChain,
    pub peer_certificate: CertificateChain,
}

impl SecurityParameters {
    pub fn new(entity: ConnectionEnd) -> Self {
        SecurityParameters {
            entity,
            version: None,
            cipher_suite: None,
            compression: CompressionMethod::Null,
            client_random: Random::default(),
            server_random: Random::default(),
            extended_master_secret: false,
            secure_renegotiation: false,
            master_secret: None,
            local_verify_data: Vec::new(),
            peer_verify_data: Vec::new(),
            session_hash: Vec::new(),
            prf_hash: None,
            max_fragment_length: None,
            tls_unique: Vec::new(),
            session_id: SessionId::empty(),
            local_certificate: CertificateChain::empty(),
            peer_certificate: CertificateChain::empty(),
        }
    }

    /// Record a completed Finished exchange. `tls_unique` is the first
    /// Finished of the handshake.
    pub fn set_verify_data(&mut self, local: &[u8], peer: &[u8], local_first: bool) {
        self.local_verify_data = local.to_vec();
        self.peer_verify_data = peer.to_vec();
        self.tls_unique = if local_first { local } else { peer }.to_vec();
    }

    /// Forget everything secret.
    pub fn clear(&mut self) {
        self.master_secret = None;
        self.local_verify_data.zeroize();
        self.peer_verify_data.zeroize();
        self.session_hash.zeroize();
        self.tls_unique.zeroize();
    }
}

impl Drop for SecurityParameters {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SecurityParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityParameters")
            .field("entity", &self.entity)
            .field("version", &self.version)
            .field("cipher_suite", &self.cipher_suite)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("secure_renegotiation", &self.secure_renegotiation)
            .field("max_fragment_length", &self.max_fragment_length)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// What a later handshake needs to resume a session.
#[derive(Clone)]
pub struct SessionParameters {
    cipher_suite: CipherSuite,
    compression: CompressionMethod,
    master_secret: Zeroizing<Vec<u8>>,
    peer_certificate: CertificateChain,
    local_certificate: CertificateChain,
    server_extensions: Extensions,
    version: ProtocolVersion,
    extended_master_secret: bool,
}

impl SessionParameters {
    pub(crate) fn from_security_parameters(
        params: &SecurityParameters,
        server_extensions: Extensions,
    ) -> Option<Self> {
        Some(SessionParameters {
            cipher_suite: params.cipher_suite?,
            compression: params.compression,
            master_secret: params.master_secret.clone()?,
            peer_certificate: params.peer_certificate.clone(),
            local_certificate: params.local_certificate.clone(),
            server_extensions,
            version: params.version?,
            extended_master_secret: params.extended_master_secret,
        })
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    pub fn master_secret(&self) -> &[u8] {
        &self.master_secret
    }

    pub fn peer_certificate(&self) -> &CertificateChain {
        &self.peer_certificate
    }

    pub fn local_certificate(&self) -> &CertificateChain {
        &self.local_certificate
    }

    /// Extensions the server sent in the full handshake.
    pub fn server_extensions(&self) -> &Extensions {
        &self.server_extensions
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }
}

impl fmt::Debug for SessionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionParameters")
            .field("cipher_suite", &self.cipher_suite)
            .field("version", &self.version)
            .field("extended_master_secret", &self.extended_master_secret)
            .finish_non_exhaustive()
    }
}

/// A session id and its parameters, shared between the handshake that
/// created it and any cache holding it.
///
/// Invalidating a session drops its parameters for every holder.
#[derive(Clone)]
pub struct TlsSession {
    id: SessionId,
    parameters: Arc<Mutex<Option<SessionParameters>>>,
}

impl TlsSession {
    pub fn new(id: SessionId, parameters: SessionParameters) -> Self {
        TlsSession {
            id,
            parameters: Arc::new(Mutex::new(Some(parameters))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionParameters>> {
        self.parameters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    /// Whether the session can still be offered or accepted for resumption.
    pub fn is_resumable(&self) -> bool {
        !self.id.is_empty() && self.lock().is_some()
    }

    /// A copy of the parameters, unless invalidated.
    pub fn export_parameters(&self) -> Option<SessionParameters> {
        self.lock().clone()
    }

    pub fn invalidate(&self) {
        if self.lock().take().is_some() {
            debug!("Invalidated session {:?}", self.id);
        }
    }
}

impl fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSession")
            .field("id", &self.id)
            .field("resumable", &self.is_resumable())
            .finish()
    }
}
