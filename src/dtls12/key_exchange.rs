//! Key exchange capability and the ECDHE_ECDSA implementation.

use std::fmt;

use nom::combinator::all_consuming;
use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::certificate::{CertificateChain, Credentials};
use crate::crypto::{ActiveKeyExchange, CryptoProvider};
use crate::message::{DigitallySigned, EcdhParams, EcdheClientKeyExchange};
use crate::message::{EcdheServerKeyExchange, Random};
use crate::types::{AlertDescription, NamedGroup, ProtocolVersion, SignatureAndHashAlgorithm};
use crate::Error;

/// What a key exchange may consult during one handshake.
///
/// Group and signature algorithm lists are always the ones the client
/// offered, on both sides. `None` means the extension was absent.
#[derive(Debug, Clone)]
pub struct KeyExchangeContext<'a> {
    pub provider: &'a CryptoProvider,
    pub version: ProtocolVersion,
    pub client_random: Random,
    pub server_random: Random,
    pub offered_groups: Option<Vec<NamedGroup>>,
    pub offered_signature_algorithms: Option<Vec<SignatureAndHashAlgorithm>>,
}

/// Establishes the pre-master secret of one handshake.
///
/// The handshake drives it in wire order: the server hands over its
/// credentials (or skips them), writes its ServerKeyExchange, reads the
/// ClientKeyExchange; the client mirrors that. After both contributions
/// are known, [`KeyExchange::generate_pre_master_secret`] is called once.
pub trait KeyExchange: Send + fmt::Debug {
    /// Server without credentials.
    fn skip_server_credentials(&mut self) -> Result<(), Error>;

    fn process_server_credentials(&mut self, credentials: &Credentials) -> Result<(), Error>;

    /// Client side: the server's chain, already accepted by the peer hook.
    /// Empty when the server sent no Certificate.
    fn process_server_certificate(&mut self, chain: &CertificateChain) -> Result<(), Error>;

    fn requires_server_key_exchange(&self) -> bool;

    fn generate_server_key_exchange(
        &mut self,
        context: &KeyExchangeContext<'_>,
    ) -> Result<Option<Buf>, Error>;

    fn process_server_key_exchange(
        &mut self,
        context: &KeyExchangeContext<'_>,
        body: &[u8],
    ) -> Result<(), Error>;

    fn generate_client_key_exchange(
        &mut self,
        context: &KeyExchangeContext<'_>,
    ) -> Result<Buf, Error>;

    fn process_client_key_exchange(
        &mut self,
        context: &KeyExchangeContext<'_>,
        body: &[u8],
    ) -> Result<(), Error>;

    /// Whether a client that sent a certificate must prove possession of
    /// its key with CertificateVerify.
    fn requires_certificate_verify(&self) -> bool {
        true
    }

    fn generate_pre_master_secret(&mut self) -> Result<Zeroizing<Vec<u8>>, Error>;
}

/// Ephemeral ECDH signed with the server's ECDSA key (RFC 8422).
#[derive(Default)]
pub(crate) struct EcdheKeyExchange {
    credentials: Option<Credentials>,
    server_chain: Option<CertificateChain>,
    active: Option<Box<dyn ActiveKeyExchange>>,
    peer_point: Option<Buf>,
}

impl EcdheKeyExchange {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&mut self, context: &KeyExchangeContext<'_>, group: NamedGroup) -> Result<&[u8], Error> {
        let kx_group = context
            .provider
            .find_kx_group(group)
            .ok_or_else(|| Error::internal_error(format!("no provider for {:?}", group)))?;
        let active = kx_group
            .start_exchange()
            .map_err(|e| Error::internal_error(format!("ecdh: {}", e)))?;
        Ok(self.active.insert(active).pub_key())
    }
}

impl fmt::Debug for EcdheKeyExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdheKeyExchange")
            .field("group", &self.active.as_ref().map(|a| a.group()))
            .field("has_peer_point", &self.peer_point.is_some())
            .finish()
    }
}

fn signed_params(context: &KeyExchangeContext<'_>, params: &EcdhParams) -> Buf {
    let mut data = Buf::new();
    context.client_random.serialize(&mut data);
    context.server_random.serialize(&mut data);
    params.serialize(&mut data);
    data
}

impl KeyExchange for EcdheKeyExchange {
    fn skip_server_credentials(&mut self) -> Result<(), Error> {
        Err(Error::handshake_failure("ECDHE_ECDSA needs server credentials"))
    }

    fn process_server_credentials(&mut self, credentials: &Credentials) -> Result<(), Error> {
        self.credentials = Some(credentials.clone());
        Ok(())
    }

    fn process_server_certificate(&mut self, chain: &CertificateChain) -> Result<(), Error> {
        if chain.is_empty() {
            return Err(Error::fatal(
                AlertDescription::BadCertificate,
                "ECDHE_ECDSA server sent no certificate",
            ));
        }
        self.server_chain = Some(chain.clone());
        Ok(())
    }

    fn requires_server_key_exchange(&self) -> bool {
        true
    }

    fn generate_server_key_exchange(
        &mut self,
        context: &KeyExchangeContext<'_>,
    ) -> Result<Option<Buf>, Error> {
        let provider_groups = context.provider.kx_groups.iter().map(|g| g.name());
        let group = match &context.offered_groups {
            Some(offered) => provider_groups.clone().find(|g| offered.contains(g)),
            None => provider_groups.clone().next(),
        }
        .ok_or_else(|| Error::handshake_failure("no common key exchange group"))?;

        let credentials = self
            .credentials
            .clone()
            .ok_or_else(|| Error::internal_error("ServerKeyExchange without credentials"))?;
        let algorithm = credentials.signer().signature_and_hash();
        if let Some(offered) = &context.offered_signature_algorithms {
            if !offered.contains(&algorithm) {
                return Err(Error::handshake_failure(format!(
                    "client does not accept {:?}",
                    algorithm
                )));
            }
        }

        let point = self.start(context, group)?;
        let params = EcdhParams::new(group, point);
        let mut signature = Buf::new();
        credentials
            .signer()
            .sign(&signed_params(context, &params), &mut signature)
            .map_err(|e| Error::internal_error(format!("sign: {}", e)))?;

        debug!("ServerKeyExchange in {:?} signed with {:?}", group, algorithm);
        let message = EcdheServerKeyExchange {
            params,
            signed: DigitallySigned::new(algorithm, &signature),
        };
        let mut body = Buf::new();
        message.serialize(&mut body);
        Ok(Some(body))
    }

    fn process_server_key_exchange(
        &mut self,
        context: &KeyExchangeContext<'_>,
        body: &[u8],
    ) -> Result<(), Error> {
        let (_, message) = all_consuming(EcdheServerKeyExchange::parse)(body)?;
        let group = message.params.group;
        let offered = context
            .offered_groups
            .as_ref()
            .map(|o| o.contains(&group))
            .unwrap_or(true);
        if !offered || context.provider.find_kx_group(group).is_none() {
            return Err(Error::illegal_parameter(format!("server chose {:?}", group)));
        }

        let algorithm = message.signed.algorithm;
        let offered = context
            .offered_signature_algorithms
            .as_ref()
            .map(|o| o.contains(&algorithm))
            .unwrap_or(true);
        if !offered {
            return Err(Error::illegal_parameter(format!("server signed with {:?}", algorithm)));
        }

        let leaf = self
            .server_chain
            .as_ref()
            .and_then(|c| c.leaf())
            .ok_or_else(|| Error::unexpected_message("ServerKeyExchange before Certificate"))?;
        context
            .provider
            .signature_verification
            .verify_signature(
                leaf,
                &signed_params(context, &message.params),
                &message.signed.signature,
                algorithm.hash,
                algorithm.signature,
            )
            .map_err(|e| Error::decrypt_error(format!("ServerKeyExchange signature: {}", e)))?;

        self.start(context, group)?;
        self.peer_point = Some(Buf::from_slice(&message.params.public_point));
        Ok(())
    }

    fn generate_client_key_exchange(
        &mut self,
        _context: &KeyExchangeContext<'_>,
    ) -> Result<Buf, Error> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| Error::internal_error("ClientKeyExchange before ServerKeyExchange"))?;
        let mut body = Buf::new();
        EcdheClientKeyExchange::new(active.pub_key()).serialize(&mut body);
        Ok(body)
    }

    fn process_client_key_exchange(
        &mut self,
        _context: &KeyExchangeContext<'_>,
        body: &[u8],
    ) -> Result<(), Error> {
        let (_, message) = all_consuming(EcdheClientKeyExchange::parse)(body)?;
        self.peer_point = Some(Buf::from_slice(&message.public_point));
        Ok(())
    }

    fn generate_pre_master_secret(&mut self) -> Result<Zeroizing<Vec<u8>>, Error> {
        let active = self
            .active
            .take()
            .ok_or_else(|| Error::internal_error("no ephemeral key"))?;
        let peer = self
            .peer_point
            .take()
            .ok_or_else(|| Error::internal_error("no peer point"))?;
        let mut shared = Buf::new();
        active
            .complete(&peer, &mut shared)
            .map_err(|e| Error::illegal_parameter(format!("ecdh: {}", e)))?;
        Ok(Zeroizing::new(shared.into_vec()))
    }
}
