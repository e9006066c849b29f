use std::time::Duration;

use crate::crypto::CryptoProvider;
use crate::types::ProtocolVersion;
use crate::Error;

#[cfg(feature = "rust-crypto")]
use crate::crypto::rust_crypto;

// Record header (13) + handshake header (12) + at least one body byte.
const MIN_MTU: usize = 13 + 12 + 1 + 28;

/// Whether a server asks the client for a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    /// No CertificateRequest is sent.
    #[default]
    Disabled,
    /// A CertificateRequest is sent; an empty client chain is accepted.
    Requested,
    /// A CertificateRequest is sent; an empty client chain is fatal.
    Required,
}

/// RFC 6066 max_fragment_length codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFragmentLength {
    L512,
    L1024,
    L2048,
    L4096,
}

impl MaxFragmentLength {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::L512),
            2 => Some(Self::L1024),
            3 => Some(Self::L2048),
            4 => Some(Self::L4096),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::L512 => 1,
            Self::L1024 => 2,
            Self::L2048 => 3,
            Self::L4096 => 4,
        }
    }

    /// Plaintext limit in bytes.
    pub fn plaintext_limit(&self) -> usize {
        1 << (8 + self.as_u8() as usize)
    }
}

/// DTLS configuration.
#[derive(Clone)]
pub struct Config {
    mtu: usize,
    max_buffered_messages: usize,
    flight_start_rto: Duration,
    flight_max_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    client_auth: ClientAuth,
    require_extended_master_secret: bool,
    hello_verify_requests: bool,
    max_version: ProtocolVersion,
    max_fragment_length: Option<MaxFragmentLength>,
    session_tickets: bool,
    fatal_bad_record_mac: bool,
    final_flight_expiry: Duration,
    rng_seed: Option<u64>,
    crypto_provider: CryptoProvider,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            mtu: 1150,
            max_buffered_messages: 16,
            flight_start_rto: Duration::from_secs(1),
            flight_max_rto: Duration::from_secs(60),
            flight_retries: 4,
            handshake_timeout: Duration::from_secs(40),
            client_auth: ClientAuth::Disabled,
            require_extended_master_secret: true,
            hello_verify_requests: true,
            max_version: ProtocolVersion::DTLS1_2,
            max_fragment_length: None,
            session_tickets: false,
            fatal_bad_record_mac: false,
            final_flight_expiry: Duration::from_secs(240),
            rng_seed: None,
            crypto_provider: None,
        }
    }

    /// Max transmission unit.
    ///
    /// The largest datagram we produce, further capped by the transport's
    /// send limit.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Max number of future handshake messages buffered out of order.
    #[inline(always)]
    pub fn max_buffered_messages(&self) -> usize {
        self.max_buffered_messages
    }

    /// Time of first retransmission.
    ///
    /// Every flight restarts with this value. Doubled for every retry with
    /// a ±12.5% jitter.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Cap on the retransmission timeout.
    #[inline(always)]
    pub fn flight_max_rto(&self) -> Duration {
        self.flight_max_rto
    }

    /// Max number of retransmissions per flight.
    #[inline(always)]
    pub fn flight_retries(&self) -> usize {
        self.flight_retries
    }

    /// Timeout for the entire handshake, regardless of flights.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// For a server, whether to ask the client for a certificate.
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// Refuse peers that do not negotiate Extended Master Secret (rfc7627).
    #[inline(always)]
    pub fn require_extended_master_secret(&self) -> bool {
        self.require_extended_master_secret
    }

    /// For a server, demand a cookie round trip before committing state.
    #[inline(always)]
    pub fn hello_verify_requests(&self) -> bool {
        self.hello_verify_requests
    }

    /// Highest protocol version this endpoint claims.
    #[inline(always)]
    pub fn max_version(&self) -> ProtocolVersion {
        self.max_version
    }

    /// For a client, the max_fragment_length to request (rfc6066).
    #[inline(always)]
    pub fn max_fragment_length(&self) -> Option<MaxFragmentLength> {
        self.max_fragment_length
    }

    /// Offer or accept the session_ticket extension (rfc5077).
    #[inline(always)]
    pub fn session_tickets(&self) -> bool {
        self.session_tickets
    }

    /// Treat an authentication failure of an encrypted record as fatal.
    #[inline(always)]
    pub fn fatal_bad_record_mac(&self) -> bool {
        self.fatal_bad_record_mac
    }

    /// How long the final flight is kept for retransmission after the handshake.
    #[inline(always)]
    pub fn final_flight_expiry(&self) -> Duration {
        self.final_flight_expiry
    }

    /// Seed for retransmission jitter. Protocol randomness is unaffected.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("mtu", &self.mtu)
            .field("flight_start_rto", &self.flight_start_rto)
            .field("flight_retries", &self.flight_retries)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("client_auth", &self.client_auth)
            .field("max_version", &self.max_version)
            .finish_non_exhaustive()
    }
}

/// Builder for DTLS configuration.
pub struct ConfigBuilder {
    mtu: usize,
    max_buffered_messages: usize,
    flight_start_rto: Duration,
    flight_max_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    client_auth: ClientAuth,
    require_extended_master_secret: bool,
    hello_verify_requests: bool,
    max_version: ProtocolVersion,
    max_fragment_length: Option<MaxFragmentLength>,
    session_tickets: bool,
    fatal_bad_record_mac: bool,
    final_flight_expiry: Duration,
    rng_seed: Option<u64>,
    crypto_provider: Option<CryptoProvider>,
}

impl ConfigBuilder {
    /// Set the max transmission unit (MTU).
    ///
    /// Defaults to 1150.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the max number of out-of-order handshake messages to buffer.
    ///
    /// Defaults to 16.
    pub fn max_buffered_messages(mut self, max: usize) -> Self {
        self.max_buffered_messages = max;
        self
    }

    /// Set the time of first retransmission.
    ///
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set the cap on the retransmission timeout.
    ///
    /// Defaults to 60 seconds.
    pub fn flight_max_rto(mut self, rto: Duration) -> Self {
        self.flight_max_rto = rto;
        self
    }

    /// Set the max number of retransmissions per flight.
    ///
    /// Defaults to 4.
    pub fn flight_retries(mut self, retries: usize) -> Self {
        self.flight_retries = retries;
        self
    }

    /// Set the timeout for the entire handshake.
    ///
    /// Defaults to 40 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set whether a server requests a client certificate.
    ///
    /// Defaults to [`ClientAuth::Disabled`].
    pub fn client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Set whether Extended Master Secret is mandatory.
    ///
    /// Defaults to true.
    pub fn require_extended_master_secret(mut self, require: bool) -> Self {
        self.require_extended_master_secret = require;
        self
    }

    /// Set whether a server performs the cookie exchange.
    ///
    /// Defaults to true.
    pub fn hello_verify_requests(mut self, enabled: bool) -> Self {
        self.hello_verify_requests = enabled;
        self
    }

    /// Set the highest protocol version claimed.
    ///
    /// Only DTLS 1.2 is negotiated. Claiming DTLS 1.3 makes a server that
    /// settles on 1.2 set the downgrade sentinel in its random.
    /// Defaults to DTLS 1.2.
    pub fn max_version(mut self, version: ProtocolVersion) -> Self {
        self.max_version = version;
        self
    }

    /// Set the max_fragment_length a client requests.
    ///
    /// Defaults to none.
    pub fn max_fragment_length(mut self, mfl: Option<MaxFragmentLength>) -> Self {
        self.max_fragment_length = mfl;
        self
    }

    /// Set whether session tickets are negotiated.
    ///
    /// Defaults to false.
    pub fn session_tickets(mut self, enabled: bool) -> Self {
        self.session_tickets = enabled;
        self
    }

    /// Set whether a record failing authentication is fatal.
    ///
    /// Defaults to false (such records are dropped).
    pub fn fatal_bad_record_mac(mut self, fatal: bool) -> Self {
        self.fatal_bad_record_mac = fatal;
        self
    }

    /// Set how long the final flight stays retransmittable.
    ///
    /// Defaults to 240 seconds (twice the default MSL).
    pub fn final_flight_expiry(mut self, expiry: Duration) -> Self {
        self.final_flight_expiry = expiry;
        self
    }

    /// Seed the jitter RNG for reproducible retransmission timing.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set a custom crypto provider.
    pub fn crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Build the configuration.
    ///
    /// The crypto provider is selected in this order:
    /// 1. Explicit provider set via [`ConfigBuilder::crypto_provider`]
    /// 2. Default installed via [`CryptoProvider::install_default`]
    /// 3. The RustCrypto provider (if the `rust-crypto` feature is enabled)
    ///
    /// Returns `Error::ConfigError` if no provider is available, the
    /// provider is unusable, or an option is out of range.
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .or_else(|| {
                #[cfg(feature = "rust-crypto")]
                {
                    Some(rust_crypto::default_provider())
                }
                #[cfg(not(feature = "rust-crypto"))]
                {
                    None
                }
            })
            .ok_or_else(|| {
                Error::ConfigError(
                    "no crypto provider: set one, install a default, \
                     or enable the rust-crypto feature"
                        .into(),
                )
            })?;

        crypto_provider.validate()?;

        if self.mtu < MIN_MTU {
            return Err(Error::ConfigError(format!(
                "mtu {} below minimum {}",
                self.mtu, MIN_MTU
            )));
        }
        if self.max_buffered_messages == 0 {
            return Err(Error::ConfigError("max_buffered_messages is 0".into()));
        }
        if self.flight_start_rto.is_zero() {
            return Err(Error::ConfigError("flight_start_rto is 0".into()));
        }
        if self.flight_max_rto < self.flight_start_rto {
            return Err(Error::ConfigError(
                "flight_max_rto below flight_start_rto".into(),
            ));
        }
        if !self.max_version.is_dtls()
            || self.max_version.is_later_than(ProtocolVersion::DTLS1_3)
            || ProtocolVersion::DTLS1_2.is_later_than(self.max_version)
        {
            return Err(Error::ConfigError(format!(
                "unsupported max_version {:?}",
                self.max_version
            )));
        }

        Ok(Config {
            mtu: self.mtu,
            max_buffered_messages: self.max_buffered_messages,
            flight_start_rto: self.flight_start_rto,
            flight_max_rto: self.flight_max_rto,
            flight_retries: self.flight_retries,
            handshake_timeout: self.handshake_timeout,
            client_auth: self.client_auth,
            require_extended_master_secret: self.require_extended_master_secret,
            hello_verify_requests: self.hello_verify_requests,
            max_version: self.max_version,
            max_fragment_length: self.max_fragment_length,
            session_tickets: self.session_tickets,
            fatal_bad_record_mac: self.fatal_bad_record_mac,
            final_flight_expiry: self.final_flight_expiry,
            rng_seed: self.rng_seed,
            crypto_provider,
        })
    }
}
