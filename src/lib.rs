//! Blocking DTLS 1.2 engine over pluggable datagram transports.
//!
//! ```no_run
//! # use std::net::UdpSocket;
//! # use std::time::Duration;
//! # use dtls_engine::*;
//! struct Accept;
//! impl ClientPeer for Accept {
//!     fn verify_server_certificate(&mut self, _chain: &CertificateChain) -> Result<(), Error> {
//!         Ok(())
//!     }
//! }
//!
//! let socket = UdpSocket::bind("0.0.0.0:0")?;
//! socket.connect("127.0.0.1:4444")?;
//! let transport = UdpTransport::new(socket, 1200)?;
//!
//! let client = DtlsClient::new(Config::builder().build()?);
//! let mut dtls = client.connect(&mut Accept, transport)?;
//! dtls.send(b"hello")?;
//!
//! let mut buf = [0; 2048];
//! if let Some(n) = dtls.receive(&mut buf, Duration::from_secs(1))? {
//!     println!("{:?}", &buf[..n]);
//! }
//! dtls.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod buffer;
mod certificate;
mod config;
pub mod crypto;
mod dtls12;
mod error;
pub mod message;
mod peer;
mod rng;
mod timer;
mod transport;
pub mod types;
mod util;
mod window;

pub use certificate::{CertificateChain, Credentials};
#[cfg(feature = "rcgen")]
pub use certificate::{generate_self_signed_certificate, DtlsCertificate};
pub use config::{ClientAuth, Config, ConfigBuilder, MaxFragmentLength};
pub use dtls12::{ClientState, DtlsClient, DtlsServer, DtlsTransport, HelloVerifier};
pub use dtls12::{KeyExchange, KeyExchangeContext, ServerState, SessionParameters, TlsSession};
pub use error::Error;
pub use peer::{ClientPeer, ServerPeer};
pub use transport::{DatagramTransport, UdpTransport};

pub use buffer::Buf;
