//! DTLS 1.2 (RFC 6347) handshake and record engine.
//!
//! Layers, bottom up: [`record`] protects and frames records over a
//! [`DatagramTransport`](crate::DatagramTransport), [`reliable`] turns
//! records into an ordered stream of handshake messages with flight
//! retransmission, and the [`DtlsServer`] / [`DtlsClient`] state machines
//! drive the handshake. A completed handshake yields a [`DtlsTransport`].

mod client;
mod hash;
mod key_exchange;
mod reassembly;
mod record;
mod reliable;
mod secrets;
mod server;
mod session;
mod transport;
mod verifier;

pub use client::{ClientState, DtlsClient};
pub use key_exchange::{KeyExchange, KeyExchangeContext};
pub use server::{DtlsServer, ServerState};
pub use session::{SessionParameters, TlsSession};
pub use transport::DtlsTransport;
pub use verifier::HelloVerifier;
