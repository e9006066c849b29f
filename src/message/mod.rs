//! Wire codecs for DTLS 1.2 records and handshake bodies.
//!
//! Every type has a nom `parse` and a `serialize(&self, &mut Buf)` writer.
//! Parsers never allocate beyond the message they decode and fail on any
//! length field that overruns its container.

use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::IResult;

mod certificate;
mod certificate_request;
mod certificate_status;
mod client_hello;
mod client_key_exchange;
mod digitally_signed;
mod extension;
mod handshake;
mod hello_verify;
mod id;
mod new_session_ticket;
pub(crate) mod random;
mod record;
mod server_hello;
mod server_key_exchange;
mod supplemental_data;

pub use certificate::Certificate;
pub use certificate_request::CertificateRequest;
pub use certificate_status::{CertificateStatus, CERTIFICATE_STATUS_OCSP};
pub use client_hello::ClientHello;
pub use client_key_exchange::EcdheClientKeyExchange;
pub use digitally_signed::DigitallySigned;
pub use extension::{Extension, ExtensionType, Extensions, EC_POINT_FORMAT_UNCOMPRESSED};
pub use handshake::{Header, HANDSHAKE_HEADER_LEN};
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, InvalidLength, SessionId};
pub use new_session_ticket::NewSessionTicket;
pub use random::{Random, DOWNGRADE_TLS11, DOWNGRADE_TLS12};
pub use record::{Record, RecordHeader, MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN};
pub use record::{MAX_SEQUENCE_NUMBER, RECORD_HEADER_LEN};
pub use server_hello::ServerHello;
pub use server_key_exchange::{EcdhParams, EcdheServerKeyExchange};
pub use supplemental_data::{parse_supplemental_data, serialize_supplemental_data};
pub use supplemental_data::SupplementalDataEntry;

/// Length of the Finished verify_data for every DTLS 1.2 suite.
pub const VERIFY_DATA_LEN: usize = 12;

/// ChangeCipherSpec record body.
pub const CHANGE_CIPHER_SPEC: [u8; 1] = [1];

pub(crate) fn opaque8(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u8)(input)
}

pub(crate) fn opaque16(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u16)(input)
}

pub(crate) fn opaque24(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u24)(input)
}
