use nom::bytes::complete::take;
use nom::IResult;

use crate::buffer::Buf;

/// 32 byte hello random. The first four bytes are nominally `gmt_unix_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Random(pub [u8; 32]);

/// Last eight bytes of a server random that settled on DTLS 1.2 while
/// supporting something newer (RFC 8446 4.1.3).
pub const DOWNGRADE_TLS12: [u8; 8] = *b"DOWNGRD\x01";

/// As [`DOWNGRADE_TLS12`], for a negotiation below DTLS 1.2.
pub const DOWNGRADE_TLS11: [u8; 8] = *b"DOWNGRD\x00";

impl Random {
    /// Build from 32 bytes of provider randomness with the current time up front.
    pub fn new(mut bytes: [u8; 32]) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        bytes[..4].copy_from_slice(&now.to_be_bytes());
        Random(bytes)
    }

    pub fn gmt_unix_time(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Overwrite the trailing eight bytes with a downgrade sentinel.
    pub fn set_downgrade_sentinel(&mut self, sentinel: &[u8; 8]) {
        self.0[24..].copy_from_slice(sentinel);
    }

    pub fn downgrade_sentinel(&self) -> Option<&'static [u8; 8]> {
        let tail = &self.0[24..];
        if tail == DOWNGRADE_TLS12 {
            Some(&DOWNGRADE_TLS12)
        } else if tail == DOWNGRADE_TLS11 {
            Some(&DOWNGRADE_TLS11)
        } else {
            None
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, data) = take(32_usize)(input)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(data);
        Ok((input, Random(bytes)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.0);
    }
}
