use nom::IResult;

use super::Cookie;
use crate::buffer::Buf;
use crate::types::ProtocolVersion;

/// HelloVerifyRequest body (RFC 6347 4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn new(cookie: Cookie) -> Self {
        // RFC 6347: DTLS 1.0 regardless of the version about to be negotiated.
        HelloVerifyRequest {
            server_version: ProtocolVersion::DTLS1_0,
            cookie,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;
        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.server_version.serialize(output);
        self.cookie.serialize(output);
    }
}
