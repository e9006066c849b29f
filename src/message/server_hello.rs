use nom::number::complete::be_u16;
use nom::IResult;

use super::{Extensions, Random, SessionId};
use crate::buffer::Buf;
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};

/// ServerHello body:
/// `version || random(32) || session_id<0..32> || cipher_suite(2) ||
/// compression(1) || [extensions]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: Extensions,
}

impl ServerHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = be_u16(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = Extensions::parse(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite: CipherSuite::from_u16(cipher_suite),
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        output.put_u16(self.cipher_suite.as_u16());
        output.push(self.compression_method.as_u8());
        self.extensions.serialize(output);
    }
}
