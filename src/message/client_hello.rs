use nom::error::{Error, ErrorKind};
use nom::multi::many1;
use nom::number::complete::be_u16;
use nom::{Err, IResult};

use super::{opaque16, opaque8, Extensions, Random};
use crate::buffer::Buf;
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};
use crate::util::all_consuming_slice;

/// ClientHello body.
///
/// `session_id` and `cookie` are kept as raw bytes so the server can tell an
/// over-long session id (illegal_parameter) apart from a malformed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: Vec<u8>,
    pub cookie: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<CompressionMethod>,
    pub extensions: Extensions,
}

impl ClientHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = opaque8(input)?;
        let (input, cookie) = opaque8(input)?;

        let (input, suites) = opaque16(input)?;
        if suites.len() < 2 || suites.len() % 2 != 0 {
            return Err(Err::Failure(Error::new(suites, ErrorKind::LengthValue)));
        }
        let (_, cipher_suites) = all_consuming_slice(many1(cipher_suite))(suites)?;

        let (input, methods) = opaque8(input)?;
        let (_, compression_methods) =
            all_consuming_slice(many1(CompressionMethod::parse))(methods)?;

        let (input, extensions) = Extensions::parse(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id: session_id.to_vec(),
                cookie: cookie.to_vec(),
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        output.put_opaque8(&self.session_id);
        output.put_opaque8(&self.cookie);
        output.put_u16((self.cipher_suites.len() * 2) as u16);
        for suite in &self.cipher_suites {
            output.put_u16(suite.as_u16());
        }
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }
        self.extensions.serialize(output);
    }

    pub fn offers_suite(&self, suite: CipherSuite) -> bool {
        self.cipher_suites.contains(&suite)
    }

    /// Fields a stateless cookie is bound to: random, session id and the
    /// raw cipher suite list.
    pub fn cookie_input(&self) -> Buf {
        let len = 32 + self.session_id.len() + self.cipher_suites.len() * 2;
        let mut out = Buf::with_capacity(len);
        self.random.serialize(&mut out);
        out.extend_from_slice(&self.session_id);
        for suite in &self.cipher_suites {
            out.put_u16(suite.as_u16());
        }
        out
    }
}

fn cipher_suite(input: &[u8]) -> IResult<&[u8], CipherSuite> {
    let (input, value) = be_u16(input)?;
    Ok((input, CipherSuite::from_u16(value)))
}
