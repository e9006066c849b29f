use nom::IResult;

use super::opaque16;
use crate::buffer::Buf;
use crate::types::SignatureAndHashAlgorithm;

/// `digitally-signed` struct: algorithm pair followed by an opaque16 signature.
///
/// Used by ServerKeyExchange and as the whole CertificateVerify body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitallySigned {
    pub algorithm: SignatureAndHashAlgorithm,
    pub signature: Vec<u8>,
}

impl DigitallySigned {
    pub fn new(algorithm: SignatureAndHashAlgorithm, signature: &[u8]) -> Self {
        DigitallySigned {
            algorithm,
            signature: signature.to_vec(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], DigitallySigned> {
        let (input, algorithm) = SignatureAndHashAlgorithm::parse(input)?;
        let (input, signature) = opaque16(input)?;
        Ok((input, DigitallySigned::new(algorithm, signature)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.put_u16(self.algorithm.as_u16());
        output.put_opaque16(&self.signature);
    }
}
