use nom::multi::many0;
use nom::IResult;
use tinyvec::ArrayVec;

use super::{opaque16, opaque8};
use crate::buffer::Buf;
use crate::types::{ClientCertificateType, SignatureAndHashAlgorithm};
use crate::util::{all_consuming_slice, many1};

/// CertificateRequest body.
///
/// `supported_signature_algorithms` exists on the wire from DTLS 1.2 on and
/// is `None` before it. Distinguished names are kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: ArrayVec<[ClientCertificateType; 8]>,
    pub supported_signature_algorithms: Option<Vec<SignatureAndHashAlgorithm>>,
    pub certificate_authorities: Vec<Vec<u8>>,
}

impl CertificateRequest {
    pub fn parse(input: &[u8], with_signature_algorithms: bool) -> IResult<&[u8], Self> {
        let (input, types) = opaque8(input)?;
        let (_, certificate_types) =
            all_consuming_slice(many1(ClientCertificateType::parse))(types)?;

        let (input, supported_signature_algorithms) = if with_signature_algorithms {
            let (input, algs) = opaque16(input)?;
            let (_, algs) = all_consuming_slice(many0(SignatureAndHashAlgorithm::parse))(algs)?;
            (input, Some(algs))
        } else {
            (input, None)
        };

        let (input, names) = opaque16(input)?;
        let (_, names) = all_consuming_slice(many0(opaque16))(names)?;

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                supported_signature_algorithms,
                certificate_authorities: names.into_iter().map(|n| n.to_vec()).collect(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.certificate_types.len() as u8);
        for t in &self.certificate_types {
            output.push(t.as_u8());
        }

        if let Some(algs) = &self.supported_signature_algorithms {
            output.put_u16((algs.len() * 2) as u16);
            for a in algs {
                output.put_u16(a.as_u16());
            }
        }

        let mut names = Buf::new();
        for n in &self.certificate_authorities {
            names.put_opaque16(n);
        }
        output.put_opaque16(&names);
    }
}
