use nom::multi::many0;
use nom::IResult;

use super::opaque24;
use crate::buffer::Buf;
use crate::certificate::CertificateChain;
use crate::util::all_consuming_slice;

/// Certificate body: `certificate_list<0..2^24-1>` of `opaque ASN.1Cert<1..2^24-1>`.
///
/// An empty list is how a client says it has no certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub chain: CertificateChain,
}

impl Certificate {
    pub fn new(chain: CertificateChain) -> Self {
        Certificate { chain }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Certificate> {
        let (input, list) = opaque24(input)?;
        let (_, certs) = all_consuming_slice(many0(opaque24))(list)?;
        let chain = CertificateChain::new(certs.into_iter().map(|c| c.to_vec()).collect());
        Ok((input, Certificate { chain }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        let mut list = Buf::new();
        for cert in self.chain.certs() {
            list.put_opaque24(cert);
        }
        output.put_opaque24(&list);
    }
}
