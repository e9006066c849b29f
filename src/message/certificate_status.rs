use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

use super::opaque24;
use crate::buffer::Buf;

/// CertificateStatusType for a single OCSP response.
pub const CERTIFICATE_STATUS_OCSP: u8 = 1;

/// CertificateStatus body (RFC 6066 8), carrying a DER OCSPResponse.
///
/// Only the `ocsp` status type is understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateStatus {
    pub ocsp_response: Vec<u8>,
}

impl CertificateStatus {
    pub fn ocsp(response: &[u8]) -> Self {
        CertificateStatus {
            ocsp_response: response.to_vec(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateStatus> {
        let (rest, status_type) = be_u8(input)?;
        if status_type != CERTIFICATE_STATUS_OCSP {
            return Err(Err::Failure(NomError::new(input, ErrorKind::Tag)));
        }
        let (rest, response) = opaque24(rest)?;
        if response.is_empty() {
            return Err(Err::Failure(NomError::new(input, ErrorKind::Verify)));
        }
        Ok((rest, CertificateStatus::ocsp(response)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(CERTIFICATE_STATUS_OCSP);
        output.put_opaque24(&self.ocsp_response);
    }
}
