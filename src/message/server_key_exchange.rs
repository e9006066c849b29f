use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

use super::{opaque8, DigitallySigned};
use crate::buffer::Buf;
use crate::types::{CurveType, NamedGroup};

/// `ServerECDHParams` (RFC 8422 5.4): named curve and the server's point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdhParams {
    pub group: NamedGroup,
    pub public_point: Vec<u8>,
}

impl EcdhParams {
    pub fn new(group: NamedGroup, public_point: &[u8]) -> Self {
        EcdhParams {
            group,
            public_point: public_point.to_vec(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], EcdhParams> {
        let (rest, curve_type) = be_u8(input)?;
        if CurveType::from_u8(curve_type) != CurveType::NamedCurve {
            return Err(Err::Failure(Error::new(input, ErrorKind::Verify)));
        }
        let (rest, group) = NamedGroup::parse(rest)?;
        let (rest, point) = opaque8(rest)?;
        if point.is_empty() {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        Ok((rest, EcdhParams::new(group, point)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(CurveType::NamedCurve.as_u8());
        output.put_u16(self.group.as_u16());
        output.put_opaque8(&self.public_point);
    }
}

/// ECDHE ServerKeyExchange body: the parameters and a signature over
/// `client_random || server_random || params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdheServerKeyExchange {
    pub params: EcdhParams,
    pub signed: DigitallySigned,
}

impl EcdheServerKeyExchange {
    pub fn parse(input: &[u8]) -> IResult<&[u8], EcdheServerKeyExchange> {
        let (input, params) = EcdhParams::parse(input)?;
        let (input, signed) = DigitallySigned::parse(input)?;
        Ok((input, EcdheServerKeyExchange { params, signed }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.params.serialize(output);
        self.signed.serialize(output);
    }
}
