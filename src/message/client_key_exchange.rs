use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use super::opaque8;
use crate::buffer::Buf;

/// ECDHE ClientKeyExchange body: the client's ephemeral point (`opaque8`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdheClientKeyExchange {
    pub public_point: Vec<u8>,
}

impl EcdheClientKeyExchange {
    pub fn new(public_point: &[u8]) -> Self {
        EcdheClientKeyExchange {
            public_point: public_point.to_vec(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], EcdheClientKeyExchange> {
        let (rest, point) = opaque8(input)?;
        if point.is_empty() {
            // An implicit (certificate-bound) point is not supported.
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        Ok((rest, EcdheClientKeyExchange::new(point)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.put_opaque8(&self.public_point);
    }
}
