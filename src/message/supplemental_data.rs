use nom::multi::many1;
use nom::number::complete::be_u16;
use nom::IResult;

use super::{opaque16, opaque24};
use crate::buffer::Buf;
use crate::util::all_consuming_slice;

/// One `SupplementalDataEntry` (RFC 4680).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplementalDataEntry {
    pub data_type: u16,
    pub data: Vec<u8>,
}

impl SupplementalDataEntry {
    pub fn new(data_type: u16, data: &[u8]) -> Self {
        SupplementalDataEntry {
            data_type,
            data: data.to_vec(),
        }
    }

    fn parse(input: &[u8]) -> IResult<&[u8], SupplementalDataEntry> {
        let (input, data_type) = be_u16(input)?;
        let (input, data) = opaque16(input)?;
        Ok((input, SupplementalDataEntry::new(data_type, data)))
    }
}

/// SupplementalData body: a non-empty `opaque24` list of entries.
pub fn parse_supplemental_data(input: &[u8]) -> IResult<&[u8], Vec<SupplementalDataEntry>> {
    let (input, list) = opaque24(input)?;
    let (_, entries) = all_consuming_slice(many1(SupplementalDataEntry::parse))(list)?;
    Ok((input, entries))
}

pub fn serialize_supplemental_data(entries: &[SupplementalDataEntry], output: &mut Buf) {
    let mut list = Buf::new();
    for e in entries {
        list.put_u16(e.data_type);
        list.put_opaque16(&e.data);
    }
    output.put_opaque24(&list);
}
