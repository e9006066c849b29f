use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{ContentType, ProtocolVersion};
use crate::util::be_u48;

/// Length of the DTLS record header.
pub const RECORD_HEADER_LEN: usize = 13;

/// Largest plaintext fragment (2^14).
pub const MAX_PLAINTEXT_LEN: usize = 1 << 14;

/// Largest protected fragment accepted from the wire (2^14 + 2048).
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 2048;

/// Largest 48 bit record sequence number.
pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 48) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64,
    pub length: u16,
}

impl RecordHeader {
    /// Epoch and sequence number as the 64 bit value used for nonces and AAD.
    pub fn epoch_seq(&self) -> u64 {
        ((self.epoch as u64) << 48) | self.sequence_number
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = be_u8(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordHeader {
                content_type: ContentType::from_u8(content_type),
                version,
                epoch,
                sequence_number,
                length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.put_u16(self.epoch);
        output.put_u48(self.sequence_number);
        output.put_u16(self.length);
    }
}

/// One record as found in a datagram. The fragment is still protected.
#[derive(Debug, PartialEq, Eq)]
pub struct Record<'a> {
    pub header: RecordHeader,
    pub fragment: &'a [u8],
}

impl<'a> Record<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Record<'a>> {
        let (input, header) = RecordHeader::parse(input)?;
        let (input, fragment) = take(header.length as usize)(input)?;
        Ok((input, Record { header, fragment }))
    }
}
