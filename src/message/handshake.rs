use nom::number::complete::{be_u16, be_u24};
use nom::IResult;

use crate::buffer::Buf;
use crate::types::HandshakeType;

/// Length of the DTLS handshake header.
pub const HANDSHAKE_HEADER_LEN: usize = 12;

/// DTLS handshake header (RFC 6347 4.2.2).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    pub msg_type: HandshakeType,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl Header {
    /// Header of an unfragmented message.
    pub fn whole(msg_type: HandshakeType, message_seq: u16, length: u32) -> Self {
        Header {
            msg_type,
            length,
            message_seq,
            fragment_offset: 0,
            fragment_length: length,
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment_offset > 0 || self.fragment_length < self.length
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = HandshakeType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;

        Ok((
            input,
            Header {
                msg_type,
                length,
                message_seq,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.msg_type.as_u8());
        output.put_u24(self.length);
        output.put_u16(self.message_seq);
        output.put_u24(self.fragment_offset);
        output.put_u24(self.fragment_length);
    }
}
