use nom::number::complete::be_u32;
use nom::IResult;

use super::opaque16;
use crate::buffer::Buf;

/// NewSessionTicket body (RFC 5077 3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    pub lifetime_hint: u32,
    pub ticket: Vec<u8>,
}

impl NewSessionTicket {
    pub fn new(lifetime_hint: u32, ticket: &[u8]) -> Self {
        NewSessionTicket {
            lifetime_hint,
            ticket: ticket.to_vec(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NewSessionTicket> {
        let (input, lifetime_hint) = be_u32(input)?;
        let (input, ticket) = opaque16(input)?;
        Ok((input, NewSessionTicket::new(lifetime_hint, ticket)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.lifetime_hint.to_be_bytes());
        output.put_opaque16(&self.ticket);
    }
}
