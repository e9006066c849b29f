//! Handshake message reassembly and peer-flight tracking.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::buffer::Buf;
use crate::message::Header;
use crate::types::HandshakeType;

/// Largest handshake message the engine will buffer.
pub(crate) const MAX_HANDSHAKE_MESSAGE_LEN: usize = 1 << 18;

/// Split a handshake record into `(header, fragment)` pairs.
///
/// Stops at the first fragment whose header is malformed or whose bounds do
/// not fit its message.
pub(crate) fn handshake_fragments(mut payload: &[u8]) -> Vec<(Header, &[u8])> {
    let mut out = Vec::new();
    while !payload.is_empty() {
        let Ok((rest, header)) = Header::parse(payload) else {
            trace!("malformed handshake header");
            break;
        };
        let len = header.fragment_length as usize;
        let fits = (header.fragment_offset as u64 + len as u64) <= header.length as u64;
        if rest.len() < len || !fits {
            trace!("handshake fragment out of bounds: {:?}", header);
            break;
        }
        out.push((header, &rest[..len]));
        payload = &rest[len..];
    }
    out
}

/// Collects the fragments of one handshake message.
///
/// Fragments may arrive in any order, overlap or repeat. Fragments that
/// disagree with the message type or total length seen first are ignored.
#[derive(Debug)]
pub(crate) struct Reassembler {
    msg_type: HandshakeType,
    body: Buf,
    missing: Vec<Range<usize>>,
}

impl Reassembler {
    pub fn new(msg_type: HandshakeType, length: usize) -> Self {
        let mut body = Buf::with_capacity(length);
        body.resize(length, 0);
        Reassembler {
            msg_type,
            body,
            // A zero length message is complete as soon as any fragment shows up,
            // so it starts with a single empty gap.
            missing: vec![0..length],
        }
    }

    pub fn msg_type(&self) -> HandshakeType {
        self.msg_type
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Add one fragment. Returns false if it was inconsistent with the message.
    pub fn contribute(&mut self, header: &Header, fragment: &[u8]) -> bool {
        if header.msg_type != self.msg_type || header.length as usize != self.body.len() {
            return false;
        }
        let start = header.fragment_offset as usize;
        let end = start + fragment.len();
        if end > self.body.len() {
            return false;
        }

        if self.body.is_empty() {
            self.missing.clear();
            return true;
        }

        let mut still_missing = Vec::with_capacity(self.missing.len() + 1);
        for gap in self.missing.drain(..) {
            if gap.end <= start || gap.start >= end {
                still_missing.push(gap);
                continue;
            }
            let copy = gap.start.max(start)..gap.end.min(end);
            let src = copy.start - start..copy.end - start;
            self.body[copy.clone()].copy_from_slice(&fragment[src]);
            if gap.start < copy.start {
                still_missing.push(gap.start..copy.start);
            }
            if copy.end < gap.end {
                still_missing.push(copy.end..gap.end);
            }
        }
        self.missing = still_missing;
        true
    }

    /// Forget all received data, keeping type and length.
    pub fn reset(&mut self) {
        self.missing = vec![0..self.body.len()];
    }

    pub fn into_body(self) -> Buf {
        self.body
    }
}

/// The peer's most recent flight, kept to recognise a complete
/// retransmission of it.
///
/// Each time every message of the flight has been seen again, the caller
/// should resend its own flight once.
#[derive(Debug, Default)]
pub(crate) struct PeerFlight {
    messages: BTreeMap<u16, Reassembler>,
}

impl PeerFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a delivered message as part of the flight.
    pub fn record(&mut self, msg_type: HandshakeType, message_seq: u16, length: usize) {
        self.messages
            .insert(message_seq, Reassembler::new(msg_type, length));
    }

    /// Feed a fragment of an old message. Returns true when the whole flight
    /// has now been received again.
    pub fn observe(&mut self, header: &Header, fragment: &[u8]) -> bool {
        let Some(r) = self.messages.get_mut(&header.message_seq) else {
            return false;
        };
        if !r.contribute(header, fragment) {
            return false;
        }
        if self.messages.values().all(|r| r.is_complete()) {
            for r in self.messages.values_mut() {
                r.reset();
            }
            return true;
        }
        false
    }
}
