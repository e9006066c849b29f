//! Reliable, ordered delivery of handshake messages over the record layer.
//!
//! Messages we send are grouped into flights. A flight is retransmitted as
//! a whole when the peer stays silent for one RTO, or when the peer sends
//! its previous flight again (it evidently lost ours). Inbound messages are
//! reassembled from fragments and delivered exactly once in `message_seq`
//! order.

use std::collections::BTreeMap;
use std::mem;
use std::time::{Duration, Instant};

use super::hash::{Transcript, TranscriptSnapshot};
use super::reassembly::{handshake_fragments, PeerFlight, Reassembler};
use super::reassembly::MAX_HANDSHAKE_MESSAGE_LEN;
use super::record::{ReceivedRecord, RecordLayer};
use crate::buffer::Buf;
use crate::config::Config;
use crate::crypto::HashProvider;
use crate::message::Header;
use crate::rng::JitterRng;
use crate::timer::ExponentialBackoff;
use crate::transport::DatagramTransport;
use crate::types::{ContentType, HandshakeType, HashAlgorithm};
use crate::Error;

/// One complete handshake message.
#[derive(Debug, Clone)]
pub(crate) struct HandshakeMessage {
    pub msg_type: HandshakeType,
    pub message_seq: u16,
    pub body: Buf,
}

impl HandshakeMessage {
    /// The bytes fed to the handshake hash.
    fn hashed_form(&self) -> Buf {
        let header = Header::whole(self.msg_type, self.message_seq, self.body.len() as u32);
        let mut out = Buf::with_capacity(12 + self.body.len());
        header.serialize(&mut out);
        out.extend_from_slice(&self.body);
        out
    }
}

pub(crate) struct ReliableHandshake<'a, T> {
    record: &'a mut RecordLayer<T>,
    transcript: Transcript,
    rng: JitterRng,
    backoff: ExponentialBackoff,
    deadline: Instant,
    final_flight_expiry: Duration,
    max_buffered: usize,

    next_send_seq: u16,
    next_receive_seq: u16,
    inbound: BTreeMap<u16, Reassembler>,

    // The peer flight our current flight answers, and the one arriving now.
    previous_peer_flight: PeerFlight,
    current_peer_flight: PeerFlight,

    outbound: Vec<HandshakeMessage>,
    outbound_epoch: u16,
    sending: bool,
    flight_deadline: Option<Instant>,
}

impl<'a, T: DatagramTransport> ReliableHandshake<'a, T> {
    pub fn new(record: &'a mut RecordLayer<T>, config: &Config) -> Self {
        let mut rng = JitterRng::new(config.rng_seed());
        let backoff = ExponentialBackoff::new(
            config.flight_start_rto(),
            config.flight_max_rto(),
            config.flight_retries(),
            &mut rng,
        );
        ReliableHandshake {
            record,
            transcript: Transcript::new(),
            rng,
            backoff,
            deadline: Instant::now() + config.handshake_timeout(),
            final_flight_expiry: config.final_flight_expiry(),
            max_buffered: config.max_buffered_messages(),
            next_send_seq: 0,
            next_receive_seq: 0,
            inbound: BTreeMap::new(),
            previous_peer_flight: PeerFlight::new(),
            current_peer_flight: PeerFlight::new(),
            outbound: Vec::new(),
            outbound_epoch: 0,
            sending: false,
            flight_deadline: None,
        }
    }

    /// Start from a ClientHello accepted by the stateless cookie exchange.
    ///
    /// Our ServerHello reuses its `message_seq`, as RFC 6347 4.2.2 requires.
    pub fn start_with(&mut self, message: &HandshakeMessage) -> Result<(), Error> {
        self.next_receive_seq = message
            .message_seq
            .checked_add(1)
            .ok_or_else(|| Error::unexpected_message("message_seq exhausted"))?;
        self.next_send_seq = message.message_seq;
        self.transcript.update(&message.hashed_form());
        self.current_peer_flight
            .record(message.msg_type, message.message_seq, message.body.len());
        Ok(())
    }

    pub fn record(&mut self) -> &mut RecordLayer<T> {
        self.record
    }

    /// Append a message to our current flight and put it on the wire.
    pub fn send_message(&mut self, msg_type: HandshakeType, body: &[u8]) -> Result<(), Error> {
        if !self.sending {
            self.outbound.clear();
            self.outbound_epoch = self.record.write_epoch();
            self.previous_peer_flight = mem::take(&mut self.current_peer_flight);
            self.backoff.reset(&mut self.rng);
            self.flight_deadline = None;
            self.sending = true;
        }

        let message = HandshakeMessage {
            msg_type,
            message_seq: self.next_send_seq,
            body: Buf::from_slice(body),
        };
        self.next_send_seq = self
            .next_send_seq
            .checked_add(1)
            .ok_or_else(|| Error::internal_error("message_seq exhausted"))?;

        trace!("Send {:?} seq {}", msg_type, message.message_seq);
        self.record.write_handshake(&message)?;
        self.transcript.update(&message.hashed_form());
        self.outbound.push(message);
        Ok(())
    }

    /// Wait for the next message from the peer, retransmitting our last
    /// flight as needed.
    pub fn receive_message(&mut self) -> Result<HandshakeMessage, Error> {
        if self.sending {
            self.record.flush()?;
            self.sending = false;
            if !self.outbound.is_empty() {
                self.flight_deadline = Some(Instant::now() + self.backoff.rto());
            }
        }

        loop {
            if let Some(message) = self.next_complete()? {
                trace!("Received {:?} seq {}", message.msg_type, message.message_seq);
                return Ok(message);
            }

            if Instant::now() >= self.deadline {
                return Err(Error::Timeout("handshake did not complete in time"));
            }
            let wait_until = match self.flight_deadline {
                Some(d) => d.min(self.deadline),
                None => self.deadline,
            };

            match self.record.receive_record(wait_until)? {
                Some(record) => self.handle_record(record)?,
                None => self.check_flight_timer()?,
            }
        }
    }

    /// [`receive_message`](Self::receive_message), insisting on a type.
    pub fn receive_message_body(&mut self, expected: HandshakeType) -> Result<Buf, Error> {
        let message = self.receive_message()?;
        if message.msg_type != expected {
            return Err(Error::unexpected_message(format!(
                "expected {:?}, got {:?}",
                expected, message.msg_type
            )));
        }
        Ok(message.body)
    }

    /// The suite is known: start hashing with its PRF hash.
    pub fn notify_hello_complete(
        &mut self,
        provider: &dyn HashProvider,
        algorithm: HashAlgorithm,
    ) -> Result<(), Error> {
        self.transcript.seal(provider, algorithm)
    }

    pub fn prepare_to_finish(&self) -> Result<TranscriptSnapshot, Error> {
        self.transcript.snapshot()
    }

    pub fn current_hash(&self) -> Result<Buf, Error> {
        self.transcript.current_hash()
    }

    /// A HelloVerifyRequest arrived: the ClientHello it answered does not
    /// count towards the transcript.
    pub fn reset_transcript(&mut self) {
        self.transcript.reset();
    }

    /// End of handshake. When our flight was the last one, the record layer
    /// keeps it to answer retransmissions of the peer's flight.
    pub fn finish(self) -> Result<(), Error> {
        self.record.flush()?;
        if self.sending && !self.outbound.is_empty() {
            debug!(
                "Retaining final flight of {} messages for {:?}",
                self.outbound.len(),
                self.final_flight_expiry
            );
            self.record.retain_final_flight(
                self.outbound,
                self.outbound_epoch,
                self.previous_peer_flight,
                Instant::now() + self.final_flight_expiry,
            );
        }
        Ok(())
    }

    fn check_flight_timer(&mut self) -> Result<(), Error> {
        let Some(flight_deadline) = self.flight_deadline else {
            return Ok(());
        };
        if Instant::now() < flight_deadline {
            return Ok(());
        }
        if !self.backoff.can_retry() {
            return Err(Error::Timeout("flight retransmissions exhausted"));
        }
        self.backoff.attempt(&mut self.rng);
        debug!(
            "Flight timeout, resending {} messages (next rto {:?})",
            self.outbound.len(),
            self.backoff.rto()
        );
        self.resend_flight()?;
        self.flight_deadline = Some(Instant::now() + self.backoff.rto());
        Ok(())
    }

    fn resend_flight(&mut self) -> Result<(), Error> {
        let write_epoch = self.record.write_epoch();
        self.record.resend_flight(&self.outbound, self.outbound_epoch)?;
        if self.record.write_epoch() != write_epoch {
            return Err(Error::internal_error("flight resend changed the write epoch"));
        }
        Ok(())
    }

    fn handle_record(&mut self, record: ReceivedRecord) -> Result<(), Error> {
        match record.content_type {
            ContentType::Handshake => {
                for (header, fragment) in handshake_fragments(&record.payload) {
                    self.handle_fragment(&header, fragment, record.epoch)?;
                }
            }
            ContentType::ChangeCipherSpec => {
                trace!("ChangeCipherSpec in epoch {}", record.epoch);
            }
            other => {
                trace!("Dropping {:?} during handshake", other);
            }
        }
        Ok(())
    }

    fn handle_fragment(&mut self, header: &Header, fragment: &[u8], epoch: u16) -> Result<(), Error> {
        if header.msg_type.is_protected() && epoch == 0 {
            trace!("Dropping unprotected Finished");
            return Ok(());
        }
        if header.length as usize > MAX_HANDSHAKE_MESSAGE_LEN {
            trace!("Dropping {} byte handshake message", header.length);
            return Ok(());
        }

        let seq = header.message_seq;
        if seq < self.next_receive_seq {
            if self.previous_peer_flight.observe(header, fragment) && !self.outbound.is_empty() {
                debug!("Peer repeated its flight, resending ours");
                self.resend_flight()?;
            }
            return Ok(());
        }
        if (seq - self.next_receive_seq) as usize >= self.max_buffered {
            trace!("Dropping fragment of message {} beyond the buffer", seq);
            return Ok(());
        }

        let reassembler = self
            .inbound
            .entry(seq)
            .or_insert_with(|| Reassembler::new(header.msg_type, header.length as usize));
        if !reassembler.contribute(header, fragment) {
            trace!("Dropping inconsistent fragment of message {}", seq);
        }
        Ok(())
    }

    fn next_complete(&mut self) -> Result<Option<HandshakeMessage>, Error> {
        let seq = self.next_receive_seq;
        match self.inbound.get(&seq) {
            Some(r) if r.is_complete() => {}
            _ => return Ok(None),
        }
        let Some(reassembler) = self.inbound.remove(&seq) else {
            return Ok(None);
        };

        let message = HandshakeMessage {
            msg_type: reassembler.msg_type(),
            message_seq: seq,
            body: reassembler.into_body(),
        };
        self.next_receive_seq = seq
            .checked_add(1)
            .ok_or_else(|| Error::unexpected_message("message_seq exhausted"))?;

        if message.msg_type != HandshakeType::HelloVerifyRequest {
            self.transcript.update(&message.hashed_form());
        }
        self.current_peer_flight
            .record(message.msg_type, seq, message.body.len());

        // The peer is answering. Its flight may still be cut short, so the
        // timer only restarts; a new flight of ours stops it.
        if !self.outbound.is_empty() {
            self.flight_deadline = Some(Instant::now() + self.backoff.rto());
        }
        Ok(Some(message))
    }
}
