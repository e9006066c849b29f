//! DTLS 1.2 record layer.
//!
//! Frames and deframes records, keeps one sequence counter and replay window
//! per epoch and fragments handshake messages to fit the path MTU. Anything
//! that fails to parse, replays, or does not authenticate is dropped here and
//! never reaches the handshake.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use super::reassembly::{handshake_fragments, PeerFlight};
use super::reliable::HandshakeMessage;
use crate::buffer::Buf;
use crate::config::Config;
use crate::crypto::{NullRecordCipher, RecordCipher, DTLS_EXPLICIT_NONCE_LEN};
use crate::message::{Header, Record, RecordHeader, CHANGE_CIPHER_SPEC, HANDSHAKE_HEADER_LEN};
use crate::message::{MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN, MAX_SEQUENCE_NUMBER};
use crate::message::RECORD_HEADER_LEN;
use crate::transport::DatagramTransport;
use crate::types::{Alert, AlertDescription, AlertLevel, ContentType, HandshakeType};
use crate::types::ProtocolVersion;
use crate::window::ReplayWindow;
use crate::Error;

// Record header, handshake header, AEAD explicit nonce and tag, one byte of body.
const MIN_SEND_LIMIT: usize = RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN + DTLS_EXPLICIT_NONCE_LEN + 16 + 1;

/// Keys and counters of one epoch.
struct Epoch {
    number: u16,
    cipher: Box<dyn RecordCipher>,
    next_write_seq: u64,
    replay: ReplayWindow,
}

impl Epoch {
    fn new(number: u16, cipher: Box<dyn RecordCipher>) -> Self {
        Epoch {
            number,
            cipher,
            next_write_seq: 0,
            replay: ReplayWindow::new(),
        }
    }
}

/// A record that passed every check, with its protection removed.
#[derive(Debug)]
pub(crate) struct ReceivedRecord {
    pub content_type: ContentType,
    pub epoch: u16,
    pub sequence_number: u64,
    pub payload: Buf,
}

/// Our last flight, kept after the handshake in case the peer never saw it.
struct RetainedFlight {
    flight: Vec<HandshakeMessage>,
    epoch: u16,
    peer_flight: PeerFlight,
    expires: Instant,
}

pub struct RecordLayer<T> {
    transport: T,
    epochs: Vec<Epoch>,
    read_epoch: u16,
    write_epoch: u16,
    write_version: ProtocolVersion,
    send_limit: usize,
    plaintext_limit: usize,
    outgoing: Buf,
    incoming: VecDeque<Buf>,
    // Records of the next epoch that arrived before its keys.
    deferred: Vec<Buf>,
    max_deferred: usize,
    receive_buf: Vec<u8>,
    fatal_bad_record_mac: bool,
    established: bool,
    retained: Option<RetainedFlight>,
}

impl<T: DatagramTransport> RecordLayer<T> {
    pub fn new(transport: T, config: &Config) -> Result<Self, Error> {
        let send_limit = transport.send_limit().min(config.mtu());
        if send_limit < MIN_SEND_LIMIT {
            return Err(Error::InvalidArgument(format!(
                "transport send limit {} is below {}",
                send_limit, MIN_SEND_LIMIT
            )));
        }
        let receive_limit = transport.receive_limit().max(RECORD_HEADER_LEN);

        Ok(RecordLayer {
            transport,
            epochs: vec![Epoch::new(0, Box::new(NullRecordCipher))],
            read_epoch: 0,
            write_epoch: 0,
            write_version: ProtocolVersion::DTLS1_0,
            send_limit,
            plaintext_limit: MAX_PLAINTEXT_LEN,
            outgoing: Buf::with_capacity(send_limit),
            incoming: VecDeque::new(),
            deferred: Vec::new(),
            max_deferred: config.max_buffered_messages(),
            receive_buf: vec![0; receive_limit],
            fatal_bad_record_mac: config.fatal_bad_record_mac(),
            established: false,
            retained: None,
        })
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn set_write_version(&mut self, version: ProtocolVersion) {
        self.write_version = version;
    }

    #[cfg(test)]
    pub fn read_epoch(&self) -> u16 {
        self.read_epoch
    }

    pub fn write_epoch(&self) -> u16 {
        self.write_epoch
    }

    /// Cap record plaintext, e.g. after negotiating max_fragment_length.
    pub fn set_plaintext_limit(&mut self, limit: usize) {
        self.plaintext_limit = limit.min(MAX_PLAINTEXT_LEN);
    }

    /// Largest plaintext that fits one record in one datagram in the
    /// current write epoch.
    pub fn max_record_payload(&self) -> usize {
        let overhead = self.current_write().cipher.overhead();
        (self.send_limit - RECORD_HEADER_LEN - overhead).min(self.plaintext_limit)
    }

    /// Install keys for the next epoch. Neither direction switches yet.
    pub fn install_pending_epoch(&mut self, cipher: Box<dyn RecordCipher>) -> Result<u16, Error> {
        let number = u16::try_from(self.epochs.len())
            .map_err(|_| Error::internal_error("epoch number exhausted"))?;
        debug!("Installing pending epoch {}", number);
        self.epochs.push(Epoch::new(number, cipher));

        // Give records that were waiting for these keys another go.
        for raw in self.deferred.drain(..).rev() {
            self.incoming.push_front(raw);
        }
        Ok(number)
    }

    /// Move the write side to the next epoch (after sending ChangeCipherSpec).
    pub fn advance_write_epoch(&mut self) -> Result<(), Error> {
        let next = self
            .write_epoch
            .checked_add(1)
            .filter(|e| (*e as usize) < self.epochs.len())
            .ok_or_else(|| Error::internal_error("no pending epoch to write in"))?;
        debug!("Write epoch {} -> {}", self.write_epoch, next);
        self.write_epoch = next;
        Ok(())
    }

    fn set_write_epoch(&mut self, epoch: u16) -> Result<(), Error> {
        if epoch as usize >= self.epochs.len() {
            return Err(Error::internal_error(format!("unknown epoch {}", epoch)));
        }
        self.write_epoch = epoch;
        Ok(())
    }

    fn current_write(&self) -> &Epoch {
        &self.epochs[self.write_epoch as usize]
    }

    /// After a stateless cookie exchange: continue the record sequence of the
    /// accepted ClientHello, which is already marked as received.
    pub fn reset_after_hello_verify(&mut self, record_seq: u64) {
        let epoch = &mut self.epochs[0];
        epoch.next_write_seq = record_seq;
        epoch.replay = ReplayWindow::new();
        epoch.replay.mark(record_seq);
    }

    /// Protect and append one record to the pending datagram.
    pub fn queue_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<(), Error> {
        let version = self.write_version;
        let epoch = &mut self.epochs[self.write_epoch as usize];
        let seq = epoch.next_write_seq;
        if seq > MAX_SEQUENCE_NUMBER {
            return Err(Error::internal_error("record sequence number exhausted"));
        }
        epoch.next_write_seq += 1;

        let header_epoch_seq = ((epoch.number as u64) << 48) | seq;
        let fragment = epoch
            .cipher
            .encrypt(header_epoch_seq, content_type, version, payload)
            .map_err(|e| Error::internal_error(format!("record protection: {}", e)))?;

        let header = RecordHeader {
            content_type,
            version,
            epoch: epoch.number,
            sequence_number: seq,
            length: fragment.len() as u16,
        };

        if !self.outgoing.is_empty()
            && self.outgoing.len() + RECORD_HEADER_LEN + fragment.len() > self.send_limit
        {
            self.flush()?;
        }
        header.serialize(&mut self.outgoing);
        self.outgoing.extend_from_slice(&fragment);
        Ok(())
    }

    pub fn send_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<(), Error> {
        self.queue_record(content_type, payload)?;
        self.flush()
    }

    /// Send an epoch 0 record with an explicit sequence number, without
    /// touching any counter. Used by the stateless cookie exchange.
    pub fn send_stateless_record(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        sequence_number: u64,
        payload: &[u8],
    ) -> Result<(), Error> {
        let header = RecordHeader {
            content_type,
            version,
            epoch: 0,
            sequence_number,
            length: payload.len() as u16,
        };
        let mut datagram = Buf::with_capacity(RECORD_HEADER_LEN + payload.len());
        header.serialize(&mut datagram);
        datagram.extend_from_slice(payload);
        self.transport.send(&datagram)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        if self.outgoing.is_empty() {
            return Ok(());
        }
        let result = self.transport.send(&self.outgoing);
        self.outgoing.clear();
        result?;
        Ok(())
    }

    pub fn send_alert(&mut self, level: AlertLevel, description: AlertDescription) -> Result<(), Error> {
        let alert = Alert { level, description };
        self.send_record(ContentType::Alert, &alert.serialize())
    }

    /// Write one handshake message, fragmented to the MTU.
    ///
    /// A Finished message is preceded by ChangeCipherSpec in the current
    /// epoch, after which the write side moves to the next epoch.
    pub fn write_handshake(&mut self, message: &HandshakeMessage) -> Result<(), Error> {
        if message.msg_type == HandshakeType::Finished {
            self.queue_record(ContentType::ChangeCipherSpec, &CHANGE_CIPHER_SPEC)?;
            self.advance_write_epoch()?;
        }

        let total = message.body.len();
        let max = self.max_record_payload() - HANDSHAKE_HEADER_LEN;
        let mut offset = 0;
        let mut record = Buf::with_capacity(max + HANDSHAKE_HEADER_LEN);
        loop {
            let len = max.min(total - offset);
            let header = Header {
                msg_type: message.msg_type,
                length: total as u32,
                message_seq: message.message_seq,
                fragment_offset: offset as u32,
                fragment_length: len as u32,
            };
            record.clear();
            header.serialize(&mut record);
            record.extend_from_slice(&message.body[offset..offset + len]);
            self.queue_record(ContentType::Handshake, &record)?;

            offset += len;
            if offset >= total {
                break;
            }
        }
        Ok(())
    }

    /// Send a whole flight again, starting in the epoch it was first sent in.
    pub fn resend_flight(&mut self, flight: &[HandshakeMessage], epoch: u16) -> Result<(), Error> {
        self.set_write_epoch(epoch)?;
        for message in flight {
            self.write_handshake(message)?;
        }
        self.flush()
    }

    /// Keep resending `flight` whenever `peer_flight` shows up again, until
    /// `expires`.
    pub(crate) fn retain_final_flight(
        &mut self,
        flight: Vec<HandshakeMessage>,
        epoch: u16,
        peer_flight: PeerFlight,
        expires: Instant,
    ) {
        self.retained = Some(RetainedFlight {
            flight,
            epoch,
            peer_flight,
            expires,
        });
    }

    /// The handshake is over; application data flows.
    pub fn set_established(&mut self) {
        self.established = true;
    }

    /// Wait until `deadline` for the next acceptable record.
    ///
    /// `Ok(None)` means the deadline passed. Peer alerts that end the
    /// connection surface as [`Error::PeerAlert`].
    pub(crate) fn receive_record(&mut self, deadline: Instant) -> Result<Option<ReceivedRecord>, Error> {
        loop {
            if let Some(raw) = self.incoming.pop_front() {
                if let Some(record) = self.process(raw)? {
                    return Ok(Some(record));
                }
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let Some(n) = self.transport.receive(&mut self.receive_buf, deadline - now)? else {
                return Ok(None);
            };

            let mut rest = &self.receive_buf[..n];
            while !rest.is_empty() {
                match Record::parse(rest) {
                    Ok((after, _)) => {
                        let used = rest.len() - after.len();
                        self.incoming.push_back(Buf::from_slice(&rest[..used]));
                        rest = after;
                    }
                    Err(_) => {
                        trace!("Dropping {} trailing bytes of datagram", rest.len());
                        break;
                    }
                }
            }
        }
    }

    fn process(&mut self, raw: Buf) -> Result<Option<ReceivedRecord>, Error> {
        let Ok((_, record)) = Record::parse(&raw) else {
            return Ok(None);
        };
        let header = record.header;
        let content_type = header.content_type;

        if let ContentType::Unknown(t) = content_type {
            trace!("Dropping record with unknown content type {}", t);
            return Ok(None);
        }
        if header.version.as_u16() >> 8 != 0xFE {
            trace!("Dropping record with version {}", header.version);
            return Ok(None);
        }
        if header.length as usize > MAX_CIPHERTEXT_LEN {
            trace!("Dropping oversized record: {}", header.length);
            return Ok(None);
        }

        let epoch = header.epoch;
        if epoch == self.read_epoch {
            // current
        } else if Some(epoch) == self.read_epoch.checked_add(1) {
            if epoch as usize >= self.epochs.len() {
                if self.deferred.len() < self.max_deferred {
                    trace!("Deferring epoch {} record until its keys exist", epoch);
                    self.deferred.push(raw.clone());
                }
                return Ok(None);
            }
        } else if Some(epoch) == self.read_epoch.checked_sub(1) {
            if !matches!(
                content_type,
                ContentType::Handshake | ContentType::ChangeCipherSpec
            ) {
                trace!("Dropping {:?} from previous epoch {}", content_type, epoch);
                return Ok(None);
            }
        } else {
            trace!("Dropping record of epoch {} (reading {})", epoch, self.read_epoch);
            return Ok(None);
        }

        let fatal_bad_mac = self.fatal_bad_record_mac && self.established;
        let state = &mut self.epochs[epoch as usize];
        if state.replay.is_replay(header.sequence_number) {
            trace!("Dropping replayed record {}:{}", epoch, header.sequence_number);
            return Ok(None);
        }

        let payload = match state.cipher.decrypt(
            header.epoch_seq(),
            content_type,
            header.version,
            record.fragment,
        ) {
            Ok(p) => p,
            Err(e) => {
                if fatal_bad_mac && epoch > 0 {
                    return Err(Error::fatal(AlertDescription::BadRecordMac, e));
                }
                trace!("Dropping record {}:{} that failed to authenticate", epoch, header.sequence_number);
                return Ok(None);
            }
        };
        if payload.len() > MAX_PLAINTEXT_LEN {
            trace!("Dropping record with {} byte plaintext", payload.len());
            return Ok(None);
        }
        state.replay.mark(header.sequence_number);

        if epoch > self.read_epoch {
            debug!("Read epoch {} -> {}", self.read_epoch, epoch);
            self.read_epoch = epoch;
        }

        match content_type {
            ContentType::Alert => {
                let Ok((_, alert)) = Alert::parse(&payload) else {
                    trace!("Dropping malformed alert");
                    return Ok(None);
                };
                if alert.level == AlertLevel::Fatal
                    || alert.description == AlertDescription::CloseNotify
                {
                    debug!("Peer sent {:?} {}", alert.level, alert.description);
                    return Err(Error::PeerAlert {
                        level: alert.level,
                        description: alert.description,
                    });
                }
                warn!("Ignoring warning alert {}", alert.description);
                return Ok(None);
            }
            ContentType::ApplicationData if epoch == 0 => {
                trace!("Dropping unprotected application data");
                return Ok(None);
            }
            ContentType::ChangeCipherSpec if *payload != CHANGE_CIPHER_SPEC => {
                trace!("Dropping malformed ChangeCipherSpec");
                return Ok(None);
            }
            ContentType::Handshake if self.retained.is_some() => {
                self.observe_retained(&payload)?;
                return Ok(None);
            }
            _ => {}
        }

        Ok(Some(ReceivedRecord {
            content_type,
            epoch,
            sequence_number: header.sequence_number,
            payload,
        }))
    }

    fn observe_retained(&mut self, payload: &[u8]) -> Result<(), Error> {
        let Some(retained) = &mut self.retained else {
            return Ok(());
        };
        if Instant::now() >= retained.expires {
            debug!("Final flight expired");
            self.retained = None;
            return Ok(());
        }

        let mut complete = false;
        for (header, fragment) in handshake_fragments(payload) {
            complete |= retained.peer_flight.observe(&header, fragment);
        }
        if !complete {
            return Ok(());
        }

        if let Some(retained) = self.retained.take() {
            debug!("Peer repeated its last flight, resending ours");
            let write_epoch = self.write_epoch;
            let result = self.resend_flight(&retained.flight, retained.epoch);
            self.write_epoch = write_epoch;
            self.retained = Some(retained);
            result?;
        }
        Ok(())
    }

    /// Flush and release the transport.
    pub fn close(&mut self) -> Result<(), Error> {
        self.flush()?;
        self.transport.close()?;
        Ok(())
    }
}

impl<T> fmt::Debug for RecordLayer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordLayer")
            .field("read_epoch", &self.read_epoch)
            .field("write_epoch", &self.write_epoch)
            .field("send_limit", &self.send_limit)
            .field("plaintext_limit", &self.plaintext_limit)
            .finish()
    }
}
