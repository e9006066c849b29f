use std::time::{Duration, Instant};

use super::record::RecordLayer;
use crate::message::MAX_PLAINTEXT_LEN;
use crate::transport::DatagramTransport;
use crate::types::{AlertDescription, AlertLevel, ContentType};
use crate::Error;

/// An established DTLS connection carrying application data.
///
/// Returned by a successful handshake. Each [`send`](Self::send) is one
/// record; each successful [`receive`](Self::receive) yields one record.
pub struct DtlsTransport<T: DatagramTransport> {
    record: RecordLayer<T>,
    closed: bool,
}

impl<T: DatagramTransport> DtlsTransport<T> {
    pub(crate) fn new(mut record: RecordLayer<T>) -> Self {
        record.set_established();
        DtlsTransport {
            record,
            closed: false,
        }
    }

    /// Largest payload [`send`](Self::send) accepts.
    pub fn send_limit(&self) -> usize {
        self.record.max_record_payload()
    }

    /// Largest payload a single record can carry to us.
    pub fn receive_limit(&self) -> usize {
        MAX_PLAINTEXT_LEN
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Protect and send one record of application data.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let limit = self.send_limit();
        if data.len() > limit {
            return Err(Error::InvalidArgument(format!(
                "{} bytes exceed the send limit of {}",
                data.len(),
                limit
            )));
        }
        self.record.send_record(ContentType::ApplicationData, data)
    }

    /// Wait up to `timeout` for application data.
    ///
    /// Returns `Ok(None)` on timeout. A record larger than `buf` is
    /// truncated. Handshake retransmissions from the peer are answered
    /// while waiting.
    pub fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>, Error> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let deadline = Instant::now() + timeout;
        loop {
            let record = match self.record.receive_record(deadline) {
                Ok(Some(record)) => record,
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.fail(e)),
            };
            if record.content_type != ContentType::ApplicationData {
                trace!("Ignoring {:?} after handshake", record.content_type);
                continue;
            }
            let n = record.payload.len().min(buf.len());
            if n < record.payload.len() {
                debug!("Truncating {} byte record to {}", record.payload.len(), n);
            }
            buf[..n].copy_from_slice(&record.payload[..n]);
            return Ok(Some(n));
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        self.closed = true;
        match error {
            Error::PeerAlert {
                description: AlertDescription::CloseNotify,
                ..
            } => {
                debug!("Peer closed the connection");
                if let Err(e) = self.record.send_alert(AlertLevel::Warning, AlertDescription::CloseNotify) {
                    debug!("Failed to answer close_notify: {}", e);
                }
                if let Err(e) = self.record.close() {
                    debug!("Failed to close transport: {}", e);
                }
                Error::ConnectionClosed
            }
            error => {
                if let Some(description) = error.alert_to_send() {
                    warn!("Fatal alert {}: {}", description, error);
                    if let Err(e) = self.record.send_alert(AlertLevel::Fatal, description) {
                        debug!("Failed to send alert: {}", e);
                    }
                }
                if let Err(e) = self.record.close() {
                    debug!("Failed to close transport: {}", e);
                }
                error
            }
        }
    }

    /// Send close_notify and release the transport.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.record
            .send_alert(AlertLevel::Warning, AlertDescription::CloseNotify)?;
        self.record.close()
    }
}

impl<T: DatagramTransport> std::fmt::Debug for DtlsTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DtlsTransport")
            .field("record", &self.record)
            .field("closed", &self.closed)
            .finish()
    }
}
