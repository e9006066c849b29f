//! Running handshake transcript.

use std::fmt;

use crate::buffer::Buf;
use crate::crypto::{HashContext, HashProvider};
use crate::types::HashAlgorithm;
use crate::Error;

/// Every handshake message exchanged so far, in the form that is hashed:
/// the 12 byte header with `fragment_offset = 0` and
/// `fragment_length = length`, followed by the body.
///
/// Until the cipher suite is known the messages are only buffered. Sealing
/// starts a hash context of the suite's PRF hash and replays the buffer.
/// The raw bytes are kept for CertificateVerify.
pub(crate) struct Transcript {
    messages: Buf,
    hash: Option<Box<dyn HashContext>>,
}

/// Immutable view of the transcript at one point of the handshake.
pub(crate) struct TranscriptSnapshot {
    hash: Box<dyn HashContext>,
    messages: Buf,
}

impl Transcript {
    pub fn new() -> Self {
        Transcript {
            messages: Buf::new(),
            hash: None,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.messages.extend_from_slice(data);
        if let Some(hash) = &mut self.hash {
            hash.update(data);
        }
    }

    /// Fix the hash algorithm and hash what has been buffered.
    pub fn seal(
        &mut self,
        provider: &dyn HashProvider,
        algorithm: HashAlgorithm,
    ) -> Result<(), Error> {
        if self.hash.is_some() {
            return Err(Error::internal_error("transcript sealed twice"));
        }
        let mut hash = provider
            .create_hash(algorithm)
            .map_err(|e| Error::internal_error(format!("transcript hash: {}", e)))?;
        hash.update(&self.messages);
        self.hash = Some(hash);
        Ok(())
    }

    /// Start over, e.g. after a HelloVerifyRequest.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.hash = None;
    }

    /// Hash of everything so far.
    pub fn current_hash(&self) -> Result<Buf, Error> {
        let hash = self
            .hash
            .as_ref()
            .ok_or_else(|| Error::internal_error("transcript not sealed"))?;
        let mut out = Buf::new();
        hash.clone_and_finalize(&mut out);
        Ok(out)
    }

    pub fn snapshot(&self) -> Result<TranscriptSnapshot, Error> {
        let hash = self
            .hash
            .as_ref()
            .ok_or_else(|| Error::internal_error("transcript not sealed"))?;
        Ok(TranscriptSnapshot {
            hash: hash.box_clone(),
            messages: self.messages.clone(),
        })
    }
}

impl TranscriptSnapshot {
    pub fn hash(&self) -> Buf {
        let mut out = Buf::new();
        self.hash.clone_and_finalize(&mut out);
        out
    }

    /// The raw messages, as signed by CertificateVerify.
    pub fn messages(&self) -> &[u8] {
        &self.messages
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("len", &self.messages.len())
            .field("sealed", &self.hash.is_some())
            .finish()
    }
}

impl fmt::Debug for TranscriptSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptSnapshot")
            .field("len", &self.messages.len())
            .finish()
    }
}
