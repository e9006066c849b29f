//! DTLS 1.2 AEAD record framing.
//!
//! Protected records carry an 8 byte explicit nonce (the record's epoch and
//! sequence number) followed by the ciphertext and its tag. The provider's
//! [`Cipher`] only sees the 12 byte nonce and the 13 byte AAD built here.

use std::fmt;

use crate::buffer::Buf;
use crate::crypto::provider::Cipher;
use crate::types::{ContentType, ProtocolVersion};

/// Explicit nonce transmitted with each record.
pub(crate) const DTLS_EXPLICIT_NONCE_LEN: usize = 8;

/// Fixed IV length for DTLS 1.2 GCM suites.
pub(crate) const FIXED_IV_LEN: usize = 4;

/// Fixed IV portion of the nonce, derived from the key block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Iv(pub [u8; FIXED_IV_LEN]);

impl Iv {
    pub(crate) fn new(iv: &[u8]) -> Option<Self> {
        iv.try_into().ok().map(Iv)
    }
}

/// Full AEAD nonce (fixed IV + explicit nonce).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; 12]);

impl Nonce {
    pub(crate) fn new(iv: Iv, explicit_nonce: &[u8; DTLS_EXPLICIT_NONCE_LEN]) -> Self {
        let mut nonce = [0u8; 12];
        nonce[..FIXED_IV_LEN].copy_from_slice(&iv.0);
        nonce[FIXED_IV_LEN..].copy_from_slice(explicit_nonce);
        Self(nonce)
    }
}

impl std::ops::Deref for Nonce {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Additional authenticated data of a DTLS 1.2 record:
/// `epoch(2) || seq(6) || type(1) || version(2) || plaintext_len(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aad(pub [u8; 13]);

impl Aad {
    pub(crate) fn new(
        epoch_seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        length: u16,
    ) -> Self {
        let mut aad = [0u8; 13];
        aad[..8].copy_from_slice(&epoch_seq.to_be_bytes());
        aad[8] = content_type.as_u8();
        aad[9..11].copy_from_slice(&version.as_u16().to_be_bytes());
        aad[11..].copy_from_slice(&length.to_be_bytes());
        Aad(aad)
    }
}

impl std::ops::Deref for Aad {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Record protection for one epoch.
///
/// `epoch_seq` is the 64 bit concatenation of the 16 bit epoch and the 48 bit
/// record sequence number.
pub trait RecordCipher: Send + fmt::Debug {
    fn encrypt(
        &mut self,
        epoch_seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Buf, String>;

    fn decrypt(
        &mut self,
        epoch_seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        ciphertext: &[u8],
    ) -> Result<Buf, String>;

    /// Bytes added to each record's fragment.
    fn overhead(&self) -> usize;
}

/// Epoch 0: fragments travel in the clear.
#[derive(Debug, Default)]
pub struct NullRecordCipher;

impl RecordCipher for NullRecordCipher {
    fn encrypt(
        &mut self,
        _: u64,
        _: ContentType,
        _: ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Buf, String> {
        Ok(Buf::from_slice(plaintext))
    }

    fn decrypt(
        &mut self,
        _: u64,
        _: ContentType,
        _: ProtocolVersion,
        ciphertext: &[u8],
    ) -> Result<Buf, String> {
        Ok(Buf::from_slice(ciphertext))
    }

    fn overhead(&self) -> usize {
        0
    }
}

/// AEAD protection with separate write and read keys.
pub struct AeadRecordCipher {
    write: Box<dyn Cipher>,
    write_iv: Iv,
    read: Box<dyn Cipher>,
    read_iv: Iv,
}

impl AeadRecordCipher {
    pub(crate) fn new(
        write: Box<dyn Cipher>,
        write_iv: Iv,
        read: Box<dyn Cipher>,
        read_iv: Iv,
    ) -> Self {
        AeadRecordCipher {
            write,
            write_iv,
            read,
            read_iv,
        }
    }
}

impl fmt::Debug for AeadRecordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadRecordCipher")
            .field("write", &self.write)
            .field("read", &self.read)
            .finish()
    }
}

impl RecordCipher for AeadRecordCipher {
    fn encrypt(
        &mut self,
        epoch_seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Buf, String> {
        if plaintext.len() > u16::MAX as usize {
            return Err(format!("plaintext too long: {}", plaintext.len()));
        }
        let explicit = epoch_seq.to_be_bytes();
        let nonce = Nonce::new(self.write_iv, &explicit);
        let aad = Aad::new(epoch_seq, content_type, version, plaintext.len() as u16);

        let mut body = Buf::from_slice(plaintext);
        self.write.encrypt(&mut body, aad, nonce)?;

        let mut out = Buf::with_capacity(DTLS_EXPLICIT_NONCE_LEN + body.len());
        out.extend_from_slice(&explicit);
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decrypt(
        &mut self,
        epoch_seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        ciphertext: &[u8],
    ) -> Result<Buf, String> {
        let tag_len = self.read.tag_len();
        if ciphertext.len() < DTLS_EXPLICIT_NONCE_LEN + tag_len {
            return Err(format!("ciphertext too short: {}", ciphertext.len()));
        }
        let (explicit, body) = ciphertext.split_at(DTLS_EXPLICIT_NONCE_LEN);
        let mut explicit_arr = [0u8; DTLS_EXPLICIT_NONCE_LEN];
        explicit_arr.copy_from_slice(explicit);

        let nonce = Nonce::new(self.read_iv, &explicit_arr);
        let plaintext_len = (body.len() - tag_len) as u16;
        let aad = Aad::new(epoch_seq, content_type, version, plaintext_len);

        let mut out = Buf::from_slice(body);
        self.read.decrypt(&mut out, aad, nonce)?;
        Ok(out)
    }

    fn overhead(&self) -> usize {
        DTLS_EXPLICIT_NONCE_LEN + self.write.tag_len()
    }
}
