//! Growable byte buffer used for wire encoding, record payloads and
//! transcripts.

use std::fmt;
use std::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// Newtype around `Vec<u8>` with protocol-oriented helpers.
///
/// `Debug` prints only the length so that key material and plaintext never
/// leak into logs.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Buf(Vec<u8>);

impl Buf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Buf(Vec::with_capacity(capacity))
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Buf(data.to_vec())
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u24(&mut self, value: u32) {
        self.0.extend_from_slice(&value.to_be_bytes()[1..]);
    }

    pub fn put_u48(&mut self, value: u64) {
        self.0.extend_from_slice(&value.to_be_bytes()[2..]);
    }

    /// Append `data` prefixed by a one byte length.
    pub fn put_opaque8(&mut self, data: &[u8]) {
        self.0.push(data.len() as u8);
        self.0.extend_from_slice(data);
    }

    /// Append `data` prefixed by a two byte length.
    pub fn put_opaque16(&mut self, data: &[u8]) {
        self.put_u16(data.len() as u16);
        self.0.extend_from_slice(data);
    }

    /// Append `data` prefixed by a three byte length.
    pub fn put_opaque24(&mut self, data: &[u8]) {
        self.put_u24(data.len() as u32);
        self.0.extend_from_slice(data);
    }

    pub fn resize(&mut self, len: usize, value: u8) {
        self.0.resize(len, value);
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }
}

impl Zeroize for Buf {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl<'a> Extend<&'a u8> for Buf {
    fn extend<T: IntoIterator<Item = &'a u8>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().copied());
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Buf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<Vec<u8>> for Buf {
    fn from(value: Vec<u8>) -> Self {
        Buf(value)
    }
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buf").field("len", &self.0.len()).finish()
    }
}

/// In-place AEAD operations append the tag to, and strip it from, a `Buf`.
#[cfg(feature = "rust-crypto")]
impl aes_gcm::aead::Buffer for Buf {
    fn extend_from_slice(&mut self, other: &[u8]) -> Result<(), aes_gcm::aead::Error> {
        self.0.extend_from_slice(other);
        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}
