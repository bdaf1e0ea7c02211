//! Name identity, ordering and on-disk key encoding.
//!
//! Names are ordered by `(namespace.len() + key.len() ASC, (namespace, key) ASC)`.
//! The durable store sorts rows by raw bytes, so the encoding below is built to
//! make byte order and `Ord` agree:
//!
//! ```text
//! [total_len u32 BE][namespace, 0x00 escaped as 0x00 0xFF][0x00 0x00][key]
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;
const TERMINATOR: u8 = 0x00;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated input")]
    Truncated,

    #[error("invalid escape byte after nul: {0:#04x}")]
    BadEscape(u8),

    #[error("namespace terminator missing")]
    Unterminated,

    #[error("length mismatch: header says {expected}, decoded {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// The combined length does not fit the `u32` length header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("name of {len} bytes does not fit the u32 length header")]
pub struct NameTooLong {
    pub len: usize,
}

/// Key identity `(namespace, key)`.
///
/// The reserved empty key addresses the namespace's own record.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameKey {
    pub namespace: Bytes,
    pub key: Bytes,
}

impl NameKey {
    pub fn new(namespace: impl Into<Bytes>, key: impl Into<Bytes>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    pub fn namespace_record(namespace: impl Into<Bytes>) -> Self {
        Self::new(namespace, Bytes::new())
    }

    pub fn is_namespace_record(&self) -> bool {
        self.key.is_empty()
    }

    /// Combined length, the primary sort key.
    pub fn combined_len(&self) -> usize {
        self.namespace.len() + self.key.len()
    }

    pub fn encoded_len(&self) -> usize {
        let nuls = self.namespace.iter().filter(|b| **b == ESCAPE).count();
        4 + self.namespace.len() + nuls + 2 + self.key.len()
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, NameTooLong> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Appends the encoding to `buf`. Nothing is written on error.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), NameTooLong> {
        let total = length_header(self.combined_len())?;
        buf.extend_from_slice(&total.to_be_bytes());
        for &b in self.namespace.iter() {
            buf.push(b);
            if b == ESCAPE {
                buf.push(ESCAPED_NUL);
            }
        }
        buf.push(ESCAPE);
        buf.push(TERMINATOR);
        buf.extend_from_slice(&self.key);
        Ok(())
    }

    /// Decodes a name occupying all of `input`.
    pub fn decode(input: &[u8]) -> Result<Self, DecodeError> {
        if input.len() < 4 {
            return Err(DecodeError::Truncated);
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&input[..4]);
        let expected = u32::from_be_bytes(len_bytes) as usize;

        let mut namespace = Vec::new();
        let mut offset = 4usize;
        loop {
            let b = *input.get(offset).ok_or(DecodeError::Unterminated)?;
            if b != ESCAPE {
                namespace.push(b);
                offset += 1;
                continue;
            }
            match input.get(offset + 1) {
                None => return Err(DecodeError::Unterminated),
                Some(&TERMINATOR) => {
                    offset += 2;
                    break;
                }
                Some(&ESCAPED_NUL) => {
                    namespace.push(ESCAPE);
                    offset += 2;
                }
                Some(&other) => return Err(DecodeError::BadEscape(other)),
            }
        }

        let key = &input[offset..];
        let actual = namespace.len() + key.len();
        if actual != expected {
            return Err(DecodeError::LengthMismatch { expected, actual });
        }

        Ok(Self {
            namespace: Bytes::from(namespace),
            key: Bytes::copy_from_slice(key),
        })
    }
}

fn length_header(len: usize) -> Result<u32, NameTooLong> {
    u32::try_from(len).map_err(|_| NameTooLong { len })
}

impl PartialOrd for NameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.combined_len().cmp(&other.combined_len()) {
            Ordering::Equal => match self.namespace.cmp(&other.namespace) {
                Ordering::Equal => self.key.cmp(&other.key),
                other => other,
            },
            other => other,
        }
    }
}

impl fmt::Debug for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameKey({:?}/{:?})", self.namespace, self.key)
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            String::from_utf8_lossy(&self.namespace),
            String::from_utf8_lossy(&self.key)
        )
    }
}
