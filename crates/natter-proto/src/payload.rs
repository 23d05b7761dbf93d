//! Primitive field encoding used inside packet payloads.
//!
//! Integers are 4-byte little-endian signed values. Strings and blobs are a
//! 4-byte length followed by raw bytes; a length of zero means the field is
//! absent, so `Some("")` and `None` are indistinguishable on the wire.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(u8::from(value));
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn put_str(&mut self, value: Option<&str>) -> &mut Self {
        self.put_blob(value.map(str::as_bytes))
    }

    pub fn put_blob(&mut self, value: Option<&[u8]>) -> &mut Self {
        match value {
            Some(bytes) if !bytes.is_empty() => {
                self.buf.put_i32_le(bytes.len() as i32);
                self.buf.put_slice(bytes);
            }
            _ => self.buf.put_i32_le(0),
        }
        self
    }

    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[derive(Debug, Clone)]
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Reader over an optional payload; an absent payload reads as empty.
    pub fn from_payload(payload: Option<&Bytes>) -> Self {
        Self::new(payload.cloned().unwrap_or_default())
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8() != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_blob(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        let len = self.read_i32()?;
        if len <= 0 {
            // Negative lengths are treated like zero: the field is absent.
            return Ok(None);
        }
        let len = len as usize;
        self.ensure(len)?;
        Ok(Some(self.buf.split_to(len)))
    }

    pub fn read_str(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.read_blob()? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| ProtocolError::InvalidUtf8),
            None => Ok(None),
        }
    }

    /// Everything left in the payload.
    pub fn read_rest(&mut self) -> Bytes {
        self.buf.split_to(self.buf.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_layout() {
        let mut w = PayloadWriter::new();
        w.put_i32(7).put_str(Some("hey"));
        let bytes = w.finish();
        assert_eq!(&bytes[..], &[7, 0, 0, 0, 3, 0, 0, 0, b'h', b'e', b'y']);
    }

    #[test]
    fn test_empty_and_absent_strings_share_encoding() {
        let mut w = PayloadWriter::new();
        w.put_str(Some("")).put_str(None);
        let bytes = w.finish();
        assert_eq!(&bytes[..], &[0u8; 8]);

        let mut r = PayloadReader::new(bytes);
        assert_eq!(r.read_str().unwrap(), None);
        assert_eq!(r.read_str().unwrap(), None);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_truncated_string_is_an_error() {
        let mut w = PayloadWriter::new();
        w.put_i32(10).put_raw(b"abc");
        let mut r = PayloadReader::new(w.finish());
        match r.read_str() {
            Err(ProtocolError::Truncated { needed, remaining }) => {
                assert_eq!(needed, 10);
                assert_eq!(remaining, 3);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_rejected_but_blob_accepted() {
        let mut w = PayloadWriter::new();
        w.put_blob(Some(&[0xffu8, 0xfe][..]));
        let bytes = w.finish();

        assert!(matches!(
            PayloadReader::new(bytes.clone()).read_str(),
            Err(ProtocolError::InvalidUtf8)
        ));
        let blob = PayloadReader::new(bytes).read_blob().unwrap();
        assert_eq!(blob.as_deref(), Some(&[0xff, 0xfe][..]));
    }

    #[test]
    fn test_absent_payload_reads_as_empty() {
        let mut r = PayloadReader::from_payload(None);
        assert!(r.read_i32().is_err());
        assert!(r.read_rest().is_empty());
    }
}
