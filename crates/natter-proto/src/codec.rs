//! Length-prefixed framing for [`Packet`]s.
//!
//! Wire layout: `[i32 LE id][i32 LE length][length bytes]`. The decoder
//! validates the header before waiting for any body bytes, so a hostile
//! length field is rejected without the body ever being buffered.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::constants::{HEADER_LEN, MAX_FRAME_LEN};
use crate::error::ProtocolError;
use crate::packet::Packet;

#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_frame_len: usize,
}

impl PacketCodec {
    pub fn new() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Codec with a tighter frame limit. Values above [`MAX_FRAME_LEN`] are clamped.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len: max_frame_len.min(MAX_FRAME_LEN),
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ProtocolError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = &src[..HEADER_LEN];
        let id = header.get_i32_le();
        let len = header.get_i32_le();

        if id < 0 {
            return Err(ProtocolError::InvalidPacketId(id));
        }
        if len < 0 {
            return Err(ProtocolError::InvalidLength(len));
        }

        let len = len as usize;
        if len > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        if src.len() < HEADER_LEN + len {
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let body = src.split_to(len).freeze();

        Ok(Some(Packet {
            id,
            payload: (len > 0).then_some(body),
        }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let len = packet.payload_len();
        if len > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        dst.reserve(HEADER_LEN + len);
        dst.put_i32_le(packet.id);
        dst.put_i32_le(len as i32);
        if let Some(payload) = packet.payload {
            dst.put_slice(&payload);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketId;
    use bytes::Bytes;

    fn header(id: i32, len: i32) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_i32_le(id);
        buf.put_i32_le(len);
        buf
    }

    #[test]
    fn test_decode_waits_for_partial_frames() {
        let mut codec = PacketCodec::new();
        let mut buf = BytesMut::new();

        buf.put_slice(&[2, 0, 0]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(&[0, 3, 0, 0, 0, b'a']);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(b"bc");
        let packet = codec.decode(&mut buf).unwrap().expect("complete frame");
        assert_eq!(packet.id, 2);
        assert_eq!(packet.payload, Some(Bytes::from_static(b"abc")));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_zero_length_decodes_as_absent() {
        let mut codec = PacketCodec::new();
        let mut buf = header(5, 0);
        let packet = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet.id, PacketId::Ping.as_i32());
        assert!(packet.payload.is_none());
    }

    #[test]
    fn test_oversized_frame_rejected_from_header_alone() {
        let mut codec = PacketCodec::new();
        let mut buf = header(4, (MAX_FRAME_LEN + 1) as i32);

        match codec.decode(&mut buf) {
            Err(ProtocolError::FrameTooLarge { len, max }) => {
                assert_eq!(len, MAX_FRAME_LEN + 1);
                assert_eq!(max, MAX_FRAME_LEN);
            }
            other => panic!("expected FrameTooLarge, got {other:?}"),
        }
        // Nothing beyond the header was ever requested.
        assert_eq!(buf.len(), HEADER_LEN);
    }

    #[test]
    fn test_negative_header_fields_rejected() {
        let mut codec = PacketCodec::new();

        let mut buf = header(-3, 0);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidPacketId(-3))
        ));

        let mut buf = header(1, -1);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidLength(-1))
        ));
    }

    #[test]
    fn test_encode_then_decode_back_to_back_frames() {
        let mut codec = PacketCodec::new();
        let mut buf = BytesMut::new();

        codec
            .encode(Packet::new(PacketId::Audio, &b"\x00\x01\x02"[..]), &mut buf)
            .unwrap();
        codec.encode(Packet::empty(PacketId::Ping), &mut buf).unwrap();

        assert_eq!(&buf[..8], &[4, 0, 0, 0, 3, 0, 0, 0]);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.payload.as_deref(), Some(&b"\x00\x01\x02"[..]));
        assert_eq!(second.id, PacketId::Ping.as_i32());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_custom_limit_is_clamped_and_enforced() {
        assert_eq!(
            PacketCodec::with_max_frame_len(usize::MAX).max_frame_len(),
            MAX_FRAME_LEN
        );

        let mut codec = PacketCodec::with_max_frame_len(4);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Packet::new(PacketId::Audio, vec![0u8; 5]), &mut buf)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { len: 5, max: 4 }));
    }
}
