use bytes::{Buf, BufMut, BytesMut};
use crc::{Crc, CRC_32_ISO_HDLC};
use crate::error::FrameError;

/// The IEEE CRC-32 (as used by zip, PNG, Ethernet)
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub fn checksum(payload: &[u8]) -> u32 {
    CRC32.checksum(payload)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u16,
    pub version: u16,
    pub payload_len: u32,
    pub checksum: u32,
}

impl FrameHeader {
    pub const SERIALIZED_LEN: usize = size_of::<u16>() + size_of::<u16>() + size_of::<u32>() + size_of::<u32>();

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u16(self.magic);
        buf.put_u16(self.version);
        buf.put_u32(self.payload_len);
        buf.put_u32(self.checksum);
    }

    /// The caller must ensure that `buf` holds at least `SERIALIZED_LEN` bytes
    fn deser(buf: &mut impl Buf) -> FrameHeader {
        FrameHeader {
            magic: buf.get_u16(),
            version: buf.get_u16(),
            payload_len: buf.get_u32(),
            checksum: buf.get_u32(),
        }
    }
}

/// Wraps a payload in a versioned, checksummed frame and validates such frames on the way in.
///
/// Different protocol variants use different magic tags so that a datagram of one variant is
///  never mistaken for the other.
///
/// ```ascii
///  0: magic (u16 BE)
///  2: version (u16 BE)
///  4: payload length (u32 BE)
///  8: CRC-32 of the payload (u32 BE)
/// 12: payload
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FrameCodec {
    magic: u16,
}

impl FrameCodec {
    pub const VERSION: u16 = 1;

    pub const ACKNOWLEDGED_MAGIC: u16 = 0x4242;
    pub const FIRE_AND_FORGET_MAGIC: u16 = 0x4343;

    pub const fn new(magic: u16) -> FrameCodec {
        FrameCodec { magic }
    }

    pub const fn acknowledged() -> FrameCodec {
        Self::new(Self::ACKNOWLEDGED_MAGIC)
    }

    pub const fn fire_and_forget() -> FrameCodec {
        Self::new(Self::FIRE_AND_FORGET_MAGIC)
    }

    pub fn magic(&self) -> u16 {
        self.magic
    }

    /// Appends the frame for `payload` to `buf`
    pub fn encode(&self, payload: &[u8], buf: &mut BytesMut) -> Result<(), FrameError> {
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| FrameError::PayloadTooLarge(payload.len()))?;

        buf.reserve(FrameHeader::SERIALIZED_LEN + payload.len());
        FrameHeader {
            magic: self.magic,
            version: Self::VERSION,
            payload_len,
            checksum: checksum(payload),
        }.ser(buf);
        buf.put_slice(payload);
        Ok(())
    }

    /// Validates a complete frame and returns its payload. This has no side effects, so a
    ///  failed decode can safely be treated as 'datagram never arrived'.
    pub fn decode<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8], FrameError> {
        if frame.len() < FrameHeader::SERIALIZED_LEN {
            return Err(FrameError::TooShort { len: frame.len(), header_len: FrameHeader::SERIALIZED_LEN });
        }

        let (mut header_buf, payload) = frame.split_at(FrameHeader::SERIALIZED_LEN);
        let header = FrameHeader::deser(&mut header_buf);

        if header.magic != self.magic {
            return Err(FrameError::BadMagic { expected: self.magic, actual: header.magic });
        }
        if header.version != Self::VERSION {
            return Err(FrameError::UnsupportedVersion(header.version));
        }
        if header.payload_len as usize != payload.len() {
            return Err(FrameError::LengthMismatch { declared: header.payload_len as usize, actual: payload.len() });
        }

        let actual = checksum(payload);
        if actual != header.checksum {
            return Err(FrameError::ChecksumMismatch { expected: header.checksum, actual });
        }

        Ok(payload)
    }
}
