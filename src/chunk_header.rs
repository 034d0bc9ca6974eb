use bytes::{Buf, BufMut, BytesMut};
use crate::error::ReassemblyError;

/// Identifies one chunk of a (potentially) multi-chunk message. An acknowledgment is the
///  serialized header of the chunk it acknowledges, echoed back verbatim.
///
/// ```ascii
///  0: sequence (u64 BE) - the message's number, shared by all its chunks
///  8: chunk index (u32 BE) - zero based
/// 12: chunk total (u32 BE)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkHeader {
    pub sequence: u64,
    pub chunk_index: u32,
    pub chunk_total: u32,
}

impl ChunkHeader {
    pub const SERIALIZED_LEN: usize = size_of::<u64>() + size_of::<u32>() + size_of::<u32>();

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u64(self.sequence);
        buf.put_u32(self.chunk_index);
        buf.put_u32(self.chunk_total);
    }

    pub fn to_bytes(&self) -> [u8; Self::SERIALIZED_LEN] {
        let mut result = [0u8; Self::SERIALIZED_LEN];
        result[..8].copy_from_slice(&self.sequence.to_be_bytes());
        result[8..12].copy_from_slice(&self.chunk_index.to_be_bytes());
        result[12..].copy_from_slice(&self.chunk_total.to_be_bytes());
        result
    }

    /// Returns `None` if there are not enough bytes for a header
    pub fn deser(buf: &mut impl Buf) -> Option<ChunkHeader> {
        if buf.remaining() < Self::SERIALIZED_LEN {
            return None;
        }
        Some(ChunkHeader {
            sequence: buf.get_u64(),
            chunk_index: buf.get_u32(),
            chunk_total: buf.get_u32(),
        })
    }

    pub fn validate(&self) -> Result<(), ReassemblyError> {
        if self.chunk_index >= self.chunk_total {
            return Err(ReassemblyError::IndexOutOfRange {
                chunk_index: self.chunk_index,
                chunk_total: self.chunk_total,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first(ChunkHeader { sequence: 7, chunk_index: 0, chunk_total: 3 }, vec![0,0,0,0,0,0,0,7, 0,0,0,0, 0,0,0,3])]
    #[case::big(ChunkHeader { sequence: 0x0102_0304_0506_0708, chunk_index: 0x1122, chunk_total: 0x3344_5566 }, vec![1,2,3,4,5,6,7,8, 0,0,0x11,0x22, 0x33,0x44,0x55,0x66])]
    fn test_ser(#[case] header: ChunkHeader, #[case] expected: Vec<u8>) {
        let mut buf = BytesMut::new();
        header.ser(&mut buf);
        assert_eq!(buf.as_ref(), expected.as_slice());
        assert_eq!(header.to_bytes().as_slice(), expected.as_slice());

        let mut b: &[u8] = &buf;
        assert_eq!(ChunkHeader::deser(&mut b), Some(header));
        assert!(b.is_empty());
    }

    #[test]
    fn test_deser_leaves_payload() {
        let mut b: &[u8] = &[0,0,0,0,0,0,0,1, 0,0,0,1, 0,0,0,2, 9,8];
        let header = ChunkHeader::deser(&mut b).unwrap();
        assert_eq!(header, ChunkHeader { sequence: 1, chunk_index: 1, chunk_total: 2 });
        assert_eq!(b, &[9, 8]);
    }

    #[test]
    fn test_deser_too_short() {
        let mut b: &[u8] = &[0; 15];
        assert_eq!(ChunkHeader::deser(&mut b), None);
    }

    #[rstest]
    #[case::first(0, 1, true)]
    #[case::last(2, 3, true)]
    #[case::index_equals_total(3, 3, false)]
    #[case::zero_total(0, 0, false)]
    fn test_validate(#[case] chunk_index: u32, #[case] chunk_total: u32, #[case] valid: bool) {
        let header = ChunkHeader { sequence: 1, chunk_index, chunk_total };
        assert_eq!(header.validate().is_ok(), valid);
    }
}
