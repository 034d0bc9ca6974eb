use bytes::BytesMut;
use crate::chunk_header::ChunkHeader;
use crate::config::UdpConfig;
use crate::error::DeliveryError;
use crate::frame::{FrameCodec, FrameHeader};

/// Splits `content` into `ceil(len / max_chunk_size)` contiguous slices, all of them
///  `max_chunk_size` long except (possibly) the last one.
pub fn fragment(content: &[u8], max_chunk_size: usize) -> Vec<&[u8]> {
    assert!(max_chunk_size > 0, "chunk size must be positive");
    content.chunks(max_chunk_size).collect()
}

/// One chunk of an outgoing message, ready to be put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingChunk {
    pub header: ChunkHeader,
    pub datagram: BytesMut,
}

/// Builds the datagrams for a message: each is a chunk header followed by a frame
///  wrapping the chunk's slice of `content`, so every chunk carries its own checksum.
///
/// Empty content is sent as a single empty chunk so that the receiver still gets
///  something to acknowledge. Content beyond the configured maximum message size is
///  refused, since the receiver would reject it anyway.
pub fn chunk_datagrams(
    sequence: u64,
    content: &[u8],
    config: &UdpConfig,
    codec: &FrameCodec,
) -> Result<Vec<OutgoingChunk>, DeliveryError> {
    if content.len() > config.max_message_size {
        return Err(DeliveryError::MessageTooLarge { len: content.len(), max_message_size: config.max_message_size });
    }

    let mut slices = fragment(content, config.max_chunk_size);
    if slices.is_empty() {
        slices.push(&[]);
    }

    let chunk_total = u32::try_from(slices.len())
        .map_err(|_| DeliveryError::TooManyChunks(content.len()))?;

    let mut result = Vec::with_capacity(slices.len());
    for (chunk_index, slice) in slices.into_iter().enumerate() {
        let header = ChunkHeader {
            sequence,
            chunk_index: chunk_index as u32,
            chunk_total,
        };

        let mut datagram = BytesMut::with_capacity(datagram_len(slice.len()));
        header.ser(&mut datagram);
        codec.encode(slice, &mut datagram)
            .expect("chunk slices are bounded by the chunk size");

        result.push(OutgoingChunk { header, datagram });
    }
    Ok(result)
}

/// The size of a chunk datagram carrying `payload_len` bytes of content
pub fn datagram_len(payload_len: usize) -> usize {
    ChunkHeader::SERIALIZED_LEN + FrameHeader::SERIALIZED_LEN + payload_len
}
