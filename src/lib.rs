//! A benchmark for message transport over UDP. It compares a hand-rolled reliable protocol with
//!  a fire-and-forget baseline, sending the same synthetic messages through both.
//!
//! ## Reliable variant (UDP-ACK)
//!
//! * Messages are split into chunks that fit into a single UDP datagram without IP-level
//!   fragmentation
//! * Every chunk is checksummed and acknowledged individually, and the sender waits for the
//!   acknowledgment before it sends the next chunk (stop-and-wait)
//!   * a chunk is re-sent if its ack does not arrive in time, and the message is abandoned
//!     after a configured number of attempts
//! * The receiver buffers chunks per message, delivering each message exactly once when all
//!   of its chunks are there, regardless of the order in which they arrived
//!   * retransmitted chunks are acknowledged again, but not delivered twice
//!   * incomplete messages are discarded after a configurable idle timeout
//!
//! Each datagram has the following structure, all numbers in network byte order:
//!
//! ```ascii
//!  0: message sequence number (u64)
//!  8: chunk index (u32) - zero based
//! 12: number of chunks in the message (u32)
//! 16: frame magic (u16): 0x4242
//! 18: frame version (u16): 1
//! 20: chunk payload length (u32)
//! 24: CRC-32 (IEEE) of the chunk payload (u32)
//! 28: chunk payload
//! ```
//!
//! The acknowledgment for a chunk consists of the chunk's first 16 bytes echoed back verbatim.
//!
//! ## Fire-and-forget variant (UDP-Fast)
//!
//! Every message is sent as a single frame with magic 0x4343 and no chunk header. The payload
//!  is an ASCII body `ID:<id>|CONTENT:<content>|NUMBER:<number>`. Nothing is acknowledged or
//!  retried, so the sender can only tell that the datagram left the host.

pub mod benchmark;
pub mod chunk_header;
pub mod client;
pub mod config;
pub mod datagram_socket;
pub mod error;
pub mod fire_and_forget;
pub mod fragmenter;
pub mod frame;
pub mod message;
pub mod message_handler;
pub mod protocol;
pub mod reassembler;
pub mod retry;
pub mod server;
pub mod udp_ack;
pub mod udp_fast;
