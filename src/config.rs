use std::time::Duration;
use anyhow::bail;
use crate::fragmenter::datagram_len;

pub struct UdpConfig {
    /// This is the payload size inside UDP datagrams that we assume can be delivered without
    ///  IP level fragmentation. With full Ethernet frames and no optional IP headers, this is
    ///  `1500 - 20 - 8 = 1472` for IPV4 and `1500 - 40 - 8 = 1452` for IPV6.
    ///
    /// It is not used for sending directly, but as an upper bound that `max_chunk_size` plus
    ///  all headers must fit into.
    pub payload_size_inside_udp: usize,

    /// Number of content bytes per chunk
    pub max_chunk_size: usize,

    /// Upper bound for the content of a single message. The receiver rejects chunks of
    ///  messages that announce more chunks than this takes, so a single sender cannot make
    ///  a reassembly session grow without limit.
    pub max_message_size: usize,

    /// Time to wait for the acknowledgment of a single chunk before re-sending it
    pub ack_timeout: Duration,

    /// Total number of attempts (not re-tries) per chunk before giving up on a message
    pub max_attempts: u32,

    /// Reassembly sessions that were not touched for this long are dropped
    pub session_timeout: Duration,
    /// How often the server looks for expired reassembly sessions
    pub sweep_interval: Duration,
    /// Upper bound for the number of reassembly sessions held at any given time
    pub max_sessions: usize,
    /// Number of expired sequence numbers that are remembered to distinguish 'expired' from
    ///  'never seen'
    pub expired_memory: usize,

    /// Receive buffer size for the fire-and-forget server, which has no chunking and accepts
    ///  whatever fits into a datagram
    pub fire_and_forget_buffer_size: usize,
}

impl UdpConfig {
    pub fn default_ipv4() -> UdpConfig {
        UdpConfig {
            payload_size_inside_udp: 1472,
            max_chunk_size: 1400,
            max_message_size: 16*1024*1024,
            ack_timeout: Duration::from_millis(50),
            max_attempts: 3,
            session_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
            max_sessions: 16 * 1024,
            expired_memory: 1024,
            fire_and_forget_buffer_size: 64 * 1024,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_chunk_size == 0 {
            bail!("chunk size must be positive");
        }
        if datagram_len(self.max_chunk_size) > self.payload_size_inside_udp {
            bail!("chunk size {} plus headers exceeds the UDP payload size of {}", self.max_chunk_size, self.payload_size_inside_udp);
        }
        if self.max_message_size == 0 {
            bail!("max message size must be positive");
        }
        if u32::try_from(self.max_chunks_per_message()).is_err() {
            bail!("max message size {} needs more chunks than a chunk header can count", self.max_message_size);
        }
        if self.max_attempts == 0 {
            bail!("at least one send attempt per chunk is required");
        }
        if self.ack_timeout.is_zero() {
            bail!("ack timeout must be positive");
        }
        if self.session_timeout.is_zero() || self.sweep_interval.is_zero() {
            bail!("session timeout and sweep interval must be positive");
        }
        if self.max_sessions == 0 {
            bail!("the server must be able to hold at least one reassembly session");
        }
        Ok(())
    }

    /// The number of chunks a message of `max_message_size` bytes is split into
    pub fn max_chunks_per_message(&self) -> usize {
        self.max_message_size.div_ceil(self.max_chunk_size.max(1))
    }

    /// Size of the server's receive buffer for chunk datagrams. It is one byte bigger than the
    ///  largest valid datagram so that oversized datagrams show up as such instead of being
    ///  silently truncated to a valid size.
    pub fn chunk_receive_buffer_size(&self) -> usize {
        datagram_len(self.max_chunk_size) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        UdpConfig::default_ipv4().validate().unwrap();
    }

    #[test]
    fn test_chunk_too_big_for_datagram() {
        let mut config = UdpConfig::default_ipv4();
        config.max_chunk_size = 1445;
        assert!(config.validate().is_err());
        config.max_chunk_size = 1444;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_chunks_per_message() {
        let mut config = UdpConfig::default_ipv4();
        assert_eq!(config.max_chunks_per_message(), 11_984);

        config.max_message_size = 2800;
        assert_eq!(config.max_chunks_per_message(), 2);
        config.max_message_size = 2801;
        assert_eq!(config.max_chunks_per_message(), 3);

        config.max_message_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts() {
        let mut config = UdpConfig::default_ipv4();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
