use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use anyhow::bail;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::trace;

/// Replies longer than this are truncated on receipt; they are never valid acks anyway
const REPLY_BUF_LEN: usize = 64;

/// This is an abstraction for a UDP socket connected to a single peer, introduced to facilitate
///  mocking the I/O part away for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatagramSocket: Send + Sync + 'static {
    async fn send_datagram(&self, datagram: &[u8]) -> anyhow::Result<()>;

    /// Returns `None` if no datagram arrived before the deadline
    async fn recv_datagram_until(&self, deadline: Instant) -> anyhow::Result<Option<Vec<u8>>>;
}

#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn send_datagram(&self, datagram: &[u8]) -> anyhow::Result<()> {
        trace!("UDP socket: sending {} bytes to {:?}", datagram.len(), self.peer_addr());

        let num_written = self.send(datagram).await?;
        if num_written != datagram.len() {
            bail!("datagram was truncated on send: {} of {} bytes", num_written, datagram.len());
        }
        Ok(())
    }

    async fn recv_datagram_until(&self, deadline: Instant) -> anyhow::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; REPLY_BUF_LEN];
        match timeout_at(deadline, self.recv(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(num_read)) => {
                buf.truncate(num_read);
                Ok(Some(buf))
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }
}
