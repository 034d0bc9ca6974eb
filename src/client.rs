use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::anyhow;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, trace};
use crate::config::UdpConfig;
use crate::datagram_socket::DatagramSocket;
use crate::fragmenter::{chunk_datagrams, OutgoingChunk};
use crate::frame::FrameCodec;
use crate::retry::{ChunkTransmission, NextStep};

/// The sending side of the acknowledged protocol. It sends a message chunk by chunk, waiting
///  for each chunk's ack before moving on, so there is at most one unacknowledged chunk in
///  flight.
///
/// Concurrency across messages is achieved by running several clients, each with its own
///  socket. The message number is used as the sequence number on the wire, so it must be
///  unique per client.
pub struct AckClient {
    config: Arc<UdpConfig>,
    server_addr: SocketAddr,
    codec: FrameCodec,
    socket: Option<Arc<dyn DatagramSocket>>,
}

impl AckClient {
    /// The socket is connected lazily on the first send
    pub fn new(config: Arc<UdpConfig>, server_addr: SocketAddr) -> AckClient {
        AckClient {
            config,
            server_addr,
            codec: FrameCodec::acknowledged(),
            socket: None,
        }
    }

    pub fn with_socket(config: Arc<UdpConfig>, server_addr: SocketAddr, socket: Arc<dyn DatagramSocket>) -> AckClient {
        AckClient {
            config,
            server_addr,
            codec: FrameCodec::acknowledged(),
            socket: Some(socket),
        }
    }

    async fn socket(&mut self) -> anyhow::Result<Arc<dyn DatagramSocket>> {
        if let Some(socket) = &self.socket {
            return Ok(socket.clone());
        }

        let bind_addr: SocketAddr = if self.server_addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        }
        else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.server_addr).await?;
        info!("connected client socket {:?} to {:?}", socket.local_addr()?, self.server_addr);

        let socket: Arc<dyn DatagramSocket> = Arc::new(socket);
        self.socket = Some(socket.clone());
        Ok(socket)
    }

    /// Resolves once every chunk was acknowledged. If a chunk cannot be delivered, the
    ///  message is abandoned with a [crate::error::DeliveryError]; chunks sent before that may
    ///  well have arrived.
    pub async fn send_message(&mut self, sequence: u64, content: &[u8]) -> anyhow::Result<()> {
        self.config.validate()?;
        let socket = self.socket().await?;
        let chunks = chunk_datagrams(sequence, content, &self.config, &self.codec)?;

        trace!("sending message {} in {} chunks", sequence, chunks.len());
        for chunk in &chunks {
            self.send_chunk(socket.as_ref(), chunk).await?;
        }
        Ok(())
    }

    async fn send_chunk(&self, socket: &dyn DatagramSocket, chunk: &OutgoingChunk) -> anyhow::Result<()> {
        let mut transmission = ChunkTransmission::new(chunk.header, self.config.max_attempts);
        let mut deadline = Instant::now();

        loop {
            match transmission.next_step() {
                NextStep::Send => {
                    socket.send_datagram(&chunk.datagram).await?;
                    transmission.on_sent();
                    deadline = Instant::now() + self.config.ack_timeout;
                }
                NextStep::AwaitAck => {
                    match socket.recv_datagram_until(deadline).await? {
                        Some(reply) => {
                            if !transmission.on_reply(&reply) {
                                trace!("ignoring unrelated reply of {} bytes while waiting for ack of {:?}", reply.len(), chunk.header);
                            }
                        }
                        None => {
                            debug!("no ack for {:?} on attempt {}", chunk.header, transmission.attempts());
                            transmission.on_timeout();
                        }
                    }
                }
                NextStep::Done => return Ok(()),
                NextStep::GiveUp => {
                    debug!("giving up on message {} at chunk {:?}", chunk.header.sequence, chunk.header);
                    return Err(match transmission.failure() {
                        Some(e) => e.into(),
                        None => anyhow!("chunk transmission for {:?} gave up in state {:?}", chunk.header, transmission.state()),
                    });
                }
            }
        }
    }
}
