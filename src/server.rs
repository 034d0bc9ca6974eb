use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::anyhow;
use tokio::net::UdpSocket;
use tokio::select;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};
use uuid::Uuid;
use crate::chunk_header::ChunkHeader;
use crate::config::UdpConfig;
use crate::frame::FrameCodec;
use crate::message_handler::MessageHandler;
use crate::reassembler::{ChunkOutcome, Reassembler};

/// A receive loop running in its own task, together with the means to stop it
pub(crate) struct RunningLoop {
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl RunningLoop {
    pub(crate) async fn bind_and_spawn<F, Fut>(bind_addr: SocketAddr, receive_loop: F) -> anyhow::Result<RunningLoop>
    where
        F: FnOnce(UdpSocket, Arc<Notify>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let socket = UdpSocket::bind(bind_addr).await?;
        let local_addr = socket.local_addr()?;
        info!("bound receive socket to {:?}", local_addr);

        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(receive_loop(socket, shutdown.clone()));
        Ok(RunningLoop { local_addr, shutdown, handle })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the loop and waits for it to finish, which releases its socket
    pub(crate) async fn stop(self) -> anyhow::Result<()> {
        // a stored permit is picked up even if the loop is busy with a datagram right now
        self.shutdown.notify_one();
        self.handle.await
            .map_err(|e| anyhow!("receive loop for {:?} terminated abnormally: {}", self.local_addr, e))?;
        info!("receive loop for {:?} stopped", self.local_addr);
        Ok(())
    }
}

/// The receiving side of the acknowledged protocol: a single receive loop that validates
///  each chunk, stores it in the reassembly table and acknowledges it, one datagram at a time.
///
/// Since the loop is the only code touching the reassembly table, the table needs no locking.
///  Processing datagrams on several workers would require partitioning the table by sequence
///  number.
pub struct AckServer {
    config: Arc<UdpConfig>,
    bind_addr: SocketAddr,
    handler: Arc<dyn MessageHandler>,
    running: Option<RunningLoop>,
}

impl AckServer {
    pub fn new(config: Arc<UdpConfig>, bind_addr: SocketAddr, handler: Arc<dyn MessageHandler>) -> AckServer {
        AckServer {
            config,
            bind_addr,
            handler,
            running: None,
        }
    }

    /// Returns the address the server is actually bound to. Calling this on a running server
    ///  has no effect.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.local_addr());
        }
        self.config.validate()?;

        let config = self.config.clone();
        let handler = self.handler.clone();
        let running = RunningLoop::bind_and_spawn(self.bind_addr, move |socket, shutdown| {
            ReceiveLoop::new(socket, config, handler).run(shutdown)
        }).await?;

        let local_addr = running.local_addr();
        self.running = Some(running);
        Ok(local_addr)
    }

    /// This is safe to call if the server was never started
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        match self.running.take() {
            Some(running) => running.stop().await,
            None => Ok(()),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr())
    }
}

enum LoopEvent {
    Shutdown,
    Sweep,
    Datagram(std::io::Result<(usize, SocketAddr)>),
}

struct ReceiveLoop {
    socket: UdpSocket,
    config: Arc<UdpConfig>,
    codec: FrameCodec,
    reassembler: Reassembler,
    handler: Arc<dyn MessageHandler>,
}

impl ReceiveLoop {
    fn new(socket: UdpSocket, config: Arc<UdpConfig>, handler: Arc<dyn MessageHandler>) -> ReceiveLoop {
        ReceiveLoop {
            socket,
            reassembler: Reassembler::new(&config),
            config,
            codec: FrameCodec::acknowledged(),
            handler,
        }
    }

    async fn run(mut self, shutdown: Arc<Notify>) {
        info!("starting receive loop");

        let mut buf = vec![0u8; self.config.chunk_receive_buffer_size()];
        let mut sweep = interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = select! {
                _ = shutdown.notified() => LoopEvent::Shutdown,
                _ = sweep.tick() => LoopEvent::Sweep,
                received = self.socket.recv_from(&mut buf) => LoopEvent::Datagram(received),
            };

            match event {
                LoopEvent::Shutdown => {
                    debug!("shutdown requested, {} reassembly sessions are dropped", self.reassembler.num_sessions());
                    return;
                }
                LoopEvent::Sweep => self.on_sweep().await,
                LoopEvent::Datagram(Ok((num_read, from))) => {
                    let correlation_id = Uuid::new_v4();
                    let span = span!(Level::TRACE, "datagram_received", ?correlation_id);
                    self.on_datagram(&buf[..num_read], from)
                        .instrument(span)
                        .await;
                }
                LoopEvent::Datagram(Err(e)) => {
                    error!("socket error: {}", e);
                }
            }
        }
    }

    async fn on_datagram(&mut self, datagram: &[u8], from: SocketAddr) {
        trace!("received {} bytes from {:?}", datagram.len(), from);

        let mut parse_buf = datagram;
        let header = match ChunkHeader::deser(&mut parse_buf) {
            Some(header) => header,
            None => {
                debug!("datagram from {:?} is too short for a chunk header - dropping", from);
                return;
            }
        };

        let payload = match self.codec.decode(parse_buf) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("invalid frame in {:?} from {:?}: {} - dropping", header, from, e);
                return;
            }
        };

        let outcome = match self.reassembler.on_chunk(&header, payload, Instant::now()) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("rejected {:?} from {:?}: {} - dropping", header, from, e);
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&header.to_bytes(), from).await {
            // the sender will re-send the chunk, which is acknowledged again
            warn!("failed to send ack for {:?} to {:?}: {}", header, from, e);
        }

        match outcome {
            ChunkOutcome::Completed(content) => {
                self.handler.on_message_complete(header.sequence, content).await;
            }
            ChunkOutcome::Stored { received, total } => {
                trace!("stored chunk {} of message {}, {}/{} received", header.chunk_index, header.sequence, received, total);
            }
            ChunkOutcome::Duplicate { .. } | ChunkOutcome::AlreadyCompleted => {
                trace!("re-acknowledged duplicate {:?}", header);
            }
        }
    }

    async fn on_sweep(&mut self) {
        for expired in self.reassembler.evict_expired(Instant::now()) {
            if !expired.completed {
                self.handler.on_session_expired(expired).await;
            }
        }
    }
}
