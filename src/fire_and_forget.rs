use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::bail;
use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio::select;
use tokio::sync::Notify;
use tracing::{debug, error, info, span, trace, Instrument, Level};
use uuid::Uuid;
use crate::config::UdpConfig;
use crate::datagram_socket::DatagramSocket;
use crate::frame::FrameCodec;
use crate::message::{Message, MessageBody};
use crate::message_handler::MessageHandler;
use crate::server::RunningLoop;

/// The largest payload a UDP datagram can carry over IPV4
const MAX_UDP_PAYLOAD: usize = 65_507;

/// The baseline variant: every message is written to the socket exactly once as a single
///  checksummed frame. There is no chunking, no acknowledgment and no retry, so a successful
///  send only means that the datagram left this host.
pub struct FastClient {
    server_addr: SocketAddr,
    codec: FrameCodec,
    socket: Option<Arc<dyn DatagramSocket>>,
}

impl FastClient {
    pub fn new(server_addr: SocketAddr) -> FastClient {
        FastClient {
            server_addr,
            codec: FrameCodec::fire_and_forget(),
            socket: None,
        }
    }

    pub fn with_socket(server_addr: SocketAddr, socket: Arc<dyn DatagramSocket>) -> FastClient {
        FastClient {
            server_addr,
            codec: FrameCodec::fire_and_forget(),
            socket: Some(socket),
        }
    }

    async fn socket(&mut self) -> anyhow::Result<Arc<dyn DatagramSocket>> {
        if let Some(socket) = &self.socket {
            return Ok(socket.clone());
        }

        let socket = UdpSocket::bind(if self.server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" }).await?;
        socket.connect(self.server_addr).await?;
        info!("connected fire-and-forget socket {:?} to {:?}", socket.local_addr()?, self.server_addr);

        let socket: Arc<dyn DatagramSocket> = Arc::new(socket);
        self.socket = Some(socket.clone());
        Ok(socket)
    }

    pub async fn send_message(&mut self, msg: &Message) -> anyhow::Result<()> {
        let body = MessageBody::from(msg).format();

        let mut frame = BytesMut::new();
        self.codec.encode(body.as_bytes(), &mut frame)?;
        if frame.len() > MAX_UDP_PAYLOAD {
            bail!("message {} needs a {} byte datagram, UDP allows at most {}", msg.number, frame.len(), MAX_UDP_PAYLOAD);
        }

        let socket = self.socket().await?;
        socket.send_datagram(&frame).await
    }
}

/// Receives fire-and-forget frames, handing every valid one to the handler. Frames are
///  independent of each other, and nothing is ever sent back.
pub struct FastServer {
    config: Arc<UdpConfig>,
    bind_addr: SocketAddr,
    handler: Arc<dyn MessageHandler>,
    running: Option<RunningLoop>,
}

impl FastServer {
    pub fn new(config: Arc<UdpConfig>, bind_addr: SocketAddr, handler: Arc<dyn MessageHandler>) -> FastServer {
        FastServer {
            config,
            bind_addr,
            handler,
            running: None,
        }
    }

    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.local_addr());
        }

        let buffer_size = self.config.fire_and_forget_buffer_size;
        let handler = self.handler.clone();
        let running = RunningLoop::bind_and_spawn(self.bind_addr, move |socket, shutdown| {
            receive_loop(socket, buffer_size, handler, shutdown)
        }).await?;

        let local_addr = running.local_addr();
        self.running = Some(running);
        Ok(local_addr)
    }

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

async fn receive_loop(socket: UdpSocket, buffer_size: usize, handler: Arc<dyn MessageHandler>, shutdown: Arc<Notify>) {
    info!("starting fire-and-forget receive loop");

    let codec = FrameCodec::fire_and_forget();
    let mut buf = vec![0u8; buffer_size];
    loop {
        let received = select! {
            _ = shutdown.notified() => None,
            received = socket.recv_from(&mut buf) => Some(received),
        };

        let (num_read, from) = match received {
            None => return,
            Some(Ok(x)) => x,
            Some(Err(e)) => {
                error!("socket error: {}", e);
                continue;
            }
        };

        let correlation_id = Uuid::new_v4();
        let span = span!(Level::TRACE, "datagram_received", ?correlation_id);
        on_frame(&codec, &buf[..num_read], from, handler.as_ref())
            .instrument(span)
            .await;
    }
}

async fn on_frame(codec: &FrameCodec, frame: &[u8], from: SocketAddr, handler: &dyn MessageHandler) {
    trace!("received {} bytes from {:?}", frame.len(), from);

    let payload = match codec.decode(frame) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("invalid frame from {:?}: {} - dropping", from, e);
            return;
        }
    };

    let body = match std::str::from_utf8(payload).map_err(anyhow::Error::from).and_then(MessageBody::parse) {
        Ok(body) => body,
        Err(e) => {
            debug!("unparseable message body from {:?}: {} - dropping", from, e);
            return;
        }
    };

    handler.on_fire_and_forget(body).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use mockall::predicate::{eq, function};
    use crate::datagram_socket::MockDatagramSocket;
    use crate::message_handler::{CountingHandler, MockMessageHandler};

    fn message(number: u64, content: &str) -> Message {
        Message {
            id: format!("msg-{}", number),
            timestamp: SystemTime::now(),
            content: content.to_string(),
            number,
            is_valid: true,
        }
    }

    #[tokio::test]
    async fn test_send_writes_single_frame() {
        let mut socket = MockDatagramSocket::new();
        socket.expect_send_datagram()
            .with(function(|datagram: &[u8]| {
                FrameCodec::fire_and_forget().decode(datagram) == Ok(b"ID:msg-3|CONTENT:hello|NUMBER:3".as_slice())
            }))
            .times(1)
            .returning(|_| Ok(()));
        socket.expect_recv_datagram_until()
            .never();

        let mut client = FastClient::with_socket(SocketAddr::from(([127, 0, 0, 1], 8083)), Arc::new(socket));
        client.send_message(&message(3, "hello")).await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected() {
        let mut socket = MockDatagramSocket::new();
        socket.expect_send_datagram()
            .never();

        let mut client = FastClient::with_socket(SocketAddr::from(([127, 0, 0, 1], 8083)), Arc::new(socket));
        assert!(client.send_message(&message(1, &"x".repeat(MAX_UDP_PAYLOAD))).await.is_err());
    }

    #[tokio::test]
    async fn test_server_counts_valid_frames() {
        let handler = Arc::new(CountingHandler::default());
        let mut server = FastServer::new(
            Arc::new(UdpConfig::default_ipv4()),
            SocketAddr::from(([127, 0, 0, 1], 0)),
            handler.clone(),
        );
        let addr = server.start().await.unwrap();

        let mut client = FastClient::new(addr);
        for i in 0..5 {
            client.send_message(&message(i, "some content")).await.unwrap();
        }

        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut wrong_magic = BytesMut::new();
        FrameCodec::acknowledged().encode(b"ID:x|CONTENT:y|NUMBER:1", &mut wrong_magic).unwrap();
        raw.send_to(&wrong_magic, addr).await.unwrap();
        let mut not_a_body = BytesMut::new();
        FrameCodec::fire_and_forget().encode(b"just bytes", &mut not_a_body).unwrap();
        raw.send_to(&not_a_body, addr).await.unwrap();

        for _ in 0..100 {
            if handler.num_fire_and_forget() >= 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.num_fire_and_forget(), 5);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_on_frame_hands_valid_body_to_handler() {
        let mut handler = MockMessageHandler::new();
        handler.expect_on_fire_and_forget()
            .with(eq(MessageBody { id: "msg-9".to_string(), content: "a|b".to_string(), number: 9 }))
            .times(1)
            .returning(|_| ());
        handler.expect_on_message_complete()
            .never();

        let codec = FrameCodec::fire_and_forget();
        let from = SocketAddr::from(([127, 0, 0, 1], 9999));

        let mut valid = BytesMut::new();
        codec.encode(b"ID:msg-9|CONTENT:a|b|NUMBER:9", &mut valid).unwrap();
        on_frame(&codec, &valid, from, &handler).await;

        let mut corrupted = valid.clone();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 1;
        on_frame(&codec, &corrupted, from, &handler).await;

        let mut not_utf8 = BytesMut::new();
        codec.encode(&[0xff, 0xfe, 0xfd], &mut not_utf8).unwrap();
        on_frame(&codec, &not_utf8, from, &handler).await;
    }
}
