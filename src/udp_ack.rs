use std::net::SocketAddr;
use std::sync::Arc;
use async_trait::async_trait;
use crate::client::AckClient;
use crate::config::UdpConfig;
use crate::message::Message;
use crate::message_handler::CountingHandler;
use crate::protocol::{Delivery, Protocol};
use crate::server::AckServer;

/// Chunked, checksummed and acknowledged messages over UDP
pub struct UdpAckProtocol {
    config: Arc<UdpConfig>,
    port: u16,
    server: AckServer,
    handler: Arc<CountingHandler>,
    client: Option<AckClient>,
}

impl UdpAckProtocol {
    pub const NAME: &'static str = "UDP-ACK";

    /// The server listens on all interfaces; the client sends to the loopback address
    pub fn new(config: Arc<UdpConfig>, port: u16) -> UdpAckProtocol {
        let handler = Arc::new(CountingHandler::default());
        UdpAckProtocol {
            server: AckServer::new(config.clone(), SocketAddr::from(([0, 0, 0, 0], port)), handler.clone()),
            config,
            port,
            handler,
            client: None,
        }
    }

    fn server_addr(&self) -> SocketAddr {
        let port = self.server.local_addr()
            .map(|a| a.port())
            .unwrap_or(self.port);
        SocketAddr::from(([127, 0, 0, 1], port))
    }
}

#[async_trait]
impl Protocol for UdpAckProtocol {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn start_server(&mut self) -> anyhow::Result<()> {
        self.server.start().await?;
        Ok(())
    }

    async fn stop_server(&mut self) -> anyhow::Result<()> {
        self.server.stop().await
    }

    async fn send_message(&mut self, msg: &Message) -> anyhow::Result<Delivery> {
        let server_addr = self.server_addr();
        let config = self.config.clone();
        let client = self.client.get_or_insert_with(|| AckClient::new(config, server_addr));
        client.send_message(msg.number, msg.content.as_bytes()).await?;
        Ok(Delivery::Acknowledged)
    }

    fn received_count(&self) -> Option<u64> {
        Some(self.handler.num_completed())
    }
}
