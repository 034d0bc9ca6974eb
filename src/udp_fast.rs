use std::net::SocketAddr;
use std::sync::Arc;
use async_trait::async_trait;
use crate::config::UdpConfig;
use crate::fire_and_forget::{FastClient, FastServer};
use crate::message::Message;
use crate::message_handler::CountingHandler;
use crate::protocol::{Delivery, Protocol};

/// Single unacknowledged frames over UDP, as a baseline for [crate::udp_ack::UdpAckProtocol]
pub struct UdpFastProtocol {
    port: u16,
    server: FastServer,
    handler: Arc<CountingHandler>,
    client: Option<FastClient>,
}

impl UdpFastProtocol {
    pub const NAME: &'static str = "UDP-Fast";

    pub fn new(config: Arc<UdpConfig>, port: u16) -> UdpFastProtocol {
        let handler = Arc::new(CountingHandler::default());
        UdpFastProtocol {
            server: FastServer::new(config, SocketAddr::from(([0, 0, 0, 0], port)), handler.clone()),
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
impl Protocol for UdpFastProtocol {
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
        let client = self.client.get_or_insert_with(|| FastClient::new(server_addr));
        client.send_message(msg).await?;
        Ok(Delivery::Unconfirmed)
    }

    fn received_count(&self) -> Option<u64> {
        Some(self.handler.num_fire_and_forget())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use crate::benchmark::payload::DEFAULT_MESSAGE_SIZE_KB;
    use crate::benchmark::runner::Runner;

    #[tokio::test]
    async fn test_send_through_protocol() {
        let mut protocol = UdpFastProtocol::new(Arc::new(UdpConfig::default_ipv4()), 0);
        assert_eq!(protocol.name(), "UDP-Fast");
        protocol.start_server().await.unwrap();

        for number in 0..3 {
            let msg = Message {
                id: format!("msg-{}", number),
                timestamp: SystemTime::now(),
                content: "y".repeat(5000),
                number,
                is_valid: true,
            };
            assert_eq!(protocol.send_message(&msg).await.unwrap(), Delivery::Unconfirmed);
        }

        for _ in 0..100 {
            if protocol.received_count() == Some(3) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(protocol.received_count(), Some(3));
        protocol.stop_server().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut protocol = UdpFastProtocol::new(Arc::new(UdpConfig::default_ipv4()), 0);
        protocol.stop_server().await.unwrap();
        assert_eq!(protocol.received_count(), Some(0));
    }

    #[tokio::test]
    async fn test_default_message_size_fits_a_datagram() {
        let mut protocol = UdpFastProtocol::new(Arc::new(UdpConfig::default_ipv4()), 0);
        protocol.start_server().await.unwrap();

        let result = Runner::new(Duration::from_millis(100))
            .run(&mut protocol, 5, DEFAULT_MESSAGE_SIZE_KB, |_, _| {})
            .await;

        assert_eq!(result.transport_errors, 0);
        assert_eq!(result.unconfirmed, 5);
        protocol.stop_server().await.unwrap();
    }
}
