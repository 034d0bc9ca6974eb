use async_trait::async_trait;
use crate::message::Message;

/// How far a successful send is known to have gotten
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The receiver confirmed that it got the whole message
    Acknowledged,
    /// The message was written to the wire, but nothing corroborates that it was received
    Unconfirmed,
}

/// The capability every protocol under test provides to the benchmark driver. Each
///  implementation brings its own server, and the server must be started before the first
///  message is sent.
///
/// A failure to send is an `Err`; if it is a [crate::error::DeliveryError], the protocol gave up
///  on the message after exhausting its retries, otherwise the environment (socket, network)
///  is broken.
#[async_trait]
pub trait Protocol: Send {
    fn name(&self) -> &str;

    async fn start_server(&mut self) -> anyhow::Result<()>;

    /// This is safe to call if the server was never started
    async fn stop_server(&mut self) -> anyhow::Result<()>;

    /// Connections to the server are established lazily by the first call
    async fn send_message(&mut self, msg: &Message) -> anyhow::Result<Delivery>;

    /// The number of messages the protocol's own server has received completely, if it keeps
    ///  track
    fn received_count(&self) -> Option<u64> {
        None
    }
}
