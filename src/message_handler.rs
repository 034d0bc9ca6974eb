use std::sync::atomic::{AtomicU64, Ordering};
use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tracing::debug;
use crate::message::MessageBody;
use crate::reassembler::ExpiredSession;

/// The consumer of whatever the servers receive. Completion and expiry of reassembly sessions
///  are reported as explicit events; a message is reported complete exactly once, and an
///  incomplete message is reported as expired exactly once.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn on_message_complete(&self, sequence: u64, content: Vec<u8>);

    async fn on_session_expired(&self, expired: ExpiredSession);

    async fn on_fire_and_forget(&self, body: MessageBody);
}

/// Keeps track of the number of messages received, discarding the messages themselves. This
///  is all the benchmark needs to corroborate delivery.
#[derive(Default)]
pub struct CountingHandler {
    completed: AtomicU64,
    expired: AtomicU64,
    fire_and_forget: AtomicU64,
}

impl CountingHandler {
    pub fn num_completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn num_expired(&self) -> u64 {
        self.expired.load(Ordering::Acquire)
    }

    pub fn num_fire_and_forget(&self) -> u64 {
        self.fire_and_forget.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MessageHandler for CountingHandler {
    async fn on_message_complete(&self, _sequence: u64, _content: Vec<u8>) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    async fn on_session_expired(&self, expired: ExpiredSession) {
        debug!("message {} expired with {} of {} chunks", expired.sequence, expired.received, expired.total);
        self.expired.fetch_add(1, Ordering::AcqRel);
    }

    async fn on_fire_and_forget(&self, _body: MessageBody) {
        self.fire_and_forget.fetch_add(1, Ordering::AcqRel);
    }
}
