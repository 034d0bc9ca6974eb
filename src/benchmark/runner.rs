use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use crate::benchmark::payload::{generate_content, message_with_content};
use crate::benchmark::result::BenchmarkResult;
use crate::error::DeliveryError;
use crate::protocol::{Delivery, Protocol};

/// Sends a fixed number of synthetic messages through a protocol, one after the other, and
///  tallies the outcome.
pub struct Runner {
    /// Time the protocol's server gets to finish processing after the last send, before the
    ///  number of received messages is compared to the number sent
    settle_time: Duration,
}

impl Default for Runner {
    fn default() -> Self {
        Runner {
            settle_time: Duration::from_millis(500),
        }
    }
}

impl Runner {
    pub fn new(settle_time: Duration) -> Runner {
        Runner { settle_time }
    }

    /// `progress` is called after every message with the number of messages sent so far and
    ///  the number of errors so far.
    ///
    /// Only failures to send count as errors: a protocol that does not use acknowledgments
    ///  can lose messages silently, and that shows as `missing` in the result.
    pub async fn run(&self, protocol: &mut dyn Protocol, count: usize, size_kb: usize, mut progress: impl FnMut(usize, usize)) -> BenchmarkResult {
        let content = generate_content(size_kb);
        info!("running {} with {} messages of {} bytes each", protocol.name(), count, content.len());

        let mut acknowledged = 0;
        let mut unconfirmed = 0;
        let mut failed = 0;
        let mut transport_errors = 0;

        let start = Instant::now();
        for i in 0..count {
            let msg = message_with_content(i as u64, content.clone());
            match protocol.send_message(&msg).await {
                Ok(Delivery::Acknowledged) => acknowledged += 1,
                Ok(Delivery::Unconfirmed) => unconfirmed += 1,
                Err(e) => {
                    if e.downcast_ref::<DeliveryError>().is_some() {
                        debug!("giving up on message {}: {}", i, e);
                        failed += 1;
                    }
                    else {
                        warn!("error sending message {}: {}", i, e);
                        transport_errors += 1;
                    }
                }
            }
            progress(i + 1, failed + transport_errors);
        }
        let total_time = start.elapsed();

        let missing = match protocol.received_count() {
            Some(_) => {
                tokio::time::sleep(self.settle_time).await;
                let received = protocol.received_count().unwrap_or_default() as usize;
                count.saturating_sub(received)
            }
            None => failed + transport_errors,
        };

        let messages_per_second = if total_time.is_zero() {
            0.0
        }
        else {
            count as f64 / total_time.as_secs_f64()
        };

        let result = BenchmarkResult {
            protocol: protocol.name().to_string(),
            total_time,
            messages_per_second,
            acknowledged,
            unconfirmed,
            failed,
            transport_errors,
            missing,
        };
        info!("{} finished: {:?}", result.protocol, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use async_trait::async_trait;
    use rstest::rstest;
    use crate::message::Message;

    /// Plays back a fixed sequence of send outcomes
    struct ScriptedProtocol {
        outcomes: VecDeque<anyhow::Result<Delivery>>,
        send_time: Duration,
        received: Option<u64>,
        sent_numbers: Vec<u64>,
    }

    impl ScriptedProtocol {
        fn new(outcomes: Vec<anyhow::Result<Delivery>>, received: Option<u64>) -> ScriptedProtocol {
            ScriptedProtocol {
                outcomes: outcomes.into(),
                send_time: Duration::from_millis(10),
                received,
                sent_numbers: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Protocol for ScriptedProtocol {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn start_server(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn stop_server(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send_message(&mut self, msg: &Message) -> anyhow::Result<Delivery> {
            self.sent_numbers.push(msg.number);
            tokio::time::sleep(self.send_time).await;
            self.outcomes.pop_front()
                .unwrap_or(Ok(Delivery::Acknowledged))
        }

        fn received_count(&self) -> Option<u64> {
            self.received
        }
    }

    fn retries_exhausted() -> anyhow::Result<Delivery> {
        Err(DeliveryError::RetriesExhausted { chunk_index: 0, chunk_total: 1, attempts: 3 }.into())
    }

    fn transport_error() -> anyhow::Result<Delivery> {
        Err(anyhow::anyhow!("connection refused"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_tally() {
        let mut protocol = ScriptedProtocol::new(vec![
            Ok(Delivery::Acknowledged),
            retries_exhausted(),
            Ok(Delivery::Acknowledged),
            transport_error(),
            Ok(Delivery::Unconfirmed),
        ], None);

        let mut progress = Vec::new();
        let result = Runner::default()
            .run(&mut protocol, 5, 1, |sent, errors| progress.push((sent, errors)))
            .await;

        assert_eq!(protocol.sent_numbers, vec![0, 1, 2, 3, 4]);
        assert_eq!(progress, vec![(1, 0), (2, 1), (3, 1), (4, 2), (5, 2)]);

        assert_eq!(result.protocol, "scripted");
        assert!(result.total_time >= Duration::from_millis(50));
        assert!(result.total_time < Duration::from_millis(60));
        assert!(result.messages_per_second > 80.0 && result.messages_per_second <= 100.0);
        assert_eq!(result.acknowledged, 2);
        assert_eq!(result.unconfirmed, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.transport_errors, 1);
        assert_eq!(result.errors(), 2);
        assert_eq!(result.missing, 2);
    }

    #[rstest]
    #[case::all_received(Some(10), 0)]
    #[case::some_lost(Some(7), 3)]
    #[case::more_than_sent(Some(12), 0)]
    #[tokio::test(start_paused = true)]
    async fn test_missing_from_received_count(#[case] received: Option<u64>, #[case] expected_missing: usize) {
        let outcomes = (0..10).map(|_| Ok(Delivery::Unconfirmed)).collect();
        let mut protocol = ScriptedProtocol::new(outcomes, received);

        let result = Runner::new(Duration::from_millis(200))
            .run(&mut protocol, 10, 0, |_, _| {})
            .await;

        assert_eq!(result.unconfirmed, 10);
        assert_eq!(result.errors(), 0);
        assert_eq!(result.missing, expected_missing);
        // the settle time is not part of the measurement
        assert!(result.total_time < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_messages() {
        let mut protocol = ScriptedProtocol::new(vec![], None);
        let result = Runner::default()
            .run(&mut protocol, 0, 1, |_, _| panic!("no progress expected"))
            .await;

        assert!(protocol.sent_numbers.is_empty());
        assert_eq!(result.messages_per_second, 0.0);
        assert_eq!(result.missing, 0);
    }
}
