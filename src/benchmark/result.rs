use std::fmt::Write;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkResult {
    pub protocol: String,
    pub total_time: Duration,
    pub messages_per_second: f64,

    /// sent, and confirmed by the receiver
    pub acknowledged: usize,
    /// sent, but nothing corroborates that they were received
    pub unconfirmed: usize,
    /// abandoned after exhausting all retries
    pub failed: usize,
    /// socket or network failures
    pub transport_errors: usize,

    /// messages that were not corroborated as received
    pub missing: usize,
}

impl BenchmarkResult {
    pub fn errors(&self) -> usize {
        self.failed + self.transport_errors
    }
}

/// Renders results as a fixed width table, one protocol per row
pub fn render_table(results: &[BenchmarkResult]) -> String {
    let mut table = String::new();
    let _ = writeln!(table, "{:<12} {:>12} {:>15} {:>8} {:>8} {:>8} {:>10} {:>10}",
                     "Protocol", "Time", "Msgs/sec", "Acked", "Unconf", "Failed", "Errors", "Missing");
    let _ = writeln!(table, "{}", "-".repeat(90));

    for r in results {
        let millis = Duration::from_millis(r.total_time.as_millis() as u64);
        let _ = writeln!(table, "{:<12} {:>12} {:>15.2} {:>8} {:>8} {:>8} {:>10} {:>10}",
                         r.protocol,
                         format!("{:?}", millis),
                         r.messages_per_second,
                         r.acknowledged,
                         r.unconfirmed,
                         r.failed,
                         r.errors(),
                         r.missing,
        );
    }
    table
}
