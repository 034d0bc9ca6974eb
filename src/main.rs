use std::sync::Arc;
use clap::{Parser, ValueEnum};
use clap_derive::{Parser, ValueEnum};
use tracing::{info, Level};
use protobench::benchmark::payload::DEFAULT_MESSAGE_SIZE_KB;
use protobench::benchmark::result::{render_table, BenchmarkResult};
use protobench::benchmark::runner::Runner;
use protobench::config::UdpConfig;
use protobench::protocol::Protocol;
use protobench::udp_ack::UdpAckProtocol;
use protobench::udp_fast::UdpFastProtocol;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProtocolChoice {
    UdpAck,
    UdpFast,
    All,
}

#[derive(Parser)]
struct Args {
    /// number of messages to send per protocol
    #[clap(short = 'n', long, default_value_t = 1000)]
    count: usize,

    /// message size in KiB; 0 for a payload of 1000 records, which is too big for UDP-Fast
    #[clap(long, default_value_t = DEFAULT_MESSAGE_SIZE_KB)]
    kb: usize,

    #[clap(long, value_enum, default_value_t = ProtocolChoice::All)]
    protocol: ProtocolChoice,

    /// UDP-ACK listens on this port, UDP-Fast on the next one
    #[clap(long, default_value_t = 8082)]
    base_port: u16,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

impl Args {
    fn protocols(&self, config: Arc<UdpConfig>) -> anyhow::Result<Vec<Box<dyn Protocol>>> {
        let fast_port = self.base_port.checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("base port {} leaves no room for a second port", self.base_port))?;

        let mut result: Vec<Box<dyn Protocol>> = Vec::new();
        if matches!(self.protocol, ProtocolChoice::UdpAck | ProtocolChoice::All) {
            result.push(Box::new(UdpAckProtocol::new(config.clone(), self.base_port)));
        }
        if matches!(self.protocol, ProtocolChoice::UdpFast | ProtocolChoice::All) {
            result.push(Box::new(UdpFastProtocol::new(config, fast_port)));
        }
        Ok(result)
    }
}

async fn run_protocol(protocol: &mut dyn Protocol, args: &Args) -> anyhow::Result<BenchmarkResult> {
    protocol.start_server().await?;

    let report_every = (args.count / 10).max(1);
    let name = protocol.name().to_string();
    let result = Runner::default()
        .run(protocol, args.count, args.kb, |sent, errors| {
            if sent % report_every == 0 || sent == args.count {
                info!("{}: sent {} of {} messages, {} errors", name, sent, args.count, errors);
            }
        })
        .await;

    protocol.stop_server().await?;
    Ok(result)
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let config = Arc::new(UdpConfig::default_ipv4());
    config.validate()?;

    let mut results = Vec::new();
    for mut protocol in args.protocols(config)? {
        info!("benchmarking {}", protocol.name());
        results.push(run_protocol(protocol.as_mut(), &args).await?);
    }

    println!();
    print!("{}", render_table(&results));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["protobench"]).unwrap();
        assert_eq!(args.count, 1000);
        assert_eq!(args.kb, DEFAULT_MESSAGE_SIZE_KB);
        assert_eq!(args.protocol, ProtocolChoice::All);
        assert_eq!(args.base_port, 8082);
    }

    #[test]
    fn test_protocol_selection() {
        let args = Args::try_parse_from(["protobench", "--protocol", "udp-fast", "--kb", "0", "-n", "5"]).unwrap();
        assert_eq!(args.protocol, ProtocolChoice::UdpFast);
        assert_eq!(args.kb, 0);
        assert_eq!(args.count, 5);

        let protocols = args.protocols(Arc::new(UdpConfig::default_ipv4())).unwrap();
        assert_eq!(protocols.iter().map(|p| p.name()).collect::<Vec<_>>(), vec!["UDP-Fast"]);
    }
}
