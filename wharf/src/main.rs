use std::{sync::Arc, time::Duration};

use clap::Parser;
use ferry::{Limits, NetworkCannon};
use log::info;

mod dispatch;
mod pipeline;

use pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Send and receive images over TCP, one operation after another.
///
/// Options come first, then the operations, e.g.
/// `wharf --connect-timeout-ms 500 -receive 5243 -send otherhost`.
/// Run `wharf -help` for the list of operations.
struct Args {
    /// Largest image -receive accepts, in MiB
    #[arg(long, default_value_t = 1024)]
    max_payload_mib: usize,

    /// Give up dialing after this many milliseconds (-send)
    #[arg(long)]
    connect_timeout_ms: Option<u64>,
}

impl Args {
    fn limits(&self) -> ferry::Result<Limits> {
        let bytes = self.max_payload_mib.checked_mul(1 << 20).ok_or_else(|| {
            ferry::Error::argument(format!(
                "--max-payload-mib {} does not fit in memory",
                self.max_payload_mib
            ))
        })?;
        let limits = Limits::default().with_max_payload_bytes(bytes);
        Ok(match self.connect_timeout_ms {
            Some(ms) => limits.with_connect_timeout(Duration::from_millis(ms)),
            None => limits,
        })
    }
}

/// Split the command line into wharf's own `--options` and the operations
/// starting at the first single dash token.
fn split_command_line(argv: Vec<String>) -> (Vec<String>, Vec<String>) {
    let first_op = argv
        .iter()
        .skip(1)
        .position(|t| t.starts_with('-') && !t.starts_with("--"))
        .map_or(argv.len(), |p| p + 1);
    let mut options = argv;
    let ops = options.split_off(first_op);
    (options, ops)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (options, tokens) = split_command_line(std::env::args().collect());
    let args = Args::parse_from(options);
    let limits = args.limits()?;

    let program = dispatch::parse(&tokens)?;
    if program.is_empty() {
        println!("Usage: wharf [OPTIONS] -operation [args] [-operation [args]]...");
        println!("Run `wharf -help` for the list of operations, `wharf --help` for the options.");
        return Ok(());
    }

    let registry = ferry::registry::global();
    let cannon = NetworkCannon::new(Arc::clone(&registry), limits.clone());
    let mut pipeline = Pipeline::new(cannon, Arc::clone(&registry), limits);

    let res = pipeline.run(&program).await;

    let released = registry.shutdown();
    if released > 0 {
        info!("Closed {released} listening socket(s)");
    }
    res?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn options_before_operations() {
        let (options, ops) =
            split_command_line(argv("wharf --connect-timeout-ms 500 -receive 5243 -send far"));
        assert_eq!(options, argv("wharf --connect-timeout-ms 500"));
        assert_eq!(ops, argv("-receive 5243 -send far"));

        let args = Args::parse_from(options);
        assert_eq!(
            args.limits().unwrap(),
            Limits::default().with_connect_timeout(Duration::from_millis(500))
        );
    }

    #[test]
    fn loop_bodies_stay_with_the_operations() {
        let (options, ops) = split_command_line(argv("wharf -loop --receive --send"));
        assert_eq!(options, argv("wharf"));
        assert_eq!(ops, argv("-loop --receive --send"));
    }

    #[test]
    fn payload_limit_in_mib() {
        let limits = Args::parse_from(argv("wharf --max-payload-mib 2"))
            .limits()
            .unwrap();
        assert_eq!(limits.max_payload_bytes, 2 << 20);
        assert_eq!(limits.connect_timeout, None);
    }

    #[test]
    fn oversized_payload_limit_is_a_usage_error() {
        let huge = format!("wharf --max-payload-mib {}", 1usize << 44);
        let res = Args::parse_from(argv(&huge)).limits();
        assert!(matches!(res, Err(ferry::Error::Argument(_))));

        let res = Args::parse_from(argv(&format!("wharf --max-payload-mib {}", usize::MAX))).limits();
        assert!(matches!(res, Err(ferry::Error::Argument(_))));
    }
}
