mod cli;
mod dns;
mod error;
mod icmp;
mod probe;
mod report;
mod utils;

use anyhow::Context;
use icmp::IcmpSocket;
use probe::{MatchPolicy, Prober, Session};
use std::time::Duration;

/// Validates the arguments, resolves the target and opens the socket.
async fn prepare(args: &cli::PingArgs) -> anyhow::Result<Prober<IcmpSocket>> {
    utils::validate_ping_params(args.count, args.timeout_ms, args.ttl, args.size)?;

    let destination = dns::resolve_hostname(&args.target)
        .await
        .with_context(|| format!("cannot ping '{}'", args.target))?;

    let socket = IcmpSocket::open(args.ttl)?;

    let session = Session {
        destination,
        display: destination.to_string(),
        identifier: utils::session_identifier(args.random_identifier),
        count: args.count,
        timeout: Duration::from_millis(args.timeout_ms),
        interval: Duration::from_millis(args.interval_ms),
        payload_size: args.size,
        match_policy: if args.strict_sequence {
            MatchPolicy::IdentifierAndSequence
        } else {
            MatchPolicy::IdentifierOnly
        },
    };
    log::debug!("Session: {:?}", session);

    Ok(Prober::new(socket, session))
}

#[tokio::main]
async fn main() {
    // Enable debug logging if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
    }

    let args = cli::parse_args();

    let mut prober = match prepare(&args).await {
        Ok(prober) => prober,
        Err(e) => utils::exit_with_error(&format!("{:#}", e), 1),
    };

    println!(
        "{}",
        report::format_header(&args.target, &prober.session().display, args.size)
    );

    let mut shutdown_signal = utils::setup_signal_handler();
    let completed = prober
        .run(&mut shutdown_signal, |result| {
            log::debug!(
                "{} icmp_seq={} succeeded={} rtt={:?}",
                result.destination,
                result.sequence,
                result.succeeded(),
                result.round_trip_time()
            );
            println!("{}", report::format_result(&result));
        })
        .await;

    log::debug!("{} of {} probes completed", completed, args.count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PingError;

    #[tokio::test]
    async fn test_prepare_validates_before_resolving() {
        let args = cli::PingArgs {
            target: "no-such-host.invalid".to_string(),
            count: 0,
            ..Default::default()
        };
        let Err(err) = prepare(&args).await else {
            panic!("zero count accepted");
        };
        assert!(matches!(err.downcast_ref::<PingError>(), Some(PingError::Config(_))));
    }

    #[tokio::test]
    async fn test_prepare_names_target_on_resolution_failure() {
        let args = cli::PingArgs {
            target: "::1".to_string(),
            ..Default::default()
        };
        let Err(err) = prepare(&args).await else {
            panic!("IPv6 target accepted");
        };
        assert!(format!("{:#}", err).starts_with("cannot ping '::1': "));
        assert!(matches!(err.downcast_ref::<PingError>(), Some(PingError::Resolution(_))));
    }
}
