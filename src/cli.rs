use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingArgs {
    pub target: String,
    pub count: u32,
    pub timeout_ms: u64,
    pub interval_ms: u64,
    pub ttl: u32,
    pub size: usize,
    pub strict_sequence: bool,
    pub random_identifier: bool,
}

impl Default for PingArgs {
    fn default() -> Self {
        Self {
            target: String::new(),
            count: 20,
            timeout_ms: 2000,
            interval_ms: 1000,
            ttl: 255,
            size: crate::icmp::DEFAULT_PAYLOAD_LEN,
            strict_sequence: false,
            random_identifier: false,
        }
    }
}

pub fn build_cli() -> Command {
    Command::new("echoping")
        .version("0.1.0")
        .about("Send ICMP echo requests to an IPv4 host and report round-trip times")
        .arg(
            Arg::new("target")
                .help("Target hostname or IPv4 address")
                .required(true)
                .index(1)
        )
        .arg(
            Arg::new("count")
                .short('c')
                .long("count")
                .help("Number of echo requests to send")
                .value_name("count")
                .value_parser(clap::value_parser!(u32))
        )
        .arg(
            Arg::new("timeout")
                .short('W')
                .long("timeout")
                .help("Milliseconds to wait for each reply")
                .value_name("ms")
                .value_parser(clap::value_parser!(u64))
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .help("Milliseconds to pause between requests")
                .value_name("ms")
                .value_parser(clap::value_parser!(u64))
        )
        .arg(
            Arg::new("ttl")
                .short('t')
                .long("ttl")
                .help("Time To Live of outgoing packets")
                .value_name("TTL")
                .value_parser(clap::value_parser!(u32))
        )
        .arg(
            Arg::new("size")
                .short('s')
                .long("size")
                .help("Payload bytes per request")
                .value_name("size")
                .value_parser(clap::value_parser!(usize))
        )
        .arg(
            Arg::new("strict_seq")
                .long("strict-seq")
                .help("Only accept replies whose sequence matches the request")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("random_id")
                .long("random-id")
                .help("Use a random ICMP identifier instead of the process id")
                .action(ArgAction::SetTrue)
        )
}

/// Parses the process arguments; clap prints usage and exits on errors.
pub fn parse_args() -> PingArgs {
    let argv = skip_unknown_flags(std::env::args_os());
    from_matches(&build_cli().get_matches_from(argv))
}

/// Drops flags `build_cli` does not define so they are accepted and ignored.
///
/// Unknown flags are treated as switches: the token after them is kept.
pub fn skip_unknown_flags<I, T>(argv: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut cmd = build_cli();
    // Registers the generated --help and --version flags.
    cmd.build();

    let mut kept = Vec::new();
    let mut tokens = argv.into_iter().map(Into::into);
    kept.extend(tokens.next());

    while let Some(token) = tokens.next() {
        let Some(text) = token.to_str() else {
            kept.push(token);
            continue;
        };

        if text == "--" {
            kept.push(token);
            kept.extend(tokens.by_ref());
            break;
        }

        let (known, needs_next) = if let Some(long) = text.strip_prefix("--") {
            let (name, inline_value) = match long.split_once('=') {
                Some((name, _)) => (name, true),
                None => (long, false),
            };
            match long_flag(&cmd, name) {
                Some(arg) => (true, takes_value(arg) && !inline_value),
                None => (false, false),
            }
        } else if let Some(short) = text.strip_prefix('-').filter(|s| !s.is_empty()) {
            let mut chars = short.chars();
            match chars.next().and_then(|c| short_flag(&cmd, c)) {
                Some(arg) => (true, takes_value(arg) && chars.as_str().is_empty()),
                None => (false, false),
            }
        } else {
            (true, false)
        };

        if !known {
            log::debug!("Ignoring unknown flag {}", text);
            continue;
        }
        kept.push(token);
        if needs_next {
            kept.extend(tokens.next());
        }
    }

    kept
}

fn short_flag(cmd: &Command, c: char) -> Option<&Arg> {
    cmd.get_arguments().find(|arg| arg.get_short() == Some(c))
}

fn long_flag<'a>(cmd: &'a Command, name: &str) -> Option<&'a Arg> {
    cmd.get_arguments().find(|arg| arg.get_long() == Some(name))
}

fn takes_value(arg: &Arg) -> bool {
    arg.get_action().takes_values()
}

pub fn from_matches(matches: &ArgMatches) -> PingArgs {
    let mut args = PingArgs::default();

    if let Some(target) = matches.get_one::<String>("target") {
        args.target = target.clone();
    }
    args.strict_sequence = matches.get_flag("strict_seq");
    args.random_identifier = matches.get_flag("random_id");

    if let Some(count) = matches.get_one::<u32>("count") {
        args.count = *count;
    }

    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        args.timeout_ms = *timeout;
    }

    if let Some(interval) = matches.get_one::<u64>("interval") {
        args.interval_ms = *interval;
    }

    if let Some(ttl) = matches.get_one::<u32>("ttl") {
        args.ttl = *ttl;
    }

    if let Some(size) = matches.get_one::<usize>("size") {
        args.size = *size;
    }

    args
}
