mod config;
mod error;
mod packet;
mod ping;
mod report;
mod session;
mod stats;
mod util;

use colored::*;

use clap::{App, AppSettings, Arg, ArgMatches};

use std::error::Error;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use config::{Iterations, SequencePolicy, SessionConfig};
use error::{PingError, Result};
use ping::Pinger;
use session::Session;

fn app() -> App<'static, 'static> {
    App::new("gping")
        .setting(AppSettings::ColoredHelp)
        .version("v0.1.0")
        .about("Send ICMP ECHO_REQUEST packets to a host and report round trip statistics.\nNeeds permission to open a raw socket (root or CAP_NET_RAW).")
        .arg(Arg::with_name("DESTINATION")
            .help("Hostname or IPv4 address")
            .required(true)
            .index(1))
        .arg(Arg::with_name("timeout")
            .help("Time to wait for each reply, in milliseconds or as a duration like 2s (Default 1500)")
            .short("w")
            .takes_value(true))
        .arg(Arg::with_name("count")
            .help("Number of echo requests to send (Default 4)")
            .short("n")
            .takes_value(true))
        .arg(Arg::with_name("size")
            .help("Payload size in bytes (Default 32)")
            .short("l")
            .takes_value(true))
        .arg(Arg::with_name("until-stopped")
            .help("Ping the host until stopped with Ctrl+C")
            .short("t"))
        .arg(Arg::with_name("max-failures")
            .help("Give up after this many consecutive failures (Default 10)")
            .short("f")
            .takes_value(true))
        .arg(Arg::with_name("interval")
            .help("Pause after each reply, in seconds or as a duration like 500ms (Default 1)")
            .short("s")
            .takes_value(true))
        .arg(Arg::with_name("incrementing-seq")
            .help("Increment the ICMP sequence number per request instead of always sending 1")
            .short("q"))
        .arg(Arg::with_name("no-color")
            .help("Disable colored output")
            .long("no-color"))
        .arg(Arg::with_name("verbose")
            .help("Print diagnostics to stderr (repeat for more)")
            .short("v")
            .multiple(true))
}

fn parse_number<T: std::str::FromStr>(matches: &ArgMatches<'_>, name: &str, default: T) -> Result<T> {
    match matches.value_of(name) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|_| PingError::InvalidConfig(format!("invalid value for {}: {}", name, v))),
    }
}

fn session_config(matches: &ArgMatches<'_>) -> Result<SessionConfig> {
    let defaults = SessionConfig::default();

    let target = matches.value_of("DESTINATION").unwrap_or_default().to_string();
    let address = util::resolve_dest(&target)?;

    let timeout = match matches.value_of("timeout") {
        Some(v) => config::parse_duration(v, Duration::from_millis(1))?,
        None => defaults.timeout,
    };
    let interval = match matches.value_of("interval") {
        Some(v) => config::parse_duration(v, Duration::from_secs(1))?,
        None => defaults.interval,
    };

    let iterations = if matches.is_present("until-stopped") {
        Iterations::UntilStopped
    } else {
        Iterations::Count(parse_number(matches, "count", 4)?)
    };

    let sequence_policy = if matches.is_present("incrementing-seq") {
        SequencePolicy::Incrementing
    } else {
        SequencePolicy::Constant
    };

    let config = SessionConfig {
        target,
        address,
        timeout,
        iterations,
        payload_size: parse_number(matches, "size", defaults.payload_size)?,
        max_consecutive_failures: parse_number(matches, "max-failures", defaults.max_consecutive_failures)?,
        interval,
        sequence_policy,
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(verbosity: u64) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install log subscriber: {}", e);
    }
}

fn run(config: &SessionConfig) -> Result<()> {
    let pinger = Pinger::new(config.address).map_err(PingError::Socket)?;

    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        s.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Ctrl+C will not print statistics: {}", e);
    }

    println!("{}", report::banner(config));

    let summary = Session::new(config, pinger).run(&stop, |event| {
        println!("{}", report::event(config, &event));
    })?;

    for line in report::summary(config, &summary) {
        println!("{}", line);
    }
    Ok(())
}

fn main() {
    let matches = app().get_matches();

    init_tracing(matches.occurrences_of("verbose"));
    if matches.is_present("no-color") {
        colored::control::set_override(false);
    }

    let config = match session_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            process::exit(2);
        }
    };
    tracing::debug!("{:?}", config);

    if let Err(e) = run(&config) {
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(&format!(": {}", cause));
            source = cause.source();
        }
        eprintln!("{} {}", "error:".red().bold(), message);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<SessionConfig> {
        let matches = app().get_matches_from_safe(args).unwrap();
        session_config(&matches)
    }

    #[test]
    fn defaults_from_bare_destination() {
        let config = parse(&["gping", "127.0.0.1"]).unwrap();
        assert_eq!(config.target, "127.0.0.1");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.iterations, Iterations::Count(4));
        assert_eq!(config.payload_size, 32);
        assert_eq!(config.max_consecutive_failures, 10);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.sequence_policy, SequencePolicy::Constant);
    }

    #[test]
    fn all_flags() {
        let config = parse(&[
            "gping", "-w", "200", "-n", "9", "-l", "64", "-f", "3", "-s", "250ms", "-q", "127.0.0.1",
        ])
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(200));
        assert_eq!(config.iterations, Iterations::Count(9));
        assert_eq!(config.payload_size, 64);
        assert_eq!(config.max_consecutive_failures, 3);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.sequence_policy, SequencePolicy::Incrementing);
    }

    #[test]
    fn until_stopped_ignores_count() {
        let config = parse(&["gping", "-t", "-n", "9", "127.0.0.1"]).unwrap();
        assert_eq!(config.iterations, Iterations::UntilStopped);
    }

    #[test]
    fn negative_size_is_rejected() {
        assert!(matches!(
            parse(&["gping", "-l=-1", "127.0.0.1"]),
            Err(PingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn absurd_timeout_is_rejected() {
        assert!(matches!(
            parse(&["gping", "-w", "500000000000y", "127.0.0.1"]),
            Err(PingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_destination_is_a_usage_error() {
        assert!(app().get_matches_from_safe(&["gping"]).is_err());
    }
}
