use colored::*;

use crate::config::SessionConfig;
use crate::ping::ReplyType;
use crate::session::Event;
use crate::stats::Summary;

/// Kind of line being printed, used to pick its style.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutcomeKind {
    Banner,
    Reply,
    Timeout,
    ErrorReply,
    GaveUp,
    Summary,
}

pub fn paint(kind: OutcomeKind, text: &str) -> ColoredString {
    match kind {
        OutcomeKind::Banner => text.cyan(),
        OutcomeKind::Reply => text.green(),
        OutcomeKind::Timeout => text.yellow(),
        OutcomeKind::ErrorReply => text.magenta(),
        OutcomeKind::GaveUp => text.white().on_red(),
        OutcomeKind::Summary => text.bold(),
    }
}

pub fn banner(config: &SessionConfig) -> String {
    format!(
        "{} {} ({}) with {} bytes of data:",
        paint(OutcomeKind::Banner, "PING"),
        config.target.bold(),
        config.address,
        config.payload_size
    )
}

pub fn event(config: &SessionConfig, event: &Event) -> String {
    match event {
        Event::Reply { timestamp, from, bytes, rtt, ttl, sequence } => {
            let line = format!(
                "{} reply from {} ({}): bytes={} icmp_seq={} time={:.2}ms TTL={}",
                humantime::format_rfc3339_seconds(*timestamp),
                config.target,
                from,
                bytes,
                sequence,
                rtt.as_micros() as f64 / 1000f64,
                ttl
            );
            paint(OutcomeKind::Reply, &line).to_string()
        }
        Event::Timeout { attempt } => {
            paint(OutcomeKind::Timeout, &format!("Request {} timed out.", attempt)).to_string()
        }
        Event::ErrorReply { attempt, from, kind } => {
            let what = match kind {
                ReplyType::DestinationUnreachable => "Destination unreachable",
                ReplyType::TimeExceeded => "Time to live exceeded",
                ReplyType::EchoReply => "Unexpected echo reply",
            };
            paint(OutcomeKind::ErrorReply, &format!("Request {}: {} (from {})", attempt, what, from)).to_string()
        }
        Event::ReceiveFailed { attempt, reason } => {
            paint(OutcomeKind::Timeout, &format!("Request {} failed: {}", attempt, reason)).to_string()
        }
        Event::GaveUp { consecutive_failures } => paint(
            OutcomeKind::GaveUp,
            &format!("{} consecutive failures, please check the network!", consecutive_failures),
        )
        .to_string(),
    }
}

pub fn summary(config: &SessionConfig, summary: &Summary) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!("--- {} {} ---", config.target.bold(), paint(OutcomeKind::Summary, "ping statistics")),
        format!(
            "    Packets: sent = {}, received = {}, lost = {} ({:.2}% loss)",
            summary.sent, summary.received, summary.lost, summary.loss_percent
        ),
    ];

    if let Some(rtt) = summary.rtt {
        lines.push("Approximate round trip times in milli-seconds:".to_string());
        lines.push(format!(
            "    Minimum = {:.2}ms, Maximum = {:.2}ms, Average = {:.2}ms",
            rtt.min.as_micros() as f64 / 1000f64,
            rtt.max.as_micros() as f64 / 1000f64,
            rtt.avg.as_micros() as f64 / 1000f64
        ));
    }
    lines
}
