use crate::probe::{ProbeOutcome, ProbeResult};
use crate::utils::format_time;

/// TTL shown when the socket did not hand us the IP header.
pub const NOMINAL_TTL: u8 = 64;

pub fn format_header(target: &str, resolved_ip: &str, payload_size: usize) -> String {
    if target == resolved_ip {
        format!("PING {}: {} data bytes", target, payload_size)
    } else {
        format!("PING {} ({}): {} data bytes", target, resolved_ip, payload_size)
    }
}

pub fn format_result(result: &ProbeResult) -> String {
    match &result.outcome {
        ProbeOutcome::Reply {
            source,
            bytes,
            ttl,
            reply_sequence,
            rtt,
        } => {
            let mut line = format!(
                "{} bytes from {}: icmp_seq={} ttl={} time={}",
                bytes,
                source,
                result.sequence,
                ttl.unwrap_or(NOMINAL_TTL),
                format_time(rtt.as_secs_f64() * 1000.0)
            );
            if *reply_sequence != result.sequence {
                line.push_str(&format!(" (reply to icmp_seq {})", reply_sequence));
            }
            line
        }
        ProbeOutcome::Timeout { notice: None } => {
            format!("Request timeout for icmp_seq {}", result.sequence)
        }
        ProbeOutcome::Timeout { notice: Some(notice) } => format!(
            "Request timeout for icmp_seq {} ({} code {} from {})",
            result.sequence, notice.icmp_type, notice.code, notice.source
        ),
        ProbeOutcome::Failed { reason } => {
            format!("Request failed for icmp_seq {}: {}", result.sequence, reason)
        }
    }
}
