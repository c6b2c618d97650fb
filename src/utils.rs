use std::process;

use crate::error::PingError;
use crate::icmp::ICMP_HEADER_LEN;

/// Largest ICMP payload that fits in one IPv4 datagram.
pub const MAX_PAYLOAD_SIZE: usize = 65_507 - ICMP_HEADER_LEN;

/// ICMP identifier for this run: the low 16 bits of the process id, or a
/// random value when several runs may share a pid (containers).
pub fn session_identifier(random: bool) -> u16 {
    if random {
        use rand::Rng;
        rand::thread_rng().gen_range(1..=u16::MAX)
    } else {
        process::id() as u16
    }
}

/// Print error message and exit with error code
pub fn exit_with_error(message: &str, code: i32) -> ! {
    eprintln!("echoping: {}", message);
    process::exit(code);
}

pub fn validate_ping_params(
    count: u32,
    timeout_ms: u64,
    ttl: u32,
    size: usize,
) -> Result<(), PingError> {
    if count == 0 {
        return Err(PingError::Config("count must be greater than 0".to_string()));
    }
    if timeout_ms == 0 {
        return Err(PingError::Config("timeout must be greater than 0".to_string()));
    }
    if ttl == 0 || ttl > 255 {
        return Err(PingError::Config(format!("TTL {} outside 1-255", ttl)));
    }
    if size > MAX_PAYLOAD_SIZE {
        return Err(PingError::Config(format!(
            "payload of {} bytes exceeds maximum of {}",
            size, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

/// Milliseconds with sub-millisecond precision.
pub fn format_time(ms: f64) -> String {
    format!("{:.3} ms", ms)
}

/// Handle Ctrl+C signal for graceful shutdown
pub fn setup_signal_handler() -> tokio::sync::oneshot::Receiver<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => log::warn!("Cannot listen for Ctrl+C: {}", e),
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_from_pid() {
        assert_eq!(session_identifier(false), process::id() as u16);
        assert_eq!(session_identifier(false), session_identifier(false));
    }

    #[test]
    fn test_random_identifier_is_nonzero() {
        for _ in 0..100 {
            assert_ne!(session_identifier(true), 0);
        }
    }

    #[test]
    fn test_parameter_validation() {
        assert!(validate_ping_params(20, 2000, 255, 56).is_ok());
        assert!(validate_ping_params(1, 1, 1, MAX_PAYLOAD_SIZE).is_ok());

        assert!(matches!(validate_ping_params(0, 2000, 255, 56), Err(PingError::Config(_))));
        assert!(validate_ping_params(20, 0, 255, 56).is_err());
        assert!(validate_ping_params(20, 2000, 0, 56).is_err());
        assert!(validate_ping_params(20, 2000, 256, 56).is_err());
        assert!(validate_ping_params(20, 2000, 255, MAX_PAYLOAD_SIZE + 1).is_err());
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(format_time(0.0421), "0.042 ms");
        assert_eq!(format_time(15.7), "15.700 ms");
        assert_eq!(format_time(1234.5678), "1234.568 ms");
    }
}
