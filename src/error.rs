use std::io;

/// Failures the prober can run into, from argument checks down to single datagrams.
#[derive(Debug)]
pub enum PingError {
    Config(String),
    Resolution(String),
    SocketUnavailable(io::Error),
    SendFailure(io::Error),
    MalformedPacket(String),
}

impl std::fmt::Display for PingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PingError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            PingError::Resolution(msg) => write!(f, "Cannot resolve destination: {}", msg),
            PingError::SocketUnavailable(e) => write!(
                f,
                "Cannot open raw ICMP socket: {}. Root or CAP_NET_RAW may be required.",
                e
            ),
            PingError::SendFailure(e) => write!(f, "Send failed: {}", e),
            PingError::MalformedPacket(msg) => write!(f, "Malformed packet: {}", msg),
        }
    }
}

impl std::error::Error for PingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PingError::SocketUnavailable(e) | PingError::SendFailure(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_error_mentions_privilege() {
        let err = PingError::SocketUnavailable(io::Error::from(io::ErrorKind::PermissionDenied));
        let text = err.to_string();
        assert!(text.starts_with("Cannot open raw ICMP socket"));
        assert!(text.contains("CAP_NET_RAW"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_malformed_display() {
        let err = PingError::MalformedPacket("3 bytes".to_string());
        assert_eq!(err.to_string(), "Malformed packet: 3 bytes");
        assert!(std::error::Error::source(&err).is_none());
    }
}
