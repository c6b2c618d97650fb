pub mod packet;
pub mod socket;

pub use packet::*;
pub use socket::*;

use std::net::IpAddr;

/// ICMP message types a prober may see while waiting for its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    EchoReply,
    DestinationUnreachable,
    SourceQuench,
    Redirect,
    EchoRequest,
    TimeExceeded,
    ParameterProblem,
    Unknown(u8),
}

impl From<u8> for IcmpType {
    fn from(value: u8) -> Self {
        match value {
            ICMP_ECHO_REPLY => IcmpType::EchoReply,
            3 => IcmpType::DestinationUnreachable,
            4 => IcmpType::SourceQuench,
            5 => IcmpType::Redirect,
            ICMP_ECHO_REQUEST => IcmpType::EchoRequest,
            11 => IcmpType::TimeExceeded,
            12 => IcmpType::ParameterProblem,
            other => IcmpType::Unknown(other),
        }
    }
}

impl std::fmt::Display for IcmpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IcmpType::EchoReply => write!(f, "Echo Reply"),
            IcmpType::DestinationUnreachable => write!(f, "Destination Unreachable"),
            IcmpType::SourceQuench => write!(f, "Source Quench"),
            IcmpType::Redirect => write!(f, "Redirect"),
            IcmpType::EchoRequest => write!(f, "Echo Request"),
            IcmpType::TimeExceeded => write!(f, "Time Exceeded"),
            IcmpType::ParameterProblem => write!(f, "Parameter Problem"),
            IcmpType::Unknown(t) => write!(f, "ICMP type {}", t),
        }
    }
}

/// A non-reply ICMP message seen during a probe's wait window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpNotice {
    pub source: IpAddr,
    pub icmp_type: IcmpType,
    pub code: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping() {
        assert_eq!(IcmpType::from(0), IcmpType::EchoReply);
        assert_eq!(IcmpType::from(3), IcmpType::DestinationUnreachable);
        assert_eq!(IcmpType::from(8), IcmpType::EchoRequest);
        assert_eq!(IcmpType::from(11), IcmpType::TimeExceeded);
        assert_eq!(IcmpType::from(42), IcmpType::Unknown(42));
    }

    #[test]
    fn test_type_display() {
        assert_eq!(IcmpType::Redirect.to_string(), "Redirect");
        assert_eq!(IcmpType::Unknown(42).to_string(), "ICMP type 42");
    }
}
