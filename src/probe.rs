use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};

use crate::error::PingError;
use crate::icmp::{self, EchoTransport, ICMP_HEADER_LEN, IPV4_MAX_HEADER_LEN, IcmpNotice};

/// How strictly a reply must correlate with the request just sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Any echo reply carrying our identifier, so replies left over from an
    /// earlier probe are drained instead of stalling the run.
    #[default]
    IdentifierOnly,
    IdentifierAndSequence,
}

impl MatchPolicy {
    fn accepts(&self, identifier: u16, sequence: u16, reply_id: u16, reply_seq: u16) -> bool {
        match self {
            MatchPolicy::IdentifierOnly => reply_id == identifier,
            MatchPolicy::IdentifierAndSequence => reply_id == identifier && reply_seq == sequence,
        }
    }
}

/// Everything fixed for the lifetime of one run.
#[derive(Debug, Clone)]
pub struct Session {
    pub destination: Ipv4Addr,
    pub display: String,
    pub identifier: u16,
    pub count: u32,
    pub timeout: Duration,
    pub interval: Duration,
    pub payload_size: usize,
    pub match_policy: MatchPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Reply {
        source: IpAddr,
        bytes: usize,
        ttl: Option<u8>,
        reply_sequence: u16,
        rtt: Duration,
    },
    Timeout {
        notice: Option<IcmpNotice>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub sequence: u16,
    pub destination: String,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Reply { .. })
    }

    /// Round-trip time in seconds; only replies have one.
    pub fn round_trip_time(&self) -> Option<f64> {
        match &self.outcome {
            ProbeOutcome::Reply { rtt, .. } => Some(rtt.as_secs_f64()),
            _ => None,
        }
    }
}

/// Drives the probe sequence over a transport it owns.
pub struct Prober<T: EchoTransport> {
    transport: T,
    session: Session,
    next_sequence: u16,
    payload: Vec<u8>,
    recv_buf: Vec<u8>,
}

impl<T: EchoTransport> Prober<T> {
    pub fn new(transport: T, session: Session) -> Self {
        let payload = vec![0u8; session.payload_size];
        let recv_buf = vec![0u8; IPV4_MAX_HEADER_LEN + ICMP_HEADER_LEN + session.payload_size];
        Self {
            transport,
            session,
            next_sequence: 1,
            payload,
            recv_buf,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs `count` probes, handing each result to `report` as it completes.
    ///
    /// Stops early, between probes, once `shutdown` fires. Returns the number
    /// of probes run.
    pub async fn run<F>(&mut self, shutdown: &mut oneshot::Receiver<()>, mut report: F) -> u32
    where
        F: FnMut(ProbeResult),
    {
        let mut completed = 0u32;

        while completed < self.session.count {
            if shutdown.try_recv().is_ok() {
                log::debug!("Shutdown requested after {} probes", completed);
                break;
            }

            let result = self.probe_once().await;
            report(result);
            completed += 1;

            if completed < self.session.count {
                sleep(self.session.interval).await;
            }
        }

        completed
    }

    /// Sends one request and waits for its reply within the session timeout.
    pub async fn probe_once(&mut self) -> ProbeResult {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        let outcome = self.exchange(sequence).await;
        ProbeResult {
            sequence,
            destination: self.session.display.clone(),
            outcome,
        }
    }

    async fn exchange(&mut self, sequence: u16) -> ProbeOutcome {
        let identifier = self.session.identifier;
        let request = icmp::encode_echo_request(identifier, sequence, &self.payload);

        let started = Instant::now();
        if let Err(e) = self.transport.send_to(&request, self.session.destination).await {
            let err = PingError::SendFailure(e);
            log::warn!("icmp_seq={}: {}", sequence, err);
            return ProbeOutcome::Failed {
                reason: err.to_string(),
            };
        }

        let deadline = Instant::now() + self.session.timeout;
        let from_raw_socket = self.transport.includes_ip_header();
        let mut notice = None;

        loop {
            let (len, source) = match self.transport.recv_until(&mut self.recv_buf, deadline).await {
                Ok(Some(received)) => received,
                Ok(None) => return ProbeOutcome::Timeout { notice },
                Err(e) => {
                    log::warn!("icmp_seq={}: receive failed: {}", sequence, e);
                    return ProbeOutcome::Failed {
                        reason: format!("Receive failed: {}", e),
                    };
                }
            };
            let read_at = Instant::now();

            let decoded = match icmp::decode_received(&self.recv_buf[..len], from_raw_socket) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("Ignoring datagram from {}: {}", source, e);
                    continue;
                }
            };

            if !decoded.is_echo_reply() {
                let kind = decoded.kind();
                log::debug!("Ignoring {} (code {}) from {}", kind, decoded.code, source);
                // Raw sockets see every ICMP error on the host; keep those about our requests.
                if decoded.embedded_identifier == Some(identifier) {
                    notice = Some(IcmpNotice {
                        source,
                        icmp_type: kind,
                        code: decoded.code,
                    });
                }
                continue;
            }

            if !icmp::verify_checksum(&self.recv_buf[len - decoded.len..len]) {
                log::warn!("Ignoring echo reply from {} with bad checksum", source);
                continue;
            }

            if !self.session.match_policy.accepts(
                identifier,
                sequence,
                decoded.identifier,
                decoded.sequence,
            ) {
                log::debug!(
                    "Ignoring echo reply id={} seq={} (expecting id={} seq={})",
                    decoded.identifier,
                    decoded.sequence,
                    identifier,
                    sequence
                );
                continue;
            }

            return ProbeOutcome::Reply {
                source,
                bytes: decoded.len,
                ttl: decoded.ttl,
                reply_sequence: decoded.sequence,
                rtt: read_at.duration_since(started),
            };
        }
    }
}
