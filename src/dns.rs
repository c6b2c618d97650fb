use anyhow::Context;
use dns_lookup::lookup_host;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::PingError;

/// Resolves `hostname` to the IPv4 address to probe.
pub async fn resolve_hostname(hostname: &str) -> anyhow::Result<Ipv4Addr> {
    // First try to parse as IP address
    if let Ok(ip) = hostname.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(_) => Err(PingError::Resolution(format!(
                "{} is an IPv6 address; only IPv4 is supported",
                hostname
            ))
            .into()),
        };
    }

    let addresses = tokio::task::spawn_blocking({
        let hostname = hostname.to_string();
        move || lookup_host(&hostname)
    })
    .await
    .context("lookup task failed")?
    .map_err(|e| PingError::Resolution(format!("{}: {}", hostname, e)))?;

    log::debug!("{} resolved to {:?}", hostname, addresses);

    let address = addresses.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    });
    address
        .ok_or_else(|| PingError::Resolution(format!("no IPv4 address found for {}", hostname)))
        .map_err(anyhow::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_resolution_error(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<PingError>(), Some(PingError::Resolution(_)))
    }

    #[tokio::test]
    async fn test_ipv4_literal() {
        let result = resolve_hostname("8.8.8.8").await;
        assert_eq!(result.unwrap(), Ipv4Addr::new(8, 8, 8, 8));
    }

    #[tokio::test]
    async fn test_ipv6_literal_rejected() {
        let err = resolve_hostname("::1").await.unwrap_err();
        assert!(is_resolution_error(&err));
    }

    #[tokio::test]
    async fn test_localhost_resolves() {
        // /etc/hosts normally maps localhost; skip silently if it does not.
        if let Ok(ip) = resolve_hostname("localhost").await {
            assert!(ip.is_loopback());
        }
    }

    #[tokio::test]
    async fn test_unresolvable_name() {
        let err = resolve_hostname("no-such-host.invalid").await.unwrap_err();
        assert!(is_resolution_error(&err));
    }
}
