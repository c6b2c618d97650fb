use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::io::unix::AsyncFd;
use tokio::time::{Instant, timeout_at};

use crate::error::PingError;

/// Sending and receiving side of a probe run.
#[allow(async_fn_in_trait)]
pub trait EchoTransport {
    /// Whether received datagrams start with the IPv4 header.
    fn includes_ip_header(&self) -> bool;

    async fn send_to(&mut self, packet: &[u8], destination: Ipv4Addr) -> io::Result<usize>;

    /// Reads one datagram into `buf`, or returns `None` once `deadline` passes.
    async fn recv_until(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
    ) -> io::Result<Option<(usize, IpAddr)>>;
}

/// Raw IPv4 ICMP socket driven by the tokio reactor.
pub struct IcmpSocket {
    inner: AsyncFd<Socket>,
}

impl IcmpSocket {
    pub fn open(ttl: u32) -> Result<Self, PingError> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(PingError::SocketUnavailable)?;

        if let Err(e) = socket.set_ttl(ttl) {
            log::warn!("Failed to set TTL {}: {}", ttl, e);
        }
        socket
            .set_nonblocking(true)
            .map_err(PingError::SocketUnavailable)?;

        let inner = AsyncFd::try_new(socket)
            .map_err(|e| PingError::SocketUnavailable(e.into_parts().1))?;
        log::debug!("Raw ICMP socket open, ttl={}", ttl);
        Ok(Self { inner })
    }
}

impl EchoTransport for IcmpSocket {
    fn includes_ip_header(&self) -> bool {
        true
    }

    async fn send_to(&mut self, packet: &[u8], destination: Ipv4Addr) -> io::Result<usize> {
        let target: SockAddr = SocketAddr::V4(SocketAddrV4::new(destination, 0)).into();

        loop {
            let mut guard = self.inner.writable().await?;
            match guard.try_io(|fd| fd.get_ref().send_to(packet, &target)) {
                Ok(result) => {
                    if let Ok(n) = &result {
                        log::debug!("Sent {} bytes to {}", n, destination);
                    }
                    return result;
                }
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv_until(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
    ) -> io::Result<Option<(usize, IpAddr)>> {
        let received = timeout_at(deadline, async {
            loop {
                let mut guard = self.inner.readable().await?;
                match guard.try_io(|fd| fd.get_ref().recv_from(as_uninit(buf))) {
                    Ok(result) => return result,
                    Err(_would_block) => continue,
                }
            }
        })
        .await;

        match received {
            Err(_elapsed) => Ok(None),
            Ok(Err(e)) => Err(e),
            Ok(Ok((len, from))) => {
                let source = from
                    .as_socket()
                    .map(|addr| addr.ip())
                    .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
                log::debug!("Received {} bytes from {}", len, source);
                Ok(Some((len, source)))
            }
        }
    }
}

fn as_uninit(buf: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    // SAFETY: MaybeUninit<u8> has the layout of u8, and recv only writes
    // initialized bytes into an already initialized buffer.
    unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) }
}
