//! Retransmits a datagram until something answers it.

use std::{io, time::Duration};

use async_trait::async_trait;
use tokio::{net::UdpSocket, time::MissedTickBehavior};
use tracing::trace;

use super::deadline::ConnectionDeadline;
use crate::error::{Error, Result};

pub const RESEND_INTERVAL: Duration = Duration::from_secs(1);

/// Big enough for any UDP payload.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// A socket that's already connected to its peer.
#[async_trait]
pub trait DatagramSocket: Send + Sync {
    async fn send(&self, buf: &[u8]) -> io::Result<usize>;
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf).await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf).await
    }
}

pub struct UdpResender<S> {
    socket: S,
    deadline: ConnectionDeadline,
    interval: Duration,
}

impl<S: DatagramSocket> UdpResender<S> {
    pub fn new(socket: S, deadline: ConnectionDeadline) -> Self {
        Self {
            socket,
            deadline,
            interval: RESEND_INTERVAL,
        }
    }

    /// Sends `request` right away and again every [`RESEND_INTERVAL`] until a
    /// datagram comes back, the socket errors, or the deadline fires.
    pub async fn send_until_receive(&self, request: &[u8]) -> Result<Vec<u8>> {
        self.send_until_receive_matching(request, |_| true).await
    }

    /// Like [`send_until_receive`](Self::send_until_receive), but datagrams
    /// that `accept` rejects are dropped and the wait goes on.
    pub async fn send_until_receive_matching<F>(
        &self,
        request: &[u8],
        accept: F,
    ) -> Result<Vec<u8>>
    where
        F: Fn(&[u8]) -> bool,
    {
        // the first tick completes immediately, which is the initial send
        let mut resend = tokio::time::interval(self.interval);
        resend.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut sent = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = self.deadline.expired() => return Err(Error::ConnectionTimeout),
                received = self.socket.recv(&mut buf) => {
                    let n = received?;
                    if !accept(&buf[..n]) {
                        trace!("dropping unexpected {n} byte datagram");
                        continue;
                    }
                    buf.truncate(n);
                    trace!("got {n} byte reply after {sent} sends");
                    return Ok(buf);
                }
                _ = resend.tick() => {
                    self.socket.send(request).await?;
                    sent += 1;
                    if sent > 1 {
                        trace!("resending {} byte datagram (attempt {sent})", request.len());
                    }
                }
            }
        }
    }
}

/// Binds an ephemeral socket in the right address family and connects it to
/// `host:port`, giving up when the deadline fires.
pub async fn connect_udp(
    host: &str,
    port: u16,
    deadline: &ConnectionDeadline,
) -> Result<UdpSocket> {
    deadline
        .run(async {
            let addr = tokio::net::lookup_host((host, port))
                .await?
                .next()
                .ok_or_else(|| Error::Dns(format!("{host} has no addresses")))?;
            let bind_addr = if addr.is_ipv4() {
                "0.0.0.0:0"
            } else {
                "[::]:0"
            };
            let socket = UdpSocket::bind(bind_addr).await?;
            socket.connect(addr).await?;
            Ok(socket)
        })
        .await
}
