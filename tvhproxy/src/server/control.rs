//! TCP control listener.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;

use hdhr_protocol::types::MAX_PACKET_SIZE;

use crate::config::{DeviceIdentity, IgnoreSet};
use crate::server::handler::process_packet;

/// Answers control exchanges, one connection at a time.
pub struct ControlServer {
    listener: TcpListener,
    identity: Arc<DeviceIdentity>,
    ignore: Arc<IgnoreSet>,
}

impl ControlServer {
    /// Bind the control socket with a listen backlog of 1.
    ///
    /// The backlog keeps the kernel from queueing more than one pending
    /// connection: control exchanges are serviced strictly serially.
    pub async fn bind(
        addr: SocketAddr,
        identity: Arc<DeviceIdentity>,
        ignore: Arc<IgnoreSet>,
    ) -> io::Result<Self> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(1)?;
        info!("Control listener on tcp://{}", listener.local_addr()?);
        Ok(Self {
            listener,
            identity,
            ignore,
        })
    }

    /// Local address, useful when bound to an ephemeral port.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown is requested, a client sends a
    /// zero-length request, or the listener socket fails.
    ///
    /// A fault inside one connection closes that connection and the loop
    /// moves on; only accept-level errors stop the listener.
    pub async fn run(self, shutdown: CancellationToken) -> io::Result<()> {
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping control listener");
                    return Ok(());
                }
                result = self.listener.accept() => result?,
            };
            match self.serve_connection(stream, peer).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Empty request received, stopping control listener");
                    return Ok(());
                }
                Err(e) => warn!("Control connection from {} failed: {}", peer, e),
            }
        }
    }

    /// Serve one connection: a single request, at most one reply. The
    /// stream is dropped (and the connection closed) on every exit path.
    ///
    /// Returns `false` when the client signalled shutdown with an empty
    /// request.
    async fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> io::Result<bool> {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let len = stream.read(&mut buf).await?;
        if len == 0 {
            return Ok(false);
        }

        if self.ignore.contains(&peer.ip()) {
            trace!("Ignoring control client {}", peer);
            return Ok(true);
        }

        match process_packet(&buf[..len], &self.identity) {
            Some(reply) => {
                debug!("Sending control reply to {}", peer);
                stream.write_all(&reply).await?;
            }
            None => debug!("No reply for control request from {}", peer),
        }

        Ok(true)
    }
}
