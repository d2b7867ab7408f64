//! UDP discovery listener.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, trace};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use hdhr_protocol::types::MAX_PACKET_SIZE;

use crate::config::{DeviceIdentity, IgnoreSet};
use crate::server::handler::process_packet;

/// Answers tuner discovery datagrams, one at a time.
pub struct DiscoveryServer {
    socket: UdpSocket,
    identity: Arc<DeviceIdentity>,
    ignore: Arc<IgnoreSet>,
}

impl DiscoveryServer {
    /// Bind the discovery socket.
    pub async fn bind(
        addr: SocketAddr,
        identity: Arc<DeviceIdentity>,
        ignore: Arc<IgnoreSet>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Discovery listener on udp://{}", socket.local_addr()?);
        Ok(Self {
            socket,
            identity,
            ignore,
        })
    }

    /// Local address, useful when bound to an ephemeral port.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive datagrams until shutdown is requested, an empty datagram
    /// arrives, or the socket fails.
    ///
    /// Socket errors propagate out of the loop; there is no restart
    /// policy here, process supervision sits above.
    pub async fn run(self, shutdown: CancellationToken) -> io::Result<()> {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let (len, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping discovery listener");
                    return Ok(());
                }
                result = self.socket.recv_from(&mut buf) => result?,
            };
            if len == 0 {
                info!("Empty datagram received, stopping discovery listener");
                return Ok(());
            }
            if self.ignore.contains(&peer.ip()) {
                trace!("Ignoring datagram from {}", peer);
                continue;
            }

            match process_packet(&buf[..len], &self.identity) {
                Some(reply) => {
                    debug!("Sending discovery reply to {}", peer);
                    self.socket.send_to(&reply, peer).await?;
                }
                None => debug!("No reply for datagram from {}", peer),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::time::Duration;

    use hdhr_protocol::codec::{decode_frame, encode_frame, parse_attributes};
    use hdhr_protocol::types::{
        FrameType, DEVICE_TYPE_TUNER, TAG_DEVICE_ID, TAG_DEVICE_TYPE, TAG_GETSET_NAME,
        TAG_TUNER_COUNT,
    };

    fn identity() -> Arc<DeviceIdentity> {
        Arc::new(DeviceIdentity::new("12345678", 4, "http://127.0.0.1:80".to_string()).unwrap())
    }

    async fn spawn_server(
        ignore: IgnoreSet,
    ) -> (
        SocketAddr,
        CancellationToken,
        tokio::task::JoinHandle<io::Result<()>>,
    ) {
        let server = DiscoveryServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            identity(),
            Arc::new(ignore),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.run(shutdown.clone()));
        (addr, shutdown, task)
    }

    #[tokio::test]
    async fn test_discovery_exchange() {
        let (addr, _shutdown, server) = spawn_server(IgnoreSet::default()).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let request = encode_frame(FrameType::DiscoverReq.into(), &[]);
        client.send_to(&request, addr).await.unwrap();

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let (len, from) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("no discovery reply")
            .unwrap();
        assert_eq!(from, addr);

        let frame = decode_frame(&buf[..len]).unwrap();
        assert_eq!(frame.frame_type, u16::from(FrameType::DiscoverRpy));

        let attrs = parse_attributes(&frame.payload).unwrap();
        assert_eq!(attrs[0].tag, TAG_DEVICE_TYPE);
        assert_eq!(attrs[0].as_u32(), Some(DEVICE_TYPE_TUNER));
        assert_eq!(attrs[1].tag, TAG_DEVICE_ID);
        assert_eq!(attrs[1].as_u32(), Some(0x1234_5678));
        assert_eq!(attrs[2].tag, TAG_GETSET_NAME);
        assert_eq!(attrs[2].as_str(), Some("http://127.0.0.1:80"));
        assert_eq!(attrs[3].tag, TAG_TUNER_COUNT);
        assert_eq!(attrs[3].as_u8(), Some(4));

        // Empty datagram stops the loop.
        client.send_to(&[], addr).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("listener did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_ignored_sender_gets_no_reply() {
        let localhost: IpAddr = "127.0.0.1".parse().unwrap();
        let (addr, _shutdown, _server) = spawn_server(IgnoreSet::new([localhost])).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let request = encode_frame(FrameType::DiscoverReq.into(), &[]);
        client.send_to(&request, addr).await.unwrap();

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let result =
            tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await;
        assert!(result.is_err(), "ignored sender received a reply");
    }

    #[tokio::test]
    async fn test_cancellation_stops_listener() {
        let (_addr, shutdown, server) = spawn_server(IgnoreSet::default()).await;

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("listener did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_malformed_datagram_gets_no_reply() {
        let (addr, _shutdown, _server) = spawn_server(IgnoreSet::default()).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"not a frame", addr).await.unwrap();

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let result =
            tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await;
        assert!(result.is_err(), "malformed datagram received a reply");
    }
}
