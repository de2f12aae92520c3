//! UDP datagrams standing in for the radio medium.

use lss_runtime::{QueueRadio, MAX_FRAME_LEN};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Socket plus the peers every transmitted frame is copied to
pub struct UdpLink {
    socket: UdpSocket,
    peers: Vec<SocketAddr>,
}

impl UdpLink {
    /// Bind `addr`; frames are copied to every address in `peers`
    pub async fn bind(addr: SocketAddr, peers: Vec<SocketAddr>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket, peers })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait for the next datagram. Oversized datagrams are truncated by the
    /// socket, as a transceiver FIFO would.
    pub async fn recv(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = [0u8; MAX_FRAME_LEN + 1];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        Ok((buf[..len].to_vec(), from))
    }

    /// Send everything the radio transmitted since the last flush.
    ///
    /// Returns the number of frames sent.
    pub async fn flush(&self, radio: &mut QueueRadio) -> io::Result<usize> {
        let frames = radio.take_transmitted();
        for frame in &frames {
            for peer in &self.peers {
                self.socket.send_to(frame, peer).await?;
            }
        }
        Ok(frames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lss_runtime::{Radio, RadioFlags};
    use std::sync::Arc;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn test_flush_reaches_peers() {
        let receiver = UdpLink::bind(loopback(), Vec::new()).await.unwrap();
        let sender = UdpLink::bind(loopback(), vec![receiver.local_addr().unwrap()])
            .await
            .unwrap();

        let mut radio = QueueRadio::new(Arc::new(RadioFlags::new()));
        radio.transmit(b"frame-one").unwrap();
        radio.transmit(b"frame-two").unwrap();
        assert_eq!(sender.flush(&mut radio).await.unwrap(), 2);
        assert!(radio.transmitted().is_empty());

        let (first, from) = receiver.recv().await.unwrap();
        assert_eq!(first, b"frame-one");
        assert_eq!(from, sender.local_addr().unwrap());
        let (second, _) = receiver.recv().await.unwrap();
        assert_eq!(second, b"frame-two");
    }

    #[tokio::test]
    async fn test_flush_without_peers_drops_frames() {
        let link = UdpLink::bind(loopback(), Vec::new()).await.unwrap();
        let mut radio = QueueRadio::new(Arc::new(RadioFlags::new()));
        radio.transmit(b"lost").unwrap();
        assert_eq!(link.flush(&mut radio).await.unwrap(), 1);
        assert!(radio.transmitted().is_empty());
    }
}
