//! Blocking datagram transport boundary.

use std::io;
use std::net::UdpSocket;
use std::time::Duration;

// IPv4 header (20) + UDP header (8).
const MIN_IP_OVERHEAD: usize = 28;

/// Unreliable, unordered datagram service the engine runs over.
///
/// The engine never assumes ordering, uniqueness or delivery. The only
/// suspension point is [`DatagramTransport::receive`].
pub trait DatagramTransport {
    /// Largest datagram the transport can deliver.
    fn receive_limit(&self) -> usize;

    /// Largest datagram the transport can send.
    fn send_limit(&self) -> usize;

    /// Wait up to `timeout` for one datagram.
    ///
    /// Returns `Ok(None)` when the timeout elapsed without a datagram.
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>>;

    /// Send one datagram.
    fn send(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Release the transport. Further calls are expected to fail.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for Box<T> {
    fn receive_limit(&self) -> usize {
        (**self).receive_limit()
    }

    fn send_limit(&self) -> usize {
        (**self).send_limit()
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        (**self).receive(buf, timeout)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).send(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// [`DatagramTransport`] over a connected [`UdpSocket`].
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    receive_limit: usize,
    send_limit: usize,
}

impl UdpTransport {
    /// Wrap a socket that has already been `connect`ed to the peer.
    ///
    /// `mtu` is the path MTU; the IP and UDP header overhead is subtracted.
    pub fn new(socket: UdpSocket, mtu: usize) -> io::Result<Self> {
        if mtu <= MIN_IP_OVERHEAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("mtu {} too small", mtu),
            ));
        }
        socket.peer_addr()?;
        Ok(UdpTransport {
            socket,
            receive_limit: mtu - MIN_IP_OVERHEAD,
            send_limit: mtu - MIN_IP_OVERHEAD,
        })
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl DatagramTransport for UdpTransport {
    fn receive_limit(&self) -> usize {
        self.receive_limit
    }

    fn send_limit(&self) -> usize {
        self.send_limit
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        // A zero timeout means "block forever" to the socket API.
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket.set_read_timeout(Some(timeout))?;
        match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        self.socket.send(buf)?;
        Ok(())
    }
}
