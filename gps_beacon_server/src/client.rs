// TCP client for receiving beacon broadcasts.
//
// Architecture:
// - `connect()` opens the TCP connection on the calling thread, then spawns a
//   background reader thread.
// - The reader thread decodes packets with `PacketReader` and pushes them into
//   an `mpsc` channel. It exits on EOF, a decode error, or when the client is
//   dropped.
// - `poll()` drains the inbox without blocking; `recv_timeout()` and
//   `wait_for()` block up to a deadline.
//
// The protocol is one-way (server to client), so the client never writes.
// Dropping the client shuts the socket down, which the server sees as a
// failed write and ends that session.
//
// Used by the `gps-beacon-watch` binary and the integration tests.

use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use gps_beacon_protocol::{OutboundPacket, PacketReader};
use log::debug;

use crate::error::Result;

pub struct BeaconClient {
    stream: TcpStream,
    peer: SocketAddr,
    inbox: Receiver<OutboundPacket>,
    _reader_thread: JoinHandle<()>,
}

impl BeaconClient {
    /// Connect to a beacon and start receiving in the background.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let peer = stream.peer_addr()?;
        let reader_stream = stream.try_clone()?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::Builder::new()
            .name(format!("beacon-reader-{peer}"))
            .spawn(move || reader_loop(reader_stream, tx))?;

        Ok(Self {
            stream,
            peer,
            inbox: rx,
            _reader_thread: reader_thread,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Drain all packets received so far (non-blocking).
    pub fn poll(&self) -> Vec<OutboundPacket> {
        self.inbox.try_iter().collect()
    }

    /// Block until the next packet. `None` once the connection is gone.
    pub fn recv(&self) -> Option<OutboundPacket> {
        self.inbox.recv().ok()
    }

    /// Wait up to `timeout` for the next packet.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<OutboundPacket> {
        self.inbox.recv_timeout(timeout).ok()
    }

    /// Wait up to `timeout` for a packet matching `predicate`, discarding the
    /// ones that don't.
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> Option<OutboundPacket>
    where
        F: Fn(&OutboundPacket) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let packet = self.recv_timeout(remaining)?;
            if predicate(&packet) {
                return Some(packet);
            }
        }
    }
}

impl Drop for BeaconClient {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

fn reader_loop(stream: TcpStream, tx: mpsc::Sender<OutboundPacket>) {
    for packet in PacketReader::new(stream) {
        match packet {
            Ok(packet) => {
                if tx.send(packet).is_err() {
                    break; // Client dropped the receiver
                }
            }
            Err(e) => {
                debug!("Beacon stream ended: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use gps_beacon_protocol::{Framing, LocationReading, TargetWaypoint, write_packet};

    use super::*;

    fn packet(lat: f64) -> OutboundPacket {
        OutboundPacket::merge(&LocationReading::new(lat, 1.0, 2.0), &TargetWaypoint::unset())
    }

    #[test]
    fn receives_packets_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = BeaconClient::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        for lat in [1.0, 2.0, 3.0] {
            write_packet(&mut server, &packet(lat), Framing::Concatenated).unwrap();
        }

        let got = client
            .wait_for(Duration::from_secs(5), |p| p.latitude == 3.0)
            .unwrap();
        assert_eq!(got.latitude, 3.0);
    }

    #[test]
    fn recv_returns_none_after_server_hangs_up() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = BeaconClient::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        write_packet(&mut server, &packet(7.0), Framing::NewlineDelimited).unwrap();
        drop(server);

        assert_eq!(client.recv().map(|p| p.latitude), Some(7.0));
        assert!(client.recv().is_none());
        assert!(client.poll().is_empty());
    }

    #[test]
    fn wait_for_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = BeaconClient::connect(listener.local_addr().unwrap()).unwrap();
        let _server = listener.accept().unwrap();

        let started = Instant::now();
        assert!(client.wait_for(Duration::from_millis(100), |_| true).is_none());
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
