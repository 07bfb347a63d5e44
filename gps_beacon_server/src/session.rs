// One client connection and its send loop.
//
// A `ClientSession` owns its `TcpStream` exclusively and runs on its own
// thread (spawned by `server.rs`). Each iteration polls the shared
// `LocationSource`, snapshots the `TargetRegistry`, merges both into an
// `OutboundPacket`, writes it in one `write_all`, and sleeps for the cadence.
//
// Any write or serialization error ends the session: the socket is shut down
// and `run` returns a `SessionSummary` describing why. Nothing is retried;
// clients are expected to reconnect. Sessions never touch each other or the
// listener, so one dead client can't disturb the rest.
//
// There is no backpressure handling. A client that stops reading eventually
// fills the socket buffer and the blocking write stalls that session only.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gps_beacon_protocol::{Framing, OutboundPacket, encode_packet};
use log::{debug, info};

use crate::config::BeaconConfig;
use crate::error::{BeaconError, Result};
use crate::source::LocationSource;
use crate::target::TargetRegistry;

/// Per-session send settings, shared by every session of one server.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionSettings {
    pub cadence: Duration,
    pub framing: Framing,
    /// Log each outgoing JSON body at debug level.
    pub log_packets: bool,
}

impl SessionSettings {
    pub fn from_config(config: &BeaconConfig) -> Self {
        Self {
            cadence: config.cadence(),
            framing: config.framing,
            log_packets: config.log_packets,
        }
    }
}

/// How a session ended.
#[derive(Debug)]
pub struct SessionSummary {
    pub peer: SocketAddr,
    pub packets_sent: u64,
    pub reason: BeaconError,
}

pub struct ClientSession {
    stream: TcpStream,
    peer: SocketAddr,
    settings: SessionSettings,
    source: Arc<dyn LocationSource>,
    targets: TargetRegistry,
    packets_sent: u64,
}

impl ClientSession {
    pub fn new(
        stream: TcpStream,
        source: Arc<dyn LocationSource>,
        targets: TargetRegistry,
        settings: SessionSettings,
    ) -> Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            settings,
            source,
            targets,
            packets_sent: 0,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Poll, merge, and write one packet. Returns what was sent.
    pub fn send_once(&mut self) -> Result<OutboundPacket> {
        let reading = self.source.poll();
        let target = self.targets.snapshot();
        let packet = OutboundPacket::merge(&reading, &target);

        let bytes = encode_packet(&packet, self.settings.framing)?;
        if self.settings.log_packets {
            let body = String::from_utf8_lossy(&bytes);
            debug!("Sending to {}: {}", self.peer, body.trim_end());
        }
        self.stream.write_all(&bytes)?;
        self.stream.flush()?;

        self.packets_sent += 1;
        Ok(packet)
    }

    /// Send packets at the configured cadence until the connection fails.
    pub fn run(mut self) -> SessionSummary {
        info!("Client {} connected, sending GPS data", self.peer);
        let reason = loop {
            if let Err(e) = self.send_once() {
                break e;
            }
            thread::sleep(self.settings.cadence);
        };

        let _ = self.stream.shutdown(Shutdown::Both);
        info!(
            "Connection to {} closed after {} packets: {}",
            self.peer, self.packets_sent, reason
        );
        SessionSummary {
            peer: self.peer,
            packets_sent: self.packets_sent,
            reason,
        }
    }
}
