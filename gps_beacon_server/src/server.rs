// TCP listener and accept loop.
//
// Architecture: thread-per-client, no central event loop.
//
// - **Accept thread** (`BroadcastServer::accept_loop`): polls a non-blocking
//   `TcpListener`, sleeping briefly when nothing is pending so it can notice
//   `keep_running` going false. Each accepted stream goes back to blocking
//   mode and is handed to a new session thread; accept never waits on a
//   session.
// - **Session threads** (one per client, see `session.rs`): detached. They
//   end on their own when their socket fails and are not joined or drained
//   on shutdown.
//
// The listener is the only resource the accept thread owns; returning from
// `accept_loop` drops it, which closes the port. `ServerHandle::stop` clears
// the flag and joins the accept thread.
//
// Binding is the one fatal step: `BroadcastServer::bind` reports a
// `BeaconError::Bind` naming the address, and the binary exits on it. Both
// source variants default to port 8085, so a second beacon on the same host
// fails here unless it is given another port.

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};

use crate::config::BeaconConfig;
use crate::error::{BeaconError, Result};
use crate::session::{ClientSession, SessionSettings};
use crate::source::LocationSource;
use crate::target::TargetRegistry;

/// Sleep between accept attempts when no connection is pending.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A bound listener plus everything a new session needs.
pub struct BroadcastServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    source: Arc<dyn LocationSource>,
    targets: TargetRegistry,
    settings: SessionSettings,
}

impl BroadcastServer {
    /// Bind the listening socket. Fails if the address is invalid or taken.
    pub fn bind(
        addr: &str,
        source: Arc<dyn LocationSource>,
        targets: TargetRegistry,
        settings: SessionSettings,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| BeaconError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            source,
            targets,
            settings,
        })
    }

    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept clients until `keep_running` is cleared, spawning one session
    /// thread per connection. Closes the listener on return.
    pub fn accept_loop(self, keep_running: Arc<AtomicBool>) -> Result<()> {
        self.listener.set_nonblocking(true)?;
        info!(
            "GPS server listening on {} (cadence {:?})",
            self.local_addr, self.settings.cadence
        );

        while keep_running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    info!("Accepted connection from {addr}");
                    self.launch_session(stream, addr);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("Accept error: {e}");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        info!("Shutting down server on {}", self.local_addr);
        Ok(())
    }

    /// Run `accept_loop` on a background thread.
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr;
        let keep_running = Arc::new(AtomicBool::new(true));
        let keep_running_clone = keep_running.clone();

        let thread = thread::Builder::new()
            .name("gps-accept".into())
            .spawn(move || {
                if let Err(e) = self.accept_loop(keep_running_clone) {
                    error!("Accept loop failed: {e}");
                }
            })?;

        Ok(ServerHandle {
            keep_running,
            thread: Some(thread),
            local_addr,
        })
    }

    fn launch_session(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(false) {
            warn!("Dropping {addr}: cannot switch socket to blocking mode: {e}");
            return;
        }
        let session = match ClientSession::new(
            stream,
            self.source.clone(),
            self.targets.clone(),
            self.settings,
        ) {
            Ok(session) => session,
            Err(e) => {
                warn!("Dropping {addr}: {e}");
                return;
            }
        };

        let spawned = thread::Builder::new()
            .name(format!("session-{addr}"))
            .spawn(move || {
                session.run();
            });
        if let Err(e) = spawned {
            error!("Failed to start session for {addr}: {e}");
        }
    }
}

/// Handle returned by `BroadcastServer::spawn` to stop the accept thread.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and close the listener. Running sessions are left to
    /// end on their own.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Bind on the configured address and start accepting on a background
/// thread. Returns the handle and the actual bound address.
pub fn start_server(
    config: &BeaconConfig,
    source: Arc<dyn LocationSource>,
    targets: TargetRegistry,
) -> Result<(ServerHandle, SocketAddr)> {
    let server = BroadcastServer::bind(
        &config.listen_address(),
        source,
        targets,
        SessionSettings::from_config(config),
    )?;
    let addr = server.local_addr();
    Ok((server.spawn()?, addr))
}

/// Best guess at the address other devices on the network should connect to.
///
/// "Connects" a UDP socket toward a public address and reads back the local
/// end the OS picked. UDP connect sends nothing. Returns `None` without a
/// route.
pub fn advertised_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use gps_beacon_protocol::{Framing, LocationReading, PacketReader};

    use super::*;

    struct Origin;

    impl LocationSource for Origin {
        fn poll(&self) -> LocationReading {
            LocationReading::new(0.5, 0.25, 1.0)
        }

        fn describe(&self) -> String {
            "origin".into()
        }
    }

    fn test_settings() -> SessionSettings {
        SessionSettings {
            cadence: Duration::from_millis(20),
            framing: Framing::Concatenated,
            log_packets: false,
        }
    }

    fn bind_local() -> BroadcastServer {
        BroadcastServer::bind(
            "127.0.0.1:0",
            Arc::new(Origin),
            TargetRegistry::new(),
            test_settings(),
        )
        .unwrap()
    }

    #[test]
    fn bind_reports_os_assigned_port() {
        let server = bind_local();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[test]
    fn bind_fails_when_port_in_use() {
        let first = bind_local();
        let addr = first.local_addr().to_string();
        let err = BroadcastServer::bind(
            &addr,
            Arc::new(Origin),
            TargetRegistry::new(),
            test_settings(),
        )
        .err()
        .expect("second bind on the same port should fail");
        match err {
            BeaconError::Bind { addr: reported, .. } => assert_eq!(reported, addr),
            other => panic!("expected Bind error, got {other:?}"),
        }
    }

    #[test]
    fn bind_rejects_invalid_address() {
        let err = BroadcastServer::bind(
            "not-an-address",
            Arc::new(Origin),
            TargetRegistry::new(),
            test_settings(),
        )
        .err()
        .expect("invalid address should fail");
        assert!(matches!(err, BeaconError::Bind { .. }));
    }

    #[test]
    fn spawned_server_streams_and_stops() {
        let server = bind_local();
        let addr = server.local_addr();
        let handle = server.spawn().unwrap();
        assert_eq!(handle.local_addr(), addr);

        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut reader = PacketReader::new(stream);
        let packet = reader.read_packet().unwrap();
        assert_eq!((packet.latitude, packet.longitude, packet.altitude), (0.5, 0.25, 1.0));

        handle.stop();
        // The listener is closed once stop returns.
        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn dead_session_does_not_block_accept() {
        let server = bind_local();
        let addr = server.local_addr();
        let handle = server.spawn().unwrap();

        let first = TcpStream::connect(addr).unwrap();
        drop(first);

        let mut second = TcpStream::connect(addr).unwrap();
        second.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(second.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'{');

        handle.stop();
    }

    #[test]
    fn advertised_ip_is_specific() {
        if let Some(ip) = advertised_ip() {
            assert!(!ip.is_unspecified());
        }
    }
}
