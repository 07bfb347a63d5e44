// gps_beacon_server — streams location fixes to display clients over TCP.
//
// The server accepts any number of TCP clients and, on a fixed cadence per
// client, sends each one a JSON packet holding the current location (from a
// live device command or a random generator) merged with an optional target
// waypoint that the operator sets from the console.
//
// Module overview:
// - `target.rs`:   `TargetRegistry`, the one piece of shared mutable state
//                  (operator writes, every session reads).
// - `source/`:     `LocationSource` trait plus the live (external command) and
//                  simulated (random) variants.
// - `session.rs`:  `ClientSession`, the per-connection send loop.
// - `server.rs`:   `BroadcastServer`, the listener and accept loop that spawns
//                  one session thread per client.
// - `console.rs`:  `OperatorConsole`, line commands that set/clear the target.
// - `client.rs`:   `BeaconClient`, a receiving client for tools and tests.
// - `config.rs`:   `BeaconConfig` defaults and TOML loading.
// - `error.rs`:    `BeaconError` and the `Result` alias.
//
// Dependencies: `gps_beacon_protocol` for the packet types and framing.
// Plain `std::net` and `std::thread`, no async runtime.
//
// The server runs as a standalone binary (`main.rs`) or embedded through
// `start_server`.

pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod server;
pub mod session;
pub mod source;
pub mod target;

pub use client::BeaconClient;
pub use config::{BeaconConfig, SourceKind};
pub use error::{BeaconError, Result};
pub use server::{BroadcastServer, ServerHandle, start_server};
pub use source::{LocationSource, build_source};
pub use target::TargetRegistry;
