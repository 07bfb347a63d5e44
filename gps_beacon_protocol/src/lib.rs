// gps_beacon_protocol — wire format for GPS beacon location broadcasts.
//
// This crate defines what a beacon server writes to its display clients and
// how clients read it back. It is shared by the server crate
// (`gps_beacon_server`) and any client, and has no networking code of its own.
//
// Module overview:
// - `packet.rs`:   `LocationReading` (one source poll), `TargetWaypoint` (the
//                  operator's optional target), and `OutboundPacket` (their
//                  flat merge, the only thing that goes on the wire).
// - `framing.rs`:  Packet encoding/writing and `PacketReader`, a streaming
//                  decoder that handles both delimiter-free and
//                  newline-delimited streams.
//
// Design decisions:
// - **JSON with camelCase keys.** Display clients parse a fixed key set
//   (`latitude`, ..., `targetLatitude`, ..., `hasTarget`); serde renames keep
//   the Rust field names idiomatic.
// - **Absent target coordinates are `null`, not 0.** A target at 0,0 must be
//   distinguishable from no target.
// - **No async runtime.** Plain `std::io::Read`/`Write`, so blocking sockets
//   and in-memory buffers both work.

pub mod framing;
pub mod packet;

pub use framing::{Framing, PacketReader, encode_packet, write_packet};
pub use packet::{LocationReading, OutboundPacket, TargetWaypoint, now_millis};
