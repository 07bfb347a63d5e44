// Packet framing over a byte stream.
//
// The beacon sends one JSON object per write. By default nothing separates
// consecutive objects (`Framing::Concatenated`), which is what existing
// display clients expect. `Framing::NewlineDelimited` appends `\n` after each
// object for line-oriented consumers.
//
// Readers don't need to know which framing the server picked: `PacketReader`
// wraps a `serde_json` stream deserializer, which skips whitespace between
// values and treats every JSON object as self-delimiting. It also buffers
// partial reads, so an object split across TCP segments decodes correctly.

use std::io::{self, BufReader, Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::de::IoRead;
use serde_json::{Deserializer, StreamDeserializer};

use crate::packet::OutboundPacket;

/// How consecutive packets are separated on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Objects back to back, no delimiter.
    #[default]
    Concatenated,
    /// Each object followed by a single `\n`.
    NewlineDelimited,
}

/// Serialize a packet into the bytes for one send.
pub fn encode_packet(packet: &OutboundPacket, framing: Framing) -> serde_json::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(packet)?;
    if framing == Framing::NewlineDelimited {
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// Encode a packet and write it out in a single `write_all`, then flush.
pub fn write_packet<W: Write>(
    writer: &mut W,
    packet: &OutboundPacket,
    framing: Framing,
) -> io::Result<()> {
    let bytes = encode_packet(packet, framing)?;
    writer.write_all(&bytes)?;
    writer.flush()
}

/// Incremental packet decoder for either framing.
pub struct PacketReader<R: Read> {
    packets: StreamDeserializer<'static, IoRead<BufReader<R>>, OutboundPacket>,
}

impl<R: Read> PacketReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            packets: Deserializer::from_reader(BufReader::new(reader)).into_iter(),
        }
    }

    /// Block until the next complete packet arrives.
    ///
    /// Returns `UnexpectedEof` once the stream closes (cleanly or mid-object)
    /// and `InvalidData` for bytes that aren't a packet. After an error the
    /// reader should be discarded.
    pub fn read_packet(&mut self) -> io::Result<OutboundPacket> {
        match self.packets.next() {
            Some(Ok(packet)) => Ok(packet),
            Some(Err(e)) => Err(e.into()),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "packet stream closed",
            )),
        }
    }
}

impl<R: Read> Iterator for PacketReader<R> {
    type Item = io::Result<OutboundPacket>;

    /// Yields packets until the stream ends; a clean close ends iteration.
    fn next(&mut self) -> Option<Self::Item> {
        self.packets.next().map(|r| r.map_err(io::Error::from))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::packet::{LocationReading, TargetWaypoint};

    fn sample(lat: f64, target: TargetWaypoint) -> OutboundPacket {
        OutboundPacket::merge(&LocationReading::new(lat, 10.5, 42.0), &target)
    }

    /// A reader that hands out one byte per `read` call, like a slow socket.
    struct Trickle {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn concatenated_has_no_delimiter() {
        let packet = sample(63.4, TargetWaypoint::unset());
        let bytes = encode_packet(&packet, Framing::Concatenated).unwrap();
        assert_eq!(bytes.first(), Some(&b'{'));
        assert_eq!(bytes.last(), Some(&b'}'));
    }

    #[test]
    fn newline_framing_appends_newline() {
        let packet = sample(63.4, TargetWaypoint::unset());
        let bytes = encode_packet(&packet, Framing::NewlineDelimited).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn reads_back_to_back_objects() {
        let packets = vec![
            sample(63.30, TargetWaypoint::unset()),
            sample(63.35, TargetWaypoint::at(63.41, 10.5, 12.0)),
            sample(63.40, TargetWaypoint::unset()),
        ];
        let mut wire = Vec::new();
        for packet in &packets {
            write_packet(&mut wire, packet, Framing::Concatenated).unwrap();
        }

        let mut reader = PacketReader::new(Cursor::new(wire));
        for expected in &packets {
            assert_eq!(&reader.read_packet().unwrap(), expected);
        }
        let err = reader.read_packet().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn reads_newline_delimited_objects() {
        let mut wire = Vec::new();
        write_packet(&mut wire, &sample(1.0, TargetWaypoint::unset()), Framing::NewlineDelimited)
            .unwrap();
        write_packet(&mut wire, &sample(2.0, TargetWaypoint::unset()), Framing::NewlineDelimited)
            .unwrap();

        let latitudes: Vec<f64> = PacketReader::new(Cursor::new(wire))
            .map(|p| p.unwrap().latitude)
            .collect();
        assert_eq!(latitudes, vec![1.0, 2.0]);
    }

    #[test]
    fn reassembles_split_reads() {
        let first = sample(63.3, TargetWaypoint::at(1.0, 2.0, 3.0));
        let second = sample(63.5, TargetWaypoint::unset());
        let mut bytes = encode_packet(&first, Framing::Concatenated).unwrap();
        bytes.extend(encode_packet(&second, Framing::Concatenated).unwrap());

        let mut reader = PacketReader::new(Trickle { bytes, pos: 0 });
        assert_eq!(reader.read_packet().unwrap(), first);
        assert_eq!(reader.read_packet().unwrap(), second);
    }

    #[test]
    fn truncated_object_is_eof() {
        let mut bytes = encode_packet(&sample(1.0, TargetWaypoint::unset()), Framing::Concatenated)
            .unwrap();
        bytes.truncate(bytes.len() / 2);
        let err = PacketReader::new(Cursor::new(bytes)).read_packet().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn garbage_is_invalid_data() {
        let err = PacketReader::new(Cursor::new(b"{\"latitude\": \"north\"}".to_vec()))
            .read_packet()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn framing_names_in_config() {
        let framing: Framing = serde_json::from_str("\"newline-delimited\"").unwrap();
        assert_eq!(framing, Framing::NewlineDelimited);
        assert_eq!(Framing::default(), Framing::Concatenated);
    }
}
