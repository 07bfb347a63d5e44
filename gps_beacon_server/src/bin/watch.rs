// Minimal display client: connects to a beacon and prints every packet.
//
// Usage:
//   gps-beacon-watch [ADDR]     (default: 127.0.0.1:8085)

use gps_beacon_protocol::OutboundPacket;
use gps_beacon_server::client::BeaconClient;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = match std::env::args().nth(1).as_deref() {
        Some("--help" | "-h") => {
            println!("Usage: gps-beacon-watch [ADDR]   (default: 127.0.0.1:8085)");
            return;
        }
        Some(addr) => addr.to_string(),
        None => "127.0.0.1:8085".to_string(),
    };

    let client = match BeaconClient::connect(addr.as_str()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to {addr}: {e}");
            std::process::exit(1);
        }
    };
    println!("Connected to {}", client.peer());

    while let Some(packet) = client.recv() {
        println!("{}", describe(&packet));
    }
    println!("Connection closed");
}

fn describe(packet: &OutboundPacket) -> String {
    let fix = if packet.valid {
        format!(
            "{:.4}, {:.4} alt {:.1} m",
            packet.latitude, packet.longitude, packet.altitude
        )
    } else {
        "no fix".to_string()
    };
    let target = packet.target();
    match (target.latitude(), target.longitude()) {
        (Some(lat), Some(lon)) => format!(
            "[{}] {fix} | target {lat}, {lon} alt {} m",
            packet.timestamp,
            target.altitude()
        ),
        _ => format!("[{}] {fix} | no target", packet.timestamp),
    }
}
