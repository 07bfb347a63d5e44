// CLI entry point for the GPS beacon.
//
// Binds the broadcast port, starts the operator console on stdin, and runs
// the accept loop on the main thread until Ctrl+C. See `server.rs` for the
// networking architecture and `console.rs` for operator commands.
//
// Usage:
//   gps-beacon [OPTIONS]
//     --config <PATH>        TOML config file (flags below override it)
//     --source <KIND>        live | simulated (default: simulated)
//     --port <PORT>          Listen port (default: 8085)
//     --bind <ADDR>          Listen address (default: 0.0.0.0)
//     --cadence-ms <MS>      Delay between packets (default: 5000 live, 10000 simulated)
//     --newline              Terminate each JSON packet with '\n'
//     --debug                Debug logging, including every sent packet

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gps_beacon_protocol::Framing;
use gps_beacon_server::config::{BeaconConfig, SourceKind};
use gps_beacon_server::console::spawn_stdin_console;
use gps_beacon_server::error::Result;
use gps_beacon_server::server::{BroadcastServer, advertised_ip};
use gps_beacon_server::session::SessionSettings;
use gps_beacon_server::source::{LocationSource, build_source};
use gps_beacon_server::target::TargetRegistry;
use log::{error, info};

/// Parsed command line. `None` fields keep the config file / default value.
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    source: Option<SourceKind>,
    port: Option<u16>,
    bind: Option<String>,
    cadence_ms: Option<u64>,
    newline: bool,
    debug: bool,
}

#[derive(Debug, PartialEq)]
enum CliCommand {
    Run(CliArgs),
    Help,
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(CliCommand::Run(args)) => args,
        Ok(CliCommand::Help) => {
            print_usage();
            return;
        }
        Err(message) => {
            eprintln!("{message}");
            print_usage();
            std::process::exit(1);
        }
    };

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(args) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = load_config(args)?;
    info!("Starting GPS beacon ({} source)", config.source);

    let source = build_source(&config)?;
    source.prepare();

    let targets = TargetRegistry::new();
    let server = BroadcastServer::bind(
        &config.listen_address(),
        source.clone(),
        targets.clone(),
        SessionSettings::from_config(&config),
    )?;
    print_banner(server.local_addr(), source.as_ref());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    spawn_stdin_console(targets)?;
    server.accept_loop(running)
}

/// Config file (if any), then command-line overrides.
fn load_config(args: CliArgs) -> Result<BeaconConfig> {
    let mut config = match &args.config_path {
        Some(path) => {
            info!("Using config: {}", path.display());
            BeaconConfig::from_file(path)?
        }
        None => BeaconConfig::default(),
    };

    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(cadence_ms) = args.cadence_ms {
        config.cadence_ms = Some(cadence_ms);
    }
    if args.newline {
        config.framing = Framing::NewlineDelimited;
    }
    if args.debug {
        config.log_packets = true;
    }
    Ok(config)
}

/// Parse command-line arguments (without the program name). Uses simple
/// matching, no clap dependency.
fn parse_args<I>(args: I) -> std::result::Result<CliCommand, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config requires a path")?;
                parsed.config_path = Some(PathBuf::from(path));
            }
            "--source" => {
                let kind = args.next().ok_or("--source requires 'live' or 'simulated'")?;
                parsed.source = Some(kind.parse().map_err(|e| format!("--source: {e}"))?);
            }
            "--port" => {
                parsed.port = Some(
                    args.next()
                        .and_then(|s| s.parse().ok())
                        .ok_or("--port requires a valid port number")?,
                );
            }
            "--bind" => {
                parsed.bind = Some(args.next().ok_or("--bind requires an address")?);
            }
            "--cadence-ms" => {
                parsed.cadence_ms = Some(
                    args.next()
                        .and_then(|s| s.parse().ok())
                        .ok_or("--cadence-ms requires a number of milliseconds")?,
                );
            }
            "--newline" => parsed.newline = true,
            "--debug" => parsed.debug = true,
            "--help" | "-h" => return Ok(CliCommand::Help),
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    Ok(CliCommand::Run(parsed))
}

fn print_usage() {
    println!("Usage: gps-beacon [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config, -c <PATH>    TOML config file (flags override it)");
    println!("  --source <KIND>        live | simulated (default: simulated)");
    println!("  --port <PORT>          Listen port (default: 8085)");
    println!("  --bind <ADDR>          Listen address (default: 0.0.0.0)");
    println!("  --cadence-ms <MS>      Delay between packets (default: 5000 live, 10000 sim)");
    println!("  --newline              Terminate each JSON packet with a newline");
    println!("  --debug                Debug logging, including every sent packet");
    println!("  --help, -h             Show this help");
}

fn print_banner(addr: SocketAddr, source: &dyn LocationSource) {
    let ip = advertised_ip().map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
    println!("[*] GPS server running ({})", source.describe());
    println!("[*] IP Address: {ip}");
    println!("[*] Port: {}", addr.port());
    println!("[*] Connect clients to {ip}:{}", addr.port());
    println!("[*] Target location interaction enabled");
    println!("[*] Press Ctrl+C to stop the server");
}
