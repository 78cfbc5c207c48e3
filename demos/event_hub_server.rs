//! Event hub server with a synthetic producer
//!
//! Run with: cargo run --example event_hub_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example event_hub_server                    # binds to 0.0.0.0:7053
//!   cargo run --example event_hub_server localhost          # binds to 127.0.0.1:7053
//!   cargo run --example event_hub_server 127.0.0.1:7100     # binds to 127.0.0.1:7100
//!
//! The producer emits one block per second, a chaincode event from
//! `asset_cc` with each block, and a generic heartbeat every fifth block.
//! Connect with `cargo run --example event_listener` to watch them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use event_hub::{Event, EventHub, EventServer, HubConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:7053
/// - "127.0.0.1" -> 127.0.0.1:7053
/// - "127.0.0.1:7100" -> 127.0.0.1:7100
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 7053;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: event_hub_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:7053)");
}

/// Emit synthetic events until the hub shuts down
async fn produce(hub: Arc<EventHub>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut number: u64 = 0;

    while !hub.is_shutdown() {
        ticker.tick().await;
        number += 1;

        let mut events = vec![
            Event::block(number, format!("block-{}", number)),
            Event::chaincode("asset_cc", "transfer", format!("{{\"block\":{}}}", number)),
        ];
        if number % 5 == 0 {
            events.push(Event::generic("heartbeat", number.to_string()));
        }

        for event in events {
            match hub.accept(event).await {
                Ok(report) => tracing::debug!(
                    block = number,
                    matched = report.matched,
                    delivered = report.delivered,
                    "Produced event"
                ),
                Err(e) => tracing::warn!(error = %e, "Producer event refused"),
            }
        }

        if number % 10 == 0 {
            let stats = hub.stats().await;
            println!(
                "Stats: connections={} accepted={} deliveries={} drops={}",
                stats.active_connections, stats.events_accepted, stats.deliveries, stats.drops
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => HubConfig::default().bind_addr,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("event_hub=debug".parse()?)
                .add_directive("event_hub_server=debug".parse()?),
        )
        .init();

    let config = HubConfig::with_addr(bind_addr);
    println!("Starting event hub on {}", config.bind_addr);

    let server = EventServer::new(config);
    let producer = tokio::spawn(produce(Arc::clone(server.hub())));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    producer.abort();
    Ok(())
}
