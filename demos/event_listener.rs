//! Event listener example
//!
//! Run with: cargo run --example event_listener [HUB_ADDR] [CHAINCODE_ID] [EVENT_NAME]
//!
//! Examples:
//!   cargo run --example event_listener                                  # blocks from 127.0.0.1:7053
//!   cargo run --example event_listener 127.0.0.1:7053 asset_cc          # blocks + any asset_cc event
//!   cargo run --example event_listener 127.0.0.1:7053 asset_cc transfer # blocks + asset_cc "transfer"

use std::sync::atomic::{AtomicU64, Ordering};

use event_hub::error::BoxError;
use event_hub::{ClientConfig, Error, Event, EventAdapter, EventsClient, Interest};

/// Adapter that prints every event it receives
struct Printer {
    interests: Vec<Interest>,
    received: AtomicU64,
}

impl EventAdapter for Printer {
    fn interested_events(&self) -> Vec<Interest> {
        self.interests.clone()
    }

    async fn on_event(&self, event: Event) -> Result<bool, BoxError> {
        let n = self.received.fetch_add(1, Ordering::Relaxed) + 1;

        match &event {
            Event::Block(block) => {
                println!("[{}] Block #{} ({} bytes)", n, block.number, block.payload.len())
            }
            Event::Chaincode(cc) => println!(
                "[{}] Chaincode {} emitted '{}': {}",
                n,
                cc.chaincode_id,
                cc.event_name,
                String::from_utf8_lossy(&cc.payload)
            ),
            Event::Generic(generic) => println!(
                "[{}] {} event: {}",
                n,
                generic.event_type,
                String::from_utf8_lossy(&generic.payload)
            ),
            Event::Unset => return Ok(false),
        }

        Ok(true)
    }

    async fn on_disconnected(&self, err: Option<&Error>) {
        match err {
            Some(e) => println!("Disconnected: {}", e),
            None => println!("Stopped after {} events", self.received.load(Ordering::Relaxed)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("event_hub=info".parse()?)
                .add_directive("event_listener=debug".parse()?),
        )
        .init();

    let addr = match args.get(1) {
        Some(addr) => addr.replace("localhost", "127.0.0.1").parse()?,
        None => ClientConfig::default().addr,
    };

    let mut interests = vec![Interest::block()];
    if let Some(chaincode_id) = args.get(2) {
        let event_name = args.get(3).map(String::as_str).unwrap_or("");
        interests.push(Interest::chaincode(chaincode_id.as_str(), event_name));
    }

    for interest in &interests {
        println!("Interest: {}", interest);
    }

    let adapter = Printer {
        interests,
        received: AtomicU64::new(0),
    };
    let mut client = EventsClient::new(ClientConfig::new(addr), adapter);

    client.start().await?;
    println!("Listening on {} (Ctrl+C to stop)", addr);

    tokio::signal::ctrl_c().await?;
    if client.is_running() {
        client.stop().await?;
    }

    Ok(())
}
