//! End-to-end tests over loopback TCP

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use event_hub::error::BoxError;
use event_hub::{
    ClientConfig, Error, Event, EventAdapter, EventHub, EventServer, EventsClient, HubConfig,
    Interest,
};

/// Window in which an event that should not arrive is waited for
const QUIET_WINDOW: Duration = Duration::from_millis(150);

struct TestServer {
    addr: SocketAddr,
    hub: Arc<EventHub>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start(config: HubConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = EventServer::new(config);
        let hub = Arc::clone(server.hub());
        let (stop, stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            server
                .serve_until(listener, async {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            hub,
            stop: Some(stop),
            task,
        }
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap();
    }
}

struct Collector {
    interests: Vec<Interest>,
    events: mpsc::UnboundedSender<Event>,
    disconnects: mpsc::UnboundedSender<Option<String>>,
}

impl EventAdapter for Collector {
    fn interested_events(&self) -> Vec<Interest> {
        self.interests.clone()
    }

    async fn on_event(&self, event: Event) -> Result<bool, BoxError> {
        self.events.send(event)?;
        Ok(true)
    }

    async fn on_disconnected(&self, err: Option<&Error>) {
        let _ = self.disconnects.send(err.map(|e| e.to_string()));
    }
}

struct Subscriber {
    client: EventsClient<Collector>,
    events: mpsc::UnboundedReceiver<Event>,
    disconnects: mpsc::UnboundedReceiver<Option<String>>,
}

impl Subscriber {
    fn new(addr: SocketAddr, interests: Vec<Interest>) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (disconnects_tx, disconnects) = mpsc::unbounded_channel();
        let adapter = Collector {
            interests,
            events: events_tx,
            disconnects: disconnects_tx,
        };

        Self {
            client: EventsClient::new(ClientConfig::new(addr), adapter),
            events,
            disconnects,
        }
    }

    async fn connect(addr: SocketAddr, interests: Vec<Interest>) -> Self {
        let mut subscriber = Self::new(addr, interests);
        subscriber.client.start().await.unwrap();
        subscriber
    }

    async fn next(&mut self) -> Event {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("adapter dropped")
    }

    async fn assert_quiet(&mut self) {
        let extra = tokio::time::timeout(QUIET_WINDOW, self.events.recv()).await;
        assert!(extra.is_err(), "unexpected event: {:?}", extra);
    }
}

#[tokio::test]
async fn test_overlapping_interests_deliver_exactly_once() {
    let server = TestServer::start(HubConfig::default()).await;
    let mut sub = Subscriber::connect(
        server.addr,
        vec![
            Interest::block(),
            Interest::chaincode("X", "ev1"),
            Interest::chaincode("X", ""),
        ],
    )
    .await;

    let event = Event::chaincode("X", "ev1", "payload");
    let report = server.hub.accept(event.clone()).await.unwrap();
    assert_eq!(report.delivered, 1);

    assert_eq!(sub.next().await, event);
    sub.assert_quiet().await;

    sub.client.stop().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_other_chaincode_not_delivered() {
    let server = TestServer::start(HubConfig::default()).await;
    let mut sub = Subscriber::connect(
        server.addr,
        vec![
            Interest::block(),
            Interest::chaincode("X", "ev1"),
            Interest::chaincode("X", ""),
        ],
    )
    .await;

    let report = server
        .hub
        .accept(Event::chaincode("Y", "ev1", ""))
        .await
        .unwrap();
    assert_eq!(report.matched, 0);
    sub.assert_quiet().await;

    sub.client.stop().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_block_only_subscriber() {
    let server = TestServer::start(HubConfig::default()).await;
    let mut sub = Subscriber::connect(server.addr, vec![Interest::block()]).await;

    server.hub.accept(Event::block(1, "b1")).await.unwrap();
    server
        .hub
        .accept(Event::chaincode("X", "ev1", ""))
        .await
        .unwrap();

    assert_eq!(sub.next().await, Event::block(1, "b1"));
    sub.assert_quiet().await;

    sub.client.stop().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_fan_out_to_several_subscribers() {
    let server = TestServer::start(HubConfig::default()).await;
    let mut blocks = Subscriber::connect(server.addr, vec![Interest::block()]).await;
    let mut ledger = Subscriber::connect(server.addr, vec![Interest::any_chaincode()]).await;
    let mut transfers =
        Subscriber::connect(server.addr, vec![Interest::chaincode("asset", "transfer")]).await;

    server.hub.accept(Event::block(10, "")).await.unwrap();
    server
        .hub
        .accept(Event::chaincode("asset", "transfer", "t1"))
        .await
        .unwrap();
    server
        .hub
        .accept(Event::chaincode("asset", "mint", "m1"))
        .await
        .unwrap();

    assert_eq!(blocks.next().await, Event::block(10, ""));
    assert_eq!(
        ledger.next().await,
        Event::chaincode("asset", "transfer", "t1")
    );
    assert_eq!(ledger.next().await, Event::chaincode("asset", "mint", "m1"));
    assert_eq!(
        transfers.next().await,
        Event::chaincode("asset", "transfer", "t1")
    );

    blocks.assert_quiet().await;
    transfers.assert_quiet().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_events_arrive_in_acceptance_order() {
    let server = TestServer::start(HubConfig::default().delivery_timeout(Duration::ZERO)).await;
    let mut sub = Subscriber::connect(server.addr, vec![Interest::block()]).await;

    for n in 0..500 {
        server.hub.accept(Event::block(n, "")).await.unwrap();
    }

    for n in 0..500 {
        match sub.next().await {
            Event::Block(block) => assert_eq!(block.number, n),
            other => panic!("unexpected event {:?}", other),
        }
    }

    sub.client.stop().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_event_leaves_sessions_intact() {
    let server = TestServer::start(HubConfig::default()).await;
    let mut sub = Subscriber::connect(server.addr, vec![Interest::block()]).await;

    let result = server
        .hub
        .accept(Event::block(1, vec![0u8; 5 * 1024 * 1024]))
        .await;
    assert!(matches!(
        result,
        Err(Error::Protocol(event_hub::error::ProtocolError::FrameTooLarge { .. }))
    ));
    assert_eq!(server.hub.stats().await.events_rejected, 1);

    server.hub.accept(Event::block(2, "next")).await.unwrap();
    assert_eq!(sub.next().await, Event::block(2, "next"));
    assert!(sub.client.is_running());
    assert!(sub.disconnects.try_recv().is_err());

    sub.client.stop().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_empty_interests_rejected() {
    let server = TestServer::start(HubConfig::default()).await;
    let mut sub = Subscriber::new(server.addr, vec![]);

    let err = sub.client.start().await.unwrap_err();
    assert!(matches!(err, Error::Rejected(_)));
    assert!(!sub.client.is_running());

    server.shutdown().await;
}

#[tokio::test]
async fn test_stop_unregisters_at_hub() {
    let server = TestServer::start(HubConfig::default()).await;
    let mut sub = Subscriber::connect(server.addr, vec![Interest::block()]).await;
    assert_eq!(server.hub.connection_count().await, 1);

    sub.client.stop().await.unwrap();
    assert_eq!(sub.disconnects.recv().await, Some(None));

    let mut remaining = 1;
    for _ in 0..100 {
        remaining = server.hub.connection_count().await;
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(remaining, 0);

    let report = server.hub.accept(Event::block(1, "")).await.unwrap();
    assert_eq!(report.matched, 0);

    // Caller-driven reconnect
    sub.client.start().await.unwrap();
    server.hub.accept(Event::block(2, "")).await.unwrap();
    assert_eq!(sub.next().await, Event::block(2, ""));

    sub.client.stop().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_hub_shutdown_disconnects_subscribers() {
    let server = TestServer::start(HubConfig::default()).await;
    let mut sub = Subscriber::connect(server.addr, vec![Interest::block()]).await;

    server.shutdown().await;

    let reason = tokio::time::timeout(Duration::from_secs(2), sub.disconnects.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(reason.is_some());

    // Already ended; stop only reaps the receive loop
    sub.client.stop().await.unwrap();
    assert!(!sub.client.is_running());
}
