//! Hub-side connection
//!
//! One connection runs as two cooperating tasks:
//!
//! - the reader (this task) owns the inbound half, handles the registration
//!   handshake, later Register/Unregister messages, peer close and hub
//!   shutdown
//! - the writer (spawned) drains the delivery queue and a small control
//!   channel to the outbound half
//!
//! The reader dropping its control sender is the writer's cancellation
//! signal. Whatever ends the connection, the subscription is released before
//! [`Connection::run`] returns.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::hub::EventHub;
use crate::error::{Error, Result};
use crate::protocol::{FrameReader, FrameWriter, Message};
use crate::registry::{ConnectionId, QueueReceiver, RegistryError};
use crate::session::{CloseReason, SessionState};
use crate::stats::ConnectionStats;

/// Control messages buffered between reader and writer
const CONTROL_CHANNEL_SIZE: usize = 8;

/// How long teardown waits for the writer to flush a final message
const WRITER_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

pub(crate) struct Connection<S> {
    state: SessionState,
    reader: FrameReader<ReadHalf<S>>,
    /// Moved into the writer task once streaming starts
    writer: Option<FrameWriter<WriteHalf<S>>>,
    hub: Arc<EventHub>,
    shutdown: watch::Receiver<bool>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub(crate) fn new(
        id: ConnectionId,
        stream: S,
        peer_addr: Option<SocketAddr>,
        hub: Arc<EventHub>,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let max_frame_size = hub.config().max_frame_size;
        let shutdown = hub.subscribe_shutdown();

        Self {
            state: SessionState::new(id, peer_addr),
            reader: FrameReader::with_max_frame_size(read_half, max_frame_size),
            writer: Some(FrameWriter::new(write_half)),
            hub,
            shutdown,
        }
    }

    /// Run the connection to completion
    pub(crate) async fn run(mut self) -> CloseReason {
        let id = self.state.id;

        let queue = match self.handshake().await {
            Ok(queue) => queue,
            Err(reason) => {
                if let Some(writer) = self.writer.as_mut() {
                    let _ = writer.shutdown().await;
                }
                return self.finish(reason);
            }
        };

        let reason = self.stream_events(queue).await;
        self.hub.registry().unregister(id).await;

        self.finish(reason)
    }

    fn finish(mut self, reason: CloseReason) -> CloseReason {
        let phase = self.state.phase;
        let reason = self.state.close(reason);

        tracing::info!(
            connection_id = self.state.id,
            peer = ?self.state.peer_addr,
            phase = ?phase,
            registrations = self.state.registrations,
            streamed_ms = ?self.state.registered_at.map(|t| t.elapsed().as_millis() as u64),
            reason = %reason,
            duration_ms = self.state.duration().as_millis() as u64,
            "Connection closed"
        );
        reason
    }

    /// Connecting → Registered → Streaming
    ///
    /// On success the subscription exists and has been acknowledged.
    async fn handshake(&mut self) -> std::result::Result<QueueReceiver, CloseReason> {
        let id = self.state.id;
        let timeout = self.hub.config().registration_timeout;

        let first = tokio::select! {
            result = tokio::time::timeout(timeout, self.reader.read_message()) => result,
            _ = shutdown_requested(&mut self.shutdown) => return Err(CloseReason::Shutdown),
        };

        let interests = match first {
            Err(_) => return Err(CloseReason::RegistrationTimeout),
            Ok(Ok(Some(Message::Register(interests)))) => interests,
            Ok(Ok(Some(other))) => {
                let reason = format!("expected Register, got {}", other.name());
                tracing::warn!(connection_id = id, "{}", reason);
                self.reject(&reason).await;
                return Err(CloseReason::Protocol(reason));
            }
            Ok(Ok(None)) => return Err(CloseReason::PeerClosed),
            Ok(Err(e)) => return Err(self.read_failed(e).await),
        };

        let queue = match self.hub.registry().register(id, interests.clone()).await {
            Ok(Some(queue)) => queue,
            Ok(None) => {
                // Ids are never reused, so an existing entry is a bug upstream
                self.hub.registry().unregister(id).await;
                return Err(CloseReason::Registration(format!(
                    "connection {} already registered",
                    id
                )));
            }
            Err(e) => {
                tracing::warn!(connection_id = id, error = %e, "Registration refused");
                self.reject(&e.to_string()).await;
                return Err(CloseReason::Registration(e.to_string()));
            }
        };
        self.state.on_registered();

        let ack = Message::Registered(interests.clone());
        let written = match self.writer.as_mut() {
            Some(writer) => writer.write_message(&ack).await,
            None => Err(Error::NotRunning),
        };
        if let Err(e) = written {
            self.hub.registry().unregister(id).await;
            return Err(CloseReason::Transport(e.to_string()));
        }
        self.state.start_streaming();

        tracing::debug!(
            connection_id = id,
            interests = interests.len(),
            "Connection streaming"
        );

        Ok(queue)
    }

    /// Streaming until something closes the connection
    async fn stream_events(&mut self, queue: QueueReceiver) -> CloseReason {
        let id = self.state.id;
        let stats = match self.hub.registry().stats_for(id).await {
            Some(stats) => stats,
            // Removed between registration and now: hub shut down
            None => return CloseReason::Shutdown,
        };

        let Some(writer) = self.writer.take() else {
            return CloseReason::Transport("writer already taken".into());
        };

        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);
        let mut writer_task: JoinHandle<Result<()>> =
            tokio::spawn(write_loop(id, writer, queue, control_rx, stats));
        let mut writer_done = false;

        let reason = loop {
            tokio::select! {
                msg = self.reader.read_message() => match msg {
                    Ok(Some(Message::Register(interests))) => {
                        match self.hub.registry().update(id, interests.clone()).await {
                            Ok(()) => {
                                self.state.on_registered();
                                let _ = control_tx.send(Message::Registered(interests)).await;
                            }
                            // Subscription already released by hub shutdown
                            Err(RegistryError::NotFound(_)) => break CloseReason::Shutdown,
                            Err(e) => {
                                tracing::warn!(connection_id = id, error = %e, "Re-registration refused");
                                let _ = control_tx.send(Message::Rejection(e.to_string())).await;
                                break CloseReason::Registration(e.to_string());
                            }
                        }
                    }
                    Ok(Some(Message::Unregister)) => break CloseReason::Unregistered,
                    Ok(Some(other)) => {
                        let reason = format!("unexpected {} from subscriber", other.name());
                        tracing::warn!(connection_id = id, "{}", reason);
                        let _ = control_tx.send(Message::Rejection(reason.clone())).await;
                        break CloseReason::Protocol(reason);
                    }
                    Ok(None) => break CloseReason::PeerClosed,
                    Err(Error::Protocol(e)) => {
                        tracing::warn!(connection_id = id, error = %e, "Protocol violation");
                        let _ = control_tx.send(Message::Rejection(e.to_string())).await;
                        break CloseReason::Protocol(e.to_string());
                    }
                    Err(e) => break CloseReason::Transport(e.to_string()),
                },
                _ = shutdown_requested(&mut self.shutdown) => break CloseReason::Shutdown,
                result = &mut writer_task => {
                    writer_done = true;
                    break match result {
                        // Queue closed underneath the writer: subscription removed
                        Ok(Ok(())) => CloseReason::Shutdown,
                        Ok(Err(e)) => CloseReason::Transport(e.to_string()),
                        Err(e) => CloseReason::Transport(e.to_string()),
                    };
                }
            }
        };

        drop(control_tx);
        if !writer_done {
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task)
                .await
                .is_err()
            {
                writer_task.abort();
            }
        }

        reason
    }

    /// Send a Rejection before the writer task exists
    async fn reject(&mut self, reason: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writer
            .write_message(&Message::Rejection(reason.to_string()))
            .await
        {
            tracing::debug!(connection_id = self.state.id, error = %e, "Failed to send rejection");
        }
    }

    async fn read_failed(&mut self, err: Error) -> CloseReason {
        match err {
            Error::Protocol(e) => {
                tracing::warn!(connection_id = self.state.id, error = %e, "Protocol violation");
                self.reject(&e.to_string()).await;
                CloseReason::Protocol(e.to_string())
            }
            e => CloseReason::Transport(e.to_string()),
        }
    }
}

/// Outbound loop: control messages first, then queued events in order
async fn write_loop<W>(
    id: ConnectionId,
    mut writer: FrameWriter<W>,
    mut queue: QueueReceiver,
    mut control: mpsc::Receiver<Message>,
    stats: Arc<ConnectionStats>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let result = loop {
        tokio::select! {
            biased;
            msg = control.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = writer.write_message(&msg).await {
                        break Err(e);
                    }
                }
                None => break Ok(()),
            },
            event = queue.dequeue() => match event {
                Some(event) => {
                    if let Err(e) = writer.write_message(&Message::Event(event)).await {
                        break Err(e);
                    }
                    stats.record_sent();
                }
                None => break Ok(()),
            },
        }
    };

    // Undelivered events are discarded; any producer still waiting wakes up
    queue.close();
    let _ = writer.shutdown().await;

    tracing::debug!(
        connection_id = id,
        sent = stats.events_sent(),
        "Writer stopped"
    );

    result
}

/// Resolves once the hub asks connections to close
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::DuplexStream;

    use super::*;
    use crate::event::{Event, Interest};
    use crate::server::config::HubConfig;

    type Peer = (FrameReader<ReadHalf<DuplexStream>>, FrameWriter<WriteHalf<DuplexStream>>);

    /// Start a session for an in-memory peer
    fn connect(hub: &Arc<EventHub>) -> (Peer, JoinHandle<CloseReason>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let hub = Arc::clone(hub);
        let session = tokio::spawn(async move { hub.serve_connection(server, None).await });

        let (r, w) = tokio::io::split(client);
        ((FrameReader::new(r), FrameWriter::new(w)), session)
    }

    async fn wait_for_connections(hub: &EventHub, count: usize) {
        for _ in 0..100 {
            if hub.connection_count().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} registered connection(s)", count);
    }

    #[tokio::test]
    async fn test_register_receive_unregister() {
        let hub = Arc::new(EventHub::default());
        let ((mut r, mut w), session) = connect(&hub);

        w.write_message(&Message::Register(vec![Interest::block()]))
            .await
            .unwrap();
        assert_eq!(
            r.read_message().await.unwrap(),
            Some(Message::Registered(vec![Interest::block()]))
        );

        hub.accept(Event::block(7, "body")).await.unwrap();
        hub.accept(Event::generic("ignored", "")).await.unwrap();
        hub.accept(Event::block(8, "")).await.unwrap();

        assert_eq!(
            r.read_message().await.unwrap(),
            Some(Message::Event(Event::block(7, "body")))
        );
        assert_eq!(
            r.read_message().await.unwrap(),
            Some(Message::Event(Event::block(8, "")))
        );

        w.write_message(&Message::Unregister).await.unwrap();
        assert_eq!(session.await.unwrap(), CloseReason::Unregistered);
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(r.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_first_message_must_be_register() {
        let hub = Arc::new(EventHub::default());
        let ((mut r, mut w), session) = connect(&hub);

        w.write_message(&Message::Unregister).await.unwrap();

        assert!(matches!(
            r.read_message().await.unwrap(),
            Some(Message::Rejection(_))
        ));
        assert!(matches!(session.await.unwrap(), CloseReason::Protocol(_)));
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_interests_rejected() {
        let hub = Arc::new(EventHub::default());
        let ((mut r, mut w), session) = connect(&hub);

        w.write_message(&Message::Register(vec![])).await.unwrap();

        assert!(matches!(
            r.read_message().await.unwrap(),
            Some(Message::Rejection(_))
        ));
        assert!(matches!(
            session.await.unwrap(),
            CloseReason::Registration(_)
        ));
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_registration_timeout() {
        let hub = Arc::new(EventHub::new(
            HubConfig::default().registration_timeout(Duration::from_millis(20)),
        ));
        let ((_r, _w), session) = connect(&hub);

        assert_eq!(session.await.unwrap(), CloseReason::RegistrationTimeout);
    }

    #[tokio::test]
    async fn test_peer_close_releases_subscription() {
        let hub = Arc::new(EventHub::default());
        let ((mut r, mut w), session) = connect(&hub);

        w.write_message(&Message::Register(vec![Interest::any_chaincode()]))
            .await
            .unwrap();
        r.read_message().await.unwrap();
        assert_eq!(hub.connection_count().await, 1);

        drop(w);
        drop(r);

        assert_eq!(session.await.unwrap(), CloseReason::PeerClosed);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_reregister_replaces_interests() {
        let hub = Arc::new(EventHub::default());
        let ((mut r, mut w), _session) = connect(&hub);

        w.write_message(&Message::Register(vec![Interest::block()]))
            .await
            .unwrap();
        r.read_message().await.unwrap();

        let generic = vec![Interest::generic()];
        w.write_message(&Message::Register(generic.clone()))
            .await
            .unwrap();
        assert_eq!(
            r.read_message().await.unwrap(),
            Some(Message::Registered(generic))
        );

        hub.accept(Event::block(1, "")).await.unwrap();
        hub.accept(Event::generic("g", "")).await.unwrap();

        assert_eq!(
            r.read_message().await.unwrap(),
            Some(Message::Event(Event::generic("g", "")))
        );
    }

    #[tokio::test]
    async fn test_reregister_after_release_does_not_resubscribe() {
        let hub = Arc::new(EventHub::default());
        let ((mut r, mut w), session) = connect(&hub);

        w.write_message(&Message::Register(vec![Interest::block()]))
            .await
            .unwrap();
        r.read_message().await.unwrap();

        // Drop the subscription without signalling the connection
        hub.registry().clear().await;
        w.write_message(&Message::Register(vec![Interest::generic()]))
            .await
            .unwrap();

        assert_eq!(session.await.unwrap(), CloseReason::Shutdown);
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(r.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hub_shutdown_closes_connection() {
        let hub = Arc::new(EventHub::default());
        let ((mut r, mut w), session) = connect(&hub);

        w.write_message(&Message::Register(vec![Interest::block()]))
            .await
            .unwrap();
        r.read_message().await.unwrap();
        wait_for_connections(&hub, 1).await;

        hub.shutdown().await;

        assert_eq!(session.await.unwrap(), CloseReason::Shutdown);
        assert_eq!(r.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_event_from_subscriber_is_protocol_error() {
        let hub = Arc::new(EventHub::default());
        let ((mut r, mut w), session) = connect(&hub);

        w.write_message(&Message::Register(vec![Interest::block()]))
            .await
            .unwrap();
        r.read_message().await.unwrap();

        w.write_message(&Message::Event(Event::block(1, "")))
            .await
            .unwrap();

        assert!(matches!(
            r.read_message().await.unwrap(),
            Some(Message::Rejection(_))
        ));
        assert!(matches!(session.await.unwrap(), CloseReason::Protocol(_)));
    }
}
