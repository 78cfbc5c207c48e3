//! Event stream subscriber
//!
//! Connects to a hub, registers the adapter's interests and feeds every
//! delivered event to the adapter from a background task.

use std::io;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::adapter::EventAdapter;
use super::config::ClientConfig;
use crate::error::{Error, ProtocolError, Result};
use crate::event::Event;
use crate::protocol::{FrameReader, FrameWriter, Message};

/// Background receive loop of a started client
struct Session {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Subscriber to a remote event hub
///
/// # Example
/// ```no_run
/// use event_hub::{ClientConfig, Event, EventAdapter, EventsClient, Interest};
/// use event_hub::error::BoxError;
///
/// struct Printer;
///
/// impl EventAdapter for Printer {
///     fn interested_events(&self) -> Vec<Interest> {
///         vec![Interest::any_chaincode()]
///     }
///
///     async fn on_event(&self, event: Event) -> Result<bool, BoxError> {
///         println!("{:?}", event);
///         Ok(true)
///     }
/// }
///
/// # async fn example() -> event_hub::Result<()> {
/// let mut client = EventsClient::new(ClientConfig::default(), Printer);
/// client.start().await?;
/// // ...
/// client.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct EventsClient<A: EventAdapter> {
    config: ClientConfig,
    adapter: Arc<A>,
    session: Option<Session>,
}

impl<A: EventAdapter> EventsClient<A> {
    /// Create a client; nothing happens until [`start`](Self::start)
    pub fn new(config: ClientConfig, adapter: A) -> Self {
        Self {
            config,
            adapter: Arc::new(adapter),
            session: None,
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the adapter
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    /// Check if the receive loop is still running
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }

    /// Connect, register and start receiving
    ///
    /// Returns once the hub has acknowledged the registration. May be called
    /// again after the previous session ended.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        self.session = None;

        let (reader, writer) = self.register().await?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let adapter = Arc::clone(&self.adapter);
        let task = tokio::spawn(receive_loop(adapter, reader, writer, stop_rx));

        self.session = Some(Session { stop_tx, task });
        Ok(())
    }

    async fn register(
        &self,
    ) -> Result<(FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>)> {
        let addr = self.config.addr;

        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout(self.config.connect_timeout))??;
        if self.config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }

        let (read_half, write_half) = stream.into_split();
        let mut reader = FrameReader::with_max_frame_size(read_half, self.config.max_frame_size);
        let mut writer = FrameWriter::new(write_half);

        let interests = self.adapter.interested_events();
        tracing::debug!(addr = %addr, interests = interests.len(), "Registering with hub");
        writer.write_message(&Message::Register(interests)).await?;

        let reply = tokio::time::timeout(self.config.registration_timeout, reader.read_message())
            .await
            .map_err(|_| Error::Timeout(self.config.registration_timeout))??;

        match reply {
            Some(Message::Registered(interests)) => {
                tracing::info!(addr = %addr, interests = interests.len(), "Registered with hub");
                Ok((reader, writer))
            }
            Some(Message::Rejection(reason)) => {
                tracing::warn!(addr = %addr, reason = %reason, "Registration rejected");
                Err(Error::Rejected(reason))
            }
            Some(other) => Err(ProtocolError::UnexpectedMessage(format!(
                "expected Registered, got {}",
                other.name()
            ))
            .into()),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "hub closed the connection during registration",
            ))),
        }
    }

    /// Unregister and stop receiving
    ///
    /// Sends `Unregister` best-effort, then waits for the receive loop to
    /// finish. If the session had already ended on its own the adapter is
    /// not notified a second time.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Err(Error::NotRunning);
        };

        let _ = session.stop_tx.send(());
        if let Err(e) = session.task.await {
            tracing::error!(error = %e, "Receive loop panicked");
        }

        Ok(())
    }
}

async fn receive_loop<A: EventAdapter>(
    adapter: Arc<A>,
    mut reader: FrameReader<OwnedReadHalf>,
    mut writer: FrameWriter<OwnedWriteHalf>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut received: u64 = 0;

    let failure = loop {
        tokio::select! {
            // Fires on stop() and when the client is dropped
            _ = &mut stop_rx => {
                if let Err(e) = writer.write_message(&Message::Unregister).await {
                    tracing::debug!(error = %e, "Failed to send unregister");
                }
                let _ = writer.shutdown().await;
                break None;
            }
            msg = reader.read_message() => match msg {
                Ok(Some(Message::Event(Event::Unset))) => {
                    break Some(Error::Protocol(ProtocolError::UnsetEvent));
                }
                Ok(Some(Message::Event(event))) => {
                    received += 1;
                    dispatch(&*adapter, event).await;
                }
                Ok(Some(Message::Rejection(reason))) => break Some(Error::Rejected(reason)),
                Ok(Some(other)) => {
                    break Some(Error::Protocol(ProtocolError::UnexpectedMessage(
                        other.name().to_string(),
                    )));
                }
                Ok(None) => {
                    break Some(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "hub closed the connection",
                    )));
                }
                Err(e) => break Some(e),
            },
        }
    };

    match &failure {
        None => tracing::info!(received, "Event stream stopped"),
        Some(e) => tracing::warn!(received, error = %e, "Event stream disconnected"),
    }

    adapter.on_disconnected(failure.as_ref()).await;
}

async fn dispatch<A: EventAdapter>(adapter: &A, event: Event) {
    let event_type = event.event_type();
    match adapter.on_event(event).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(event_type = ?event_type, "Adapter did not handle event"),
        Err(e) => tracing::error!(event_type = ?event_type, error = %e, "Adapter failed on event"),
    }
}
