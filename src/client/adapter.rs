//! Subscriber callbacks

use std::future::Future;

use crate::error::{BoxError, Error};
use crate::event::{Event, Interest};

/// Capability the application implements to consume events
///
/// One adapter serves one [`EventsClient`](super::EventsClient). Calls to
/// `on_event` are sequential and follow the hub's delivery order.
///
/// # Example
///
/// ```no_run
/// use event_hub::{Event, EventAdapter, Interest};
/// use event_hub::error::BoxError;
///
/// struct BlockPrinter;
///
/// impl EventAdapter for BlockPrinter {
///     fn interested_events(&self) -> Vec<Interest> {
///         vec![Interest::block()]
///     }
///
///     async fn on_event(&self, event: Event) -> Result<bool, BoxError> {
///         println!("{:?}", event);
///         Ok(true)
///     }
/// }
/// ```
pub trait EventAdapter: Send + Sync + 'static {
    /// Interests sent with the registration
    fn interested_events(&self) -> Vec<Interest>;

    /// Handle one delivered event
    ///
    /// `Ok(false)` and `Err` are logged; the session keeps receiving.
    fn on_event(&self, event: Event) -> impl Future<Output = Result<bool, BoxError>> + Send;

    /// Called once when the session ends
    ///
    /// `None` means the application stopped the client. No reconnect is
    /// attempted either way.
    fn on_disconnected(&self, err: Option<&Error>) -> impl Future<Output = ()> + Send {
        let _ = err;
        async {}
    }
}
