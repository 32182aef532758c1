use crate::core::errors::ExchangeError;
use crate::core::types::DataEvent;
use futures_util::stream::{self, BoxStream};
use tokio::sync::{mpsc, watch};

/// Consumer-facing stream of data events
pub type EventStream = BoxStream<'static, Result<DataEvent, ExchangeError>>;

/// Why a session stopped delivering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Closed,
    Fatal { attempts: u32 },
}

/// Unbounded FIFO hand-off from the receive loop to the consumer
#[derive(Debug)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<DataEvent>,
}

impl DeliveryQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DataEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the consumer side is gone
    pub fn push(&self, event: DataEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

enum Next {
    Event(Option<DataEvent>),
    Stop(Option<Shutdown>),
}

struct ListenState {
    rx: mpsc::UnboundedReceiver<DataEvent>,
    shutdown: watch::Receiver<Option<Shutdown>>,
    done: bool,
}

/// Build the `listen()` stream
///
/// Queued events are drained before a shutdown is honored. A fatal shutdown
/// yields one final error item; a plain close just ends the stream.
pub fn event_stream(
    rx: mpsc::UnboundedReceiver<DataEvent>,
    shutdown: watch::Receiver<Option<Shutdown>>,
) -> EventStream {
    let state = ListenState {
        rx,
        shutdown,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        let next = tokio::select! {
            biased;
            event = state.rx.recv() => Next::Event(event),
            reason = state.shutdown.wait_for(Option::is_some) => {
                Next::Stop(reason.ok().and_then(|r| *r))
            }
        };

        match next {
            Next::Event(Some(event)) => Some((Ok(event), state)),
            Next::Stop(Some(Shutdown::Fatal { attempts })) => {
                state.done = true;
                Some((Err(ExchangeError::FatalReconnectError { attempts }), state))
            }
            Next::Event(None) | Next::Stop(_) => None,
        }
    }))
}
