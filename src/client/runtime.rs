//! Conversation runtime
//!
//! Owns the [`Conversation`], feeds it events one at a time and executes the
//! resulting effects. Each request runs in its own task under a
//! [`CancellationToken`]; the task tags everything it reports with the
//! request's generation so the state machine can drop late arrivals.

use super::state::{Conversation, Snapshot};
use super::transport::ChatTransport;
use super::{transition, Effect, Event};
use crate::wire::{ErrorKind, WireMessage};
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What observers receive from the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// The conversation changed
    Snapshot(Snapshot),
    /// A user event was rejected; the conversation is unchanged
    Warning(String),
}

#[derive(Debug, Error)]
#[error("Conversation runtime has stopped")]
pub struct RuntimeClosed;

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    event_tx: mpsc::Sender<Event>,
}

impl ConversationHandle {
    async fn send(&self, event: Event) -> Result<(), RuntimeClosed> {
        self.event_tx.send(event).await.map_err(|_| RuntimeClosed)
    }

    pub async fn set_input(&self, text: impl Into<String>) -> Result<(), RuntimeClosed> {
        self.send(Event::InputChanged { text: text.into() }).await
    }

    /// Submit `text` as the next user turn
    ///
    /// A rejected submit leaves the conversation, input buffer included,
    /// untouched.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), RuntimeClosed> {
        self.send(Event::Submit {
            text: Some(text.into()),
        })
        .await
    }

    /// Submit whatever is in the input buffer
    pub async fn submit_input(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::Submit { text: None }).await
    }

    pub async fn cancel(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::Cancel).await
    }

    pub async fn clear(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::Clear).await
    }

    pub async fn refresh_health(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::RefreshHealth).await
    }
}

/// Start a conversation runtime on the current tokio runtime
///
/// The runtime stops once every handle is dropped, cancelling any request
/// still in flight.
pub fn spawn_conversation<T>(
    transport: Arc<T>,
) -> (ConversationHandle, mpsc::UnboundedReceiver<Update>)
where
    T: ChatTransport + 'static,
{
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    let runtime = ConversationRuntime {
        conversation: Conversation::new(),
        transport,
        reporter: Reporter(event_tx.downgrade()),
        event_rx,
        update_tx,
        in_flight: None,
    };
    tokio::spawn(runtime.run());

    (ConversationHandle { event_tx }, update_rx)
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

/// Route from spawned tasks back into the runtime
///
/// Holds only a weak sender: once every handle is gone the channel closes,
/// the loop ends and cancels whatever is still in flight.
#[derive(Clone)]
struct Reporter(mpsc::WeakSender<Event>);

impl Reporter {
    /// Deliver `event`; `false` once the runtime has stopped
    async fn report(&self, event: Event) -> bool {
        match self.0.upgrade() {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

pub struct ConversationRuntime<T: ChatTransport + 'static> {
    conversation: Conversation,
    transport: Arc<T>,
    event_rx: mpsc::Receiver<Event>,
    reporter: Reporter,
    update_tx: mpsc::UnboundedSender<Update>,
    in_flight: Option<InFlight>,
}

impl<T: ChatTransport + 'static> ConversationRuntime<T> {
    pub async fn run(mut self) {
        tracing::info!("Starting conversation runtime");

        self.process_event(Event::RefreshHealth);

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        if let Some(in_flight) = self.in_flight.take() {
            tracing::info!(
                generation = in_flight.generation,
                "All handles dropped; cancelling completion stream"
            );
            in_flight.cancel.cancel();
        }
        tracing::info!("Conversation runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let name = event.name();

        let result = match transition(&self.conversation, event) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(event = name, error = %e, "Event rejected");
                let _ = self.update_tx.send(Update::Warning(e.to_string()));
                return;
            }
        };

        let previous = self.conversation.lifecycle().name();
        self.conversation = result.new_state;
        if previous != self.conversation.lifecycle().name() {
            tracing::debug!(
                event = name,
                from = previous,
                to = self.conversation.lifecycle().name(),
                "Lifecycle changed"
            );
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
        self.release_finished_request();
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Notify(snapshot) => {
                let _ = self.update_tx.send(Update::Snapshot(snapshot));
            }

            Effect::OpenStream {
                generation,
                messages,
            } => {
                if let Some(previous) = self.in_flight.take() {
                    previous.cancel.cancel();
                }

                let cancel = CancellationToken::new();
                tracing::info!(
                    generation,
                    messages = messages.len(),
                    "Opening completion stream"
                );
                tokio::spawn(drive_stream(
                    self.transport.clone(),
                    messages,
                    generation,
                    cancel.clone(),
                    self.reporter.clone(),
                ));
                self.in_flight = Some(InFlight { generation, cancel });
            }

            Effect::AbortStream { generation } => {
                if let Some(in_flight) = self.in_flight.take_if(|f| f.generation == generation) {
                    tracing::info!(generation, "Cancelling completion stream");
                    in_flight.cancel.cancel();
                }
            }

            Effect::CheckHealth => {
                tokio::spawn(fetch_health(self.transport.clone(), self.reporter.clone()));
            }
        }
    }

    /// Drop the token of a request the conversation no longer waits for
    fn release_finished_request(&mut self) {
        let active = self.conversation.lifecycle().in_flight_generation();
        if let Some(in_flight) = self.in_flight.take_if(|f| Some(f.generation) != active) {
            in_flight.cancel.cancel();
        }
    }
}

async fn drive_stream<T: ChatTransport>(
    transport: Arc<T>,
    messages: Vec<WireMessage>,
    generation: u64,
    cancel: CancellationToken,
    reporter: Reporter,
) {
    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!(generation, "Cancelled before the stream opened");
            return;
        }
        opened = transport.open(&messages) => opened,
    };

    let mut chunks = match opened {
        Ok(chunks) => chunks,
        Err(e) => {
            tracing::warn!(
                generation,
                kind = %e.kind,
                error = %e.message,
                "Chat request failed"
            );
            reporter
                .report(Event::StreamFailed {
                    generation,
                    kind: e.kind,
                    message: e.message,
                })
                .await;
            return;
        }
    };

    if !reporter.report(Event::StreamOpened { generation }).await {
        return;
    }

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(generation, "Stream cancelled; closing connection");
                return;
            }
            next = chunks.next() => next,
        };

        let event = match next {
            Some(Ok(chunk)) => {
                let terminal = chunk.is_terminal();
                if !reporter.report(Event::Chunk { generation, chunk }).await || terminal {
                    return;
                }
                continue;
            }
            Some(Err(e)) => Event::StreamFailed {
                generation,
                kind: e.kind,
                message: e.message,
            },
            None => Event::StreamFailed {
                generation,
                kind: ErrorKind::UpstreamUnavailable,
                message: "Response ended before completion".to_string(),
            },
        };

        reporter.report(event).await;
        return;
    }
}

async fn fetch_health<T: ChatTransport>(transport: Arc<T>, reporter: Reporter) {
    let configured = match transport.check_health().await {
        Ok(health) => health.api_key_configured,
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            false
        }
    };
    reporter.report(Event::HealthChecked { configured }).await;
}
