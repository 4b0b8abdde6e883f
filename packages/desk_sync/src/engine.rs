//! SyncEngine — the cooperative event loop.
//!
//! One task owns the master store, the topic registry, the selection and
//! the dispatcher; everything reaches them through a single event queue, so
//! every state transition is a discrete, non-preemptive step and no two
//! handlers ever race on the store. Network completions (catch-up, history)
//! are spawned off the loop and come back as events tagged with the
//! connection epoch they started under; stale completions are dropped.
//!
//! After every event the engine republishes its derived views — the
//! projected transcript and the conversation list — through watch channels.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catch_up;
use crate::connection::FrameSink;
use crate::dispatcher::Dispatcher;
use crate::error::SyncError;
use crate::history::HistoryLoader;
use crate::projector::{self, ChatListEntry};
use crate::protocol::{
    ChatMessage, ClientFrame, NEW_CHATS_TOPIC, NewChatNotice, OpenTicket, chat_id_from_topic,
    chat_topic,
};
use crate::registry::TopicRegistry;
use crate::rest::TicketBackend;
use crate::store::ChatStore;

/// Everything the engine reacts to: network events from the connection
/// task, completions of spawned fetches, and operator commands.
#[derive(Debug)]
pub enum Event {
    Connected {
        epoch: u64,
    },
    Disconnected,
    Frame {
        topic: String,
        body: serde_json::Value,
    },
    CatchUpDone {
        epoch: u64,
        result: Result<Vec<OpenTicket>, SyncError>,
    },
    HistoryLoaded {
        epoch: u64,
        chat_id: String,
        result: Result<Vec<ChatMessage>, SyncError>,
    },
    Command(Command),
}

/// Operator actions.
#[derive(Debug)]
pub enum Command {
    /// Open a conversation (or close the view with `None`). Marks it read
    /// and triggers the lazy history load.
    Select(Option<String>),
    /// Replace the input buffer.
    SetInput(String),
    /// Send the input buffer to the selected conversation.
    SendInput,
    Shutdown,
}

/// Cloneable front door: commands in, derived views out.
#[derive(Clone)]
pub struct EngineHandle {
    events: mpsc::Sender<Event>,
    projection_rx: watch::Receiver<Vec<ChatMessage>>,
    chat_list_rx: watch::Receiver<Vec<ChatListEntry>>,
}

impl EngineHandle {
    pub async fn select(&self, chat_id: Option<String>) {
        let _ = self.events.send(Event::Command(Command::Select(chat_id))).await;
    }

    pub async fn set_input(&self, input: String) {
        let _ = self
            .events
            .send(Event::Command(Command::SetInput(input)))
            .await;
    }

    pub async fn send_input(&self) {
        let _ = self.events.send(Event::Command(Command::SendInput)).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.events.send(Event::Command(Command::Shutdown)).await;
    }

    /// The selected conversation's transcript, recomputed reactively.
    pub fn projection(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.projection_rx.clone()
    }

    /// The conversation list with unread flags.
    pub fn chat_list(&self) -> watch::Receiver<Vec<ChatListEntry>> {
        self.chat_list_rx.clone()
    }
}

pub struct SyncEngine<S, B> {
    store: ChatStore,
    registry: TopicRegistry,
    selected: Option<String>,
    dispatcher: Dispatcher,
    history: HistoryLoader,
    sink: S,
    backend: Arc<B>,
    /// Handed to spawned fetch tasks so completions re-enter the loop.
    events_tx: mpsc::Sender<Event>,
    projection_tx: watch::Sender<Vec<ChatMessage>>,
    chat_list_tx: watch::Sender<Vec<ChatListEntry>>,
    epoch: u64,
    cancel: CancellationToken,
}

impl<S, B> SyncEngine<S, B>
where
    S: FrameSink + 'static,
    B: TicketBackend,
{
    pub fn new(
        sink: S,
        backend: Arc<B>,
        operator_identity: impl Into<String>,
        events_tx: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> (Self, EngineHandle) {
        let (projection_tx, projection_rx) = watch::channel(Vec::new());
        let (chat_list_tx, chat_list_rx) = watch::channel(Vec::new());

        let handle = EngineHandle {
            events: events_tx.clone(),
            projection_rx,
            chat_list_rx,
        };
        let engine = Self {
            store: ChatStore::new(),
            registry: TopicRegistry::new(),
            selected: None,
            dispatcher: Dispatcher::new(operator_identity.into()),
            history: HistoryLoader::new(),
            sink,
            backend,
            events_tx,
            projection_tx,
            chat_list_tx,
            epoch: 0,
            cancel,
        };
        (engine, handle)
    }

    /// Consume events until shutdown. The receiver is the queue every
    /// producer (connection task, spawned fetches, handle) feeds.
    pub async fn run(mut self, mut events_rx: mpsc::Receiver<Event>) {
        while let Some(event) = events_rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
            self.reproject();
        }
        debug!("engine stopped");
    }

    /// One cooperative step. Returns false on shutdown.
    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Connected { epoch } => {
                self.epoch = epoch;
                // The broadcast topic first, then every per-chat topic we
                // were following before the drop.
                self.publish(ClientFrame::Subscribe {
                    topic: NEW_CHATS_TOPIC.to_string(),
                });
                let topics: Vec<String> =
                    self.registry.chat_ids().map(chat_topic).collect();
                for topic in topics {
                    self.publish(ClientFrame::Subscribe { topic });
                }
                self.spawn_catch_up();
            }
            Event::Disconnected => {
                // Observable through the connection's state watch; the
                // registry is kept so the next connect can re-subscribe.
                debug!("engine saw disconnect");
            }
            Event::Frame { topic, body } => self.route_frame(&topic, body),
            Event::CatchUpDone { epoch, result } => {
                if epoch != self.epoch {
                    debug!(epoch, current = self.epoch, "stale catch-up dropped");
                    return true;
                }
                match result {
                    Ok(tickets) => {
                        let frames = catch_up::apply(
                            &mut self.store,
                            &mut self.registry,
                            tickets,
                            self.selected.as_deref(),
                            self.dispatcher.identity(),
                        );
                        for frame in frames {
                            self.publish(frame);
                        }
                    }
                    Err(error) => catch_up::log_failure(&error),
                }
            }
            Event::HistoryLoaded {
                epoch,
                chat_id,
                result,
            } => {
                if epoch != self.epoch {
                    debug!(chat_id, "stale history result dropped");
                    self.history.abandon(&chat_id);
                    return true;
                }
                self.history.complete(&mut self.store, &chat_id, result);
            }
            Event::Command(command) => return self.handle_command(command),
        }
        true
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Select(selection) => {
                self.selected = selection;
                if let Some(chat_id) = self.selected.clone() {
                    self.store.mark_read(&chat_id);
                    if self.history.should_fetch(&self.store, &chat_id) {
                        self.history.begin(&chat_id);
                        self.spawn_history_fetch(chat_id);
                    }
                }
            }
            Command::SetInput(input) => self.dispatcher.set_input(input),
            Command::SendInput => {
                self.dispatcher.send(self.selected.as_deref(), &self.sink);
            }
            Command::Shutdown => {
                // Best-effort unsubscribe; the server also cleans up on close.
                let chat_ids: Vec<String> =
                    self.registry.chat_ids().map(str::to_string).collect();
                for chat_id in chat_ids {
                    self.registry.forget(&chat_id);
                    let _ = self.sink.publish(ClientFrame::Unsubscribe {
                        topic: chat_topic(&chat_id),
                    });
                }
                let _ = self.sink.publish(ClientFrame::Unsubscribe {
                    topic: NEW_CHATS_TOPIC.to_string(),
                });
                self.cancel.cancel();
                return false;
            }
        }
        true
    }

    /// Route an inbound frame by topic. Malformed bodies are dropped with a
    /// warning; the loop carries on.
    fn route_frame(&mut self, topic: &str, body: serde_json::Value) {
        if topic == NEW_CHATS_TOPIC {
            match serde_json::from_value::<NewChatNotice>(body) {
                Ok(notice) => self.handle_new_chat(notice),
                Err(e) => warn!(topic, error = %e, "malformed new-chat notice dropped"),
            }
        } else if let Some(chat_id) = chat_id_from_topic(topic) {
            if !self.registry.is_subscribed(chat_id) {
                debug!(chat_id, "message on unregistered topic");
            }
            match serde_json::from_value::<ChatMessage>(body) {
                Ok(message) => {
                    self.store.append(
                        message,
                        self.selected.as_deref(),
                        self.dispatcher.identity(),
                    );
                }
                Err(e) => warn!(topic, error = %e, "malformed chat message dropped"),
            }
        } else {
            warn!(topic, "frame on unknown topic dropped");
        }
    }

    /// A party opened a fresh conversation: stub it, flush any messages
    /// that raced ahead, subscribe to its stream.
    fn handle_new_chat(&mut self, notice: NewChatNotice) {
        self.store.upsert_stub(
            &notice.chat_id,
            &notice.participant_label,
            &notice.summary,
        );
        for early in self.store.take_pending(&notice.chat_id) {
            self.store.append(
                early,
                self.selected.as_deref(),
                self.dispatcher.identity(),
            );
        }
        let (_handle, created) = self.registry.ensure_subscribed(&notice.chat_id);
        if created {
            self.publish(ClientFrame::Subscribe {
                topic: chat_topic(&notice.chat_id),
            });
        }
    }

    fn spawn_catch_up(&self) {
        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = catch_up::fetch_open(&*backend).await;
            let _ = events.send(Event::CatchUpDone { epoch, result }).await;
        });
    }

    fn spawn_history_fetch(&self, chat_id: String) {
        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = backend.fetch_history(chat_id.clone()).await;
            let _ = events
                .send(Event::HistoryLoaded {
                    epoch,
                    chat_id,
                    result,
                })
                .await;
        });
    }

    fn publish(&self, frame: ClientFrame) {
        if let Err(e) = self.sink.publish(frame) {
            warn!(error = %e, "frame not published");
        }
    }

    /// Republish the derived views when they changed.
    fn reproject(&self) {
        let next = projector::project(&self.store, self.selected.as_deref());
        self.projection_tx.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });

        let next = projector::chat_list(&self.store);
        self.chat_list_tx.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }
}
