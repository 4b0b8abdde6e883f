//! In-memory fakes for the transport and REST seams, shared by the
//! dispatcher and engine tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::connection::{ConnState, FrameSink};
use crate::error::{SyncError, TransportError};
use crate::protocol::{ChatMessage, ClientFrame, OpenTicket};
use crate::rest::TicketBackend;

/// Frame sink that records what would have gone over the wire.
pub struct FakeSink {
    state: Mutex<ConnState>,
    sent: Mutex<Vec<ClientFrame>>,
}

impl FakeSink {
    pub fn new(state: ConnState) -> Self {
        Self {
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_state(&self, state: ConnState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn sent(&self) -> Vec<ClientFrame> {
        self.sent.lock().unwrap().clone()
    }
}

impl FrameSink for FakeSink {
    fn state(&self) -> ConnState {
        *self.state.lock().unwrap()
    }

    fn publish(&self, frame: ClientFrame) -> Result<(), SyncError> {
        if self.state() != ConnState::Connected {
            return Err(SyncError::Transport(TransportError::NotConnected));
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }
}

/// Ticket backend serving canned data, with call counters.
#[derive(Default)]
pub struct FakeBackend {
    pub tickets: Mutex<Vec<OpenTicket>>,
    pub histories: Mutex<HashMap<String, Vec<ChatMessage>>>,
    pub fail_tickets: AtomicBool,
    pub fail_history: AtomicBool,
    pub ticket_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn with_tickets(tickets: Vec<OpenTicket>) -> Self {
        Self {
            tickets: Mutex::new(tickets),
            ..Default::default()
        }
    }

    pub fn put_history(&self, chat_id: &str, messages: Vec<ChatMessage>) {
        self.histories
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), messages);
    }
}

impl TicketBackend for FakeBackend {
    fn fetch_open_tickets(
        &self,
    ) -> impl Future<Output = Result<Vec<OpenTicket>, SyncError>> + Send {
        async move {
            self.ticket_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_tickets.load(Ordering::SeqCst) {
                return Err(SyncError::Fetch("status 500".into()));
            }
            Ok(self.tickets.lock().unwrap().clone())
        }
    }

    fn fetch_history(
        &self,
        chat_id: String,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, SyncError>> + Send {
        async move {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_history.load(Ordering::SeqCst) {
                return Err(SyncError::Fetch("status 500".into()));
            }
            Ok(self
                .histories
                .lock()
                .unwrap()
                .get(&chat_id)
                .cloned()
                .unwrap_or_default())
        }
    }
}
