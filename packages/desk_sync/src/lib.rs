//! Chat synchronization engine for a live-support operator console.
//!
//! Keeps an operator's view of all active support conversations convergent
//! with the server over an unreliable multiplexed realtime connection.
//! Live traffic arrives as frames over a websocket; missed windows are
//! closed by a REST catch-up on every (re)connect; per-conversation history
//! is loaded lazily on first selection.
//!
//! The moving parts:
//! - [`connection::ConnectionManager`] owns the websocket and reconnects
//!   forever on a fixed delay.
//! - [`engine::SyncEngine`] is the single-owner event loop; all state
//!   transitions happen there, one event at a time.
//! - [`store::ChatStore`] is the master state, [`registry::TopicRegistry`]
//!   the subscription table, [`projector`] the derived read-only views.
//! - [`catch_up`] and [`history::HistoryLoader`] reconcile missed data;
//!   [`dispatcher::Dispatcher`] sends operator messages out.

pub mod catch_up;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod history;
pub mod projector;
pub mod protocol;
pub mod registry;
pub mod rest;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::{DataDir, FileConfig, SyncConfig, load_config};
pub use connection::{ConnState, ConnectionHandle, ConnectionManager, FrameSink};
pub use engine::{Command, EngineHandle, Event, SyncEngine};
pub use error::{SyncError, TransportError};
pub use rest::{RestBackend, TicketBackend};
