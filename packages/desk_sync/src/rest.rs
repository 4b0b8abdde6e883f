//! REST collaborators — open-conversations and history fetches.
//!
//! `TicketBackend` is the seam the catch-up service and history loader sit
//! behind; `RestBackend` is the production implementation. Both endpoints
//! are credential-scoped: the session token from config rides along as a
//! bearer header. A non-success status is an ordinary `Fetch` error — the
//! caller treats it as "no data".

use std::future::Future;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::protocol::{ChatMessage, OpenTicket};

pub trait TicketBackend: Send + Sync + 'static {
    /// Ordered list of conversations with unresolved activity.
    fn fetch_open_tickets(
        &self,
    ) -> impl Future<Output = Result<Vec<OpenTicket>, SyncError>> + Send;

    /// Full ordered message history of one conversation.
    fn fetch_history(
        &self,
        chat_id: String,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, SyncError>> + Send;
}

pub struct RestBackend {
    client: reqwest::Client,
    config: SyncConfig,
}

impl RestBackend {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SyncError::Fetch(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, SyncError> {
        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.session_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Fetch(format!("{url}: {e}")))?;
        if !response.status().is_success() {
            return Err(SyncError::Fetch(format!(
                "{url}: status {}",
                response.status()
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::Fetch(format!("{url}: {e}")))
    }
}

impl TicketBackend for RestBackend {
    fn fetch_open_tickets(
        &self,
    ) -> impl Future<Output = Result<Vec<OpenTicket>, SyncError>> + Send {
        self.get_json(self.config.open_tickets_url())
    }

    fn fetch_history(
        &self,
        chat_id: String,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, SyncError>> + Send {
        self.get_json(self.config.history_url(&chat_id))
    }
}
