use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::models::User;

pub const CONFIRMATION_SUBJECT: &str = "Registration confirmation code";

/// MailMessage
///
/// A plain-text message addressed to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// confirmation_message
///
/// Builds the mail that carries a freshly generated confirmation code.
pub fn confirmation_message(user: &User, code: &str) -> MailMessage {
    MailMessage {
        to: user.email.clone(),
        subject: CONFIRMATION_SUBJECT.to_string(),
        body: format!(
            "Hello {},\n\nYour confirmation code is: {}\n\nExchange it for an access token at POST /v1/auth/token.",
            user.username, code
        ),
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay answered with status {0}")]
    Rejected(u16),
    #[error("mail delivery failed: {0}")]
    Other(String),
}

// 1. MailService Contract
/// MailService
///
/// Outbound mail. Handlers only see this trait, so the HTTP relay used in
/// production can be replaced by the console or mock sender.
#[async_trait]
pub trait MailService: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

// 2. The Real Implementation (HTTP relay)
#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// HttpMailRelay
///
/// POSTs each message as JSON to a transactional mail API. The API key, when
/// configured, is sent as a bearer token.
#[derive(Clone)]
pub struct HttpMailRelay {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailRelay {
    pub fn new(endpoint: &str, api_key: Option<&str>, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.map(str::to_string),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl MailService for HttpMailRelay {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }

        tracing::info!(to = %message.to, subject = %message.subject, "Mail handed to relay");
        Ok(())
    }
}

// 3. Local development sender
/// ConsoleMailer
///
/// Writes messages to the log instead of delivering them. Used in `Env::Local`
/// when no relay is configured.
#[derive(Clone, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl MailService for ConsoleMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Mail (console backend)"
        );
        Ok(())
    }
}

// 4. The Mock Implementation (For Tests)
/// MockMailer
///
/// Keeps every sent message in `outbox` so tests can read confirmation codes back.
#[derive(Clone, Default)]
pub struct MockMailer {
    /// When true, every send fails.
    pub should_fail: bool,
    pub outbox: Arc<Mutex<Vec<MailMessage>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    /// Most recent message sent to `to`.
    pub fn last_to(&self, to: &str) -> Option<MailMessage> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl MailService for MockMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.should_fail {
            return Err(MailError::Other("Mock Mail Error: Simulation requested".to_string()));
        }
        self.outbox
            .lock()
            .map_err(|_| MailError::Other("outbox lock poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

/// MailState
///
/// The concrete type used to share the mail service across the application state.
pub type MailState = Arc<dyn MailService>;
