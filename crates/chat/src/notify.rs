use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sofra_core::config::WhatsAppConfig;
use sofra_core::CustomerId;
use thiserror::Error;

use crate::outbound::OutboundMessage;

/// Characters of a transport error body kept in error messages.
const ERROR_SNIPPET_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification gateway configuration: {0}")]
    Config(String),
    #[error("chat transport failure: {0}")]
    Request(String),
    #[error("chat transport returned {status}: {detail}")]
    Delivery { status: u16, detail: String },
}

/// Outbound delivery contract. The router and checkout pipeline go through
/// this for every customer reply and operator push.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(
        &self,
        customer: &CustomerId,
        message: OutboundMessage,
    ) -> Result<(), NotifyError>;

    /// Plain-text push to a restaurant or operator channel.
    async fn push_operator(&self, channel: &str, text: &str) -> Result<(), NotifyError>;
}

/// Sender against the Graph-style messages endpoint
/// (`POST {base}/{phone_number_id}/messages`).
pub struct CloudApiGateway {
    http: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    access_token: SecretString,
}

impl CloudApiGateway {
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, NotifyError> {
        if config.phone_number_id.trim().is_empty() {
            return Err(NotifyError::Config("whatsapp.phone_number_id is required".to_string()));
        }
        if config.access_token.expose_secret().trim().is_empty() {
            return Err(NotifyError::Config("whatsapp.access_token is required".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .map_err(|err| NotifyError::Config(format!("http client build failed: {err}")))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            phone_number_id: config.phone_number_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    async fn deliver(&self, to: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&message.payload(to))
            .send()
            .await
            .map_err(|err| NotifyError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Delivery { status: status.as_u16(), detail: snippet(&body) });
        }

        tracing::debug!(to, "chat message delivered");
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for CloudApiGateway {
    async fn send(
        &self,
        customer: &CustomerId,
        message: OutboundMessage,
    ) -> Result<(), NotifyError> {
        self.deliver(customer.as_str(), &message).await
    }

    async fn push_operator(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        self.deliver(channel, &OutboundMessage::text(text)).await
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SentMessage {
    pub customer_id: CustomerId,
    pub message: OutboundMessage,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperatorPush {
    pub channel: String,
    pub text: String,
}

/// Records every delivery instead of sending it. Failures can be queued to
/// exercise degrade paths. The double the engine tests drive conversations
/// against.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
    pushes: Mutex<Vec<OperatorPush>>,
    send_failures: Mutex<VecDeque<NotifyError>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_send(&self, error: NotifyError) {
        self.send_failures.lock().unwrap_or_else(PoisonError::into_inner).push_back(error);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn operator_pushes(&self) -> Vec<OperatorPush> {
        self.pushes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Body texts of everything sent, in order. Handy for asserting
    /// conversation flows.
    pub fn bodies(&self) -> Vec<String> {
        self.sent().into_iter().map(|sent| sent.message.body().to_string()).collect()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(
        &self,
        customer: &CustomerId,
        message: OutboundMessage,
    ) -> Result<(), NotifyError> {
        let failure =
            self.send_failures.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage { customer_id: customer.clone(), message });
        Ok(())
    }

    async fn push_operator(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        self.pushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(OperatorPush { channel: channel.to_string(), text: text.to_string() });
        Ok(())
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(ERROR_SNIPPET_CHARS).collect()
}
