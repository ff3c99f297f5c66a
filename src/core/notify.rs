use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::core::error::DeliveryError;

pub const LINE_NOTIFY_ENDPOINT: &str = "https://notify-api.line.me/api/notify";

/// Longest chunk that still renders without the client's "read more" fold.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 800;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `message`, returning how many chunks were sent.
    async fn send(&self, message: &str, token: &str) -> Result<usize, DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct NotifierOptions {
    pub endpoint: String,
    pub max_message_length: usize,
    pub timeout: Duration,
}

impl Default for NotifierOptions {
    fn default() -> Self {
        Self {
            endpoint: LINE_NOTIFY_ENDPOINT.to_string(),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Form-encoded bearer-token notifier (LINE Notify wire format).
pub struct LineNotifier {
    client: reqwest::Client,
    endpoint: String,
    max_message_length: usize,
}

impl LineNotifier {
    pub fn new(options: NotifierOptions) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(options.timeout).build()?;
        Ok(Self {
            client,
            endpoint: options.endpoint,
            max_message_length: options.max_message_length,
        })
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn send(&self, message: &str, token: &str) -> Result<usize, DeliveryError> {
        if token.trim().is_empty() {
            return Err(DeliveryError::MissingToken);
        }

        // Chunks already delivered stay delivered if a later one fails.
        let chunks = split_message(message, self.max_message_length);
        for (idx, chunk) in chunks.iter().enumerate() {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(token)
                .form(&[("message", chunk.as_str())])
                .send()
                .await
                .map_err(|source| DeliveryError::Transport { chunk: idx, source })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DeliveryError::Status {
                    chunk: idx,
                    status: status.as_u16(),
                    body,
                });
            }
            debug!("Sent chunk {}/{} ({} chars)", idx + 1, chunks.len(), chunk.chars().count());
        }
        Ok(chunks.len())
    }
}

/// Splits `text` into chunks of at most `max_len` characters.
///
/// A chunk that would overflow is cut at the last whitespace inside the
/// window and that whitespace character is dropped. Without usable
/// whitespace (none, or only at the very start) the window is cut hard.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some((cut, _)) = rest.char_indices().nth(max_len) else {
            chunks.push(rest.to_string());
            break;
        };

        let window = &rest[..cut];
        match window.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
            Some((pos, sep)) if pos > 0 => {
                chunks.push(window[..pos].to_string());
                rest = &rest[pos + sep.len_utf8()..];
            }
            _ => {
                chunks.push(window.to_string());
                rest = &rest[cut..];
            }
        }
    }
    chunks
}
