//! Telegram adapter (teloxide).
//!
//! Implements the core `Notifier` port over the Bot API: plain text,
//! single document, and document group sends, all in HTML parse mode
//! against one static chat. Every call is a single best-effort attempt;
//! the only retry is honoring a flood-control `RetryAfter` once.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, InputMedia, InputMediaDocument, ParseMode},
};

use tokio::time::sleep;

use bwatch_core::{domain::AttachmentPayload, notify::Notifier, Error, Result};

/// Upper bound on one Bot API call, group uploads included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: teloxide::types::ChatId,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: i64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("telegram http client: {e}")))?;

        Ok(Self {
            bot: Bot::with_client(token, client),
            chat_id: teloxide::types::ChatId(chat_id),
        })
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Dispatch(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    fn document(doc: &AttachmentPayload) -> InputFile {
        InputFile::memory(doc.bytes.clone()).file_name(doc.filename.clone())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(self.chat_id, text.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }

    async fn send_document(&self, doc: &AttachmentPayload, caption: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_document(self.chat_id, Self::document(doc))
                .caption(caption.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }

    async fn send_document_group(&self, docs: &[AttachmentPayload]) -> Result<()> {
        let media: Vec<InputMedia> = docs
            .iter()
            .map(|d| InputMedia::Document(InputMediaDocument::new(Self::document(d))))
            .collect();

        self.with_retry(|| self.bot.send_media_group(self.chat_id, media.clone()))
            .await?;
        Ok(())
    }
}
