use async_trait::async_trait;

use crate::{domain::AttachmentPayload, Result};

/// Downstream notification port.
///
/// Telegram is the first implementation; the three primitives map onto its
/// text, document and media-group send operations. Every call is a single
/// best-effort attempt with a bounded timeout — no retry, no backoff.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;

    async fn send_document(&self, doc: &AttachmentPayload, caption: &str) -> Result<()>;

    /// Send several documents as one group. The group operation has a
    /// single caption slot across the whole group, so callers that need a
    /// message to survive send it separately via `send_text`.
    async fn send_document_group(&self, docs: &[AttachmentPayload]) -> Result<()>;
}

/// Deliver one composed message plus its attachments.
///
/// Shape is keyed on attachment count: 0 → one text send; 1 → one document
/// send with the message as caption; 2+ → the message as a text send,
/// immediately followed by a captionless group send.
///
/// In the 2+ case a text failure does not cancel the group send; the first
/// error is still reported to the caller for logging.
pub async fn dispatch(
    notifier: &dyn Notifier,
    message: &str,
    docs: &[AttachmentPayload],
) -> Result<()> {
    match docs {
        [] => notifier.send_text(message).await,
        [doc] => notifier.send_document(doc, message).await,
        _ => {
            let text_result = notifier.send_text(message).await;
            notifier.send_document_group(docs).await?;
            text_result
        }
    }
}
