use async_trait::async_trait;

use crate::{
    domain::{AttachmentRef, Bulletin, Scope, Session},
    Result,
};

/// Upstream bulletin service port.
///
/// The web adapter is the first implementation; monitor tests drive the
/// loop through hand-rolled fakes behind the same trait.
#[async_trait]
pub trait BulletinSource: Send + Sync {
    /// Acquire a fresh credential pair.
    ///
    /// Called before every fetch. Server-side expiry is never tracked;
    /// re-authenticating each cycle is simpler and cheaper.
    async fn login(&self) -> Result<Session>;

    /// Retrieve the current (`Scope::All`) or incremental (`Scope::New`)
    /// batch of bulletins, in server-defined order.
    async fn fetch(&self, session: &Session, scope: Scope) -> Result<Vec<Bulletin>>;

    /// Download one attachment's raw bytes.
    async fn download(&self, session: &Session, attachment: &AttachmentRef) -> Result<Vec<u8>>;
}
