/// Opaque upstream credential pair (two cookie-style tokens).
///
/// Lives for exactly one polling cycle; the loop re-acquires it
/// unconditionally before every fetch and never persists it.
#[derive(Clone, Debug)]
pub struct Session {
    pub session_id: String,
    pub identity: String,
}

/// Fetch mode: the full backlog (first run only) vs. unseen items.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    New,
}

/// One bulletin record as normalized from the upstream payload.
///
/// Immutable after creation; discarded after one cycle's processing.
/// `attachments` carries the structured descriptor list when the upstream
/// record had one; body-embedded links are resolved separately.
#[derive(Clone, Debug)]
pub struct Bulletin {
    pub id: String,
    pub title: String,
    pub date: String,
    pub body: String,
    pub read: bool,
    pub attachments: Vec<AttachmentRef>,
}

/// A downloadable attachment reference: identifier + suggested filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentRef {
    pub id: String,
    pub filename: String,
}

/// Downloaded attachment bytes, ready for dispatch.
#[derive(Clone, Debug)]
pub struct AttachmentPayload {
    pub filename: String,
    pub bytes: Vec<u8>,
}
