/// Core error type for the bulletin monitor.
///
/// Adapter crates map their transport-specific failures into this type so
/// the loop can decide cycle continuation from the error kind alone
/// (no panics, no blanket exception suppression).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// Login failure: network error, non-2xx status, or an explicit error
    /// field in the upstream response body.
    #[error("auth error: {0}")]
    Auth(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("download error for attachment {id}: {reason}")]
    Download { id: String, reason: String },

    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("state error: {0}")]
    State(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
