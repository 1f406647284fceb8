//! Upstream adapter for the school-register bulletin board.
//!
//! Implements the core `BulletinSource` port over the web endpoints:
//! a form-encoded login that answers with a cookie token pair, a
//! form-encoded bulletin query keyed by a new-vs-all flag, and a
//! query-string attachment download. Each operation carries its own
//! timeout so a stalled call degrades to an error instead of hanging
//! the loop.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::Value;
use tracing::{debug, info, warn};

use bwatch_core::{
    domain::{AttachmentRef, Bulletin, Scope, Session},
    source::BulletinSource,
    Error, Result,
};

mod payload;

pub use payload::Payload;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36";

pub struct ClassevivaClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl ClassevivaClient {
    pub fn new(base_url: String, username: String, password: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    fn cookie_header(session: &Session) -> String {
        format!(
            "PHPSESSID={}; webidentity={}",
            session.session_id, session.identity
        )
    }
}

/// The login endpoint reports failures in-band, even on HTTP 200.
fn error_field(body: &Value) -> Option<String> {
    match body.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v.to_string()),
    }
}

#[async_trait]
impl BulletinSource for ClassevivaClient {
    async fn login(&self) -> Result<Session> {
        let url = format!("{}/auth-p7/app/default/AuthApi4.php?a=aLoginPwd", self.base_url);
        let form = [
            ("uid", self.username.as_str()),
            ("pwd", self.password.as_str()),
            ("cid", ""),
            ("pin", ""),
            ("target", ""),
        ];

        let resp = self
            .http
            .post(&url)
            .form(&form)
            .timeout(LOGIN_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("login request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Auth(format!("login returned {status}")));
        }

        let mut session_id = None;
        let mut identity = None;
        for value in resp.headers().get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some((name, rest)) = raw.split_once('=') else { continue };
            let token = rest.split(';').next().unwrap_or("").to_string();
            match name.trim() {
                "PHPSESSID" => session_id = Some(token),
                "webidentity" => identity = Some(token),
                _ => {}
            }
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("login response was not json: {e}")))?;
        if let Some(err) = error_field(&body) {
            return Err(Error::Auth(format!("upstream rejected login: {err}")));
        }

        match (session_id, identity) {
            (Some(session_id), Some(identity)) => {
                debug!("login ok");
                Ok(Session {
                    session_id,
                    identity,
                })
            }
            _ => Err(Error::Auth("login response missing session cookies".to_string())),
        }
    }

    async fn fetch(&self, session: &Session, scope: Scope) -> Result<Vec<Bulletin>> {
        let url = format!("{}/sif/app/default/bacheca_personale.php", self.base_url);
        let ncna = match scope {
            Scope::All => "0",
            Scope::New => "1",
        };
        let form = [
            ("action", "get_comunicazioni"),
            ("cerca", ""),
            ("ncna", ncna),
            ("tipo_com", ""),
        ];

        let resp = self
            .http
            .post(&url)
            .header(COOKIE, Self::cookie_header(session))
            .form(&form)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("bulletin query failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("bulletin query returned {status}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("bulletin payload was not json: {e}")))?;

        match payload::parse(&body) {
            Payload::Recognized(bulletins) => {
                let unread = bulletins.iter().filter(|b| !b.read).count();
                if unread > 0 {
                    info!(unread, total = bulletins.len(), "unread bulletins in batch");
                }
                Ok(bulletins)
            }
            Payload::Unrecognized => {
                warn!("unrecognized bulletin payload shape, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn download(&self, session: &Session, attachment: &AttachmentRef) -> Result<Vec<u8>> {
        let url = format!(
            "{}/sif/app/default/bacheca_personale.php?action=download&id={}",
            self.base_url, attachment.id
        );

        let resp = self
            .http
            .get(&url)
            .header(COOKIE, Self::cookie_header(session))
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Download {
                id: attachment.id.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Download {
                id: attachment.id.clone(),
                reason: format!("status {status}"),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| Error::Download {
            id: attachment.id.clone(),
            reason: e.to_string(),
        })?;

        debug!(filename = %attachment.filename, size = bytes.len(), "attachment downloaded");
        Ok(bytes.to_vec())
    }
}
