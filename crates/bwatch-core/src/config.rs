use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the monitor.
///
/// Everything is read once at startup and handed to constructors; there
/// are no ambient globals. Missing required variables fail construction —
/// the only fatal error in the process.
#[derive(Clone, Debug)]
pub struct Config {
    // Upstream service
    pub classeviva_user: String,
    pub classeviva_pass: String,
    pub classeviva_base_url: String,

    // Downstream channel
    pub telegram_bot_token: String,
    pub telegram_chat_id: i64,

    // Loop
    pub check_interval: Duration,
    pub state_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let classeviva_user = require("CLASSEVIVA_USER")?;
        let classeviva_pass = require("CLASSEVIVA_PASS")?;
        let telegram_bot_token = require("TELEGRAM_BOT_TOKEN")?;
        let telegram_chat_id = require("TELEGRAM_CHAT_ID")?
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::Config("TELEGRAM_CHAT_ID must be a numeric chat id".to_string()))?;

        let classeviva_base_url = env_str("CLASSEVIVA_BASE_URL")
            .unwrap_or_else(|| "https://web.spaggiari.eu".to_string());
        let check_interval = Duration::from_secs(env_u64("CHECK_INTERVAL_SECS").unwrap_or(60));
        let state_file = env_path("STATE_FILE").unwrap_or_else(|| PathBuf::from("state.json"));

        Ok(Self {
            classeviva_user,
            classeviva_pass,
            classeviva_base_url,
            telegram_bot_token,
            telegram_chat_id,
            check_interval,
            state_file,
        })
    }
}

fn require(key: &str) -> Result<String> {
    env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
