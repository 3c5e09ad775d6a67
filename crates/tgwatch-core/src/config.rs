use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::UserId,
    errors::Error,
    tracker::{TrackerSettings, CACHE_TTL, EVICT_INTERVAL},
    Result,
};

/// Typed process configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Outbound
    pub telegram_bot_token: String,
    pub notes_chat_id: i64,

    // Inbound bridge
    pub bridge_command: PathBuf,
    pub bridge_args: Vec<String>,
    pub media_download_timeout: Duration,

    // Tracker
    pub tracker_enabled: bool,
    pub self_id: UserId,
    pub ignored_peers: Vec<i64>,
    pub cache_ttl: Duration,
    pub evict_interval: Duration,
    pub min_edit_changed_chars: usize,
    pub forward_disappearing_media: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let notes_chat_id = normalize_chat_id(parse_i64("NOTES_CHAT_ID", &required("NOTES_CHAT_ID")?)?);
        let self_id = UserId(parse_i64("SELF_USER_ID", &required("SELF_USER_ID")?)?);

        let bridge_command = PathBuf::from(required("BRIDGE_COMMAND")?);
        let bridge_args = parse_csv(env_str("BRIDGE_ARGS"));
        let media_download_timeout =
            Duration::from_secs(env_u64("MEDIA_DOWNLOAD_TIMEOUT_SECS").unwrap_or(30));

        let tracker_enabled = env_bool("DELETED_TRACKER_ENABLED").unwrap_or(true);
        let ignored_peers = parse_csv_i64(env_str("TRACKER_IGNORED_PEERS"));
        let cache_ttl = env_u64("CACHE_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(CACHE_TTL);
        let evict_interval = env_u64("EVICT_INTERVAL_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(EVICT_INTERVAL);
        let min_edit_changed_chars = env_u64("MIN_EDIT_CHANGED_CHARS")
            .map(|n| n as usize)
            .unwrap_or(1);
        let forward_disappearing_media = env_bool("FORWARD_DISAPPEARING_MEDIA").unwrap_or(true);

        Ok(Self {
            telegram_bot_token,
            notes_chat_id,
            bridge_command,
            bridge_args,
            media_download_timeout,
            tracker_enabled,
            self_id,
            ignored_peers,
            cache_ttl,
            evict_interval,
            min_edit_changed_chars,
            forward_disappearing_media,
        })
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            self_id: self.self_id,
            cache_ttl: self.cache_ttl,
            evict_interval: self.evict_interval,
            min_edit_changed_chars: self.min_edit_changed_chars,
            forward_disappearing_media: self.forward_disappearing_media,
            ignored_peers: self.ignored_peers.clone(),
        }
    }
}

/// Bot API addresses channels and supergroups as `-100<raw id>`.
fn normalize_chat_id(raw: i64) -> i64 {
    if raw > 0 {
        format!("-100{raw}").parse().unwrap_or(raw)
    } else {
        raw
    }
}

fn required(key: &str) -> Result<String> {
    env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn parse_i64(key: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| Error::Config(format!("{key} must be an integer: {e}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
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

        let mut val = v.trim();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }
        out.push((key.to_string(), val.to_string()));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    parse_csv(v)
        .iter()
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
