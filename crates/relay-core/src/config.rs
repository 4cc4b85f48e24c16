use std::{env, fs, net::SocketAddr, path::Path, path::PathBuf, time::Duration};

use crate::{domain::ChatId, errors::Error, Result};

/// Typed configuration for the relay bot.
///
/// Everything is sourced from the environment (optionally seeded from `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub admin_chat_id: ChatId,

    // Webhook
    pub webhook_base_url: String,
    pub webhook_path: String,
    pub webhook_secret: Option<String>,
    pub webhook_max_attempts: u32,
    pub webhook_retry_delay: Duration,

    // HTTP server
    pub bind_addr: SocketAddr,

    // Storage
    pub database_path: PathBuf,

    // Delivery
    pub broadcast_concurrency: usize,
    pub send_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| lookup(k))
                .and_then(non_empty)
        };

        // Required
        let telegram_bot_token = get(&["TELEGRAM_BOT_TOKEN", "BOT_TOKEN"]).ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let admin_raw = get(&["ADMIN_CHAT_ID", "ADMIN_ID"]).ok_or_else(|| {
            Error::Config("ADMIN_CHAT_ID environment variable is required".to_string())
        })?;
        let admin_chat_id = admin_raw
            .trim()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| Error::Config(format!("ADMIN_CHAT_ID is not a number: {admin_raw}")))?;

        let webhook_base_url = get(&["WEBHOOK_URL"])
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .ok_or_else(|| {
                Error::Config("WEBHOOK_URL environment variable is required".to_string())
            })?;
        if !(webhook_base_url.starts_with("https://") || webhook_base_url.starts_with("http://"))
        {
            return Err(Error::Config(format!(
                "WEBHOOK_URL must be an http(s) URL: {webhook_base_url}"
            )));
        }

        // Webhook
        let webhook_path = normalize_path(get(&["WEBHOOK_PATH"]).as_deref().unwrap_or("/webhook"));
        if matches!(webhook_path.as_str(), "/" | "/health") {
            return Err(Error::Config(format!(
                "WEBHOOK_PATH collides with a built-in route: {webhook_path}"
            )));
        }
        let webhook_secret = get(&["WEBHOOK_SECRET"]);
        let webhook_max_attempts = parse_num::<u32>(get(&["WEBHOOK_MAX_ATTEMPTS"]))
            .unwrap_or(3)
            .max(1);
        let webhook_retry_delay =
            Duration::from_millis(parse_num(get(&["WEBHOOK_RETRY_DELAY_MS"])).unwrap_or(2_000));

        // HTTP server: BIND_ADDR wins; PORT is the common PaaS convention.
        let bind_addr = match (get(&["BIND_ADDR"]), get(&["PORT"])) {
            (Some(addr), _) => addr
                .trim()
                .parse::<SocketAddr>()
                .map_err(|_| Error::Config(format!("BIND_ADDR is not a socket address: {addr}")))?,
            (None, Some(port)) => {
                let port = port
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| Error::Config(format!("PORT is not a port number: {port}")))?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, None) => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let database_path =
            PathBuf::from(get(&["DATABASE_PATH"]).unwrap_or_else(|| "bot_database.db".to_string()));

        let broadcast_concurrency = parse_num::<usize>(get(&["BROADCAST_CONCURRENCY"]))
            .unwrap_or(8)
            .max(1);
        let send_timeout = Duration::from_secs(parse_num(get(&["SEND_TIMEOUT_SECS"])).unwrap_or(30));

        Ok(Self {
            telegram_bot_token,
            admin_chat_id,
            webhook_base_url,
            webhook_path,
            webhook_secret,
            webhook_max_attempts,
            webhook_retry_delay,
            bind_addr,
            database_path,
            broadcast_concurrency,
            send_timeout,
        })
    }

    /// Full callback URL registered with Telegram.
    pub fn webhook_url(&self) -> String {
        format!("{}{}", self.webhook_base_url, self.webhook_path)
    }
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

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_num<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
    v.and_then(|s| s.trim().parse::<T>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
