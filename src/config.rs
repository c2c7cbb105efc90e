use crate::client::BackoffPolicy;
use reqwest::Url;
use std::{env, time::Duration};
use thiserror::Error;

pub const DEFAULT_BACKEND_PORT: u16 = 3000;
pub const FALLBACK_BACKEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://127.0.0.1:5500";
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Settings for the proxy binary, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub gxweb_url: String,
    pub gxweb_user: String,
    pub gxweb_pass: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub accept_invalid_certs: bool,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let port = match lookup("PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value,
            })?,
            None => DEFAULT_BACKEND_PORT,
        };

        let accept_invalid_certs = match lookup("GXWEB_ACCEPT_INVALID_CERTS") {
            Some(value) => parse_flag(&value).ok_or(ConfigError::Invalid {
                key: "GXWEB_ACCEPT_INVALID_CERTS",
                value,
            })?,
            None => false,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            gxweb_url: required("GXWEB_URL")?.trim_end_matches('/').to_string(),
            gxweb_user: required("GXWEB_USER")?,
            gxweb_pass: required("GXWEB_PASS")?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            allowed_origins,
            accept_invalid_certs,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Settings for [`crate::client::SchedulerClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub check_interval: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: FALLBACK_BACKEND_URL.to_string(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn for_page(page_url: &str) -> Self {
        Self {
            backend_url: derive_backend_url(page_url, DEFAULT_BACKEND_PORT),
            ..Self::default()
        }
    }
}

/// Works out the proxy address from the page the client is served from.
///
/// Hosted workstations encode the port in the host name
/// (`9002-abc.cloudworkstations.dev`), so the first run of digits in the host is
/// swapped for the backend port and the result is always https.
pub fn derive_backend_url(page_url: &str, backend_port: u16) -> String {
    let host = match Url::parse(page_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
    {
        Some(host) => host,
        None => {
            tracing::warn!(page_url, "could not derive backend url, using fallback");
            return FALLBACK_BACKEND_URL.to_string();
        }
    };

    let backend_host = replace_first_digit_run(&host, &backend_port.to_string());
    let url = format!("https://{backend_host}");
    tracing::info!(backend_url = %url, "backend url derived from page");
    url
}

fn replace_first_digit_run(input: &str, replacement: &str) -> String {
    let Some(start) = input.find(|c: char| c.is_ascii_digit()) else {
        return input.to_string();
    };
    let end = input[start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(input.len(), |offset| start + offset);

    format!("{}{}{}", &input[..start], replacement, &input[end..])
}
