//! Client configuration.
//!
//! A [`RemoteConfig`] is resolved once, when the tree root is built. Nothing
//! in the client reads the environment on its own; callers that want
//! environment-driven defaults go through [`Defaults::from_env`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::Error;

/// Request timeout used when neither the URI nor the environment sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User name and optional password, carried to the server as basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Defaults applied to every [`RemoteConfig`] built from a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub recursive: bool,
    pub full: bool,
    pub timeout: Duration,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            recursive: true,
            full: false,
            timeout: DEFAULT_TIMEOUT,
            cache_dir: None,
        }
    }
}

impl Defaults {
    /// Read `REMOTEFS_RECURSIVE`, `REMOTEFS_FULL`, `REMOTEFS_TIMEOUT_MS` and
    /// `REMOTEFS_CACHE_DIR`. Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut defaults = Self::default();
        if let Some(value) = lookup("REMOTEFS_RECURSIVE") {
            defaults.recursive = parse_flag("REMOTEFS_RECURSIVE", &value, defaults.recursive);
        }
        if let Some(value) = lookup("REMOTEFS_FULL") {
            defaults.full = parse_flag("REMOTEFS_FULL", &value, defaults.full);
        }
        if let Some(value) = lookup("REMOTEFS_TIMEOUT_MS") {
            match value.trim().parse::<u64>() {
                Ok(millis) => defaults.timeout = Duration::from_millis(millis),
                Err(_) => tracing::warn!(value = %value, "ignoring invalid REMOTEFS_TIMEOUT_MS"),
            }
        }
        if let Some(value) = lookup("REMOTEFS_CACHE_DIR") {
            if !value.is_empty() {
                defaults.cache_dir = Some(PathBuf::from(value));
            }
        }
        defaults
    }
}

fn parse_flag(name: &str, value: &str, fallback: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => {
            tracing::warn!(name, value, "ignoring invalid boolean setting");
            fallback
        }
    }
}

/// Everything needed to open a remote tree.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Server root, always ending with `/`. Endpoints (`list`, `resource`,
    /// `exists`) are appended to it.
    pub base_url: String,
    pub credentials: Option<Credentials>,
    /// Fetch whole subtrees in one listing call.
    pub recursive: bool,
    /// Ask the server to inline small file contents in listings.
    pub full: bool,
    pub timeout: Duration,
    /// Root of the content-addressed disk cache, disabled when `None`.
    pub cache_dir: Option<PathBuf>,
}

impl RemoteConfig {
    /// Configuration for an `http(s)` server root, with default options.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let url = Url::parse(base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl {
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        let defaults = Defaults::default();
        Ok(Self {
            base_url: with_trailing_slash(url.as_str()),
            credentials: None,
            recursive: defaults.recursive,
            full: defaults.full,
            timeout: defaults.timeout,
            cache_dir: defaults.cache_dir,
        })
    }

    /// Parse `remote[s]://[user[:password]@]host[:port]/prefix?recursive=&full=&timeout=`
    /// with built-in defaults.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        Self::from_uri_with(uri, &Defaults::default())
    }

    /// Like [`RemoteConfig::from_uri`], with explicit defaults for anything
    /// the URI leaves out.
    pub fn from_uri_with(uri: &str, defaults: &Defaults) -> Result<Self, Error> {
        let url = Url::parse(uri)?;
        let scheme = match url.scheme() {
            "remote" | "http" => "http",
            "remotes" | "https" => "https",
            other => {
                return Err(Error::InvalidUrl {
                    message: format!("unsupported scheme '{other}'"),
                })
            }
        };
        let host = url.host_str().ok_or_else(|| Error::InvalidUrl {
            message: format!("'{uri}' has no host"),
        })?;

        let mut base_url = format!("{scheme}://{host}");
        if let Some(port) = url.port() {
            base_url.push_str(&format!(":{port}"));
        }
        base_url.push_str(url.path());

        let credentials = if url.username().is_empty() {
            None
        } else {
            Some(Credentials::new(
                decode(url.username()),
                url.password().map(decode),
            ))
        };

        let mut config = Self {
            base_url: with_trailing_slash(&base_url),
            credentials,
            recursive: defaults.recursive,
            full: defaults.full,
            timeout: defaults.timeout,
            cache_dir: defaults.cache_dir.clone(),
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "recursive" => config.recursive = parse_flag("recursive", &value, config.recursive),
                "full" => config.full = parse_flag("full", &value, config.full),
                "timeout" => {
                    let millis = value.parse::<u64>().map_err(|_| Error::InvalidUrl {
                        message: format!("invalid timeout '{value}'"),
                    })?;
                    config.timeout = Duration::from_millis(millis);
                }
                other => tracing::debug!(key = other, "ignoring unknown URI option"),
            }
        }
        Ok(config)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
