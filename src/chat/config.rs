//! Configuration types for the chat application.
//!
//! Command-line arguments are parsed with `arrrg`; anything left unset falls
//! back to the environment and then to built-in defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::DEFAULT_API_URL;
use crate::controller::{ConversationOptions, DEFAULT_MAX_TOKENS};
use crate::types::Credential;
use crate::{Error, Result};

/// Environment variable naming the backend address.
pub const API_URL_ENV: &str = "RAGCHAT_API_URL";

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "RAGCHAT_TOKEN";

/// Environment variable naming the local store's directory.
pub const DATA_DIR_ENV: &str = "RAGCHAT_DATA_DIR";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Command-line arguments for the ragchat-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Backend base URL.
    #[arrrg(optional, "Backend URL (default: $RAGCHAT_API_URL or http://localhost:8000)", "URL")]
    pub api_url: Option<String>,

    /// Bearer token for the backend.
    #[arrrg(optional, "Bearer token (default: $RAGCHAT_TOKEN)", "TOKEN")]
    pub token: Option<String>,

    /// Maximum tokens per answer.
    #[arrrg(optional, "Max tokens per answer (default: 500)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Answer without retrieved document context.
    #[arrrg(flag, "Do not ground answers in embedded documents")]
    pub no_context: bool,

    /// Where sessions are kept.
    #[arrrg(optional, "Session store: local or remote (default: local)", "STORE")]
    pub store: Option<String>,

    /// Directory for the local session store.
    #[arrrg(optional, "Data directory (default: $RAGCHAT_DATA_DIR or ~/.ragchat)", "DIR")]
    pub data_dir: Option<String>,

    /// Timeout for non-streaming calls.
    #[arrrg(optional, "Timeout in seconds for non-streaming calls (default: 60)", "SECONDS")]
    pub timeout: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Which [`SessionStore`](crate::store::SessionStore) backs the front end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    /// A JSON file in the data directory.
    #[default]
    Local,

    /// The backend's history endpoints.
    Remote,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Local => f.write_str("local"),
            StoreKind::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StoreKind::Local),
            "remote" => Ok(StoreKind::Remote),
            _ => Err(Error::validation(
                format!("invalid store: {s}. Valid options: local, remote"),
                Some("store".to_string()),
            )),
        }
    }
}

/// Resolved configuration for the chat front end.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Backend base URL.
    pub api_url: String,

    /// Bearer token; `None` talks to a backend running in open mode.
    pub token: Option<String>,

    /// Maximum tokens per answer.
    pub max_tokens: u32,

    /// Whether answers are grounded in embedded documents.
    pub use_context: bool,

    /// Where sessions are kept.
    pub store: StoreKind,

    /// Directory for the local store.
    pub data_dir: PathBuf,

    /// Timeout for non-streaming calls.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            use_context: true,
            store: StoreKind::Local,
            data_dir: default_data_dir(|name| std::env::var(name).ok()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            use_color: true,
        }
    }

    /// Resolves `args` against the process environment.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        Self::from_args_with_env(args, |name| std::env::var(name).ok())
    }

    /// Resolves `args`, reading environment variables through `env`.
    pub fn from_args_with_env(
        args: ChatArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let store = match args.store.as_deref() {
            Some(store) => store.parse()?,
            None => StoreKind::default(),
        };
        let data_dir = match args.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(&env),
        };
        Ok(Self {
            api_url: args
                .api_url
                .or_else(|| env(API_URL_ENV))
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token: args.token.or_else(|| env(TOKEN_ENV)).filter(|t| !t.is_empty()),
            max_tokens: args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            use_context: !args.no_context,
            store,
            data_dir,
            timeout: Duration::from_secs(
                args.timeout.map(u64::from).unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            use_color: !args.no_color,
        })
    }

    /// Sets the backend URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Sets the maximum tokens per answer.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets whether answers use document context.
    pub fn with_use_context(mut self, use_context: bool) -> Self {
        self.use_context = use_context;
        self
    }

    /// Sets the session store.
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    /// Sets the local store's directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the timeout for non-streaming calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The credential to present, if a token is configured.
    pub fn credential(&self) -> Option<Credential> {
        self.token.as_deref().map(Credential::bearer)
    }

    /// Request settings for conversations.
    pub fn conversation_options(&self) -> ConversationOptions {
        ConversationOptions {
            max_tokens: self.max_tokens,
            use_context: self.use_context,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_data_dir(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    match env("HOME").filter(|h| !h.is_empty()) {
        Some(home) => PathBuf::from(home).join(".ragchat"),
        None => PathBuf::from(".ragchat"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn config_from_args_defaults() {
        let config =
            ChatConfig::from_args_with_env(ChatArgs::default(), env_of(&[("HOME", "/home/u")]))
                .unwrap();
        assert_eq!(config.api_url, "http://localhost:8000/");
        assert!(config.token.is_none());
        assert!(config.credential().is_none());
        assert_eq!(config.max_tokens, 500);
        assert!(config.use_context);
        assert_eq!(config.store, StoreKind::Local);
        assert_eq!(config.data_dir, PathBuf::from("/home/u/.ragchat"));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.use_color);
    }

    #[test]
    fn environment_fills_unset_flags() {
        let env = env_of(&[
            (API_URL_ENV, "http://rag.internal:9000"),
            (TOKEN_ENV, "tok"),
            (DATA_DIR_ENV, "/var/lib/ragchat"),
        ]);
        let config = ChatConfig::from_args_with_env(ChatArgs::default(), env).unwrap();
        assert_eq!(config.api_url, "http://rag.internal:9000");
        assert_eq!(config.credential(), Some(Credential::bearer("tok")));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/ragchat"));
    }

    #[test]
    fn flags_win_over_environment() {
        let args = ChatArgs {
            api_url: Some("http://localhost:1234".to_string()),
            token: Some("flag-token".to_string()),
            max_tokens: Some(800),
            no_context: true,
            store: Some("Remote".to_string()),
            data_dir: Some("/tmp/chat".to_string()),
            timeout: Some(5),
            no_color: true,
        };
        let env = env_of(&[(API_URL_ENV, "http://ignored"), (TOKEN_ENV, "ignored")]);
        let config = ChatConfig::from_args_with_env(args, env).unwrap();
        assert_eq!(config.api_url, "http://localhost:1234");
        assert_eq!(config.token.as_deref(), Some("flag-token"));
        assert_eq!(config.max_tokens, 800);
        assert!(!config.use_context);
        assert_eq!(config.store, StoreKind::Remote);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/chat"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.use_color);
        assert_eq!(
            config.conversation_options(),
            ConversationOptions {
                max_tokens: 800,
                use_context: false
            }
        );
    }

    #[test]
    fn unknown_store_is_rejected() {
        let args = ChatArgs {
            store: Some("cloud".to_string()),
            ..ChatArgs::default()
        };
        let err = ChatConfig::from_args_with_env(args, env_of(&[])).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn empty_token_means_open_mode() {
        let config =
            ChatConfig::from_args_with_env(ChatArgs::default(), env_of(&[(TOKEN_ENV, "")]))
                .unwrap();
        assert!(config.token.is_none());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_api_url("http://example.com")
            .with_token(Some("t".to_string()))
            .with_max_tokens(42)
            .with_use_context(false)
            .with_store(StoreKind::Remote)
            .with_data_dir("/data")
            .with_timeout(Duration::from_secs(3))
            .without_color();
        assert_eq!(config.api_url, "http://example.com");
        assert_eq!(config.token.as_deref(), Some("t"));
        assert_eq!(config.max_tokens, 42);
        assert!(!config.use_context);
        assert_eq!(config.store, StoreKind::Remote);
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(!config.use_color);
    }
}
