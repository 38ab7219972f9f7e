//! Strongly-typed configuration for the sidechat runtime.
//!
//! Configuration values can be constructed from defaults, loaded from
//! environment variables (with optional `.env` support), or edited
//! programmatically before handing them to the orchestrator. Every empirical
//! settle delay and timeout lives in [`ChainTiming`] so tuning is a
//! configuration change, not a code change.

use std::env;
use std::num::ParseIntError;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verbosity level for sidechat logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Minimal,
    #[default]
    Medium,
    Detailed,
}

impl Verbosity {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Verbosity::Minimal => 0,
            Verbosity::Medium => 1,
            Verbosity::Detailed => 2,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Verbosity::Minimal),
            1 => Some(Verbosity::Medium),
            2 => Some(Verbosity::Detailed),
            _ => None,
        }
    }
}

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum SidechatConfigError {
    #[error("environment variable {name} has invalid integer value {value:?}")]
    InvalidInteger {
        name: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("environment variable {name} has invalid value {value:?}; expected 0, 1, or 2")]
    InvalidVerbosity { name: &'static str, value: String },
}

/// Empirical delays and timeouts used when driving provider pages.
///
/// The settle delays compensate for single-page applications whose internal
/// state lags behind DOM event dispatch; they are tuning constants, not
/// protocol-derived values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainTiming {
    /// Settle after simulated text entry, before clicking send.
    pub input_settle_ms: u64,
    /// Settle after clicking send, before watching for the reply.
    pub send_settle_ms: u64,
    /// Settle after triggering a new conversation.
    pub new_chat_settle_ms: u64,
    /// Settle before typing into a history search field.
    pub history_input_settle_ms: u64,
    /// Settle after a reveal pre-click before the shared history flow.
    pub reveal_settle_ms: u64,
    /// Settle after page load before running cleanup removals.
    pub cleanup_delay_ms: u64,
    /// Default element-wait budget.
    pub wait_timeout_ms: u64,
    /// Default element-wait poll interval.
    pub wait_interval_ms: u64,
    /// Budget for the reply-finished marker to appear.
    pub reply_timeout_ms: u64,
    /// Poll interval while waiting for the reply-finished marker.
    pub reply_interval_ms: u64,
    /// Outer bound on one whole chat operation.
    pub chat_timeout_ms: u64,
}

impl Default for ChainTiming {
    fn default() -> Self {
        Self {
            input_settle_ms: 500,
            send_settle_ms: 1_000,
            new_chat_settle_ms: 500,
            history_input_settle_ms: 500,
            reveal_settle_ms: 500,
            cleanup_delay_ms: 600,
            wait_timeout_ms: 30_000,
            wait_interval_ms: 200,
            reply_timeout_ms: 200_000,
            reply_interval_ms: 500,
            chat_timeout_ms: 5 * 60_000,
        }
    }
}

/// Top-level configuration for the orchestrator and adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SidechatConfig {
    /// Provider activated when switching by name finds no better candidate.
    pub default_provider: String,
    /// Folder (relative to the host's note root) receiving generated notes.
    pub notes_folder: String,
    /// Auto-hide delay for terminal status states.
    pub status_autohide_ms: u64,
    pub verbose: Verbosity,
    pub timing: ChainTiming,
}

impl Default for SidechatConfig {
    fn default() -> Self {
        Self {
            default_provider: "Qwen".to_string(),
            notes_folder: "Wiki".to_string(),
            status_autohide_ms: 5_000,
            verbose: Verbosity::default(),
            timing: ChainTiming::default(),
        }
    }
}

impl SidechatConfig {
    /// Construct a configuration from environment variables, after loading a
    /// `.env` file if one is present.
    pub fn from_env() -> Result<Self, SidechatConfigError> {
        let _ = dotenv();
        let mut config = SidechatConfig::default();

        if let Some(value) = env_var("SIDECHAT_DEFAULT_PROVIDER") {
            config.default_provider = value;
        }
        if let Some(value) = env_var("SIDECHAT_NOTES_FOLDER") {
            config.notes_folder = value;
        }
        if let Some(value) = env_var("SIDECHAT_STATUS_AUTOHIDE_MS") {
            config.status_autohide_ms = parse_ms("SIDECHAT_STATUS_AUTOHIDE_MS", value)?;
        }
        if let Some(value) = env_var("SIDECHAT_VERBOSE") {
            let parsed = parse_ms("SIDECHAT_VERBOSE", value.clone())?;
            config.verbose = Verbosity::from_u8(parsed as u8).ok_or(
                SidechatConfigError::InvalidVerbosity {
                    name: "SIDECHAT_VERBOSE",
                    value,
                },
            )?;
        }
        if let Some(value) = env_var("SIDECHAT_CHAT_TIMEOUT_MS") {
            config.timing.chat_timeout_ms = parse_ms("SIDECHAT_CHAT_TIMEOUT_MS", value)?;
        }
        if let Some(value) = env_var("SIDECHAT_REPLY_TIMEOUT_MS") {
            config.timing.reply_timeout_ms = parse_ms("SIDECHAT_REPLY_TIMEOUT_MS", value)?;
        }

        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_ms(name: &'static str, value: String) -> Result<u64, SidechatConfigError> {
    value
        .trim()
        .parse()
        .map_err(|source| SidechatConfigError::InvalidInteger {
            name,
            value,
            source,
        })
}
