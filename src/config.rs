//! Runtime configuration, read from the environment.
//!
//! `main` loads `.env` first, so everything here can also live in that file.
//! Parsing goes through a lookup function rather than `std::env` directly so
//! tests don't have to mutate the process environment.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::identity;
use crate::logging::LogConfig;

pub const TOKEN_VAR: &str = "DISCORD_TOKEN";
pub const ACCOUNT_VAR: &str = "COMPLOGGER_ACCOUNT";
pub const LOG_DIR_VAR: &str = "COMPLOGGER_LOG_DIR";
pub const LOG_FILE_VAR: &str = "COMPLOGGER_LOG_FILE";
pub const LOG_MAX_BYTES_VAR: &str = "COMPLOGGER_LOG_MAX_BYTES";
pub const LOG_BACKUPS_VAR: &str = "COMPLOGGER_LOG_BACKUPS";
pub const LOG_CONSOLE_VAR: &str = "COMPLOGGER_LOG_CONSOLE";
pub const MESSAGE_CACHE_VAR: &str = "COMPLOGGER_MESSAGE_CACHE";
pub const LEVEL_VAR: &str = "RUST_LOG";

/// Default number of messages kept for edit/delete/reaction events.
pub const DEFAULT_MESSAGE_CACHE: usize = 1000;

// ---------------------------------------------------------------------------
// Account kind
// ---------------------------------------------------------------------------

/// Which kind of account the tokens belong to. Decides the auth header and
/// the IDENTIFY payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountKind {
    #[default]
    User,
    Bot,
}

impl FromStr for AccountKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(AccountKind::User),
            "bot" => Ok(AccountKind::Bot),
            other => Err(Error::Config(format!(
                "{} must be `user` or `bot`, got {:?}",
                ACCOUNT_VAR, other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// One client is started per token.
    pub tokens: Vec<String>,
    pub account: AccountKind,
    pub message_cache: usize,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = lookup(TOKEN_VAR)
            .ok_or_else(|| Error::Config(format!("{} environment variable not set", TOKEN_VAR)))?;
        let tokens = identity::parse_tokens(&raw);
        if tokens.is_empty() {
            return Err(Error::Config(format!("{} contains no tokens", TOKEN_VAR)));
        }

        let account = match lookup(ACCOUNT_VAR) {
            Some(value) => value.parse()?,
            None => AccountKind::default(),
        };

        let message_cache = parse_or(&lookup, MESSAGE_CACHE_VAR, DEFAULT_MESSAGE_CACHE)?;

        Ok(Self {
            tokens,
            account,
            message_cache,
        })
    }
}

/// Logging settings alone, so the sink can come up before the token is
/// validated.
pub fn log_config_from_env() -> Result<LogConfig> {
    log_config_from_lookup(&|key: &str| std::env::var(key).ok())
}

/// [`log_config_from_env`] over an arbitrary variable lookup.
pub fn log_config_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<LogConfig> {
    let defaults = LogConfig::default();
    Ok(LogConfig {
        directory: lookup(LOG_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or(defaults.directory),
        file_name: lookup(LOG_FILE_VAR).unwrap_or(defaults.file_name),
        max_bytes: parse_or(lookup, LOG_MAX_BYTES_VAR, defaults.max_bytes)?,
        max_backups: parse_or(lookup, LOG_BACKUPS_VAR, defaults.max_backups)?,
        level: lookup(LEVEL_VAR).unwrap_or(defaults.level),
        console: parse_or(lookup, LOG_CONSOLE_VAR, defaults.console)?,
        ansi: defaults.ansi,
    })
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", key, value, e))),
        None => Ok(default),
    }
}
