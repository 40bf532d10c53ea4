//! Account identity derived from a token.
//!
//! The first dot-separated segment of a Discord token is the account's
//! snowflake, base64-encoded with its padding stripped. We only need it to
//! name the logger, so decoding failures fall back to [`UNKNOWN_ACCOUNT`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

/// Logger name used when a token's id segment can't be decoded.
pub const UNKNOWN_ACCOUNT: &str = "unknown";

/// Padding suffixes tried, in order, before giving up.
const PADDINGS: [&str; 3] = ["", "=", "=="];

/// Split a comma-separated token list, dropping blanks.
pub fn parse_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// The decimal account id encoded in `token`, or [`UNKNOWN_ACCOUNT`].
pub fn account_name(token: &str) -> String {
    match account_id(token) {
        Some(id) => id.to_string(),
        None => UNKNOWN_ACCOUNT.to_string(),
    }
}

/// Decode the id segment, retrying with one and then two `=` appended.
pub fn account_id(token: &str) -> Option<u64> {
    let segment = token.split('.').next().unwrap_or_default();
    PADDINGS.iter().find_map(|padding| {
        let candidate = format!("{}{}", segment, padding);
        let id = decode_id(&candidate);
        if id.is_none() {
            debug!(padding = padding.len(), "token segment did not decode");
        }
        id
    })
}

fn decode_id(segment: &str) -> Option<u64> {
    let bytes = STANDARD.decode(segment).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.trim().parse().ok()
}
