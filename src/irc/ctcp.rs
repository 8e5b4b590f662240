//! CTCP (Client-To-Client Protocol) quoting and built-in replies.
//!
//! A CTCP payload travels inside a PRIVMSG/NOTICE body wrapped in the
//! `\x01` delimiter on both ends, e.g. `\x01VERSION\x01`.

use crate::config::CtcpConfig;

/// The CTCP delimiter byte.
pub const DELIM: char = '\x01';

/// Wrap `payload` in CTCP delimiters.
pub fn quote(payload: &str) -> String {
    let mut quoted = String::with_capacity(payload.len() + 2);
    quoted.push(DELIM);
    quoted.push_str(payload);
    quoted.push(DELIM);
    quoted
}

/// Strip the CTCP delimiters from `payload`.
///
/// Returns the input unchanged unless it is at least two bytes long and both
/// starts and ends with the delimiter.
pub fn dequote(payload: &str) -> &str {
    if is_ctcp(payload) {
        &payload[1..payload.len() - 1]
    } else {
        payload
    }
}

/// Whether `body` is a delimiter-framed CTCP payload.
///
/// A lone `\x01` is not: it cannot be both the opening and the closing
/// delimiter, and [`dequote`] would have nothing to strip.
pub fn is_ctcp(body: &str) -> bool {
    let bytes = body.as_bytes();
    bytes.len() >= 2 && bytes[0] == DELIM as u8 && bytes[bytes.len() - 1] == DELIM as u8
}

/// Build the unquoted reply for a CTCP request, if we answer it.
///
/// Only the first word of the payload is the command; it is matched
/// case-insensitively.
pub(crate) fn reply_for(payload: &str, config: &CtcpConfig) -> Option<String> {
    let command = payload.split(' ').next().unwrap_or_default();

    match command.to_ascii_uppercase().as_str() {
        "VERSION" if config.reply_version => Some(format!(
            "VERSION {}:{}",
            config.client_name, config.client_version
        )),
        "SOURCE" if config.reply_source => Some(format!("SOURCE {}", config.source_url)),
        _ => None,
    }
}
