//! Inbound message parsing.
//!
//! Grammar, fields separated by runs of spaces:
//!
//! ```text
//! :mask ACTION target body...      prefixed form, all four fields required
//! ACTION target body...            server form, sender left empty
//! ACTION :trailing                 server form without a target (PING, ERROR)
//! ACTION param                     same, single parameter without the `:`
//! ```
//!
//! The body absorbs the rest of the line, embedded spaces included, and loses
//! one leading `:` if present.

use crate::error::ProtocolError;
use crate::irc::ctcp;

/// One parsed inbound line. Handlers receive it by shared reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Nick part of the sender mask (or the whole mask for server senders).
    pub from: String,
    /// Full sender mask without the leading `:`, e.g. `nick!user@host`.
    pub from_mask: String,
    pub to: String,
    /// Command word as received; dispatch upper-cases it for lookup.
    pub action: String,
    pub body: String,
}

/// Split off the next space-delimited field.
fn next_field(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim_start_matches(' ');
    if rest.is_empty() {
        return None;
    }
    Some(rest.split_once(' ').unwrap_or((rest, "")))
}

impl Message {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches("\r\n");
        let trimmed = line.trim_start_matches(' ');
        if trimmed.trim_end_matches(' ').is_empty() {
            return Err(ProtocolError::Empty);
        }

        let short = |found: usize| ProtocolError::FieldCount {
            found,
            line: line.to_string(),
        };

        let (mask, rest) = match trimmed.strip_prefix(':') {
            Some(prefixed) => {
                let (mask, rest) = prefixed.split_once(' ').unwrap_or((prefixed, ""));
                (Some(mask), rest)
            }
            None => (None, trimmed),
        };
        let seen = usize::from(mask.is_some());

        let (action, rest) = next_field(rest).ok_or_else(|| short(seen))?;
        let rest = rest.trim_start_matches(' ');

        let (to, body) = if mask.is_none() && rest.starts_with(':') {
            ("", rest)
        } else {
            let (to, body) = next_field(rest).ok_or_else(|| short(seen + 1))?;
            match body.trim_start_matches(' ') {
                "" if mask.is_none() => ("", to),
                "" => return Err(short(seen + 2)),
                body => (to, body),
            }
        };

        let mask = mask.unwrap_or_default();
        let from = mask.split_once('!').map_or(mask, |(nick, _)| nick);

        Ok(Self {
            from: from.to_string(),
            from_mask: mask.to_string(),
            to: to.to_string(),
            action: action.to_string(),
            body: body.strip_prefix(':').unwrap_or(body).to_string(),
        })
    }

    /// The `user@host` part of the sender mask, if the sender is a user.
    pub fn host(&self) -> Option<&str> {
        self.from_mask.split_once('!').map(|(_, host)| host)
    }

    /// Whether the body carries a CTCP payload.
    pub fn is_ctcp(&self) -> bool {
        ctcp::is_ctcp(&self.body)
    }
}

impl std::str::FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
