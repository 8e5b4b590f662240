//! Who the session registers as.
//!
//! The engine never decides on its own whether a message is addressed to
//! it; it asks the [`Identity`] supplied at connect time.

use crate::config::ServerConfig;
use crate::irc::message::Message;

pub trait Identity: Send + Sync + 'static {
    fn nick(&self) -> &str;

    /// User mode bitmask sent in the `USER` command.
    fn mode(&self) -> u8;

    fn realname(&self) -> &str;

    fn is_msg_for_me(&self, msg: &Message) -> bool;
}

/// Plain identity: a message is ours when its target is our nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub nick: String,
    pub mode: u8,
    pub realname: String,
}

impl User {
    pub fn new(nick: impl Into<String>, mode: u8, realname: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            mode,
            realname: realname.into(),
        }
    }
}

impl From<&ServerConfig> for User {
    fn from(config: &ServerConfig) -> Self {
        Self::new(config.nickname.clone(), config.mode, config.realname.clone())
    }
}

impl Identity for User {
    fn nick(&self) -> &str {
        &self.nick
    }

    fn mode(&self) -> u8 {
        self.mode
    }

    fn realname(&self) -> &str {
        &self.realname
    }

    fn is_msg_for_me(&self, msg: &Message) -> bool {
        msg.to.eq_ignore_ascii_case(&self.nick)
    }
}
