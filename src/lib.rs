//! A minimal IRC client engine.
//!
//! [`Client::connect`] dials a server, registers with `NICK`/`USER`, and
//! starts a read loop that parses each inbound line into a [`Message`] and
//! hands it to every handler registered for its action:
//!
//! ```no_run
//! use sifr::{Client, Message, User};
//!
//! # async fn demo() -> sifr::Result<()> {
//! let (client, mut errors) = Client::connect("irc.libera.chat:6667", User::new("sifr", 0, "sifr")).await?;
//! client.add_handler("privmsg", |client: &Client, msg: &Message| {
//!     if msg.body == "!ping" {
//!         let _ = client.privmsg(&msg.to, "pong");
//!     }
//! });
//! client.join("#sifr", "")?;
//!
//! while let Some(err) = errors.recv().await {
//!     if err.is_fatal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod irc;
pub mod logging;

pub use config::AppConfig;
pub use error::{Error, ProtocolError, Result};
pub use irc::client::{Client, ClientBuilder, Errors};
pub use irc::ctcp::{dequote, is_ctcp, quote};
pub use irc::handler::Handler;
pub use irc::identity::{Identity, User};
pub use irc::message::Message;
