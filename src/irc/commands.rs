//! Outbound commands.
//!
//! Every command renders to exactly one line and is queued for the session's
//! writer task, which owns the write half of the transport. Lines from
//! concurrent callers are therefore never interleaved.

use futures::SinkExt;
use std::fmt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::irc::client::{Client, ErrorReporter};
use crate::irc::codec::LineCodec;
use crate::irc::ctcp;

impl Client {
    /// Queue one raw protocol line. The terminator is added on write; any CR
    /// or LF inside `line` is removed so it cannot split into two lines.
    ///
    /// ```no_run
    /// # fn demo(client: &sifr::Client) -> sifr::Result<()> {
    /// client.send(format_args!("PRIVMSG {} :{}", "#chan", "hi"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn send(&self, line: impl fmt::Display) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let mut line = line.to_string();
        line.retain(|c| c != '\r' && c != '\n');
        self.outbound().send(line).map_err(|_| Error::Closed)
    }

    /// `JOIN channel [password]`
    pub fn join(&self, channel: &str, password: &str) -> Result<()> {
        if password.is_empty() {
            self.send(format_args!("JOIN {}", channel))
        } else {
            self.send(format_args!("JOIN {} {}", channel, password))
        }
    }

    pub fn nick(&self, nick: &str) -> Result<()> {
        self.send(format_args!("NICK {}", nick))
    }

    pub fn notice(&self, to: &str, msg: &str) -> Result<()> {
        self.send(format_args!("NOTICE {} :{}", to, msg))
    }

    pub fn part(&self, channel: &str) -> Result<()> {
        self.send(format_args!("PART {}", channel))
    }

    pub fn ping(&self, arg: &str) -> Result<()> {
        self.send(format_args!("PING :{}", arg))
    }

    pub fn pong(&self, arg: &str) -> Result<()> {
        self.send(format_args!("PONG :{}", arg))
    }

    pub fn privmsg(&self, to: &str, msg: &str) -> Result<()> {
        self.send(format_args!("PRIVMSG {} :{}", to, msg))
    }

    /// Reply to a CTCP request: a NOTICE carrying the quoted `payload`.
    pub fn ctcp_reply(&self, to: &str, payload: &str) -> Result<()> {
        self.notice(to, &ctcp::quote(payload))
    }

    /// Send `QUIT :reason` and end the session once it is written.
    pub fn quit(&self, reason: &str) -> Result<()> {
        self.send(format_args!("QUIT :{}", reason))?;
        self.shutdown();
        Ok(())
    }
}

/// Drain queued lines into the transport until shutdown, then flush what is
/// still queued and close the write half.
pub(crate) async fn write_loop<W>(
    mut sink: FramedWrite<W, LineCodec>,
    mut lines: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
    errors: ErrorReporter,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            biased;
            line = lines.recv() => line,
            _ = shutdown.cancelled() => break,
        };
        let Some(line) = line else { break };

        debug!(%line, "->");
        if let Err(e) = sink.send(line).await {
            error!(error = %e, "write failed");
            errors.report(Error::Write(e));
            shutdown.cancel();
            return;
        }
    }

    lines.close();
    while let Ok(line) = lines.try_recv() {
        debug!(%line, "->");
        if let Err(e) = sink.send(line).await {
            debug!(error = %e, "dropping queued lines after shutdown");
            break;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use crate::irc::client::tests::detached_client;

    #[test]
    fn test_send_formats_template() {
        let (client, mut outbound) = detached_client();
        client
            .send(format_args!("PRIVMSG {} :{}", "#chan", "hi"))
            .unwrap();
        assert_eq!(outbound.try_recv().unwrap(), "PRIVMSG #chan :hi");
    }

    #[test]
    fn test_send_strips_line_breaks() {
        let (client, mut outbound) = detached_client();
        client.privmsg("#chan", "one\r\nQUIT :injected").unwrap();
        assert_eq!(
            outbound.try_recv().unwrap(),
            "PRIVMSG #chan :oneQUIT :injected"
        );
    }

    #[test]
    fn test_convenience_commands() {
        let (client, mut outbound) = detached_client();
        client.join("#rust", "").unwrap();
        client.join("#secret", "hunter2").unwrap();
        client.nick("sifr_").unwrap();
        client.notice("bob", "hello there").unwrap();
        client.part("#rust").unwrap();
        client.ping("abc").unwrap();
        client.pong("abc").unwrap();
        client.privmsg("#rust", "hi all").unwrap();
        client.ctcp_reply("bob", "VERSION Sifr:0.0.0").unwrap();

        let expected = [
            "JOIN #rust",
            "JOIN #secret hunter2",
            "NICK sifr_",
            "NOTICE bob :hello there",
            "PART #rust",
            "PING :abc",
            "PONG :abc",
            "PRIVMSG #rust :hi all",
            "NOTICE bob :\x01VERSION Sifr:0.0.0\x01",
        ];
        for line in expected {
            assert_eq!(outbound.try_recv().unwrap(), line);
        }
        assert!(outbound.try_recv().is_err());
    }

    #[test]
    fn test_quit_closes_session() {
        let (client, mut outbound) = detached_client();
        client.quit("bye").unwrap();
        assert_eq!(outbound.try_recv().unwrap(), "QUIT :bye");
        assert!(client.is_closed());
        assert!(matches!(
            client.privmsg("#rust", "too late"),
            Err(crate::Error::Closed)
        ));
    }
}
