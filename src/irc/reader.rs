//! The per-session read loop.

use futures::StreamExt;
use std::io;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use crate::error::{Error, ProtocolError};
use crate::irc::client::{Client, ErrorReporter};
use crate::irc::codec::LineCodec;
use crate::irc::handler::Dispatcher;
use crate::irc::message::Message;

/// Read, parse and dispatch until the transport fails or the session is
/// shut down. Malformed lines are reported and skipped. On exit the session
/// is marked closed and every in-flight handler has returned.
pub(crate) async fn read_loop<R>(
    mut frames: FramedRead<R, LineCodec>,
    client: Client,
    mut dispatcher: Dispatcher,
    errors: ErrorReporter,
) where
    R: AsyncRead + Unpin,
{
    let shutdown = client.shutdown_token();

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("reader stopping on shutdown");
                break;
            }
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(Ok(line))) => {
                debug!(%line, "<-");
                match Message::parse(&line) {
                    Ok(msg) => dispatcher.dispatch(&client, msg).await,
                    Err(e) => report_malformed(&errors, e),
                }
            }
            Some(Ok(Err(e))) => report_malformed(&errors, e),
            Some(Err(e)) => {
                error!(error = %e, "read failed");
                errors.report(Error::Read(e));
                break;
            }
            None => {
                info!("connection closed by peer");
                errors.report(Error::Read(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )));
                break;
            }
        }
    }

    shutdown.cancel();
    drop(frames);
    dispatcher.drain().await;
}

fn report_malformed(errors: &ErrorReporter, e: ProtocolError) {
    warn!(error = %e, "skipping malformed line");
    errors.report(Error::Protocol(e));
}
