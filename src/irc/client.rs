//! Session lifecycle: dial, register, and wire the reader, writer and
//! dispatcher together.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, CtcpConfig, DispatchConfig};
use crate::error::{Error, Result};
use crate::irc::codec::LineCodec;
use crate::irc::commands::write_loop;
use crate::irc::handler::{install_builtins, Dispatcher, Handler, HandlerRegistry};
use crate::irc::identity::Identity;
use crate::irc::message::Message;
use crate::irc::reader::read_loop;

/// Receiving end of a session's error reports.
///
/// Fatal errors ([`Error::is_fatal`]) arrive at most once, after which the
/// session is dead. Dropping the receiver is fine; reports are then discarded.
pub type Errors = mpsc::Receiver<Error>;

/// Handle to a live session. Cheap to clone; all clones share the session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Shared>,
}

struct Shared {
    identity: Arc<dyn Identity>,
    outbound: mpsc::UnboundedSender<String>,
    handlers: Arc<HandlerRegistry>,
    ctcp: CtcpConfig,
    shutdown: CancellationToken,
    /// Cancelled once the reader and writer have both exited.
    done: CancellationToken,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("nick", &self.inner.identity.nick())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Client {
    /// Dial `addr` with default settings and register as `identity`.
    pub async fn connect(addr: &str, identity: impl Identity) -> Result<(Client, Errors)> {
        ClientBuilder::new(identity).connect(addr).await
    }

    pub fn identity(&self) -> &dyn Identity {
        self.inner.identity.as_ref()
    }

    pub(crate) fn ctcp_config(&self) -> &CtcpConfig {
        &self.inner.ctcp
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub(crate) fn outbound(&self) -> &mpsc::UnboundedSender<String> {
        &self.inner.outbound
    }

    /// Register `handler` for `action` (case-insensitive). Safe to call while
    /// the session is running; the handler sees messages read afterwards.
    pub fn add_handler<F>(&self, action: &str, handler: F)
    where
        F: Fn(&Client, &Message) + Send + Sync + 'static,
    {
        self.inner.handlers.add(action, Arc::new(handler));
    }

    /// Ask the reader and writer to stop. Lines already queued are still
    /// written.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Resolves once the session has fully stopped and every in-flight
    /// handler has returned.
    pub async fn closed(&self) {
        self.inner.done.cancelled().await;
    }

    fn register(&self) -> Result<()> {
        let identity = self.identity();
        self.nick(identity.nick())?;
        self.send(format_args!(
            "USER {} {} * :{}",
            identity.nick(),
            identity.mode(),
            identity.realname()
        ))
    }
}

/// Forwards session errors to the caller without ever blocking.
///
/// The channel has one slot more than the configured capacity. Recoverable
/// reports never take the last free slot, so the single fatal report of a
/// session always fits.
#[derive(Clone)]
pub(crate) struct ErrorReporter {
    tx: mpsc::Sender<Error>,
    fatal_sent: Arc<AtomicBool>,
}

impl ErrorReporter {
    pub fn channel(capacity: usize) -> (Self, Errors) {
        let (tx, rx) = mpsc::channel(capacity.max(1) + 1);
        let reporter = Self {
            tx,
            fatal_sent: Arc::new(AtomicBool::new(false)),
        };
        (reporter, rx)
    }

    pub fn report(&self, err: Error) {
        if err.is_fatal() {
            if self.fatal_sent.swap(true, Ordering::SeqCst) {
                debug!(error = %err, "session already failed, dropping report");
                return;
            }
        } else if self.tx.capacity() <= 1 {
            warn!(error = %err, "error channel full, dropping report");
            return;
        }

        match self.tx.try_send(err) {
            Ok(()) => {}
            Err(TrySendError::Full(err)) => {
                warn!(error = %err, "error channel full, dropping report");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Configures a session before it starts. Handlers added here are in place
/// before the first inbound line is read.
pub struct ClientBuilder {
    identity: Arc<dyn Identity>,
    ctcp: CtcpConfig,
    dispatch: DispatchConfig,
    channels: Vec<String>,
    handlers: Vec<(String, Handler)>,
}

impl ClientBuilder {
    pub fn new(identity: impl Identity) -> Self {
        Self {
            identity: Arc::new(identity),
            ctcp: CtcpConfig::default(),
            dispatch: DispatchConfig::default(),
            channels: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Take CTCP, dispatch and auto-join settings from `config`.
    pub fn config(mut self, config: &AppConfig) -> Self {
        self.ctcp = config.ctcp.clone();
        self.dispatch = config.dispatch.clone();
        self.channels = config.server.channels.clone();
        self
    }

    pub fn ctcp(mut self, ctcp: CtcpConfig) -> Self {
        self.ctcp = ctcp;
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Channels to join once the server welcomes us (`001`).
    pub fn channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    pub fn handler<F>(mut self, action: &str, handler: F) -> Self
    where
        F: Fn(&Client, &Message) + Send + Sync + 'static,
    {
        self.handlers.push((action.to_string(), Arc::new(handler)));
        self
    }

    /// Dial `addr` over TCP and start the session.
    pub async fn connect(self, addr: &str) -> Result<(Client, Errors)> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| Error::Connection {
                addr: addr.to_string(),
                source,
            })?;
        info!(%addr, nick = %self.identity.nick(), "connected");
        Ok(self.start(stream))
    }

    /// Start a session over an already established transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S>(self, stream: S) -> (Client, Errors)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (errors, err_rx) = ErrorReporter::channel(self.dispatch.error_capacity);

        let registry = Arc::new(HandlerRegistry::default());
        install_builtins(&registry, &self.channels);
        for (action, handler) in self.handlers {
            registry.add(&action, handler);
        }

        let client = Client {
            inner: Arc::new(Shared {
                identity: self.identity,
                outbound: out_tx,
                handlers: Arc::clone(&registry),
                ctcp: self.ctcp,
                shutdown: CancellationToken::new(),
                done: CancellationToken::new(),
            }),
        };

        // Queued ahead of anything a handler could send.
        if let Err(e) = client.register() {
            warn!(error = %e, "could not queue registration");
        }

        let writer = tokio::spawn(write_loop(
            FramedWrite::new(write_half, LineCodec::new()),
            out_rx,
            client.shutdown_token(),
            errors.clone(),
        ));

        let frames = FramedRead::new(
            read_half,
            LineCodec::with_max_len(self.dispatch.max_line_len),
        );
        let dispatcher = Dispatcher::new(registry, self.dispatch.max_concurrent_handlers);
        let done = client.inner.done.clone();
        let session = client.clone();
        tokio::spawn(async move {
            read_loop(frames, session, dispatcher, errors).await;
            let _ = writer.await;
            done.cancel();
        });

        (client, err_rx)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::irc::identity::User;

    /// A client with no reader or writer; outbound lines land in the
    /// returned receiver.
    pub(crate) fn detached_client() -> (Client, mpsc::UnboundedReceiver<String>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let client = Client {
            inner: Arc::new(Shared {
                identity: Arc::new(User::new("sifr", 0, "sifr test")),
                outbound: out_tx,
                handlers: Arc::new(HandlerRegistry::default()),
                ctcp: CtcpConfig::default(),
                shutdown: CancellationToken::new(),
                done: CancellationToken::new(),
            }),
        };
        (client, out_rx)
    }

    #[tokio::test]
    async fn test_connect_failure_returns_no_session() {
        // Port 1 on localhost is reliably closed in test environments.
        let result = Client::connect("127.0.0.1:1", User::new("sifr", 0, "sifr")).await;
        match result {
            Err(Error::Connection { addr, .. }) => assert_eq!(addr, "127.0.0.1:1"),
            other => panic!("expected connection error, got {:?}", other.map(|(c, _)| c)),
        }
    }

    fn protocol_error() -> Error {
        Error::Protocol(crate::error::ProtocolError::Empty)
    }

    fn read_error() -> Error {
        Error::Read(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))
    }

    #[tokio::test]
    async fn test_error_reporter_never_blocks() {
        let (reporter, mut rx) = ErrorReporter::channel(1);
        reporter.report(protocol_error());
        reporter.report(protocol_error());
        assert!(matches!(rx.recv().await, Some(Error::Protocol(_))));
        assert!(rx.try_recv().is_err());

        drop(rx);
        reporter.report(protocol_error());
        reporter.report(read_error());
    }

    #[tokio::test]
    async fn test_fatal_report_fits_in_full_channel() {
        let (reporter, mut rx) = ErrorReporter::channel(2);
        for _ in 0..5 {
            reporter.report(protocol_error());
        }
        reporter.clone().report(read_error());
        reporter.report(Error::Write(std::io::Error::from(
            std::io::ErrorKind::BrokenPipe,
        )));
        drop(reporter);

        let mut kinds = Vec::new();
        while let Some(err) = rx.recv().await {
            kinds.push(err.is_fatal());
        }
        assert_eq!(kinds, vec![false, false, true]);
    }

    #[test]
    fn test_shutdown_marks_closed() {
        let (client, _outbound) = detached_client();
        assert!(!client.is_closed());
        client.shutdown();
        assert!(client.is_closed());
        assert!(format!("{:?}", client).contains("closed: true"));
    }
}
