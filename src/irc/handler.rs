//! Handler registry and concurrent dispatch.
//!
//! Handlers are grouped by upper-cased action. Every parsed message launches
//! each handler of its bucket as an independent invocation on the blocking
//! pool; the reader does not wait for them, but it does wait for a permit
//! once `max_concurrent_handlers` invocations are in flight.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, trace, warn};

use crate::irc::client::Client;
use crate::irc::ctcp;
use crate::irc::message::Message;

/// A message handler. Invocations may run concurrently with each other.
pub type Handler = Arc<dyn Fn(&Client, &Message) + Send + Sync + 'static>;

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    buckets: RwLock<HashMap<String, Vec<Handler>>>,
}

impl HandlerRegistry {
    pub fn add(&self, action: &str, handler: Handler) {
        self.buckets
            .write()
            .entry(action.to_ascii_uppercase())
            .or_default()
            .push(handler);
    }

    /// Snapshot of the handlers registered for `action`, in insertion order.
    pub fn lookup(&self, action: &str) -> Vec<Handler> {
        self.buckets
            .read()
            .get(&action.to_ascii_uppercase())
            .cloned()
            .unwrap_or_default()
    }
}

/// Install the handlers every session starts with.
pub(crate) fn install_builtins(registry: &HandlerRegistry, channels: &[String]) {
    registry.add(
        "PING",
        Arc::new(|client: &Client, msg: &Message| {
            if let Err(e) = client.pong(&msg.body) {
                debug!(error = %e, "could not answer PING");
            }
        }),
    );

    registry.add("PRIVMSG", Arc::new(privmsg_default));

    if !channels.is_empty() {
        let channels = channels.to_vec();
        registry.add(
            "001",
            Arc::new(move |client: &Client, _msg: &Message| {
                for channel in &channels {
                    if let Err(e) = client.join(channel, "") {
                        warn!(%channel, error = %e, "auto-join failed");
                        return;
                    }
                }
            }),
        );
    }
}

fn privmsg_default(client: &Client, msg: &Message) {
    if msg.is_ctcp() && client.identity().is_msg_for_me(msg) {
        respond_ctcp(client, msg);
    }
    // Ordinary PRIVMSG handling belongs to handlers added by the caller.
}

fn respond_ctcp(client: &Client, msg: &Message) {
    let payload = ctcp::dequote(&msg.body);
    match ctcp::reply_for(payload, client.ctcp_config()) {
        Some(reply) => {
            debug!(to = %msg.from, %reply, "answering CTCP request");
            if let Err(e) = client.ctcp_reply(&msg.from, &reply) {
                debug!(error = %e, "could not answer CTCP request");
            }
        }
        None => debug!(from = %msg.from, %payload, "ignoring CTCP request"),
    }
}

pub(crate) struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, max_concurrent: usize) -> Self {
        Self {
            registry,
            permits: Arc::new(Semaphore::new(max_concurrent.clamp(1, Semaphore::MAX_PERMITS))),
            tasks: JoinSet::new(),
        }
    }

    /// Launch every handler registered for `msg.action`. Does not wait for
    /// them to finish.
    pub async fn dispatch(&mut self, client: &Client, msg: Message) {
        // Reap finished invocations so the set does not grow without bound.
        while self.tasks.try_join_next().is_some() {}

        let handlers = self.registry.lookup(&msg.action);
        if handlers.is_empty() {
            trace!(action = %msg.action, "no handlers");
            return;
        }

        let shutdown = client.shutdown_token();
        let msg = Arc::new(msg);
        for handler in handlers {
            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => permit,
                _ = shutdown.cancelled() => {
                    debug!(action = %msg.action, "shutdown while waiting for a handler slot");
                    return;
                }
            };
            let Ok(permit) = permit else {
                return;
            };
            let client = client.clone();
            let msg = Arc::clone(&msg);

            self.tasks.spawn_blocking(move || {
                let _permit = permit;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&client, msg.as_ref())));
                if let Err(payload) = outcome {
                    error!(
                        action = %msg.action,
                        panic = panic_message(payload.as_ref()),
                        "message handler panicked"
                    );
                }
            });
        }
    }

    /// Wait for every in-flight invocation.
    pub async fn drain(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn noop() -> Handler {
        Arc::new(|_: &Client, _: &Message| {})
    }

    #[test]
    fn test_registration_is_case_insensitive() {
        let registry = HandlerRegistry::default();
        registry.add("ping", noop());
        registry.add("Ping", noop());

        assert_eq!(registry.lookup("PING").len(), 2);
        assert_eq!(registry.lookup("ping").len(), 2);
        assert!(registry.buckets.read().keys().all(|k| k == "PING"));
    }

    #[test]
    fn test_unknown_action_is_empty() {
        let registry = HandlerRegistry::default();
        assert!(registry.lookup("KICK").is_empty());
    }

    #[test]
    fn test_bucket_keeps_insertion_order() {
        let registry = HandlerRegistry::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let seen = Arc::clone(&seen);
            registry.add(
                "PRIVMSG",
                Arc::new(move |_: &Client, _: &Message| seen.lock().unwrap().push(i)),
            );
        }

        let (client, _outbound) = crate::irc::client::tests::detached_client();
        let msg = Message::parse(":a!b@c PRIVMSG #x :hi").unwrap();
        for handler in registry.lookup("PRIVMSG") {
            handler(&client, &msg);
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_builtins() {
        let registry = HandlerRegistry::default();
        install_builtins(&registry, &[]);
        assert_eq!(registry.lookup("PING").len(), 1);
        assert_eq!(registry.lookup("PRIVMSG").len(), 1);
        assert!(registry.lookup("001").is_empty());

        install_builtins(&registry, &["#rust".to_string()]);
        assert_eq!(registry.lookup("001").len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_survives_panicking_handler() {
        let registry = Arc::new(HandlerRegistry::default());
        let calls = Arc::new(AtomicUsize::new(0));
        registry.add("NOTICE", Arc::new(|_: &Client, _: &Message| panic!("boom")));
        {
            let calls = Arc::clone(&calls);
            registry.add(
                "NOTICE",
                Arc::new(move |_: &Client, _: &Message| {
                    calls.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        let (client, _outbound) = crate::irc::client::tests::detached_client();
        let mut dispatcher = Dispatcher::new(Arc::clone(&registry), 2);
        for _ in 0..3 {
            let msg = Message::parse(":srv NOTICE me :hello").unwrap();
            dispatcher.dispatch(&client, msg).await;
        }
        dispatcher.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dispatch_respects_concurrency_cap() {
        let registry = Arc::new(HandlerRegistry::default());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            registry.add(
                "PRIVMSG",
                Arc::new(move |_: &Client, _: &Message| {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                }),
            );
        }

        let (client, _outbound) = crate::irc::client::tests::detached_client();
        let mut dispatcher = Dispatcher::new(Arc::clone(&registry), 2);
        for _ in 0..8 {
            let msg = Message::parse(":a!b@c PRIVMSG #x :hi").unwrap();
            dispatcher.dispatch(&client, msg).await;
        }
        dispatcher.drain().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_wait_for_slot() {
        let registry = Arc::new(HandlerRegistry::default());
        let gate = Arc::new(std::sync::Barrier::new(2));
        {
            let gate = Arc::clone(&gate);
            registry.add(
                "PRIVMSG",
                Arc::new(move |_: &Client, _: &Message| {
                    gate.wait();
                }),
            );
        }

        let (client, _outbound) = crate::irc::client::tests::detached_client();
        let mut dispatcher = Dispatcher::new(Arc::clone(&registry), 1);
        let msg = Message::parse(":a!b@c PRIVMSG #x :hi").unwrap();
        dispatcher.dispatch(&client, msg.clone()).await;

        // The only slot is held by the blocked handler.
        client.shutdown();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            dispatcher.dispatch(&client, msg),
        )
        .await
        .expect("dispatch kept waiting after shutdown");

        tokio::task::spawn_blocking(move || {
            gate.wait();
        })
        .await
        .unwrap();
        dispatcher.drain().await;
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
