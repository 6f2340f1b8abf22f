//! Publish/subscribe event bus.
//!
//! Handlers register against an event name under an [`Owner`]. Producers
//! [`trigger`](EventBus::trigger) events into a pending queue; the main cycle
//! drains it with [`poll`](EventBus::poll):
//!
//! 1. the pending queue is swapped out, so events triggered by handlers land
//!    in the next cycle
//! 2. events are dispatched in FIFO order
//! 3. for each event the handler list is snapshotted and every handler runs
//!    in registration order
//! 4. a handler error or panic is logged against its owner and dispatch
//!    moves on
//!
//! [`unregister_all`](EventBus::unregister_all) removes everything an owner
//! registered, which is how modules are unloaded.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{error, trace, warn};

use crate::telemetry::spans;

/// Something that can travel over the bus.
pub trait BusEvent: Send + Sync + 'static {
    /// Name handlers register against.
    fn name(&self) -> Cow<'_, str>;
}

/// Opaque per-registration data handed back to the handler.
pub type HandlerContext = Arc<dyn Any + Send + Sync>;

/// An event consumer.
pub trait Handler<E>: Send + Sync + 'static {
    fn handle(&self, context: Option<&HandlerContext>, event: &E) -> anyhow::Result<()>;
}

impl<E, F> Handler<E> for F
where
    F: Fn(Option<&HandlerContext>, &E) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, context: Option<&HandlerContext>, event: &E) -> anyhow::Result<()> {
        self(context, event)
    }
}

/// Shared handler reference; identity is the pointer.
pub type HandlerRef<E> = Arc<dyn Handler<E>>;

/// Identity of whoever registered a handler, usually a module name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Owner(Arc<str>);

impl Owner {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Owner {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Registration<E> {
    handler: HandlerRef<E>,
    context: Option<HandlerContext>,
    owner: Owner,
}

impl<E> Clone for Registration<E> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            context: self.context.clone(),
            owner: self.owner.clone(),
        }
    }
}

struct Registry<E> {
    handlers: HashMap<String, Vec<Registration<E>>>,
    owners: HashMap<Owner, Vec<(String, HandlerRef<E>)>>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            owners: HashMap::new(),
        }
    }
}

fn same_handler<E>(a: &HandlerRef<E>, b: &HandlerRef<E>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl<E> Registry<E> {
    fn forget_owned(&mut self, owner: &Owner, event: &str, handler: &HandlerRef<E>) {
        if let Some(owned) = self.owners.get_mut(owner) {
            owned.retain(|(name, h)| !(name == event && same_handler(h, handler)));
            if owned.is_empty() {
                self.owners.remove(owner);
            }
        }
    }
}

/// The bus. Cheap to share behind an `Arc`.
pub struct EventBus<E> {
    registry: Mutex<Registry<E>>,
    pending: Mutex<Vec<E>>,
    notify: Notify,
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            pending: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    /// Register `handler` for `event`. Registering the same handler for the
    /// same event again replaces its context and owner instead of adding a
    /// second delivery.
    pub fn register(
        &self,
        event: &str,
        handler: HandlerRef<E>,
        context: Option<HandlerContext>,
        owner: Owner,
    ) {
        let mut registry = self.registry.lock();
        let list = registry.handlers.entry(event.to_owned()).or_default();

        let previous_owner = match list.iter_mut().find(|r| same_handler(&r.handler, &handler)) {
            Some(existing) => {
                existing.context = context;
                Some(std::mem::replace(&mut existing.owner, owner.clone()))
            }
            None => {
                list.push(Registration {
                    handler: Arc::clone(&handler),
                    context,
                    owner: owner.clone(),
                });
                None
            }
        };

        if let Some(previous) = previous_owner {
            registry.forget_owned(&previous, event, &handler);
        }
        registry
            .owners
            .entry(owner.clone())
            .or_default()
            .push((event.to_owned(), handler));
        trace!(event, %owner, "handler registered");
    }

    /// Wrap a closure and register it. The returned reference can be passed
    /// to [`unregister`](EventBus::unregister).
    pub fn on<F>(&self, event: &str, owner: Owner, f: F) -> HandlerRef<E>
    where
        F: Fn(Option<&HandlerContext>, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: HandlerRef<E> = Arc::new(f);
        self.register(event, Arc::clone(&handler), None, owner);
        handler
    }

    /// Remove one (event, handler) pair. Returns whether it was registered.
    pub fn unregister(&self, event: &str, handler: &HandlerRef<E>) -> bool {
        let mut registry = self.registry.lock();
        let Some(list) = registry.handlers.get_mut(event) else {
            return false;
        };
        let Some(index) = list.iter().position(|r| same_handler(&r.handler, handler)) else {
            return false;
        };

        let removed = list.remove(index);
        if list.is_empty() {
            registry.handlers.remove(event);
        }
        registry.forget_owned(&removed.owner, event, handler);
        true
    }

    /// Remove every handler registered by `owner`. Returns how many went.
    pub fn unregister_all(&self, owner: &Owner) -> usize {
        let mut registry = self.registry.lock();
        let Some(owned) = registry.owners.remove(owner) else {
            return 0;
        };

        let mut removed = 0;
        for (event, handler) in &owned {
            if let Some(list) = registry.handlers.get_mut(event) {
                let before = list.len();
                list.retain(|r| !same_handler(&r.handler, handler));
                removed += before - list.len();
                if list.is_empty() {
                    registry.handlers.remove(event);
                }
            }
        }
        trace!(%owner, removed, "owner unregistered");
        removed
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.registry
            .lock()
            .handlers
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Number of handlers `owner` currently has registered.
    pub fn owned_count(&self, owner: &Owner) -> usize {
        self.registry.lock().owners.get(owner).map_or(0, Vec::len)
    }

    /// Queue an event for the next [`poll`](EventBus::poll). Never blocks on
    /// dispatch, so it is safe to call from inside a handler.
    pub fn trigger(&self, event: E) {
        self.pending.lock().push(event);
        self.notify.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Dispatch every event queued before this call. Returns the number of
    /// events dispatched.
    pub fn poll(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.lock());
        let count = batch.len();

        for event in batch {
            let name = event.name();
            let snapshot: Vec<Registration<E>> = self
                .registry
                .lock()
                .handlers
                .get(name.as_ref())
                .cloned()
                .unwrap_or_default();
            if snapshot.is_empty() {
                continue;
            }

            let _span = spans::dispatch(&name, snapshot.len()).entered();
            for registration in &snapshot {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    registration
                        .handler
                        .handle(registration.context.as_ref(), &event)
                }));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(owner = %registration.owner, event = %name, error = %e, "handler failed");
                    }
                    Err(_) => {
                        error!(owner = %registration.owner, event = %name, "handler panicked");
                    }
                }
            }
        }
        count
    }

    /// Wait until an event is pending, [`wake`](EventBus::wake) is called or
    /// `timeout` elapses. Returns `false` on timeout.
    pub async fn wait(&self, timeout: Duration) -> bool {
        if self.pending() > 0 {
            return true;
        }
        tokio::time::timeout(timeout, self.notify.notified())
            .await
            .is_ok()
    }

    /// Dispatch events as they arrive until `shutdown` completes. The same
    /// `shutdown` future is polled on every pass.
    pub async fn run_until<F: Future>(&self, timeout: Duration, shutdown: F) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => return,
                _ = self.wait(timeout) => {
                    self.poll();
                }
            }
        }
    }

    /// Release a pending or future [`wait`](EventBus::wait).
    pub fn wake(&self) {
        self.notify.notify_one();
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("EventBus")
            .field("events", &registry.handlers.len())
            .field("owners", &registry.owners.len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}
