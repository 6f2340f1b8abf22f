//! Socket pool: readiness multiplexing over many non-blocking sockets.
//!
//! The pool owns every registered [`TcpStream`] together with its outbound
//! [`WriteQueue`] and inbound [`LineBuffer`]. One [`SocketPool::poll`] pass
//! waits for readiness, then, per ready socket:
//!
//! ```text
//!   error       ──► on_other
//!   readable    ──► on_readable   (callback drains lines via read_line)
//!   writable    ──► flush queue, or on_writable when the queue is empty
//! ```
//!
//! and finally flushes every queue that still holds data. mio reports
//! writability only on edges, so the pool keeps a level view on top: a
//! socket with an `on_writable` callback, an empty queue and no blocked
//! flush counts as write-ready on every pass, and a pass with such a socket
//! does not wait. Producers on other
//! threads call [`SocketPool::enqueue_write`], which wakes the poller so the
//! bytes go out on the next pass.
//!
//! Callbacks run with the socket table unlocked so they can call back into
//! the pool. A panicking callback is caught and logged; the poll pass carries
//! on with the next socket.

mod socket;

pub use socket::{FlushState, WriteQueue, fill_from};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use parking_lot::Mutex;
use prebot_proto::LineBuffer;
use tracing::{debug, error, trace, warn};

use crate::error::ReactorError;

const WAKE_TOKEN: Token = Token(usize::MAX);
const EVENT_CAPACITY: usize = 256;

/// Opaque identifier of a pooled socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketHandle(usize);

impl SocketHandle {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }

    fn token(self) -> Token {
        Token(self.0)
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Readiness callback. Receives the pool so it can read lines or enqueue
/// writes for its own handle.
pub type Callback = Arc<dyn Fn(&SocketPool, SocketHandle) + Send + Sync>;

/// The callbacks attached to one socket.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_readable: Option<Callback>,
    on_writable: Option<Callback>,
    on_other: Option<Callback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the socket has bytes (or EOF) to read.
    pub fn on_readable<F>(mut self, f: F) -> Self
    where
        F: Fn(&SocketPool, SocketHandle) + Send + Sync + 'static,
    {
        self.on_readable = Some(Arc::new(f));
        self
    }

    /// Called on every pass while the socket is writable and its queue is
    /// empty.
    pub fn on_writable<F>(mut self, f: F) -> Self
    where
        F: Fn(&SocketPool, SocketHandle) + Send + Sync + 'static,
    {
        self.on_writable = Some(Arc::new(f));
        self
    }

    /// Called on socket errors, including failed flushes.
    pub fn on_other<F>(mut self, f: F) -> Self
    where
        F: Fn(&SocketPool, SocketHandle) + Send + Sync + 'static,
    {
        self.on_other = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_readable", &self.on_readable.is_some())
            .field("on_writable", &self.on_writable.is_some())
            .field("on_other", &self.on_other.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Readable,
    Writable,
    Other,
}

impl Slot {
    fn label(self) -> &'static str {
        match self {
            Slot::Readable => "readable",
            Slot::Writable => "writable",
            Slot::Other => "other",
        }
    }

    fn pick(self, callbacks: &Callbacks) -> Option<Callback> {
        match self {
            Slot::Readable => callbacks.on_readable.clone(),
            Slot::Writable => callbacks.on_writable.clone(),
            Slot::Other => callbacks.on_other.clone(),
        }
    }
}

struct PooledSocket {
    stream: TcpStream,
    callbacks: Callbacks,
    queue: WriteQueue,
    inbound: LineBuffer,
    /// The last flush stopped on `WouldBlock`; cleared by a writable edge.
    write_blocked: bool,
}

impl PooledSocket {
    fn flush(&mut self) -> io::Result<()> {
        let state = self.queue.flush_into(&mut self.stream)?;
        self.write_blocked = state == FlushState::Blocked;
        Ok(())
    }

    fn wants_writable(&self) -> bool {
        self.callbacks.on_writable.is_some() && self.queue.is_empty() && !self.write_blocked
    }
}

struct Poller {
    poll: Poll,
    events: Events,
}

struct Readiness {
    handle: SocketHandle,
    readable: bool,
    writable: bool,
    error: bool,
}

/// A set of non-blocking sockets multiplexed by one poller.
pub struct SocketPool {
    poller: Mutex<Poller>,
    registry: Registry,
    waker: Waker,
    sockets: Mutex<HashMap<SocketHandle, PooledSocket>>,
    next_handle: AtomicUsize,
    stop_requested: AtomicBool,
    poll_timeout: Duration,
}

impl SocketPool {
    /// Create an empty pool. `poll_timeout` bounds each wait in [`run`].
    ///
    /// [`run`]: SocketPool::run
    pub fn new(poll_timeout: Duration) -> Result<Self, ReactorError> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        Ok(Self {
            poller: Mutex::new(Poller {
                poll,
                events: Events::with_capacity(EVENT_CAPACITY),
            }),
            registry,
            waker,
            sockets: Mutex::new(HashMap::new()),
            next_handle: AtomicUsize::new(0),
            stop_requested: AtomicBool::new(false),
            poll_timeout,
        })
    }

    /// Take ownership of a connected, non-blocking stream and start
    /// multiplexing it. Ownership guarantees one handle per descriptor; use
    /// [`update`](SocketPool::update) to replace callbacks later.
    pub fn add(&self, mut stream: TcpStream, callbacks: Callbacks) -> Result<SocketHandle, ReactorError> {
        let handle = SocketHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.registry
            .register(&mut stream, handle.token(), Interest::READABLE | Interest::WRITABLE)?;

        debug!(%handle, ?callbacks, "socket added to pool");
        self.sockets.lock().insert(
            handle,
            PooledSocket {
                stream,
                callbacks,
                queue: WriteQueue::default(),
                inbound: LineBuffer::new(),
                write_blocked: false,
            },
        );
        Ok(handle)
    }

    /// Replace the callbacks of an existing socket.
    pub fn update(&self, handle: SocketHandle, callbacks: Callbacks) -> Result<(), ReactorError> {
        let mut sockets = self.sockets.lock();
        let socket = sockets
            .get_mut(&handle)
            .ok_or(ReactorError::UnknownHandle(handle))?;
        socket.callbacks = callbacks;
        Ok(())
    }

    /// Stop multiplexing a socket and hand it back without closing it.
    /// Unsent queued bytes are discarded.
    pub fn remove(&self, handle: SocketHandle) -> Result<TcpStream, ReactorError> {
        let mut socket = self
            .sockets
            .lock()
            .remove(&handle)
            .ok_or(ReactorError::UnknownHandle(handle))?;
        if let Err(e) = self.registry.deregister(&mut socket.stream) {
            debug!(%handle, error = %e, "deregister failed");
        }
        Ok(socket.stream)
    }

    /// Remove and close a socket, dropping its write queue. Returns whether
    /// the handle was known.
    pub fn close(&self, handle: SocketHandle) -> bool {
        match self.remove(handle) {
            Ok(stream) => {
                if let Err(e) = stream.shutdown(std::net::Shutdown::Both) {
                    trace!(%handle, error = %e, "shutdown on close failed");
                }
                debug!(%handle, "socket closed");
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, handle: SocketHandle) -> bool {
        self.sockets.lock().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.sockets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.lock().is_empty()
    }

    /// Bytes queued for `handle` and not yet accepted by the socket.
    pub fn pending_writes(&self, handle: SocketHandle) -> Option<usize> {
        self.sockets
            .lock()
            .get(&handle)
            .map(|s| s.queue.pending_bytes())
    }

    /// Append bytes to the socket's write queue and wake the poller.
    pub fn enqueue_write(&self, handle: SocketHandle, data: impl Into<Vec<u8>>) -> Result<(), ReactorError> {
        {
            let mut sockets = self.sockets.lock();
            let socket = sockets
                .get_mut(&handle)
                .ok_or(ReactorError::UnknownHandle(handle))?;
            socket.queue.push(data.into());
        }
        self.wake();
        Ok(())
    }

    /// Pull one line out of the socket's buffer, reading from the socket if
    /// no complete line is buffered. `Ok(None)` means no full line is
    /// available without blocking.
    ///
    /// Overlong lines are logged and skipped.
    pub fn read_line(&self, handle: SocketHandle) -> Result<Option<String>, ReactorError> {
        let mut sockets = self.sockets.lock();
        let socket = sockets
            .get_mut(&handle)
            .ok_or(ReactorError::UnknownHandle(handle))?;

        loop {
            match socket.inbound.next_line() {
                Ok(Some(line)) => return Ok(Some(line)),
                Ok(None) => {}
                Err(e) => {
                    warn!(%handle, error = %e, "discarding inbound line");
                    continue;
                }
            }
            if !fill_from(&mut socket.stream, &mut socket.inbound)? {
                return Ok(None);
            }
        }
    }

    /// Interrupt a blocked [`poll`](SocketPool::poll).
    pub fn wake(&self) {
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "failed to wake reactor");
        }
    }

    /// One multiplexing pass. Returns the number of sockets that saw
    /// readiness.
    pub fn poll(&self, timeout: Option<Duration>) -> Result<usize, ReactorError> {
        let mut poller = self.poller.lock();
        let Poller { poll, events } = &mut *poller;

        let timeout = if self.level_writable().is_empty() {
            timeout
        } else {
            Some(Duration::ZERO)
        };

        match poll.poll(events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(e.into()),
        }

        let ready: Vec<Readiness> = events
            .iter()
            .filter(|event| event.token() != WAKE_TOKEN)
            .map(|event| Readiness {
                handle: SocketHandle(event.token().0),
                readable: event.is_readable() || event.is_read_closed(),
                writable: event.is_writable(),
                error: event.is_error(),
            })
            .collect();

        let mut wrote: Vec<SocketHandle> = Vec::new();
        for r in &ready {
            trace!(handle = %r.handle, readable = r.readable, writable = r.writable, error = r.error, "readiness");
            if r.error {
                self.dispatch(r.handle, Slot::Other);
            }
            if r.readable {
                self.dispatch(r.handle, Slot::Readable);
            }
            if r.writable && self.flush(r.handle) == Some(true) {
                self.dispatch(r.handle, Slot::Writable);
                wrote.push(r.handle);
            }
        }

        self.flush_pending();

        for handle in self.level_writable() {
            if !wrote.contains(&handle) {
                self.dispatch(handle, Slot::Writable);
            }
        }
        Ok(ready.len())
    }

    /// Run [`poll`](SocketPool::poll) until [`stop`](SocketPool::stop).
    pub fn run(&self) {
        debug!(timeout = ?self.poll_timeout, "reactor loop started");
        while !self.stop_requested.load(Ordering::Acquire) {
            if let Err(e) = self.poll(Some(self.poll_timeout)) {
                error!(error = %e, "reactor poll failed");
                thread::sleep(self.poll_timeout);
            }
        }
        debug!("reactor loop stopped");
    }

    /// Ask [`run`](SocketPool::run) to return after the current pass.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.wake();
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Run the loop on a dedicated thread named `reactor`.
    pub fn spawn(self: &Arc<Self>) -> io::Result<JoinHandle<()>> {
        let pool = Arc::clone(self);
        thread::Builder::new()
            .name("reactor".into())
            .spawn(move || pool.run())
    }

    fn dispatch(&self, handle: SocketHandle, slot: Slot) {
        let callback = {
            let sockets = self.sockets.lock();
            match sockets.get(&handle) {
                Some(socket) => slot.pick(&socket.callbacks),
                None => return,
            }
        };

        match callback {
            Some(cb) => self.invoke(handle, slot, &cb),
            None if matches!(slot, Slot::Other) => {
                warn!(%handle, "socket error with no handler, closing");
                self.close(handle);
            }
            None => {}
        }
    }

    fn invoke(&self, handle: SocketHandle, slot: Slot, cb: &Callback) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| cb(self, handle)));
        if result.is_err() {
            error!(%handle, callback = slot.label(), "socket callback panicked");
        }
    }

    /// Flush one socket. Returns `Some(true)` if its queue was already empty,
    /// `Some(false)` if bytes were pending, `None` if the handle is gone or
    /// the flush failed.
    fn flush(&self, handle: SocketHandle) -> Option<bool> {
        let outcome = {
            let mut sockets = self.sockets.lock();
            let socket = sockets.get_mut(&handle)?;
            socket.write_blocked = false;
            if socket.queue.is_empty() {
                return Some(true);
            }
            socket.flush()
        };

        match outcome {
            Ok(_) => Some(false),
            Err(e) => {
                self.write_failed(handle, e);
                None
            }
        }
    }

    fn flush_pending(&self) {
        let failed: Vec<(SocketHandle, io::Error)> = {
            let mut sockets = self.sockets.lock();
            sockets
                .iter_mut()
                .filter(|(_, socket)| !socket.queue.is_empty())
                .filter_map(|(handle, socket)| socket.flush().err().map(|e| (*handle, e)))
                .collect()
        };

        for (handle, e) in failed {
            self.write_failed(handle, e);
        }
    }

    /// Sockets that are write-ready without a fresh edge.
    fn level_writable(&self) -> Vec<SocketHandle> {
        self.sockets
            .lock()
            .iter()
            .filter(|(_, socket)| socket.wants_writable())
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn write_failed(&self, handle: SocketHandle, e: io::Error) {
        warn!(%handle, error = %e, "write failed, dropping queue");
        if let Some(socket) = self.sockets.lock().get_mut(&handle) {
            socket.queue.clear();
        }
        self.dispatch(handle, Slot::Other);
    }
}

impl fmt::Debug for SocketPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketPool")
            .field("sockets", &self.len())
            .field("poll_timeout", &self.poll_timeout)
            .field("stopping", &self.is_stopping())
            .finish()
    }
}
