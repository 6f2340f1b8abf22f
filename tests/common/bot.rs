//! Bot-side harness: a context with a live reactor thread and an event
//! recorder.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use prebot::config::NetworkConfig;
use prebot::modules::Module;
use prebot::{Connection, Context, EngineSettings, Event, EventBus, ModuleManager, SocketPool};

const PUMP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestBot {
    pub ctx: Context,
    pub modules: ModuleManager,
    events: Arc<Mutex<Vec<Event>>>,
    reactor: Option<JoinHandle<()>>,
}

impl TestBot {
    pub fn new() -> Self {
        Self::with_engine(EngineSettings::default())
    }

    pub fn with_engine(engine: EngineSettings) -> Self {
        let pool = Arc::new(SocketPool::new(Duration::from_millis(20)).expect("poll"));
        let bus = Arc::new(EventBus::new());
        let ctx = Context::new(Arc::clone(&pool), Arc::clone(&bus), engine);
        let reactor = pool.spawn().expect("reactor thread");

        let events = Arc::new(Mutex::new(Vec::new()));
        Self {
            ctx,
            modules: ModuleManager::new(bus),
            events,
            reactor: Some(reactor),
        }
    }

    /// Settings for a network at `127.0.0.1:port`.
    pub fn network(port: u16, nick: &str) -> NetworkConfig {
        NetworkConfig::new("test", "127.0.0.1", port, nick)
    }

    pub fn connection(&self, settings: NetworkConfig) -> Arc<Connection> {
        Connection::new(settings, self.ctx.clone())
    }

    /// Connect on a blocking thread so the test runtime stays free.
    pub async fn connect(&self, irc: &Arc<Connection>) {
        let irc = Arc::clone(irc);
        tokio::task::spawn_blocking(move || irc.connect())
            .await
            .expect("connect task")
            .expect("connect");
    }

    pub fn load(&self, module: impl Module + 'static) {
        self.modules.load(Arc::new(module)).expect("load module");
    }

    /// Start keeping copies of every `event` dispatched from now on.
    pub fn record(&self, event: &str) {
        let sink = Arc::clone(&self.events);
        self.ctx.bus.on(event, "recorder".into(), move |_, e: &Event| {
            sink.lock().push(e.clone());
            Ok(())
        });
    }

    /// Names of the recorded events, in dispatch order.
    pub fn recorded_names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name().into_owned()).collect()
    }

    pub fn recorded(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Drain the bus until `done` holds for the recorded events. Returns
    /// `false` on timeout.
    pub async fn pump_until<F>(&self, mut done: F) -> bool
    where
        F: FnMut(&[Event]) -> bool,
    {
        let deadline = Instant::now() + PUMP_TIMEOUT;
        loop {
            self.ctx.bus.poll();
            if done(&self.events.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Drain the bus until `count` events named `name` were recorded.
    pub async fn pump_for(&self, name: &str, count: usize) -> bool {
        self.pump_until(|events| events.iter().filter(|e| e.name() == name).count() >= count)
            .await
    }

    /// Drain the bus for a fixed period.
    pub async fn settle(&self, dur: Duration) {
        let deadline = Instant::now() + dur;
        while Instant::now() < deadline {
            self.ctx.bus.poll();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.ctx.bus.poll();
    }
}

impl Drop for TestBot {
    fn drop(&mut self) {
        self.ctx.pool.stop();
        if let Some(reactor) = self.reactor.take() {
            let _ = reactor.join();
        }
    }
}
