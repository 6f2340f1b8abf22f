//! Behavior module host.
//!
//! A [`Module`] registers bus handlers from [`Module::init`] through a
//! [`ModuleContext`] that tags every registration with the module's
//! [`Owner`]. Unloading is a single [`EventBus::unregister_all`] call, so a
//! replaced module never leaves stale handlers behind.
//!
//! Lifecycle events, in order:
//!
//! ```text
//! load:    module.loading   → init   → module.loaded
//! unload:  module.unloading → shutdown, unregister_all → module.unloaded
//! reload:  unload sequence, then load sequence on the same instance
//! ```

pub mod builtin;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, HandlerContext, HandlerRef, Owner};
use crate::event::Event;

/// Module host errors.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module '{0}' is already loaded")]
    AlreadyLoaded(String),
    #[error("module '{0}' is not loaded")]
    NotLoaded(String),
    #[error("module '{name}' failed to initialize: {source}")]
    Init {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A unit of bot behavior.
pub trait Module: Send + Sync {
    /// Unique name; also the bus owner of everything the module registers.
    fn name(&self) -> &str;

    /// Register handlers. Called on load and on every reload.
    fn init(&self, ctx: &ModuleContext) -> anyhow::Result<()>;

    /// Called before the module's handlers are removed.
    fn shutdown(&self) {}
}

/// Registration surface handed to [`Module::init`].
pub struct ModuleContext {
    owner: Owner,
    bus: Arc<EventBus<Event>>,
}

impl ModuleContext {
    pub fn new(owner: Owner, bus: Arc<EventBus<Event>>) -> Self {
        Self { owner, bus }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Register a handler that ignores its context.
    pub fn on<F>(&self, event: &str, f: F) -> HandlerRef<Event>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.on(event, self.owner.clone(), move |_, e| f(e))
    }

    /// Register a prepared handler with an optional context.
    pub fn register(&self, event: &str, handler: HandlerRef<Event>, context: Option<HandlerContext>) {
        self.bus.register(event, handler, context, self.owner.clone());
    }

    /// A handle for publishing events from inside handlers. It does not keep
    /// the bus alive, so handlers holding one cannot form a cycle with it.
    pub fn publisher(&self) -> Publisher {
        Publisher(Arc::downgrade(&self.bus))
    }
}

/// Weak publishing handle; see [`ModuleContext::publisher`].
#[derive(Clone)]
pub struct Publisher(Weak<EventBus<Event>>);

impl Publisher {
    /// Queue an event. Returns `false` if the bus is gone.
    pub fn trigger(&self, event: Event) -> bool {
        match self.0.upgrade() {
            Some(bus) => {
                bus.trigger(event);
                true
            }
            None => false,
        }
    }
}

/// Whether a known module currently runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Loaded,
    Unloaded,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loaded => "loaded",
            Self::Unloaded => "unloaded",
        })
    }
}

struct Slot {
    /// Kept after unload so the module can be listed and loaded again.
    module: Arc<dyn Module>,
    status: ModuleStatus,
}

/// Loads, unloads and reloads modules against one bus.
pub struct ModuleManager {
    bus: Arc<EventBus<Event>>,
    modules: Mutex<BTreeMap<String, Slot>>,
}

impl ModuleManager {
    pub fn new(bus: Arc<EventBus<Event>>) -> Self {
        Self {
            bus,
            modules: Mutex::new(BTreeMap::new()),
        }
    }

    /// Initialize and start a module.
    pub fn load(&self, module: Arc<dyn Module>) -> Result<(), ModuleError> {
        let name = module.name().to_owned();
        if self.is_loaded(&name) {
            warn!(module = %name, "module already loaded");
            return Err(ModuleError::AlreadyLoaded(name));
        }

        self.start(&name, &module)?;
        self.modules.lock().insert(
            name,
            Slot {
                module,
                status: ModuleStatus::Loaded,
            },
        );
        Ok(())
    }

    /// Start a previously unloaded module again.
    pub fn load_known(&self, name: &str) -> Result<(), ModuleError> {
        let module = {
            let modules = self.modules.lock();
            match modules.get(name) {
                Some(slot) if slot.status == ModuleStatus::Loaded => {
                    return Err(ModuleError::AlreadyLoaded(name.to_owned()));
                }
                Some(slot) => Arc::clone(&slot.module),
                None => return Err(ModuleError::NotLoaded(name.to_owned())),
            }
        };
        self.load(module)
    }

    /// Stop a module and remove all of its handlers.
    pub fn unload(&self, name: &str) -> Result<(), ModuleError> {
        let module = self.loaded(name)?;
        self.stop(name, &module);
        if let Some(slot) = self.modules.lock().get_mut(name) {
            slot.status = ModuleStatus::Unloaded;
        }
        Ok(())
    }

    /// Unload then load the same instance again.
    pub fn reload(&self, name: &str) -> Result<(), ModuleError> {
        let module = self.loaded(name)?;
        self.stop(name, &module);
        let started = self.start(name, &module);
        if let Some(slot) = self.modules.lock().get_mut(name) {
            slot.status = if started.is_ok() {
                ModuleStatus::Loaded
            } else {
                ModuleStatus::Unloaded
            };
        }
        started
    }

    /// Swap in a new implementation under the same name.
    pub fn replace(&self, module: Arc<dyn Module>) -> Result<(), ModuleError> {
        let name = module.name().to_owned();
        if self.is_loaded(&name) {
            self.unload(&name)?;
        }
        self.modules.lock().remove(&name);
        self.load(module)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules
            .lock()
            .get(name)
            .is_some_and(|slot| slot.status == ModuleStatus::Loaded)
    }

    /// Every known module with its status, sorted by name.
    pub fn list(&self) -> Vec<(String, ModuleStatus)> {
        self.modules
            .lock()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.status))
            .collect()
    }

    /// Unload everything, in reverse name order.
    pub fn unload_all(&self) {
        let loaded: Vec<String> = self
            .list()
            .into_iter()
            .filter(|(_, status)| *status == ModuleStatus::Loaded)
            .map(|(name, _)| name)
            .rev()
            .collect();
        for name in loaded {
            if let Err(e) = self.unload(&name) {
                warn!(module = %name, error = %e, "unload failed");
            }
        }
    }

    fn loaded(&self, name: &str) -> Result<Arc<dyn Module>, ModuleError> {
        match self.modules.lock().get(name) {
            Some(slot) if slot.status == ModuleStatus::Loaded => Ok(Arc::clone(&slot.module)),
            _ => Err(ModuleError::NotLoaded(name.to_owned())),
        }
    }

    fn start(&self, name: &str, module: &Arc<dyn Module>) -> Result<(), ModuleError> {
        debug!(module = %name, "loading module");
        self.bus.trigger(Event::ModuleLoading {
            module: name.to_owned(),
        });

        let owner = Owner::new(name);
        let ctx = ModuleContext::new(owner.clone(), Arc::clone(&self.bus));
        if let Err(source) = module.init(&ctx) {
            let dropped = self.bus.unregister_all(&owner);
            warn!(module = %name, error = %source, dropped, "module init failed");
            return Err(ModuleError::Init {
                name: name.to_owned(),
                source,
            });
        }

        self.bus.trigger(Event::ModuleLoaded {
            module: name.to_owned(),
        });
        info!(module = %name, handlers = self.bus.owned_count(&owner), "loaded module");
        Ok(())
    }

    fn stop(&self, name: &str, module: &Arc<dyn Module>) {
        self.bus.trigger(Event::ModuleUnloading {
            module: name.to_owned(),
        });
        module.shutdown();
        let removed = self.bus.unregister_all(&Owner::new(name));
        self.bus.trigger(Event::ModuleUnloaded {
            module: name.to_owned(),
        });
        info!(module = %name, removed, "unloaded module");
    }
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules", &self.list())
            .finish()
    }
}
