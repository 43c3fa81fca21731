/// `scripting/engine.rs` - Script host lifecycle
///
/// `ScriptHost` owns the script thread. `init` resets the bridge and starts
/// the thread; the thread boots the VM and runs the event loop until it
/// pulls `Stop`. `shutdown` sends `Stop` and joins. Producers may signal
/// through the host or through a cloned `bridge()` handle from any thread.
use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{
    api::{AlertStyle, HostCapabilities},
    runtime::ScriptRuntime,
};
use crate::{
    bridge::{Event, EventBridge},
    config::HostConfig,
    error::{HostError, Result},
};

// ── Host state ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    NotStarted,
    Booting,
    Running,
    Stopped,
}

impl HostState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Booting,
            2 => Self::Running,
            3 => Self::Stopped,
            _ => Self::NotStarted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Booting => 1,
            Self::Running => 2,
            Self::Stopped => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Booting => "booting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Shared between the host handle and the script thread.
pub(crate) struct HostContext {
    pub(crate) config: HostConfig,
    pub(crate) bridge: Arc<EventBridge>,
    pub(crate) capabilities: Arc<dyn HostCapabilities>,
    state: AtomicU8,
}

impl HostContext {
    fn state(&self) -> HostState {
        HostState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: HostState) {
        log::debug!("Script host -> {}", state.as_str());
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Log a script failure and, if configured, raise an alert with the
    /// underlying diagnostic.
    pub(crate) fn report(&self, style: AlertStyle, what: &str, err: &dyn Display) {
        let message = format!("{what}: {err}");
        log::error!("{message}");
        if self.config.alert_on_error {
            self.capabilities.alert(false, style, &message);
        }
    }
}

/// Marks the host stopped and closes the bridge on every exit path of the
/// script thread, panics included.
struct StoppedGuard<'a>(&'a HostContext);

impl Drop for StoppedGuard<'_> {
    fn drop(&mut self) {
        self.0.bridge.close();
        self.0.set_state(HostState::Stopped);
    }
}

fn script_thread(ctx: Arc<HostContext>) {
    let _stopped = StoppedGuard(&ctx);
    ctx.set_state(HostState::Booting);

    let runtime = match ScriptRuntime::boot(Arc::clone(&ctx)) {
        Ok(rt) => rt,
        Err(e) => {
            ctx.report(AlertStyle::Critical, "Failed to run Lua bootstrap", &e);
            return;
        }
    };

    ctx.set_state(HostState::Running);
    log::info!("Script thread running (entry module '{}')", ctx.config.entry_module);
    runtime.run();
    log::info!("Script thread stopped");
}

// ── ScriptHost ────────────────────────────────────────────────────────────────

pub struct ScriptHost {
    ctx: Arc<HostContext>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ScriptHost {
    pub fn new(config: HostConfig, capabilities: Arc<dyn HostCapabilities>) -> Self {
        Self {
            ctx: Arc::new(HostContext {
                config,
                bridge: Arc::new(EventBridge::closed()),
                capabilities,
                state: AtomicU8::new(HostState::NotStarted.as_u8()),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Reset the bridge and start the script thread.
    ///
    /// Does nothing while a script thread is alive. A thread that already
    /// exited (boot failure) is reaped first, so `init` can restart it.
    pub fn init(&self) -> Result<()> {
        let mut slot = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            log::warn!("Script host already running, ignoring init");
            return Ok(());
        }
        if let Some(old) = slot.take() {
            if old.join().is_err() {
                log::error!("Previous script thread panicked");
            }
        }

        self.ctx.bridge.reset();
        self.ctx.set_state(HostState::NotStarted);
        // Open before spawning so events sent right after init are kept.
        self.ctx.bridge.open();

        let ctx = Arc::clone(&self.ctx);
        let handle = thread::Builder::new()
            .name(self.ctx.config.thread_name.clone())
            .spawn(move || script_thread(ctx))
            .map_err(|e| {
                self.ctx.bridge.close();
                HostError::Spawn(e)
            })?;

        *slot = Some(handle);
        Ok(())
    }

    /// Send `Stop` and join the script thread. No-op when not started.
    ///
    /// Returns after at most one wait interval plus whatever script is
    /// running when `Stop` arrives.
    pub fn shutdown(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        log::info!("Stopping script thread");
        self.ctx.bridge.signal(Event::Stop);
        if handle.join().is_err() {
            log::error!("Script thread panicked");
        }
    }

    pub fn state(&self) -> HostState {
        self.ctx.state()
    }

    /// Poll until the host reaches `target` or `timeout` passes.
    pub fn wait_for_state(&self, target: HostState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state() == target {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.ctx.config
    }

    /// Producer handle that outlives borrows of the host.
    pub fn bridge(&self) -> Arc<EventBridge> {
        Arc::clone(&self.ctx.bridge)
    }

    // ── Producer API ──────────────────────────────────────────────────────

    pub fn signal(&self, event: Event) {
        self.ctx.bridge.signal(event);
    }

    pub fn signal_kind(&self, id: u16, payload: Option<String>) {
        self.ctx.bridge.signal_kind(id, payload);
    }

    /// Fire-and-forget: failures surface only through logs and alerts.
    pub fn evaluate(&self, script: &str) {
        self.ctx.bridge.evaluate(script);
    }

    pub fn post_frame(&self) {
        self.ctx.bridge.post_frame();
    }

    pub fn enable_event(&self, id: u16) {
        self.ctx.bridge.enable(id);
    }

    pub fn disable_event(&self, id: u16) {
        self.ctx.bridge.disable(id);
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}
