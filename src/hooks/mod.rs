//! Event sources and their subscription registry.
//!
//! A [`Hook`] wraps one long-running observer of an external signal (a
//! subprocess printing lines, the MPD idle protocol, X11 property events)
//! and fans parsed events out to its subscribed callbacks. A [`HookPool`]
//! de-duplicates hooks by configuration so two widgets asking for the same
//! source share a single running instance.

pub mod audio;
pub mod bspwm;
pub mod mpd;
pub mod subprocess;
pub mod xorg;

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    process::Child,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, RwLock, Weak,
    },
    thread::JoinHandle,
    time::Duration,
};

use crate::tools::{split_sleep, StopToken};
use bspwm::MonitorStatus;
use mpd::MpdConfig;

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(0);

pub type CallbackFn = dyn Fn(&Notification) + Send + Sync;

/// A subscriber callback with a stable identity.
///
/// The id is what makes callback-set unions idempotent: merging the same
/// callback into a hook twice keeps a single entry.
#[derive(Clone)]
pub struct Callback {
    id: u64,
    func: Arc<CallbackFn>,
}

impl Callback {
    pub fn new(func: impl Fn(&Notification) + Send + Sync + 'static) -> Self {
        Self {
            id: NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed),
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn call(&self, notification: &Notification) {
        (self.func)(notification);
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback").field("id", &self.id).finish()
    }
}

/// Structured payload of one source event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookEvent {
    /// A raw line from a generic subprocess source.
    Raw(String),
    /// Parsed bspwm report, one record per monitor in report order.
    Bspwm(Vec<MonitorStatus>),
    /// MPD subsystems that changed during an idle cycle.
    Mpd(Vec<String>),
    /// Names of the X atoms whose properties changed.
    Xorg(Vec<String>),
}

/// What subscribers receive. `running` is false while the source is
/// unavailable, so widgets can render a degraded state.
#[derive(Clone, Debug)]
pub struct Notification {
    pub running: bool,
    pub event: HookEvent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    Command,
    Bspwm,
    PulseAudio,
    Mpd,
    Xorg,
}

/// Command and allowed exit codes of a subprocess-backed source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandConfig {
    pub cmd: Vec<String>,
    /// Exit codes that do not count as a failure. Anything else puts the
    /// source in its failure-backoff state.
    pub return_codes: Vec<i32>,
}

impl CommandConfig {
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            return_codes: vec![0],
        }
    }
}

/// Immutable identity of a hook. Compatibility between two hooks is decided
/// purely from this, never from callback membership.
#[derive(Clone, Debug, PartialEq)]
pub enum HookConfig {
    Command(CommandConfig),
    Bspwm(CommandConfig),
    PulseAudio(CommandConfig),
    Mpd(MpdConfig),
    Xorg,
}

impl HookConfig {
    pub fn command<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Command(CommandConfig::new(cmd))
    }

    #[must_use]
    pub fn kind(&self) -> HookKind {
        match self {
            Self::Command(_) => HookKind::Command,
            Self::Bspwm(_) => HookKind::Bspwm,
            Self::PulseAudio(_) => HookKind::PulseAudio,
            Self::Mpd(_) => HookKind::Mpd,
            Self::Xorg => HookKind::Xorg,
        }
    }

    /// Whether two configurations are interchangeable, i.e. subscriptions
    /// to both can share one running hook.
    ///
    /// Sources with fixed commands are always compatible within their kind;
    /// MPD encodes connection parameters so those must match exactly.
    #[must_use]
    pub fn compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Command(a), Self::Command(b)) => a.cmd == b.cmd,
            (Self::Bspwm(_), Self::Bspwm(_))
            | (Self::PulseAudio(_), Self::PulseAudio(_))
            | (Self::Xorg, Self::Xorg) => true,
            (Self::Mpd(a), Self::Mpd(b)) => {
                a.host == b.host && a.port == b.port && a.password == b.password
            }
            _ => false,
        }
    }

    pub(crate) fn command_config(&self) -> Option<&CommandConfig> {
        match self {
            Self::Command(c) | Self::Bspwm(c) | Self::PulseAudio(c) => Some(c),
            _ => None,
        }
    }
}

/// One event source and its subscribers.
pub struct Hook {
    config: HookConfig,
    refresh: Duration,
    failure_refresh: Duration,
    callbacks: Arc<RwLock<Vec<Callback>>>,
    stop: StopToken,
    thread: Mutex<Option<JoinHandle<()>>>,
    child: Arc<Mutex<Option<Child>>>,
}

impl Hook {
    #[must_use]
    pub fn new(config: HookConfig, refresh: Duration, failure_refresh: Duration) -> Self {
        Self {
            config,
            refresh,
            failure_refresh,
            callbacks: Arc::new(RwLock::new(Vec::new())),
            stop: StopToken::new(),
            thread: Mutex::new(None),
            child: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    #[must_use]
    pub fn kind(&self) -> HookKind {
        self.config.kind()
    }

    #[must_use]
    pub fn is_compatible(&self, other: &Hook) -> bool {
        self.config.compatible(&other.config)
    }

    /// Attach a callback, keeping the set unique by callback id.
    pub fn add_callback(&self, callback: Callback) {
        let mut callbacks = write_ignore_poison(&self.callbacks);
        if !callbacks.iter().any(|c| c.id == callback.id) {
            callbacks.push(callback);
        }
    }

    #[must_use]
    pub fn callback_count(&self) -> usize {
        read_ignore_poison(&self.callbacks).len()
    }

    fn seed(&self) -> HookSeed {
        HookSeed {
            config: self.config.clone(),
            callbacks: read_ignore_poison(&self.callbacks).clone(),
            refresh: self.refresh,
            failure_refresh: self.failure_refresh,
        }
    }

    fn from_seed(seed: HookSeed) -> Self {
        let hook = Self::new(seed.config, seed.refresh, seed.failure_refresh);
        *write_ignore_poison(&hook.callbacks) = seed.callbacks;
        hook
    }

    /// Independent hook with the same identity and a copied callback set.
    /// The copy has no running thread of its own.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self::from_seed(self.seed())
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        !self.stop.is_set()
    }

    /// Spawn the run loop on its own thread.
    pub fn start(&self) {
        if self.is_started() {
            tracing::warn!("hook {:?} is already running", self.kind());
            return;
        }

        self.stop.clear();
        let runner = Runner {
            config: self.config.clone(),
            callbacks: Arc::clone(&self.callbacks),
            stop: self.stop.clone(),
            child: Arc::clone(&self.child),
            refresh: self.refresh,
            failure_refresh: self.failure_refresh,
        };

        let spawned = std::thread::Builder::new()
            .name(format!("hook-{:?}", self.kind()))
            .spawn(move || runner.run());
        match spawned {
            Ok(handle) => *lock_ignore_poison(&self.thread) = Some(handle),
            Err(e) => {
                tracing::error!("could not spawn hook {:?}: {e}", self.kind());
                self.stop.set();
            }
        }
    }

    /// Signal the run loop to exit, kill any owned subprocess so a blocking
    /// read is interrupted, and wait for the thread. Idempotent.
    pub fn stop(&self) {
        self.stop.set();
        if let Some(child) = lock_ignore_poison(&self.child).as_mut() {
            let _ = child.kill();
        }
        if let Some(handle) = lock_ignore_poison(&self.thread).take() {
            let _ = handle.join();
        }
    }
}

struct HookSeed {
    config: HookConfig,
    callbacks: Vec<Callback>,
    refresh: Duration,
    failure_refresh: Duration,
}

/// Everything a run loop needs, detached from the [`Hook`] so the loop can
/// live on its own thread while the hook stays reachable for merges.
pub(crate) struct Runner {
    pub(crate) config: HookConfig,
    pub(crate) callbacks: Arc<RwLock<Vec<Callback>>>,
    pub(crate) stop: StopToken,
    pub(crate) child: Arc<Mutex<Option<Child>>>,
    pub(crate) refresh: Duration,
    pub(crate) failure_refresh: Duration,
}

impl Runner {
    fn run(self) {
        match &self.config {
            HookConfig::Command(_) | HookConfig::Bspwm(_) | HookConfig::PulseAudio(_) => {
                subprocess::run(&self);
            }
            HookConfig::Mpd(config) => mpd::run(&self, config),
            HookConfig::Xorg => xorg::run(&self),
        }
    }

    /// Fan one notification out to every subscriber.
    ///
    /// Each callback runs on its own thread so a slow or panicking
    /// subscriber cannot block the source loop or its peers. The trailing
    /// sleep paces the source between two notifications.
    pub(crate) fn notify(&self, notification: &Notification) {
        let callbacks = read_ignore_poison(&self.callbacks).clone();
        for callback in callbacks {
            let n = notification.clone();
            let spawned = std::thread::Builder::new()
                .name("hook-callback".to_string())
                .spawn(move || {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback.call(&n))) {
                        tracing::error!("hook callback panicked: {}", panic_message(&panic));
                    }
                });
            if let Err(e) = spawned {
                tracing::error!("could not dispatch hook callback: {e}");
            }
        }

        if !self.refresh.is_zero() {
            split_sleep(self.refresh, &self.stop);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// Registry of hooks for one owner (widget, screen or panel).
///
/// Pools form a tree mirroring the owner hierarchy: subscriptions and
/// merges propagate to the parent, so a widget's hook is also visible to
/// its screen and panel. Only pools with `listen` set actually run their
/// hooks; the others aggregate subscriptions.
pub struct HookPool {
    listen: bool,
    hooks: Mutex<HashMap<HookKind, Vec<Hook>>>,
    parent: Mutex<Option<Weak<HookPool>>>,
    started: AtomicBool,
}

impl HookPool {
    #[must_use]
    pub fn new(listen: bool) -> Arc<Self> {
        Arc::new(Self {
            listen,
            hooks: Mutex::new(HashMap::new()),
            parent: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    pub fn set_parent(&self, parent: &Arc<HookPool>) {
        *lock_ignore_poison(&self.parent) = Some(Arc::downgrade(parent));
    }

    /// Subscribe `callback` to the source described by `config`.
    ///
    /// An existing compatible hook gains the callback; otherwise a new hook
    /// is registered (and started right away when this pool is already
    /// listening). The subscription then propagates upward.
    pub fn subscribe(
        &self,
        callback: Callback,
        config: HookConfig,
        refresh: Duration,
        failure_refresh: Duration,
    ) {
        self.insert_seed(HookSeed {
            config,
            callbacks: vec![callback],
            refresh,
            failure_refresh,
        });
        self.propagate();
    }

    /// Union every hook of `other` into this pool. Safe to call repeatedly:
    /// compatible hooks only union their callback sets, keyed by id.
    pub fn merge(&self, other: &HookPool) {
        for seed in other.seeds() {
            self.insert_seed(seed);
        }
        self.propagate();
    }

    fn seeds(&self) -> Vec<HookSeed> {
        lock_ignore_poison(&self.hooks)
            .values()
            .flatten()
            .map(Hook::seed)
            .collect()
    }

    fn insert_seed(&self, seed: HookSeed) {
        let mut hooks = lock_ignore_poison(&self.hooks);
        let list = hooks.entry(seed.config.kind()).or_default();
        if let Some(existing) = list.iter().find(|h| h.config.compatible(&seed.config)) {
            for callback in seed.callbacks {
                existing.add_callback(callback);
            }
        } else {
            let hook = Hook::from_seed(seed);
            if self.listen && self.started.load(Ordering::Acquire) {
                hook.start();
            }
            list.push(hook);
        }
    }

    fn propagate(&self) {
        let parent = lock_ignore_poison(&self.parent)
            .as_ref()
            .and_then(Weak::upgrade);
        if let Some(parent) = parent {
            parent.merge(self);
        }
    }

    /// Start every hook not already running. Pools that only aggregate
    /// subscriptions (`listen` unset) never run anything.
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        if !self.listen {
            return;
        }
        for hook in lock_ignore_poison(&self.hooks).values().flatten() {
            if !hook.is_started() {
                hook.start();
            }
        }
    }

    pub fn stop(&self) {
        self.started.store(false, Ordering::Release);
        for hook in lock_ignore_poison(&self.hooks).values().flatten() {
            hook.stop();
            if hook.is_started() {
                tracing::error!("hook {:?} is still running after stop", hook.kind());
            }
        }
    }

    /// Number of registered hooks of `kind`.
    #[must_use]
    pub fn hook_count(&self, kind: HookKind) -> usize {
        lock_ignore_poison(&self.hooks)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Total callbacks across hooks of `kind`.
    #[must_use]
    pub fn callback_count(&self, kind: HookKind) -> usize {
        lock_ignore_poison(&self.hooks)
            .get(&kind)
            .map_or(0, |hooks| hooks.iter().map(Hook::callback_count).sum())
    }
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read_ignore_poison<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_ignore_poison<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
