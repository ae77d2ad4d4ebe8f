use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use crate::{
    error::{Error, Result},
    sink::{Bar, BarConfig},
    tools::{split_sleep, StopToken},
};

/// Bounded entry gate in front of a draw.
///
/// Two slots are enough: one caller drawing, one queued behind the draw
/// mutex. Content is gathered fresh at draw time, so a third concurrent
/// caller gains nothing by waiting; its change is covered by the queued
/// draw.
pub struct Gate {
    entrants: AtomicU8,
}

impl Gate {
    const CAPACITY: u8 = 2;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            entrants: AtomicU8::new(0),
        }
    }

    /// Claim a slot without blocking. Returns false when both slots are
    /// taken.
    pub fn try_enter(&self) -> bool {
        self.entrants
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < Self::CAPACITY).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn leave(&self) {
        self.entrants.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

struct DrawerInner {
    bar: Option<Bar>,
    last_sent: Option<String>,
    frames: u64,
}

/// Rate-limiting, deduplicating coordinator around one bar process.
///
/// Each drawable owner (a screen, or the panel in single-bar mode) has one
/// of these. The mutex serialises draws, the gate drops redundant callers
/// and `last_sent` suppresses writes of unchanged frames.
pub struct Drawer {
    gate: Gate,
    inner: Mutex<DrawerInner>,
}

impl Drawer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: Gate::new(),
            inner: Mutex::new(DrawerInner {
                bar: None,
                last_sent: None,
                frames: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DrawerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Spawn (or respawn) the bar this drawer writes to.
    pub fn init_bar(&self, config: BarConfig) -> Result<()> {
        let mut inner = self.lock();
        let mut bar = Bar::new(config);
        bar.init()?;
        inner.bar = Some(bar);
        inner.last_sent = None;
        Ok(())
    }

    /// Terminate the bar. Further updates fail until `init_bar` runs again.
    pub fn stop_bar(&self, kill: bool) {
        let mut inner = self.lock();
        if let Some(mut bar) = inner.bar.take() {
            bar.terminate(kill);
        }
        inner.last_sent = None;
    }

    /// Gather fresh content and write it to the bar.
    ///
    /// Callers beyond the two gate slots return immediately: the queued
    /// draw will re-gather and pick their change up. The sleep enforces at
    /// least `refresh` between two completed draws.
    pub fn update(
        &self,
        gather: &dyn Fn() -> String,
        refresh: Duration,
        stop: &StopToken,
    ) -> Result<()> {
        if !self.gate.try_enter() {
            return Ok(());
        }

        let result = (|| {
            let mut inner = self.lock();
            let frame = gather();
            if inner.last_sent.as_deref() != Some(frame.as_str()) {
                let bar = inner.bar.as_mut().ok_or(Error::BarNotRunning)?;
                bar.write(&frame)?;
                tracing::debug!("wrote frame {:?}", frame);
                inner.last_sent = Some(frame);
                inner.frames += 1;
            }
            split_sleep(refresh, stop);
            Ok(())
        })();

        self.gate.leave();
        result
    }

    /// Frame most recently written to the bar.
    #[must_use]
    pub fn last_sent(&self) -> Option<String> {
        self.lock().last_sent.clone()
    }

    /// Number of frames actually written since the bar was spawned.
    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.lock().frames
    }
}

impl Default for Drawer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Instant,
    };

    fn cat_bar() -> BarConfig {
        BarConfig {
            cmd: "cat".to_string(),
            ..BarConfig::default()
        }
    }

    #[test]
    fn gate_caps_entrants_at_two() {
        let gate = Gate::new();
        assert!(gate.try_enter());
        assert!(gate.try_enter());
        assert!(!gate.try_enter());

        gate.leave();
        assert!(gate.try_enter());
    }

    #[test]
    fn update_regathers_and_dedups() {
        let drawer = Drawer::new();
        drawer.init_bar(cat_bar()).unwrap();

        // A set token makes the rate-limit sleep return immediately.
        let stop = StopToken::new();
        let calls = AtomicUsize::new(0);
        let gather = || {
            calls.fetch_add(1, Ordering::SeqCst);
            ":".to_string()
        };

        drawer
            .update(&gather, Duration::from_millis(10), &stop)
            .unwrap();
        drawer
            .update(&gather, Duration::from_millis(10), &stop)
            .unwrap();

        // Content is gathered fresh on every accepted call, but the second
        // identical frame is not re-sent.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(drawer.last_sent().as_deref(), Some(":"));
        assert_eq!(drawer.frames_written(), 1);

        drawer
            .update(&|| "true".to_string(), Duration::from_millis(10), &stop)
            .unwrap();
        assert_eq!(drawer.last_sent().as_deref(), Some("true"));
        assert_eq!(drawer.frames_written(), 2);

        drawer.stop_bar(true);
    }

    #[test]
    fn update_without_bar_fails_only_on_new_content() {
        let drawer = Drawer::new();
        let stop = StopToken::new();

        let err = drawer
            .update(&|| ":".to_string(), Duration::from_millis(10), &stop)
            .unwrap_err();
        assert!(matches!(err, Error::BarNotRunning));
    }

    #[test]
    fn update_respects_refresh_between_draws() {
        let drawer = Drawer::new();
        drawer.init_bar(cat_bar()).unwrap();

        let stop = StopToken::new();
        stop.clear();
        let refresh = Duration::from_millis(60);

        let start = Instant::now();
        drawer.update(&|| ":".to_string(), refresh, &stop).unwrap();
        drawer.update(&|| "true".to_string(), refresh, &stop).unwrap();
        assert!(start.elapsed() >= refresh * 2);

        stop.set();
        drawer.stop_bar(true);
    }
}
