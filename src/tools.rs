use std::{
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

#[must_use]
pub fn home() -> String {
    std::env::var("HOME").expect("HOME is not set")
}

/// Cooperative stop flag shared between an owner and its worker threads.
///
/// A token starts in the stopped state: `clear` it when starting a loop,
/// `set` it to ask the loop to exit. `wait` blocks until the token is set.
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

impl StopToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(true), Condvar::new())),
        }
    }

    pub fn set(&self) {
        let (flag, condvar) = &*self.inner;
        *lock_ignore_poison(flag) = true;
        condvar.notify_all();
    }

    pub fn clear(&self) {
        let (flag, _) = &*self.inner;
        *lock_ignore_poison(flag) = false;
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        let (flag, _) = &*self.inner;
        *lock_ignore_poison(flag)
    }

    /// Block the calling thread until the token is set.
    pub fn wait(&self) {
        let (flag, condvar) = &*self.inner;
        let mut stopped = lock_ignore_poison(flag);
        while !*stopped {
            stopped = match condvar.wait(stopped) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Sleep for `total`, waking up regularly to check `stop`.
///
/// A blocking `thread::sleep` cannot observe the stop token, so the wait is
/// split into short naps with a check between each one.
pub fn split_sleep(total: Duration, stop: &StopToken) {
    const INTERVAL: Duration = Duration::from_millis(250);

    let mut remaining = total;
    while !remaining.is_zero() {
        if stop.is_set() {
            return;
        }
        let nap = remaining.min(INTERVAL);
        std::thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
}
