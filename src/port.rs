//! Phase inputs as seen by the decoder.
use anyhow::{bail, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// Invoked on every logical level change of a phase, rising or falling.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// A debounced digital input that reports level changes.
///
/// Implementations must report both edges. The callback may be invoked from
/// any thread, including concurrently with the other phase's callback.
pub trait PhasePort {
    /// Current logical level.
    fn level(&self) -> Result<bool>;

    /// Register `callback` for level changes.
    fn on_change(&mut self, callback: ChangeCallback) -> Result<()>;
}

#[derive(Default)]
struct MemoryPortInner {
    level: bool,
    callbacks: Vec<Arc<dyn Fn() + Send + Sync>>,
}

/// An in-process phase input driven by [`MemoryPort::set_level`].
///
/// Clones share the same level and subscribers, so a test can keep one
/// handle to drive edges while the decoder owns another.
#[derive(Clone, Default)]
pub struct MemoryPort {
    inner: Arc<Mutex<MemoryPortInner>>,
    refuse_subscriptions: bool,
}

impl MemoryPort {
    pub fn new(level: bool) -> Self {
        let port = MemoryPort::default();
        port.lock().level = level;
        port
    }

    /// A port whose `on_change` always fails.
    pub fn refusing() -> Self {
        MemoryPort {
            refuse_subscriptions: true,
            ..MemoryPort::default()
        }
    }

    /// Drive the level, notifying subscribers if it changed.
    pub fn set_level(&self, level: bool) {
        self.drive(|_| level)
    }

    /// Flip the level, always producing an edge.
    pub fn toggle(&self) {
        self.drive(|level| !level)
    }

    // Level read and write happen in one critical section; callbacks run after it
    fn drive<F: FnOnce(bool) -> bool>(&self, next: F) {
        let callbacks = {
            let mut inner = self.lock();
            let level = next(inner.level);
            if inner.level == level {
                return;
            }
            inner.level = level;
            inner.callbacks.clone()
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn subscribers(&self) -> usize {
        self.lock().callbacks.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryPortInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PhasePort for MemoryPort {
    fn level(&self) -> Result<bool> {
        Ok(self.lock().level)
    }

    fn on_change(&mut self, callback: ChangeCallback) -> Result<()> {
        if self.refuse_subscriptions {
            bail!("port does not accept change subscriptions");
        }
        self.lock().callbacks.push(Arc::from(callback));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notifies_only_on_change() {
        let mut port = MemoryPort::new(false);
        let edges = Arc::new(AtomicUsize::new(0));
        {
            let edges = edges.clone();
            port.on_change(Box::new(move || {
                edges.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }

        port.set_level(false);
        port.set_level(true);
        port.set_level(true);
        port.toggle();

        assert_eq!(edges.load(Ordering::SeqCst), 2);
        assert!(!port.level().unwrap());
    }

    #[test]
    fn clones_share_subscribers() {
        let mut port = MemoryPort::default();
        let driver = port.clone();
        port.on_change(Box::new(|| {})).unwrap();
        assert_eq!(driver.subscribers(), 1);
    }

    #[test]
    fn concurrent_toggles_each_produce_an_edge() {
        let mut port = MemoryPort::default();
        let edges = Arc::new(AtomicUsize::new(0));
        {
            let edges = edges.clone();
            port.on_change(Box::new(move || {
                edges.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let port = port.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        port.toggle();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(edges.load(Ordering::SeqCst), 4_000);
        // An even number of flips lands back on the start level
        assert!(!port.level().unwrap());
    }

    #[test]
    fn refusing_port_fails_subscription() {
        let mut port = MemoryPort::refusing();
        assert!(port.on_change(Box::new(|| {})).is_err());
    }
}
