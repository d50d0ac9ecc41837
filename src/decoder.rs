//! The quadrature rotation decoder.
//!
//! Both phase callbacks feed edges into a shared [`PhaseState`] guarded by a
//! single mutex. A watchdog thread returns the state to idle when a sequence
//! stays open longer than the configured window, which recovers from edges
//! lost to debounce or from spinning faster than the pins can follow.
use anyhow::{bail, Context, Result};
use log::{debug, trace};
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    config::DecoderConfig,
    event::{ListenerId, Listeners, RotationDirection, RotationEvent, RotationListener},
    port::PhasePort,
    state::{Phase, PhaseState, Step},
    watchdog::{Wait, Watchdog},
};

/// Counters kept for diagnostics.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DecoderStats {
    /// Sequences opened by a leading edge
    pub opened: u64,
    pub clockwise: u64,
    pub counter_clockwise: u64,
    /// Repeated edges on the leading phase
    pub absorbed: u64,
    /// Sequences reset by the watchdog
    pub expired: u64,
    /// Sequences discarded by [`QuadratureDecoder::reset`]
    pub reset: u64,
}

impl DecoderStats {
    pub fn decoded(&self) -> u64 {
        self.clockwise + self.counter_clockwise
    }
}

#[derive(Debug)]
struct Inner {
    state: PhaseState,
    watchdog: Watchdog,
    stats: DecoderStats,
    shutdown: bool,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
    listeners: Mutex<Listeners>,
}

impl Shared {
    // The state is a plain enum and always valid, so a poisoned lock is safe to reuse
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase_changed(&self, phase: Phase) {
        if let Some(event) = self.correlate(phase) {
            // Delivered outside the state lock so listeners may call back into the decoder
            let listeners = self.listeners().snapshot();
            for listener in listeners {
                listener.on_rotation(&event);
            }
        }
    }

    fn correlate(&self, phase: Phase) -> Option<RotationEvent> {
        let mut inner = self.lock();
        let (next, step) = inner.state.on_edge(phase);
        trace!("Phase {:?} edge: {:?} -> {:?}", phase, inner.state, next);
        inner.state = next;

        match step {
            Step::Opened => {
                inner.stats.opened += 1;
                inner.watchdog.arm(Instant::now());
                self.wake.notify_one();
                None
            }
            Step::Absorbed => {
                inner.stats.absorbed += 1;
                None
            }
            Step::Decoded(direction) => {
                inner.watchdog.disarm();
                match direction {
                    RotationDirection::Clockwise => inner.stats.clockwise += 1,
                    RotationDirection::CounterClockwise => inner.stats.counter_clockwise += 1,
                }
                debug!("Decoded {:?}", direction);
                Some(RotationEvent::new(direction))
            }
        }
    }

    fn reset(inner: &mut Inner) -> bool {
        inner.watchdog.disarm();
        if inner.state.is_idle() {
            return false;
        }
        debug!("Reset from {:?}", inner.state);
        inner.state = PhaseState::Idle;
        true
    }

    fn watch(&self) {
        let mut inner = self.lock();
        while !inner.shutdown {
            inner = match inner.watchdog.poll(Instant::now()) {
                Wait::Idle => self.wake.wait(inner).unwrap_or_else(PoisonError::into_inner),
                Wait::For(timeout) => {
                    self.wake
                        .wait_timeout(inner, timeout)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                Wait::Expired => {
                    if Shared::reset(&mut inner) {
                        inner.stats.expired += 1;
                    }
                    inner
                }
            };
        }
    }
}

/// Turns phase A and phase B edges into [`RotationEvent`]s.
///
/// The decoder owns both ports. Dropping it stops the watchdog and turns
/// the registered port callbacks into no-ops.
pub struct QuadratureDecoder<A, B> {
    shared: Arc<Shared>,
    phase_a: A,
    phase_b: B,
    watchdog: Option<JoinHandle<()>>,
}

impl<A: PhasePort, B: PhasePort> QuadratureDecoder<A, B> {
    /// Subscribe to both phases and start the watchdog.
    ///
    /// # Errors
    ///
    /// Fails when either port rejects the change subscription, with the
    /// port's own error, or when the watchdog thread cannot be spawned.
    pub fn new(mut phase_a: A, mut phase_b: B, config: &DecoderConfig) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: PhaseState::Idle,
                watchdog: Watchdog::new(config.watchdog()),
                stats: DecoderStats::default(),
                shutdown: false,
            }),
            wake: Condvar::new(),
            listeners: Mutex::new(Listeners::default()),
        });

        phase_a.on_change(forward(&shared, Phase::A))?;
        phase_b.on_change(forward(&shared, Phase::B))?;

        let watchdog = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("quadrature-watchdog".into())
                .spawn(move || shared.watch())
                .context("could not spawn watchdog thread")?
        };

        Ok(Self {
            shared,
            phase_a,
            phase_b,
            watchdog: Some(watchdog),
        })
    }

    /// Levels of phase A and phase B.
    pub fn levels(&self) -> Result<(bool, bool)> {
        Ok((self.phase_a.level()?, self.phase_b.level()?))
    }

    pub fn phase_a(&self) -> &A {
        &self.phase_a
    }

    pub fn phase_b(&self) -> &B {
        &self.phase_b
    }
}

impl<A, B> QuadratureDecoder<A, B> {
    /// Handle a level change on phase A.
    ///
    /// Normally invoked by the port callback, exposed for ports that
    /// deliver edges some other way.
    pub fn on_phase_a_changed(&self) {
        self.shared.phase_changed(Phase::A)
    }

    /// Handle a level change on phase B.
    pub fn on_phase_b_changed(&self) {
        self.shared.phase_changed(Phase::B)
    }

    pub fn subscribe<L>(&self, listener: L) -> ListenerId
    where
        L: RotationListener + 'static,
    {
        self.shared.listeners().subscribe(Arc::new(listener))
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners().unsubscribe(id)
    }

    pub fn state(&self) -> PhaseState {
        self.shared.lock().state
    }

    pub fn stats(&self) -> DecoderStats {
        self.shared.lock().stats
    }

    /// Force the state back to idle, exactly as an expiring watchdog does.
    ///
    /// Returns true if a sequence was open. Never produces an event.
    pub fn reset(&self) -> bool {
        let mut inner = self.shared.lock();
        let discarded = Shared::reset(&mut inner);
        if discarded {
            inner.stats.reset += 1;
        }
        discarded
    }

    pub fn watchdog_window(&self) -> Duration {
        self.shared.lock().watchdog.window()
    }

    /// Change the watchdog window. An open sequence keeps its current deadline.
    pub fn set_watchdog_window(&self, window: Duration) -> Result<()> {
        if window == Duration::from_millis(0) {
            bail!("watchdog window must be greater than zero");
        }
        self.shared.lock().watchdog.set_window(window);
        Ok(())
    }
}

impl<A, B> Drop for QuadratureDecoder<A, B> {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(watchdog) = self.watchdog.take() {
            let _ = watchdog.join();
        }
    }
}

// Port callbacks hold a weak reference so they do not keep a dropped decoder alive
fn forward(shared: &Arc<Shared>, phase: Phase) -> crate::port::ChangeCallback {
    let shared: Weak<Shared> = Arc::downgrade(shared);
    Box::new(move || {
        if let Some(shared) = shared.upgrade() {
            shared.phase_changed(phase);
        }
    })
}
