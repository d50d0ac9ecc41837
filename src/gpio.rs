//! Phase inputs on GPIO pins via the sysfs GPIO interface.
//!
//! Each pin is exported as an input with interrupts on both edges. A poller
//! thread per pin waits for the interrupt, lets the contact settle, and
//! reports the change only when the settled level differs from the last one
//! reported and the previous accepted edge is at least `min_pulse` old.
use anyhow::{bail, Context, Result};
use log::{debug, error};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use sysfs_gpio::{Direction, Edge, Pin};

use crate::{
    config::PinConfig,
    port::{ChangeCallback, PhasePort},
};

// Upper bound on how long a poller takes to notice the port was dropped
const POLL_TIMEOUT_MS: isize = 100;

/// Software debounce on top of the kernel edge interrupt.
#[derive(Debug, Clone)]
struct Debounce {
    min_pulse: Duration,
    level: bool,
    last_edge: Option<Instant>,
}

impl Debounce {
    fn new(min_pulse: Duration, level: bool) -> Self {
        Self {
            min_pulse,
            level,
            last_edge: None,
        }
    }

    /// Whether `level`, read after an interrupt at `at`, is a new edge.
    fn accept(&mut self, at: Instant, level: bool) -> bool {
        if level == self.level {
            return false;
        }
        // A too-short pulse is not reported but still tracked, so the pin's
        // next real edge is seen as a change
        self.level = level;
        if let Some(last) = self.last_edge {
            if at.saturating_duration_since(last) < self.min_pulse {
                return false;
            }
        }
        self.last_edge = Some(at);
        true
    }
}

/// A GPIO input pin used as one encoder phase.
#[derive(Debug)]
pub struct SysfsPort {
    pin: Pin,
    config: PinConfig,
    running: Arc<AtomicBool>,
    poller: Option<JoinHandle<()>>,
}

impl SysfsPort {
    /// Export the pin and configure it as an input interrupting on both edges.
    ///
    /// This is equivalent to `echo N > /sys/class/gpio/export` followed by
    /// writing `in` to `direction` and `both` to `edge`. An already exported
    /// pin is not an error.
    pub fn open(config: &PinConfig) -> Result<SysfsPort> {
        let pin = Pin::new(config.pin);
        pin.export()
            .with_context(|| format!("could not export GPIO pin {}", config.pin))?;
        pin.set_direction(Direction::In)
            .with_context(|| format!("could not set direction for GPIO pin {}", config.pin))?;
        pin.set_edge(Edge::BothEdges)
            .with_context(|| format!("could not set edge for GPIO pin {}", config.pin))?;
        debug!("GPIO pin {} configured as phase input", config.pin);
        Ok(SysfsPort {
            pin,
            config: *config,
            running: Arc::new(AtomicBool::new(true)),
            poller: None,
        })
    }

    pub fn pin_num(&self) -> u64 {
        self.pin.get_pin_num()
    }
}

impl PhasePort for SysfsPort {
    fn level(&self) -> Result<bool> {
        let value = self
            .pin
            .get_value()
            .with_context(|| format!("could not read GPIO pin {}", self.config.pin))?;
        Ok(value != 0)
    }

    fn on_change(&mut self, callback: ChangeCallback) -> Result<()> {
        if self.poller.is_some() {
            bail!("GPIO pin {} already has a subscriber", self.config.pin);
        }
        let mut poller = self
            .pin
            .get_poller()
            .with_context(|| format!("could not poll GPIO pin {}", self.config.pin))?;
        let mut debounce = Debounce::new(self.config.min_pulse(), self.level()?);
        let settle = self.config.settle();
        let pin = self.pin;
        let running = self.running.clone();

        let handle = thread::Builder::new()
            .name(format!("gpio-{}", self.config.pin))
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    match poller.poll(POLL_TIMEOUT_MS) {
                        Ok(Some(_)) => {
                            let at = Instant::now();
                            thread::sleep(settle);
                            match pin.get_value() {
                                Ok(value) => {
                                    if debounce.accept(at, value != 0) {
                                        callback();
                                    }
                                }
                                Err(e) => {
                                    error!("Could not read GPIO pin {}: {}", pin.get_pin_num(), e)
                                }
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!("Polling GPIO pin {} failed: {}", pin.get_pin_num(), e);
                            break;
                        }
                    }
                }
            })
            .with_context(|| format!("could not spawn poller for GPIO pin {}", self.config.pin))?;
        self.poller = Some(handle);
        Ok(())
    }
}

impl Drop for SysfsPort {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(poller) = self.poller.take() {
            let _ = poller.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_unchanged_level() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(1), false);
        assert!(!debounce.accept(start, false));
        assert!(debounce.accept(start, true));
        assert!(!debounce.accept(start + Duration::from_millis(5), true));
    }

    #[test]
    fn ignores_edges_shorter_than_min_pulse() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(1), false);
        assert!(debounce.accept(start, true));
        assert!(!debounce.accept(start + Duration::from_micros(300), false));
        assert!(!debounce.accept(start + Duration::from_micros(600), false));
    }

    #[test]
    fn edge_after_short_pulse_is_reported() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(1), false);
        assert!(debounce.accept(start, true));
        // Rejected, but the tracker now knows the pin is low
        assert!(!debounce.accept(start + Duration::from_micros(300), false));
        assert!(debounce.accept(start + Duration::from_millis(2), true));
    }

    #[test]
    fn first_edge_is_never_too_soon() {
        let mut debounce = Debounce::new(Duration::from_secs(60), true);
        assert!(debounce.accept(Instant::now(), false));
    }
}
