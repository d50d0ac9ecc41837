//! Decode rotary encoder turns from the edges of its two quadrature phases.
//!
//! A [`QuadratureDecoder`] owns two [`PhasePort`]s. Each level change on a
//! phase is correlated with the last edge of the other phase, and every
//! completed pair is reported to the subscribed [`RotationListener`]s as a
//! [`RotationEvent`].
//!
//! ```
//! use quadrature::{DecoderConfig, MemoryPort, QuadratureDecoder, RotationEvent};
//!
//! let a = MemoryPort::default();
//! let b = MemoryPort::default();
//! let decoder = QuadratureDecoder::new(a.clone(), b.clone(), &DecoderConfig::default())?;
//! decoder.subscribe(|event: &RotationEvent| println!("Turning knob {:?}", event.direction));
//!
//! a.toggle();
//! b.toggle();
//! assert_eq!(decoder.stats().clockwise, 1);
//! # Ok::<(), anyhow::Error>(())
//! ```
pub mod config;
pub mod decoder;
pub mod event;
pub mod gpio;
pub mod logs;
pub mod port;
pub mod state;
mod watchdog;

pub use config::{Configuration, DecoderConfig, PinConfig};
pub use decoder::{DecoderStats, QuadratureDecoder};
pub use event::{ListenerId, QueuedListener, RotationDirection, RotationEvent, RotationListener};
pub use port::{ChangeCallback, MemoryPort, PhasePort};
pub use state::{Phase, PhaseState};
pub use watchdog::DEFAULT_WINDOW;
