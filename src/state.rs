//! Correlation of phase A and phase B edges into a rotation direction.
//!
//! The encoder phases are offset by a quarter period, so during one detent
//! one phase always changes before the other. Whichever phase changes first
//! opens a sequence and the first edge on the other phase closes it:
//!
//! - A then B: clockwise
//! - B then A: counter clockwise
//!
//! Only the leading phase of the open sequence is remembered. A repeated edge
//! on the leading phase is absorbed and the sequence stays open.
use crate::event::RotationDirection;

/// The phase that raised an edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    A,
    B,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PhaseState {
    /// No sequence in flight
    Idle,
    /// Phase A led, waiting for B to complete a clockwise detent
    AwaitingB,
    /// Phase B led, waiting for A to complete a counter clockwise detent
    AwaitingA,
}

impl Default for PhaseState {
    fn default() -> Self {
        PhaseState::Idle
    }
}

/// What a single edge did to the sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    /// The edge opened a new sequence
    Opened,
    /// Repeated edge on the leading phase, nothing changed
    Absorbed,
    /// The edge completed the sequence
    Decoded(RotationDirection),
}

impl PhaseState {
    pub fn is_idle(self) -> bool {
        self == PhaseState::Idle
    }

    /// Feed one edge and return the next state together with what happened.
    pub fn on_edge(self, phase: Phase) -> (PhaseState, Step) {
        use Phase::*;
        use PhaseState::*;

        match (self, phase) {
            (Idle, A) => (AwaitingB, Step::Opened),
            (Idle, B) => (AwaitingA, Step::Opened),
            (AwaitingB, A) | (AwaitingA, B) => (self, Step::Absorbed),
            (AwaitingB, B) => (Idle, Step::Decoded(RotationDirection::Clockwise)),
            (AwaitingA, A) => (Idle, Step::Decoded(RotationDirection::CounterClockwise)),
        }
    }
}
