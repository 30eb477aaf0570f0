//! Hardware trigger emission.
//!
//! The session always talks to a `TriggerEmitter`; whether that actually
//! drives a port is decided once at construction, not re-checked at every
//! call site. Write failures are absorbed: software timestamps alone keep
//! the session scientifically usable.

use std::time::Duration;

use esrun_timing::Clock;
use tracing::warn;

use crate::ports::TriggerPort;

pub trait TriggerEmitter {
    /// Sets the output line to `code`, holds, and resets it to zero.
    fn pulse(&mut self, code: u8, hold: Duration);
}

/// Emitter bound to a real hardware channel.
pub struct PortEmitter<P, C> {
    port: P,
    clock: C,
}

impl<P: TriggerPort, C: Clock> PortEmitter<P, C> {
    pub fn new(port: P, clock: C) -> Self {
        Self { port, clock }
    }
}

impl<P: TriggerPort, C: Clock> TriggerEmitter for PortEmitter<P, C> {
    fn pulse(&mut self, code: u8, hold: Duration) {
        if let Err(e) = self.port.set_output(code) {
            warn!(code, error = %e, "trigger write failed, continuing on software timestamps");
            return;
        }
        self.clock.sleep(hold);
        if let Err(e) = self.port.set_output(0) {
            warn!(error = %e, "trigger reset failed");
        }
    }
}

/// No-op emitter used when hardware triggering is disabled.
pub struct NullEmitter;

impl TriggerEmitter for NullEmitter {
    fn pulse(&mut self, _code: u8, _hold: Duration) {}
}
