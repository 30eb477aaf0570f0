//! Seams to the external collaborators: the rendering surface, the input
//! source, and the hardware trigger channel. The controller only ever talks
//! to these traits; production and simulated implementations live outside
//! this crate.

use anyhow::Result;
use esrun_core::Screen;

/// Rendering surface.
///
/// `present` returns the confirmed visible-onset time (seconds on the
/// session clock), not the time the draw call was issued. Probe and prompt
/// onsets are stamped from this value so they align with what the
/// participant actually saw.
pub trait Surface {
    fn draw(&mut self, screen: &Screen);
    fn present(&mut self) -> Result<f64>;
    fn close(&mut self);
}

/// One key press, timestamped against the session clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    pub key: char,
    pub time: f64,
}

/// Source of pending key events since the last poll. Scanner pulses arrive
/// here too, as presses of the configured pulse key.
pub trait InputSource {
    fn poll(&mut self) -> Vec<KeyEvent>;
}

/// Hardware channel the trigger codes are written to.
pub trait TriggerPort {
    fn set_output(&mut self, code: u8) -> std::io::Result<()>;
}
