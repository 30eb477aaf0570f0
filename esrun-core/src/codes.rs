//! Hardware trigger codes written to the recording system's input line.
//!
//! These values are fixed: existing EEG recordings were marked with them,
//! so offline alignment depends on the exact bit patterns.

pub const RECORDING_START: u8 = 1;
pub const PROBE_ONSET: u8 = 2;
pub const RESPONSE: u8 = 4;
pub const RATING_RESPONSE: u8 = 8;
pub const TRIAL_START: u8 = 16;
pub const RECORDING_END: u8 = 32;
