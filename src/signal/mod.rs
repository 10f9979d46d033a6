//! # Signal Module
//!
//! Conditioning primitives reused by the processor strategies:
//! - Clamping to the stick range
//! - Hard-cutoff deadzone
//! - Exponential low-pass filter
//! - Hysteresis latch with press debounce

pub mod conditioning;
pub mod hysteresis;
