//! # Gamepad Module
//!
//! Virtual controller output.
//!
//! This module handles:
//! - The sink contract (buffered stick/button writes plus one commit)
//! - Serializing concurrent writers through [`sink::SharedController`]
//! - A report-writing virtual pad used by the binary

pub mod button;
pub mod report;
pub mod sink;
