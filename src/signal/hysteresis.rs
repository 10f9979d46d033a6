//! # Hysteresis Debounce
//!
//! Two-threshold latch with a minimum re-trigger interval.
//!
//! ```text
//!             press (edge, if debounce elapsed)
//!   magnitude > on ─────────────────────────────► pressed
//!   released ◄───────────────────────────── magnitude < off
//!             release (edge, immediate)
//! ```
//!
//! `off = on - buffer`. Between the two thresholds the latch keeps its
//! state. Only presses are rate limited; a release fires as soon as the
//! magnitude drops below `off`.

use std::time::{Duration, Instant};

/// Edge emitted by the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchEdge {
    /// false -> true transition
    Pressed,
    /// true -> false transition
    Released,
}

/// Latch state owned by a single button processor.
///
/// A press is only reported on a released -> pressed edge and a release
/// only on a pressed -> released edge, so presses and releases strictly
/// alternate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonLatchState {
    pressed: bool,
    last_press: Option<Instant>,
}

impl ButtonLatchState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the latch is currently pressed.
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Time of the most recent press edge, if any.
    #[must_use]
    pub fn last_press(&self) -> Option<Instant> {
        self.last_press
    }

    /// Back to released with no press history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Thresholds for [`hysteresis_debounce`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisBand {
    /// Magnitude that must be exceeded to press.
    pub on_threshold: f32,
    /// Distance below `on_threshold` at which the latch releases.
    pub buffer: f32,
    /// Minimum time between two press edges.
    pub debounce: Duration,
}

impl HysteresisBand {
    /// Release threshold (`on_threshold - buffer`).
    #[must_use]
    pub fn off_threshold(&self) -> f32 {
        self.on_threshold - self.buffer
    }
}

/// Feeds one magnitude sample into the latch.
///
/// Returns the edge produced by this sample, or `None` when the state did
/// not change.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
/// use motion_gamepad::signal::hysteresis::{
///     hysteresis_debounce, ButtonLatchState, HysteresisBand, LatchEdge,
/// };
///
/// let band = HysteresisBand { on_threshold: 7.0, buffer: 1.0, debounce: Duration::from_millis(500) };
/// let mut latch = ButtonLatchState::new();
/// let t0 = Instant::now();
///
/// assert_eq!(hysteresis_debounce(9.0, &mut latch, &band, t0), Some(LatchEdge::Pressed));
/// assert_eq!(hysteresis_debounce(6.5, &mut latch, &band, t0), None);
/// assert_eq!(hysteresis_debounce(5.0, &mut latch, &band, t0), Some(LatchEdge::Released));
/// ```
pub fn hysteresis_debounce(
    magnitude: f32,
    state: &mut ButtonLatchState,
    band: &HysteresisBand,
    now: Instant,
) -> Option<LatchEdge> {
    if !state.pressed {
        if magnitude > band.on_threshold && debounce_elapsed(state.last_press, band.debounce, now) {
            state.pressed = true;
            state.last_press = Some(now);
            return Some(LatchEdge::Pressed);
        }
    } else if magnitude < band.off_threshold() {
        state.pressed = false;
        return Some(LatchEdge::Released);
    }
    None
}

fn debounce_elapsed(last_press: Option<Instant>, debounce: Duration, now: Instant) -> bool {
    match last_press {
        None => true,
        Some(last) => now.saturating_duration_since(last) > debounce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band() -> HysteresisBand {
        HysteresisBand {
            on_threshold: 7.0,
            buffer: 1.0,
            debounce: Duration::from_millis(500),
        }
    }

    /// Runs a magnitude sequence sampled `step` apart and collects edges with their index.
    fn run(seq: &[f32], step: Duration) -> Vec<(usize, LatchEdge)> {
        let band = band();
        let mut latch = ButtonLatchState::new();
        let t0 = Instant::now();
        seq.iter()
            .enumerate()
            .filter_map(|(i, &m)| {
                hysteresis_debounce(m, &mut latch, &band, t0 + step * i as u32).map(|e| (i, e))
            })
            .collect()
    }

    #[test]
    fn test_off_threshold() {
        assert_eq!(band().off_threshold(), 6.0);
    }

    #[test]
    fn test_scenario_press_then_release_once() {
        let edges = run(&[3.0, 9.0, 9.0, 9.0, 2.0], Duration::from_millis(100));
        assert_eq!(edges, vec![(1, LatchEdge::Pressed), (4, LatchEdge::Released)]);
    }

    #[test]
    fn test_one_press_one_release_regardless_of_segment_length() {
        for len in [1usize, 2, 7, 50] {
            let mut seq = vec![0.0; len];
            seq.extend(std::iter::repeat(12.0).take(len));
            seq.extend(std::iter::repeat(1.0).take(len));
            let edges = run(&seq, Duration::from_millis(10));
            assert_eq!(edges.len(), 2, "segment length {}", len);
            assert_eq!(edges[0].1, LatchEdge::Pressed);
            assert_eq!(edges[1].1, LatchEdge::Released);
        }
    }

    #[test]
    fn test_no_release_inside_band() {
        // 6.5 is between off (6) and on (7): state holds
        let edges = run(&[8.0, 6.5, 6.5, 6.9, 6.0], Duration::from_millis(100));
        assert_eq!(edges, vec![(0, LatchEdge::Pressed)]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let edges = run(&[7.0, 7.0], Duration::from_millis(100));
        assert!(edges.is_empty());
    }

    #[test]
    fn test_refractory_blocks_second_press() {
        // press at 0ms, release at 100ms, crossing again at 200ms < 500ms debounce
        let edges = run(&[9.0, 1.0, 9.0, 9.0], Duration::from_millis(100));
        let presses = edges.iter().filter(|(_, e)| *e == LatchEdge::Pressed).count();
        assert_eq!(presses, 1);
    }

    #[test]
    fn test_press_allowed_after_debounce() {
        let edges = run(&[9.0, 1.0, 9.0], Duration::from_millis(300));
        assert_eq!(
            edges,
            vec![
                (0, LatchEdge::Pressed),
                (1, LatchEdge::Released),
                (2, LatchEdge::Pressed)
            ]
        );
    }

    #[test]
    fn test_release_not_debounced() {
        let edges = run(&[9.0, 0.0], Duration::from_millis(1));
        assert_eq!(edges, vec![(0, LatchEdge::Pressed), (1, LatchEdge::Released)]);
    }

    #[test]
    fn test_edges_alternate() {
        let seq: Vec<f32> = (0..400).map(|i| if (i / 3) % 2 == 0 { 10.0 } else { 0.0 }).collect();
        let edges = run(&seq, Duration::from_millis(70));
        for pair in edges.windows(2) {
            assert_ne!(pair[0].1, pair[1].1, "two identical edges in a row");
        }
        assert_eq!(edges[0].1, LatchEdge::Pressed);
    }

    #[test]
    fn test_reset_clears_history() {
        let band = band();
        let mut latch = ButtonLatchState::new();
        let t0 = Instant::now();
        hysteresis_debounce(9.0, &mut latch, &band, t0);
        assert!(latch.is_pressed());
        assert_eq!(latch.last_press(), Some(t0));

        latch.reset();
        assert!(!latch.is_pressed());
        assert_eq!(latch.last_press(), None);
        // immediate re-press allowed once history is gone
        assert_eq!(
            hysteresis_debounce(9.0, &mut latch, &band, t0),
            Some(LatchEdge::Pressed)
        );
    }
}
