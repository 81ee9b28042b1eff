//! Carrier rejection and one-pole smoothing filters.
//!
//! [`CarrierRejectionFilter`] is a difference comb tuned to the symbol clock:
//! subtracting the input from itself delayed by half a symbol period puts a
//! null at twice the symbol rate (the first carrier image) while passing the
//! fundamental near unity gain, without needing any floating-point trig at
//! runtime. [`OnePoleLowpass`] is the plain exponential smoother used by the
//! AGC and by [`crate::pll::PhaseLockedLoop`]'s loop filter, in the same
//! `state += coef * (input - state)` form used throughout this lineage's DSP
//! code.

use core::f32::consts::PI;

/// Difference comb with a half-symbol-period delay tap. `L` is the number of
/// samples per symbol and must be even.
#[derive(Debug, Clone, Copy)]
pub struct CarrierRejectionFilter<const L: usize> {
    taps: [f32; L],
    pos: usize,
}

impl<const L: usize> CarrierRejectionFilter<L> {
    const HALF: usize = L / 2;

    pub const fn new() -> Self {
        assert!(L % 2 == 0, "carrier rejection filter length must be even");
        assert!(L > 0, "carrier rejection filter length must be nonzero");
        Self {
            taps: [0.0; L],
            pos: 0,
        }
    }

    pub fn reset(&mut self) {
        self.taps = [0.0; L];
        self.pos = 0;
    }

    /// Feeds one input sample and returns the filtered output.
    ///
    /// This is a bare two-tap difference comb, not a running-average-minus-
    /// delayed-copy; it meets the same gain contract (near-0 dB passband,
    /// deep null at 2x the symbol rate) with one fewer accumulator.
    pub fn process(&mut self, input: f32) -> f32 {
        let half_old_index = (self.pos + L - Self::HALF) % L;
        let half_old = self.taps[half_old_index];

        self.taps[self.pos] = input;
        self.pos = (self.pos + 1) % L;

        (input - half_old) * 0.5
    }
}

impl<const L: usize> Default for CarrierRejectionFilter<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// First-order IIR lowpass: `state += coef * (input - state)`.
#[derive(Debug, Clone, Copy)]
pub struct OnePoleLowpass {
    coef: f32,
    state: f32,
}

impl OnePoleLowpass {
    pub const fn new() -> Self {
        Self {
            coef: 0.0,
            state: 0.0,
        }
    }

    /// `normalized_freq` is the cutoff frequency divided by the sample rate.
    /// Valid for `normalized_freq` small enough that `2*pi*normalized_freq`
    /// stays well under 1 (the small-angle approximation this filter relies
    /// on to avoid a trig call per sample).
    pub fn init(&mut self, normalized_freq: f32) {
        self.coef = 2.0 * PI * normalized_freq;
        self.state = 0.0;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        self.state += self.coef * (input - self.state);
        self.state
    }

    pub fn output(&self) -> f32 {
        self.state
    }
}

impl Default for OnePoleLowpass {
    fn default() -> Self {
        Self::new()
    }
}
