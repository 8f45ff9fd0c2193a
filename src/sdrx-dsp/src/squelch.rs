// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

/// Floor added before the logarithm so silence maps to a finite level.
const LEVEL_FLOOR: f32 = 1e-12;

/// Mean IQ magnitude of a block, in dB.
pub fn mean_magnitude_db(block: &[Complex<f32>]) -> f32 {
    if block.is_empty() {
        return 10.0 * LEVEL_FLOOR.log10();
    }
    let sum: f32 = block.iter().map(|s| s.norm()).sum();
    let mean = sum / block.len() as f32;
    10.0 * (mean + LEVEL_FLOOR).log10()
}

/// Block-level squelch gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Squelch {
    pub enabled: bool,
    pub level_db: f32,
}

impl Default for Squelch {
    fn default() -> Self {
        Self {
            enabled: false,
            level_db: -100.0,
        }
    }
}

impl Squelch {
    pub fn new(level_db: f32, enabled: bool) -> Self {
        Self { enabled, level_db }
    }

    /// True when the block should be replaced by silence.
    pub fn is_closed(&self, block: &[Complex<f32>]) -> bool {
        self.enabled && mean_magnitude_db(block) < self.level_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_of_unit_carrier_is_zero_db() {
        let block = vec![Complex::new(0.0_f32, 1.0); 32];
        assert!(mean_magnitude_db(&block).abs() < 1e-5);
    }

    #[test]
    fn silence_is_finite() {
        let block = vec![Complex::new(0.0_f32, 0.0); 16];
        let db = mean_magnitude_db(&block);
        assert!(db.is_finite());
        assert!(db < -100.0);
    }

    #[test]
    fn disabled_squelch_never_closes() {
        let squelch = Squelch::new(0.0, false);
        assert!(!squelch.is_closed(&[Complex::new(0.0, 0.0); 4]));
    }

    #[test]
    fn closes_below_threshold_only() {
        let squelch = Squelch::new(-20.0, true);
        // 0.001 magnitude -> -30 dB
        assert!(squelch.is_closed(&[Complex::new(0.001, 0.0); 8]));
        // 0.1 magnitude -> -10 dB
        assert!(!squelch.is_closed(&[Complex::new(0.1, 0.0); 8]));
    }
}
