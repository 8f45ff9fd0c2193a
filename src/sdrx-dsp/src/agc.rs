// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Output peak the AGC normalizes toward.
const AGC_TARGET: f32 = 0.5;
/// Attack per second of IF; divided by the IF rate for a per-sample coefficient.
const AGC_ATTACK_PER_SEC: f64 = 50.0;
const AGC_DECAY_PER_SEC: f64 = 5.0;
const AGC_MIN_GAIN: f32 = 1e-6;

/// One-pole envelope AGC used by the AM and sideband demodulators.
///
/// Coefficients scale with the IF rate so attack and decay times in seconds
/// are the same in every mode.
#[derive(Debug, Clone)]
pub struct CarrierAgc {
    gain: f32,
    attack: f32,
    decay: f32,
}

impl CarrierAgc {
    pub fn new(if_sample_rate: f64) -> Self {
        let sr = if_sample_rate.max(1.0);
        Self {
            gain: 1.0,
            attack: (AGC_ATTACK_PER_SEC / sr) as f32,
            decay: (AGC_DECAY_PER_SEC / sr) as f32,
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let level = sample.abs();
        let coeff = if level > self.gain {
            self.attack
        } else {
            self.decay
        };
        self.gain = self.gain * (1.0 - coeff) + level * coeff;
        let scale = if self.gain > AGC_MIN_GAIN {
            AGC_TARGET / self.gain
        } else {
            1.0
        };
        sample * scale
    }
}
