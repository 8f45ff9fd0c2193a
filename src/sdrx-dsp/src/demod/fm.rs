// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;
use sdrx_core::DeEmphasis;

/// Peak deviation of broadcast FM (Hz).
pub const WFM_DEVIATION_HZ: f64 = 75_000.0;

/// FM quadrature discriminator: instantaneous frequency via `arg(s[n] * conj(s[n-1]))`.
///
/// Output is scaled by `if_rate / (2π · deviation)` so full deviation maps to ±1.
#[derive(Debug, Clone)]
pub struct FmDiscriminator {
    prev: Complex<f32>,
    gain: f32,
}

impl FmDiscriminator {
    pub fn new(if_sample_rate: f64, deviation_hz: f64) -> Self {
        Self {
            prev: Complex::new(0.0, 0.0),
            gain: Self::gain_for(if_sample_rate, deviation_hz),
        }
    }

    fn gain_for(if_sample_rate: f64, deviation_hz: f64) -> f32 {
        (if_sample_rate / (std::f64::consts::TAU * deviation_hz.max(1.0))) as f32
    }

    pub fn set_deviation(&mut self, if_sample_rate: f64, deviation_hz: f64) {
        self.gain = Self::gain_for(if_sample_rate, deviation_hz);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.prev = Complex::new(0.0, 0.0);
    }

    pub fn process_into(&mut self, samples: &[Complex<f32>], output: &mut Vec<f32>) {
        output.reserve(samples.len());
        for &sample in samples {
            let product = sample * self.prev.conj();
            output.push(product.im.atan2(product.re) * self.gain);
            self.prev = sample;
        }
    }
}

/// Single-pole de-emphasis at the audio rate: `y = α·x + (1−α)·y`.
#[derive(Debug, Clone)]
pub struct DeEmphasisFilter {
    alpha: Option<f32>,
    y: f32,
}

impl DeEmphasisFilter {
    pub fn new(mode: DeEmphasis, audio_sample_rate: f64) -> Self {
        Self {
            alpha: Self::alpha_for(mode, audio_sample_rate),
            y: 0.0,
        }
    }

    fn alpha_for(mode: DeEmphasis, audio_sample_rate: f64) -> Option<f32> {
        let tau = mode.tau_seconds()?;
        let dt = 1.0 / audio_sample_rate.max(1.0);
        Some((dt / (tau + dt)) as f32)
    }

    /// Change the time constant, keeping the filter memory.
    pub fn set_mode(&mut self, mode: DeEmphasis, audio_sample_rate: f64) {
        self.alpha = Self::alpha_for(mode, audio_sample_rate);
    }

    pub fn is_active(&self) -> bool {
        self.alpha.is_some()
    }

    pub fn reset(&mut self) {
        self.y = 0.0;
    }

    pub fn process_in_place(&mut self, samples: &mut [f32]) {
        let Some(alpha) = self.alpha else {
            return;
        };
        for sample in samples.iter_mut() {
            self.y = alpha * *sample + (1.0 - alpha) * self.y;
            *sample = self.y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complex_tone(freq_norm: f32, len: usize) -> Vec<Complex<f32>> {
        use std::f32::consts::TAU;

        (0..len)
            .map(|n| Complex::from_polar(1.0, TAU * freq_norm * n as f32))
            .collect()
    }

    fn assert_approx_eq(a: f32, b: f32, tol: f32, label: &str) {
        assert!(
            (a - b).abs() <= tol,
            "{}: expected {} ≈ {} (tol {})",
            label,
            a,
            b,
            tol
        );
    }

    #[test]
    fn test_fm_full_deviation_is_unity() {
        // 12.5 kHz offset at 50 kHz IF with 12.5 kHz deviation.
        let mut disc = FmDiscriminator::new(50_000.0, 12_500.0);
        let mut out = Vec::new();
        disc.process_into(&complex_tone(0.25, 16), &mut out);
        assert_eq!(out.len(), 16);
        assert_approx_eq(out[0], 0.0, 1e-6, "FM tone sample 0");
        for (idx, &sample) in out.iter().enumerate().skip(1) {
            assert_approx_eq(sample, 1.0, 1e-4, &format!("FM tone sample {idx}"));
        }
    }

    #[test]
    fn test_fm_continuity_across_blocks() {
        let tone = complex_tone(-0.1, 20);
        let mut disc = FmDiscriminator::new(250_000.0, WFM_DEVIATION_HZ);
        let mut out = Vec::new();
        disc.process_into(&tone[..7], &mut out);
        disc.process_into(&tone[7..], &mut out);
        let expected = -0.1 * 250_000.0 / 75_000.0;
        for (idx, &sample) in out.iter().enumerate().skip(1) {
            assert_approx_eq(sample, expected, 1e-3, &format!("FM sample {idx}"));
        }
    }

    #[test]
    fn test_fm_silence_is_zero() {
        let input: Vec<Complex<f32>> = (0..8).map(|_| Complex::new(1.0, 0.0)).collect();
        let mut disc = FmDiscriminator::new(50_000.0, 6_250.0);
        let mut out = Vec::new();
        disc.process_into(&input, &mut out);
        for (idx, &value) in out.iter().enumerate() {
            assert_approx_eq(value, 0.0, 1e-6, &format!("FM silence sample {idx}"));
        }
    }

    #[test]
    fn test_deemphasis_coefficient() {
        let mut filter = DeEmphasisFilter::new(DeEmphasis::Us50, 48_000.0);
        let mut block = [1.0_f32];
        filter.process_in_place(&mut block);
        let dt = 1.0 / 48_000.0;
        let alpha = (dt / (50e-6 + dt)) as f32;
        assert_approx_eq(block[0], alpha, 1e-7, "first step");
    }

    #[test]
    fn test_deemphasis_none_is_passthrough() {
        let mut filter = DeEmphasisFilter::new(DeEmphasis::None, 48_000.0);
        assert!(!filter.is_active());
        let mut block = [0.3_f32, -0.7, 1.0];
        filter.process_in_place(&mut block);
        assert_eq!(block, [0.3, -0.7, 1.0]);
    }

    #[test]
    fn test_deemphasis_settles_to_dc() {
        let mut filter = DeEmphasisFilter::new(DeEmphasis::Us75, 48_000.0);
        let mut block = vec![0.25_f32; 4800];
        filter.process_in_place(&mut block);
        assert_approx_eq(block[4799], 0.25, 1e-4, "settled");
    }
}
