// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f64::consts::{PI, TAU};

use num_complex::Complex;

use crate::agc::CarrierAgc;

/// Sideband/CW demodulator: rotate the IF by a fixed translation and keep
/// the real part.
///
/// USB translates by `+bw/2`, LSB by `-bw/2`, DSB by zero and CW by the beat
/// tone. The phase advances before each sample and stays within `[-π, π]`.
#[derive(Debug, Clone)]
pub struct SidebandDemod {
    phase: f64,
    agc: CarrierAgc,
}

impl SidebandDemod {
    pub fn new(if_sample_rate: f64) -> Self {
        Self {
            phase: 0.0,
            agc: CarrierAgc::new(if_sample_rate),
        }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn agc_gain(&self) -> f32 {
        self.agc.gain()
    }

    pub fn process_into(
        &mut self,
        samples: &[Complex<f32>],
        translation_hz: f64,
        if_sample_rate: f64,
        output: &mut Vec<f32>,
    ) {
        let phase_inc = translation_hz / if_sample_rate * TAU;
        output.reserve(samples.len());
        for sample in samples {
            self.phase += phase_inc;
            if self.phase > PI {
                self.phase -= TAU;
            }
            if self.phase < -PI {
                self.phase += TAU;
            }
            let (sin_p, cos_p) = self.phase.sin_cos();
            let rotated = sample.re * cos_p as f32 - sample.im * sin_p as f32;
            output.push(self.agc.process(rotated));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SidebandDemod;
    use num_complex::Complex;

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
    fn test_zero_translation_takes_real_part() {
        let mut demod = SidebandDemod::new(24_000.0);
        let input = vec![
            Complex::new(1.0_f32, 2.0),
            Complex::new(3.0, 4.0),
            Complex::new(-1.0, 0.0),
        ];
        let mut out = Vec::new();
        demod.process_into(&input, 0.0, 24_000.0, &mut out);
        assert_eq!(demod.phase(), 0.0);
        // |x| == gain on the first sample, so the gain stays at 1.
        assert_approx_eq(out[0], 0.5, 1e-6, "sample 0");
        assert!(out[1] > 0.0);
        assert!(out[2] < 0.0);
    }

    #[test]
    fn test_phase_advances_before_use() {
        let mut demod = SidebandDemod::new(3_000.0);
        let mut out = Vec::new();
        // 750 Hz at 3 kHz: quarter turn per sample.
        demod.process_into(&[Complex::new(0.0, -0.5)], 750.0, 3_000.0, &mut out);
        assert_approx_eq(demod.phase() as f32, std::f32::consts::FRAC_PI_2, 1e-6, "phase");
        // re*cos - im*sin = 0 - (-0.5)(1) = 0.5
        assert!(out[0] > 0.0);
    }

    #[test]
    fn test_phase_stays_wrapped() {
        let mut demod = SidebandDemod::new(24_000.0);
        let mut out = Vec::new();
        let input = vec![Complex::new(0.1_f32, 0.0); 10_000];
        demod.process_into(&input, -1_400.0, 24_000.0, &mut out);
        assert!(demod.phase().abs() <= std::f64::consts::PI);
        demod.process_into(&input, 1_400.0, 24_000.0, &mut out);
        assert!(demod.phase().abs() <= std::f64::consts::PI);
    }

    #[test]
    fn test_usb_tone_becomes_audio_beat() {
        // Carrier at DC rotated by +1 kHz yields a 1 kHz real tone.
        let if_rate = 24_000.0;
        let mut demod = SidebandDemod::new(if_rate);
        let input = vec![Complex::new(0.2_f32, 0.0); 2400];
        let mut out = Vec::new();
        demod.process_into(&input, 1_000.0, if_rate, &mut out);
        let mut crossings = 0;
        for pair in out.windows(2) {
            if pair[0] <= 0.0 && pair[1] > 0.0 {
                crossings += 1;
            }
        }
        // 100 ms of 1 kHz
        assert!((99..=101).contains(&crossings), "crossings {crossings}");
    }
}
