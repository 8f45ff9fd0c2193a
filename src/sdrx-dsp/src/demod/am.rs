// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

use crate::agc::CarrierAgc;

const DC_ALPHA: f32 = 0.9999;

/// AM envelope detector with carrier DC removal and AGC.
#[derive(Debug, Clone)]
pub struct AmDemod {
    dc_avg: f32,
    agc: CarrierAgc,
}

impl AmDemod {
    pub fn new(if_sample_rate: f64) -> Self {
        Self {
            dc_avg: 0.0,
            agc: CarrierAgc::new(if_sample_rate),
        }
    }

    pub fn dc_average(&self) -> f32 {
        self.dc_avg
    }

    pub fn agc_gain(&self) -> f32 {
        self.agc.gain()
    }

    pub fn process_into(&mut self, samples: &[Complex<f32>], output: &mut Vec<f32>) {
        output.reserve(samples.len());
        for sample in samples {
            let mag = (sample.re * sample.re + sample.im * sample.im).sqrt();
            self.dc_avg = DC_ALPHA * self.dc_avg + (1.0 - DC_ALPHA) * mag;
            output.push(self.agc.process(mag - self.dc_avg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AmDemod;
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
    fn test_am_dc_average_tracks_carrier() {
        let mut demod = AmDemod::new(15_000.0);
        let input = vec![Complex::new(0.0_f32, 0.8); 150_000];
        let mut out = Vec::new();
        demod.process_into(&input, &mut out);
        assert_eq!(out.len(), input.len());
        assert_approx_eq(demod.dc_average(), 0.8, 2e-3, "dc average");
    }

    #[test]
    fn test_am_first_sample() {
        let mut demod = AmDemod::new(15_000.0);
        let mut out = Vec::new();
        demod.process_into(&[Complex::new(0.6, 0.8)], &mut out);
        // mag = 1.0, dc = 0.0001
        assert_approx_eq(demod.dc_average(), 1e-4, 1e-7, "dc");
        let sample = 1.0 - 1e-4;
        // gain below |sample| would attack; here |sample| < 1.0 so decay applies
        let decay = 5.0 / 15_000.0;
        let gain = 1.0 * (1.0 - decay) + sample * decay;
        assert_approx_eq(out[0], sample * 0.5 / gain, 1e-5, "output");
    }

    #[test]
    fn test_am_recovers_modulation() {
        use std::f32::consts::TAU;

        let if_rate = 15_000.0_f32;
        let mut demod = AmDemod::new(if_rate as f64);
        let input: Vec<Complex<f32>> = (0..150_000)
            .map(|n| {
                let m = 0.5 * (TAU * 1000.0 * n as f32 / if_rate).sin();
                Complex::new(0.4 * (1.0 + m), 0.0)
            })
            .collect();
        let mut out = Vec::new();
        demod.process_into(&input, &mut out);
        let tail = &out[out.len() - 1500..];
        let peak = tail.iter().fold(0.0_f32, |acc, &x| acc.max(x.abs()));
        assert!(peak > 0.3 && peak < 0.8, "AGC peak {peak}");
    }
}
