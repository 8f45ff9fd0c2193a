// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rational-ratio polyphase resampling with a persistent delay line.

use crate::filter::{low_pass_taps, FilterTapSet};
use crate::{DspError, Sample};

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Polyphase interpolate-by-`interp`, decimate-by-`decim` core.
struct PolyphaseResampler<T: Sample> {
    interp: usize,
    decim: usize,
    taps_per_phase: usize,
    phases: Vec<Vec<f32>>,
    /// `taps_per_phase - 1` history samples followed by room for one block.
    buffer: Vec<T>,
    phase: usize,
    offset: usize,
}

impl<T: Sample> PolyphaseResampler<T> {
    fn new(interp: usize, decim: usize, taps: &FilterTapSet, max_block: usize) -> Self {
        let taps_per_phase = taps.len().div_ceil(interp).max(1);
        // Every phase gets exactly taps_per_phase coefficients.
        let padded = taps.padded(taps_per_phase * interp);
        let mut phases = vec![vec![0.0_f32; taps_per_phase]; interp];
        for (i, &coeff) in padded.taps().iter().enumerate() {
            let phase_idx = (interp - 1) - (i % interp);
            let tap_idx = i / interp;
            phases[phase_idx][tap_idx] = coeff;
        }

        Self {
            interp,
            decim,
            taps_per_phase,
            phases,
            buffer: vec![T::default(); taps_per_phase - 1 + max_block],
            phase: 0,
            offset: 0,
        }
    }

    fn history_len(&self) -> usize {
        self.taps_per_phase - 1
    }

    fn reset(&mut self) {
        self.buffer.fill(T::default());
        self.phase = 0;
        self.offset = 0;
    }

    fn process(&mut self, input: &[T], output: &mut Vec<T>) -> usize {
        let count = input.len();
        let hist = self.history_len();
        self.buffer[hist..hist + count].copy_from_slice(input);

        let start = output.len();
        while self.offset < count {
            let window = &self.buffer[self.offset..self.offset + self.taps_per_phase];
            let mut acc = T::default();
            for (&x, &c) in window.iter().zip(&self.phases[self.phase]) {
                acc = acc + x * c;
            }
            output.push(acc);

            self.phase += self.decim;
            self.offset += self.phase / self.interp;
            self.phase %= self.interp;
        }
        self.offset -= count;

        self.buffer.copy_within(count..count + hist, 0);
        output.len() - start
    }
}

enum Engine<T: Sample> {
    Passthrough,
    Polyphase(Box<PolyphaseResampler<T>>),
}

/// Streaming resampler between two integer-valued sample rates.
///
/// Output of consecutive [`RationalResampler::process_into`] calls is the
/// same as one call over the concatenated input.
pub struct RationalResampler<T: Sample> {
    input_rate: f64,
    output_rate: f64,
    interp: usize,
    decim: usize,
    max_block: usize,
    engine: Engine<T>,
}

impl<T: Sample> RationalResampler<T> {
    /// `max_block` bounds the input length accepted by one call.
    pub fn new(input_rate: f64, output_rate: f64, max_block: usize) -> Result<Self, DspError> {
        let in_sr = input_rate.round();
        let out_sr = output_rate.round();
        if !(in_sr >= 1.0 && out_sr >= 1.0 && in_sr.is_finite() && out_sr.is_finite()) {
            return Err(DspError::InvalidRate(format!(
                "cannot resample {} Hz -> {} Hz",
                input_rate, output_rate
            )));
        }
        if max_block == 0 {
            return Err(DspError::InvalidRate("maximum block size must be > 0".into()));
        }

        let (in_sr, out_sr) = (in_sr as u64, out_sr as u64);
        let divider = gcd(in_sr, out_sr);
        let interp = (out_sr / divider) as usize;
        let decim = (in_sr / divider) as usize;

        let engine = if interp == 1 && decim == 1 {
            Engine::Passthrough
        } else {
            let tap_rate = input_rate * interp as f64;
            let cutoff = input_rate.min(output_rate) / 2.0;
            let taps = low_pass_taps(cutoff, cutoff * 0.1, tap_rate, false)?.scaled(interp as f32);
            Engine::Polyphase(Box::new(PolyphaseResampler::new(
                interp, decim, &taps, max_block,
            )))
        };

        Ok(Self {
            input_rate,
            output_rate,
            interp,
            decim,
            max_block,
            engine,
        })
    }

    pub fn input_rate(&self) -> f64 {
        self.input_rate
    }

    pub fn output_rate(&self) -> f64 {
        self.output_rate
    }

    pub fn ratio(&self) -> (usize, usize) {
        (self.interp, self.decim)
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    pub fn taps_per_phase(&self) -> usize {
        match &self.engine {
            Engine::Passthrough => 1,
            Engine::Polyphase(core) => core.taps_per_phase,
        }
    }

    /// Upper bound on samples produced from `input_len` input samples.
    pub fn max_output_len(&self, input_len: usize) -> usize {
        (input_len * self.interp).div_ceil(self.decim) + 1
    }

    pub fn reset(&mut self) {
        if let Engine::Polyphase(core) = &mut self.engine {
            core.reset();
        }
    }

    /// Resample `input`, appending to `output`. Returns the number of samples
    /// appended.
    pub fn process_into(&mut self, input: &[T], output: &mut Vec<T>) -> Result<usize, DspError> {
        if input.len() > self.max_block {
            return Err(DspError::BlockTooLarge {
                max: self.max_block,
                actual: input.len(),
            });
        }
        match &mut self.engine {
            Engine::Passthrough => {
                output.extend_from_slice(input);
                Ok(input.len())
            }
            Engine::Polyphase(core) => Ok(core.process(input, output)),
        }
    }

    pub fn process(&mut self, input: &[T]) -> Result<Vec<T>, DspError> {
        let mut out = Vec::with_capacity(self.max_output_len(input.len()));
        self.process_into(input, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                let t = n as f32;
                0.6 * (t * 0.013).sin() + 0.3 * (t * 0.17).cos()
            })
            .collect()
    }

    #[test]
    fn ratio_is_reduced() {
        let rs = RationalResampler::<f32>::new(250_000.0, 48_000.0, 4096).unwrap();
        assert_eq!(rs.ratio(), (24, 125));
        let rs = RationalResampler::<f32>::new(2_000_000.0, 50_000.0, 4096).unwrap();
        assert_eq!(rs.ratio(), (1, 40));
    }

    #[test]
    fn streaming_matches_single_call() {
        let input = test_signal(6000);
        let mut whole = RationalResampler::<f32>::new(50_000.0, 48_000.0, 8192).unwrap();
        let expected = whole.process(&input).unwrap();

        let mut split = RationalResampler::<f32>::new(50_000.0, 48_000.0, 8192).unwrap();
        let mut got = Vec::new();
        let sizes = [1usize, 7, 512, 3, 1000, 64, 2049];
        let mut pos = 0;
        let mut k = 0;
        while pos < input.len() {
            let n = sizes[k % sizes.len()].min(input.len() - pos);
            split.process_into(&input[pos..pos + n], &mut got).unwrap();
            pos += n;
            k += 1;
        }

        assert_eq!(got.len(), expected.len());
        for (i, (a, b)) in got.iter().zip(&expected).enumerate() {
            assert_approx_eq(*a, *b, 1e-6, &format!("sample {i}"));
        }
    }

    #[test]
    fn streaming_matches_for_complex_decimation() {
        let input: Vec<Complex<f32>> = test_signal(4000)
            .iter()
            .enumerate()
            .map(|(n, &v)| Complex::new(v, (n as f32 * 0.05).sin()))
            .collect();
        let mut whole = RationalResampler::<Complex<f32>>::new(200_000.0, 24_000.0, 4096).unwrap();
        let expected = whole.process(&input).unwrap();

        let mut split = RationalResampler::<Complex<f32>>::new(200_000.0, 24_000.0, 4096).unwrap();
        let mut got = Vec::new();
        for chunk in input.chunks(333) {
            split.process_into(chunk, &mut got).unwrap();
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn output_length_follows_ratio() {
        let mut rs = RationalResampler::<f32>::new(250_000.0, 48_000.0, 25_000).unwrap();
        let out = rs.process(&vec![0.0; 25_000]).unwrap();
        assert_eq!(out.len(), 4800);
        assert!(out.len() <= rs.max_output_len(25_000));
    }

    #[test]
    fn unity_dc_gain() {
        let mut rs = RationalResampler::<f32>::new(50_000.0, 48_000.0, 16_384).unwrap();
        let out = rs.process(&vec![0.5; 16_384]).unwrap();
        let settled = &out[out.len() - 200..];
        for (i, &v) in settled.iter().enumerate() {
            assert_approx_eq(v, 0.5, 0.01, &format!("settled sample {i}"));
        }
    }

    #[test]
    fn equal_rates_pass_through() {
        let mut rs = RationalResampler::<f32>::new(48_000.0, 48_000.0, 16).unwrap();
        assert_eq!(rs.ratio(), (1, 1));
        let input = [0.1, -0.2, 0.3];
        assert_eq!(rs.process(&input).unwrap(), input.to_vec());
    }

    #[test]
    fn oversized_block_is_rejected() {
        let mut rs = RationalResampler::<f32>::new(50_000.0, 48_000.0, 100).unwrap();
        let err = rs.process(&vec![0.0; 101]).unwrap_err();
        assert_eq!(err, DspError::BlockTooLarge { max: 100, actual: 101 });
    }

    #[test]
    fn invalid_rates_are_rejected() {
        assert!(matches!(
            RationalResampler::<f32>::new(0.0, 48_000.0, 16),
            Err(DspError::InvalidRate(_))
        ));
        assert!(matches!(
            RationalResampler::<f32>::new(48_000.0, f64::NAN, 16),
            Err(DspError::InvalidRate(_))
        ));
    }

    #[test]
    fn coprime_rates_hit_the_tap_limit() {
        // gcd(2_000_001, 48_000) = 3, so the prototype would run at 32 GHz.
        assert!(matches!(
            RationalResampler::<f32>::new(2_000_001.0, 48_000.0, 1024),
            Err(DspError::InvalidFilter(_))
        ));
    }

    #[test]
    fn phase_bank_covers_every_tap() {
        let taps = low_pass_taps(1000.0, 1000.0, 24_000.0, false).unwrap();
        let interp = 5;
        let bank = PolyphaseResampler::<f32>::new(interp, 2, &taps, 64);
        assert_eq!(bank.taps_per_phase * interp, taps.len().div_ceil(interp) * interp);
        let total: f32 = bank.phases.iter().flatten().sum();
        let expected: f32 = taps.taps().iter().sum();
        assert_approx_eq(total, expected, 1e-4, "tap sum");
    }

    #[test]
    fn reset_restores_initial_state() {
        let input = test_signal(1200);
        let mut rs = RationalResampler::<f32>::new(24_000.0, 48_000.0, 2048).unwrap();
        let first = rs.process(&input).unwrap();
        rs.process(&test_signal(77)).unwrap();
        rs.reset();
        assert_eq!(rs.process(&input).unwrap(), first);
    }
}
