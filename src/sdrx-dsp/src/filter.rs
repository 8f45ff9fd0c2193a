// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Windowed-sinc FIR design (Nuttall window) and a streaming FIR stage.

use std::f64::consts::PI;

use crate::{DspError, Sample};

const NUTTALL_COEFFS: [f64; 4] = [0.355768, 0.487396, 0.144232, 0.012604];

/// Largest tap count the designer will produce.
pub const MAX_FILTER_TAPS: usize = 1 << 21;

/// Which response a [`FilterTapSet`] was designed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    LowPass,
    HighPass,
    BandPass { center_hz: f64 },
}

/// Immutable FIR coefficients plus the parameters they were derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTapSet {
    taps: Vec<f32>,
    kind: FilterKind,
    sample_rate: f64,
    cutoff_hz: f64,
    transition_width_hz: f64,
}

impl FilterTapSet {
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Cutoff for low/high-pass sets, half bandwidth for band-pass sets.
    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn transition_width_hz(&self) -> f64 {
        self.transition_width_hz
    }

    /// New set with every coefficient multiplied by `gain`.
    pub fn scaled(&self, gain: f32) -> Self {
        Self {
            taps: self.taps.iter().map(|tap| tap * gain).collect(),
            ..self.clone()
        }
    }

    /// New set zero-padded at the end to `len` coefficients.
    pub fn padded(&self, len: usize) -> Self {
        let mut taps = self.taps.clone();
        if taps.len() < len {
            taps.resize(len, 0.0);
        }
        Self {
            taps,
            ..self.clone()
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        x.sin() / x
    }
}

fn cosine_window(n: f64, big_n: f64, coeffs: &[f64]) -> f64 {
    let mut win = 0.0;
    let mut sign = 1.0;
    for (k, coeff) in coeffs.iter().enumerate() {
        win += sign * coeff * (k as f64 * 2.0 * PI * n / big_n).cos();
        sign = -sign;
    }
    win
}

fn nuttall(n: f64, big_n: f64) -> f64 {
    cosine_window(n, big_n, &NUTTALL_COEFFS)
}

fn hz_to_rads(freq: f64, sample_rate: f64) -> f64 {
    2.0 * PI * freq / sample_rate
}

/// Number of taps needed for the given transition width.
///
/// Saturates at `usize::MAX`; the designers reject anything above
/// [`MAX_FILTER_TAPS`].
pub fn estimate_tap_count(transition_width_hz: f64, sample_rate: f64) -> usize {
    (3.8 * sample_rate / transition_width_hz).floor() as usize
}

fn tap_count(
    transition_width_hz: f64,
    sample_rate: f64,
    odd_length: bool,
) -> Result<usize, DspError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(DspError::InvalidFilter(format!(
            "sample rate {} must be > 0",
            sample_rate
        )));
    }
    if !(transition_width_hz.is_finite() && transition_width_hz > 0.0) {
        return Err(DspError::InvalidFilter(format!(
            "transition width {} Hz must be > 0",
            transition_width_hz
        )));
    }
    let mut count = estimate_tap_count(transition_width_hz, sample_rate);
    if count > MAX_FILTER_TAPS {
        return Err(DspError::InvalidFilter(format!(
            "transition width {} Hz at {} Hz needs {} taps, limit is {}",
            transition_width_hz, sample_rate, count, MAX_FILTER_TAPS
        )));
    }
    if odd_length && count % 2 == 0 {
        count += 1;
    }
    if count == 0 {
        return Err(DspError::InvalidFilter(format!(
            "transition width {} Hz is too wide for {} Hz",
            transition_width_hz, sample_rate
        )));
    }
    Ok(count)
}

fn check_cutoff(cutoff_hz: f64, sample_rate: f64) -> Result<(), DspError> {
    if !(cutoff_hz > 0.0 && cutoff_hz < sample_rate / 2.0) {
        return Err(DspError::InvalidFilter(format!(
            "cutoff {} Hz outside (0, {}) Hz",
            cutoff_hz,
            sample_rate / 2.0
        )));
    }
    Ok(())
}

fn windowed_sinc(count: usize, omega: f64, window: impl Fn(f64, f64) -> f64) -> Vec<f32> {
    let big_n = count as f64;
    let half = big_n / 2.0;
    let corr = omega / PI;
    (0..count)
        .map(|i| {
            let t = i as f64 - half + 0.5;
            (sinc(t * omega) * window(t - half, big_n) * corr) as f32
        })
        .collect()
}

pub fn low_pass_taps(
    cutoff_hz: f64,
    transition_width_hz: f64,
    sample_rate: f64,
    odd_length: bool,
) -> Result<FilterTapSet, DspError> {
    let count = tap_count(transition_width_hz, sample_rate, odd_length)?;
    check_cutoff(cutoff_hz, sample_rate)?;
    let omega = hz_to_rads(cutoff_hz, sample_rate);
    Ok(FilterTapSet {
        taps: windowed_sinc(count, omega, nuttall),
        kind: FilterKind::LowPass,
        sample_rate,
        cutoff_hz,
        transition_width_hz,
    })
}

/// Low-pass prototype at the mirrored cutoff, spectrally inverted.
pub fn high_pass_taps(
    cutoff_hz: f64,
    transition_width_hz: f64,
    sample_rate: f64,
    odd_length: bool,
) -> Result<FilterTapSet, DspError> {
    let count = tap_count(transition_width_hz, sample_rate, odd_length)?;
    check_cutoff(cutoff_hz, sample_rate)?;
    let omega = hz_to_rads(sample_rate / 2.0 - cutoff_hz, sample_rate);
    let taps = windowed_sinc(count, omega, |n, big_n| {
        let sign = if (n.round().abs() as u64) % 2 != 0 {
            -1.0
        } else {
            1.0
        };
        nuttall(n, big_n) * sign
    });
    Ok(FilterTapSet {
        taps,
        kind: FilterKind::HighPass,
        sample_rate,
        cutoff_hz,
        transition_width_hz,
    })
}

/// Band-pass between `band_start_hz` and `band_stop_hz`; either edge may be
/// negative for complex signals.
pub fn band_pass_taps(
    band_start_hz: f64,
    band_stop_hz: f64,
    transition_width_hz: f64,
    sample_rate: f64,
    odd_length: bool,
) -> Result<FilterTapSet, DspError> {
    let count = tap_count(transition_width_hz, sample_rate, odd_length)?;
    let nyquist = sample_rate / 2.0;
    if !(band_start_hz < band_stop_hz && band_start_hz > -nyquist && band_stop_hz < nyquist) {
        return Err(DspError::InvalidFilter(format!(
            "band {}..{} Hz invalid for {} Hz",
            band_start_hz, band_stop_hz, sample_rate
        )));
    }
    let center_hz = (band_start_hz + band_stop_hz) / 2.0;
    let half_width = (band_stop_hz - band_start_hz) / 2.0;
    let offset_omega = hz_to_rads(center_hz, sample_rate);
    let omega = hz_to_rads(half_width, sample_rate);
    let taps = windowed_sinc(count, omega, |n, big_n| {
        2.0 * (offset_omega * n).cos() * nuttall(n, big_n)
    });
    Ok(FilterTapSet {
        taps,
        kind: FilterKind::BandPass { center_hz },
        sample_rate,
        cutoff_hz: half_width,
        transition_width_hz,
    })
}

/// Streaming FIR stage with a circular history buffer.
pub struct FirFilter<T: Sample> {
    taps: Vec<f32>,
    history: Vec<T>,
    pos: usize,
}

impl<T: Sample> FirFilter<T> {
    pub fn new(tap_set: &FilterTapSet) -> Self {
        let taps = if tap_set.is_empty() {
            vec![1.0]
        } else {
            tap_set.taps().to_vec()
        };
        let history = vec![T::default(); taps.len()];
        Self {
            taps,
            history,
            pos: 0,
        }
    }

    pub fn reset(&mut self) {
        self.history.fill(T::default());
        self.pos = 0;
    }

    pub fn process(&mut self, sample: T) -> T {
        let len = self.history.len();
        self.history[self.pos] = sample;

        // Newest sample meets taps[0], walking back through the ring.
        let (recent, wrapped) = self.history.split_at(self.pos + 1);
        let mut acc = T::default();
        let mut taps = self.taps.iter();
        for (&x, &c) in recent.iter().rev().zip(&mut taps) {
            acc = acc + x * c;
        }
        for (&x, &c) in wrapped.iter().rev().zip(&mut taps) {
            acc = acc + x * c;
        }

        self.pos += 1;
        if self.pos >= len {
            self.pos = 0;
        }
        acc
    }

    pub fn filter_in_place(&mut self, block: &mut [T]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}
