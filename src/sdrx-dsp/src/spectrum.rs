// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex as FftComplex;
use rustfft::{Fft, FftPlanner};

use crate::DspError;

/// Emit one frame every this many filled FFT buffers.
pub const DEFAULT_FRAME_DECIMATION: usize = 15;
const ALPHA: f32 = 0.16;
const MAG_FLOOR: f32 = 1e-10;

/// One DC-centered dB spectrum: negative frequencies first.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub bins_db: Vec<f32>,
    /// Running frame counter.
    pub sequence: u64,
}

/// Three-term raised-cosine window (`alpha = 0.16`) sampled at `i / n`.
pub fn default_window(fft_size: usize) -> Vec<f32> {
    let a0 = (1.0 - ALPHA) / 2.0;
    let a1 = 0.5;
    let a2 = ALPHA / 2.0;
    (0..fft_size)
        .map(|i| {
            let x = i as f32 / fft_size as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

pub struct SpectrumAnalyzer {
    fft_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buf: Vec<FftComplex<f32>>,
    scratch: Vec<FftComplex<f32>>,
    smoothed: Vec<f32>,
    primed: bool,
    smoothing_speed: f32,
    accum: Vec<i8>,
    accum_pos: usize,
    frame_decimation: usize,
    filled: u64,
    frames: u64,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize, window: Vec<f32>) -> Result<Self, DspError> {
        if fft_size == 0 || !fft_size.is_power_of_two() {
            return Err(DspError::InvalidFftSize(fft_size));
        }
        if window.len() != fft_size {
            return Err(DspError::WindowLength {
                expected: fft_size,
                actual: window.len(),
            });
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![FftComplex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            fft_size,
            window,
            fft,
            buf: vec![FftComplex::new(0.0, 0.0); fft_size],
            scratch,
            smoothed: vec![0.0; fft_size],
            primed: false,
            smoothing_speed: 1.0,
            accum: vec![0; fft_size * 2],
            accum_pos: 0,
            frame_decimation: DEFAULT_FRAME_DECIMATION,
            filled: 0,
            frames: 0,
        })
    }

    pub fn with_default_window(fft_size: usize) -> Result<Self, DspError> {
        if fft_size == 0 || !fft_size.is_power_of_two() {
            return Err(DspError::InvalidFftSize(fft_size));
        }
        Self::new(fft_size, default_window(fft_size))
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Weight of the newest frame in the moving average; 1.0 disables smoothing.
    pub fn set_smoothing_speed(&mut self, speed: f32) {
        self.smoothing_speed = if speed.is_finite() {
            speed.clamp(f32::EPSILON, 1.0)
        } else {
            1.0
        };
    }

    pub fn set_frame_decimation(&mut self, every: usize) {
        self.frame_decimation = every.max(1);
    }

    /// Window, transform, center, smooth and convert one buffer of
    /// `fft_size` interleaved i8 IQ pairs into `out`.
    pub fn compute(&mut self, raw: &[i8], out: &mut [f32]) -> Result<(), DspError> {
        if raw.len() != self.fft_size * 2 {
            return Err(DspError::BufferLength {
                what: "spectrum input",
                expected: self.fft_size * 2,
                actual: raw.len(),
            });
        }
        if out.len() != self.fft_size {
            return Err(DspError::BufferLength {
                what: "spectrum output",
                expected: self.fft_size,
                actual: out.len(),
            });
        }
        self.transform(raw, out);
        Ok(())
    }

    fn transform(&mut self, raw: &[i8], out: &mut [f32]) {
        for ((slot, pair), &w) in self.buf.iter_mut().zip(raw.chunks_exact(2)).zip(&self.window) {
            *slot = FftComplex::new(pair[0] as f32 / 128.0 * w, pair[1] as f32 / 128.0 * w);
        }
        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        let n = self.fft_size;
        let half = n / 2;
        let norm = 1.0 / n as f32;
        let speed = self.smoothing_speed;
        for (i, slot) in out.iter_mut().enumerate() {
            // out[0..half] <- X[half..n], out[half..n] <- X[0..half]
            let src = (i + half) % n;
            let mag = self.buf[src].norm() * norm;
            let smoothed = if self.primed {
                speed * mag + (1.0 - speed) * self.smoothed[i]
            } else {
                mag
            };
            self.smoothed[i] = smoothed;
            *slot = 20.0 * smoothed.max(MAG_FLOOR).log10();
        }
        self.primed = true;
    }

    /// Accumulate capture bytes and call `emit` for every decimated frame.
    pub fn push(&mut self, raw: &[i8], mut emit: impl FnMut(SpectrumFrame)) {
        let mut src = raw;
        while !src.is_empty() {
            let space = self.accum.len() - self.accum_pos;
            let take = space.min(src.len());
            self.accum[self.accum_pos..self.accum_pos + take].copy_from_slice(&src[..take]);
            self.accum_pos += take;
            src = &src[take..];

            if self.accum_pos == self.accum.len() {
                self.accum_pos = 0;
                self.filled += 1;
                if self.filled % self.frame_decimation as u64 == 0 {
                    let accum = std::mem::take(&mut self.accum);
                    let mut bins_db = vec![0.0; self.fft_size];
                    self.transform(&accum, &mut bins_db);
                    self.accum = accum;
                    emit(SpectrumFrame {
                        bins_db,
                        sequence: self.frames,
                    });
                    self.frames += 1;
                }
            }
        }
    }

    /// Clear the accumulator and smoothing memory.
    pub fn reset(&mut self) {
        self.accum_pos = 0;
        self.filled = 0;
        self.primed = false;
        self.smoothed.fill(0.0);
    }
}
