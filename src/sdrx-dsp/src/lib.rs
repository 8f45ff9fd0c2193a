// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver DSP engine: per-channel down-conversion, demodulation, mixing,
//! spectrum analysis and audio batching over one shared IQ capture stream.

pub mod agc;
pub mod batch;
pub mod channel;
pub mod demod;
pub mod error;
pub mod filter;
pub mod manager;
pub mod pipeline;
pub mod resample;
pub mod spectrum;
pub mod squelch;
pub mod telemetry;
pub mod vfo;

use std::ops::{Add, Mul};

use num_complex::Complex;

pub use error::DspError;
pub use manager::VfoManager;
pub use pipeline::{PipelineConfig, PipelineSink, PipelineState};
pub use spectrum::{SpectrumAnalyzer, SpectrumFrame};

/// Sample types that flow through FIR and resampler stages.
pub trait Sample: Copy + Default + Add<Output = Self> + Mul<f32, Output = Self> + Send + 'static {}

impl Sample for f32 {}
impl Sample for Complex<f32> {}

/// Convert interleaved signed 8-bit I/Q bytes to a complex sample.
#[inline]
pub fn iq_from_i8(i: i8, q: i8) -> Complex<f32> {
    Complex::new(i as f32 / 128.0, q as f32 / 128.0)
}

/// Clamp every sample to `[-1, 1]`.
pub fn hard_clip(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        *sample = sample.clamp(-1.0, 1.0);
    }
}
