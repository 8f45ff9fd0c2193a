// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-channel digital down-converter.
//!
//! NCO shift, polyphase resampling from the capture rate to the channel IF,
//! channel FIR and, for FM, the discriminator, audio FIR and resampling to the
//! 48 kHz audio rate.

use num_complex::Complex;
use sdrx_core::AUDIO_SAMPLE_RATE;

use crate::demod::{FmDiscriminator, WFM_DEVIATION_HZ};
use crate::filter::{low_pass_taps, FilterTapSet, FirFilter};
use crate::resample::RationalResampler;
use crate::squelch::Squelch;
use crate::{iq_from_i8, DspError};

/// Broadcast FM audio filter (Hz).
const WFM_AUDIO_CUTOFF_HZ: f64 = 15_000.0;
const WFM_AUDIO_TRANSITION_HZ: f64 = 4_000.0;
/// Channel cutoffs are kept under this fraction of the IF rate.
const MAX_CUTOFF_FRACTION: f64 = 0.49;
const TRANSITION_FRACTION: f64 = 0.1;
/// IF rate a new filter bank starts at.
pub const DEFAULT_IF_SAMPLE_RATE: f64 = 50_000.0;

/// Numerically controlled oscillator shifting `shift_hz` down to DC.
#[derive(Debug, Clone)]
struct Nco {
    phase: f64,
    phase_inc: f64,
}

impl Nco {
    fn new(sample_rate: f64, shift_hz: f64) -> Self {
        Self {
            phase: 0.0,
            phase_inc: Self::increment(sample_rate, shift_hz),
        }
    }

    fn increment(sample_rate: f64, shift_hz: f64) -> f64 {
        if sample_rate <= 0.0 {
            0.0
        } else {
            std::f64::consts::TAU * shift_hz / sample_rate
        }
    }

    fn set_shift(&mut self, sample_rate: f64, shift_hz: f64) {
        self.phase_inc = Self::increment(sample_rate, shift_hz);
    }

    fn mix_into(&mut self, raw: &[i8], output: &mut Vec<Complex<f32>>) {
        let n = raw.len() / 2;
        let phase_start = self.phase;
        let (mut sin_phase, mut cos_phase) = phase_start.sin_cos();
        let (sin_inc, cos_inc) = self.phase_inc.sin_cos();
        for pair in raw.chunks_exact(2) {
            let sample = iq_from_i8(pair[0], pair[1]);
            let lo = Complex::new(cos_phase as f32, -(sin_phase as f32));
            output.push(sample * lo);
            let next_sin = sin_phase * cos_inc + cos_phase * sin_inc;
            let next_cos = cos_phase * cos_inc - sin_phase * sin_inc;
            sin_phase = next_sin;
            cos_phase = next_cos;
        }
        // Resync from the exact phase once per block.
        self.phase = (phase_start + n as f64 * self.phase_inc).rem_euclid(std::f64::consts::TAU);
    }
}

pub struct ChannelFilterBank {
    capture_rate: f64,
    if_rate: f64,
    bandwidth_hz: f64,
    max_chunk: usize,
    wfm: bool,
    nco: Nco,
    resampler: RationalResampler<Complex<f32>>,
    channel_filter: FirFilter<Complex<f32>>,
    squelch: Squelch,
    discriminator: FmDiscriminator,
    audio_filter: FirFilter<f32>,
    audio_resampler: RationalResampler<f32>,
    last_squelched: bool,
    mixed: Vec<Complex<f32>>,
    baseband: Vec<Complex<f32>>,
    demod: Vec<f32>,
    audio: Vec<f32>,
}

impl ChannelFilterBank {
    /// `max_chunk` is the largest number of complex samples one call accepts.
    pub fn new(
        capture_rate: f64,
        shift_hz: f64,
        bandwidth_hz: f64,
        max_chunk: usize,
    ) -> Result<Self, DspError> {
        Self::with_if_rate(
            capture_rate,
            shift_hz,
            bandwidth_hz,
            DEFAULT_IF_SAMPLE_RATE,
            max_chunk,
        )
    }

    pub fn with_if_rate(
        capture_rate: f64,
        shift_hz: f64,
        bandwidth_hz: f64,
        if_rate: f64,
        max_chunk: usize,
    ) -> Result<Self, DspError> {
        if !(bandwidth_hz.is_finite() && bandwidth_hz > 0.0) {
            return Err(DspError::InvalidFilter(format!(
                "bandwidth {} Hz must be > 0",
                bandwidth_hz
            )));
        }
        if !shift_hz.is_finite() {
            return Err(DspError::InvalidParameter(format!(
                "shift {} Hz is not finite",
                shift_hz
            )));
        }
        let resampler = RationalResampler::new(capture_rate, if_rate, max_chunk)?;
        let max_if = resampler.max_output_len(max_chunk);
        let audio_resampler = RationalResampler::new(if_rate, AUDIO_SAMPLE_RATE as f64, max_if)?;
        let max_audio = audio_resampler.max_output_len(max_if);

        let channel_filter = FirFilter::new(&Self::channel_taps(bandwidth_hz, if_rate)?);
        let audio_filter = FirFilter::new(&Self::audio_taps(bandwidth_hz, if_rate, false)?);

        Ok(Self {
            capture_rate,
            if_rate,
            bandwidth_hz,
            max_chunk,
            wfm: false,
            nco: Nco::new(capture_rate, shift_hz),
            resampler,
            channel_filter,
            squelch: Squelch::default(),
            discriminator: FmDiscriminator::new(if_rate, Self::deviation(bandwidth_hz, false)),
            audio_filter,
            audio_resampler,
            last_squelched: false,
            mixed: Vec::with_capacity(max_chunk),
            baseband: Vec::with_capacity(max_if),
            demod: Vec::with_capacity(max_if),
            audio: Vec::with_capacity(max_audio),
        })
    }

    fn channel_taps(bandwidth_hz: f64, if_rate: f64) -> Result<FilterTapSet, DspError> {
        let cutoff = (bandwidth_hz / 2.0).min(if_rate * MAX_CUTOFF_FRACTION);
        low_pass_taps(cutoff, cutoff * TRANSITION_FRACTION, if_rate, false)
    }

    fn audio_taps(
        bandwidth_hz: f64,
        if_rate: f64,
        wfm: bool,
    ) -> Result<FilterTapSet, DspError> {
        if wfm {
            let cutoff = WFM_AUDIO_CUTOFF_HZ.min(if_rate * MAX_CUTOFF_FRACTION);
            low_pass_taps(cutoff, WFM_AUDIO_TRANSITION_HZ, if_rate, false)
        } else {
            let cutoff = (bandwidth_hz / 2.0).min(if_rate * MAX_CUTOFF_FRACTION);
            low_pass_taps(cutoff, cutoff * TRANSITION_FRACTION, if_rate, false)
        }
    }

    fn deviation(bandwidth_hz: f64, wfm: bool) -> f64 {
        if wfm {
            WFM_DEVIATION_HZ
        } else {
            bandwidth_hz / 2.0
        }
    }

    pub fn capture_rate(&self) -> f64 {
        self.capture_rate
    }

    pub fn if_sample_rate(&self) -> f64 {
        self.if_rate
    }

    pub fn bandwidth_hz(&self) -> f64 {
        self.bandwidth_hz
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    pub fn is_wfm(&self) -> bool {
        self.wfm
    }

    pub fn squelch(&self) -> &Squelch {
        &self.squelch
    }

    /// Whether the last [`ChannelFilterBank::process`] call was gated.
    pub fn last_block_squelched(&self) -> bool {
        self.last_squelched
    }

    /// Upper bound on IF samples produced from `samples` complex input samples.
    pub fn max_if_len(&self, samples: usize) -> usize {
        self.resampler.max_output_len(samples)
    }

    /// Upper bound on audio samples produced from `samples` complex input samples.
    pub fn max_audio_len(&self, samples: usize) -> usize {
        self.audio_resampler.max_output_len(self.max_if_len(samples))
    }

    /// Retune the NCO. A different `sample_rate` rebuilds the whole chain.
    pub fn set_shift(&mut self, sample_rate: f64, shift_hz: f64) -> Result<(), DspError> {
        if !shift_hz.is_finite() {
            return Err(DspError::InvalidParameter(format!(
                "shift {} Hz is not finite",
                shift_hz
            )));
        }
        if sample_rate != self.capture_rate {
            let previous = self.capture_rate;
            self.capture_rate = sample_rate;
            if let Err(err) = self.set_if_sample_rate(self.if_rate) {
                self.capture_rate = previous;
                return Err(err);
            }
        }
        self.nco.set_shift(sample_rate, shift_hz);
        Ok(())
    }

    pub fn set_bandwidth(&mut self, bandwidth_hz: f64) -> Result<(), DspError> {
        if !(bandwidth_hz.is_finite() && bandwidth_hz > 0.0) {
            return Err(DspError::InvalidFilter(format!(
                "bandwidth {} Hz must be > 0",
                bandwidth_hz
            )));
        }
        let channel = Self::channel_taps(bandwidth_hz, self.if_rate)?;
        let audio = Self::audio_taps(bandwidth_hz, self.if_rate, self.wfm)?;
        self.channel_filter = FirFilter::new(&channel);
        self.audio_filter = FirFilter::new(&audio);
        self.discriminator
            .set_deviation(self.if_rate, Self::deviation(bandwidth_hz, self.wfm));
        self.bandwidth_hz = bandwidth_hz;
        Ok(())
    }

    /// Rebuild the resampler and filter chain for a new IF rate and reset all state.
    pub fn set_if_sample_rate(&mut self, if_rate: f64) -> Result<(), DspError> {
        let resampler = RationalResampler::new(self.capture_rate, if_rate, self.max_chunk)?;
        let max_if = resampler.max_output_len(self.max_chunk);
        let audio_resampler = RationalResampler::new(if_rate, AUDIO_SAMPLE_RATE as f64, max_if)?;
        let max_audio = audio_resampler.max_output_len(max_if);
        let channel = Self::channel_taps(self.bandwidth_hz, if_rate)?;
        let audio = Self::audio_taps(self.bandwidth_hz, if_rate, self.wfm)?;

        self.resampler = resampler;
        self.audio_resampler = audio_resampler;
        self.channel_filter = FirFilter::new(&channel);
        self.audio_filter = FirFilter::new(&audio);
        self.discriminator =
            FmDiscriminator::new(if_rate, Self::deviation(self.bandwidth_hz, self.wfm));
        self.if_rate = if_rate;

        self.baseband.reserve(max_if.saturating_sub(self.baseband.len()));
        self.demod.reserve(max_if.saturating_sub(self.demod.len()));
        self.audio.reserve(max_audio.saturating_sub(self.audio.len()));
        self.reset();
        Ok(())
    }

    /// Switch the FM audio path between broadcast and narrowband constants.
    pub fn set_wfm_mode(&mut self, enabled: bool) -> Result<(), DspError> {
        if enabled == self.wfm {
            return Ok(());
        }
        let audio = Self::audio_taps(self.bandwidth_hz, self.if_rate, enabled)?;
        self.audio_filter = FirFilter::new(&audio);
        self.discriminator
            .set_deviation(self.if_rate, Self::deviation(self.bandwidth_hz, enabled));
        self.wfm = enabled;
        Ok(())
    }

    pub fn set_squelch(&mut self, level_db: f32, enabled: bool) {
        self.squelch = Squelch::new(level_db, enabled);
    }

    /// Zero filter histories, oscillator phase and resampler delay lines.
    pub fn reset(&mut self) {
        self.nco.phase = 0.0;
        self.resampler.reset();
        self.channel_filter.reset();
        self.discriminator.reset();
        self.audio_filter.reset();
        self.audio_resampler.reset();
        self.last_squelched = false;
    }

    fn check_input(&self, raw: &[i8]) -> Result<usize, DspError> {
        if raw.len() % 2 != 0 {
            return Err(DspError::BufferLength {
                what: "interleaved IQ input",
                expected: raw.len() + 1,
                actual: raw.len(),
            });
        }
        let samples = raw.len() / 2;
        if samples > self.max_chunk {
            return Err(DspError::BlockTooLarge {
                max: self.max_chunk,
                actual: samples,
            });
        }
        Ok(samples)
    }

    fn front_end(&mut self, raw: &[i8]) -> Result<(), DspError> {
        self.mixed.clear();
        self.nco.mix_into(raw, &mut self.mixed);
        self.baseband.clear();
        self.resampler.process_into(&self.mixed, &mut self.baseband)?;
        self.channel_filter.filter_in_place(&mut self.baseband);
        Ok(())
    }

    /// Full FM chain. Writes 48 kHz audio into `output` and returns the count.
    pub fn process(&mut self, raw: &[i8], output: &mut [f32]) -> Result<usize, DspError> {
        let samples = self.check_input(raw)?;
        let needed = self.max_audio_len(samples);
        if output.len() < needed {
            return Err(DspError::BufferLength {
                what: "audio output",
                expected: needed,
                actual: output.len(),
            });
        }

        self.front_end(raw)?;

        self.last_squelched = self.squelch.is_closed(&self.baseband);
        if self.last_squelched {
            self.baseband.fill(Complex::new(0.0, 0.0));
        }

        self.demod.clear();
        self.discriminator.process_into(&self.baseband, &mut self.demod);
        self.audio_filter.filter_in_place(&mut self.demod);

        self.audio.clear();
        let count = self
            .audio_resampler
            .process_into(&self.demod, &mut self.audio)?;
        output[..count].copy_from_slice(&self.audio);
        Ok(count)
    }

    /// NCO, resampling and channel filter only. Writes IF-rate IQ into
    /// `output` and returns the count.
    pub fn process_iq_only(
        &mut self,
        raw: &[i8],
        output: &mut [Complex<f32>],
    ) -> Result<usize, DspError> {
        let samples = self.check_input(raw)?;
        let needed = self.max_if_len(samples);
        if output.len() < needed {
            return Err(DspError::BufferLength {
                what: "IF output",
                expected: needed,
                actual: output.len(),
            });
        }

        self.front_end(raw)?;
        let count = self.baseband.len();
        output[..count].copy_from_slice(&self.baseband);
        Ok(count)
    }
}
