// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;
use sdrx_core::{DemodMode, VfoId, VfoInfo, VfoParams, VfoPatch, AUDIO_SAMPLE_RATE};
use tracing::debug;

use crate::channel::ChannelFilterBank;
use crate::demod::{translation_hz, DemodState};
use crate::resample::RationalResampler;
use crate::{hard_clip, DspError};

/// Audio produced by one channel for one capture chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelBlock {
    /// 48 kHz mono audio, clipped to `[-1, 1]`, before volume.
    pub audio: Vec<f32>,
    /// The squelch gate replaced this block with silence.
    pub squelched: bool,
}

/// One receive channel: parameters plus every piece of DSP state it owns.
pub struct VfoChannel {
    id: VfoId,
    params: VfoParams,
    center_hz: f64,
    capture_rate: f64,
    ddc: ChannelFilterBank,
    demod: DemodState,
    /// IF to audio rate for the non-FM modes.
    audio_resampler: RationalResampler<f32>,
    iq_buf: Vec<Complex<f32>>,
    demod_buf: Vec<f32>,
    audio_buf: Vec<f32>,
}

impl VfoChannel {
    /// `max_chunk` is the largest capture chunk, in complex samples.
    pub fn new(
        id: VfoId,
        params: VfoParams,
        center_hz: f64,
        capture_rate: f64,
        max_chunk: usize,
    ) -> Result<Self, DspError> {
        Self::check_params(&params, capture_rate)?;
        let if_rate = params.mode.if_sample_rate(capture_rate);
        let mut ddc = ChannelFilterBank::with_if_rate(
            capture_rate,
            params.freq_hz - center_hz,
            params.bandwidth_hz,
            if_rate,
            max_chunk,
        )?;
        ddc.set_wfm_mode(params.mode == DemodMode::Wfm)?;
        ddc.set_squelch(params.squelch_level_db, params.squelch_enabled);

        let max_if = ddc.max_if_len(max_chunk);
        let audio_resampler = RationalResampler::new(if_rate, AUDIO_SAMPLE_RATE as f64, max_if)?;
        let max_audio = ddc
            .max_audio_len(max_chunk)
            .max(audio_resampler.max_output_len(max_if));

        Ok(Self {
            id,
            demod: DemodState::for_mode(params.mode, if_rate, params.de_emphasis),
            params,
            center_hz,
            capture_rate,
            ddc,
            audio_resampler,
            iq_buf: vec![Complex::new(0.0, 0.0); max_if],
            demod_buf: Vec::with_capacity(max_if),
            audio_buf: vec![0.0; max_audio],
        })
    }

    pub fn id(&self) -> VfoId {
        self.id
    }

    pub fn params(&self) -> &VfoParams {
        &self.params
    }

    pub fn offset_hz(&self) -> f64 {
        self.params.freq_hz - self.center_hz
    }

    pub fn if_sample_rate(&self) -> f64 {
        self.ddc.if_sample_rate()
    }

    /// `None` for modes without an AGC.
    pub fn agc_gain(&self) -> Option<f32> {
        self.demod.agc_gain()
    }

    /// `None` for modes without a DC tracker.
    pub fn dc_average(&self) -> Option<f32> {
        self.demod.dc_average()
    }

    pub fn rotator_phase(&self) -> Option<f64> {
        self.demod.phase()
    }

    pub fn info(&self) -> VfoInfo {
        VfoInfo {
            id: self.id,
            freq_hz: self.params.freq_hz,
            offset_hz: self.offset_hz(),
            mode: self.params.mode,
            bandwidth_hz: self.params.bandwidth_hz,
            enabled: self.params.enabled,
            volume: self.params.volume,
            squelch_enabled: self.params.squelch_enabled,
            stereo: self.params.stereo,
            noise_reduction: self.params.noise_reduction,
        }
    }

    fn check_params(params: &VfoParams, capture_rate: f64) -> Result<(), DspError> {
        params.validate().map_err(DspError::InvalidParameter)?;
        if params.bandwidth_hz > capture_rate {
            return Err(DspError::InvalidParameter(format!(
                "bandwidth_hz {} exceeds the capture rate {}",
                params.bandwidth_hz, capture_rate
            )));
        }
        Ok(())
    }

    /// Merge `patch` and push the changes into the DSP state right away.
    ///
    /// On error the channel is left exactly as it was.
    pub fn apply_patch(&mut self, patch: &VfoPatch) -> Result<(), DspError> {
        let mut next = self.params.clone();
        next.apply(patch);
        Self::check_params(&next, self.capture_rate)?;

        if next.mode != self.params.mode {
            self.switch_mode(next)?;
            return Ok(());
        }

        // The only fallible step left; it swaps filters only once both are designed.
        if next.bandwidth_hz != self.params.bandwidth_hz {
            self.ddc.set_bandwidth(next.bandwidth_hz)?;
        }
        if next.freq_hz != self.params.freq_hz {
            self.ddc
                .set_shift(self.capture_rate, next.freq_hz - self.center_hz)?;
        }
        if patch.touches_squelch() {
            self.ddc
                .set_squelch(next.squelch_level_db, next.squelch_enabled);
        }
        if next.de_emphasis != self.params.de_emphasis {
            self.demod.set_de_emphasis(next.de_emphasis);
        }

        self.params = next;
        Ok(())
    }

    /// Rebuild the whole channel for `next`: fresh demodulator, filter
    /// histories, oscillator phase and resamplers.
    fn switch_mode(&mut self, next: VfoParams) -> Result<(), DspError> {
        let fresh = VfoChannel::new(
            self.id,
            next,
            self.center_hz,
            self.capture_rate,
            self.ddc.max_chunk(),
        )?;
        debug!(
            "vfo {}: mode {} -> {} (IF {} Hz)",
            self.id,
            self.params.mode,
            fresh.params.mode,
            fresh.if_sample_rate()
        );
        *self = fresh;
        Ok(())
    }

    /// Move the capture center; the channel keeps its absolute frequency.
    pub fn set_center_frequency(&mut self, center_hz: f64) -> Result<(), DspError> {
        self.ddc
            .set_shift(self.capture_rate, self.params.freq_hz - center_hz)?;
        self.center_hz = center_hz;
        Ok(())
    }

    /// Run one capture chunk through the channel.
    pub fn process(&mut self, raw: &[i8]) -> Result<ChannelBlock, DspError> {
        if self.params.mode.is_fm() {
            self.process_fm(raw)
        } else {
            self.process_iq(raw)
        }
    }

    fn process_fm(&mut self, raw: &[i8]) -> Result<ChannelBlock, DspError> {
        let count = self.ddc.process(raw, &mut self.audio_buf)?;
        let mut audio = self.audio_buf[..count].to_vec();
        self.demod.finish_audio(&mut audio);
        hard_clip(&mut audio);
        Ok(ChannelBlock {
            audio,
            squelched: self.ddc.last_block_squelched(),
        })
    }

    fn process_iq(&mut self, raw: &[i8]) -> Result<ChannelBlock, DspError> {
        let count = self.ddc.process_iq_only(raw, &mut self.iq_buf)?;
        if count == 0 {
            return Ok(ChannelBlock::default());
        }
        let iq = &self.iq_buf[..count];

        let squelched = self.ddc.squelch().is_closed(iq);
        self.demod_buf.clear();
        if squelched {
            // Silence still runs through the resampler to keep its timing.
            self.demod_buf.resize(count, 0.0);
        } else {
            let shift = translation_hz(
                self.params.mode,
                self.params.bandwidth_hz,
                self.params.cw_tone_hz,
            );
            self.demod.demodulate_into(
                iq,
                shift,
                self.ddc.if_sample_rate(),
                &mut self.demod_buf,
            );
        }

        let mut audio = self.audio_resampler.process(&self.demod_buf)?;
        hard_clip(&mut audio);
        Ok(ChannelBlock { audio, squelched })
    }
}
