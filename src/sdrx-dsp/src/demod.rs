// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod am;
mod fm;
mod ssb;

use num_complex::Complex;
use sdrx_core::{DeEmphasis, DemodMode, AUDIO_SAMPLE_RATE};

pub use am::AmDemod;
pub use fm::{DeEmphasisFilter, FmDiscriminator, WFM_DEVIATION_HZ};
pub use ssb::SidebandDemod;

/// Frequency the sideband rotator translates the IF by for `mode`.
pub fn translation_hz(mode: DemodMode, bandwidth_hz: f64, cw_tone_hz: f64) -> f64 {
    match mode {
        DemodMode::Usb => bandwidth_hz / 2.0,
        DemodMode::Lsb => -bandwidth_hz / 2.0,
        DemodMode::Cw => cw_tone_hz,
        _ => 0.0,
    }
}

/// Mode-specific demodulator state.
///
/// FM demodulation runs inside the channel filter bank; this variant only
/// keeps the post-demod de-emphasis at the audio rate. The other variants
/// consume IF-rate IQ and produce IF-rate audio.
#[derive(Debug, Clone)]
pub enum DemodState {
    Fm(DeEmphasisFilter),
    Am(AmDemod),
    Sideband(SidebandDemod),
    Raw,
}

impl DemodState {
    /// Fresh state: AGC gain 1.0, DC average 0, phase 0.
    pub fn for_mode(mode: DemodMode, if_sample_rate: f64, de_emphasis: DeEmphasis) -> Self {
        match mode {
            DemodMode::Nfm | DemodMode::Wfm => Self::Fm(DeEmphasisFilter::new(
                de_emphasis,
                AUDIO_SAMPLE_RATE as f64,
            )),
            DemodMode::Am => Self::Am(AmDemod::new(if_sample_rate)),
            DemodMode::Usb | DemodMode::Lsb | DemodMode::Dsb | DemodMode::Cw => {
                Self::Sideband(SidebandDemod::new(if_sample_rate))
            }
            DemodMode::Raw => Self::Raw,
        }
    }

    pub fn agc_gain(&self) -> Option<f32> {
        match self {
            Self::Am(demod) => Some(demod.agc_gain()),
            Self::Sideband(demod) => Some(demod.agc_gain()),
            _ => None,
        }
    }

    pub fn dc_average(&self) -> Option<f32> {
        match self {
            Self::Am(demod) => Some(demod.dc_average()),
            _ => None,
        }
    }

    pub fn phase(&self) -> Option<f64> {
        match self {
            Self::Sideband(demod) => Some(demod.phase()),
            _ => None,
        }
    }

    pub fn set_de_emphasis(&mut self, de_emphasis: DeEmphasis) {
        if let Self::Fm(filter) = self {
            filter.set_mode(de_emphasis, AUDIO_SAMPLE_RATE as f64);
        }
    }

    /// Demodulate IF-rate IQ into IF-rate audio. FM state produces nothing.
    pub fn demodulate_into(
        &mut self,
        iq: &[Complex<f32>],
        translation_hz: f64,
        if_sample_rate: f64,
        output: &mut Vec<f32>,
    ) {
        match self {
            Self::Fm(_) => {}
            Self::Am(demod) => demod.process_into(iq, output),
            Self::Sideband(demod) => {
                demod.process_into(iq, translation_hz, if_sample_rate, output)
            }
            Self::Raw => output.extend(iq.iter().map(|s| s.re)),
        }
    }

    /// Post-resample audio stage (de-emphasis for FM).
    pub fn finish_audio(&mut self, audio: &mut [f32]) {
        if let Self::Fm(filter) = self {
            filter.process_in_place(audio);
        }
    }
}
