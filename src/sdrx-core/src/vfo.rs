// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mode::{DeEmphasis, DemodMode};

/// Stable identifier of a receive channel.
///
/// Survives removal of other channels, unlike a positional index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VfoId(Uuid);

impl VfoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VfoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VfoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First group is enough to tell channels apart in logs.
        let text = self.0.to_string();
        f.write_str(&text[..8])
    }
}

/// Narrowest channel the filter designer is asked for (Hz).
pub const MIN_BANDWIDTH_HZ: f64 = 100.0;

/// Full parameter set of one receive channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfoParams {
    /// Absolute tuned frequency (Hz).
    pub freq_hz: f64,
    pub mode: DemodMode,
    pub enabled: bool,
    /// Channel bandwidth (Hz).
    pub bandwidth_hz: f64,
    pub squelch_enabled: bool,
    /// Squelch threshold (dB of mean IQ magnitude).
    pub squelch_level_db: f32,
    pub de_emphasis: DeEmphasis,
    /// Stored and reported only; no DSP stage consumes it.
    pub noise_reduction: bool,
    /// Stored and reported only; no DSP stage consumes it.
    pub stereo: bool,
    /// Volume in percent (0..=100), applied as `(volume / 100)^2`.
    pub volume: f32,
    /// Beat tone for CW (Hz).
    pub cw_tone_hz: f64,
}

impl Default for VfoParams {
    fn default() -> Self {
        Self {
            freq_hz: 100_000_000.0,
            mode: DemodMode::Wfm,
            enabled: false,
            bandwidth_hz: 150_000.0,
            squelch_enabled: false,
            squelch_level_db: -100.0,
            de_emphasis: DeEmphasis::Us50,
            noise_reduction: false,
            stereo: false,
            volume: 50.0,
            cw_tone_hz: 700.0,
        }
    }
}

impl VfoParams {
    /// Parameter set tuned to `freq_hz` with the defaults of `mode`.
    pub fn for_mode(freq_hz: f64, mode: DemodMode, capture_rate: f64) -> Self {
        Self {
            freq_hz,
            mode,
            bandwidth_hz: mode.default_bandwidth_hz(capture_rate),
            de_emphasis: mode.default_de_emphasis(),
            ..Self::default()
        }
    }

    /// Merge every field set in `patch`.
    pub fn apply(&mut self, patch: &VfoPatch) {
        if let Some(freq_hz) = patch.freq_hz {
            self.freq_hz = freq_hz;
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(bandwidth_hz) = patch.bandwidth_hz {
            self.bandwidth_hz = bandwidth_hz;
        }
        if let Some(squelch_enabled) = patch.squelch_enabled {
            self.squelch_enabled = squelch_enabled;
        }
        if let Some(level) = patch.squelch_level_db {
            self.squelch_level_db = level;
        }
        if let Some(de_emphasis) = patch.de_emphasis {
            self.de_emphasis = de_emphasis;
        }
        if let Some(noise_reduction) = patch.noise_reduction {
            self.noise_reduction = noise_reduction;
        }
        if let Some(stereo) = patch.stereo {
            self.stereo = stereo;
        }
        if let Some(volume) = patch.volume {
            self.volume = volume;
        }
        if let Some(cw_tone_hz) = patch.cw_tone_hz {
            self.cw_tone_hz = cw_tone_hz;
        }
    }

    /// Check the numeric fields; the message names the offending field.
    pub fn validate(&self) -> Result<(), String> {
        if !self.freq_hz.is_finite() {
            return Err(format!("freq_hz {} is not finite", self.freq_hz));
        }
        if !(self.bandwidth_hz.is_finite() && self.bandwidth_hz >= MIN_BANDWIDTH_HZ) {
            return Err(format!(
                "bandwidth_hz {} must be at least {}",
                self.bandwidth_hz, MIN_BANDWIDTH_HZ
            ));
        }
        if !self.squelch_level_db.is_finite() {
            return Err(format!(
                "squelch_level_db {} is not finite",
                self.squelch_level_db
            ));
        }
        if !(0.0..=100.0).contains(&self.volume) {
            return Err(format!("volume {} must be within 0..=100", self.volume));
        }
        // The tone has to fit below Nyquist of the CW IF.
        let max_tone = DemodMode::Cw.if_sample_rate(0.0) / 2.0;
        if !(self.cw_tone_hz > 0.0 && self.cw_tone_hz < max_tone) {
            return Err(format!(
                "cw_tone_hz {} must be within (0, {})",
                self.cw_tone_hz, max_tone
            ));
        }
        Ok(())
    }

    /// Linear gain of the perceptual volume curve.
    pub fn volume_gain(&self) -> f32 {
        let v = self.volume / 100.0;
        v * v
    }
}

/// Partial update of [`VfoParams`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfoPatch {
    pub freq_hz: Option<f64>,
    pub mode: Option<DemodMode>,
    pub enabled: Option<bool>,
    pub bandwidth_hz: Option<f64>,
    pub squelch_enabled: Option<bool>,
    pub squelch_level_db: Option<f32>,
    pub de_emphasis: Option<DeEmphasis>,
    pub noise_reduction: Option<bool>,
    pub stereo: Option<bool>,
    pub volume: Option<f32>,
    pub cw_tone_hz: Option<f64>,
}

impl VfoPatch {
    /// Patch that replaces every field with the values of `params`.
    pub fn from_params(params: &VfoParams) -> Self {
        Self {
            freq_hz: Some(params.freq_hz),
            mode: Some(params.mode),
            enabled: Some(params.enabled),
            bandwidth_hz: Some(params.bandwidth_hz),
            squelch_enabled: Some(params.squelch_enabled),
            squelch_level_db: Some(params.squelch_level_db),
            de_emphasis: Some(params.de_emphasis),
            noise_reduction: Some(params.noise_reduction),
            stereo: Some(params.stereo),
            volume: Some(params.volume),
            cw_tone_hz: Some(params.cw_tone_hz),
        }
    }

    pub fn touches_squelch(&self) -> bool {
        self.squelch_enabled.is_some() || self.squelch_level_db.is_some()
    }
}

/// Tuning metadata of one channel for display overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VfoInfo {
    pub id: VfoId,
    pub freq_hz: f64,
    /// Offset from the capture center (Hz).
    pub offset_hz: f64,
    pub mode: DemodMode,
    pub bandwidth_hz: f64,
    pub enabled: bool,
    pub volume: f32,
    pub squelch_enabled: bool,
    pub stereo: bool,
    pub noise_reduction: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_merges_only_set_fields() {
        let mut params = VfoParams::default();
        let patch = VfoPatch {
            bandwidth_hz: Some(12_500.0),
            squelch_level_db: Some(-40.0),
            ..VfoPatch::default()
        };
        params.apply(&patch);
        assert_eq!(params.bandwidth_hz, 12_500.0);
        assert_eq!(params.squelch_level_db, -40.0);
        assert_eq!(params.mode, DemodMode::Wfm);
        assert_eq!(params.volume, 50.0);
        assert!(patch.touches_squelch());
    }

    #[test]
    fn volume_curve_is_squared() {
        let mut params = VfoParams::default();
        params.volume = 100.0;
        assert_eq!(params.volume_gain(), 1.0);
        params.volume = 50.0;
        assert_eq!(params.volume_gain(), 0.25);
        params.volume = 0.0;
        assert_eq!(params.volume_gain(), 0.0);
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(VfoParams::default().validate(), Ok(()));
        for mode in [DemodMode::Nfm, DemodMode::Am, DemodMode::Usb, DemodMode::Cw] {
            assert_eq!(VfoParams::for_mode(145e6, mode, 2e6).validate(), Ok(()));
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            VfoPatch { freq_hz: Some(f64::NAN), ..VfoPatch::default() },
            VfoPatch { freq_hz: Some(f64::INFINITY), ..VfoPatch::default() },
            VfoPatch { bandwidth_hz: Some(f64::NAN), ..VfoPatch::default() },
            VfoPatch { bandwidth_hz: Some(1.0), ..VfoPatch::default() },
            VfoPatch { bandwidth_hz: Some(-12_500.0), ..VfoPatch::default() },
            VfoPatch { squelch_level_db: Some(f32::NEG_INFINITY), ..VfoPatch::default() },
            VfoPatch { volume: Some(f32::NAN), ..VfoPatch::default() },
            VfoPatch { volume: Some(250.0), ..VfoPatch::default() },
            VfoPatch { volume: Some(-1.0), ..VfoPatch::default() },
            VfoPatch { cw_tone_hz: Some(f64::NAN), ..VfoPatch::default() },
            VfoPatch { cw_tone_hz: Some(0.0), ..VfoPatch::default() },
            VfoPatch { cw_tone_hz: Some(1_500.0), ..VfoPatch::default() },
        ];
        for (i, patch) in cases.iter().enumerate() {
            let mut params = VfoParams::default();
            params.apply(patch);
            assert!(params.validate().is_err(), "case {i}: {patch:?}");
        }
    }

    #[test]
    fn for_mode_uses_mode_defaults() {
        let params = VfoParams::for_mode(145_500_000.0, DemodMode::Nfm, 2e6);
        assert_eq!(params.bandwidth_hz, 12_500.0);
        assert_eq!(params.de_emphasis, DeEmphasis::None);
        let raw = VfoParams::for_mode(100e6, DemodMode::Raw, 2e6);
        assert_eq!(raw.bandwidth_hz, 2e6);
    }

    #[test]
    fn patch_deserializes_from_partial_toml() {
        let patch: VfoPatch = toml::from_str("mode = \"am\"\nvolume = 80.0\n").unwrap();
        assert_eq!(patch.mode, Some(DemodMode::Am));
        assert_eq!(patch.volume, Some(80.0));
        assert_eq!(patch.freq_hz, None);
    }

    #[test]
    fn ids_are_unique() {
        let a = VfoId::new();
        let b = VfoId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 8);
    }
}
