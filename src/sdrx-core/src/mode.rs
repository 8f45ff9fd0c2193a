// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Demodulation mode of one receive channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DemodMode {
    Nfm,
    Wfm,
    Am,
    Usb,
    Lsb,
    Dsb,
    Cw,
    Raw,
}

impl DemodMode {
    pub const ALL: [DemodMode; 8] = [
        DemodMode::Nfm,
        DemodMode::Wfm,
        DemodMode::Am,
        DemodMode::Usb,
        DemodMode::Lsb,
        DemodMode::Dsb,
        DemodMode::Cw,
        DemodMode::Raw,
    ];

    /// Intermediate sample rate the channel is filtered and demodulated at.
    ///
    /// RAW runs at the capture rate itself.
    pub fn if_sample_rate(self, capture_rate: f64) -> f64 {
        match self {
            DemodMode::Nfm => 50_000.0,
            DemodMode::Wfm => 250_000.0,
            DemodMode::Am => 15_000.0,
            DemodMode::Usb | DemodMode::Lsb | DemodMode::Dsb => 24_000.0,
            DemodMode::Cw => 3_000.0,
            DemodMode::Raw => capture_rate,
        }
    }

    /// Channel bandwidth applied when a channel switches into this mode.
    pub fn default_bandwidth_hz(self, capture_rate: f64) -> f64 {
        match self {
            DemodMode::Wfm => 150_000.0,
            DemodMode::Nfm => 12_500.0,
            DemodMode::Am => 10_000.0,
            DemodMode::Usb | DemodMode::Lsb => 2_800.0,
            DemodMode::Dsb => 4_600.0,
            DemodMode::Cw => 200.0,
            DemodMode::Raw => capture_rate,
        }
    }

    pub fn default_de_emphasis(self) -> DeEmphasis {
        match self {
            DemodMode::Wfm => DeEmphasis::Us50,
            _ => DeEmphasis::None,
        }
    }

    /// FM modes run the whole chain inside the channel filter bank.
    pub fn is_fm(self) -> bool {
        matches!(self, DemodMode::Nfm | DemodMode::Wfm)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DemodMode::Nfm => "nfm",
            DemodMode::Wfm => "wfm",
            DemodMode::Am => "am",
            DemodMode::Usb => "usb",
            DemodMode::Lsb => "lsb",
            DemodMode::Dsb => "dsb",
            DemodMode::Cw => "cw",
            DemodMode::Raw => "raw",
        }
    }
}

impl fmt::Display for DemodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemodMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        DemodMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == lower)
            .ok_or_else(|| format!("unknown demodulation mode '{}'", s))
    }
}

/// FM de-emphasis time constant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeEmphasis {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "22us")]
    Us22,
    #[serde(rename = "50us")]
    Us50,
    #[serde(rename = "75us")]
    Us75,
}

impl DeEmphasis {
    pub fn tau_seconds(self) -> Option<f64> {
        match self {
            DeEmphasis::None => None,
            DeEmphasis::Us22 => Some(22e-6),
            DeEmphasis::Us50 => Some(50e-6),
            DeEmphasis::Us75 => Some(75e-6),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_rates_per_mode() {
        assert_eq!(DemodMode::Nfm.if_sample_rate(2e6), 50_000.0);
        assert_eq!(DemodMode::Wfm.if_sample_rate(2e6), 250_000.0);
        assert_eq!(DemodMode::Am.if_sample_rate(2e6), 15_000.0);
        assert_eq!(DemodMode::Usb.if_sample_rate(2e6), 24_000.0);
        assert_eq!(DemodMode::Lsb.if_sample_rate(2e6), 24_000.0);
        assert_eq!(DemodMode::Dsb.if_sample_rate(2e6), 24_000.0);
        assert_eq!(DemodMode::Cw.if_sample_rate(2e6), 3_000.0);
        assert_eq!(DemodMode::Raw.if_sample_rate(2e6), 2e6);
    }

    #[test]
    fn parse_mode_names() {
        assert_eq!("WFM".parse::<DemodMode>(), Ok(DemodMode::Wfm));
        assert_eq!(" usb ".parse::<DemodMode>(), Ok(DemodMode::Usb));
        assert!("fm".parse::<DemodMode>().is_err());
        for mode in DemodMode::ALL {
            assert_eq!(mode.to_string().parse::<DemodMode>(), Ok(mode));
        }
    }

    #[test]
    fn de_emphasis_serde_names() {
        let json = serde_json::to_string(&DeEmphasis::Us75).unwrap();
        assert_eq!(json, "\"75us\"");
        let parsed: DeEmphasis = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, DeEmphasis::None);
        assert_eq!(DeEmphasis::Us50.tau_seconds(), Some(50e-6));
    }
}
