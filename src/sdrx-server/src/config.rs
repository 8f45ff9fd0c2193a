// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for sdrx-server.
//!
//! Config is loaded from the `[sdrx-server]` section of `sdrx.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./sdrx.toml`
//! 3. `~/.config/sdrx/sdrx.toml`
//! 4. `/etc/sdrx/sdrx.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use sdrx_app::ConfigFile;
use sdrx_core::{DemodMode, VfoParams, AUDIO_SAMPLE_RATE};
use sdrx_dsp::PipelineConfig;

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    pub capture: CaptureConfig,
    pub spectrum: SpectrumConfig,
    pub audio: AudioConfig,
    pub telemetry: TelemetryConfig,
    /// Receive channels created at startup. One disabled WFM channel at the
    /// capture center when empty.
    pub vfos: Vec<VfoParams>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Synthetic source: silence or one carrier.
    #[default]
    Mock,
    /// Interleaved signed 8-bit IQ file.
    File,
}

/// Radio device and capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: SourceKind,
    /// IQ file path (file source only)
    pub path: Option<PathBuf>,
    /// Restart the file at its end instead of stopping
    pub looping: bool,
    /// Pace reads to the capture rate
    pub throttle: bool,
    /// Complex samples per second
    pub sample_rate: u32,
    pub center_freq_hz: f64,
    /// Complex samples per chunk
    pub chunk_samples: usize,
    pub lna_gain_db: u32,
    pub vga_gain_db: u32,
    pub amp_enabled: bool,
    /// Carrier offset from center for the mock source; silence when unset
    pub tone_offset_hz: Option<f64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Mock,
            path: None,
            looping: false,
            throttle: true,
            sample_rate: 2_000_000,
            center_freq_hz: 100_000_000.0,
            chunk_samples: 131_072,
            lna_gain_db: 16,
            vga_gain_db: 16,
            amp_enabled: false,
            tone_offset_hz: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// FFT length (power of two)
    pub fft_size: usize,
    /// Weight of the newest frame, 1.0 disables smoothing
    pub smoothing_speed: f32,
    /// Emit one frame every N filled FFT buffers
    pub frame_decimation: usize,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing_speed: 0.6,
            frame_decimation: sdrx_dsp::spectrum::DEFAULT_FRAME_DECIMATION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output rate; only 48000 is supported
    pub sample_rate: u32,
    /// Audio batch length in milliseconds
    pub batch_ms: u32,
    /// WAV file receiving the mixed audio; discarded when unset
    pub output: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: AUDIO_SAMPLE_RATE,
            batch_ms: 50,
            output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub report_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            report_interval_ms: 500,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        let capture = &self.capture;
        if capture.sample_rate == 0 {
            return Err("[capture].sample_rate must be > 0".to_string());
        }
        if capture.chunk_samples == 0 {
            return Err("[capture].chunk_samples must be > 0".to_string());
        }
        if !capture.center_freq_hz.is_finite() || capture.center_freq_hz <= 0.0 {
            return Err("[capture].center_freq_hz must be > 0".to_string());
        }
        if capture.source == SourceKind::File && capture.path.is_none() {
            return Err("[capture].path must be set for source = \"file\"".to_string());
        }
        if let Some(offset) = capture.tone_offset_hz {
            if offset.abs() >= capture.sample_rate as f64 / 2.0 {
                return Err(
                    "[capture].tone_offset_hz must be within the captured band".to_string(),
                );
            }
        }

        let fft_size = self.spectrum.fft_size;
        if fft_size == 0 || !fft_size.is_power_of_two() {
            return Err(format!(
                "[spectrum].fft_size {} must be a power of two",
                fft_size
            ));
        }
        if !(self.spectrum.smoothing_speed > 0.0 && self.spectrum.smoothing_speed <= 1.0) {
            return Err("[spectrum].smoothing_speed must be in range (0, 1]".to_string());
        }
        if self.spectrum.frame_decimation == 0 {
            return Err("[spectrum].frame_decimation must be > 0".to_string());
        }

        if self.audio.sample_rate != AUDIO_SAMPLE_RATE {
            return Err(format!(
                "[audio].sample_rate must be {}",
                AUDIO_SAMPLE_RATE
            ));
        }
        if self.audio.batch_ms == 0 {
            return Err("[audio].batch_ms must be > 0".to_string());
        }
        if self.telemetry.report_interval_ms < 100 {
            return Err("[telemetry].report_interval_ms must be >= 100".to_string());
        }

        let half_rate = capture.sample_rate as f64 / 2.0;
        for (idx, vfo) in self.vfos.iter().enumerate() {
            vfo.validate()
                .map_err(|e| format!("[[vfos]] #{}: {}", idx, e))?;
            if vfo.bandwidth_hz > capture.sample_rate as f64 {
                return Err(format!(
                    "[[vfos]] #{}: bandwidth_hz exceeds [capture].sample_rate",
                    idx
                ));
            }
            let offset = vfo.freq_hz - capture.center_freq_hz;
            if offset.abs() >= half_rate {
                return Err(format!(
                    "[[vfos]] #{}: {:.0} Hz is outside the captured band ({:.0} Hz +/- {:.0} Hz)",
                    idx, vfo.freq_hz, capture.center_freq_hz, half_rate
                ));
            }
        }
        Ok(())
    }

    /// DSP settings derived from this configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            capture_rate: self.capture.sample_rate as f64,
            center_hz: self.capture.center_freq_hz,
            max_chunk: self.capture.chunk_samples,
            fft_size: self.spectrum.fft_size,
            smoothing_speed: self.spectrum.smoothing_speed,
            frame_decimation: self.spectrum.frame_decimation,
            batch_ms: self.audio.batch_ms,
            vfos: self.vfos.clone(),
        }
    }

    /// Example configuration under the `[sdrx-server]` section header.
    pub fn example_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "sdrx-server")]
            inner: ServerConfig,
        }
        let capture = CaptureConfig {
            tone_offset_hz: Some(250_000.0),
            ..CaptureConfig::default()
        };
        let rate = capture.sample_rate as f64;
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            vfos: vec![
                VfoParams {
                    enabled: true,
                    ..VfoParams::for_mode(100_250_000.0, DemodMode::Nfm, rate)
                },
                VfoParams {
                    enabled: true,
                    volume: 30.0,
                    ..VfoParams::for_mode(99_700_000.0, DemodMode::Wfm, rate)
                },
            ],
            capture,
            audio: AudioConfig {
                output: Some(PathBuf::from("sdrx.wav")),
                ..AudioConfig::default()
            },
            ..ServerConfig::default()
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        if sdrx_app::parse_level(level).is_none() {
            return Err(format!(
                "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                level
            ));
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "sdrx-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrx_core::DeEmphasis;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.capture.source, SourceKind::Mock);
        assert_eq!(config.capture.sample_rate, 2_000_000);
        assert_eq!(config.spectrum.fft_size, 2048);
        assert_eq!(config.spectrum.frame_decimation, 15);
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.audio.batch_ms, 50);
        assert_eq!(config.telemetry.report_interval_ms, 500);
        assert!(config.vfos.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[capture]
source = "file"
path = "/tmp/capture.iq"
looping = true
sample_rate = 2400000
center_freq_hz = 145000000.0

[spectrum]
fft_size = 4096
smoothing_speed = 1.0

[[vfos]]
freq_hz = 145500000.0
mode = "nfm"
enabled = true
bandwidth_hz = 12500.0
squelch_enabled = true
squelch_level_db = -40.0

[[vfos]]
freq_hz = 144800000.0
mode = "usb"
de_emphasis = "none"
volume = 80.0
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.capture.source, SourceKind::File);
        assert!(config.capture.looping);
        assert_eq!(config.capture.sample_rate, 2_400_000);
        assert_eq!(config.capture.chunk_samples, 131_072);
        assert_eq!(config.spectrum.fft_size, 4096);
        assert_eq!(config.vfos.len(), 2);
        assert_eq!(config.vfos[0].mode, DemodMode::Nfm);
        assert!(config.vfos[0].squelch_enabled);
        assert_eq!(config.vfos[1].mode, DemodMode::Usb);
        assert_eq!(config.vfos[1].de_emphasis, DeEmphasis::None);
        assert!(!config.vfos[1].enabled);
        assert!(config.validate().is_ok());

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.capture_rate, 2_400_000.0);
        assert_eq!(pipeline.max_chunk, 131_072);
        assert_eq!(pipeline.vfos.len(), 2);
    }

    #[test]
    fn test_example_round_trips() {
        let text = ServerConfig::example_toml();
        let config = ServerConfig::load_from_str(&text).unwrap();
        assert_eq!(config.vfos.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.spectrum.fft_size = 1000;
        assert!(config.validate().unwrap_err().contains("[spectrum].fft_size"));

        let mut config = ServerConfig::default();
        config.capture.sample_rate = 0;
        assert!(config.validate().unwrap_err().contains("[capture].sample_rate"));

        let mut config = ServerConfig::default();
        config.capture.chunk_samples = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.general.log_level = Some("loud".to_string());
        assert!(config.validate().unwrap_err().contains("log_level"));

        let mut config = ServerConfig::default();
        config.capture.source = SourceKind::File;
        assert!(config.validate().unwrap_err().contains("[capture].path"));

        let mut config = ServerConfig::default();
        config.audio.sample_rate = 44_100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_vfos() {
        let mut config = ServerConfig::default();
        config.vfos.push(VfoParams {
            volume: 120.0,
            ..VfoParams::default()
        });
        assert!(config.validate().unwrap_err().contains("volume"));

        let mut config = ServerConfig::default();
        config.vfos.push(VfoParams {
            bandwidth_hz: 1.0,
            ..VfoParams::default()
        });
        assert!(config.validate().unwrap_err().contains("bandwidth_hz"));

        let mut config = ServerConfig::default();
        config.vfos.push(VfoParams {
            bandwidth_hz: 4e6,
            ..VfoParams::default()
        });
        assert!(config.validate().unwrap_err().contains("exceeds"));

        let mut config = ServerConfig::default();
        config.vfos.push(VfoParams {
            freq_hz: f64::NAN,
            ..VfoParams::default()
        });
        assert!(config.validate().unwrap_err().contains("freq_hz"));

        let mut config = ServerConfig::default();
        config.vfos.push(VfoParams {
            freq_hz: 101_000_000.0,
            ..VfoParams::default()
        });
        assert!(config.validate().unwrap_err().contains("outside the captured band"));

        let mut config = ServerConfig::default();
        config.vfos.push(VfoParams {
            freq_hz: 100_900_000.0,
            ..VfoParams::default()
        });
        assert!(config.validate().is_ok());
    }
}
